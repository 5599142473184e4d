//! This module is responsible for turning caption tracks into plain text.
//! It understands WebVTT and SRT well enough to pull the spoken lines out of
//! each cue, drop markup and collapse the repeats that rolling captions leave.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));
static OVERRIDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\\[^}]*\}").expect("override pattern"));

/// Represents a single cue after cleanup: only its text lines survive.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub lines: Vec<String>,
}

/// Parse caption text into cues, in source order.
/// Blocks without a timing line (headers, NOTE/STYLE blocks, broken cues) are
/// skipped rather than reported.
pub fn parse(input: &str) -> Vec<Cue> {
    let input = input.trim_start_matches('\u{feff}');
    let mut cues = Vec::new();
    let mut current: Option<Vec<String>> = None;
    for line in input.lines() {
        if is_timing_line(line) {
            flush(&mut current, &mut cues);
            current = Some(Vec::new());
            continue;
        }
        let Some(lines) = current.as_mut() else {
            continue;
        };
        if line.is_empty() || (line.trim().is_empty() && !lines.is_empty()) {
            flush(&mut current, &mut cues);
            continue;
        }
        let text = strip_markup(line);
        if text.is_empty() || text.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        lines.push(text);
    }
    flush(&mut current, &mut cues);
    cues
}

/// Parse a caption track and return its text, one line per spoken line.
/// A line that already appeared in the previous cue is dropped, which keeps
/// the first copy of repeated cues and of rolling auto-caption lines.
pub fn clean(input: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut previous: Vec<String> = Vec::new();
    for cue in parse(input) {
        for line in &cue.lines {
            if previous.contains(line) || out.last() == Some(line) {
                continue;
            }
            out.push(line.clone());
        }
        previous = cue.lines;
    }
    out.join("\n")
}

fn flush(current: &mut Option<Vec<String>>, cues: &mut Vec<Cue>) {
    if let Some(lines) = current.take() {
        if !lines.is_empty() {
            cues.push(Cue { lines });
        }
    }
}

/// A `start --> end` line, with or without trailing cue settings.
fn is_timing_line(line: &str) -> bool {
    let Some((start, _)) = line.split_once("-->") else {
        return false;
    };
    let start = start.trim();
    !start.is_empty() && start.chars().all(|c| c.is_ascii_digit() || matches!(c, ':' | '.' | ','))
}

fn strip_markup(line: &str) -> String {
    let text = TAG.replace_all(line, "");
    let text = OVERRIDE.replace_all(&text, "");
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
