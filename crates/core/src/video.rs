//! Video helpers: URL validation and the yt-dlp subtitle downloader.

use crate::acquire::{AcquireError, CaptionFile, CaptionTier, SubtitleFetcher};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};
use url::Url;

/// A validated YouTube video: its 11 character id and canonical watch URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    id: String,
    url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,
    #[error("malformed URL: {0}")]
    Malformed(String),
    #[error("unsupported scheme {0}")]
    UnsupportedScheme(String),
    #[error("not a YouTube host: {0}")]
    UnsupportedHost(String),
    #[error("no video id in URL")]
    MissingVideoId,
}

impl VideoRef {
    /// Parse a user supplied URL. Accepts watch, short link, shorts, embed,
    /// live and `/v/` forms on the YouTube hosts.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(UrlError::Empty);
        }
        let url = Url::parse(raw).map_err(|e| UrlError::Malformed(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| UrlError::Malformed(raw.to_string()))?
            .to_ascii_lowercase();
        let host = ["www.", "m.", "music."]
            .iter()
            .find_map(|p| host.strip_prefix(p))
            .unwrap_or(host.as_str())
            .to_string();
        let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
        let id = match host.as_str() {
            "youtu.be" => segments.next().map(str::to_string),
            "youtube.com" | "youtube-nocookie.com" => match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
                _ => None,
            },
            _ => return Err(UrlError::UnsupportedHost(host)),
        };
        let id = id.filter(|id| is_video_id(id)).ok_or(UrlError::MissingVideoId)?;
        Ok(Self {
            url: format!("https://www.youtube.com/watch?v={id}"),
            id,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Canonical watch URL handed to the downloader.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

fn is_video_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Build the yt-dlp arguments that download one caption tier into `out_dir`.
/// Files are named after the video title so the title can be read back.
pub fn ytdlp_args(
    video: &VideoRef,
    lang: &str,
    tier: CaptionTier,
    out_dir: &Path,
    cookies_from_browser: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "--skip-download".to_string(),
        "--sub-lang".to_string(),
        lang.to_string(),
        "--convert-subs".to_string(),
        "vtt".to_string(),
        "-o".to_string(),
        out_dir.join("%(title)s").display().to_string(),
        "--no-warnings".to_string(),
    ];
    if let Some(browser) = cookies_from_browser {
        args.push("--cookies-from-browser".to_string());
        args.push(browser.to_string());
    }
    args.push(
        match tier {
            CaptionTier::Official => "--write-sub",
            CaptionTier::AutoGenerated => "--write-auto-sub",
        }
        .to_string(),
    );
    args.push(video.url().to_string());
    args
}

/// `Title.ja.vtt` -> `Title`.
pub fn title_from_caption_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let title = match stem.rsplit_once('.') {
        Some((title, _lang)) => title,
        None => stem.as_ref(),
    };
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Subtitle fetcher backed by the `yt-dlp` command line tool.
pub struct YtDlpFetcher {
    binary: PathBuf,
    cookies_from_browser: Option<String>,
}

impl YtDlpFetcher {
    pub fn new(binary: impl Into<PathBuf>, cookies_from_browser: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            cookies_from_browser,
        }
    }
}

#[async_trait]
impl SubtitleFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        video: &VideoRef,
        lang: &str,
        tier: CaptionTier,
        dest: &Path,
    ) -> Result<Option<CaptionFile>, AcquireError> {
        trace!(
            "YtDlpFetcher::fetch(video={}, lang={lang}, tier={tier}): invoking {}",
            video.id(),
            self.binary.display()
        );
        let args = ytdlp_args(video, lang, tier, dest, self.cookies_from_browser.as_deref());
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(AcquireError::Spawn)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AcquireError::Download(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        let Some(path) = pick_caption_file(dest).await? else {
            debug!("yt-dlp wrote no {tier} captions into {}", dest.display());
            return Ok(None);
        };
        Ok(Some(CaptionFile {
            title: title_from_caption_path(&path),
            path,
        }))
    }
}

/// First `.vtt` file in `dir`, else the first `.srt`.
async fn pick_caption_file(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let rank = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("vtt") => 0,
            Some(ext) if ext.eq_ignore_ascii_case("srt") => 1,
            _ => continue,
        };
        found.push((rank, path));
    }
    found.sort();
    Ok(found.into_iter().next().map(|(_, path)| path))
}
