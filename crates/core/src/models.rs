//! Request, response and card types.

use crate::export::ExportBundle;
use serde::{Deserialize, Serialize};

/// A vocabulary card picked from the subtitles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub japanese: String,
    /// Kana reading, may be empty.
    pub reading: String,
    /// Traditional Chinese translation.
    pub chinese: String,
    /// Part of speech or usage note.
    pub notes: String,
}

/// A grammar card: an example sentence quoted from the subtitles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarEntry {
    pub japanese: String,
    /// Always empty for sentences.
    pub reading: String,
    pub chinese: String,
    /// The grammar point the sentence illustrates.
    pub notes: String,
}

/// What the extractor produced for one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    pub vocabulary: Vec<VocabularyEntry>,
    pub grammar: Vec<GrammarEntry>,
}

/// Inbound analyze request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub url: Option<String>,
    /// Overrides the configured default key when present.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: Some(url.into()),
            api_key,
        }
    }
}

/// Success payload: the analysis plus the ready-to-save export bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub title: String,
    pub vocabulary: Vec<VocabularyEntry>,
    pub grammar: Vec<GrammarEntry>,
    pub nihongocards: ExportBundle,
}

impl AnalyzeResponse {
    pub fn new(analysis: AnalysisResult, nihongocards: ExportBundle) -> Self {
        Self {
            title: analysis.title,
            vocabulary: analysis.vocabulary,
            grammar: analysis.grammar,
            nihongocards,
        }
    }
}
