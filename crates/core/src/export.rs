//! `.nihongocards` export bundle.
//!
//! The layout is an import contract with the flashcard app: field names, the
//! two tables and their `bookType` values must not change.

use crate::models::{AnalysisResult, GrammarEntry, VocabularyEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "AnimeJapanese";
pub const EXPORT_VERSION: u32 = 1;
pub const EXPORT_TYPE: &str = "group";
pub const FILE_EXTENSION: &str = "nihongocards";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub version: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(rename = "exportedAt")]
    pub exported_at: String,
    pub tables: Vec<ExportTable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTable {
    pub title: String,
    pub book_type: BookType,
    pub items: Vec<CardItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookType {
    Vocabulary,
    Grammar,
}

/// One card as the flashcard app stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardItem {
    pub japanese: String,
    pub reading: String,
    pub chinese: String,
    pub notes: String,
}

impl From<&VocabularyEntry> for CardItem {
    fn from(e: &VocabularyEntry) -> Self {
        CardItem {
            japanese: e.japanese.clone(),
            reading: e.reading.clone(),
            chinese: e.chinese.clone(),
            notes: e.notes.clone(),
        }
    }
}

impl From<&GrammarEntry> for CardItem {
    fn from(e: &GrammarEntry) -> Self {
        CardItem {
            japanese: e.japanese.clone(),
            reading: e.reading.clone(),
            chinese: e.chinese.clone(),
            notes: e.notes.clone(),
        }
    }
}

/// Map an analysis to the export schema, stamped with `exported_at`.
pub fn build_export(analysis: &AnalysisResult, exported_at: DateTime<Utc>) -> ExportBundle {
    let title = &analysis.title;
    ExportBundle {
        version: EXPORT_VERSION,
        kind: EXPORT_TYPE.to_string(),
        title: format!("{APP_NAME} - {title}"),
        exported_at: exported_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        tables: vec![
            ExportTable {
                title: format!("單字 - {title}"),
                book_type: BookType::Vocabulary,
                items: analysis.vocabulary.iter().map(CardItem::from).collect(),
            },
            ExportTable {
                title: format!("文法 - {title}"),
                book_type: BookType::Grammar,
                items: analysis.grammar.iter().map(CardItem::from).collect(),
            },
        ],
    }
}

/// [`build_export`] stamped with the current UTC time.
pub fn build_export_now(analysis: &AnalysisResult) -> ExportBundle {
    build_export(analysis, Utc::now())
}

/// File name for saving a bundle: the title with path-hostile characters
/// replaced, plus the `.nihongocards` extension.
pub fn file_name(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim_matches('.');
    let stem = if stem.is_empty() { APP_NAME } else { stem };
    format!("{stem}.{FILE_EXTENSION}")
}
