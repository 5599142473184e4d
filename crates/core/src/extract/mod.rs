//! Vocabulary and grammar extraction.
//! This module builds the prompt, calls the language model once and turns
//! its JSON reply into typed cards.

use crate::config::{Config, Provider};
use crate::models::{AnalysisResult, GrammarEntry, VocabularyEntry};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

pub mod anthropic;
pub mod openai;

/// Subtitle text beyond this many characters is cut before submission.
pub const MAX_INPUT_CHARS: usize = 8000;
/// Number of vocabulary cards the model is asked for.
pub const VOCABULARY_TARGET: usize = 10;
/// Number of grammar cards the model is asked for.
pub const GRAMMAR_TARGET: usize = 5;
/// Appended to truncated subtitle text.
pub const TRUNCATION_MARKER: &str = "\n...(字幕截斷)";

static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```(?:json)?\s*").expect("fence pattern"));
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").expect("fence pattern"));

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("credential rejected: {0}")]
    Unauthorized(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("model service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model reply had no text content")]
    EmptyReply,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{0}")]
    Parse(String),
}

/// A hosted completion API: one system instruction, one user turn, text back.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, api_key: &str, system: &str, user: &str)
        -> Result<String, ModelError>;
}

/// Create the model adapter selected by the configuration.
pub fn build_model(config: &Config) -> Result<Arc<dyn LanguageModel>, ModelError> {
    let model: Arc<dyn LanguageModel> = match config.provider {
        Provider::Anthropic => Arc::new(anthropic::AnthropicModel::from_config(config)?),
        Provider::OpenAi => Arc::new(openai::OpenAiModel::from_config(config)?),
    };
    Ok(model)
}

/// The fixed system instruction.
pub fn system_prompt() -> String {
    format!(
        r#"你是日文學習助手，專門從日本動漫對白中挑選適合 N2 以上程度的學習素材。

請從使用者提供的字幕中：
1. 選出 {VOCABULARY_TARGET} 個 N2 以上程度的重要單字（避開 N5/N4 的基礎單字）
2. 選出 {GRAMMAR_TARGET} 個包含 N2 以上文法的例句（例如 〜にもかかわらず、〜に際して、〜を踏まえて）

要求：
- 單字附上假名讀音與繁體中文翻譯
- 例句必須直接引用字幕原文，不要改寫
- 翻譯一律使用繁體中文
- 只回傳 JSON，不要任何其他文字，格式如下：

{{
  "vocabulary": [
    {{"japanese": "単語", "reading": "たんご", "chinese": "單字", "notes": "詞性或用法說明"}}
  ],
  "grammar": [
    {{"japanese": "例句原文", "reading": "", "chinese": "繁體中文翻譯", "notes": "文法重點：〜文法型"}}
  ]
}}"#
    )
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn user_prompt(subtitles: &str) -> String {
    format!("以下是動漫字幕內容：\n\n{subtitles}")
}

#[derive(Debug, Deserialize)]
struct RawReply {
    vocabulary: Vec<RawEntry>,
    grammar: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    japanese: String,
    #[serde(default)]
    reading: Option<String>,
    chinese: String,
    notes: String,
}

/// Drop markdown fences and anything around the outermost JSON object.
fn json_span(reply: &str) -> &str {
    let trimmed = reply.trim();
    let start = FENCE_OPEN.find(trimmed).map(|m| m.end()).unwrap_or(0);
    let end = FENCE_CLOSE
        .find(&trimmed[start..])
        .map(|m| start + m.start())
        .unwrap_or(trimmed.len());
    let body = &trimmed[start..end];
    match (body.find('{'), body.rfind('}')) {
        (Some(open), Some(close)) if open < close => &body[open..=close],
        _ => body,
    }
}

/// Validate the model reply against the card shape.
pub fn parse_reply(reply: &str, title: &str) -> Result<AnalysisResult, ExtractError> {
    trace!("parse_reply({} chars)", reply.len());
    let raw: RawReply = serde_json::from_str(json_span(reply))
        .map_err(|e| ExtractError::Parse(format!("reply is not the expected JSON: {e}")))?;
    if raw.vocabulary.len() != VOCABULARY_TARGET || raw.grammar.len() != GRAMMAR_TARGET {
        warn!(
            "model returned {} vocabulary and {} grammar entries (asked for {VOCABULARY_TARGET}/{GRAMMAR_TARGET})",
            raw.vocabulary.len(),
            raw.grammar.len()
        );
    }
    let vocabulary = raw
        .vocabulary
        .into_iter()
        .map(|e| VocabularyEntry {
            japanese: e.japanese,
            reading: e.reading.unwrap_or_default(),
            chinese: e.chinese,
            notes: e.notes,
        })
        .collect();
    let grammar = raw
        .grammar
        .into_iter()
        .map(|e| GrammarEntry {
            japanese: e.japanese,
            reading: String::new(),
            chinese: e.chinese,
            notes: e.notes,
        })
        .collect();
    Ok(AnalysisResult {
        title: title.to_string(),
        vocabulary,
        grammar,
    })
}

/// Ask the model for cards from `subtitles` and parse the answer.
pub async fn extract(
    model: &dyn LanguageModel,
    api_key: &str,
    title: &str,
    subtitles: &str,
    max_chars: usize,
) -> Result<AnalysisResult, ExtractError> {
    let input = truncate(subtitles, max_chars);
    if input.len() != subtitles.len() {
        debug!("subtitles truncated to {max_chars} characters");
    }
    info!("requesting cards for \"{title}\"");
    let reply = model
        .complete(api_key, &system_prompt(), &user_prompt(&input))
        .await?;
    debug!("model replied with {} chars", reply.len());
    parse_reply(&reply, title)
}

/// Map an unsuccessful HTTP reply to a model error.
pub(crate) async fn error_for_status(
    resp: reqwest::Response,
) -> Result<reqwest::Response, ModelError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: String = resp.text().await.unwrap_or_default().chars().take(500).collect();
    Err(match status.as_u16() {
        401 | 403 => ModelError::Unauthorized(body),
        429 | 529 => ModelError::RateLimited(body),
        code => ModelError::Status { status: code, body },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const REPLY: &str = r#"{
      "vocabulary": [
        {"japanese": "断念", "reading": "だんねん", "chinese": "放棄", "notes": "名詞・動詞"},
        {"japanese": "覚悟", "chinese": "決心", "notes": "名詞"}
      ],
      "grammar": [
        {"japanese": "諦めるわけにはいかない", "reading": "あきらめる", "chinese": "不能放棄", "notes": "〜わけにはいかない"}
      ]
    }"#;

    /// Canned model that remembers the prompts it was given.
    struct CannedModel {
        reply: Result<String, u16>,
        seen: Mutex<Vec<(String, String, String)>>,
    }

    impl CannedModel {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn status(code: u16) -> Self {
            Self {
                reply: Err(code),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(
            &self,
            api_key: &str,
            system: &str,
            user: &str,
        ) -> Result<String, ModelError> {
            self.seen
                .lock()
                .unwrap()
                .push((api_key.to_string(), system.to_string(), user.to_string()));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(401) => Err(ModelError::Unauthorized("invalid x-api-key".into())),
                Err(429) => Err(ModelError::RateLimited("slow down".into())),
                Err(code) => Err(ModelError::Status {
                    status: *code,
                    body: String::new(),
                }),
            }
        }
    }

    #[test]
    fn truncates_on_character_boundaries() {
        let text = "断念する".repeat(3);
        assert_eq!(truncate(&text, 12), text);
        let cut = truncate(&text, 5);
        assert_eq!(cut, format!("断念する断{TRUNCATION_MARKER}"));
        assert_eq!(truncate("", 8000), "");
    }

    #[test]
    fn prompt_asks_for_target_counts() {
        let prompt = system_prompt();
        assert!(prompt.contains("10 個"));
        assert!(prompt.contains("5 個"));
        assert!(prompt.contains("\"vocabulary\""));
    }

    #[test]
    fn parses_reply_and_defaults_missing_reading() {
        let result = parse_reply(REPLY, "テスト").unwrap();
        assert_eq!(result.title, "テスト");
        assert_eq!(result.vocabulary.len(), 2);
        assert_eq!(result.vocabulary[0].reading, "だんねん");
        assert_eq!(result.vocabulary[1].reading, "");
        assert_eq!(result.grammar.len(), 1);
        assert_eq!(result.grammar[0].reading, "");
        assert_eq!(result.grammar[0].notes, "〜わけにはいかない");
    }

    #[test]
    fn strips_code_fences_and_chatter() {
        let fenced = format!("```json\n{REPLY}\n```");
        assert_eq!(parse_reply(&fenced, "t").unwrap().vocabulary.len(), 2);

        let chatty = format!("以下是結果：\n{REPLY}\n希望有幫助！");
        assert_eq!(parse_reply(&chatty, "t").unwrap().grammar.len(), 1);
    }

    #[test]
    fn rejects_invalid_or_incomplete_replies() {
        for reply in [
            "I cannot help with that.",
            r#"{"vocabulary": []}"#,
            r#"{"vocabulary": [{"japanese": "断念"}], "grammar": []}"#,
            r#"{"vocabulary": "none", "grammar": []}"#,
        ] {
            assert!(
                matches!(parse_reply(reply, "t"), Err(ExtractError::Parse(_))),
                "{reply}"
            );
        }
    }

    #[test]
    fn accepts_empty_lists() {
        let result = parse_reply(r#"{"vocabulary": [], "grammar": []}"#, "t").unwrap();
        assert!(result.vocabulary.is_empty());
        assert!(result.grammar.is_empty());
    }

    #[tokio::test]
    async fn extract_sends_truncated_text() {
        let model = CannedModel::ok(REPLY);
        let subtitles = "あ".repeat(20);
        let result = extract(&model, "sk-test", "動画", &subtitles, 10)
            .await
            .unwrap();
        assert_eq!(result.vocabulary[0].japanese, "断念");
        let seen = model.seen.lock().unwrap();
        let (key, system, user) = &seen[0];
        assert_eq!(key, "sk-test");
        assert!(system.contains("N2"));
        assert!(user.ends_with(&format!("{}{TRUNCATION_MARKER}", "あ".repeat(10))));
    }

    #[tokio::test]
    async fn model_failures_keep_their_kind() {
        let err = extract(&CannedModel::status(401), "k", "t", "text", MAX_INPUT_CHARS)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Model(ModelError::Unauthorized(_))));

        let err = extract(&CannedModel::status(429), "k", "t", "text", MAX_INPUT_CHARS)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Model(ModelError::RateLimited(_))));

        let err = extract(&CannedModel::ok("not json"), "k", "t", "text", MAX_INPUT_CHARS)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
