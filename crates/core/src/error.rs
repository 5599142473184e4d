//! Error taxonomy shared by the pipeline and its callers.
//!
//! Each component reports its own error type. [`AnalyzeError`] is what the
//! orchestrator hands back, and its [`ErrorKind`] is the externally visible
//! category. Messages shown to users come from [`AnalyzeError::user_message`]
//! and never carry raw upstream details; the `Display` impl does, for logs.

use crate::acquire::AcquireError;
use crate::extract::{ExtractError, ModelError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Externally visible failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidCredential,
    SubtitlesUnavailable,
    AcquisitionTimeout,
    RateLimited,
    ResponseParseError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::SubtitlesUnavailable => "subtitles_unavailable",
            ErrorKind::AcquisitionTimeout => "acquisition_timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ResponseParseError => "response_parse_error",
            ErrorKind::InternalError => "internal_error",
        }
    }

    /// HTTP status a web front end should answer with.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::InvalidCredential => 401,
            ErrorKind::SubtitlesUnavailable => 422,
            ErrorKind::AcquisitionTimeout => 504,
            ErrorKind::RateLimited => 429,
            ErrorKind::ResponseParseError => 502,
            ErrorKind::InternalError => 500,
        }
    }

    /// Process exit code used by the command line front end.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::InternalError => 1,
            ErrorKind::InvalidInput => 2,
            ErrorKind::InvalidCredential => 3,
            ErrorKind::SubtitlesUnavailable => 4,
            ErrorKind::AcquisitionTimeout => 5,
            ErrorKind::RateLimited => 6,
            ErrorKind::ResponseParseError => 7,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was rejected before any external call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputProblem {
    #[error("no video URL supplied")]
    MissingUrl,
    #[error("not a recognized video URL: {0}")]
    MalformedUrl(String),
    #[error("no API key in the request or the configuration")]
    MissingCredential,
}

/// Failure of a whole analyze request.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputProblem),

    #[error("credential rejected by the language model service: {0}")]
    InvalidCredential(String),

    #[error("no Japanese subtitles available for video {0}")]
    SubtitlesUnavailable(String),

    #[error("subtitle download exceeded {0:?}")]
    AcquisitionTimeout(Duration),

    #[error("language model service rate limited the request: {0}")]
    RateLimited(String),

    #[error("could not parse the language model reply: {0}")]
    ResponseParse(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AnalyzeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyzeError::InvalidInput(_) => ErrorKind::InvalidInput,
            AnalyzeError::InvalidCredential(_) => ErrorKind::InvalidCredential,
            AnalyzeError::SubtitlesUnavailable(_) => ErrorKind::SubtitlesUnavailable,
            AnalyzeError::AcquisitionTimeout(_) => ErrorKind::AcquisitionTimeout,
            AnalyzeError::RateLimited(_) => ErrorKind::RateLimited,
            AnalyzeError::ResponseParse(_) => ErrorKind::ResponseParseError,
            AnalyzeError::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// Localized (Traditional Chinese) message that is safe to show a user.
    pub fn user_message(&self) -> String {
        match self {
            AnalyzeError::InvalidInput(InputProblem::MissingUrl) => "請提供 YouTube URL".into(),
            AnalyzeError::InvalidInput(InputProblem::MalformedUrl(_)) => {
                "無效的 URL 格式，請貼上 YouTube 影片網址".into()
            }
            AnalyzeError::InvalidInput(InputProblem::MissingCredential) => {
                "請設定 API Key（環境變數或在請求中提供）".into()
            }
            AnalyzeError::InvalidCredential(_) => "API Key 無效，請確認 API Key 正確。".into(),
            AnalyzeError::SubtitlesUnavailable(_) => {
                "找不到日文字幕。請確認該影片有日文字幕（官方或自動生成）。".into()
            }
            AnalyzeError::AcquisitionTimeout(_) => "下載字幕逾時，請稍後再試。".into(),
            AnalyzeError::RateLimited(_) => "API 使用超限，請稍後再試。".into(),
            AnalyzeError::ResponseParse(_) => "AI 回傳格式解析失敗，請再試一次。".into(),
            AnalyzeError::Internal(_) => "處理時發生未預期的錯誤，請稍後再試。".into(),
        }
    }
}

impl From<AcquireError> for AnalyzeError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::NotFound { video, .. } => AnalyzeError::SubtitlesUnavailable(video),
            AcquireError::Timeout(limit) => AnalyzeError::AcquisitionTimeout(limit),
            other => AnalyzeError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<ExtractError> for AnalyzeError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Model(ModelError::Unauthorized(body)) => {
                AnalyzeError::InvalidCredential(body)
            }
            ExtractError::Model(ModelError::RateLimited(body)) => AnalyzeError::RateLimited(body),
            ExtractError::Model(ModelError::EmptyReply) => {
                AnalyzeError::ResponseParse(ModelError::EmptyReply.to_string())
            }
            ExtractError::Model(other) => AnalyzeError::Internal(anyhow::Error::new(other)),
            ExtractError::Parse(reason) => AnalyzeError::ResponseParse(reason),
        }
    }
}

/// Body of an error response: `{ "error": "<localized message>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

impl From<&AnalyzeError> for ErrorPayload {
    fn from(err: &AnalyzeError) -> Self {
        ErrorPayload {
            error: err.user_message(),
        }
    }
}
