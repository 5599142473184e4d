//! Turn a YouTube link into Japanese study cards.
//!
//! The [`pipeline::Pipeline`] fetches the Japanese captions with yt-dlp,
//! asks a hosted language model for vocabulary and grammar, and packs the
//! result as a `.nihongocards` bundle.

pub mod acquire;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod subtitle;
pub mod video;

pub use config::{Config, Provider};
pub use error::{AnalyzeError, ErrorKind, ErrorPayload};
pub use export::ExportBundle;
pub use models::{AnalyzeRequest, AnalyzeResponse};
pub use pipeline::Pipeline;
