//! Request orchestration.
//! One [`Pipeline`] serves every request; each call to [`Pipeline::analyze`]
//! walks validation, acquisition, extraction and export on its own, sharing
//! only the read-only configuration.

use crate::acquire::{acquire_subtitles, SubtitleFetcher};
use crate::config::Config;
use crate::error::{AnalyzeError, InputProblem};
use crate::export::build_export_now;
use crate::extract::{build_model, extract, LanguageModel};
use crate::models::{AnalyzeRequest, AnalyzeResponse};
use crate::video::{VideoRef, YtDlpFetcher};
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    AcquiringSubtitles,
    Extracting,
    BuildingExport,
    Done,
    Errored,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::AcquiringSubtitles => "acquiring_subtitles",
            Stage::Extracting => "extracting",
            Stage::BuildingExport => "building_export",
            Stage::Done => "done",
            Stage::Errored => "errored",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    info!("{stage} -> {next}");
    *stage = next;
}

/// A validated request, ready for the external calls.
#[derive(Debug)]
struct Validated {
    video: VideoRef,
    api_key: String,
}

pub struct Pipeline {
    config: Arc<Config>,
    fetcher: Arc<dyn SubtitleFetcher>,
    model: Arc<dyn LanguageModel>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn SubtitleFetcher>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            model,
        }
    }

    /// Wire the yt-dlp fetcher and the configured model service.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let fetcher = Arc::new(YtDlpFetcher::new(
            config.ytdlp_path.clone(),
            config.cookies_from_browser.clone(),
        ));
        let model = build_model(&config)?;
        Ok(Self::new(config, fetcher, model))
    }

    /// Run one request end to end. Either the full response or one error;
    /// never a partial result.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, AnalyzeError> {
        let span = info_span!("analyze", url = request.url.as_deref().unwrap_or(""));
        async {
            let mut stage = Stage::Validating;
            let result = self.run(request, &mut stage).await;
            if let Err(err) = &result {
                warn!(kind = %err.kind(), "request failed while {stage}: {err}");
                advance(&mut stage, Stage::Errored);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request: &AnalyzeRequest,
        stage: &mut Stage,
    ) -> Result<AnalyzeResponse, AnalyzeError> {
        let Validated { video, api_key } = self.validate(request)?;

        advance(stage, Stage::AcquiringSubtitles);
        let subtitles = acquire_subtitles(
            self.fetcher.as_ref(),
            &video,
            &self.config.subtitle_lang,
            self.config.download_timeout,
        )
        .await?;

        advance(stage, Stage::Extracting);
        let analysis = extract(
            self.model.as_ref(),
            &api_key,
            &subtitles.title,
            &subtitles.text,
            self.config.max_input_chars,
        )
        .await?;

        advance(stage, Stage::BuildingExport);
        let bundle = build_export_now(&analysis);

        advance(stage, Stage::Done);
        info!(
            "\"{}\": {} vocabulary, {} grammar",
            analysis.title,
            analysis.vocabulary.len(),
            analysis.grammar.len()
        );
        Ok(AnalyzeResponse::new(analysis, bundle))
    }

    /// Check the URL and resolve the credential. The request key wins over
    /// the configured default.
    fn validate(&self, request: &AnalyzeRequest) -> Result<Validated, AnalyzeError> {
        let url = request
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(InputProblem::MissingUrl)?;
        let video =
            VideoRef::parse(url).map_err(|e| InputProblem::MalformedUrl(e.to_string()))?;
        let api_key = request
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| self.config.api_key.as_deref())
            .ok_or(InputProblem::MissingCredential)?
            .to_string();
        Ok(Validated { video, api_key })
    }
}
