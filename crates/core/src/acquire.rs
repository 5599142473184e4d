//! Subtitle acquisition.
//! Tries official captions, then auto-generated ones, inside a per-request
//! temporary directory that is removed however the attempt ends.

use crate::subtitle;
use crate::video::VideoRef;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Upper bound on a single downloader call.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a caption track comes from, in the order we try them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionTier {
    Official,
    AutoGenerated,
}

impl CaptionTier {
    pub const ORDER: [CaptionTier; 2] = [CaptionTier::Official, CaptionTier::AutoGenerated];

    pub fn as_str(self) -> &'static str {
        match self {
            CaptionTier::Official => "official",
            CaptionTier::AutoGenerated => "auto-generated",
        }
    }

    fn dir_name(self) -> &'static str {
        match self {
            CaptionTier::Official => "official",
            CaptionTier::AutoGenerated => "auto",
        }
    }
}

impl fmt::Display for CaptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caption file written by a fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionFile {
    pub path: PathBuf,
    /// Video title, when the downloader reports one.
    pub title: Option<String>,
}

/// Cleaned subtitle text for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtitles {
    pub text: String,
    pub title: String,
    pub tier: CaptionTier,
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("no {lang} subtitles available for video {video}")]
    NotFound { video: String, lang: String },

    #[error("subtitle download timed out after {0:?}")]
    Timeout(Duration),

    /// The downloader ran and failed. Acquisition moves on to the next tier.
    #[error("subtitle download failed: {0}")]
    Download(String),

    #[error("could not launch the subtitle downloader: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Downloads one caption track for a video.
#[async_trait]
pub trait SubtitleFetcher: Send + Sync {
    /// Write the `tier` caption track for `video` in language `lang` into
    /// `dest`. `Ok(None)` means the track does not exist.
    async fn fetch(
        &self,
        video: &VideoRef,
        lang: &str,
        tier: CaptionTier,
        dest: &Path,
    ) -> Result<Option<CaptionFile>, AcquireError>;
}

/// Fetch and clean the subtitles of `video`, falling back from official to
/// auto-generated captions. Each fetch is bounded by `limit`; running over it
/// ends the acquisition instead of moving to the next tier.
pub async fn acquire_subtitles(
    fetcher: &dyn SubtitleFetcher,
    video: &VideoRef,
    lang: &str,
    limit: Duration,
) -> Result<Subtitles, AcquireError> {
    trace!("acquire_subtitles(video={}, lang={lang})", video.id());
    let workdir = tempfile::Builder::new().prefix("animejp-").tempdir()?;
    debug!("caption workdir {}", workdir.path().display());

    for tier in CaptionTier::ORDER {
        let dest = workdir.path().join(tier.dir_name());
        tokio::fs::create_dir_all(&dest).await?;
        let fetched = match tokio::time::timeout(limit, fetcher.fetch(video, lang, tier, &dest)).await
        {
            Ok(res) => res,
            Err(_) => {
                warn!("{tier} caption download for {} exceeded {limit:?}", video.id());
                return Err(AcquireError::Timeout(limit));
            }
        };
        let file = match fetched {
            Ok(Some(file)) => file,
            Ok(None) => {
                info!("no {tier} {lang} captions for {}", video.id());
                continue;
            }
            Err(AcquireError::Download(reason)) => {
                warn!("{tier} caption download failed: {reason}");
                continue;
            }
            Err(err) => return Err(err),
        };

        let raw = tokio::fs::read(&file.path).await?;
        let text = subtitle::clean(&String::from_utf8_lossy(&raw));
        if text.is_empty() {
            warn!("{tier} caption file {} had no text", file.path.display());
            continue;
        }
        let title = file
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| video.id().to_string());
        info!(
            "using {tier} captions for {} ({} chars)",
            video.id(),
            text.chars().count()
        );
        return Ok(Subtitles { text, title, tier });
    }

    Err(AcquireError::NotFound {
        video: video.id().to_string(),
        lang: lang.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::{Arc, Mutex};

    const VTT: &str = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n断念する\n\n00:00:02.000 --> 00:00:03.000\n断念する\n";

    enum Reply {
        File(&'static str, Option<&'static str>),
        Missing,
        Fail,
        Hang,
    }

    /// Scripted fetcher that records which tiers were asked and where.
    struct ScriptedFetcher {
        replies: HashMap<&'static str, Reply>,
        calls: Arc<Mutex<Vec<(CaptionTier, PathBuf)>>>,
    }

    impl ScriptedFetcher {
        fn new(official: Reply, auto: Reply) -> Self {
            let mut replies = HashMap::new();
            replies.insert("official", official);
            replies.insert("auto-generated", auto);
            Self {
                replies,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn tiers(&self) -> Vec<CaptionTier> {
            self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }

        fn dirs(&self) -> Vec<PathBuf> {
            self.calls.lock().unwrap().iter().map(|(_, d)| d.clone()).collect()
        }
    }

    #[async_trait]
    impl SubtitleFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            _video: &VideoRef,
            _lang: &str,
            tier: CaptionTier,
            dest: &Path,
        ) -> Result<Option<CaptionFile>, AcquireError> {
            self.calls.lock().unwrap().push((tier, dest.to_path_buf()));
            match &self.replies[tier.as_str()] {
                Reply::File(body, title) => {
                    let path = dest.join("clip.ja.vtt");
                    fs::write(&path, body)?;
                    Ok(Some(CaptionFile {
                        path,
                        title: title.map(str::to_string),
                    }))
                }
                Reply::Missing => Ok(None),
                Reply::Fail => Err(AcquireError::Download("HTTP Error 403".into())),
                Reply::Hang => {
                    fs::write(dest.join("partial.vtt.part"), "WEBVTT")?;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(None)
                }
            }
        }
    }

    fn video() -> VideoRef {
        VideoRef::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn uses_official_captions_first() {
        let fetcher = ScriptedFetcher::new(
            Reply::File(VTT, Some("葬送のフリーレン 第1話")),
            Reply::File("WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n別\n", None),
        );
        let subs = acquire_subtitles(&fetcher, &video(), "ja", DEFAULT_DOWNLOAD_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(subs.tier, CaptionTier::Official);
        assert_eq!(subs.text, "断念する");
        assert_eq!(subs.title, "葬送のフリーレン 第1話");
        assert_eq!(fetcher.tiers(), vec![CaptionTier::Official]);
    }

    #[tokio::test]
    async fn falls_back_to_auto_generated_captions() {
        let fetcher = ScriptedFetcher::new(Reply::Missing, Reply::File(VTT, None));
        let subs = acquire_subtitles(&fetcher, &video(), "ja", DEFAULT_DOWNLOAD_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(subs.tier, CaptionTier::AutoGenerated);
        assert_eq!(subs.title, "dQw4w9WgXcQ");
        assert_eq!(
            fetcher.tiers(),
            vec![CaptionTier::Official, CaptionTier::AutoGenerated]
        );
    }

    #[tokio::test]
    async fn download_error_falls_through_to_next_tier() {
        let fetcher = ScriptedFetcher::new(Reply::Fail, Reply::File(VTT, Some("title")));
        let subs = acquire_subtitles(&fetcher, &video(), "ja", DEFAULT_DOWNLOAD_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(subs.tier, CaptionTier::AutoGenerated);
    }

    #[tokio::test]
    async fn empty_caption_file_counts_as_missing() {
        let fetcher = ScriptedFetcher::new(Reply::File("WEBVTT\n\n", None), Reply::Missing);
        let err = acquire_subtitles(&fetcher, &video(), "ja", DEFAULT_DOWNLOAD_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::NotFound { .. }));
    }

    #[tokio::test]
    async fn reports_not_found_when_both_tiers_fail() {
        let fetcher = ScriptedFetcher::new(Reply::Missing, Reply::Fail);
        let err = acquire_subtitles(&fetcher, &video(), "ja", DEFAULT_DOWNLOAD_TIMEOUT)
            .await
            .unwrap_err();
        match err {
            AcquireError::NotFound { video, lang } => {
                assert_eq!(video, "dQw4w9WgXcQ");
                assert_eq!(lang, "ja");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn timeout_stops_acquisition_and_removes_files() {
        let fetcher = ScriptedFetcher::new(Reply::Hang, Reply::File(VTT, None));
        let err = acquire_subtitles(&fetcher, &video(), "ja", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Timeout(_)));
        assert_eq!(fetcher.tiers(), vec![CaptionTier::Official]);
        let dir = &fetcher.dirs()[0];
        assert!(!dir.exists());
        assert!(!dir.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn workdir_is_removed_after_success() {
        let fetcher = ScriptedFetcher::new(Reply::File(VTT, None), Reply::Missing);
        acquire_subtitles(&fetcher, &video(), "ja", DEFAULT_DOWNLOAD_TIMEOUT)
            .await
            .unwrap();
        let dir = &fetcher.dirs()[0];
        assert!(!dir.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn each_request_gets_its_own_workdir() {
        let first = ScriptedFetcher::new(Reply::File(VTT, None), Reply::Missing);
        let second = ScriptedFetcher::new(Reply::File(VTT, None), Reply::Missing);
        let video = video();
        let (a, b) = tokio::join!(
            acquire_subtitles(&first, &video, "ja", DEFAULT_DOWNLOAD_TIMEOUT),
            acquire_subtitles(&second, &video, "ja", DEFAULT_DOWNLOAD_TIMEOUT)
        );
        a.unwrap();
        b.unwrap();
        assert_ne!(first.dirs()[0], second.dirs()[0]);
    }
}
