//! Process-wide settings, read once at startup and shared read-only.

use crate::acquire::DEFAULT_DOWNLOAD_TIMEOUT;
use crate::extract::{anthropic, openai, MAX_INPUT_CHARS};
use anyhow::{anyhow, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Hosted language model service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Anthropic,
    OpenAi,
}

impl Provider {
    pub fn key_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Anthropic => anthropic::DEFAULT_MODEL,
            Provider::OpenAi => openai::DEFAULT_MODEL,
        }
    }

    pub fn default_api_base(self) -> &'static str {
        match self {
            Provider::Anthropic => anthropic::DEFAULT_API_BASE,
            Provider::OpenAi => openai::DEFAULT_API_BASE,
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!("unknown provider `{other}` (expected anthropic or openai)")),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
        })
    }
}

#[derive(Clone)]
pub struct Config {
    pub provider: Provider,
    /// Default credential used when a request brings none.
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
    pub ytdlp_path: PathBuf,
    pub cookies_from_browser: Option<String>,
    pub subtitle_lang: String,
    pub download_timeout: Duration,
    pub max_input_chars: usize,
}

impl Config {
    /// Defaults for `provider`, with no credential.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            api_key: None,
            model: provider.default_model().to_string(),
            api_base: provider.default_api_base().to_string(),
            max_tokens: 4096,
            request_timeout: Duration::from_secs(120),
            ytdlp_path: PathBuf::from("yt-dlp"),
            cookies_from_browser: None,
            subtitle_lang: "ja".to_string(),
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            max_input_chars: MAX_INPUT_CHARS,
        }
    }

    /// Read the configuration from the environment. `provider` wins over
    /// `ANIMEJP_PROVIDER` when given.
    pub fn from_env(provider: Option<Provider>) -> Result<Self> {
        Self::from_lookup(provider, |name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable lookup.
    pub fn from_lookup<F>(provider: Option<Provider>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let provider = match provider {
            Some(p) => p,
            None => match get("ANIMEJP_PROVIDER") {
                Some(name) => name.parse().map_err(|e: String| anyhow!(e))?,
                None => Provider::default(),
            },
        };
        let mut config = Self::for_provider(provider);
        config.api_key = get(provider.key_var());
        if let Some(model) = get("ANIMEJP_MODEL") {
            config.model = model;
        }
        if let Some(base) = get("ANIMEJP_API_BASE") {
            config.api_base = base;
        }
        if let Some(path) = get("YTDLP_PATH") {
            config.ytdlp_path = PathBuf::from(path);
        }
        config.cookies_from_browser = get("ANIMEJP_COOKIES_BROWSER");
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_provider(Provider::default())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("ytdlp_path", &self.ytdlp_path)
            .field("cookies_from_browser", &self.cookies_from_browser)
            .field("subtitle_lang", &self.subtitle_lang)
            .field("download_timeout", &self.download_timeout)
            .field("max_input_chars", &self.max_input_chars)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_the_pipeline_limits() {
        let config = Config::default();
        assert_eq!(config.provider, Provider::Anthropic);
        assert_eq!(config.api_key, None);
        assert_eq!(config.download_timeout, Duration::from_secs(60));
        assert_eq!(config.max_input_chars, 8000);
        assert_eq!(config.subtitle_lang, "ja");
    }

    #[test]
    fn reads_key_for_selected_provider() {
        let vars = [
            ("ANTHROPIC_API_KEY", "sk-ant-1"),
            ("OPENAI_API_KEY", "sk-oai-2"),
            ("YTDLP_PATH", "/opt/bin/yt-dlp"),
        ];
        let config = Config::from_lookup(None, lookup(&vars)).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-ant-1"));
        assert_eq!(config.ytdlp_path, PathBuf::from("/opt/bin/yt-dlp"));

        let config = Config::from_lookup(Some(Provider::OpenAi), lookup(&vars)).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-oai-2"));
        assert_eq!(config.model, openai::DEFAULT_MODEL);
    }

    #[test]
    fn provider_comes_from_env_unless_overridden() {
        let vars = [("ANIMEJP_PROVIDER", "OpenAI"), ("ANIMEJP_MODEL", "gpt-4o")];
        let config = Config::from_lookup(None, lookup(&vars)).unwrap();
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.model, "gpt-4o");

        let config = Config::from_lookup(Some(Provider::Anthropic), lookup(&vars)).unwrap();
        assert_eq!(config.provider, Provider::Anthropic);

        assert!(Config::from_lookup(None, lookup(&[("ANIMEJP_PROVIDER", "llama")])).is_err());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = Config::from_lookup(None, lookup(&[("ANTHROPIC_API_KEY", "   ")])).unwrap();
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let mut config = Config::default();
        config.api_key = Some("sk-ant-secret".into());
        let shown = format!("{config:?}");
        assert!(!shown.contains("sk-ant-secret"));
        assert!(shown.contains("<redacted>"));
    }
}
