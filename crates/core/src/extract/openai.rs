//! OpenAI-compatible chat completions backend.
//! This uses JSON mode so the reply is a bare JSON object.

use super::{error_for_status, LanguageModel, ModelError};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Language model that delegates to the OpenAI chat completion API.
pub struct OpenAiModel {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiModel {
    pub fn new(
        api_base: &str,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", api_base.trim_end_matches('/')),
            model: model.into(),
            max_tokens,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ModelError> {
        Self::new(
            &config.api_base,
            config.model.clone(),
            config.max_tokens,
            config.request_timeout,
        )
    }

    /// Send a JSON body to the chat completions endpoint and return the JSON response.
    async fn post_chat(&self, api_key: &str, body: Value) -> Result<Value, ModelError> {
        debug!("POST {} model={}", self.endpoint, self.model);
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let resp = error_for_status(resp).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(
        &self,
        api_key: &str,
        system: &str,
        user: &str,
    ) -> Result<String, ModelError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        let value = self.post_chat(api_key, body).await?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ModelError::EmptyReply)?;
        Ok(content.to_string())
    }
}
