//! Vision extraction client: the single-shot multimodal completion call.
//!
//! This stage is intentionally thin — all prompt text lives in
//! [`crate::prompts`] and all response interpretation in
//! [`crate::pipeline::normalize`], so the network boundary here carries no
//! policy of its own.
//!
//! ## No retries, by contract
//!
//! The call is one-shot: transport failure, a non-2xx status, and a 2xx
//! with no completion text all collapse into
//! [`IngestError::AnalysisFailed`]. A failed attempt is terminal until the
//! user explicitly retries; the session state machine is what makes the
//! retry safe.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::prompts::SYSTEM_PROMPT;
use crate::record::ExtractionRequest;
use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Seam for the remote vision model. Tests substitute a stub; production
/// uses [`OpenAiVision`].
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Send one extraction request; return the raw completion text.
    async fn complete(&self, request: &ExtractionRequest) -> Result<String, IngestError>;
}

/// [`VisionProvider`] backed by an OpenAI-compatible `/chat/completions`
/// endpoint.
pub struct OpenAiVision {
    client: reqwest::Client,
    api_base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

// The API key never appears in Debug output.
impl fmt::Debug for OpenAiVision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiVision")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiVision {
    /// Build a client from the config plus an explicit API key.
    pub fn new(config: &IngestConfig, api_key: impl Into<String>) -> Result<Self, IngestError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(IngestError::ProviderNotConfigured {
                hint: "The vision API key is empty.".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| IngestError::Internal(format!("http client: {e}")))?;

        Ok(OpenAiVision {
            client,
            api_base_url: config.api_base_url.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Build a client reading `OPENAI_API_KEY` from the environment.
    ///
    /// A missing key is a configuration error, reported before any request
    /// is attempted — never a per-request failure.
    pub fn from_env(config: &IngestConfig) -> Result<Self, IngestError> {
        let key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if key.is_empty() {
            return Err(IngestError::ProviderNotConfigured {
                hint: "Set OPENAI_API_KEY in the environment.".into(),
            });
        }
        Self::new(config, key)
    }
}

#[async_trait]
impl VisionProvider for OpenAiVision {
    async fn complete(&self, request: &ExtractionRequest) -> Result<String, IngestError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": request.instruction },
                        { "type": "image_url", "image_url": { "url": request.data_uri() } }
                    ]
                }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        debug!(model = %self.model, "vision request → {}/chat/completions", self.api_base_url);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| IngestError::AnalysisFailed {
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "vision endpoint refused the call");
            return Err(IngestError::AnalysisFailed {
                detail: format!("HTTP {status}: {}", truncate_for_log(&body)),
            });
        }

        let payload: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| IngestError::AnalysisFailed {
                    detail: format!("malformed response body: {e}"),
                })?;

        extract_completion_text(&payload)
    }
}

/// Pull `choices[0].message.content` out of the response, treating an
/// absent or empty completion as a failure rather than an empty result.
fn extract_completion_text(payload: &serde_json::Value) -> Result<String, IngestError> {
    let text = payload["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("");
    if text.is_empty() {
        return Err(IngestError::AnalysisFailed {
            detail: "completion contained no text".into(),
        });
    }
    Ok(text.to_string())
}

fn truncate_for_log(s: &str) -> &str {
    // Error bodies can embed the whole request; keep log lines bounded.
    match s.char_indices().nth(300) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
