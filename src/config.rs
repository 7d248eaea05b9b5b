//! Configuration for the ingestion pipeline.
//!
//! All behaviour is controlled through [`IngestConfig`], built via its
//! [`IngestConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across sessions and diff two runs to understand
//! why their outputs differ.
//!
//! # Design choice: builder over constructor
//! Callers set only what they care about and rely on documented defaults
//! for the rest; adding a knob later does not break any call site.

use crate::error::IngestError;
use crate::pipeline::vision::VisionProvider;
use std::fmt;
use std::sync::Arc;

/// Default bucket the original screenshots are uploaded to.
pub const DEFAULT_BUCKET: &str = "content-images";

/// Storage cap per uploaded object: 5 MiB.
pub const MAX_OBJECT_BYTES: u64 = 5 * 1024 * 1024;

/// Configuration for screenshot ingestion.
///
/// Built via [`IngestConfig::builder()`] or [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use snap2post::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .model("gpt-4o")
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Vision model identifier. Default: `"gpt-4o"`.
    ///
    /// The extraction prompt asks for structured JSON from a screenshot,
    /// which needs a model that reads small UI text reliably. Smaller
    /// vision models misread like/comment counts often enough to matter.
    pub model: String,

    /// Base URL of the OpenAI-compatible completion API.
    /// Default: `https://api.openai.com/v1`.
    pub api_base_url: String,

    /// Per-call timeout for the vision request in seconds. Default: 60.
    ///
    /// The call is single-shot with no retry, so the timeout is the only
    /// bound on how long a stuck upstream can hold a session in
    /// `Analyzing`.
    pub api_timeout_secs: u64,

    /// Maximum tokens the model may generate. Default: 1024.
    ///
    /// A full extraction (caption, counts, hashtags) fits comfortably in a
    /// few hundred tokens; 1024 leaves headroom for long captions without
    /// letting a rambling completion run up cost.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction is transcription, not generation — low temperature keeps
    /// the model faithful to what is on screen.
    pub temperature: f32,

    /// Object-storage bucket for uploaded screenshots.
    /// Default: [`DEFAULT_BUCKET`].
    pub bucket: String,

    /// Pre-constructed vision provider. When set, takes precedence over
    /// building one from the environment. Useful in tests or when the
    /// caller needs custom middleware.
    pub provider: Option<Arc<dyn VisionProvider>>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_timeout_secs: 60,
            max_tokens: 1024,
            temperature: 0.1,
            bucket: DEFAULT_BUCKET.to_string(),
            provider: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("bucket", &self.bucket)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn VisionProvider>"))
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn bucket(mut self, name: impl Into<String>) -> Self {
        self.config.bucket = name.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.model.is_empty() {
            return Err(IngestError::InvalidConfig("model must not be empty".into()));
        }
        if c.bucket.is_empty() {
            return Err(IngestError::InvalidConfig(
                "bucket name must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(IngestError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = IngestConfig::builder().build().unwrap();
        assert_eq!(c.model, "gpt-4o");
        assert_eq!(c.bucket, DEFAULT_BUCKET);
        assert_eq!(c.api_timeout_secs, 60);
    }

    #[test]
    fn empty_bucket_rejected() {
        let err = IngestConfig::builder().bucket("").build().unwrap_err();
        assert!(err.to_string().contains("bucket"));
    }

    #[test]
    fn timeout_floor_is_one_second() {
        let c = IngestConfig::builder().api_timeout_secs(0).build().unwrap();
        assert_eq!(c.api_timeout_secs, 1);
    }

    #[test]
    fn temperature_is_clamped() {
        let c = IngestConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}
