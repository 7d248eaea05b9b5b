//! Orchestration: drive one [`UploadSession`] through the pipeline.
//!
//! [`Ingestor`] owns the collaborators (vision provider, object store,
//! record store) and moves a session through its states. Two operations:
//!
//! * [`Ingestor::analyze`] — encode → vision call → normalize; runs
//!   automatically when the UI sees a drop.
//! * [`Ingestor::save`] — bucket ensure → upload → insert; runs only on
//!   explicit user confirmation.
//!
//! Both are single-flight per session: the state machine rejects re-entry
//! while a call is in flight, and neither operation retries internally —
//! a failure is terminal for that attempt and the user re-triggers it.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::pipeline::vision::{OpenAiVision, VisionProvider};
use crate::pipeline::{encode, normalize, persist};
use crate::record::{ContentRecord, ExtractionResult};
use crate::session::UploadSession;
use crate::store::{BucketSpec, ContentStore, ObjectStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives screenshot ingestion for any number of sessions.
pub struct Ingestor {
    provider: Arc<dyn VisionProvider>,
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn ContentStore>,
    config: IngestConfig,
    /// Set once the bucket is known to exist; later saves skip the check.
    bucket_ready: AtomicBool,
}

impl Ingestor {
    /// Build an ingestor with explicit collaborators.
    pub fn new(
        provider: Arc<dyn VisionProvider>,
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn ContentStore>,
        config: IngestConfig,
    ) -> Self {
        Ingestor {
            provider,
            objects,
            records,
            config,
            bucket_ready: AtomicBool::new(false),
        }
    }

    /// Build an ingestor from the config, resolving the vision provider:
    /// a pre-built `config.provider` wins, otherwise `OPENAI_API_KEY` is
    /// read from the environment.
    pub fn from_config(
        config: IngestConfig,
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn ContentStore>,
    ) -> Result<Self, IngestError> {
        let provider: Arc<dyn VisionProvider> = match config.provider.clone() {
            Some(p) => p,
            None => Arc::new(OpenAiVision::from_env(&config)?),
        };
        Ok(Self::new(provider, objects, records, config))
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Analyze the staged image: encode → vision call → normalize.
    ///
    /// On success the session holds the [`ExtractionResult`] and is
    /// `Analyzed`; on any failure it is `AnalysisFailed` with the staged
    /// image kept for an explicit retry. Returns the extraction so callers
    /// can render it immediately.
    pub async fn analyze(&self, session: &mut UploadSession) -> Result<ExtractionResult, IngestError> {
        session.begin_analyzing()?;
        let start = Instant::now();

        let result = self.run_analysis(session).await;
        match &result {
            Ok(_) => info!(elapsed_ms = start.elapsed().as_millis() as u64, "analysis complete"),
            Err(e) => warn!(error = %e, "analysis failed"),
        }
        session.finish_analyzing(result)
    }

    async fn run_analysis(&self, session: &UploadSession) -> Result<ExtractionResult, IngestError> {
        // begin_analyzing already guaranteed a staged image.
        let image = session.image().ok_or(IngestError::NoStagedImage)?;

        // ── Step 1: Encode ───────────────────────────────────────────────
        let request = encode::encode(image).await?;

        // ── Step 2: Vision call (single-shot) ────────────────────────────
        let completion = self.provider.complete(&request).await?;
        debug!(chars = completion.len(), "completion received");

        // ── Step 3: Normalize ────────────────────────────────────────────
        match normalize::normalize(&completion) {
            Ok(extraction) => Ok(extraction),
            Err(e) => {
                // The raw text is retained on the error; log it too so an
                // operator can diagnose without a debugger attached.
                if let Some(raw) = e.raw_completion() {
                    warn!(raw, "completion was not JSON-recoverable");
                }
                Err(e)
            }
        }
    }

    /// Persist the analyzed result on explicit user confirmation.
    ///
    /// `original_post_url` is an optional link back to the live post.
    pub async fn save(
        &self,
        session: &mut UploadSession,
        original_post_url: Option<String>,
    ) -> Result<ContentRecord, IngestError> {
        session.begin_saving()?;
        let result = self.run_save(session, original_post_url).await;
        session.finish_saving(result.is_ok());
        result
    }

    async fn run_save(
        &self,
        session: &UploadSession,
        original_post_url: Option<String>,
    ) -> Result<ContentRecord, IngestError> {
        let image = session.image().ok_or(IngestError::NoStagedImage)?;
        let extraction = session
            .extraction()
            .ok_or_else(|| IngestError::Internal("saving with no extraction".into()))?;

        // ── Step 1: Lazy bucket creation, memoized after first success ───
        if !self.bucket_ready.load(Ordering::Acquire) {
            let spec = BucketSpec::for_bucket(self.config.bucket.clone());
            persist::ensure_bucket(self.objects.as_ref(), &spec).await?;
            self.bucket_ready.store(true, Ordering::Release);
        }

        // ── Step 2: Upload + insert ──────────────────────────────────────
        persist::persist(
            self.objects.as_ref(),
            self.records.as_ref(),
            &self.config.bucket,
            image,
            extraction,
            original_post_url,
        )
        .await
    }
}
