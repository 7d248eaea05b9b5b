//! # snap2post
//!
//! Capture Instagram posts from screenshots using Vision Language Models.
//!
//! ## Why this crate?
//!
//! Restaurants keep their social history in screenshots. Retyping captions
//! and engagement counts into a content library is slow and error-prone, so
//! this crate lets a vision model read the screenshot instead — and then
//! treats the model's answer as the untrusted input it is: captions,
//! like/comment counts, usernames, and hashtags are recovered through a
//! tolerant JSON normalizer that never lets a malformed field past the
//! type boundary.
//!
//! ## Pipeline Overview
//!
//! ```text
//! screenshot
//!  │
//!  ├─ 1. Intake     validate MIME, stage bytes, preview locator
//!  ├─ 2. Encode     image bytes → base64 data-URI payload
//!  ├─ 3. Vision     single-shot multimodal completion call
//!  ├─ 4. Normalize  fence-strip → strict parse → per-field coercion
//!  │                     (user reviews / edits here)
//!  └─ 5. Persist    bucket ensure → upload → public URL → record insert
//! ```
//!
//! Steps 1–4 run automatically on drop ([`Ingestor::analyze`]); step 5 runs
//! on explicit confirmation ([`Ingestor::save`]). One [`UploadSession`]
//! tracks the lifecycle; failures keep the session retryable and never
//! clear it behind the user's back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snap2post::{FileUpload, IngestConfig, Ingestor, UploadSession};
//! use snap2post::store::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     // Vision provider resolved from OPENAI_API_KEY
//!     let ingestor = Ingestor::from_config(
//!         IngestConfig::default(),
//!         store.clone(),
//!         store,
//!     )?;
//!
//!     let mut session = UploadSession::new();
//!     session.accept(FileUpload {
//!         filename: "brunch.png".into(),
//!         mime: "image/png".into(),
//!         bytes: std::fs::read("brunch.png")?,
//!     })?;
//!
//!     let extraction = ingestor.analyze(&mut session).await?;
//!     println!("{} likes on: {}", extraction.likes, extraction.caption);
//!
//!     let record = ingestor.save(&mut session, None).await?;
//!     println!("saved: {}", record.title);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `snap2post` binary (clap + anyhow + tracing-subscriber) |
//! | `proxy` | off     | Enables the CORS extraction proxy (axum + tower-http) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! snap2post = { version = "0.2", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod session;
pub mod store;

#[cfg(feature = "proxy")]
pub mod proxy;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{IngestConfig, IngestConfigBuilder, DEFAULT_BUCKET, MAX_OBJECT_BYTES};
pub use error::{IngestError, PersistStage};
pub use ingest::Ingestor;
pub use pipeline::normalize::{display_hashtag, normalize};
pub use pipeline::vision::{OpenAiVision, VisionProvider};
pub use record::{ContentRecord, Engagement, ExtractionRequest, ExtractionResult, StagedImage};
pub use session::{FileUpload, SessionState, UploadSession};
pub use store::{BucketSpec, ContentStore, ObjectStore};
