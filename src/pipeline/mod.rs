//! Pipeline stages for screenshot-to-record ingestion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different storage backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ encode ──▶ vision ──▶ normalize ──▶ persist
//! (MIME)    (base64)   (VLM call)  (JSON airlock)  (bucket + row)
//! ```
//!
//! 1. [`intake`]    — validate the declared MIME type and stage the file
//! 2. [`encode`]    — base64-wrap the image bytes for the JSON request body
//! 3. [`vision`]    — the single-shot multimodal completion call; the only
//!    stage with network I/O before the save
//! 4. [`normalize`] — the airlock between untrusted free text and the typed
//!    [`crate::record::ExtractionResult`]
//! 5. [`persist`]   — bucket ensure → upload → public URL → record insert,
//!    each failure tagged with its stage

pub mod encode;
pub mod intake;
pub mod normalize;
pub mod persist;
pub mod vision;
