//! Error types for the snap2post library.
//!
//! Every failure the pipeline can produce is a value of [`IngestError`];
//! nothing panics in non-test code. The taxonomy mirrors the five user-facing
//! failure classes of the pipeline (bad file, unreadable bytes, upstream call
//! failed, completion not JSON-recoverable, save failed) plus the
//! configuration and session-guard errors around them.
//!
//! Two variants deserve special mention:
//!
//! * [`IngestError::UnparsableExtraction`] carries the **raw completion
//!   text**. Silent data loss at the model boundary is the single biggest
//!   risk to data quality, so the unusable text must stay retrievable for
//!   operator diagnosis rather than being swallowed into a generic message.
//!
//! * [`IngestError::PersistFailed`] names the [`PersistStage`] that failed,
//!   so "the bucket could not be created" and "the row insert was rejected"
//!   are distinguishable without parsing message strings.

use thiserror::Error;

/// The save step that failed inside [`IngestError::PersistFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStage {
    /// Bucket existence check or lazy creation failed.
    Bucket,
    /// Uploading the image bytes to object storage failed.
    Upload,
    /// Inserting the content record failed. The uploaded object may be
    /// orphaned; the save is still reported as failed.
    Insert,
}

impl std::fmt::Display for PersistStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PersistStage::Bucket => "bucket-creation",
            PersistStage::Upload => "upload",
            PersistStage::Insert => "insert",
        };
        f.write_str(s)
    }
}

/// All errors returned by the snap2post library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The dropped/selected file is not an image.
    #[error("File type '{mime}' is not an image. Drop a screenshot (PNG or JPEG).")]
    InvalidFileType { mime: String },

    /// The staged image bytes could not be read.
    #[error("Failed to read image bytes: {detail}")]
    EncodingFailed { detail: String },

    // ── Analysis errors ───────────────────────────────────────────────────
    /// The vision endpoint could not be called, refused the call, or
    /// returned no completion text. One variant covers all three: the
    /// caller only needs "call failed" vs "call succeeded but the text was
    /// unusable" ([`IngestError::UnparsableExtraction`]).
    #[error("Image analysis failed: {detail}")]
    AnalysisFailed { detail: String },

    /// The completion arrived but was not JSON-recoverable after
    /// fence-stripping. `raw` holds the full completion text for diagnosis.
    #[error("Could not parse Instagram content from the model response")]
    UnparsableExtraction { raw: String },

    // ── Persistence errors ────────────────────────────────────────────────
    /// A save step failed; `stage` identifies which one.
    #[error("Save failed during {stage}: {detail}")]
    PersistFailed {
        stage: PersistStage,
        detail: String,
    },

    // ── Session-guard errors ──────────────────────────────────────────────
    /// An analyze/save was requested while another is in flight, or from a
    /// state that does not allow it.
    #[error("Session is {state}; wait for the in-flight operation or reset")]
    SessionBusy { state: &'static str },

    /// Analyze or save was requested with no image staged.
    #[error("No image staged. Drop a screenshot first.")]
    NoStagedImage,

    // ── Config errors ─────────────────────────────────────────────────────
    /// The vision provider cannot be constructed (missing API key etc.).
    /// In the extraction proxy this is a startup-time error, reported with
    /// a 5xx distinct from a normal analysis failure.
    #[error("Vision provider is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// The raw completion text, when this error retains one.
    ///
    /// Only [`IngestError::UnparsableExtraction`] carries it.
    pub fn raw_completion(&self) -> Option<&str> {
        match self {
            IngestError::UnparsableExtraction { raw } => Some(raw),
            _ => None,
        }
    }
}
