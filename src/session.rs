//! Upload session: explicit state for one screenshot capture.
//!
//! The source UI kept this as scattered component-local variables; here the
//! whole lifecycle is one value passed into each pipeline stage — no
//! implicit shared mutation. The state machine:
//!
//! ```text
//! Empty ─accept→ Staged ─analyze→ Analyzing ─→ Analyzed | AnalysisFailed
//!                  ▲                               │ (retry analyze / edit)
//!                  │                               ▼
//!                  └────── remove() ── Saving ─→ Saved | SaveFailed
//! ```
//!
//! `Saved` and the failure states return to `Empty` only on explicit
//! `remove()` — the session never auto-clears after a failure, so the user
//! can retry without re-uploading.
//!
//! The preview locator stands in for a browser object-URL: a revocable
//! handle to the staged bytes. At most one is outstanding per session;
//! accepting a new file revokes the old one first, and `remove()` revokes
//! unconditionally (idempotent).

use crate::error::IngestError;
use crate::record::{ExtractionResult, StagedImage};
use tracing::debug;
use uuid::Uuid;

/// Where the session is in the capture lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No image staged.
    #[default]
    Empty,
    /// An image is staged and ready to analyze.
    Staged,
    /// The vision call is in flight. No re-submission allowed.
    Analyzing,
    /// Analysis produced an [`ExtractionResult`]; awaiting confirm/edit.
    Analyzed,
    /// Analysis failed; the staged image is kept for retry.
    AnalysisFailed,
    /// The save is in flight. No re-submission allowed.
    Saving,
    /// The record was persisted. Reset with `remove()` to start over.
    Saved,
    /// The save failed; extraction and image are kept for retry.
    SaveFailed,
}

impl SessionState {
    /// Short lowercase name, used in `SessionBusy` errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Staged => "staged",
            SessionState::Analyzing => "analyzing",
            SessionState::Analyzed => "analyzed",
            SessionState::AnalysisFailed => "analysis-failed",
            SessionState::Saving => "saving",
            SessionState::Saved => "saved",
            SessionState::SaveFailed => "save-failed",
        }
    }

    /// True while a network operation is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, SessionState::Analyzing | SessionState::Saving)
    }
}

/// A file as handed over by the drop zone or file picker.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Revocable locator for the staged image preview.
///
/// The locator string is only meaningful while the handle is held by the
/// session; revocation drops the handle, after which the locator resolves
/// to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    locator: String,
}

impl PreviewHandle {
    fn new() -> Self {
        PreviewHandle {
            locator: format!("preview://{}", Uuid::new_v4()),
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

/// One upload session. Owns the staged image, its preview locator, and the
/// extraction result between analysis and save.
#[derive(Debug, Default)]
pub struct UploadSession {
    state: SessionState,
    image: Option<StagedImage>,
    preview: Option<PreviewHandle>,
    extraction: Option<ExtractionResult>,
}

impl UploadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn image(&self) -> Option<&StagedImage> {
        self.image.as_ref()
    }

    /// Locator of the current preview, if an image is staged.
    pub fn preview(&self) -> Option<&str> {
        self.preview.as_ref().map(PreviewHandle::locator)
    }

    pub fn extraction(&self) -> Option<&ExtractionResult> {
        self.extraction.as_ref()
    }

    /// Mutable access for user edits between analysis and save.
    pub fn extraction_mut(&mut self) -> Option<&mut ExtractionResult> {
        self.extraction.as_mut()
    }

    /// Accept a dropped/picked file into the session.
    ///
    /// Rejects non-images. Replaces any previously staged image, revoking
    /// its preview locator first so only one locator is ever outstanding.
    /// Not allowed while an operation is in flight.
    pub fn accept(&mut self, file: FileUpload) -> Result<(), IngestError> {
        if self.state.is_busy() {
            return Err(IngestError::SessionBusy {
                state: self.state.name(),
            });
        }
        crate::pipeline::intake::validate_mime(&file.mime)?;

        // Revoke before replacing: the old locator must die with its image.
        self.revoke_preview();
        self.extraction = None;
        self.image = Some(StagedImage {
            filename: file.filename,
            mime: file.mime,
            bytes: file.bytes,
        });
        self.preview = Some(PreviewHandle::new());
        self.state = SessionState::Staged;
        debug!(preview = self.preview(), "image staged");
        Ok(())
    }

    /// Clear the session: revoke the preview, drop the image and any
    /// extraction, return to `Empty`. Idempotent — safe with no image
    /// staged. The one escape hatch from every terminal state.
    pub fn remove(&mut self) {
        self.revoke_preview();
        self.image = None;
        self.extraction = None;
        self.state = SessionState::Empty;
    }

    fn revoke_preview(&mut self) {
        if let Some(p) = self.preview.take() {
            debug!(locator = p.locator(), "preview revoked");
        }
    }

    // ── Transitions driven by the Ingestor ────────────────────────────────
    // Crate-private: external callers move the session only through
    // `accept`/`remove` and the Ingestor's analyze/save.

    pub(crate) fn begin_analyzing(&mut self) -> Result<(), IngestError> {
        match self.state {
            SessionState::Staged | SessionState::Analyzed | SessionState::AnalysisFailed => {
                self.state = SessionState::Analyzing;
                Ok(())
            }
            SessionState::Empty => Err(IngestError::NoStagedImage),
            s => Err(IngestError::SessionBusy { state: s.name() }),
        }
    }

    pub(crate) fn finish_analyzing(&mut self, result: Result<ExtractionResult, IngestError>)
        -> Result<ExtractionResult, IngestError>
    {
        match result {
            Ok(extraction) => {
                self.extraction = Some(extraction.clone());
                self.state = SessionState::Analyzed;
                Ok(extraction)
            }
            Err(e) => {
                self.extraction = None;
                self.state = SessionState::AnalysisFailed;
                Err(e)
            }
        }
    }

    pub(crate) fn begin_saving(&mut self) -> Result<(), IngestError> {
        match self.state {
            SessionState::Analyzed | SessionState::SaveFailed => {
                self.state = SessionState::Saving;
                Ok(())
            }
            SessionState::Empty => Err(IngestError::NoStagedImage),
            s => Err(IngestError::SessionBusy { state: s.name() }),
        }
    }

    pub(crate) fn finish_saving(&mut self, ok: bool) {
        self.state = if ok {
            SessionState::Saved
        } else {
            SessionState::SaveFailed
        };
    }
}
