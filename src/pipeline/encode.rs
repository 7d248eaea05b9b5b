//! Binary encoding: image bytes → base64 for the JSON request body.
//!
//! Multimodal completion APIs accept images as base64 data-URIs embedded in
//! the request JSON. The encoding is deterministic and pure given the same
//! bytes; the only failure mode is a failed read when the image comes from
//! disk, which is propagated as [`IngestError::EncodingFailed`] without
//! retry — file reads are not flaky in a way that benefits from retrying.

use crate::error::IngestError;
use crate::record::{ExtractionRequest, StagedImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Build the one-shot extraction request from a staged image.
///
/// Suspends until the payload is fully encoded; with in-memory bytes this
/// is effectively synchronous, the `async` keeps the stage signature
/// uniform with the file-reading path below.
pub async fn encode(image: &StagedImage) -> Result<ExtractionRequest, IngestError> {
    if image.bytes.is_empty() {
        return Err(IngestError::EncodingFailed {
            detail: "staged image has no bytes".into(),
        });
    }
    let b64 = STANDARD.encode(&image.bytes);
    debug!("encoded image → {} bytes base64", b64.len());
    Ok(ExtractionRequest {
        image_base64: b64,
        mime: image.mime.clone(),
        instruction: crate::prompts::USER_INSTRUCTION.to_string(),
    })
}

/// Read an image file from disk into a [`StagedImage`] (CLI path).
///
/// The MIME type is derived from the extension; unknown extensions are
/// rejected the same way the drop zone rejects a non-image.
pub async fn read_image_file(path: &Path) -> Result<StagedImage, IngestError> {
    let mime = mime_from_extension(path).ok_or_else(|| IngestError::InvalidFileType {
        mime: format!(
            "unknown ({})",
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("no extension")
        ),
    })?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| IngestError::EncodingFailed {
            detail: format!("{}: {e}", path.display()),
        })?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    Ok(StagedImage {
        filename,
        mime: mime.to_string(),
        bytes,
    })
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Some("image/png"),
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        Some("gif") => Some("image/gif"),
        _ => None,
    }
}
