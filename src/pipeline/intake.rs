//! Upload intake: MIME validation and object-key hygiene.
//!
//! Validation happens on the *declared* type, before any bytes are touched,
//! so a mis-dropped PDF is rejected with a typed error instead of surfacing
//! later as a confusing upstream failure. Content sniffing is deliberately
//! out: the vision endpoint sees the declared MIME in the data URI and is
//! the final arbiter of whether the bytes decode.

use crate::error::IngestError;
use tracing::debug;

/// Accept only files whose declared type indicates an image.
pub fn validate_mime(mime: &str) -> Result<(), IngestError> {
    if mime.starts_with("image/") {
        debug!(mime, "file type accepted");
        Ok(())
    } else {
        Err(IngestError::InvalidFileType {
            mime: mime.to_string(),
        })
    }
}

/// Sanitize an original filename for use inside an object key.
///
/// Keeps alphanumerics, `.`, `-` and `_`; everything else (path separators,
/// spaces, emoji) becomes `_`. An empty or fully-scrubbed name falls back
/// to `upload`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
