//! Data model: the four shapes an upload passes through.
//!
//! [`StagedImage`] → [`ExtractionRequest`] → [`ExtractionResult`] →
//! [`ContentRecord`], one-to-one at each step. The first two are transient
//! and never persisted; `ExtractionResult` lives in session state until the
//! user confirms or discards; `ContentRecord` is the durable row, created
//! exactly once per confirmed save and never updated by this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caption length at which the derived title is cut.
pub const TITLE_MAX_CHARS: usize = 50;

/// Title used when the extracted caption is empty.
pub const FALLBACK_TITLE: &str = "Instagram post";

/// An accepted image awaiting analysis. Exactly one may be staged per
/// session; the bytes stay in memory end to end (screenshots are small,
/// and the storage bucket caps objects at 5 MiB anyway).
#[derive(Debug, Clone)]
pub struct StagedImage {
    /// Original filename as supplied by the browser/CLI.
    pub filename: String,
    /// Declared MIME type, e.g. `image/png`. Validated at intake.
    pub mime: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

/// A one-shot request to the vision endpoint. Built from a [`StagedImage`],
/// consumed exactly once, never persisted.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Base64-encoded image payload (standard alphabet, padded).
    pub image_base64: String,
    /// MIME type used to form the `data:` URI.
    pub mime: String,
    /// Fixed instruction text sent as the user turn.
    pub instruction: String,
}

impl ExtractionRequest {
    /// The inline `data:` URI the completion API expects.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.image_base64)
    }
}

/// The normalized output of analysis.
///
/// Every field is present and type-correct regardless of what the upstream
/// model returned — the normalizer resolves malformed or missing fields to
/// these defaults, never to null or wrong-typed values. Wire names are
/// camelCase to match the extraction contract (`postedDate` etc.).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionResult {
    pub caption: String,
    pub likes: u32,
    pub comments: u32,
    pub username: String,
    /// Free-form date string as the model reported it (often an estimate).
    pub posted_date: String,
    pub hashtags: Vec<String>,
}

/// Like/comment counts carried on a [`ContentRecord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: u32,
    pub comments: u32,
}

/// The durable row representing one captured piece of social content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Caption truncated to [`TITLE_MAX_CHARS`] with an ellipsis marker,
    /// or [`FALLBACK_TITLE`] if the caption is empty.
    pub title: String,
    /// Full caption text.
    pub content: String,
    /// Fixed to `"instagram"` for this pipeline.
    pub platform: String,
    /// Public URL of the uploaded screenshot.
    pub image_url: String,
    /// Link back to the original post, when the caller knows it.
    pub original_post_url: Option<String>,
    pub username: String,
    pub hashtags: Vec<String>,
    /// Extracted posted date if present, else the time of capture.
    pub published_at: DateTime<Utc>,
    pub engagement: Engagement,
}

impl ContentRecord {
    /// Build the record for a confirmed save.
    ///
    /// `posted_date` strings the model produced are frequently estimates
    /// ("2 days ago", "May 2024"); only clean RFC 3339 / date values parse,
    /// anything else falls back to `now` rather than failing the save.
    pub fn from_extraction(
        extraction: &ExtractionResult,
        image_url: String,
        original_post_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        ContentRecord {
            title: derive_title(&extraction.caption),
            content: extraction.caption.clone(),
            platform: "instagram".to_string(),
            image_url,
            original_post_url,
            username: extraction.username.clone(),
            hashtags: extraction.hashtags.clone(),
            published_at: parse_posted_date(&extraction.posted_date).unwrap_or(now),
            engagement: Engagement {
                likes: extraction.likes,
                comments: extraction.comments,
            },
        }
    }
}

/// Derive the record title from a caption: first [`TITLE_MAX_CHARS`]
/// characters plus `...` if truncated, or [`FALLBACK_TITLE`] when empty.
///
/// Counts characters, not bytes, so multi-byte captions never split a
/// code point.
pub fn derive_title(caption: &str) -> String {
    if caption.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    let mut chars = caption.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Parse a model-reported posted date, accepting RFC 3339 timestamps and
/// bare `YYYY-MM-DD` dates (read as midnight UTC). Returns `None` for
/// everything else, including the empty string.
fn parse_posted_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
}
