//! Resilient JSON normalization: the airlock between untrusted model text
//! and the typed [`ExtractionResult`].
//!
//! ## Why is normalization necessary?
//!
//! The completion is **not guaranteed to be valid JSON** despite the prompt
//! demanding it. Even well-behaved models occasionally:
//!
//! - wrap the payload in ` ```json … ``` ` fences
//! - return likes as the string `"120"` instead of the number `120`
//! - drop `hashtags` entirely, or emit `null` where a string was asked for
//! - answer in prose ("Sorry, I cannot process this image.")
//!
//! The contract: fence-stripping and a strict parse decide whether the
//! text is usable at all; a parse failure is reported as
//! [`IngestError::UnparsableExtraction`] **carrying the raw text** — never
//! silently substituted with an empty result. Once parse succeeds,
//! coercion always succeeds: every field resolves to a typed value or its
//! default, and no null/wrong-typed value escapes this module.

use crate::error::IngestError;
use crate::record::ExtractionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Normalize a raw completion into an [`ExtractionResult`].
///
/// Fails only when the text is not JSON-recoverable after fence-stripping
/// (or parses to something other than an object — a bare string or number
/// has no fields to coerce and is treated as unusable, not as an empty
/// extraction).
pub fn normalize(raw: &str) -> Result<ExtractionResult, IngestError> {
    let stripped = strip_code_fences(raw.trim());

    let value: Value = match serde_json::from_str(stripped) {
        Ok(v) => v,
        Err(e) => {
            warn!("completion is not parseable JSON: {e}");
            return Err(IngestError::UnparsableExtraction {
                raw: raw.to_string(),
            });
        }
    };

    let Some(fields) = value.as_object() else {
        warn!("completion parsed but is not a JSON object");
        return Err(IngestError::UnparsableExtraction {
            raw: raw.to_string(),
        });
    };

    Ok(ExtractionResult {
        caption: coerce_string(fields.get("caption")),
        likes: coerce_count(fields.get("likes")),
        comments: coerce_count(fields.get("comments")),
        username: coerce_string(fields.get("username")),
        posted_date: coerce_string(fields.get("postedDate")),
        hashtags: coerce_hashtags(fields.get("hashtags")),
    })
}

// ── Fence stripping ──────────────────────────────────────────────────────
//
// A textual trim, not a Markdown parser: exactly one outer fence pair with
// an optional language tag. Fences *inside* the payload are left alone.

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9]*[ \t]*\n?(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> &str {
    match RE_OUTER_FENCES.captures(input) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(input),
        None => input,
    }
}

// ── Field coercion ───────────────────────────────────────────────────────

/// String if present, else `""`. Numbers, nulls, arrays: `""`.
fn coerce_string(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Non-negative integer from a number or numeric string, else 0.
///
/// Accepted: integers, non-negative finite floats (truncated), strings
/// that parse cleanly as an integer. Everything else — negatives,
/// partially-numeric strings like `"87 likes"`, locale-formatted
/// `"1,200"`, booleans, null — defaults to 0. The source left these cases
/// unspecified; rejecting to the default is the conservative reading, and
/// keeping the policy in this one function makes it a one-line change if
/// that reading turns out wrong.
fn coerce_count(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_u64() {
                u32::try_from(i).unwrap_or(u32::MAX)
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f >= 0.0 {
                    f.trunc().min(f64::from(u32::MAX)) as u32
                } else {
                    0
                }
            } else {
                0
            }
        }
        Some(Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) if i >= 0 => u32::try_from(i).unwrap_or(u32::MAX),
            _ => 0,
        },
        _ => 0,
    }
}

/// Sequence of strings if the value is array-like, else empty. Non-string
/// elements are skipped individually rather than discarding the array.
fn coerce_hashtags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Presentation helper: a hashtag with its leading `#`, added only when
/// absent. Normalization stores tags as received; the `#` is a display
/// concern.
pub fn display_hashtag(tag: &str) -> String {
    if tag.starts_with('#') {
        tag.to_string()
    } else {
        format!("#{tag}")
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn well_formed() -> &'static str {
        r#"{"caption":"Great night!","likes":87,"comments":3,"username":"chef_jane","postedDate":"2024-05-01","hashtags":["food","wine"]}"#
    }

    #[test]
    fn strict_json_passes_through_unchanged() {
        let r = normalize(well_formed()).unwrap();
        assert_eq!(
            r,
            ExtractionResult {
                caption: "Great night!".into(),
                likes: 87,
                comments: 3,
                username: "chef_jane".into(),
                posted_date: "2024-05-01".into(),
                hashtags: vec!["food".into(), "wine".into()],
            }
        );
    }

    #[test]
    fn fenced_text_equals_unfenced() {
        let unfenced = normalize(well_formed()).unwrap();
        for fenced in [
            format!("```json\n{}\n```", well_formed()),
            format!("```\n{}\n```", well_formed()),
            format!("```JSON\n{}\n```\n", well_formed()),
        ] {
            assert_eq!(normalize(&fenced).unwrap(), unfenced, "input: {fenced:?}");
        }
    }

    #[test]
    fn numeric_strings_become_integers() {
        let r = normalize(r#"{"likes":"42","comments":"7"}"#).unwrap();
        assert_eq!(r.likes, 42);
        assert_eq!(r.comments, 7);
    }

    #[test]
    fn missing_or_non_array_hashtags_default_empty() {
        for input in [
            r#"{"caption":"x"}"#,
            r#"{"hashtags":null}"#,
            r##"{"hashtags":"#food"}"##,
            r#"{"hashtags":42}"#,
        ] {
            let r = normalize(input).unwrap();
            assert!(r.hashtags.is_empty(), "input: {input}");
        }
    }

    #[test]
    fn non_string_hashtag_elements_are_skipped() {
        let r = normalize(r#"{"hashtags":["food",7,null,"wine"]}"#).unwrap();
        assert_eq!(r.hashtags, vec!["food".to_string(), "wine".to_string()]);
    }

    #[test]
    fn prose_fails_with_raw_text_retained() {
        let raw = "Sorry, I cannot process this image.";
        let err = normalize(raw).unwrap_err();
        assert_eq!(err.raw_completion(), Some(raw));
    }

    #[test]
    fn non_object_json_is_unparsable() {
        for raw in [r#""just a string""#, "42", "[1,2,3]", "null"] {
            let err = normalize(raw).unwrap_err();
            assert!(
                matches!(err, IngestError::UnparsableExtraction { .. }),
                "input: {raw}"
            );
        }
    }

    #[test]
    fn null_fields_resolve_to_defaults() {
        let r = normalize(
            r#"{"caption":null,"likes":null,"comments":null,"username":null,"postedDate":null,"hashtags":null}"#,
        )
        .unwrap();
        assert_eq!(r, ExtractionResult::default());
    }

    #[test]
    fn wrong_typed_fields_resolve_to_defaults() {
        let r = normalize(r#"{"caption":12,"likes":[1],"username":{"a":1},"postedDate":false}"#)
            .unwrap();
        assert_eq!(r, ExtractionResult::default());
    }

    #[test]
    fn negative_counts_default_to_zero() {
        let r = normalize(r#"{"likes":-5,"comments":"-3"}"#).unwrap();
        assert_eq!(r.likes, 0);
        assert_eq!(r.comments, 0);
    }

    #[test]
    fn partially_numeric_strings_default_to_zero() {
        let r = normalize(r#"{"likes":"87 likes","comments":"1,200"}"#).unwrap();
        assert_eq!(r.likes, 0);
        assert_eq!(r.comments, 0);
    }

    #[test]
    fn float_counts_truncate() {
        let r = normalize(r#"{"likes":87.9}"#).unwrap();
        assert_eq!(r.likes, 87);
    }

    #[test]
    fn fences_inside_caption_survive() {
        let r = normalize(r#"{"caption":"code: ```rust```"}"#).unwrap();
        assert_eq!(r.caption, "code: ```rust```");
    }

    #[test]
    fn fence_without_closing_is_unparsable() {
        let raw = "```json\n{\"caption\":\"x\"}";
        assert!(normalize(raw).is_err());
    }

    #[test]
    fn display_hashtag_adds_prefix_once() {
        assert_eq!(display_hashtag("food"), "#food");
        assert_eq!(display_hashtag("#wine"), "#wine");
    }

    #[test]
    fn strip_fences_textual_only() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{}"), "{}");
        // Single-line fenced payload
        assert_eq!(strip_code_fences("```{}```"), "{}");
    }
}
