//! Instruction prompts for the vision extraction call.
//!
//! Centralising the prompts here serves two purposes:
//!
//! 1. **Single source of truth** — the normalizer's field list
//!    (`caption, likes, comments, username, postedDate, hashtags`) and the
//!    prompt must never drift apart; both cite this module.
//!
//! 2. **Testability** — unit tests can inspect the prompt text directly
//!    without a live model call.
//!
//! The model is instructed to return *only* valid JSON. It frequently
//! disobeys (code fences, prose preambles), which is exactly why
//! [`crate::pipeline::normalize`] exists — the prompt is a request, the
//! normalizer is the contract.

/// System instruction for the extraction call.
pub const SYSTEM_PROMPT: &str = "You are an assistant that analyzes screenshots of Instagram posts. \
Extract the following information in JSON format: \
1) caption/text content, 2) number of likes, 3) number of comments, \
4) username of poster, 5) date posted (estimate if not exact), 6) hashtags used. \
Return ONLY valid JSON with these fields: caption, likes, comments, username, postedDate, hashtags (array).";

/// User-turn instruction sent alongside the inline image.
pub const USER_INSTRUCTION: &str = "Analyze this Instagram post screenshot and extract the key \
information as JSON. Only return valid JSON, no other text.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_extraction_field() {
        for field in ["caption", "likes", "comments", "username", "postedDate", "hashtags"] {
            assert!(SYSTEM_PROMPT.contains(field), "prompt missing field {field}");
        }
    }

    #[test]
    fn prompt_demands_json_only() {
        assert!(SYSTEM_PROMPT.contains("ONLY valid JSON"));
        assert!(USER_INSTRUCTION.contains("Only return valid JSON"));
    }
}
