//! Extraction of the ranked list from free-form LLM text.

use serde::Deserialize;
use thiserror::Error;

/// The ranking response could not be read as a list of selections.
#[derive(Error, Debug)]
#[error("failed to parse ranked list: {message}; raw response: {raw}")]
pub struct ParseError {
    pub message: String,
    /// The response text exactly as the model returned it
    pub raw: String,
}

/// One entry of the model's ranked list, before URL resolution.
///
/// `index` is signed so a negative value reaches index resolution instead of
/// failing here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RankedSelection {
    pub index: i64,
    pub summary: String,
}

/// Parse a ranked list, tolerating a surrounding code fence.
pub fn parse_ranked_list(raw: &str) -> Result<Vec<RankedSelection>, ParseError> {
    let cleaned = strip_markdown_json(raw);
    serde_json::from_str(cleaned).map_err(|e| ParseError {
        message: e.to_string(),
        raw: raw.to_string(),
    })
}

/// Strip markdown code block wrappers from JSON response
fn strip_markdown_json(text: &str) -> &str {
    let mut trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("```json") {
        trimmed = rest.trim();
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        trimmed = rest.trim();
    }

    if let Some(rest) = trimmed.strip_suffix("```") {
        trimmed = rest.trim();
    }

    trimmed
}
