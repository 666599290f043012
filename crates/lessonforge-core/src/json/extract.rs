//! Isolate the JSON object inside raw model output.
//!
//! Model responses arrive as event-stream captures, prose around a fenced
//! code block, prose with bare braces, or clean JSON. The extractor peels
//! these layers off and takes the text from the first `{` to the last `}`.
//! That is an outermost-object heuristic, not brace balancing: extra
//! braces in surrounding prose are tolerated as long as the payload is the
//! widest span.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::frames;
use super::repair;

/// Fenced-code-block delimiters with any (or no) language tag.
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```[ \t]*[a-z0-9_+.-]*").expect("code fence regex"));

/// Reasoning blocks emitted by some models before their answer.
static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think block regex"));

/// Failure to obtain a JSON object from model output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("JSON could not be repaired: {reason}")]
    Unrepairable { reason: String },
}

/// Extract a JSON value from raw model output, never failing.
///
/// Returns an empty object when nothing usable was found; downstream stages
/// treat `{}` as "nothing usable".
pub fn extract_json_from_text(raw: &str) -> Value {
    match try_extract_json(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, bytes = raw.len(), "extraction failed, using empty object");
            Value::Object(Map::new())
        }
    }
}

/// Extract a JSON value from raw model output, reporting why it failed.
pub fn try_extract_json(raw: &str) -> Result<Value, ExtractError> {
    let text = match frames::reassemble_frames(raw) {
        Some(content) => {
            debug!(bytes = content.len(), "reassembled event-stream frames");
            content
        }
        None => raw.to_string(),
    };
    let text = THINK_BLOCK.replace_all(&text, "");
    let text = strip_code_fences(&text);

    let start = text.find('{').ok_or(ExtractError::NoJsonObject)?;
    let tail = &text[start..];
    let span = match text.rfind('}') {
        Some(end) if end > start => &text[start..=end],
        // No closing brace after the first opening one: a truncated response.
        _ => tail,
    };

    match serde_json::from_str::<Value>(span) {
        Ok(value) => return Ok(value),
        Err(e) => debug!(error = %e, "direct parse failed, attempting repair"),
    }

    // An unbalanced span means the last `}` closed a nested object of a
    // payload that was cut off; repairing the whole tail keeps the members
    // that follow it.
    let primary = if repair::is_balanced(span) { span } else { tail };
    match repair::repair_json(primary) {
        Ok(value) => Ok(value),
        Err(err) if primary.len() != span.len() => {
            debug!(error = %err, "repair of full tail failed, retrying with outermost span");
            repair::repair_json(span).map_err(|_| err)
        }
        Err(err) => Err(err),
    }
}

/// Remove fenced-code-block delimiters, whatever their case or language tag.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").into_owned()
}
