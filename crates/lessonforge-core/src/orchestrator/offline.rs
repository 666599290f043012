//! Offline mode: a fixed local plan stands in for the model response.

use crate::plan::GenerationRequest;

/// Twelve-step bilingual plan with `{topic}`, `{grade}`, `{duration}`, and
/// `{method}` placeholders.
const FIXTURE: &str = include_str!("../../fixtures/offline_plan.json");

const DEFAULT_METHOD: &str = "communicative";

/// The fixture text with the request's values substituted in.
///
/// Values are JSON-escaped, so the result parses whatever the request holds.
pub fn offline_response(req: &GenerationRequest) -> String {
    let topic = if req.topic.trim().is_empty() {
        "English"
    } else {
        req.topic.trim()
    };
    let method = if req.teaching_method.trim().is_empty() {
        DEFAULT_METHOD
    } else {
        req.teaching_method.trim()
    };

    FIXTURE
        .replace("{topic}", &json_escape(topic))
        .replace("{grade}", &json_escape(req.grade.trim()))
        .replace("{duration}", &req.duration.to_string())
        .replace("{method}", &json_escape(method))
}

/// Escape `value` for use inside a JSON string literal.
fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
