//! Extraction and repair of JSON from raw model text.

use serde_json::{Value, json};

use lessonforge_core::json::{ExtractError, extract_json_from_text, repair_json, try_extract_json};

#[test]
fn trailing_comma_in_list_is_recovered() {
    let value = extract_json_from_text(r#"{"title":"X","list":[1,2,]}"#);
    assert_eq!(value, json!({"title": "X", "list": [1, 2]}));
}

#[test]
fn fenced_block_with_stray_tabs_and_trailing_comma() {
    let raw = "Sure! Here is the plan:\n```JSON\n{\"words\": [\"sun\t\", \"rain\"\n,],\n}\n```\nEnjoy.";
    assert_eq!(extract_json_from_text(raw), json!({"words": ["sun", "rain"]}));
}

#[test]
fn truncated_response_keeps_members_before_the_cut() {
    let raw = r#"Here you go: {"title": "Weather", "grade": "Grade 3", "procedures": [{"title": "Warm-up", "content": "Sing"#;
    let value = extract_json_from_text(raw);
    assert_eq!(value["title"], "Weather");
    assert_eq!(value["grade"], "Grade 3");
    assert_eq!(value["procedures"][0]["title"], "Warm-up");
}

#[test]
fn text_without_braces_yields_empty_object() {
    for raw in ["", "I cannot help with that.", "```\nno json here\n```", "[1, 2, 3]"] {
        assert_eq!(extract_json_from_text(raw), json!({}), "input: {raw:?}");
    }
    assert_eq!(try_extract_json("plain prose"), Err(ExtractError::NoJsonObject));
}

#[test]
fn nested_object_inside_narrative_is_recovered() {
    let raw = r#"The plan is {"title": {"en": "Food", "zh": "食物"}, "grade": "Grade 2"} as requested."#;
    let value = extract_json_from_text(raw);
    assert_eq!(value["title"]["en"], "Food");
    assert_eq!(value["grade"], "Grade 2");
}

#[test]
fn event_stream_is_reassembled_in_order() {
    let fragments = ["{\"title\": ", "\"Streamed\", ", "\"grade\": \"Grade 1\"}"];
    let mut raw = String::new();
    raw.push_str(&format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"role": "assistant"}}]})
    ));
    for fragment in fragments {
        raw.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": fragment}}]})
        ));
    }
    raw.push_str("data: [DONE]\n\n");

    let value = extract_json_from_text(&raw);
    assert_eq!(value, json!({"title": "Streamed", "grade": "Grade 1"}));
}

#[test]
fn doubled_quote_emphasis_is_escaped() {
    let value = repair_json(r#"{"content": "Say ""hello"" to everyone"}"#).unwrap();
    assert_eq!(value["content"], "Say \"hello\" to everyone");
}

#[test]
fn doubled_quote_value_is_kept_as_a_string() {
    let value = extract_json_from_text(r#"{"title":"X","note":""wow"","list":[1,2,]}"#);
    assert_eq!(value, json!({"title": "X", "note": "\"wow\"", "list": [1, 2]}));
}

#[test]
fn commas_inside_strings_survive_trailing_comma_removal() {
    let value = extract_json_from_text(r#"{"a": "colors: red, blue, ]", "b": [1,]}"#);
    assert_eq!(value, json!({"a": "colors: red, blue, ]", "b": [1]}));
}

#[test]
fn unterminated_string_before_next_key_is_closed() {
    let value = repair_json(r#"{"title": "Weather, "grade": "Grade 3"}"#).unwrap();
    assert_eq!(value["title"], "Weather");
    assert_eq!(value["grade"], "Grade 3");
}

#[test]
fn hopeless_input_is_an_error_not_a_panic() {
    assert!(matches!(
        repair_json("{:::}"),
        Err(ExtractError::Unrepairable { .. })
    ));
    assert_eq!(extract_json_from_text("{:::}"), Value::Object(Default::default()));
}

#[test]
fn repair_is_idempotent_on_valid_json() {
    let valid = r#"{"a": [1, 2], "b": {"c": "d, e"}}"#;
    let once = lessonforge_core::json::repair_json_text(valid);
    assert_eq!(once, valid);
    assert_eq!(lessonforge_core::json::repair_json_text(&once), once);
}
