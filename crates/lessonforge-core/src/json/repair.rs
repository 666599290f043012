//! Heuristic repair of almost-valid JSON text.
//!
//! A single character scanner tracks string state and open brackets; it
//! strips raw control characters from string bodies, closes strings that
//! were never terminated, and auto-closes structures cut off by a
//! truncated response. Trailing commas are dropped by a second scanner
//! pass, and a regex pass handles doubled-quote emphasis (`""word""`).
//!
//! Every pass is idempotent: feeding its own output back in is a no-op.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::extract::ExtractError;

/// `""text""` not preceded by a backslash. The inner text must start with a
/// non-separator so that adjacent empty strings (`"", ""`) are left alone.
static DOUBLED_QUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[^\\])""([^"\s,:\[\]{}\\](?:[^"]*[^"\\])?)"""#).expect("doubled quote regex")
});

/// A `"key":` pattern, used to detect where an unterminated value string should have ended.
static KEY_AHEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*"[^"\\]*"\s*:"#).expect("key lookahead regex"));

/// Give up cutting back to earlier separators after this many attempts.
const MAX_TRUNCATION_ATTEMPTS: usize = 32;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Apply every repair pass, in order, and return the rewritten text.
///
/// 1. control-character stripping inside strings
/// 2. unterminated-string closing
/// 3. doubled-quote escaping
/// 4. trailing-comma removal
/// 5. auto-closing of structures left open by truncation
///
/// Trailing commas go after the string passes so that string boundaries
/// are known when deciding which commas are structural.
pub fn repair_json_text(input: &str) -> String {
    let text = strip_control_chars(input);
    let text = close_unterminated_strings(&text);
    let text = escape_doubled_quotes(&text);
    let text = remove_trailing_commas(&text);
    close_open_structures(&text)
}

/// Repair `input` and parse it.
///
/// When the fully repaired text still does not parse, the text is cut back
/// to successively earlier top-level separators and re-closed, so that
/// well-formed members before a defect survive. Returns
/// [`ExtractError::Unrepairable`] when nothing parses.
pub fn repair_json(input: &str) -> Result<Value, ExtractError> {
    let repaired = repair_json_text(input);
    let first_error = match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            debug!(bytes = input.len(), "repaired JSON parsed");
            return Ok(value);
        }
        Err(e) => e,
    };

    let mut candidate = repaired;
    for attempt in 0..MAX_TRUNCATION_ATTEMPTS {
        let Some(cut) = cut_at_last_separator(&candidate) else {
            break;
        };
        let closed = close_open_structures(&cut);
        if let Ok(value) = serde_json::from_str::<Value>(&closed) {
            debug!(attempt, "repaired JSON parsed after truncating trailing members");
            return Ok(value);
        }
        candidate = cut;
    }

    Err(ExtractError::Unrepairable {
        reason: first_error.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Regex pass
// ---------------------------------------------------------------------------

/// Rewrite `""text""` emphasis artifacts as `\"text\"`.
///
/// Inside a string the quotes are escaped in place. Where a value is
/// expected (`"key": ""text""`) the escaped text is also wrapped in a
/// string of its own.
pub fn escape_doubled_quotes(input: &str) -> String {
    DOUBLED_QUOTE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let lead = &caps[1];
            let text = &caps[2];
            let quotes_at = caps.get(1).map_or(0, |m| m.end());
            if outside_string(&input[..quotes_at]) {
                format!(r#"{lead}"\"{text}\"""#)
            } else {
                format!(r#"{lead}\"{text}\""#)
            }
        })
        .into_owned()
}

/// True when `prefix` ends outside any string literal.
fn outside_string(prefix: &str) -> bool {
    let mut in_string = false;
    let mut escaped = false;
    for ch in prefix.chars() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = in_string;
        } else if ch == '"' {
            in_string = !in_string;
        }
    }
    !in_string
}

// ---------------------------------------------------------------------------
// Scanner passes
// ---------------------------------------------------------------------------

/// Drop commas outside strings whose next significant character is `]` or
/// `}`. Runs of such commas (`[1,,]`) go together.
pub fn remove_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }

        match ch {
            '"' => in_string = true,
            ',' if closes_after_commas(&chars[idx + 1..]) => continue,
            _ => {}
        }
        out.push(ch);
    }

    out
}

/// True when `rest`, skipping whitespace and further commas, starts with a
/// closing bracket.
fn closes_after_commas(rest: &[char]) -> bool {
    rest.iter()
        .find(|c| !c.is_whitespace() && **c != ',')
        .is_some_and(|c| matches!(*c, ']' | '}'))
}

/// Remove raw control characters (tabs, newlines, carriage returns, ...)
/// that appear inside string bodies. Whitespace between tokens is kept.
pub fn strip_control_chars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in input.chars() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }

        if escaped {
            escaped = false;
            if ch.is_control() {
                // A backslash followed by a raw control char is not a valid
                // escape; drop both.
                out.pop();
            } else {
                out.push(ch);
            }
            continue;
        }

        match ch {
            '\\' => {
                escaped = true;
                out.push(ch);
            }
            '"' => {
                in_string = false;
                out.push(ch);
            }
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out
}

/// Insert a missing closing quote before the next `, "key":`, before a
/// `}` that ends the structure, or at end of input.
pub fn close_unterminated_strings(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in input.char_indices() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(ch);
            continue;
        }

        let rest = &input[idx + ch.len_utf8()..];
        match ch {
            '\\' => escaped = true,
            '"' => in_string = false,
            ',' if KEY_AHEAD.is_match(rest) => {
                out.push('"');
                in_string = false;
            }
            '}' if ends_structure(rest) => {
                out.push('"');
                in_string = false;
            }
            _ => {}
        }
        out.push(ch);
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    out
}

/// True when the text after a `}` looks like the continuation of a JSON
/// structure rather than more string content.
fn ends_structure(rest: &str) -> bool {
    let trimmed = rest.trim_start();
    trimmed.is_empty()
        || trimmed.starts_with('}')
        || trimmed.starts_with(']')
        || trimmed
            .strip_prefix(',')
            .is_some_and(|after| KEY_AHEAD.is_match(after))
}

/// Balance brackets left open by a truncated response.
///
/// Mismatched closers close the inner structures they skip over; closers
/// with nothing to close are dropped. Anything after the root structure
/// closes is discarded. At end of input an open string is closed, a
/// dangling comma is removed, a dangling colon gets `null`, and the
/// remaining brackets are closed innermost first.
pub fn close_open_structures(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut opened_any = false;

    for ch in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                stack.push('}');
                opened_any = true;
            }
            '[' => {
                stack.push(']');
                opened_any = true;
            }
            '}' | ']' => {
                if !stack.contains(&ch) {
                    continue;
                }
                while let Some(closer) = stack.pop() {
                    if closer == ch {
                        break;
                    }
                    trim_dangling(&mut out);
                    out.push(closer);
                }
                out.push(ch);
                if stack.is_empty() && opened_any {
                    return out;
                }
                continue;
            }
            _ => {}
        }
        out.push(ch);
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    while let Some(closer) = stack.pop() {
        trim_dangling(&mut out);
        out.push(closer);
    }

    out
}

/// Clean up the tail before a synthesized closer.
fn trim_dangling(out: &mut String) {
    let keep = out.trim_end().len();
    out.truncate(keep);
    if out.ends_with(',') {
        out.pop();
    } else if out.ends_with(':') {
        out.push_str("null");
    }
}

/// True when every bracket opened outside a string is closed again.
pub fn is_balanced(input: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for ch in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            _ => {}
        }
    }

    depth == 0 && !in_string
}

/// Cut `input` at its last comma outside any string. Returns `None` when
/// there is no such comma.
fn cut_at_last_separator(input: &str) -> Option<String> {
    let mut in_string = false;
    let mut escaped = false;
    let mut last_comma = None;

    for (idx, ch) in input.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            ',' => last_comma = Some(idx),
            _ => {}
        }
    }

    last_comma.map(|idx| input[..idx].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removes_trailing_comma_in_array() {
        let value = repair_json(r#"{"title":"X","list":[1,2,]}"#).unwrap();
        assert_eq!(value, json!({"title": "X", "list": [1, 2]}));
    }

    #[test]
    fn removes_trailing_comma_across_whitespace_and_nesting() {
        let input = "{\"a\": {\"b\": [1, 2,\n\t],\n },\n}";
        let value = repair_json(input).unwrap();
        assert_eq!(value, json!({"a": {"b": [1, 2]}}));
    }

    #[test]
    fn trailing_comma_pass_is_idempotent() {
        let once = remove_trailing_commas("[1,2,,]");
        assert_eq!(once, "[1,2]");
        assert_eq!(remove_trailing_commas(&once), once);
    }

    #[test]
    fn trailing_comma_pass_leaves_string_contents_alone() {
        let input = r#"{"a": "colors: red, blue, ]", "b": [1,]}"#;
        assert_eq!(
            remove_trailing_commas(input),
            r#"{"a": "colors: red, blue, ]", "b": [1]}"#
        );
        let value = repair_json(input).unwrap();
        assert_eq!(value, json!({"a": "colors: red, blue, ]", "b": [1]}));
    }

    #[test]
    fn strips_raw_newlines_and_tabs_inside_strings() {
        let out = strip_control_chars("{\"a\": \"line\none\tx\"}");
        assert_eq!(out, "{\"a\": \"lineonex\"}");
    }

    #[test]
    fn keeps_whitespace_between_tokens() {
        let input = "{\n\t\"a\": 1\n}";
        assert_eq!(strip_control_chars(input), input);
    }

    #[test]
    fn keeps_escaped_sequences() {
        let input = r#"{"a": "tab\there \"q\""}"#;
        assert_eq!(strip_control_chars(input), input);
    }

    #[test]
    fn closes_string_before_next_key() {
        let out = close_unterminated_strings(r#"{"a": "hello, "b": 2}"#);
        assert_eq!(out, r#"{"a": "hello", "b": 2}"#);
    }

    #[test]
    fn closes_string_before_final_brace() {
        let out = close_unterminated_strings(r#"{"a": "hello}"#);
        assert_eq!(out, r#"{"a": "hello"}"#);
    }

    #[test]
    fn closes_string_at_end_of_input() {
        let out = close_unterminated_strings(r#"{"a": "hello"#);
        assert_eq!(out, r#"{"a": "hello""#);
    }

    #[test]
    fn unterminated_pass_leaves_valid_json_alone() {
        let input = r#"{"a": "x, y", "b": "use {braces} here", "c": "z}"}"#;
        assert_eq!(close_unterminated_strings(input), input);
    }

    #[test]
    fn escapes_doubled_quote_emphasis() {
        let out = escape_doubled_quotes(r#"{"a": "Say ""hello"" twice"}"#);
        assert_eq!(out, r#"{"a": "Say \"hello\" twice"}"#);
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["a"], "Say \"hello\" twice");
    }

    #[test]
    fn doubled_quote_value_becomes_quoted_string() {
        let out = escape_doubled_quotes(r#"{"title":"X","note":""wow""}"#);
        assert_eq!(out, r#"{"title":"X","note":"\"wow\""}"#);
        assert_eq!(escape_doubled_quotes(&out), out);

        let value = repair_json(r#"{"title":"X","note":""wow"","list":[1,2,]}"#).unwrap();
        assert_eq!(value, json!({"title": "X", "note": "\"wow\"", "list": [1, 2]}));
    }

    #[test]
    fn doubled_quote_in_array_becomes_quoted_string() {
        let value = repair_json(r#"{"tags": [""big"", "small"]}"#).unwrap();
        assert_eq!(value, json!({"tags": ["\"big\"", "small"]}));
    }

    #[test]
    fn doubled_quote_pass_ignores_empty_strings() {
        let input = r#"{"a": "", "b": ["", ""]}"#;
        assert_eq!(escape_doubled_quotes(input), input);
    }

    #[test]
    fn doubled_quote_pass_is_idempotent() {
        let once = escape_doubled_quotes(r#""x ""y"" z""#);
        assert_eq!(escape_doubled_quotes(&once), once);
    }

    #[test]
    fn auto_closes_truncated_structures() {
        let value = repair_json(r#"{"title":"X","list":[1,2,"#).unwrap();
        assert_eq!(value, json!({"title": "X", "list": [1, 2]}));
    }

    #[test]
    fn dangling_colon_becomes_null() {
        let value = repair_json(r#"{"a": 1, "b":"#).unwrap();
        assert_eq!(value, json!({"a": 1, "b": null}));
    }

    #[test]
    fn truncated_key_is_dropped() {
        let value = repair_json(r#"{"a": 1, "b": [true], "unfinish"#).unwrap();
        assert_eq!(value, json!({"a": 1, "b": [true]}));
    }

    #[test]
    fn mismatched_closer_closes_inner_structure() {
        let value = repair_json(r#"{"a": [1, 2}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn text_after_root_is_discarded() {
        assert_eq!(close_open_structures(r#"{"a": 1} trailing }"#), r#"{"a": 1}"#);
    }

    #[test]
    fn balance_check_ignores_brackets_in_strings() {
        assert!(is_balanced(r#"{"a": "}{", "b": [1]}"#));
        assert!(!is_balanced(r#"{"a": {"b": 1}"#));
    }

    #[test]
    fn full_repair_is_idempotent() {
        let once = repair_json_text("{\"a\": \"x\ny, \"b\": [1,2,");
        assert_eq!(repair_json_text(&once), once);
    }

    #[test]
    fn unrepairable_text_is_an_error_not_a_panic() {
        let err = repair_json("{ this is : not ] json").unwrap_err();
        assert!(matches!(err, ExtractError::Unrepairable { .. }));
    }
}
