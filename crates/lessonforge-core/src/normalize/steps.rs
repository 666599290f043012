//! Procedure-step coercion and post-normalization passes.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::fields::{bilingual_text, lookup, minutes_of};
use crate::plan::{Bilingual, BilingualText, ProcedureStep};

const TITLE_KEYS: &[&str] = &[
    "title",
    "step_title",
    "stepTitle",
    "step",
    "stage",
    "phase",
    "name",
];
const CONTENT_KEYS: &[&str] = &[
    "content",
    "script",
    "description",
    "details",
    "activity",
    "activities",
    "teacher_script",
    "teacherScript",
    "text",
];
const DURATION_KEYS: &[&str] = &["duration", "minutes", "time", "duration_minutes", "durationMinutes"];

/// Title markers that flag a step as the continuation of the one before it.
static CONTINUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[(（]\s*(?:cont(?:inued|'d|\.)?|续(?:前)?)\s*[)）]|\bcontinued\s*$|\bcont\.\s*$|\s续\s*$",
    )
    .expect("continuation marker regex")
});

/// Separators left dangling at the end of a title once markers are removed.
const TITLE_TRAILING: &[char] = &[':', '：', '-', '–', '—', ',', '，', ';', '；', '|', '/'];

/// Generic title for steps whose source gave none.
pub fn placeholder_title(position: usize) -> BilingualText {
    Bilingual::new(format!("环节 {position}"), format!("Step {position}"))
}

/// Coerce one procedure entry of any shape into a step.
///
/// A bare string becomes the step's content under a placeholder title.
/// Returns `None` for entries with neither title nor content.
pub fn coerce_step(value: &Value, position: usize) -> Option<ProcedureStep> {
    match value {
        Value::String(s) => {
            let text = s.trim();
            (!text.is_empty()).then(|| ProcedureStep {
                title: placeholder_title(position),
                content: Bilingual::both(text.to_string()),
                duration: None,
            })
        }
        Value::Object(obj) => {
            let title = bilingual_text(obj, TITLE_KEYS);
            let content = bilingual_text(obj, CONTENT_KEYS);
            if title.is_blank() && content.is_blank() {
                return None;
            }
            Some(ProcedureStep {
                title: if title.is_blank() {
                    placeholder_title(position)
                } else {
                    title
                },
                content,
                duration: lookup(obj, DURATION_KEYS).and_then(minutes_of),
            })
        }
        _ => None,
    }
}

/// True when either language of the title carries a continuation marker.
pub fn is_continuation(title: &BilingualText) -> bool {
    CONTINUATION.is_match(&title.zh) || CONTINUATION.is_match(&title.en)
}

/// Fold each continuation step into the step before it.
///
/// Content is joined with a blank line per language and durations are
/// summed. A continuation with nothing before it is kept as a step.
pub fn merge_continuations(steps: Vec<ProcedureStep>) -> Vec<ProcedureStep> {
    let mut merged: Vec<ProcedureStep> = Vec::with_capacity(steps.len());
    for step in steps {
        match merged.last_mut() {
            Some(prev) if is_continuation(&step.title) => {
                prev.content.zh = join_content(&prev.content.zh, &step.content.zh);
                prev.content.en = join_content(&prev.content.en, &step.content.en);
                prev.duration = match (prev.duration, step.duration) {
                    (Some(a), Some(b)) => Some(a.saturating_add(b)),
                    (a, b) => a.or(b),
                };
            }
            _ => merged.push(step),
        }
    }
    merged
}

fn join_content(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (_, true) => first.to_string(),
        (true, false) => second.to_string(),
        (false, false) => format!("{first}\n\n{second}"),
    }
}

/// Drop steps whose (title, content) signature was already seen, keeping the first.
pub fn dedupe_steps(steps: Vec<ProcedureStep>) -> Vec<ProcedureStep> {
    let mut seen = HashSet::new();
    steps
        .into_iter()
        .filter(|step| seen.insert((step.title.clone(), step.content.clone())))
        .collect()
}

/// Strip continuation markers and repeated-punctuation artifacts from a title.
pub fn clean_title(title: &str) -> String {
    let without_markers = CONTINUATION.replace_all(title, "");

    let mut out = String::with_capacity(without_markers.len());
    let mut prev: Option<char> = None;
    for ch in without_markers.chars() {
        let repeated_symbol = prev == Some(ch) && !ch.is_alphanumeric();
        let repeated_space = ch.is_whitespace() && prev.is_some_and(char::is_whitespace);
        if !(repeated_symbol || repeated_space) {
            out.push(if ch.is_whitespace() { ' ' } else { ch });
        }
        prev = Some(ch);
    }

    out.trim()
        .trim_end_matches(|c: char| TITLE_TRAILING.contains(&c) || c.is_whitespace())
        .to_string()
}

/// Apply [`clean_title`] to both languages of every step, falling back to a
/// placeholder when nothing is left.
pub fn clean_titles(steps: &mut [ProcedureStep]) {
    for (idx, step) in steps.iter_mut().enumerate() {
        let cleaned = Bilingual::new(clean_title(&step.title.zh), clean_title(&step.title.en));
        step.title = if cleaned.is_blank() {
            placeholder_title(idx + 1)
        } else {
            cleaned.mirrored()
        };
    }
}
