//! Legacy payload shapes.
//!
//! Each [`ShapeAdapter`] pairs a detector with a rewrite that moves one
//! historical layout toward the canonical one. [`adapt`] runs every adapter
//! whose detector fires, in list order, over the same root object. Adding a
//! new legacy shape means adding one entry to [`ADAPTERS`].

use serde_json::{Map, Value};

use super::fields::{field_keys, has_field, lookup};
use super::steps::coerce_step;

pub(crate) const TITLE_KEYS: &[&str] = &["title", "lesson_title", "lessonTitle", "topic", "name"];
pub(crate) const GRADE_KEYS: &[&str] = &["grade", "grade_level", "gradeLevel", "level"];
pub(crate) const DURATION_KEYS: &[&str] = &[
    "duration",
    "total_duration",
    "totalDuration",
    "duration_minutes",
    "time",
];
pub(crate) const METHOD_KEYS: &[&str] = &["teaching_method", "teachingMethod", "method"];

pub(crate) const OBJECTIVE_KEYS: &[&str] = &[
    "objectives",
    "teaching_objectives",
    "teachingObjectives",
    "goals",
];
pub(crate) const KEY_WORD_KEYS: &[&str] = &[
    "key_words",
    "keyWords",
    "keywords",
    "vocabulary",
    "key_vocabulary",
];
pub(crate) const SENTENCE_KEYS: &[&str] = &[
    "sentence_structures",
    "sentenceStructures",
    "sentences",
    "key_sentences",
    "sentence_patterns",
];
pub(crate) const AID_KEYS: &[&str] = &["teaching_aids", "teachingAids", "materials", "aids"];
pub(crate) const STUDENT_KEYS: &[&str] = &["student_analysis", "studentAnalysis", "learner_analysis"];
pub(crate) const AUDIENCE_KEYS: &[&str] = &["audience_analysis", "audienceAnalysis", "audience"];

const PREPARATION: &str = "preparation";
const PREPARATION_ALIASES: &[&str] = &["teaching_preparation", "teachingPreparation", "prep"];

const PROCEDURES: &str = "procedures";
const PROCEDURE_ALIASES: &[&str] = &[
    "teaching_procedures",
    "teachingProcedures",
    "teaching_process",
    "teachingProcess",
    "procedure",
    "steps",
    "activities",
];

/// Keys under which a procedure container object nests its step list.
const CONTAINER_KEYS: &[&str] = &["steps", "items", "list", "procedures", "activities"];

/// Keys a root object is sometimes wrapped in.
const ENVELOPE_KEYS: &[&str] = &["lesson_plan", "lessonPlan", "plan", "data", "lesson"];

/// Every field that belongs under `preparation`.
const PREPARATION_FIELDS: &[&[&str]] = &[
    OBJECTIVE_KEYS,
    KEY_WORD_KEYS,
    SENTENCE_KEYS,
    AID_KEYS,
    STUDENT_KEYS,
    AUDIENCE_KEYS,
];

type Root = Map<String, Value>;

/// One legacy layout: how to recognise it and how to rewrite it.
pub struct ShapeAdapter {
    pub name: &'static str,
    detect: fn(&Root) -> bool,
    apply: fn(&mut Root),
}

impl ShapeAdapter {
    pub fn matches(&self, root: &Root) -> bool {
        (self.detect)(root)
    }
}

/// Adapters in priority order. The envelope must come off before anything
/// else can see the real root.
pub static ADAPTERS: &[ShapeAdapter] = &[
    ShapeAdapter {
        name: "envelope",
        detect: is_enveloped,
        apply: unwrap_envelope,
    },
    ShapeAdapter {
        name: "preparation-alias",
        detect: has_preparation_alias,
        apply: rename_preparation,
    },
    ShapeAdapter {
        name: "root-preparation-fields",
        detect: has_root_preparation_fields,
        apply: nest_preparation_fields,
    },
    ShapeAdapter {
        name: "split-language-procedures",
        detect: has_split_procedures,
        apply: zip_split_procedures,
    },
    ShapeAdapter {
        name: "procedure-alias",
        detect: has_procedure_alias,
        apply: rename_procedures,
    },
    ShapeAdapter {
        name: "procedures-under-preparation",
        detect: has_procedures_in_preparation,
        apply: lift_procedures,
    },
    ShapeAdapter {
        name: "procedure-container",
        detect: has_procedure_container,
        apply: flatten_procedures,
    },
];

/// Run every matching adapter over `root`.
pub fn adapt(mut root: Root) -> Root {
    for adapter in ADAPTERS {
        if adapter.matches(&root) {
            tracing::debug!(adapter = adapter.name, "rewriting legacy plan shape");
            (adapter.apply)(&mut root);
        }
    }
    root
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

fn has_plan_content(root: &Root) -> bool {
    lookup(root, TITLE_KEYS).is_some()
        || root.contains_key(PROCEDURES)
        || root.contains_key(PREPARATION)
        || lookup(root, PROCEDURE_ALIASES).is_some()
        || lookup(root, PREPARATION_ALIASES).is_some()
}

fn envelope_of(root: &Root) -> Option<&Root> {
    ENVELOPE_KEYS
        .iter()
        .find_map(|key| root.get(*key).and_then(Value::as_object))
}

fn is_enveloped(root: &Root) -> bool {
    !has_plan_content(root) && envelope_of(root).is_some()
}

fn unwrap_envelope(root: &mut Root) {
    // Envelopes occasionally nest (`{"data": {"lesson_plan": {...}}}`).
    while !has_plan_content(root) {
        let Some(inner) = envelope_of(root).cloned() else {
            return;
        };
        let outer = std::mem::replace(root, inner);
        for (key, value) in outer {
            if !ENVELOPE_KEYS.contains(&key.as_str()) {
                root.entry(key).or_insert(value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Preparation
// ---------------------------------------------------------------------------

fn has_preparation_alias(root: &Root) -> bool {
    !root.contains_key(PREPARATION) && lookup(root, PREPARATION_ALIASES).is_some()
}

fn rename_preparation(root: &mut Root) {
    if let Some(key) = PREPARATION_ALIASES.iter().find(|k| root.contains_key(**k)) {
        if let Some(value) = root.remove(*key) {
            root.insert(PREPARATION.to_string(), value);
        }
    }
}

fn root_preparation_keys(root: &Root) -> Vec<String> {
    PREPARATION_FIELDS
        .iter()
        .flat_map(|aliases| aliases.iter())
        .filter(|alias| has_field(root, alias))
        .flat_map(|alias| field_keys(root, alias))
        .collect()
}

fn has_root_preparation_fields(root: &Root) -> bool {
    !root_preparation_keys(root).is_empty()
}

fn nest_preparation_fields(root: &mut Root) {
    let keys = root_preparation_keys(root);
    let mut prep = match root.remove(PREPARATION) {
        Some(Value::Object(prep)) => prep,
        _ => Map::new(),
    };
    for key in keys {
        if let Some(value) = root.remove(&key) {
            prep.entry(key).or_insert(value);
        }
    }
    root.insert(PREPARATION.to_string(), Value::Object(prep));
}

// ---------------------------------------------------------------------------
// Procedures
// ---------------------------------------------------------------------------

fn split_procedure_lists(root: &Root) -> (Option<&Vec<Value>>, Option<&Vec<Value>>) {
    let zh = ["procedures_zh", "proceduresZh", "procedures_cn"]
        .iter()
        .find_map(|k| root.get(*k).and_then(Value::as_array));
    let en = ["procedures_en", "proceduresEn"]
        .iter()
        .find_map(|k| root.get(*k).and_then(Value::as_array));
    (zh, en)
}

fn has_split_procedures(root: &Root) -> bool {
    let (zh, en) = split_procedure_lists(root);
    !root.contains_key(PROCEDURES) && (zh.is_some() || en.is_some())
}

/// Zip per-language step lists into bilingual steps, index by index.
fn zip_split_procedures(root: &mut Root) {
    let (zh, en) = split_procedure_lists(root);
    let zh = zh.cloned().unwrap_or_default();
    let en = en.cloned().unwrap_or_default();

    let steps: Vec<Value> = (0..zh.len().max(en.len()))
        .filter_map(|idx| {
            let position = idx + 1;
            let zh_step = zh.get(idx).and_then(|v| coerce_step(v, position));
            let en_step = en.get(idx).and_then(|v| coerce_step(v, position));
            let step = match (zh_step, en_step) {
                (Some(mut z), Some(e)) => {
                    z.title.en = e.title.en;
                    z.content.en = e.content.en;
                    z.duration = z.duration.or(e.duration);
                    z
                }
                (Some(only), None) | (None, Some(only)) => only,
                (None, None) => return None,
            };
            serde_json::to_value(step).ok()
        })
        .collect();

    for key in field_keys(root, PROCEDURES) {
        root.remove(&key);
    }
    root.insert(PROCEDURES.to_string(), Value::Array(steps));
}

fn has_procedure_alias(root: &Root) -> bool {
    !root.contains_key(PROCEDURES) && lookup(root, PROCEDURE_ALIASES).is_some()
}

fn rename_procedures(root: &mut Root) {
    if let Some(key) = PROCEDURE_ALIASES.iter().find(|k| root.contains_key(**k)) {
        if let Some(value) = root.remove(*key) {
            root.insert(PROCEDURES.to_string(), value);
        }
    }
}

fn has_procedures_in_preparation(root: &Root) -> bool {
    !root.contains_key(PROCEDURES)
        && root
            .get(PREPARATION)
            .and_then(Value::as_object)
            .is_some_and(|prep| {
                prep.contains_key(PROCEDURES) || lookup(prep, PROCEDURE_ALIASES).is_some()
            })
}

fn lift_procedures(root: &mut Root) {
    let Some(Value::Object(prep)) = root.get_mut(PREPARATION) else {
        return;
    };
    let key = std::iter::once(&PROCEDURES)
        .chain(PROCEDURE_ALIASES)
        .find(|k| prep.contains_key(**k))
        .map(|k| k.to_string());
    let lifted = key.and_then(|k| prep.remove(&k));
    if let Some(value) = lifted {
        root.insert(PROCEDURES.to_string(), value);
    }
}

fn has_procedure_container(root: &Root) -> bool {
    matches!(root.get(PROCEDURES), Some(Value::Object(_) | Value::String(_)))
}

/// Turn a non-array `procedures` value into an array of step values.
///
/// A container object yields its nested list; a map of step title to step
/// body yields one step per entry; a string yields one step per line.
fn flatten_procedures(root: &mut Root) {
    let Some(value) = root.remove(PROCEDURES) else {
        return;
    };
    let steps = match value {
        Value::String(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Value::String(line.to_string()))
            .collect(),
        Value::Object(container) => match lookup(&container, CONTAINER_KEYS) {
            Some(Value::Array(items)) => items.clone(),
            _ => steps_from_map(container),
        },
        other => vec![other],
    };
    root.insert(PROCEDURES.to_string(), Value::Array(steps));
}

fn steps_from_map(map: Map<String, Value>) -> Vec<Value> {
    map.into_iter()
        .map(|(key, value)| match value {
            Value::Object(mut step) => {
                if lookup(&step, &["title", "name", "step"]).is_none() {
                    step.insert("title".to_string(), Value::String(key));
                }
                Value::Object(step)
            }
            other => serde_json::json!({ "title": key, "content": other }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(value: Value) -> Value {
        Value::Object(adapt(value.as_object().cloned().unwrap()))
    }

    #[test]
    fn canonical_root_is_untouched() {
        let root = json!({
            "title": {"zh": "天气", "en": "Weather"},
            "preparation": {"objectives": {"zh": ["a"], "en": ["a"]}},
            "procedures": [{"title": {"zh": "热身", "en": "Warm-up"}, "content": {"zh": "x", "en": "x"}}]
        });
        assert_eq!(run(root.clone()), root);
    }

    #[test]
    fn unwraps_nested_envelopes() {
        let out = run(json!({"data": {"lesson_plan": {"title": "Weather", "procedures": []}}, "status": "ok"}));
        assert_eq!(out["title"], "Weather");
        assert_eq!(out["status"], "ok");
        assert!(out.get("data").is_none());
    }

    #[test]
    fn envelope_ignored_when_root_has_content() {
        let out = run(json!({"title": "Weather", "data": {"x": 1}}));
        assert_eq!(out["data"]["x"], 1);
    }

    #[test]
    fn root_level_objectives_move_into_preparation() {
        let out = run(json!({
            "title": "Weather",
            "objectives": ["Name weather words"],
            "keyWords_en": ["sunny"],
            "preparation": {"teaching_aids": "cards"}
        }));
        assert_eq!(out["preparation"]["objectives"][0], "Name weather words");
        assert_eq!(out["preparation"]["keyWords_en"][0], "sunny");
        assert_eq!(out["preparation"]["teaching_aids"], "cards");
        assert!(out.get("objectives").is_none());
    }

    #[test]
    fn nested_field_wins_over_root_duplicate() {
        let out = run(json!({"objectives": ["root"], "preparation": {"objectives": ["nested"]}}));
        assert_eq!(out["preparation"]["objectives"][0], "nested");
    }

    #[test]
    fn preparation_alias_is_renamed() {
        let out = run(json!({"teachingPreparation": {"goals": ["x"]}}));
        assert_eq!(out["preparation"]["goals"][0], "x");
    }

    #[test]
    fn procedure_alias_is_renamed() {
        let out = run(json!({"title": "T", "steps": ["a", "b"]}));
        assert_eq!(out["procedures"], json!(["a", "b"]));
    }

    #[test]
    fn procedures_lifted_out_of_preparation() {
        let out = run(json!({"title": "T", "preparation": {"objectives": ["o"], "procedures": ["a"]}}));
        assert_eq!(out["procedures"], json!(["a"]));
        assert!(out["preparation"].get("procedures").is_none());
    }

    #[test]
    fn container_object_is_flattened() {
        let out = run(json!({"title": "T", "procedures": {"steps": [{"title": "A"}], "note": "x"}}));
        assert_eq!(out["procedures"], json!([{"title": "A"}]));
    }

    #[test]
    fn title_map_becomes_steps_in_document_order() {
        let raw = r#"{"title": "T", "procedures": {
            "Warm-up": "Sing",
            "Presentation": "Show pictures",
            "Practice": {"content": "Drill"},
            "Homework": "Draw the sky"
        }}"#;
        let out = run(serde_json::from_str(raw).unwrap());
        let steps = out["procedures"].as_array().unwrap();
        let titles: Vec<&str> = steps.iter().map(|s| s["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["Warm-up", "Presentation", "Practice", "Homework"]);
        assert_eq!(steps[0]["content"], "Sing");
        assert_eq!(steps[2]["content"], "Drill");
    }

    #[test]
    fn procedure_text_is_split_into_lines() {
        let out = run(json!({"title": "T", "procedures": "Sing\n\nDraw\n"}));
        assert_eq!(out["procedures"], json!(["Sing", "Draw"]));
    }

    #[test]
    fn split_language_lists_are_zipped() {
        let out = run(json!({
            "title": "T",
            "procedures_zh": [{"title": "热身", "content": "唱歌", "duration": 5}],
            "procedures_en": [{"title": "Warm-up", "content": "Sing"}, "Extra"]
        }));
        let steps = out["procedures"].as_array().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0]["title"], json!({"zh": "热身", "en": "Warm-up"}));
        assert_eq!(steps[0]["content"], json!({"zh": "唱歌", "en": "Sing"}));
        assert_eq!(steps[0]["duration"], 5);
        assert_eq!(steps[1]["content"]["en"], "Extra");
        assert!(out.get("procedures_zh").is_none());
    }
}
