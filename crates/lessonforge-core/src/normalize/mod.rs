//! Schema normalization and validation.
//!
//! [`normalize_plan`] is the single place where "whatever the model
//! produced" becomes a [`LessonPlan`]:
//!
//! 1. Legacy layouts are rewritten by the [`adapters`] stage.
//! 2. Fields are read through alias tables into the canonical types.
//! 3. [`finalize_plan`] mirrors bilingual fields, fills request defaults,
//!    merges continuation steps, drops duplicate steps, cleans titles, and
//!    enforces the step-count window.
//!
//! Strict mode (the default) also requires a title and splices in the
//! emergency procedures when a plan has none. Relaxed mode is for partial
//! responses and skips both, together with the window check.

pub mod adapters;
pub mod audience;
pub mod fields;
pub mod steps;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::emergency::emergency_procedures;
use crate::plan::{FunctionType, GenerationRequest, LessonPlan, TeachingPreparation};

use adapters::{
    AID_KEYS, AUDIENCE_KEYS, DURATION_KEYS, GRADE_KEYS, KEY_WORD_KEYS, METHOD_KEYS,
    OBJECTIVE_KEYS, SENTENCE_KEYS, STUDENT_KEYS, TITLE_KEYS,
};
use fields::{bilingual_list, bilingual_text, lookup, minutes_of, plain_text};

/// A parsed value that cannot become a valid plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("plan root must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("plan is missing required field {0:?}")]
    MissingField(&'static str),

    #[error("expected between {min} and {max} procedure steps, found {observed}")]
    StepCount {
        observed: usize,
        min: usize,
        max: usize,
    },
}

/// How strictly to validate, plus request values used to fill gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub function_type: FunctionType,
    /// Accept partial plans: no title requirement, no procedure splicing,
    /// no step-count window.
    pub relaxed: bool,
    /// Skip only the step-count window.
    pub allow_sparse: bool,
    pub topic: String,
    pub grade: String,
    pub duration: u32,
    pub teaching_method: String,
}

impl NormalizeOptions {
    pub fn new(function_type: FunctionType) -> Self {
        Self {
            function_type,
            ..Self::default()
        }
    }

    /// Strict options carrying the request's defaults.
    pub fn for_request(req: &GenerationRequest) -> Self {
        Self {
            function_type: req.function_type,
            relaxed: false,
            allow_sparse: req.allow_sparse,
            topic: req.topic.clone(),
            grade: req.grade.clone(),
            duration: req.duration,
            teaching_method: req.teaching_method.clone(),
        }
    }

    pub fn relaxed(mut self) -> Self {
        self.relaxed = true;
        self
    }

    pub fn strict(mut self) -> Self {
        self.relaxed = false;
        self
    }

    fn enforces_window(&self) -> bool {
        !(self.relaxed || self.allow_sparse)
    }
}

/// Normalize and validate a parsed model response.
///
/// A bare array at the root is taken to be the procedure list.
pub fn normalize_plan(value: &Value, opts: &NormalizeOptions) -> Result<LessonPlan, ValidationError> {
    let root = match value {
        Value::Object(map) => map.clone(),
        Value::Array(items) => {
            let mut map = Map::new();
            map.insert("procedures".to_string(), Value::Array(items.clone()));
            map
        }
        other => return Err(ValidationError::NotAnObject(json_kind(other))),
    };

    let root = adapters::adapt(root);
    finalize_plan(read_plan(&root), opts)
}

/// Apply the post-normalization passes and invariant checks to a typed plan.
///
/// Used directly for plans assembled in code, such as the merge of two
/// segment responses.
pub fn finalize_plan(mut plan: LessonPlan, opts: &NormalizeOptions) -> Result<LessonPlan, ValidationError> {
    mirror_all(&mut plan);
    fill_defaults(&mut plan, opts);

    if !opts.relaxed && plan.title.is_blank() {
        return Err(ValidationError::MissingField("title"));
    }

    let procedures = steps::merge_continuations(std::mem::take(&mut plan.procedures));
    plan.procedures = steps::dedupe_steps(procedures);
    steps::clean_titles(&mut plan.procedures);

    if plan.procedures.is_empty() && !opts.relaxed {
        let topic = if opts.topic.trim().is_empty() {
            plan.title.en.as_str()
        } else {
            opts.topic.as_str()
        };
        tracing::warn!(topic = %topic, "plan has no procedures; using emergency procedures");
        plan.procedures = emergency_procedures(topic, plan.duration);
    }

    if opts.enforces_window() {
        let window = opts.function_type.step_window();
        let observed = plan.procedures.len();
        if !window.contains(&observed) {
            return Err(ValidationError::StepCount {
                observed,
                min: *window.start(),
                max: *window.end(),
            });
        }
    }

    Ok(plan)
}

fn read_plan(root: &Map<String, Value>) -> LessonPlan {
    let preparation = match root.get("preparation") {
        Some(Value::Object(prep)) => read_preparation(prep),
        _ => TeachingPreparation::default(),
    };

    let procedures = match root.get("procedures") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| steps::coerce_step(item, idx + 1))
            .collect(),
        _ => Vec::new(),
    };

    LessonPlan {
        title: bilingual_text(root, TITLE_KEYS),
        grade: plain_text(root, GRADE_KEYS),
        duration: lookup(root, DURATION_KEYS).and_then(minutes_of).unwrap_or(0),
        teaching_method: plain_text(root, METHOD_KEYS),
        preparation,
        procedures,
    }
}

fn read_preparation(prep: &Map<String, Value>) -> TeachingPreparation {
    TeachingPreparation {
        objectives: bilingual_list(prep, OBJECTIVE_KEYS),
        key_words: bilingual_list(prep, KEY_WORD_KEYS),
        sentence_structures: bilingual_list(prep, SENTENCE_KEYS),
        teaching_aids: bilingual_text(prep, AID_KEYS),
        student_analysis: bilingual_text(prep, STUDENT_KEYS),
        audience_analysis: lookup(prep, AUDIENCE_KEYS)
            .map(audience::audience_entries)
            .unwrap_or_default(),
    }
}

fn mirror_all(plan: &mut LessonPlan) {
    plan.title = std::mem::take(&mut plan.title).mirrored();

    let prep = &mut plan.preparation;
    prep.objectives = std::mem::take(&mut prep.objectives).mirrored();
    prep.key_words = std::mem::take(&mut prep.key_words).mirrored();
    prep.sentence_structures = std::mem::take(&mut prep.sentence_structures).mirrored();
    prep.teaching_aids = std::mem::take(&mut prep.teaching_aids).mirrored();
    prep.student_analysis = std::mem::take(&mut prep.student_analysis).mirrored();

    for step in &mut plan.procedures {
        step.title = std::mem::take(&mut step.title).mirrored();
        step.content = std::mem::take(&mut step.content).mirrored();
    }
}

fn fill_defaults(plan: &mut LessonPlan, opts: &NormalizeOptions) {
    if plan.grade.trim().is_empty() {
        plan.grade = opts.grade.trim().to_string();
    }
    if plan.teaching_method.trim().is_empty() {
        plan.teaching_method = opts.teaching_method.trim().to_string();
    }
    if plan.duration == 0 {
        plan.duration = if opts.duration != 0 {
            opts.duration
        } else {
            match plan.timed_minutes() {
                0 => GenerationRequest::DEFAULT_DURATION,
                timed => timed,
            }
        };
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
