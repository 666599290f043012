//! Generation request parameters.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What kind of plan the caller wants.
///
/// The function type changes both the prompt shape and the step-count
/// window enforced by the validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionType {
    /// A complete lesson, 10-15 procedure steps.
    #[default]
    Lesson,
    /// A short classroom activity, 6-20 procedure steps.
    Activity,
}

impl FunctionType {
    /// Inclusive bounds on the number of procedure steps.
    pub fn step_window(self) -> RangeInclusive<usize> {
        match self {
            Self::Lesson => 10..=15,
            Self::Activity => 6..=20,
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lesson => f.write_str("lesson"),
            Self::Activity => f.write_str("activity"),
        }
    }
}

impl FromStr for FunctionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lesson" | "full" => Ok(Self::Lesson),
            "activity" => Ok(Self::Activity),
            other => Err(format!("unknown function type {other:?} (expected lesson or activity)")),
        }
    }
}

/// Parameters of a single generation call. Immutable for the call's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub grade: String,
    /// Target lesson length in minutes.
    pub duration: u32,
    /// Teaching-method tag, e.g. "task-based" or "PPP".
    pub teaching_method: String,
    #[serde(default)]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub sentences: Vec<String>,
    #[serde(default)]
    pub grammar: Vec<String>,
    #[serde(default)]
    pub function_type: FunctionType,
    /// Skip the step-count window check on the final plan.
    #[serde(default)]
    pub allow_sparse: bool,
}

impl GenerationRequest {
    /// Default lesson length when the caller gives none.
    pub const DEFAULT_DURATION: u32 = 40;

    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            grade: String::new(),
            duration: Self::DEFAULT_DURATION,
            teaching_method: String::new(),
            vocabulary: Vec::new(),
            sentences: Vec::new(),
            grammar: Vec::new(),
            function_type: FunctionType::Lesson,
            allow_sparse: false,
        }
    }

    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = grade.into();
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration = minutes;
        self
    }

    pub fn with_teaching_method(mut self, method: impl Into<String>) -> Self {
        self.teaching_method = method.into();
        self
    }

    pub fn with_function_type(mut self, function_type: FunctionType) -> Self {
        self.function_type = function_type;
        self
    }

    /// True when any vocabulary, sentence, or grammar hint was given.
    pub fn has_hints(&self) -> bool {
        !(self.vocabulary.is_empty() && self.sentences.is_empty() && self.grammar.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_window_is_ten_to_fifteen() {
        assert_eq!(FunctionType::Lesson.step_window(), 10..=15);
    }

    #[test]
    fn activity_window_is_six_to_twenty() {
        assert_eq!(FunctionType::Activity.step_window(), 6..=20);
    }

    #[test]
    fn function_type_parses_aliases() {
        assert_eq!("full".parse::<FunctionType>().unwrap(), FunctionType::Lesson);
        assert_eq!(" Activity ".parse::<FunctionType>().unwrap(), FunctionType::Activity);
        assert!("quiz".parse::<FunctionType>().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let req = GenerationRequest::new("Weather")
            .with_grade("Grade 3")
            .with_duration(45)
            .with_teaching_method("TPR")
            .with_function_type(FunctionType::Activity);
        assert_eq!(req.topic, "Weather");
        assert_eq!(req.grade, "Grade 3");
        assert_eq!(req.duration, 45);
        assert_eq!(req.teaching_method, "TPR");
        assert_eq!(req.function_type, FunctionType::Activity);
        assert!(!req.has_hints());
    }
}
