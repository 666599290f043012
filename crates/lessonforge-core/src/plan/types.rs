//! Canonical lesson-plan data model.
//!
//! Every value that leaves the normalizer has this shape. The serialized
//! form (serde) is also the canonical wire form: feeding it back into
//! [`crate::normalize::normalize_plan`] yields the same plan.

use serde::{Deserialize, Serialize};

/// A value held once per supported language.
///
/// `zh` is the primary language, `en` the secondary one. Both sides are
/// always populated after normalization; [`Bilingual::mirrored`] copies
/// whichever side is present into the empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bilingual<T> {
    pub zh: T,
    pub en: T,
}

impl<T> Bilingual<T> {
    pub fn new(zh: T, en: T) -> Self {
        Self { zh, en }
    }
}

impl<T: Clone> Bilingual<T> {
    /// Same value on both sides.
    pub fn both(value: T) -> Self {
        Self {
            zh: value.clone(),
            en: value,
        }
    }
}

/// Emptiness check used when mirroring one language into the other.
pub trait IsBlank {
    fn is_blank(&self) -> bool;
}

impl IsBlank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl IsBlank for Vec<String> {
    fn is_blank(&self) -> bool {
        self.iter().all(|s| s.trim().is_empty())
    }
}

impl<T: IsBlank + Clone> Bilingual<T> {
    /// Fill a blank side from the other side.
    pub fn mirrored(mut self) -> Self {
        match (self.zh.is_blank(), self.en.is_blank()) {
            (true, false) => self.zh = self.en.clone(),
            (false, true) => self.en = self.zh.clone(),
            _ => {}
        }
        self
    }

    /// `true` when neither language carries content.
    pub fn is_blank(&self) -> bool {
        self.zh.is_blank() && self.en.is_blank()
    }
}

pub type BilingualText = Bilingual<String>;
pub type BilingualList = Bilingual<Vec<String>>;

/// The canonical output of the generation pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonPlan {
    pub title: BilingualText,
    pub grade: String,
    /// Total lesson length in minutes.
    pub duration: u32,
    pub teaching_method: String,
    pub preparation: TeachingPreparation,
    pub procedures: Vec<ProcedureStep>,
}

/// Everything a teacher prepares before the lesson starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeachingPreparation {
    pub objectives: BilingualList,
    pub key_words: BilingualList,
    pub sentence_structures: BilingualList,
    pub teaching_aids: BilingualText,
    pub student_analysis: BilingualText,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience_analysis: Vec<AudienceEntry>,
}

/// One audience-analysis observation.
///
/// The short form is a category tag plus free text. Richer entries may
/// also carry age range, proficiency, and learning style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceEntry {
    pub category: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proficiency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_style: Option<String>,
}

impl AudienceEntry {
    /// Tag used when a source entry names no category.
    pub const GENERIC_CATEGORY: &'static str = "general";

    pub fn new(category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
            ..Self::default()
        }
    }
}

/// One titled, optionally timed unit of the lesson sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureStep {
    pub title: BilingualText,
    /// Markdown-formatted script text.
    pub content: BilingualText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl LessonPlan {
    /// Sum of step durations, ignoring untimed steps. Saturates at `u32::MAX`.
    pub fn timed_minutes(&self) -> u32 {
        self.procedures
            .iter()
            .filter_map(|s| s.duration)
            .fold(0, u32::saturating_add)
    }
}
