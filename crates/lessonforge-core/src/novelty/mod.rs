//! Near-duplicate detection against recent generations.
//!
//! The check is a soft signal: a match is logged and reported, and the plan
//! is returned unchanged either way.

use std::collections::{HashSet, VecDeque};

use crate::plan::{BilingualList, LessonPlan, ProcedureStep};

/// Scores above this against any history entry raise a novelty warning.
pub const NOVELTY_THRESHOLD: f64 = 0.7;

/// Number of prior plans kept for comparison.
pub const HISTORY_CAPACITY: usize = 5;

const TITLE_WEIGHT: f64 = 0.3;
const OBJECTIVE_WEIGHT: f64 = 0.2;
const STEP_COUNT_WEIGHT: f64 = 0.1;
const CONTENT_WEIGHT: f64 = 0.4;

/// Bounded, most-recent-first record of generated plans.
#[derive(Debug, Clone, Default)]
pub struct GenerationHistory {
    plans: VecDeque<LessonPlan>,
}

impl GenerationHistory {
    pub fn new() -> Self {
        Self {
            plans: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    /// Prepend `plan`, dropping the oldest entry past capacity.
    pub fn record(&mut self, plan: LessonPlan) {
        self.plans.push_front(plan);
        self.plans.truncate(HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn clear(&mut self) {
        self.plans.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &LessonPlan> {
        self.plans.iter()
    }

    /// Copy of the entries, most recent first.
    pub fn snapshot(&self) -> Vec<LessonPlan> {
        self.plans.iter().cloned().collect()
    }
}

/// Outcome of comparing one plan against the history.
#[derive(Debug, Clone, PartialEq)]
pub struct NoveltyReport {
    /// Highest similarity against any history entry, 0.0 when history is empty.
    pub max_score: f64,
    /// Position in the history (0 = most recent) of the closest entry.
    pub closest: Option<usize>,
}

impl NoveltyReport {
    pub fn is_warning(&self) -> bool {
        self.max_score > NOVELTY_THRESHOLD
    }
}

/// Similarity of `new` to `old` in `[0, 1]`.
pub fn similarity(new: &LessonPlan, old: &LessonPlan) -> f64 {
    let mut score = 0.0;

    if same_nonempty(&new.title.zh, &old.title.zh) || same_nonempty(&new.title.en, &old.title.en) {
        score += TITLE_WEIGHT;
    }

    score += OBJECTIVE_WEIGHT * objective_overlap(&new.preparation.objectives, &old.preparation.objectives);

    if new.procedures.len() == old.procedures.len() {
        score += STEP_COUNT_WEIGHT;
    }

    score += CONTENT_WEIGHT * content_overlap(&new.procedures, &old.procedures);

    score.clamp(0.0, 1.0)
}

/// Score `plan` against every history entry, warning on a near-duplicate.
pub fn check_novelty(plan: &LessonPlan, history: &GenerationHistory) -> NoveltyReport {
    let closest = history
        .iter()
        .map(|old| similarity(plan, old))
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b));

    let report = match closest {
        Some((idx, score)) => NoveltyReport {
            max_score: score,
            closest: Some(idx),
        },
        None => NoveltyReport {
            max_score: 0.0,
            closest: None,
        },
    };

    if report.is_warning() {
        tracing::warn!(
            title = %plan.title.en,
            score = report.max_score,
            history_index = report.closest,
            "generated plan is very similar to a recent one"
        );
    }
    report
}

fn same_nonempty(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && a.trim() == b.trim()
}

/// Share of objectives found in the other list, best of the two languages.
fn objective_overlap(new: &BilingualList, old: &BilingualList) -> f64 {
    overlap_ratio(&new.zh, &old.zh).max(overlap_ratio(&new.en, &old.en))
}

fn overlap_ratio(new: &[String], old: &[String]) -> f64 {
    let denominator = new.len().max(old.len());
    if denominator == 0 {
        return 0.0;
    }
    let old: HashSet<&str> = old.iter().map(|s| s.trim()).collect();
    let matches = new.iter().filter(|s| old.contains(s.trim())).count();
    matches as f64 / denominator as f64
}

/// Share of steps whose content matches an earlier step's exactly, in either language.
fn content_overlap(new: &[ProcedureStep], old: &[ProcedureStep]) -> f64 {
    let denominator = new.len().max(old.len());
    if denominator == 0 {
        return 0.0;
    }
    let old_zh: HashSet<&str> = old.iter().map(|s| s.content.zh.as_str()).collect();
    let old_en: HashSet<&str> = old.iter().map(|s| s.content.en.as_str()).collect();
    let matches = new
        .iter()
        .filter(|s| {
            (!s.content.zh.is_empty() && old_zh.contains(s.content.zh.as_str()))
                || (!s.content.en.is_empty() && old_en.contains(s.content.en.as_str()))
        })
        .count();
    matches as f64 / denominator as f64
}
