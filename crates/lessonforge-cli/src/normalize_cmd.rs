//! `lessonforge normalize`: replay a captured model response through
//! extraction, repair, and normalization.

use std::path::Path;

use anyhow::{Context, Result};

use lessonforge_core::json::extract_json_from_text;
use lessonforge_core::normalize::{NormalizeOptions, normalize_plan};
use lessonforge_core::plan::{FunctionType, LessonPlan};

use crate::generate_cmd::render_plan;

pub fn run_normalize(file: &Path, activity: bool, relaxed: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read response file: {}", file.display()))?;

    let plan = normalize_text(&raw, options(activity, relaxed))
        .with_context(|| format!("{} does not hold a valid plan", file.display()))?;
    println!("{}", render_plan(&plan)?);
    Ok(())
}

fn options(activity: bool, relaxed: bool) -> NormalizeOptions {
    let function_type = if activity {
        FunctionType::Activity
    } else {
        FunctionType::Lesson
    };
    let opts = NormalizeOptions::new(function_type);
    if relaxed { opts.relaxed() } else { opts }
}

/// Extract, repair, and normalize raw response text.
pub fn normalize_text(raw: &str, opts: NormalizeOptions) -> Result<LessonPlan> {
    let value = extract_json_from_text(raw);
    Ok(normalize_plan(&value, &opts)?)
}
