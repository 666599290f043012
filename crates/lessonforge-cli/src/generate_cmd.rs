//! `lessonforge generate`: run the orchestrator once and emit the plan.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use lessonforge_core::model::HttpModelClient;
use lessonforge_core::orchestrator::{LessonGenerator, PlanSource};
use lessonforge_core::plan::{GenerationRequest, LessonPlan};

use crate::config::LessonforgeConfig;

pub async fn run_generate(
    config: &LessonforgeConfig,
    req: &GenerationRequest,
    stream: bool,
    output: Option<&Path>,
) -> Result<()> {
    let client = HttpModelClient::new(config.api_url.clone(), config.api_key.clone());
    let generator = LessonGenerator::new(Arc::new(client), config.generator_config());

    tracing::info!(
        topic = %req.topic,
        function_type = %req.function_type,
        strategy = %config.strategy,
        offline = config.offline,
        stream,
        "generating lesson plan"
    );

    let plan = if stream {
        let mut stderr = std::io::stderr();
        let plan = generator
            .generate_streaming(req, |chunk| {
                let _ = stderr.write_all(chunk.as_bytes());
                let _ = stderr.flush();
            })
            .await;
        eprintln!();
        plan
    } else {
        let generation = generator.run(req).await;
        if generation.source == PlanSource::Emergency {
            eprintln!("warning: model output was unusable; emitted the emergency plan");
        }
        generation.plan
    };

    let json = render_plan(&plan)?;
    match output {
        Some(target) => {
            let path = output_path(target, &req.topic, Local::now());
            std::fs::write(&path, json + "\n")
                .with_context(|| format!("failed to write plan to {}", path.display()))?;
            println!("Plan written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Pretty JSON for a plan.
pub fn render_plan(plan: &LessonPlan) -> Result<String> {
    serde_json::to_string_pretty(plan).context("failed to serialize plan")
}

/// Where to write a plan. An existing directory gets a timestamped file
/// named after the topic; anything else is used as the file path.
pub fn output_path(target: &Path, topic: &str, now: DateTime<Local>) -> PathBuf {
    if target.is_dir() {
        target.join(format!("{}-{}.json", slug(topic), now.format("%Y%m%d-%H%M%S")))
    } else {
        target.to_path_buf()
    }
}

fn slug(topic: &str) -> String {
    let mut out = String::with_capacity(topic.len());
    for ch in topic.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "lesson".to_string()
    } else {
        trimmed.to_string()
    }
}
