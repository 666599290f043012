//! End-to-end generation through `LessonGenerator` with model doubles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

use lessonforge_core::model::{ModelClient, ModelRequest};
use lessonforge_core::orchestrator::{GeneratorConfig, LessonGenerator, PlanSource, Strategy};
use lessonforge_core::plan::{FunctionType, GenerationRequest};
use lessonforge_core::prompt::PromptPart;
use lessonforge_test_utils::{
    FailingModel, ScriptedModel, SlowModel, canonical_plan, meta_json, plan_json, procedures_json,
};

fn segmented() -> GeneratorConfig {
    GeneratorConfig::default()
}

fn monolithic() -> GeneratorConfig {
    GeneratorConfig {
        strategy: Strategy::Monolithic,
        ..GeneratorConfig::default()
    }
}

/// Streams a fixed text in a few fragments.
struct ChunkedModel {
    chunks: Vec<String>,
}

#[async_trait]
impl ModelClient for ChunkedModel {
    fn name(&self) -> &str {
        "chunked"
    }

    async fn complete(&self, _request: &ModelRequest) -> Result<String> {
        Ok(self.chunks.concat())
    }

    fn stream<'a>(&'a self, _request: &'a ModelRequest) -> BoxStream<'a, Result<String>> {
        futures::stream::iter(self.chunks.iter().cloned().map(Ok)).boxed()
    }
}

// ===========================================================================
// Fallback chain
// ===========================================================================

#[tokio::test]
async fn failing_model_yields_the_emergency_plan() {
    let model = Arc::new(FailingModel::new());
    let generator = LessonGenerator::new(model.clone(), segmented());
    let req = GenerationRequest::new("Weather").with_grade("Grade 3");

    let generation = generator.run(&req).await;

    assert_eq!(generation.source, PlanSource::Emergency);
    assert_eq!(generation.plan.title.en, "Emergency Lesson Plan for Weather");
    assert_eq!(generation.plan.grade, "Grade 3");
    assert_eq!(generation.plan.procedures.len(), 10);
    assert!(generation.novelty.is_none());
    // Meta, procedures, then the monolithic retry.
    assert_eq!(model.calls(), 3);
    assert!(generator.history().is_empty());
}

#[tokio::test]
async fn empty_object_reply_escalates_to_emergency() {
    let model = Arc::new(ScriptedModel::new().reply(PromptPart::Whole, "{}"));
    let generator = LessonGenerator::new(model, monolithic());

    let generation = generator.run(&GenerationRequest::new("Weather")).await;
    assert_eq!(generation.source, PlanSource::Emergency);
    assert_eq!(generation.plan.title.en, "Emergency Lesson Plan for Weather");
}

#[tokio::test]
async fn prose_reply_escalates_to_emergency() {
    let model = Arc::new(ScriptedModel::new().reply(PromptPart::Whole, "Sorry, I can't do that."));
    let generator = LessonGenerator::new(model, monolithic());
    let plan = generator.generate(&GenerationRequest::new("Food")).await;
    assert_eq!(plan.title.en, "Emergency Lesson Plan for Food");
}

#[tokio::test(start_paused = true)]
async fn slow_model_times_out_into_emergency() {
    let model = Arc::new(SlowModel::new(Duration::from_secs(600), plan_json("Weather", 12)));
    let config = GeneratorConfig {
        call_timeout: Duration::from_secs(5),
        ..GeneratorConfig::default()
    };
    let generator = LessonGenerator::new(model, config);

    let generation = generator.run(&GenerationRequest::new("Weather")).await;
    assert_eq!(generation.source, PlanSource::Emergency);
}

#[tokio::test]
async fn emergency_plan_keeps_requested_method_and_duration() {
    let generator = LessonGenerator::new(Arc::new(FailingModel::new()), monolithic());
    let req = GenerationRequest::new("Animals")
        .with_duration(45)
        .with_teaching_method("TPR");

    let plan = generator.generate(&req).await;
    assert_eq!(plan.teaching_method, "TPR");
    assert_eq!(plan.duration, 45);
    let minutes: u32 = plan.procedures.iter().filter_map(|s| s.duration).sum();
    assert_eq!(minutes, 45);
}

// ===========================================================================
// Segmented
// ===========================================================================

#[tokio::test]
async fn segmented_success_merges_both_halves() {
    let model = Arc::new(
        ScriptedModel::new()
            .reply(PromptPart::Meta, meta_json("Weather"))
            .reply(PromptPart::Procedures, procedures_json("Weather", 12)),
    );
    let generator = LessonGenerator::new(model.clone(), segmented());

    let generation = generator.run(&GenerationRequest::new("Weather")).await;

    assert_eq!(generation.source, PlanSource::Segmented);
    assert_eq!(generation.plan, canonical_plan("Weather", 12));
    assert_eq!(model.calls_for(PromptPart::Meta), 1);
    assert_eq!(model.calls_for(PromptPart::Procedures), 1);
    assert_eq!(model.calls_for(PromptPart::Whole), 0);
}

#[tokio::test(start_paused = true)]
async fn segment_calls_run_concurrently() {
    let delay = Duration::from_secs(3);
    let model = Arc::new(
        ScriptedModel::new()
            .reply(PromptPart::Meta, meta_json("Weather"))
            .reply(PromptPart::Procedures, procedures_json("Weather", 12))
            .with_delay(delay),
    );
    let config = GeneratorConfig {
        call_timeout: Duration::from_secs(5),
        ..GeneratorConfig::default()
    };
    let generator = LessonGenerator::new(model.clone(), config);

    let start = tokio::time::Instant::now();
    let generation = generator.run(&GenerationRequest::new("Weather")).await;
    let elapsed = start.elapsed();

    assert_eq!(generation.source, PlanSource::Segmented);
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2, "halves ran one after the other: {elapsed:?}");
    assert_eq!(model.calls_for(PromptPart::Whole), 0);
}

#[tokio::test]
async fn failed_procedure_segment_falls_back_to_monolithic() {
    let model = Arc::new(
        ScriptedModel::new()
            .reply(PromptPart::Meta, meta_json("Weather"))
            .fail(PromptPart::Procedures, "connection reset")
            .reply(PromptPart::Whole, plan_json("Weather", 11)),
    );
    let generator = LessonGenerator::new(model.clone(), segmented());

    let generation = generator.run(&GenerationRequest::new("Weather")).await;

    assert_eq!(generation.source, PlanSource::Monolithic);
    assert_eq!(generation.plan.procedures.len(), 11);
    assert_eq!(model.calls_for(PromptPart::Whole), 1);
}

#[tokio::test]
async fn short_merged_plan_falls_back_to_monolithic() {
    let model = Arc::new(
        ScriptedModel::new()
            .reply(PromptPart::Meta, meta_json("Weather"))
            .reply(PromptPart::Procedures, procedures_json("Weather", 4))
            .reply(PromptPart::Whole, plan_json("Weather", 12)),
    );
    let generator = LessonGenerator::new(model.clone(), segmented());

    let generation = generator.run(&GenerationRequest::new("Weather")).await;

    assert_eq!(generation.source, PlanSource::Monolithic);
    assert_eq!(generation.plan.procedures.len(), 12);
}

#[tokio::test]
async fn meta_segment_without_title_is_rejected() {
    let model = Arc::new(
        ScriptedModel::new()
            .reply(PromptPart::Meta, r#"{"grade": "Grade 3"}"#)
            .reply(PromptPart::Procedures, procedures_json("Weather", 12))
            .reply(PromptPart::Whole, "not json"),
    );
    let generator = LessonGenerator::new(model, segmented());

    let generation = generator.run(&GenerationRequest::new("Weather")).await;
    assert_eq!(generation.source, PlanSource::Emergency);
}

#[tokio::test]
async fn activity_accepts_six_steps() {
    let model = Arc::new(
        ScriptedModel::new()
            .reply(PromptPart::Meta, meta_json("Board Game"))
            .reply(PromptPart::Procedures, procedures_json("Board Game", 6)),
    );
    let generator = LessonGenerator::new(model, segmented());
    let req = GenerationRequest::new("Board Game").with_function_type(FunctionType::Activity);

    let generation = generator.run(&req).await;
    assert_eq!(generation.source, PlanSource::Segmented);
    assert_eq!(generation.plan.procedures.len(), 6);
}

// ===========================================================================
// Monolithic
// ===========================================================================

#[tokio::test]
async fn messy_fenced_legacy_response_is_normalized() {
    let steps: Vec<String> = (1..=10)
        .map(|i| format!(r#"{{"step": "Stage {i}", "description": "Do activity {i}", "time": "4 min"}},"#))
        .collect();
    let raw = format!(
        "Here is your lesson plan!\n```json\n{{\n  \"lessonTitle\": \"Weather Fun\",\n  \"objectives\": [\"Talk about the weather\",],\n  \"teaching_procedures\": [\n{}\n  ],\n}}\n```\nLet me know if you need changes.",
        steps.join("\n")
    );
    let model = Arc::new(ScriptedModel::new().reply(PromptPart::Whole, raw));
    let generator = LessonGenerator::new(model, monolithic());

    let generation = generator.run(&GenerationRequest::new("Weather").with_grade("Grade 2")).await;

    assert_eq!(generation.source, PlanSource::Monolithic);
    let plan = generation.plan;
    assert_eq!(plan.title.zh, "Weather Fun");
    assert_eq!(plan.title.en, "Weather Fun");
    assert_eq!(plan.grade, "Grade 2");
    assert_eq!(plan.preparation.objectives.en, vec!["Talk about the weather"]);
    assert_eq!(plan.procedures.len(), 10);
    assert_eq!(plan.procedures[9].title.en, "Stage 10");
    assert_eq!(plan.procedures[9].duration, Some(4));
}

#[tokio::test]
async fn oversized_continuation_duration_is_survived() {
    let mut steps: Vec<serde_json::Value> = (1..=11)
        .map(|i| serde_json::json!({"title": format!("S{i}"), "content": format!("Do {i}"), "duration": 5}))
        .collect();
    steps.insert(3, serde_json::json!({"title": "S3 (cont.)", "content": "More", "duration": 4294967295u64}));
    let raw = serde_json::json!({"title": "Weather", "procedures": steps}).to_string();
    let model = Arc::new(ScriptedModel::new().reply(PromptPart::Whole, raw));
    let generator = LessonGenerator::new(model, monolithic());

    let generation = generator.run(&GenerationRequest::new("Weather")).await;

    assert_eq!(generation.source, PlanSource::Monolithic);
    assert_eq!(generation.plan.procedures.len(), 11);
    assert_eq!(generation.plan.procedures[2].duration, Some(5));
}

// ===========================================================================
// Streaming and offline
// ===========================================================================

#[tokio::test]
async fn streaming_reports_each_chunk_and_returns_the_plan() {
    let text = plan_json("Weather", 12);
    let chars = text.chars().count();
    let cut = |n: usize| text.char_indices().nth(n).map(|(idx, _)| idx).unwrap();
    let (first, second) = (cut(chars / 3), cut(2 * chars / 3));
    let model = Arc::new(ChunkedModel {
        chunks: vec![
            text[..first].to_string(),
            text[first..second].to_string(),
            text[second..].to_string(),
        ],
    });
    let generator = LessonGenerator::new(model, segmented());

    let mut seen = Vec::new();
    let plan = generator
        .generate_streaming(&GenerationRequest::new("Weather"), |chunk| {
            seen.push(chunk.to_string())
        })
        .await;

    assert_eq!(seen.len(), 3);
    assert_eq!(seen.concat(), text);
    assert_eq!(plan, canonical_plan("Weather", 12));
    assert_eq!(generator.history().len(), 1);
}

#[tokio::test]
async fn streaming_failure_yields_emergency_plan() {
    let generator = LessonGenerator::new(Arc::new(FailingModel::new()), segmented());
    let mut chunks = 0;
    let plan = generator
        .generate_streaming(&GenerationRequest::new("Weather"), |_| chunks += 1)
        .await;
    assert_eq!(chunks, 0);
    assert_eq!(plan.title.en, "Emergency Lesson Plan for Weather");
}

#[tokio::test]
async fn offline_mode_never_calls_the_model() {
    let model = Arc::new(FailingModel::new());
    let config = GeneratorConfig {
        offline: true,
        ..GeneratorConfig::default()
    };
    let generator = LessonGenerator::new(model.clone(), config);

    let generation = generator.run(&GenerationRequest::new("Space").with_grade("Grade 5")).await;

    assert_eq!(generation.source, PlanSource::Offline);
    assert_eq!(generation.plan.title.en, "Exploring Space");
    assert_eq!(generation.plan.grade, "Grade 5");
    assert_eq!(model.calls(), 0);
}
