//! Generation orchestrator: turns a request into a plan, whatever happens.
//!
//! ```text
//! generate(req)
//!   |-- offline ----------------------------> fixture ------------+
//!   |-- segmented: join(meta, procedures) --> merge --> strict ---+--> novelty --> history
//!   |       | any failure                                         |
//!   |       v                                                     |
//!   +-- monolithic: one call --> extract --> strict --------------+
//!           | any failure
//!           v
//!        emergency plan
//! ```
//!
//! No public `generate*` method returns an error. Every failure is logged
//! at `warn` and absorbed into the next fallback.

pub mod offline;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emergency::emergency_plan_for;
use crate::json::extract_json_from_text;
use crate::model::{ChatMessage, ModelClient, ModelRequest};
use crate::normalize::{NormalizeOptions, ValidationError, finalize_plan, normalize_plan};
use crate::novelty::{GenerationHistory, NoveltyReport, check_novelty};
use crate::plan::{GenerationRequest, LessonPlan};
use crate::prompt::{PromptPart, build_messages};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How a request is turned into outbound calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One call for the whole plan.
    Monolithic,
    /// Two concurrent calls (metadata + preparation, procedures), with a
    /// monolithic fallback.
    #[default]
    Segmented,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monolithic => write!(f, "monolithic"),
            Self::Segmented => write!(f, "segmented"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monolithic" => Ok(Self::Monolithic),
            "segmented" => Ok(Self::Segmented),
            other => Err(format!(
                "invalid strategy {other:?} (expected monolithic or segmented)"
            )),
        }
    }
}

/// Runtime knobs for a [`LessonGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Model identifier sent with every call.
    pub model: String,
    /// Wall-clock limit per outbound call.
    pub call_timeout: Duration,
    pub strategy: Strategy,
    /// Skip outbound calls and use the local fixture plan.
    pub offline: bool,
}

impl GeneratorConfig {
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            call_timeout: Self::DEFAULT_TIMEOUT,
            strategy: Strategy::default(),
            offline: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// One half of a segmented generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Meta,
    Procedures,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meta => write!(f, "meta"),
            Self::Procedures => write!(f, "procedures"),
        }
    }
}

/// Failure of one generation attempt. Never escapes the public API.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("model call failed: {0:#}")]
    ModelCall(anyhow::Error),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("{segment} segment failed: {source}")]
    Segment {
        segment: Segment,
        source: Box<GenerateError>,
    },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Which path produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Segmented,
    Monolithic,
    Streamed,
    Offline,
    Emergency,
}

impl fmt::Display for PlanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segmented => write!(f, "segmented"),
            Self::Monolithic => write!(f, "monolithic"),
            Self::Streamed => write!(f, "streamed"),
            Self::Offline => write!(f, "offline"),
            Self::Emergency => write!(f, "emergency"),
        }
    }
}

/// A finished generation: the plan plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub plan: LessonPlan,
    pub source: PlanSource,
    /// Novelty check result; `None` for emergency plans, which are not
    /// checked or recorded.
    pub novelty: Option<NoveltyReport>,
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Entry point of the pipeline. Owns the novelty history.
///
/// Calls against one instance are expected to be sequential; concurrent
/// calls are safe but may interleave their history updates.
pub struct LessonGenerator {
    client: Arc<dyn ModelClient>,
    config: GeneratorConfig,
    history: Mutex<GenerationHistory>,
}

impl LessonGenerator {
    pub fn new(client: Arc<dyn ModelClient>, config: GeneratorConfig) -> Self {
        Self {
            client,
            config,
            history: Mutex::new(GenerationHistory::new()),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a plan with the configured strategy. Never fails.
    pub async fn generate(&self, req: &GenerationRequest) -> LessonPlan {
        self.run(req).await.plan
    }

    /// Like [`LessonGenerator::generate`], also reporting the path taken
    /// and the novelty check.
    pub async fn run(&self, req: &GenerationRequest) -> Generation {
        if self.config.offline {
            return self.run_offline(req);
        }
        match self.config.strategy {
            Strategy::Monolithic => self.run_monolithic(req).await,
            Strategy::Segmented => self.run_segmented(req).await,
        }
    }

    /// One outbound call for the whole plan, falling back to the emergency plan.
    pub async fn generate_monolithic(&self, req: &GenerationRequest) -> LessonPlan {
        self.run_monolithic(req).await.plan
    }

    /// Two concurrent calls, falling back to [`LessonGenerator::generate_monolithic`].
    pub async fn generate_segmented(&self, req: &GenerationRequest) -> LessonPlan {
        self.run_segmented(req).await.plan
    }

    /// One streaming call for the whole plan. `on_chunk` sees each text
    /// fragment as it arrives; the returned plan follows the same contract
    /// as [`LessonGenerator::generate`].
    pub async fn generate_streaming<F>(&self, req: &GenerationRequest, mut on_chunk: F) -> LessonPlan
    where
        F: FnMut(&str) + Send,
    {
        if self.config.offline {
            let generation = self.run_offline(req);
            on_chunk(&offline::offline_response(req));
            return generation.plan;
        }

        let attempt = async {
            let request = self.model_request(req, PromptPart::Whole);
            let text = self.stream_text(&request, &mut on_chunk).await?;
            let value = extract_json_from_text(&text);
            Ok::<_, GenerateError>(normalize_plan(&value, &NormalizeOptions::for_request(req))?)
        };

        match attempt.await {
            Ok(plan) => self.accept(plan, PlanSource::Streamed, req).plan,
            Err(err) => self.emergency(req, &err).plan,
        }
    }

    /// Snapshot of recent plans, most recent first.
    pub fn history(&self) -> Vec<LessonPlan> {
        self.lock_history().snapshot()
    }

    pub fn reset_history(&self) {
        self.lock_history().clear();
    }

    // -- paths --

    fn run_offline(&self, req: &GenerationRequest) -> Generation {
        let value = extract_json_from_text(&offline::offline_response(req));
        match normalize_plan(&value, &NormalizeOptions::for_request(req)) {
            Ok(plan) => self.accept(plan, PlanSource::Offline, req),
            Err(err) => self.emergency(req, &err.into()),
        }
    }

    async fn run_monolithic(&self, req: &GenerationRequest) -> Generation {
        match self.try_monolithic(req).await {
            Ok(plan) => self.accept(plan, PlanSource::Monolithic, req),
            Err(err) => self.emergency(req, &err),
        }
    }

    async fn run_segmented(&self, req: &GenerationRequest) -> Generation {
        match self.try_segmented(req).await {
            Ok(plan) => self.accept(plan, PlanSource::Segmented, req),
            Err(err) => {
                tracing::warn!(
                    topic = %req.topic,
                    error = %err,
                    "segmented generation failed, falling back to monolithic"
                );
                self.run_monolithic(req).await
            }
        }
    }

    async fn try_monolithic(&self, req: &GenerationRequest) -> Result<LessonPlan, GenerateError> {
        let text = self.call(&self.model_request(req, PromptPart::Whole)).await?;
        let value = extract_json_from_text(&text);
        Ok(normalize_plan(&value, &NormalizeOptions::for_request(req))?)
    }

    async fn try_segmented(&self, req: &GenerationRequest) -> Result<LessonPlan, GenerateError> {
        let (meta, procedures) = tokio::join!(
            self.segment(req, Segment::Meta),
            self.segment(req, Segment::Procedures),
        );

        for err in [meta.as_ref().err(), procedures.as_ref().err()].into_iter().flatten() {
            tracing::warn!(topic = %req.topic, error = %err, "segment rejected");
        }
        let meta = meta?;
        let procedures = procedures?;

        let merged = LessonPlan {
            procedures: procedures.procedures,
            ..meta
        };
        Ok(finalize_plan(merged, &NormalizeOptions::for_request(req))?)
    }

    /// One half of a segmented generation, validated in relaxed mode.
    async fn segment(&self, req: &GenerationRequest, segment: Segment) -> Result<LessonPlan, GenerateError> {
        let part = match segment {
            Segment::Meta => PromptPart::Meta,
            Segment::Procedures => PromptPart::Procedures,
        };
        let attempt = async {
            let text = self.call(&self.model_request(req, part)).await?;
            let value = extract_json_from_text(&text);
            let plan = normalize_plan(&value, &NormalizeOptions::for_request(req).relaxed())?;

            let missing = match segment {
                Segment::Meta if plan.title.is_blank() => Some("title"),
                Segment::Procedures if plan.procedures.is_empty() => Some("procedures"),
                _ => None,
            };
            match missing {
                Some(field) => Err(GenerateError::from(ValidationError::MissingField(field))),
                None => Ok(plan),
            }
        };
        attempt.await.map_err(|source| GenerateError::Segment {
            segment,
            source: Box::new(source),
        })
    }

    // -- outbound calls --

    fn model_request(&self, req: &GenerationRequest, part: PromptPart) -> ModelRequest {
        let messages: Vec<ChatMessage> = build_messages(req, part);
        ModelRequest::new(self.config.model.clone(), messages)
    }

    async fn call(&self, request: &ModelRequest) -> Result<String, GenerateError> {
        let timeout = self.config.call_timeout;
        tracing::debug!(client = self.client.name(), model = %request.model, "calling model");
        tokio::time::timeout(timeout, self.client.complete(request))
            .await
            .map_err(|_| GenerateError::Timeout(timeout))?
            .map_err(GenerateError::ModelCall)
    }

    async fn stream_text<F>(&self, request: &ModelRequest, on_chunk: &mut F) -> Result<String, GenerateError>
    where
        F: FnMut(&str) + Send,
    {
        let timeout = self.config.call_timeout;
        let collect = async {
            let mut stream = self.client.stream(request);
            let mut text = String::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(GenerateError::ModelCall)?;
                on_chunk(&chunk);
                text.push_str(&chunk);
            }
            Ok::<_, GenerateError>(text)
        };
        tokio::time::timeout(timeout, collect)
            .await
            .map_err(|_| GenerateError::Timeout(timeout))?
    }

    // -- completion --

    /// Novelty-check a plan, record it, and hand it back.
    fn accept(&self, plan: LessonPlan, source: PlanSource, req: &GenerationRequest) -> Generation {
        let report = {
            let mut history = self.lock_history();
            let report = check_novelty(&plan, &history);
            history.record(plan.clone());
            report
        };
        tracing::info!(
            topic = %req.topic,
            source = %source,
            steps = plan.procedures.len(),
            novelty = report.max_score,
            "lesson plan ready"
        );
        Generation {
            plan,
            source,
            novelty: Some(report),
        }
    }

    fn emergency(&self, req: &GenerationRequest, err: &GenerateError) -> Generation {
        tracing::warn!(topic = %req.topic, error = %err, "generation failed, using emergency plan");
        Generation {
            plan: emergency_plan_for(req),
            source: PlanSource::Emergency,
            novelty: None,
        }
    }

    fn lock_history(&self) -> MutexGuard<'_, GenerationHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
