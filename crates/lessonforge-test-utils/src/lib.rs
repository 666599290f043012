//! Shared test utilities for lessonforge integration tests.
//!
//! Provides model doubles that stand in for the outbound model call and
//! builders for canonical plans and the JSON a well-behaved model returns.
//!
//! - [`ScriptedModel`]: canned replies per prompt part, records requests.
//! - [`FailingModel`]: every call errors.
//! - [`SlowModel`]: answers after a delay, for timeout tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};

use lessonforge_core::model::{ModelClient, ModelRequest, Role};
use lessonforge_core::plan::{
    AudienceEntry, Bilingual, FunctionType, LessonPlan, ProcedureStep, TeachingPreparation,
};
use lessonforge_core::prompt::{PromptPart, build_system_prompt};

// ===========================================================================
// Prompt inspection
// ===========================================================================

/// Which part of the plan `request` asks for, judged by its system prompt.
pub fn prompt_part(request: &ModelRequest) -> Option<PromptPart> {
    let system = request.messages.iter().find(|m| m.role == Role::System)?;
    [FunctionType::Lesson, FunctionType::Activity]
        .into_iter()
        .flat_map(|ft| {
            [PromptPart::Whole, PromptPart::Meta, PromptPart::Procedures]
                .into_iter()
                .map(move |part| (ft, part))
        })
        .find(|(ft, part)| build_system_prompt(*ft, *part) == system.content)
        .map(|(_, part)| part)
}

// ===========================================================================
// ScriptedModel
// ===========================================================================

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// A model that answers from per-part queues of canned replies.
///
/// Replies are consumed in order; the last reply of a queue is repeated
/// for every further call. A part with no replies errors.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    whole: Mutex<VecDeque<Reply>>,
    meta: Mutex<VecDeque<Reply>>,
    procedures: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply for `part`.
    pub fn reply(self, part: PromptPart, text: impl Into<String>) -> Self {
        self.queue(part).lock().unwrap().push_back(Reply::Text(text.into()));
        self
    }

    /// Queue a failed call for `part`.
    pub fn fail(self, part: PromptPart, message: impl Into<String>) -> Self {
        self.queue(part).lock().unwrap().push_back(Reply::Fail(message.into()));
        self
    }

    /// Wait `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests received for `part`.
    pub fn calls_for(&self, part: PromptPart) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| prompt_part(r) == Some(part))
            .count()
    }

    fn queue(&self, part: PromptPart) -> &Mutex<VecDeque<Reply>> {
        match part {
            PromptPart::Whole => &self.whole,
            PromptPart::Meta => &self.meta,
            PromptPart::Procedures => &self.procedures,
        }
    }

    fn next_reply(&self, part: PromptPart) -> Option<Reply> {
        let mut queue = self.queue(part).lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let part = prompt_part(request).ok_or_else(|| anyhow!("unrecognised prompt"))?;
        match self.next_reply(part) {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => bail!("{message}"),
            None => bail!("no scripted reply for {part} prompt"),
        }
    }
}

// ===========================================================================
// FailingModel / SlowModel
// ===========================================================================

/// A model whose every call fails.
#[derive(Debug, Default)]
pub struct FailingModel {
    calls: AtomicUsize,
}

impl FailingModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &ModelRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("model unavailable")
    }
}

/// A model that answers with `text` after `delay`.
#[derive(Debug)]
pub struct SlowModel {
    delay: Duration,
    text: String,
}

impl SlowModel {
    pub fn new(delay: Duration, text: impl Into<String>) -> Self {
        Self {
            delay,
            text: text.into(),
        }
    }
}

#[async_trait]
impl ModelClient for SlowModel {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, _request: &ModelRequest) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(self.text.clone())
    }
}

// ===========================================================================
// Plan builders
// ===========================================================================

fn both(text: impl Into<String>) -> Bilingual<String> {
    Bilingual::both(text.into())
}

/// A canonical plan about `topic` with `steps` four-minute procedure steps.
pub fn canonical_plan(topic: &str, steps: usize) -> LessonPlan {
    LessonPlan {
        title: Bilingual::new(format!("{topic}主题课"), format!("All About {topic}")),
        grade: "Grade 3".to_string(),
        duration: 40,
        teaching_method: "task-based".to_string(),
        preparation: TeachingPreparation {
            objectives: Bilingual::new(
                vec![format!("认读与{topic}相关的单词"), "用目标句型问答".to_string()],
                vec![format!("Read words about {topic}"), "Ask and answer with the target patterns".to_string()],
            ),
            key_words: Bilingual::both(vec![topic.to_lowercase()]),
            sentence_structures: Bilingual::new(
                vec!["你喜欢……吗？".to_string()],
                vec!["Do you like ...?".to_string()],
            ),
            teaching_aids: Bilingual::new("单词卡片".to_string(), "Word cards".to_string()),
            student_analysis: both("Curious learners with basic vocabulary."),
            audience_analysis: vec![AudienceEntry::new("proficiency", "A1 to A2")],
        },
        procedures: (1..=steps).map(|i| canonical_step(topic, i)).collect(),
    }
}

/// Step `i` of [`canonical_plan`].
pub fn canonical_step(topic: &str, i: usize) -> ProcedureStep {
    ProcedureStep {
        title: Bilingual::new(format!("第{i}步"), format!("Step {i}")),
        content: Bilingual::new(
            format!("活动{i}：围绕{topic}练习"),
            format!("Activity {i}: practise talking about {topic}"),
        ),
        duration: Some(4),
    }
}

/// JSON text of [`canonical_plan`], as a well-behaved model would return it.
pub fn plan_json(topic: &str, steps: usize) -> String {
    serde_json::to_string_pretty(&canonical_plan(topic, steps)).unwrap()
}

/// JSON text of the metadata-and-preparation half of [`canonical_plan`].
pub fn meta_json(topic: &str) -> String {
    let mut value = serde_json::to_value(canonical_plan(topic, 0)).unwrap();
    if let Value::Object(map) = &mut value {
        map.remove("procedures");
    }
    value.to_string()
}

/// JSON text of the procedure half of [`canonical_plan`].
pub fn procedures_json(topic: &str, steps: usize) -> String {
    json!({ "procedures": canonical_plan(topic, steps).procedures }).to_string()
}
