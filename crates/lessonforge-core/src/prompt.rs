//! Prompt construction for lesson-plan generation.
//!
//! Builds the role-tagged message list for one outbound call. Pure logic,
//! no I/O. The request's function type picks between the full-lesson and
//! short-activity wording; [`PromptPart`] picks between asking for the
//! whole plan or for one half of a segmented generation.

use std::fmt;
use std::str::FromStr;

use crate::model::ChatMessage;
use crate::plan::{FunctionType, GenerationRequest};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which part of the plan a prompt asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PromptPart {
    /// The complete plan in one response.
    #[default]
    Whole,
    /// Title, metadata, and teaching preparation only.
    Meta,
    /// The procedure sequence only.
    Procedures,
}

impl fmt::Display for PromptPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole => write!(f, "full"),
            Self::Meta => write!(f, "meta"),
            Self::Procedures => write!(f, "procedures"),
        }
    }
}

impl FromStr for PromptPart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" | "whole" => Ok(Self::Whole),
            "meta" => Ok(Self::Meta),
            "procedures" => Ok(Self::Procedures),
            other => Err(format!(
                "invalid prompt part {other:?} (expected full, meta, or procedures)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema references
// ---------------------------------------------------------------------------

/// Canonical shape of the metadata and preparation half.
const META_SCHEMA: &str = r#"```json
{
  "title": {"zh": "中文标题", "en": "English title"},
  "grade": "string",
  "duration": 40,
  "teaching_method": "string",
  "preparation": {
    "objectives": {"zh": ["..."], "en": ["..."]},
    "key_words": {"zh": ["..."], "en": ["..."]},
    "sentence_structures": {"zh": ["..."], "en": ["..."]},
    "teaching_aids": {"zh": "...", "en": "..."},
    "student_analysis": {"zh": "...", "en": "..."},
    "audience_analysis": [
      {"category": "proficiency", "description": "..."}
    ]
  }
}
```"#;

/// Canonical shape of the procedure half.
const PROCEDURE_SCHEMA: &str = r#"```json
{
  "procedures": [
    {
      "title": {"zh": "环节标题", "en": "Step title"},
      "content": {"zh": "Markdown 教学脚本", "en": "Markdown teaching script"},
      "duration": 5
    }
  ]
}
```"#;

const OUTPUT_RULES: &str = "## Output Rules

1. Respond with ONE JSON object and nothing else. No prose, no markdown fences.
2. Every bilingual field has both a `zh` and an `en` value.
3. List fields are JSON arrays, even with one item.
4. Step `content` is a Markdown script of what the teacher says and does.
5. Step durations are whole minutes and add up to the lesson duration.
6. Do not split a step into continuation parts; write each step once.
";

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

/// Messages for one generation call.
pub fn build_messages(req: &GenerationRequest, part: PromptPart) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_system_prompt(req.function_type, part)),
        ChatMessage::user(build_user_prompt(req, part)),
    ]
}

/// Role, output contract, and schema for the requested part.
pub fn build_system_prompt(function_type: FunctionType, part: PromptPart) -> String {
    let mut prompt = String::with_capacity(2048);

    match function_type {
        FunctionType::Lesson => prompt.push_str(
            "You are an experienced English teacher who writes complete, \
             classroom-ready bilingual (Chinese and English) lesson plans.\n\n",
        ),
        FunctionType::Activity => prompt.push_str(
            "You are an experienced English teacher who designs short, \
             engaging bilingual (Chinese and English) classroom activities.\n\n",
        ),
    }

    match part {
        PromptPart::Whole => {
            prompt.push_str("Return the complete plan as JSON with this shape:\n\n");
            prompt.push_str(META_SCHEMA);
            prompt.push_str("\n\nplus a top-level `procedures` array:\n\n");
            prompt.push_str(PROCEDURE_SCHEMA);
        }
        PromptPart::Meta => {
            prompt.push_str(
                "Return ONLY the title, metadata, and teaching preparation. \
                 Do NOT include procedures.\n\n",
            );
            prompt.push_str(META_SCHEMA);
        }
        PromptPart::Procedures => {
            prompt.push_str(
                "Return ONLY the teaching procedure sequence. \
                 Do NOT include title or preparation.\n\n",
            );
            prompt.push_str(PROCEDURE_SCHEMA);
        }
    }
    prompt.push_str("\n\n");
    prompt.push_str(OUTPUT_RULES);

    if part != PromptPart::Meta {
        let window = function_type.step_window();
        prompt.push_str(&format!(
            "7. The `procedures` array has between {} and {} steps.\n",
            window.start(),
            window.end()
        ));
    }

    prompt
}

/// Request parameters and optional language hints.
pub fn build_user_prompt(req: &GenerationRequest, part: PromptPart) -> String {
    let mut prompt = String::with_capacity(512);

    let kind = match req.function_type {
        FunctionType::Lesson => "lesson plan",
        FunctionType::Activity => "classroom activity",
    };
    prompt.push_str(&format!("Write a {kind} on the topic \"{}\".\n\n", req.topic.trim()));

    prompt.push_str("## Parameters\n\n");
    if !req.grade.trim().is_empty() {
        prompt.push_str(&format!("- **Grade:** {}\n", req.grade.trim()));
    }
    prompt.push_str(&format!("- **Duration:** {} minutes\n", req.duration));
    if req.teaching_method.trim().is_empty() {
        prompt.push_str("- **Teaching method:** your choice, suited to the topic\n");
    } else {
        prompt.push_str(&format!("- **Teaching method:** {}\n", req.teaching_method.trim()));
    }

    if req.has_hints() {
        prompt.push_str("\n## Language Focus\n\n");
        push_hint(&mut prompt, "Vocabulary", &req.vocabulary);
        push_hint(&mut prompt, "Sentence patterns", &req.sentences);
        push_hint(&mut prompt, "Grammar", &req.grammar);
    }

    match part {
        PromptPart::Whole => {}
        PromptPart::Meta => prompt.push_str(
            "\nAnother request writes the procedures; describe only what is \
             prepared before class.\n",
        ),
        PromptPart::Procedures => prompt.push_str(
            "\nAnother request writes the title and preparation; describe only \
             the steps of the lesson.\n",
        ),
    }

    prompt
}

fn push_hint(prompt: &mut String, label: &str, items: &[String]) {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !items.is_empty() {
        prompt.push_str(&format!("- **{label}:** {}\n", items.join(", ")));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
