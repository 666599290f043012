//! `lessonforge prompt`: show the messages a generation would send.

use lessonforge_core::model::ChatMessage;
use lessonforge_core::plan::GenerationRequest;
use lessonforge_core::prompt::{PromptPart, build_messages};

use crate::config::LessonforgeConfig;

pub fn run_prompt(config: &LessonforgeConfig, req: &GenerationRequest, part: PromptPart) {
    print!("{}", render_prompt(&config.model, &build_messages(req, part)));
}

/// Messages as plain text, one `--- role ---` header per message.
pub fn render_prompt(model: &str, messages: &[ChatMessage]) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(&format!("model: {model}\n"));
    for message in messages {
        out.push_str(&format!("\n--- {} ---\n", message.role));
        out.push_str(message.content.trim_end());
        out.push('\n');
    }
    out
}
