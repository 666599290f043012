//! Outbound model calls.
//!
//! ```text
//! LessonGenerator --Arc<dyn ModelClient>--> complete(request) -> String
//!                                           stream(request)   -> chunks
//! ```

pub mod openai;
pub mod trait_def;
pub mod types;

pub use openai::HttpModelClient;
pub use trait_def::ModelClient;
pub use types::{ChatMessage, ModelRequest, Role};
