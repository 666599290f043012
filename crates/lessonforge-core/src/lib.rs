//! Core pipeline for generating bilingual lesson plans from an LLM.
//!
//! ```text
//! GenerationRequest
//!     |
//!     v
//! orchestrator --prompt--> model --text--> json (extract, repair)
//!     |                                        |
//!     |                                        v
//!     |                                    normalize (adapters, steps, validation)
//!     |                                        |
//!     +<-------------- novelty <---------------+
//!     |
//!     v
//! LessonPlan            (emergency plan when anything fails)
//! ```

pub mod emergency;
pub mod json;
pub mod model;
pub mod normalize;
pub mod novelty;
pub mod orchestrator;
pub mod plan;
pub mod prompt;

pub use emergency::{emergency_plan, emergency_plan_for};
pub use json::{extract_json_from_text, repair_json};
pub use model::{HttpModelClient, ModelClient};
pub use normalize::{NormalizeOptions, ValidationError, normalize_plan};
pub use orchestrator::{GenerateError, Generation, GeneratorConfig, LessonGenerator, PlanSource, Strategy};
pub use plan::{FunctionType, GenerationRequest, LessonPlan};
