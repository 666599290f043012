//! Getting a JSON value out of unreliable model text.
//!
//! ```text
//! raw text --frames--> content --fences/think--> "{ ... }" --parse--> Value
//!                                                     |
//!                                                     +--repair--> Value | {}
//! ```

pub mod extract;
pub mod frames;
pub mod repair;

pub use extract::{ExtractError, extract_json_from_text, strip_code_fences, try_extract_json};
pub use repair::{repair_json, repair_json_text};
