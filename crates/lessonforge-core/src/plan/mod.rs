//! Lesson-plan data model and request parameters.

pub mod request;
pub mod types;

pub use request::{FunctionType, GenerationRequest};
pub use types::{
    AudienceEntry, Bilingual, BilingualList, BilingualText, IsBlank, LessonPlan, ProcedureStep,
    TeachingPreparation,
};
