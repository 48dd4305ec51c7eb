//! The relay core: loop guard, resolver, composer and orchestrator.

pub mod composer;
pub mod guard;
pub mod processor;
pub mod resolver;
pub mod types;

pub use processor::RelayPipeline;
pub use types::{Outcome, OriginRole, SkipReason, TranslationRequest};
