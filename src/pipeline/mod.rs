//! The generation pipeline: request in, validated (and cached) result out.

pub mod builder;
pub mod orchestrator;
pub mod prompt;

pub use builder::OrchestratorBuilder;
pub use orchestrator::GenerationOrchestrator;
