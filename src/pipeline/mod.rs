//! Two-stage agent pipeline: analysis fan-out, then generation fan-out

mod error;
mod orchestrator;
pub mod prompts;

pub use error::PipelineError;
pub use orchestrator::Orchestrator;
