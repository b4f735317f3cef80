//! Query understanding, retrieval and answer agents plus their orchestrator

pub mod answer;
pub mod orchestrator;
pub mod query;
pub mod retrieval;

pub use answer::AnswerAgent;
pub use orchestrator::{build_history_context, Orchestrator, PipelineResult};
pub use query::{QueryAgent, QueryAnalysis};
pub use retrieval::{RetrievalAgent, RetrievalOutcome};
