//! Prompt management and pipeline tracing

pub mod prompts;
pub mod tracer;

pub use prompts::PromptRegistry;
pub use tracer::{PipelineTracer, SpanKind, SpanRecord, SpanStatus};
