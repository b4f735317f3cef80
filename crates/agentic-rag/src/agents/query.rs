//! Query understanding agent

use std::sync::Arc;
use std::time::Instant;

use crate::observability::prompts::QUERY_UNDERSTANDING;
use crate::observability::{PipelineTracer, PromptRegistry};
use crate::providers::{GenerationOptions, LlmProvider};

/// Free-text analysis of intent, entities and information need
#[derive(Debug, Clone, Default)]
pub struct QueryAnalysis {
    pub text: String,
}

impl QueryAnalysis {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

pub struct QueryAgent {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptRegistry>,
    tracer: Arc<PipelineTracer>,
}

impl QueryAgent {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        prompts: Arc<PromptRegistry>,
        tracer: Arc<PipelineTracer>,
    ) -> Self {
        Self { llm, prompts, tracer }
    }

    /// Analyze the query. Failures degrade to an empty analysis.
    pub async fn analyze(
        &self,
        trace_id: &str,
        query: &str,
        history_context: &str,
        options: &GenerationOptions,
    ) -> QueryAnalysis {
        let prompt = match self
            .prompts
            .render(QUERY_UNDERSTANDING, &[("query", query), ("history", history_context)])
        {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!("Query understanding prompt unavailable: {}", e);
                return QueryAnalysis::default();
            }
        };

        let started = Instant::now();
        let result = self.llm.complete(&prompt, options).await;
        self.tracer.trace_llm_call(
            trace_id,
            QUERY_UNDERSTANDING,
            self.llm.model(),
            &prompt,
            result.as_deref(),
            started,
        );

        match result {
            Ok(text) => QueryAnalysis { text },
            Err(e) => {
                tracing::warn!("Query understanding failed, continuing without analysis: {}", e);
                QueryAnalysis::default()
            }
        }
    }
}
