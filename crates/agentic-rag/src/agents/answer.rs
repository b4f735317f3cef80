//! Answer generation agent

use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::observability::prompts::ANSWER_GENERATION;
use crate::observability::{PipelineTracer, PromptRegistry};
use crate::providers::{GenerationOptions, LlmProvider};

use super::query::QueryAnalysis;

/// Prompt inputs for one answer
pub struct AnswerInput<'a> {
    pub query: &'a str,
    pub analysis: &'a QueryAnalysis,
    pub context: &'a str,
    pub citations: &'a str,
    pub history: &'a str,
}

pub struct AnswerAgent {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptRegistry>,
    tracer: Arc<PipelineTracer>,
}

impl AnswerAgent {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        prompts: Arc<PromptRegistry>,
        tracer: Arc<PipelineTracer>,
    ) -> Self {
        Self { llm, prompts, tracer }
    }

    pub async fn generate(
        &self,
        trace_id: &str,
        input: &AnswerInput<'_>,
        options: &GenerationOptions,
    ) -> Result<String> {
        let analysis = if input.analysis.is_empty() {
            String::new()
        } else {
            format!("Query analysis:\n{}", input.analysis.text.trim())
        };

        let prompt = self.prompts.render(
            ANSWER_GENERATION,
            &[
                ("query", input.query),
                ("context", input.context),
                ("citations", input.citations),
                ("history", input.history),
                ("analysis", &analysis),
            ],
        )?;

        let started = Instant::now();
        let result = self.llm.complete(&prompt, options).await;
        self.tracer.trace_llm_call(
            trace_id,
            ANSWER_GENERATION,
            self.llm.model(),
            &prompt,
            result.as_deref(),
            started,
        );

        let answer = result?;
        Ok(answer.trim().to_string())
    }
}
