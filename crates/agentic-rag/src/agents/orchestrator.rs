//! Sequential agent pipeline: understand, retrieve, rerank, answer, cite

use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::observability::{PipelineTracer, PromptRegistry};
use crate::providers::{GenerationOptions, LlmProvider};
use crate::rag::citation;
use crate::rag::{Reranker, Retriever};
use crate::types::{Citation, PipelineMetadata, Turn};

use super::answer::{AnswerAgent, AnswerInput};
use super::query::QueryAgent;
use super::retrieval::RetrievalAgent;

const EMPTY_ANSWER: &str = "I apologize, but I couldn't generate an answer.";

/// Answer with its supporting citations
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub response: String,
    pub citations: Vec<Citation>,
    pub metadata: PipelineMetadata,
    /// Texts of the reranked chunks the answer was grounded on
    pub contexts: Vec<String>,
    /// Node ids of every hit the retrieval step returned
    pub retrieved_ids: Vec<String>,
}

/// Runs the agent pipeline for one query at a time.
///
/// Built once at startup and shared by all requests.
pub struct Orchestrator {
    query_agent: QueryAgent,
    retrieval_agent: RetrievalAgent,
    answer_agent: AnswerAgent,
    tracer: Arc<PipelineTracer>,
    history_window: usize,
    options: GenerationOptions,
}

impl Orchestrator {
    pub fn new(
        config: &RagConfig,
        llm: Arc<dyn LlmProvider>,
        retriever: Retriever,
        reranker: Reranker,
        prompts: Arc<PromptRegistry>,
        tracer: Arc<PipelineTracer>,
    ) -> Self {
        Self {
            query_agent: QueryAgent::new(llm.clone(), prompts.clone(), tracer.clone()),
            retrieval_agent: RetrievalAgent::new(retriever, reranker, tracer.clone()),
            answer_agent: AnswerAgent::new(llm, prompts, tracer.clone()),
            tracer,
            history_window: config.conversation.history_window,
            options: GenerationOptions::from_config(&config.llm),
        }
    }

    pub fn tracer(&self) -> &Arc<PipelineTracer> {
        &self.tracer
    }

    pub fn default_options(&self) -> GenerationOptions {
        self.options
    }

    /// Run the pipeline with the configured sampling options
    pub async fn process_query(&self, query: &str, history: &[Turn]) -> Result<PipelineResult> {
        self.process_query_with(query, history, self.options).await
    }

    pub async fn process_query_with(
        &self,
        query: &str,
        history: &[Turn],
        options: GenerationOptions,
    ) -> Result<PipelineResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::invalid_request("Query must not be empty"));
        }

        let trace_id = PipelineTracer::new_trace_id();
        let started = Instant::now();
        tracing::info!(trace_id = %trace_id, "Processing query: {}", preview(query));

        let result = self.run(&trace_id, query, history, &options).await;

        let mut metadata = serde_json::Map::new();
        metadata.insert("query".into(), query.into());
        if let Ok(result) = &result {
            metadata.insert("citations_count".into(), result.citations.len().into());
        }
        self.tracer.trace_agent_execution(
            &trace_id,
            "orchestrator",
            "process_query",
            result.as_ref().map(|r| r.response.as_str()),
            metadata,
            started,
        );

        let mut result = result?;
        result.metadata.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn run(
        &self,
        trace_id: &str,
        query: &str,
        history: &[Turn],
        options: &GenerationOptions,
    ) -> Result<PipelineResult> {
        let history_context = build_history_context(history, self.history_window);

        let analysis = self
            .query_agent
            .analyze(trace_id, query, &history_context, options)
            .await;

        let outcome = self.retrieval_agent.run(trace_id, query).await?;
        let reranked = &outcome.reranked.hits;

        // Citations and prompt context come from the same reranked hits
        let citations = citation::extract_citations(reranked);
        let context = citation::format_context_with_citations(reranked, false);
        let citations_block = citation::format_citations_for_prompt(&citations);

        let answer = self
            .answer_agent
            .generate(
                trace_id,
                &AnswerInput {
                    query,
                    analysis: &analysis,
                    context: &context,
                    citations: &citations_block,
                    history: &history_context,
                },
                options,
            )
            .await?;
        let response = if answer.is_empty() {
            EMPTY_ANSWER.to_string()
        } else {
            answer
        };

        let citations = citation::link_citations(&response, citations);

        Ok(PipelineResult {
            metadata: PipelineMetadata {
                query: query.to_string(),
                trace_id: trace_id.to_string(),
                retrieved_count: outcome.retrieved.len(),
                reranked_count: reranked.len(),
                citations_count: citations.len(),
                rerank_fallback: outcome.reranked.fallback,
                duration_ms: 0,
            },
            contexts: reranked.iter().map(|h| h.chunk().content.clone()).collect(),
            retrieved_ids: outcome.retrieved.iter().map(|h| h.node_id.clone()).collect(),
            response,
            citations,
        })
    }
}

/// `"Previous conversation:"` followed by the last `window` turns, or empty
pub fn build_history_context(history: &[Turn], window: usize) -> String {
    if history.is_empty() || window == 0 {
        return String::new();
    }

    let start = history.len().saturating_sub(window);
    let mut parts = vec!["Previous conversation:".to_string()];
    for turn in &history[start..] {
        parts.push(format!("{}: {}", turn.role.label(), turn.content));
    }
    parts.join("\n")
}

fn preview(query: &str) -> String {
    citation::truncate_snippet(query, 50)
}
