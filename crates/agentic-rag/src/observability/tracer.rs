//! Pipeline span recording
//!
//! Spans are emitted as structured `tracing` events under the
//! `agentic_rag::trace` target and kept in a bounded in-memory ring so the
//! API and tests can inspect recent pipeline runs. Recording never fails.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::ObservabilityConfig;
use crate::error::{Error, Result};
use crate::rag::FormattedHit;

/// Characters of prompt/response text kept in span attributes
const ATTRIBUTE_TEXT_LIMIT: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Llm,
    Retriever,
    Reranker,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    Error,
}

/// One finished pipeline step
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub trace_id: String,
    pub name: String,
    pub kind: SpanKind,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: SpanStatus,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl SpanRecord {
    fn new(trace_id: &str, name: impl Into<String>, kind: SpanKind, started: Instant) -> Self {
        let elapsed = started.elapsed();
        let started_at = Utc::now()
            - chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            trace_id: trace_id.to_string(),
            name: name.into(),
            kind,
            started_at,
            duration_ms: elapsed.as_millis() as u64,
            status: SpanStatus::Ok,
            attributes: serde_json::Map::new(),
        }
    }

    fn attr(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Records LLM, retrieval, rerank and agent spans
pub struct PipelineTracer {
    project_name: String,
    collector_url: Option<String>,
    client: reqwest::Client,
    capacity: usize,
    spans: Mutex<VecDeque<SpanRecord>>,
}

impl PipelineTracer {
    pub fn new(config: &ObservabilityConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        let capacity = config.span_buffer.max(1);

        Self {
            project_name: config.project_name.clone(),
            collector_url: config.collector_url.clone(),
            client,
            capacity,
            spans: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Fresh trace ID for one pipeline run
    pub fn new_trace_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Emit and buffer a span
    pub fn record(&self, span: SpanRecord) {
        tracing::info!(
            target: "agentic_rag::trace",
            project = %self.project_name,
            trace_id = %span.trace_id,
            span = %span.name,
            kind = ?span.kind,
            status = ?span.status,
            duration_ms = span.duration_ms,
            "span finished"
        );

        let mut spans = self.spans.lock();
        if spans.len() == self.capacity {
            spans.pop_front();
        }
        spans.push_back(span);
    }

    pub fn trace_llm_call(
        &self,
        trace_id: &str,
        tool: &str,
        model: &str,
        prompt: &str,
        outcome: std::result::Result<&str, &Error>,
        started: Instant,
    ) {
        let mut span = SpanRecord::new(trace_id, "llm_call", SpanKind::Llm, started)
            .attr("llm.request.type", "completion")
            .attr("llm.request.model", model)
            .attr("llm.tool", tool)
            .attr("llm.prompt", clip(prompt));
        match outcome {
            Ok(response) => span = span.attr("llm.response", clip(response)),
            Err(e) => {
                span.status = SpanStatus::Error;
                span = span.attr("error", e.to_string());
            }
        }
        self.record(span);
    }

    pub fn trace_retrieval(&self, trace_id: &str, query: &str, hits: &[FormattedHit], started: Instant) {
        let documents: Vec<serde_json::Value> = hits
            .iter()
            .map(|h| {
                serde_json::json!({
                    "node_id": h.node_id,
                    "score": h.score,
                    "file_name": h.metadata.get("file_name"),
                })
            })
            .collect();
        let span = SpanRecord::new(trace_id, "retrieval", SpanKind::Retriever, started)
            .attr("retrieval.query", query)
            .attr("retrieval.documents.count", hits.len())
            .attr("retrieval.documents", documents);
        self.record(span);
    }

    pub fn trace_rerank(
        &self,
        trace_id: &str,
        scorer: &str,
        input_count: usize,
        output_count: usize,
        fallback: bool,
        started: Instant,
    ) {
        let mut span = SpanRecord::new(trace_id, "rerank", SpanKind::Reranker, started)
            .attr("reranker.model", scorer)
            .attr("reranker.input.count", input_count)
            .attr("reranker.output.count", output_count)
            .attr("reranker.fallback", fallback);
        if fallback {
            span.status = SpanStatus::Error;
        }
        self.record(span);
    }

    pub fn trace_agent_execution(
        &self,
        trace_id: &str,
        agent_name: &str,
        task: &str,
        outcome: std::result::Result<&str, &Error>,
        metadata: serde_json::Map<String, serde_json::Value>,
        started: Instant,
    ) {
        let mut span = SpanRecord::new(trace_id, format!("agent_{}", agent_name), SpanKind::Agent, started)
            .attr("agent.name", agent_name)
            .attr("agent.task", task);
        match outcome {
            Ok(result) => span = span.attr("agent.result", clip(result)),
            Err(e) => {
                span.status = SpanStatus::Error;
                span = span.attr("error", e.to_string());
            }
        }
        span.attributes.extend(metadata);
        self.record(span);
    }

    /// Up to `limit` most recent spans, newest last
    pub fn recent_spans(&self, limit: usize) -> Vec<SpanRecord> {
        let spans = self.spans.lock();
        let skip = spans.len().saturating_sub(limit);
        spans.iter().skip(skip).cloned().collect()
    }

    pub fn spans_for_trace(&self, trace_id: &str) -> Vec<SpanRecord> {
        self.spans
            .lock()
            .iter()
            .filter(|s| s.trace_id == trace_id)
            .cloned()
            .collect()
    }

    /// Probe the collector; without one, local recording is always available
    pub async fn health_check(&self) -> Result<()> {
        let Some(base) = &self.collector_url else {
            return Ok(());
        };
        let response = self.client.get(format!("{}/health", base)).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::internal(format!(
                "trace collector returned HTTP {}",
                response.status()
            )))
        }
    }
}

fn clip(text: &str) -> String {
    crate::rag::citation::truncate_snippet(text, ATTRIBUTE_TEXT_LIMIT)
}
