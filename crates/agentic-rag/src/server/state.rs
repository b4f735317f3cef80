//! Application state for the RAG server

use std::sync::Arc;

use crate::agents::Orchestrator;
use crate::config::RagConfig;
use crate::error::Result;
use crate::ingestion::IngestPipeline;
use crate::memory::ConversationStore;
use crate::observability::{PipelineTracer, PromptRegistry};
use crate::providers::{
    EmbeddingProvider, LlmProvider, OllamaClient, OllamaEmbedder, OllamaLlm, SqliteVectorIndex,
    VectorStoreProvider,
};
use crate::rag::{Reranker, Retriever};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorStoreProvider>,
    conversations: ConversationStore,
    orchestrator: Orchestrator,
    ingest: IngestPipeline,
    tracer: Arc<PipelineTracer>,
}

impl AppState {
    /// Build every long-lived service from configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing RAG application state...");

        let ollama = Arc::new(OllamaClient::new(&config.llm)?);
        tracing::info!("Ollama client initialized at {}", ollama.base_url());

        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(OllamaEmbedder::from_client(ollama.clone(), &config.embeddings));
        let llm: Arc<dyn LlmProvider> =
            Arc::new(OllamaLlm::from_client(ollama, config.llm.model.clone()));

        let index: Arc<dyn VectorStoreProvider> = Arc::new(SqliteVectorIndex::open(
            &config.database.path,
            config.embeddings.dimensions,
        )?);
        tracing::info!(
            "Vector index loaded from {} ({} chunks)",
            config.database.path.display(),
            index.len().await?
        );

        let conversations = ConversationStore::open(&config.database.path)?;
        let reranker = Reranker::from_config(&config).await?;

        Self::from_parts(config, llm, embedder, index, conversations, reranker)
    }

    /// Assemble state from already constructed providers
    pub fn from_parts(
        config: RagConfig,
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorStoreProvider>,
        conversations: ConversationStore,
        reranker: Reranker,
    ) -> Result<Self> {
        let prompts = Arc::new(PromptRegistry::from_config(&config.observability)?);
        let tracer = Arc::new(PipelineTracer::new(&config.observability));

        let retriever = Retriever::new(&config.retrieval, embedder.clone(), index.clone());
        let orchestrator = Orchestrator::new(
            &config,
            llm.clone(),
            retriever,
            reranker,
            prompts,
            tracer.clone(),
        );
        let ingest = IngestPipeline::new(&config.chunking, embedder.clone(), index.clone());

        tracing::info!(
            "RAG state ready (llm: {}/{}, embeddings: {})",
            llm.name(),
            llm.model(),
            embedder.name()
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                llm,
                embedder,
                index,
                conversations,
                orchestrator,
                ingest,
                tracer,
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.inner.index
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.inner.conversations
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.inner.orchestrator
    }

    pub fn ingest(&self) -> &IngestPipeline {
        &self.inner.ingest
    }

    pub fn tracer(&self) -> &Arc<PipelineTracer> {
        &self.inner.tracer
    }
}
