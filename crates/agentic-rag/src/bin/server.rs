//! RAG Server binary
//!
//! Run with: cargo run -p agentic-rag --bin agentic-rag-server [-- path/to/config.toml]

use agentic_rag::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                     Agentic RAG Service                   ║
║        Retrieval, Re-ranking and Cited Answers            ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    tracing::info!("Configuration loaded");
    tracing::info!("  - LLM: {} at {}", config.llm.model, config.llm.base_url);
    tracing::info!(
        "  - Embeddings: {} ({} dims)",
        config.embeddings.model,
        config.embeddings.dimensions
    );
    tracing::info!("  - Reranker: {:?}", config.reranker.backend);
    tracing::info!("  - Database: {}", config.database.path.display());

    let server = RagServer::new(config.clone()).await?;
    let prefix = config.server.api_prefix.trim_end_matches('/');

    println!("\nServer starting...");
    println!("  Health: http://{}{}/health", server.address(), prefix);
    println!("\nEndpoints:");
    println!("  POST {}/chat                  - Ask a question", prefix);
    println!("  POST {}/conversations         - Start a conversation", prefix);
    println!("  GET  {}/conversations/:id     - Conversation history", prefix);
    println!("  POST {}/documents/ingest      - Ingest a document by path", prefix);
    println!("  POST {}/v1/chat/completions   - OpenAI-compatible chat", prefix);
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
