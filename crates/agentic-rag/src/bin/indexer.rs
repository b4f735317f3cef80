//! Document indexer
//!
//! Parses, chunks, embeds and stores a file or a directory of files into the
//! same index the server reads.
//!
//! Run with: cargo run -p agentic-rag --bin agentic-rag-indexer -- ./docs

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use agentic_rag::config::RagConfig;
use agentic_rag::ingestion::{DocumentProcessor, IngestPipeline};
use agentic_rag::providers::{
    EmbeddingProvider, OllamaClient, OllamaEmbedder, SqliteVectorIndex, VectorStoreProvider,
};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Index documents for retrieval
#[derive(Parser)]
#[command(name = "agentic-rag-indexer", version)]
struct Args {
    /// File or directory to index
    path: PathBuf,

    /// Descend into subdirectories
    #[arg(long, overrides_with = "no_recursive", default_value_t = true)]
    recursive: bool,

    /// Only index the top level of the directory
    #[arg(long = "no-recursive")]
    no_recursive: bool,

    /// TOML configuration file; environment variables still apply on top
    #[arg(long, env = "AGENTIC_RAG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(failed) if failed == 0 => ExitCode::SUCCESS,
        Ok(failed) => {
            eprintln!("{} {} file(s) failed to index", style("✗").red(), failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Returns the number of files that failed
async fn run(args: Args) -> anyhow::Result<usize> {
    let config = RagConfig::load(args.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentic_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let files = if args.path.is_dir() {
        DocumentProcessor::collect_files(&args.path, args.recursive && !args.no_recursive)?
    } else if args.path.is_file() {
        vec![args.path.clone()]
    } else {
        anyhow::bail!("Path not found: {}", args.path.display());
    };

    if files.is_empty() {
        println!("No supported documents under {}", args.path.display());
        return Ok(0);
    }

    let client = Arc::new(OllamaClient::new(&config.llm)?);
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(OllamaEmbedder::from_client(client, &config.embeddings));
    if !embedder.health_check().await.unwrap_or(false) {
        eprintln!(
            "{} embedding model {} is not reachable at {}",
            style("warning:").yellow(),
            config.embeddings.model,
            config.llm.base_url
        );
    }

    let index: Arc<dyn VectorStoreProvider> = Arc::new(SqliteVectorIndex::open(
        &config.database.path,
        config.embeddings.dimensions,
    )?);
    let pipeline = IngestPipeline::new(&config.chunking, embedder, index.clone());

    println!(
        "Indexing {} file(s) into {}",
        style(files.len()).bold(),
        config.database.path.display()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut failed = 0usize;
    let mut chunks = 0usize;

    for path in &files {
        pb.set_message(display_name(path));
        match pipeline.ingest_file(path, None).await {
            Ok(outcome) => chunks += outcome.chunks_created,
            Err(e) => {
                failed += 1;
                pb.println(format!("{} {}: {}", style("✗").red(), path.display(), e));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    println!(
        "{} Indexed {} file(s), {} chunk(s) created, {} chunk(s) in index",
        style("✓").green(),
        files.len() - failed,
        chunks,
        index.len().await?
    );

    Ok(failed)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
