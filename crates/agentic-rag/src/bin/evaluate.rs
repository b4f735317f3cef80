//! Offline evaluation of the RAG pipeline
//!
//! Run with: cargo run -p agentic-rag --bin agentic-rag-eval -- questions.json

use std::path::PathBuf;
use std::process::ExitCode;

use agentic_rag::config::RagConfig;
use agentic_rag::evaluation::{
    evaluate, format_metrics_summary, generate_report, generate_samples, load_questions,
};
use agentic_rag::server::AppState;
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Score the pipeline's answers over a question set
#[derive(Parser)]
#[command(name = "agentic-rag-eval", version)]
struct Args {
    /// JSON file with a list of questions, or {"questions": [...]}
    questions_file: PathBuf,

    /// JSON file with ground truth answers, in question order
    #[arg(long)]
    ground_truths: Option<PathBuf>,

    /// Where to write the report
    #[arg(long, default_value = "evaluation_report.txt")]
    output: PathBuf,

    /// TOML configuration file; environment variables still apply on top
    #[arg(long, env = "AGENTIC_RAG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Evaluation failed: {:#}", e);
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = RagConfig::load(args.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting RAG system evaluation");

    let questions = load_questions(&args.questions_file)?;
    tracing::info!("Loaded {} questions", questions.len());

    let ground_truths = match &args.ground_truths {
        Some(path) => {
            let truths = load_questions(path)?;
            tracing::info!("Loaded {} ground truths", truths.len());
            Some(truths)
        }
        None => None,
    };

    let state = AppState::new(config).await?;

    tracing::info!("Generating evaluation dataset...");
    let samples =
        generate_samples(state.orchestrator(), &questions, ground_truths.as_deref()).await;
    if samples.is_empty() {
        anyhow::bail!("No question could be answered");
    }

    tracing::info!("Running evaluation over {} samples...", samples.len());
    let results = evaluate(&samples);

    tracing::info!("Generating report...");
    generate_report(&results, Some(&args.output))?;

    let banner = "=".repeat(80);
    println!("\n{}", banner);
    println!("{}", style("Evaluation Summary").bold());
    println!("{}", banner);
    println!("{}", format_metrics_summary(&results));
    println!("\n{}", banner);
    println!("\nFull report saved to: {}", args.output.display());

    Ok(())
}
