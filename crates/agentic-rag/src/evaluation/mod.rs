//! Offline evaluation of answer quality over a question set

pub mod dataset;
pub mod metrics;

pub use dataset::{generate_samples, load_questions, parse_questions, EvalSample};
pub use metrics::{
    calculate_average_metrics, evaluate, format_metrics_summary, generate_report,
    EvaluationResults, MetricScores,
};
