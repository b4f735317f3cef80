//! Answer quality metrics
//!
//! Term-overlap proxies for the usual judge-model metrics. They need no model
//! calls, so a run is cheap and two runs over the same samples agree exactly.
//! Every per-sample score lies in [0, 1].

use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;
use crate::rag::reranker::terms;

use super::dataset::EvalSample;

pub const CONTEXT_PRECISION: &str = "context_precision";
pub const FAITHFULNESS: &str = "faithfulness";
pub const ANSWER_RELEVANCY: &str = "answer_relevancy";
pub const CONTEXT_RECALL: &str = "context_recall";

/// Share of ground-truth terms a context must hold to count as relevant
const RELEVANCE_THRESHOLD: f64 = 0.3;

/// Scores of one metric, keyed by sample position
#[derive(Debug, Clone, PartialEq)]
pub struct MetricScores {
    pub name: &'static str,
    pub per_sample: Vec<(usize, f64)>,
}

/// Scores of every metric over a dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationResults {
    pub metrics: Vec<MetricScores>,
}

impl EvaluationResults {
    pub fn metric(&self, name: &str) -> Option<&MetricScores> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

fn term_set(text: &str) -> HashSet<String> {
    terms(text).into_iter().collect()
}

/// Fraction of `needles` present in `haystack`; 0 when there is nothing to find
fn coverage(needles: &HashSet<String>, haystack: &HashSet<String>) -> f64 {
    if needles.is_empty() {
        return 0.0;
    }
    needles.iter().filter(|t| haystack.contains(*t)).count() as f64 / needles.len() as f64
}

fn joined_terms(contexts: &[String]) -> HashSet<String> {
    contexts.iter().flat_map(|c| terms(c)).collect()
}

/// How much of the answer is supported by the retrieved contexts
pub fn faithfulness(answer: &str, contexts: &[String]) -> f64 {
    coverage(&term_set(answer), &joined_terms(contexts))
}

/// How much of the question the answer addresses
pub fn answer_relevancy(question: &str, answer: &str) -> f64 {
    coverage(&term_set(question), &term_set(answer))
}

/// How much of the ground truth the contexts cover
pub fn context_recall(contexts: &[String], ground_truth: &str) -> f64 {
    coverage(&term_set(ground_truth), &joined_terms(contexts))
}

/// Average precision of the context ranking against the ground truth
pub fn context_precision(contexts: &[String], ground_truth: &str) -> f64 {
    let truth = term_set(ground_truth);
    let mut relevant = 0usize;
    let mut sum = 0.0;

    for (k, context) in contexts.iter().enumerate() {
        if coverage(&truth, &term_set(context)) >= RELEVANCE_THRESHOLD {
            relevant += 1;
            sum += relevant as f64 / (k + 1) as f64;
        }
    }

    if relevant == 0 {
        0.0
    } else {
        sum / relevant as f64
    }
}

/// Score every sample. Ground-truth metrics only cover samples that have one.
pub fn evaluate(samples: &[EvalSample]) -> EvaluationResults {
    let mut precision = Vec::new();
    let mut faithful = Vec::new();
    let mut relevancy = Vec::new();
    let mut recall = Vec::new();

    for (i, sample) in samples.iter().enumerate() {
        faithful.push((i, faithfulness(&sample.answer, &sample.contexts)));
        relevancy.push((i, answer_relevancy(&sample.question, &sample.answer)));
        if let Some(truth) = &sample.ground_truth {
            precision.push((i, context_precision(&sample.contexts, truth)));
            recall.push((i, context_recall(&sample.contexts, truth)));
        }
    }

    let mut metrics = Vec::with_capacity(4);
    if !precision.is_empty() {
        metrics.push(MetricScores { name: CONTEXT_PRECISION, per_sample: precision });
    }
    metrics.push(MetricScores { name: FAITHFULNESS, per_sample: faithful });
    metrics.push(MetricScores { name: ANSWER_RELEVANCY, per_sample: relevancy });
    if !recall.is_empty() {
        metrics.push(MetricScores { name: CONTEXT_RECALL, per_sample: recall });
    }

    EvaluationResults { metrics }
}

/// Mean of each metric; metrics without scores are left out
pub fn calculate_average_metrics(results: &EvaluationResults) -> Vec<(&'static str, f64)> {
    results
        .metrics
        .iter()
        .filter(|m| !m.per_sample.is_empty())
        .map(|m| {
            let total: f64 = m.per_sample.iter().map(|(_, v)| v).sum();
            (m.name, total / m.per_sample.len() as f64)
        })
        .collect()
}

pub fn format_metrics_summary(results: &EvaluationResults) -> String {
    let mut lines = vec!["Evaluation Metrics Summary:".to_string(), "-".repeat(40)];
    for (name, avg) in calculate_average_metrics(results) {
        lines.push(format!("{}: {:.4}", name, avg));
    }
    lines.join("\n")
}

/// Render the full report and write it to `output` when given
pub fn generate_report(results: &EvaluationResults, output: Option<&Path>) -> Result<String> {
    let banner = "=".repeat(80);
    let mut lines = vec![
        banner.clone(),
        "RAG System Evaluation Report".to_string(),
        banner.clone(),
        String::new(),
    ];

    for metric in &results.metrics {
        lines.push(format!("{}:", metric.name));
        for (sample, value) in &metric.per_sample {
            lines.push(format!("  {}: {:.4}", sample, value));
        }
        lines.push(String::new());
    }

    lines.push(format_metrics_summary(results));
    lines.push(String::new());
    lines.push(banner);

    let report = lines.join("\n");

    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &report)?;
        tracing::info!("Report saved to {}", path.display());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contexts(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn sample(answer: &str, ctx: &[&str], truth: Option<&str>) -> EvalSample {
        EvalSample {
            question: "When are expense reports due?".to_string(),
            answer: answer.to_string(),
            contexts: contexts(ctx),
            ground_truth: truth.map(str::to_string),
        }
    }

    const DUE: &str = "Expense reports are due on the fifth of each month.";
    const PASSWORD: &str = "Reset your password through the portal.";

    #[test]
    fn test_grounded_answer_scores_high() {
        let ctx = contexts(&[DUE, PASSWORD]);
        let answer = "Expense reports are due on the fifth.";

        assert_eq!(faithfulness(answer, &ctx), 1.0);
        assert_eq!(answer_relevancy("When are expense reports due?", answer), 1.0);
        assert_eq!(context_recall(&ctx, answer), 1.0);
        assert_eq!(context_precision(&ctx, answer), 1.0);
    }

    #[test]
    fn test_unsupported_answer_scores_zero() {
        let ctx = contexts(&[DUE]);
        assert_eq!(faithfulness("Vacation needs notice", &ctx), 0.0);
        assert_eq!(faithfulness("", &ctx), 0.0);
        assert_eq!(faithfulness("Expense reports", &[]), 0.0);
    }

    #[test]
    fn test_precision_rewards_ranking() {
        let truth = "Expense reports are due on the fifth.";
        assert_eq!(context_precision(&contexts(&[DUE, PASSWORD]), truth), 1.0);
        assert_eq!(context_precision(&contexts(&[PASSWORD, DUE]), truth), 0.5);
        assert_eq!(context_precision(&contexts(&[PASSWORD]), truth), 0.0);
    }

    #[test]
    fn test_ground_truth_metrics_are_optional() {
        let results = evaluate(&[sample("Expense reports are due on the fifth.", &[DUE], None)]);
        let names: Vec<_> = results.metrics.iter().map(|m| m.name).collect();
        assert_eq!(names, vec![FAITHFULNESS, ANSWER_RELEVANCY]);

        let results = evaluate(&[
            sample("Expense reports are due on the fifth.", &[DUE], Some("Due on the fifth.")),
            sample("Reports are due.", &[PASSWORD], None),
        ]);
        assert_eq!(results.metrics.len(), 4);
        assert_eq!(results.metric(CONTEXT_RECALL).unwrap().per_sample.len(), 1);
        assert_eq!(results.metric(FAITHFULNESS).unwrap().per_sample.len(), 2);
    }

    #[test]
    fn test_summary_and_averages() {
        let results = evaluate(&[
            sample("Expense reports are due on the fifth.", &[DUE], None),
            sample("Vacation needs notice", &[DUE], None),
        ]);
        let averages = calculate_average_metrics(&results);
        assert_eq!(averages[0], (FAITHFULNESS, 0.5));

        let summary = format_metrics_summary(&results);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "Evaluation Metrics Summary:");
        assert_eq!(lines[1], "-".repeat(40));
        assert_eq!(lines[2], "faithfulness: 0.5000");
        assert!(summary.contains("answer_relevancy: "));
    }

    #[test]
    fn test_report_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("evaluation_report.txt");
        let results = evaluate(&[sample("Expense reports are due.", &[DUE], Some(DUE))]);

        let report = generate_report(&results, Some(&path)).unwrap();
        assert!(report.starts_with(&"=".repeat(80)));
        assert!(report.ends_with(&"=".repeat(80)));
        assert!(report.contains("RAG System Evaluation Report"));
        assert!(report.contains("context_recall:\n  0: 1.0000"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), report);
    }

    #[test]
    fn test_empty_results() {
        let results = evaluate(&[]);
        assert!(calculate_average_metrics(&results).is_empty());
        assert_eq!(
            format_metrics_summary(&results),
            format!("Evaluation Metrics Summary:\n{}", "-".repeat(40))
        );
    }
}
