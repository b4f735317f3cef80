//! Evaluation inputs: question files and generated samples

use serde::Deserialize;
use std::path::Path;

use crate::agents::Orchestrator;
use crate::error::{Error, Result};

/// One answered question ready for scoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalSample {
    pub question: String,
    pub answer: String,
    pub contexts: Vec<String>,
    pub ground_truth: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionFile {
    List(Vec<String>),
    Wrapped { questions: Vec<String> },
}

/// Parse a JSON list of strings, or an object with a `questions` list
pub fn parse_questions(raw: &str) -> Result<Vec<String>> {
    let parsed: QuestionFile = serde_json::from_str(raw).map_err(|e| {
        Error::invalid_request(format!(
            "expected a JSON list of strings or {{\"questions\": [...]}}: {}",
            e
        ))
    })?;
    Ok(match parsed {
        QuestionFile::List(questions) => questions,
        QuestionFile::Wrapped { questions } => questions,
    })
}

/// Load questions (or ground truths, which share the format) from disk
pub fn load_questions(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    parse_questions(&raw)
}

/// Run every question through the pipeline.
///
/// Ground truths pair with questions by position; a question that fails is
/// logged and left out of the dataset.
pub async fn generate_samples(
    orchestrator: &Orchestrator,
    questions: &[String],
    ground_truths: Option<&[String]>,
) -> Vec<EvalSample> {
    let mut samples = Vec::with_capacity(questions.len());

    for (i, question) in questions.iter().enumerate() {
        tracing::info!("Processing question {}/{}: {}", i + 1, questions.len(), question);

        match orchestrator.process_query(question, &[]).await {
            Ok(result) => samples.push(EvalSample {
                question: question.clone(),
                answer: result.response,
                contexts: result.contexts,
                ground_truth: ground_truths.and_then(|g| g.get(i).cloned()),
            }),
            Err(e) => tracing::error!("Error processing question '{}': {}", question, e),
        }
    }

    samples
}
