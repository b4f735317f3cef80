//! Second-pass relevance scoring of retrieved chunks

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{RagConfig, RerankerBackend};
use crate::error::{Error, Result};
use crate::types::{RerankOutcome, RerankedHit, RetrievalHit};

/// Scores (query, passage) pairs; higher means more relevant
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// One score per passage, in input order
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;

    /// Scorer name for logs and traces
    fn name(&self) -> &str;
}

/// Words too common to carry relevance
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "where",
    "which", "who", "why", "with",
];

pub(crate) fn terms(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// BM25 over the candidate set. Needs no model files and is deterministic.
pub struct LexicalScorer {
    k1: f32,
    b: f32,
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl LexicalScorer {
    fn score_sync(&self, query: &str, passages: &[&str]) -> Vec<f32> {
        let query_terms: HashSet<String> = terms(query).into_iter().collect();
        if passages.is_empty() {
            return Vec::new();
        }

        let docs: Vec<Vec<String>> = passages.iter().map(|p| terms(p)).collect();
        let n = docs.len() as f32;
        let avg_len = (docs.iter().map(Vec::len).sum::<usize>() as f32 / n).max(1.0);

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
            for term in unique {
                if query_terms.contains(term) {
                    *doc_freq.entry(term).or_default() += 1;
                }
            }
        }

        docs.iter()
            .map(|doc| {
                let mut tf: HashMap<&str, f32> = HashMap::new();
                for term in doc {
                    if query_terms.contains(term) {
                        *tf.entry(term.as_str()).or_default() += 1.0;
                    }
                }
                let len_norm = 1.0 - self.b + self.b * doc.len() as f32 / avg_len;
                tf.iter()
                    .map(|(term, &freq)| {
                        let df = doc_freq.get(term).copied().unwrap_or(0) as f32;
                        let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                        idf * freq * (self.k1 + 1.0) / (freq + self.k1 * len_norm)
                    })
                    .sum()
            })
            .collect()
    }
}

#[async_trait]
impl RelevanceScorer for LexicalScorer {
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        Ok(self.score_sync(query, passages))
    }

    fn name(&self) -> &str {
        "lexical-bm25"
    }
}

/// Re-orders retrieval hits with a [`RelevanceScorer`] and keeps the best
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
    top_k: usize,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>, top_k: usize) -> Self {
        Self { scorer, top_k }
    }

    /// Build the configured backend
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        let scorer: Arc<dyn RelevanceScorer> = match config.reranker.backend {
            RerankerBackend::Lexical => Arc::new(LexicalScorer::default()),
            #[cfg(feature = "cross-encoder")]
            RerankerBackend::CrossEncoder => {
                Arc::new(cross_encoder::CrossEncoderScorer::new(&config.reranker).await?)
            }
            #[cfg(not(feature = "cross-encoder"))]
            RerankerBackend::CrossEncoder => {
                return Err(Error::Config(
                    "cross-encoder reranker requires building with the `cross-encoder` feature"
                        .to_string(),
                ))
            }
        };
        tracing::info!("Reranker backend: {}", scorer.name());
        Ok(Self::new(scorer, config.retrieval.top_k_rerank))
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    /// Score and keep the `top_k` most relevant hits, best first.
    ///
    /// Never fails: if the scorer errors, the first `top_k` hits are kept in
    /// retrieval order with their similarity as the rerank score.
    pub async fn rerank(
        &self,
        query: &str,
        hits: Vec<RetrievalHit>,
        top_k: Option<usize>,
    ) -> RerankOutcome {
        let top_k = top_k.unwrap_or(self.top_k);
        if hits.is_empty() || top_k == 0 {
            return RerankOutcome::default();
        }

        let passages: Vec<&str> = hits.iter().map(|h| h.chunk.content.as_str()).collect();
        let scores = match self.scorer.score(query, &passages).await {
            Ok(scores) if scores.len() == hits.len() => Ok(scores),
            Ok(scores) => Err(Error::Rerank(format!(
                "scorer returned {} scores for {} passages",
                scores.len(),
                hits.len()
            ))),
            Err(e) => Err(e),
        };

        match scores {
            Ok(scores) => {
                let mut reranked: Vec<RerankedHit> = hits
                    .into_iter()
                    .zip(scores)
                    .map(|(hit, rerank_score)| RerankedHit { hit, rerank_score })
                    .collect();
                reranked.sort_by(|a, b| b.rerank_score.total_cmp(&a.rerank_score));
                reranked.truncate(top_k);
                tracing::info!("Reranked to top {} nodes", reranked.len());
                RerankOutcome {
                    hits: reranked,
                    fallback: false,
                }
            }
            Err(e) => {
                tracing::warn!("Reranking failed, keeping retrieval order: {}", e);
                let hits = hits
                    .into_iter()
                    .take(top_k)
                    .map(|hit| {
                        let rerank_score = hit.score;
                        RerankedHit { hit, rerank_score }
                    })
                    .collect();
                RerankOutcome {
                    hits,
                    fallback: true,
                }
            }
        }
    }
}

#[cfg(feature = "cross-encoder")]
pub mod cross_encoder {
    //! ONNX cross-encoder scorer (ms-marco MiniLM family)

    use async_trait::async_trait;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::Arc;
    use tokenizers::Tokenizer;

    use super::RelevanceScorer;
    use crate::config::RerankerConfig;
    use crate::error::{Error, Result};

    struct Model {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        max_length: usize,
    }

    /// Cross-encoder loaded from `cache_dir/{model.onnx,tokenizer.json}`
    pub struct CrossEncoderScorer {
        model: Arc<Model>,
        name: String,
    }

    impl CrossEncoderScorer {
        pub async fn new(config: &RerankerConfig) -> Result<Self> {
            tracing::info!("Initializing cross-encoder: {}", config.model);

            std::fs::create_dir_all(&config.cache_dir)
                .map_err(|e| Error::Config(format!("Failed to create cache directory: {}", e)))?;

            let model_path = config.cache_dir.join("model.onnx");
            let tokenizer_path = config.cache_dir.join("tokenizer.json");
            if !model_path.exists() {
                download(&config.model, "onnx/model.onnx", &model_path).await?;
            }
            if !tokenizer_path.exists() {
                download(&config.model, "tokenizer.json", &tokenizer_path).await?;
            }

            let session = Session::builder()
                .map_err(|e| Error::Rerank(format!("Failed to create session builder: {}", e)))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| Error::Rerank(format!("Failed to set optimization level: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::Rerank(format!("Failed to load model: {}", e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::Rerank(format!("Failed to load tokenizer: {}", e)))?;

            Ok(Self {
                model: Arc::new(Model {
                    session: Mutex::new(session),
                    tokenizer,
                    max_length: config.max_length,
                }),
                name: config.model.clone(),
            })
        }
    }

    impl Model {
        fn score_pairs(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
            let batch = passages.len();
            let pairs: Vec<(&str, &str)> = passages.iter().map(|p| (query, p.as_str())).collect();
            let encodings = self
                .tokenizer
                .encode_batch(pairs, true)
                .map_err(|e| Error::Rerank(format!("Tokenization failed: {}", e)))?;

            let max_len = encodings
                .iter()
                .map(|e| e.get_ids().len())
                .max()
                .unwrap_or(0)
                .min(self.max_length);

            let mut input_ids = vec![0i64; batch * max_len];
            let mut attention_mask = vec![0i64; batch * max_len];
            let mut token_type_ids = vec![0i64; batch * max_len];
            for (i, encoding) in encodings.iter().enumerate() {
                let ids = encoding.get_ids();
                let mask = encoding.get_attention_mask();
                let types = encoding.get_type_ids();
                for j in 0..ids.len().min(max_len) {
                    input_ids[i * max_len + j] = ids[j] as i64;
                    attention_mask[i * max_len + j] = mask[j] as i64;
                    token_type_ids[i * max_len + j] = types[j] as i64;
                }
            }

            let tensor = |data: Vec<i64>| {
                Tensor::from_array((vec![batch, max_len], data.into_boxed_slice()))
                    .map_err(|e| Error::Rerank(format!("Tensor creation failed: {}", e)))
            };
            let inputs = vec![
                ("input_ids", tensor(input_ids)?.into_dyn()),
                ("attention_mask", tensor(attention_mask)?.into_dyn()),
                ("token_type_ids", tensor(token_type_ids)?.into_dyn()),
            ];

            let mut session = self.session.lock();
            let outputs = session
                .run(inputs)
                .map_err(|e| Error::Rerank(format!("Inference failed: {}", e)))?;
            let (_, value) = outputs
                .iter()
                .next()
                .ok_or_else(|| Error::Rerank("No output tensor".to_string()))?;
            let (_, logits) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Rerank(format!("Failed to extract logits: {}", e)))?;

            // One logit per pair; sigmoid maps it into (0, 1)
            let per_row = (logits.len() / batch.max(1)).max(1);
            Ok((0..batch)
                .map(|i| {
                    let logit = logits.get(i * per_row).copied().unwrap_or(f32::MIN);
                    1.0 / (1.0 + (-logit).exp())
                })
                .collect())
        }
    }

    #[async_trait]
    impl RelevanceScorer for CrossEncoderScorer {
        async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
            if passages.is_empty() {
                return Ok(Vec::new());
            }
            let model = self.model.clone();
            let query = query.to_string();
            let passages: Vec<String> = passages.iter().map(|p| p.to_string()).collect();
            tokio::task::spawn_blocking(move || model.score_pairs(&query, &passages))
                .await
                .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    async fn download(model: &str, file: &str, path: &Path) -> Result<()> {
        let url = format!("https://huggingface.co/{}/resolve/main/{}", model, file);
        tracing::info!("Downloading {}", url);

        let response = reqwest::get(&url).await?;
        if !response.status().is_success() {
            return Err(Error::Rerank(format!(
                "Download of {} failed: HTTP {}",
                file,
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        std::fs::write(path, &bytes)?;
        tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}
