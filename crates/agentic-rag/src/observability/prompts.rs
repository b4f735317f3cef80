//! Named prompt templates with `{var}` placeholders

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::config::ObservabilityConfig;
use crate::error::{Error, Result};

pub const QUERY_UNDERSTANDING: &str = "query_understanding";
pub const ANSWER_GENERATION: &str = "answer_generation";

const DEFAULT_QUERY_UNDERSTANDING: &str = "Analyze the following user query and extract:
1. Main intent
2. Key entities and concepts
3. Required information type

Query: {query}

{history}

Provide a structured analysis.";

const DEFAULT_ANSWER_GENERATION: &str = "Based on the following context, answer the user's question.
Provide a clear, accurate answer with citations to sources.

{history}

{analysis}

Context:
{context}

{citations}

Question: {query}

Answer:";

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid regex"))
}

/// Prompt templates by name
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    templates: HashMap<String, String>,
}

impl Default for PromptRegistry {
    fn default() -> Self {
        let templates = [
            (QUERY_UNDERSTANDING, DEFAULT_QUERY_UNDERSTANDING),
            (ANSWER_GENERATION, DEFAULT_ANSWER_GENERATION),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { templates }
    }
}

impl PromptRegistry {
    /// Built-in templates, overridden by `{name}.txt` files in `prompts_dir`
    pub fn from_config(config: &ObservabilityConfig) -> Result<Self> {
        let mut registry = Self::default();
        if let Some(dir) = &config.prompts_dir {
            registry.load_dir(dir)?;
        }
        Ok(registry)
    }

    /// Load every `*.txt` file in `dir` as a template named after its stem
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Config(format!("Cannot read prompts directory {}: {}", dir.display(), e))
        })?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let template = std::fs::read_to_string(&path)?;
            tracing::info!("Loaded prompt override: {}", name);
            self.templates.insert(name.to_string(), template.trim_end().to_string());
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    /// Substitute `{var}` placeholders in one pass; unknown placeholders stay as written
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        let template = self
            .get(name)
            .ok_or_else(|| Error::Config(format!("Unknown prompt template: {}", name)))?;

        let rendered = placeholder().replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        });
        Ok(rendered.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present() {
        let registry = PromptRegistry::default();
        for name in [QUERY_UNDERSTANDING, ANSWER_GENERATION] {
            assert!(registry.get(name).is_some(), "missing {}", name);
        }
        assert!(registry.get("nope").is_none());
        assert!(registry.get("retrieval").is_none());
    }

    #[test]
    fn test_render_single_pass() {
        let registry = PromptRegistry::default();
        let prompt = registry
            .render(QUERY_UNDERSTANDING, &[("query", "what is {context}?")])
            .unwrap();
        assert!(prompt.contains("Query: what is {context}?"));

        let answer = registry
            .render(ANSWER_GENERATION, &[("query", "q"), ("context", "c")])
            .unwrap();
        assert!(answer.contains("{citations}"));
        assert!(answer.ends_with("Answer:"));
    }

    #[test]
    fn test_unknown_template() {
        let err = PromptRegistry::default().render("missing", &[]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_directory_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("query_understanding.txt"), "Find: {query}\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let config = ObservabilityConfig {
            prompts_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let registry = PromptRegistry::from_config(&config).unwrap();
        assert_eq!(registry.render(QUERY_UNDERSTANDING, &[("query", "x")]).unwrap(), "Find: x");
        assert!(registry.get("notes").is_none());
    }
}
