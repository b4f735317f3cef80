//! OpenAI-compatible chat completion schema

use serde::{Deserialize, Serialize};

use super::conversation::{Role, Turn};

fn default_model() -> String {
    "llama3.1:8b".to_string()
}

/// A chat message in OpenAI form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// POST /v1/chat/completions body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default = "default_model")]
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    /// Falls back to the configured `llm.temperature`
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Falls back to the configured `llm.max_tokens`
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    /// Position of the last `user` message
    pub fn last_user_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.role.eq_ignore_ascii_case("user"))
    }

    /// Prior user/assistant turns before `index`; system and unknown roles are dropped
    pub fn history_before(&self, index: usize) -> Vec<Turn> {
        self.messages[..index]
            .iter()
            .filter_map(|m| match m.role.parse::<Role>() {
                Ok(role @ (Role::User | Role::Assistant)) => Some(Turn::new(role, m.content.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Token accounting (whitespace-delimited words)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn from_text(prompt: &str, completion: &str) -> Self {
        let prompt_tokens = prompt.split_whitespace().count();
        let completion_tokens = completion.split_whitespace().count();
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

/// Non-streaming completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

/// One SSE event of a streaming completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    pub fn new(id: &str, created: i64, model: &str, delta: Delta, finish_reason: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

/// GET /v1/models response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: &str, content: &str) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_request_defaults() {
        let req: ChatCompletionRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert_eq!(req.model, "llama3.1:8b");
        assert_eq!(req.max_tokens, None);
        assert_eq!(req.temperature, None);
        assert!(!req.stream);
    }

    #[test]
    fn test_last_user_and_history() {
        let req = ChatCompletionRequest {
            model: default_model(),
            messages: vec![
                msg("system", "be brief"),
                msg("user", "first"),
                msg("assistant", "answer one"),
                msg("user", "second"),
                msg("assistant", "trailing"),
            ],
            stream: false,
            temperature: Some(0.7),
            max_tokens: Some(16),
        };

        let idx = req.last_user_index().unwrap();
        assert_eq!(req.messages[idx].content, "second");

        let history = req.history_before(idx);
        assert_eq!(
            history,
            vec![
                Turn::new(Role::User, "first"),
                Turn::new(Role::Assistant, "answer one"),
            ]
        );
    }

    #[test]
    fn test_no_user_message() {
        let req = ChatCompletionRequest {
            model: default_model(),
            messages: vec![msg("system", "x")],
            stream: false,
            temperature: None,
            max_tokens: None,
        };
        assert!(req.last_user_index().is_none());
    }

    #[test]
    fn test_usage_counts_words() {
        let usage = Usage::from_text("what is rust", "a systems language");
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 3);
        assert_eq!(usage.total_tokens, 6);
    }
}
