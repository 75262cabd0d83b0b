//! Completion-service seam: an availability query plus one completion call.
//!
//! [`OpenAiCompletion`] talks to a chat-completions endpoint;
//! [`DisabledCompletion`] stands in when no model is configured, so callers
//! take the heuristic path through an explicit `is_available()` check.

mod json;
mod openai;

use async_trait::async_trait;

pub use json::{extract_json, JsonExtractError};
pub use openai::OpenAiCompletion;

/// Errors from a completion call.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion service unavailable: {0}")]
    Unavailable(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("empty completion response")]
    EmptyResponse,
}

/// A language-model completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    fn is_available(&self) -> bool;

    /// Model name for run metadata.
    fn model(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError>;
}

/// Never available.
#[derive(Debug, Clone)]
pub struct DisabledCompletion {
    reason: String,
}

impl DisabledCompletion {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for DisabledCompletion {
    fn default() -> Self {
        Self::new("no API key configured")
    }
}

#[async_trait]
impl CompletionService for DisabledCompletion {
    fn is_available(&self) -> bool {
        false
    }

    fn model(&self) -> &str {
        "none"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Unavailable(self.reason.clone()))
    }
}
