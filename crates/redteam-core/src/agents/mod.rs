//! Attacker, defender and arbiter roles backed by a completion service.

mod arbiter;
mod attacker;
mod defender;
pub mod prompts;
mod roles;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::completion::{extract_json, CompletionError, JsonExtractError};

pub use arbiter::Arbiter;
pub use attacker::Attacker;
pub use defender::Defender;
pub use roles::{ContextHints, ModelRoles};

/// Why a role call produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("invalid payload: {0}")]
    Payload(String),
}

impl From<JsonExtractError> for AgentError {
    fn from(e: JsonExtractError) -> Self {
        AgentError::Payload(e.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Payload(e.to_string())
    }
}

/// Decode `{"<key>": [..]}` or a bare `[..]` from raw model output.
pub(crate) fn decode_items<T: DeserializeOwned>(raw: &str, key: &str) -> Result<Vec<T>, AgentError> {
    let payload = extract_json(raw)?;
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(AgentError::Payload(format!(
                    "expected `{key}` to be an array, got {other}"
                )))
            }
        },
        other => {
            return Err(AgentError::Payload(format!(
                "expected an object or array, got {other}"
            )))
        }
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(AgentError::from))
        .collect()
}
