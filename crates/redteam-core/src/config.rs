//! Audit settings, read from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by every command. `Default` reads the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Chat model name (`OPENAI_MODEL`)
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Chat-completions API base (`OPENAI_BASE_URL`)
    pub base_url: String,
    /// API key; the model roles are disabled without one
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub run_dir: PathBuf,
    pub max_file_bytes: usize,
    pub max_total_bytes: usize,
    /// File extensions included in scans, with leading dot
    pub extensions: Vec<String>,
    pub max_rounds: u32,
    pub apply_timeout_secs: u64,
    pub tool_timeout_secs: u64,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl AuditSettings {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Build settings from an arbitrary variable source. Unparseable values
    /// fall back to the default for that key.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        AuditSettings {
            model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature: parse_value(get("OPENAI_TEMPERATURE")).unwrap_or(0.2),
            max_tokens: parse_value(get("OPENAI_MAX_TOKENS")).unwrap_or(2000),
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: get("OPENAI_API_KEY"),
            run_dir: get("AUDIT_RUN_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("runs")),
            max_file_bytes: parse_value(get("AUDIT_MAX_FILE_BYTES")).unwrap_or(20_000),
            max_total_bytes: parse_value(get("AUDIT_MAX_TOTAL_BYTES")).unwrap_or(200_000),
            extensions: get("AUDIT_EXTENSIONS")
                .map(|v| parse_extensions(&v))
                .unwrap_or_else(default_extensions),
            max_rounds: parse_value(get("AUDIT_MAX_ROUNDS")).unwrap_or(2),
            apply_timeout_secs: parse_value(get("AUDIT_APPLY_TIMEOUT_SECS")).unwrap_or(15),
            tool_timeout_secs: parse_value(get("AUDIT_TOOL_TIMEOUT_SECS")).unwrap_or(120),
        }
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_value<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

pub fn default_extensions() -> Vec<String> {
    [".py", ".js", ".ts", ".jsx", ".tsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Split a comma list, adding a leading dot where missing.
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|e| {
            if e.starts_with('.') {
                e.to_lowercase()
            } else {
                format!(".{}", e.to_lowercase())
            }
        })
        .collect()
}
