//! Single tool execution.

use std::path::Path;
use std::time::Duration;

use redteam_core::domain::VerificationResult;
use redteam_core::process::run_command;
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::tool::ToolConfig;

/// Executes one configured tool.
pub struct ToolRunner;

impl ToolRunner {
    /// Run `config` in `cwd`.
    ///
    /// Missing executables and timeouts come back as results with the
    /// reserved exit codes. Only an empty command is an error.
    pub async fn execute(config: &ToolConfig, cwd: &Path) -> Result<VerificationResult> {
        let Some((exe, args)) = config.command.split_first() else {
            return Err(ToolError::EmptyCommand(config.name.clone()));
        };

        let out = run_command(exe, args, cwd, Duration::from_secs(config.timeout_secs)).await;
        debug!(
            tool = %config.name,
            exit_code = out.exit_code,
            duration_ms = out.duration_ms,
            "tool finished"
        );

        let parsed = if config.parse_json {
            serde_json::from_str(out.stdout.trim()).ok()
        } else {
            None
        };

        Ok(VerificationResult {
            name: config.name.clone(),
            command: config.command.clone(),
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
            parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redteam_core::domain::NOT_FOUND_EXIT_CODE;

    #[tokio::test]
    async fn test_execute_simple_command() {
        let config = ToolConfig::custom(
            "echo_test".to_string(),
            vec!["echo".to_string(), "hello".to_string()],
            60,
        );

        let result = ToolRunner::execute(&config, Path::new(".")).await.unwrap();
        assert!(result.passed());
        assert!(result.stdout.contains("hello"));
        assert!(result.parsed.is_none());
    }

    #[tokio::test]
    async fn test_json_stdout_is_parsed() {
        let config = ToolConfig::custom(
            "json_test".to_string(),
            vec!["echo".to_string(), r#"{"results": []}"#.to_string()],
            60,
        )
        .with_json();

        let result = ToolRunner::execute(&config, Path::new(".")).await.unwrap();
        assert_eq!(result.parsed, Some(serde_json::json!({"results": []})));
    }

    #[tokio::test]
    async fn test_missing_tool_is_a_result() {
        let config = ToolConfig::custom(
            "ghost".to_string(),
            vec!["redteam-no-such-linter".to_string()],
            60,
        )
        .with_json();

        let result = ToolRunner::execute(&config, Path::new(".")).await.unwrap();
        assert_eq!(result.exit_code, NOT_FOUND_EXIT_CODE);
        assert!(result.parsed.is_none());
    }

    #[tokio::test]
    async fn test_empty_command_is_an_error() {
        let config = ToolConfig::custom("empty".to_string(), Vec::new(), 60);
        let err = ToolRunner::execute(&config, Path::new(".")).await.unwrap_err();
        assert!(matches!(err, ToolError::EmptyCommand(_)));
    }
}
