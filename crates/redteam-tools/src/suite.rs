//! The verification suite run after each round's patches.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use redteam_core::agents::ContextHints;
use redteam_core::domain::VerificationResult;
use redteam_core::files::list_code_files;
use redteam_core::round::{apply_root, Verifier};
use tracing::{info, warn};

use crate::hints::security_hints;
use crate::runner::ToolRunner;
use crate::tool::{BuiltinTool, ToolConfig};

/// Output recorded for a test runner that found nothing to run.
pub const NO_TESTS_MESSAGE: &str = "No tests found. Skipping.";

/// Runs the configured builtin tools in order. Each tool is bounded by
/// the suite timeout; nothing here fails the round.
#[derive(Debug, Clone)]
pub struct LinterSuite {
    tools: Vec<BuiltinTool>,
    timeout: Duration,
}

impl LinterSuite {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: BuiltinTool::ALL.to_vec(),
            timeout,
        }
    }

    pub fn with_tools(mut self, tools: Vec<BuiltinTool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn tools(&self) -> &[BuiltinTool] {
        &self.tools
    }

    /// Run one tool against `target`.
    pub async fn run_tool(&self, tool: BuiltinTool, target: &Path) -> VerificationResult {
        let config = ToolConfig::from_builtin(tool, target, self.timeout.as_secs());

        if tool == BuiltinTool::TestRunner && !has_tests(target) {
            info!(tool = tool.name(), "no tests found, skipping");
            return VerificationResult {
                name: config.name,
                command: config.command,
                exit_code: 0,
                stdout: NO_TESTS_MESSAGE.to_string(),
                stderr: String::new(),
                parsed: None,
            };
        }

        let cwd = apply_root(target);
        match ToolRunner::execute(&config, &cwd).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = tool.name(), error = %e, "tool could not be started");
                VerificationResult {
                    name: config.name,
                    command: config.command,
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    parsed: None,
                }
            }
        }
    }

    /// Run every configured tool, in order.
    pub async fn run(&self, target: &Path) -> Vec<VerificationResult> {
        let mut results = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            let result = self.run_tool(*tool, target).await;
            info!(
                tool = %result.name,
                exit_code = result.exit_code,
                "verification tool finished"
            );
            results.push(result);
        }
        results
    }
}

impl Default for LinterSuite {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

/// Python test files (`test_*.py` or `*_test.py`) anywhere under `target`.
fn has_tests(target: &Path) -> bool {
    let files = match list_code_files(target, &[".py".to_string()]) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "could not list test files");
            return false;
        }
    };
    files.iter().any(|path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("test_") || n.ends_with("_test.py"))
            .unwrap_or(false)
    })
}

#[async_trait]
impl Verifier for LinterSuite {
    async fn verify(&self, target: &Path) -> Vec<VerificationResult> {
        self.run(target).await
    }
}

#[async_trait]
impl ContextHints for LinterSuite {
    async fn hints(&self, target: &Path) -> Option<String> {
        let result = self.run_tool(BuiltinTool::SecurityLint, target).await;
        security_hints(&result)
    }
}
