//! Output of one external tool invocation.

use serde::{Deserialize, Serialize};

/// Reserved exit code for a tool whose executable could not be found.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

/// Reserved exit code for a tool invocation that hit its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub name: String,
    pub command: Vec<String>,
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<serde_json::Value>,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    pub fn not_found(&self) -> bool {
        self.exit_code == NOT_FOUND_EXIT_CODE
    }
}

/// Names of the tools that currently fail (missing tools count as failing).
pub fn failing_tools(results: &[VerificationResult]) -> Vec<&str> {
    results
        .iter()
        .filter(|r| !r.passed())
        .map(|r| r.name.as_str())
        .collect()
}
