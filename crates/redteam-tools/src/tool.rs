//! Verification tool definitions and configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Builtin verification tools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    /// bandit -r <target> -f json
    SecurityLint,

    /// ruff check <target> --output-format json
    StyleLint,

    /// pytest -q <target>
    TestRunner,
}

impl BuiltinTool {
    pub const ALL: [BuiltinTool; 3] = [
        BuiltinTool::SecurityLint,
        BuiltinTool::StyleLint,
        BuiltinTool::TestRunner,
    ];

    /// Name recorded in `VerificationResult::name`.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinTool::SecurityLint => "bandit",
            BuiltinTool::StyleLint => "ruff",
            BuiltinTool::TestRunner => "pytest",
        }
    }

    /// Full command line for `target` (first element is the executable).
    pub fn command(&self, target: &Path) -> Vec<String> {
        let target = target.display().to_string();
        match self {
            BuiltinTool::SecurityLint => vec![
                "bandit".to_string(),
                "-r".to_string(),
                target,
                "-f".to_string(),
                "json".to_string(),
            ],
            BuiltinTool::StyleLint => vec![
                "ruff".to_string(),
                "check".to_string(),
                target,
                "--output-format".to_string(),
                "json".to_string(),
            ],
            BuiltinTool::TestRunner => {
                vec!["pytest".to_string(), "-q".to_string(), target]
            }
        }
    }

    /// Whether stdout is a JSON report worth keeping in `parsed`.
    pub fn emits_json(&self) -> bool {
        matches!(self, BuiltinTool::SecurityLint | BuiltinTool::StyleLint)
    }
}

/// One configured tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Name recorded in results.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Parse stdout as JSON into `parsed`.
    pub parse_json: bool,

    /// Timeout in seconds; 0 means unbounded.
    pub timeout_secs: u64,

    pub enabled: bool,
}

impl ToolConfig {
    pub fn from_builtin(tool: BuiltinTool, target: &Path, timeout_secs: u64) -> Self {
        Self {
            name: tool.name().to_string(),
            command: tool.command(target),
            parse_json: tool.emits_json(),
            timeout_secs,
            enabled: true,
        }
    }

    pub fn custom(name: String, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name,
            command,
            parse_json: false,
            timeout_secs,
            enabled: true,
        }
    }

    pub fn with_json(mut self) -> Self {
        self.parse_json = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
