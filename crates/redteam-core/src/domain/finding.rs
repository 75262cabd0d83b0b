//! `Finding`: one reported issue with location, evidence and severity.
//!
//! Finding ids are unique only within one scan batch. They are not stable
//! across scan methods or rounds, so nothing downstream may rely on them to
//! recognise the same issue twice (see [`crate::correlate`]).

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::decision::{Decision, DecisionStatus};

/// Severity of a finding.
///
/// Deserialization is lenient: model output such as `"High"` or
/// `"severe"` is folded into the closest known level (`medium` when unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" | "info" | "informational" => Severity::Low,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Severity::parse_lenient(&raw))
    }
}

/// Lifecycle of a finding within the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    #[default]
    Open,
    Fixed,
    Rejected,
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FindingStatus::Open => "open",
            FindingStatus::Fixed => "fixed",
            FindingStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// One reported issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cwe: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub file: String,
    #[serde(default, deserialize_with = "lenient_line")]
    pub line: u32,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub fix_plan: String,
    #[serde(default)]
    pub status: FindingStatus,
}

impl Finding {
    /// Final path component of `file`, used to compare locations across
    /// scans that report absolute and relative paths.
    pub fn base_name(&self) -> &str {
        base_name(&self.file)
    }

    /// A finding still needs a defender pass.
    pub fn is_active(&self) -> bool {
        self.status != FindingStatus::Fixed
    }
}

/// Final component of a `/`- or `\`-separated path.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim().trim_end_matches(['/', '\\']);
    Path::new(trimmed)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.rsplit('\\').next().unwrap_or(n))
        .unwrap_or(trimmed)
}

fn lenient_line<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0).min(u32::MAX as u64) as u32,
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Fill missing ids (`F-001`, ...) in scan order.
pub fn normalize_findings(findings: Vec<Finding>) -> Vec<Finding> {
    findings
        .into_iter()
        .enumerate()
        .map(|(idx, mut finding)| {
            if finding.id.trim().is_empty() {
                finding.id = format!("F-{:03}", idx + 1);
            }
            finding
        })
        .collect()
}

/// Apply one round's decisions to the findings they name.
///
/// Findings without a decision keep their status, and a finding that is
/// already fixed is never moved back.
pub fn apply_decisions(findings: &[Finding], decisions: &[Decision]) -> Vec<Finding> {
    findings
        .iter()
        .map(|finding| {
            let mut updated = finding.clone();
            if finding.status == FindingStatus::Fixed {
                return updated;
            }
            if let Some(decision) = decisions.iter().find(|d| d.id == finding.id) {
                updated.status = match decision.status {
                    DecisionStatus::Fixed => FindingStatus::Fixed,
                    DecisionStatus::Rejected => FindingStatus::Rejected,
                };
            }
            updated
        })
        .collect()
}
