//! Per-finding decisions and the round verdict derived from them.

use serde::{Deserialize, Serialize};

/// Authoritative outcome for one finding in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Fixed,
    Rejected,
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DecisionStatus::Fixed => "fixed",
            DecisionStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// One decision per finding per round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub status: DecisionStatus,
    #[serde(default)]
    pub reason: String,
}

impl Decision {
    pub fn fixed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: DecisionStatus::Fixed,
            reason: reason.into(),
        }
    }

    pub fn rejected(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: DecisionStatus::Rejected,
            reason: reason.into(),
        }
    }
}

/// Round verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Partial,
    Rejected,
}

impl Verdict {
    /// `approved` iff at least one fixed and none rejected; `partial` iff
    /// both are present; `rejected` otherwise, including no decisions at all.
    pub fn from_decisions(decisions: &[Decision]) -> Self {
        let fixed = decisions
            .iter()
            .filter(|d| d.status == DecisionStatus::Fixed)
            .count();
        let rejected = decisions.len() - fixed;
        match (fixed, rejected) {
            (f, 0) if f > 0 => Verdict::Approved,
            (f, r) if f > 0 && r > 0 => Verdict::Partial,
            _ => Verdict::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::Partial => "partial",
            Verdict::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed/rejected tallies for a decision set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub total: usize,
    pub fixed: usize,
    pub rejected: usize,
}

impl DecisionCounts {
    pub fn from_decisions(decisions: &[Decision]) -> Self {
        let fixed = decisions
            .iter()
            .filter(|d| d.status == DecisionStatus::Fixed)
            .count();
        Self {
            total: decisions.len(),
            fixed,
            rejected: decisions.len() - fixed,
        }
    }
}
