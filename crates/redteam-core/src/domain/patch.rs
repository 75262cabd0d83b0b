//! `Patch`: a proposed unified-diff fix for one finding.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::finding::Finding;

/// Defender output for one finding id of the same batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub id: String,
    pub diff: String,
    #[serde(default)]
    pub rationale: String,
}

/// Keep only patches that reference one of `findings`.
pub fn normalize_patches(patches: Vec<Patch>, findings: &[Finding]) -> Vec<Patch> {
    let valid: HashSet<&str> = findings.iter().map(|f| f.id.as_str()).collect();
    patches
        .into_iter()
        .filter(|p| valid.contains(p.id.as_str()) && !p.diff.trim().is_empty())
        .collect()
}

/// Findings that no patch references.
pub fn uncovered<'a>(findings: &'a [Finding], patches: &[Patch]) -> Vec<&'a Finding> {
    let covered: HashSet<&str> = patches.iter().map(|p| p.id.as_str()).collect();
    findings
        .iter()
        .filter(|f| !covered.contains(f.id.as_str()))
        .collect()
}
