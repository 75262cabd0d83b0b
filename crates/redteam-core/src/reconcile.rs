//! Derives exactly one authoritative decision per finding for a round.
//!
//! Inputs are the round's active findings, the apply results of the
//! defender's patches, the re-attack findings and (optionally) what an
//! external arbiter said. The arbiter is advisory: its output is filtered
//! to known ids, completed for missing ids and passed through the same
//! repair pass as the deterministic fallback.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::correlate::{find_match, is_still_present};
use crate::domain::{failing_tools, Decision, DecisionStatus, Finding, VerificationResult};
use crate::patch::ApplyResult;

/// Reason recorded for a finding the arbiter did not decide.
pub const MISSING_DECISION_REASON: &str = "Missing decision from arbiter";

/// What the external arbiter produced for this round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArbiterOutcome {
    Decided(Vec<Decision>),
    /// The arbiter did not run or failed; the reason is logged only.
    Unavailable(String),
}

/// Evidence gathered during one round.
#[derive(Debug, Clone, Copy)]
pub struct RoundEvidence<'a> {
    pub findings: &'a [Finding],
    pub apply_results: &'a [ApplyResult],
    pub reattack: &'a [Finding],
    pub verification: &'a [VerificationResult],
}

/// Final decisions for `evidence.findings`, in finding order.
pub fn reconcile(evidence: &RoundEvidence<'_>, arbiter: ArbiterOutcome) -> Vec<Decision> {
    let decisions = match arbiter {
        ArbiterOutcome::Decided(raw) => {
            debug!(count = raw.len(), "reconciling arbiter decisions");
            ensure_coverage(evidence.findings, raw)
        }
        ArbiterOutcome::Unavailable(reason) => {
            info!(%reason, "arbiter unavailable, using deterministic reconciliation");
            fallback_decisions(evidence)
        }
    };
    repair_decisions(decisions, evidence)
}

/// Deterministic decisions from re-attack evidence and apply results.
pub fn fallback_decisions(evidence: &RoundEvidence<'_>) -> Vec<Decision> {
    let failing = failing_tools(evidence.verification);

    evidence
        .findings
        .iter()
        .map(|finding| {
            if let Some(hit) = find_match(finding, evidence.reattack) {
                return Decision::rejected(
                    &finding.id,
                    format!(
                        "Re-attack still reports this issue ({}: {})",
                        hit.id, hit.title
                    ),
                );
            }

            let name = finding.base_name();
            if !evidence.apply_results.is_empty()
                && !evidence
                    .apply_results
                    .iter()
                    .any(|r| r.ok && r.touches_base_name(name))
            {
                return Decision::rejected(
                    &finding.id,
                    format!("No patch was applied successfully to {name}"),
                );
            }

            let mut reason = "Re-attack did not reproduce the issue".to_string();
            if !failing.is_empty() {
                reason.push_str(&format!(
                    "; failing tools (informational): {}",
                    failing.join(", ")
                ));
            }
            Decision::fixed(&finding.id, reason)
        })
        .collect()
}

/// Upgrade rejections that the evidence contradicts: no correlated
/// re-attack finding, and a successful apply touched the same file.
pub fn repair_decisions(decisions: Vec<Decision>, evidence: &RoundEvidence<'_>) -> Vec<Decision> {
    decisions
        .into_iter()
        .map(|decision| {
            if decision.status != DecisionStatus::Rejected {
                return decision;
            }
            let Some(finding) = evidence.findings.iter().find(|f| f.id == decision.id) else {
                return decision;
            };
            if is_still_present(finding, evidence.reattack) {
                return decision;
            }
            let name = finding.base_name();
            let applied = evidence
                .apply_results
                .iter()
                .any(|r| r.ok && r.touches_base_name(name));
            if !applied {
                return decision;
            }
            debug!(id = %decision.id, file = name, "upgrading rejected decision");
            Decision::fixed(
                &decision.id,
                format!(
                    "Upgraded to fixed: a patch applied to {name} and re-attack found no matching issue \
                     (file-level match despite finding id mismatch)"
                ),
            )
        })
        .collect()
}

/// One decision per finding: unknown ids dropped, duplicates keep the
/// first, missing ids synthesized as rejected.
pub fn ensure_coverage(findings: &[Finding], raw: Vec<Decision>) -> Vec<Decision> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut by_id = Vec::with_capacity(raw.len());
    for decision in raw {
        if seen.insert(decision.id.clone()) {
            by_id.push(decision);
        }
    }

    findings
        .iter()
        .map(|finding| {
            by_id
                .iter()
                .find(|d| d.id == finding.id)
                .cloned()
                .unwrap_or_else(|| Decision::rejected(&finding.id, MISSING_DECISION_REASON))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FindingStatus, Severity};
    use crate::patch::ApplyMethod;

    fn finding(id: &str, cwe: &str, file: &str, evidence: &str) -> Finding {
        Finding {
            id: id.to_string(),
            title: format!("issue {id}"),
            cwe: cwe.to_string(),
            severity: Severity::High,
            file: file.to_string(),
            line: 10,
            evidence: evidence.to_string(),
            impact: String::new(),
            fix_plan: String::new(),
            status: FindingStatus::Open,
        }
    }

    fn applied(id: &str, ok: bool, files: &[&str]) -> ApplyResult {
        ApplyResult {
            id: id.to_string(),
            ok,
            method: if ok { ApplyMethod::Loose } else { ApplyMethod::None },
            attempts: Vec::new(),
            files: files.iter().map(|s| s.to_string()).collect(),
            note: String::new(),
        }
    }

    fn tool(name: &str, exit_code: i32) -> VerificationResult {
        VerificationResult {
            name: name.to_string(),
            command: vec![name.to_string()],
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            parsed: None,
        }
    }

    #[test]
    fn test_empty_arbiter_output_still_covers_every_finding() {
        let findings = vec![
            finding("F-001", "CWE-89", "app.py", "a"),
            finding("F-002", "CWE-79", "ui.js", "b"),
        ];
        let evidence = RoundEvidence {
            findings: &findings,
            apply_results: &[],
            reattack: &[],
            verification: &[],
        };
        let out = reconcile(&evidence, ArbiterOutcome::Decided(Vec::new()));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|d| d.status == DecisionStatus::Rejected));
        assert_eq!(out[0].reason, MISSING_DECISION_REASON);
    }

    #[test]
    fn test_unknown_and_duplicate_ids() {
        let findings = vec![finding("F-001", "CWE-89", "app.py", "a")];
        let raw = vec![
            Decision::fixed("F-001", "first"),
            Decision::rejected("F-001", "second"),
            Decision::fixed("F-999", "stray"),
        ];
        let out = ensure_coverage(&findings, raw);
        assert_eq!(out, vec![Decision::fixed("F-001", "first")]);
    }

    #[test]
    fn test_failed_apply_rejects() {
        let findings = vec![finding("F-001", "CWE-89", "app.py", "a")];
        let results = vec![applied("F-001", false, &["app.py"])];
        let evidence = RoundEvidence {
            findings: &findings,
            apply_results: &results,
            reattack: &[],
            verification: &[],
        };
        let out = fallback_decisions(&evidence);
        assert_eq!(out[0].status, DecisionStatus::Rejected);
        assert!(out[0].reason.contains("app.py"));
    }

    #[test]
    fn test_failing_tools_are_informational() {
        let findings = vec![finding("F-001", "CWE-89", "app.py", "a")];
        let verification = vec![tool("bandit", 1), tool("pytest", 0)];
        let evidence = RoundEvidence {
            findings: &findings,
            apply_results: &[],
            reattack: &[],
            verification: &verification,
        };
        let out = fallback_decisions(&evidence);
        assert_eq!(out[0].status, DecisionStatus::Fixed);
        assert!(out[0].reason.contains("bandit"));
        assert!(!out[0].reason.contains("pytest"));
    }

    #[test]
    fn test_repair_upgrades_mislabeled_arbiter_rejection() {
        let findings = vec![
            finding("F-001", "CWE-89", "src/app.py", "query"),
            finding("F-002", "CWE-78", "src/app.py", "shell"),
        ];
        // One diff fixed both issues but was labelled with F-001 only.
        let results = vec![applied("F-001", true, &["src/app.py"])];
        let evidence = RoundEvidence {
            findings: &findings,
            apply_results: &results,
            reattack: &[],
            verification: &[],
        };
        let raw = vec![
            Decision::fixed("F-001", "ok"),
            Decision::rejected("F-002", "no patch for this id"),
        ];
        let out = reconcile(&evidence, ArbiterOutcome::Decided(raw));
        assert_eq!(out[1].status, DecisionStatus::Fixed);
        assert!(out[1].reason.contains("file-level match"));
    }

    #[test]
    fn test_repair_keeps_rejection_when_still_present() {
        let findings = vec![finding("F-001", "CWE-89", "app.py", "SELECT")];
        let results = vec![applied("F-001", true, &["app.py"])];
        let reattack = vec![finding("R-1", "CWE-89", "app.py", "SELECT * FROM t")];
        let evidence = RoundEvidence {
            findings: &findings,
            apply_results: &results,
            reattack: &reattack,
            verification: &[],
        };
        let raw = vec![Decision::rejected("F-001", "still vulnerable")];
        let out = reconcile(&evidence, ArbiterOutcome::Decided(raw));
        assert_eq!(out[0].status, DecisionStatus::Rejected);
        assert_eq!(out[0].reason, "still vulnerable");
    }
}
