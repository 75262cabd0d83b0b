//! Run scorecard: fix rate, tool status and comparison with a baseline scan.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Decision, DecisionCounts, Finding, VerificationResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub findings_total: usize,
    pub fixed: usize,
    pub rejected: usize,
    /// `fixed / findings_total`, rounded to two decimals
    pub fix_rate: f64,
    /// All tools exited 0; false when no tool ran
    pub tools_pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_vs_baseline: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_overlap: Option<usize>,
}

fn overlap_key(f: &Finding) -> String {
    format!("{}:{}:{}", f.file, f.line, f.title)
}

pub fn build_scorecard(
    findings: &[Finding],
    decisions: &[Decision],
    verification: &[VerificationResult],
    baseline: Option<&[Finding]>,
) -> Scorecard {
    let total = findings.len();
    let counts = DecisionCounts::from_decisions(decisions);
    let fix_rate = if total == 0 {
        0.0
    } else {
        (counts.fixed as f64 / total as f64 * 100.0).round() / 100.0
    };
    let tools_pass = !verification.is_empty() && verification.iter().all(|v| v.passed());

    let mut card = Scorecard {
        findings_total: total,
        fixed: counts.fixed,
        rejected: counts.rejected,
        fix_rate,
        tools_pass,
        baseline_total: None,
        delta_vs_baseline: None,
        baseline_overlap: None,
    };

    if let Some(baseline) = baseline {
        let ours: HashSet<String> = findings.iter().map(overlap_key).collect();
        let theirs: HashSet<String> = baseline.iter().map(overlap_key).collect();
        card.baseline_total = Some(baseline.len());
        card.delta_vs_baseline = Some(total as i64 - baseline.len() as i64);
        card.baseline_overlap = Some(ours.intersection(&theirs).count());
    }
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FindingStatus, Severity};

    fn finding(file: &str, line: u32, title: &str) -> Finding {
        Finding {
            id: String::new(),
            title: title.to_string(),
            cwe: "CWE-89".to_string(),
            severity: Severity::High,
            file: file.to_string(),
            line,
            evidence: String::new(),
            impact: String::new(),
            fix_plan: String::new(),
            status: FindingStatus::Open,
        }
    }

    #[test]
    fn test_fix_rate_and_tools() {
        let findings = vec![finding("a.py", 1, "x"), finding("a.py", 2, "y"), finding("b.py", 3, "z")];
        let decisions = vec![Decision::fixed("F-001", ""), Decision::rejected("F-002", "")];
        let card = build_scorecard(&findings, &decisions, &[], None);
        assert_eq!(card.fix_rate, 0.33);
        assert!(!card.tools_pass);
        assert!(card.baseline_total.is_none());
        let json = serde_json::to_value(&card).unwrap();
        assert!(json.get("baseline_total").is_none());
    }

    #[test]
    fn test_baseline_overlap() {
        let findings = vec![finding("a.py", 1, "x"), finding("a.py", 2, "y")];
        let baseline = vec![finding("a.py", 1, "x"), finding("c.py", 9, "q"), finding("d.py", 1, "r")];
        let card = build_scorecard(&findings, &[], &[], Some(&baseline));
        assert_eq!(card.baseline_total, Some(3));
        assert_eq!(card.delta_vs_baseline, Some(-1));
        assert_eq!(card.baseline_overlap, Some(1));
        assert_eq!(card.fix_rate, 0.0);
    }
}
