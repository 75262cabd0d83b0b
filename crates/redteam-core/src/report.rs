//! Markdown report for a finished run (`REPORT.md`).

use serde::{Deserialize, Serialize};

use crate::domain::{Decision, Finding, Patch, VerificationResult, Verdict};
use crate::patch::ApplyResult;
use crate::scorecard::Scorecard;

/// Everything rendered into REPORT.md.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInput {
    pub run_id: String,
    pub target: String,
    pub scan_mode: String,
    pub rounds: u32,
    pub verdict: Option<Verdict>,
    pub findings: Vec<Finding>,
    pub patches: Vec<Patch>,
    pub apply_results: Vec<ApplyResult>,
    pub verification: Vec<VerificationResult>,
    pub decisions: Vec<Decision>,
    pub scorecard: Scorecard,
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Render the report. Output depends only on the input.
pub fn render_report(input: &ReportInput) -> String {
    let card = &input.scorecard;
    let mut out = String::new();
    out.push_str("# Security Audit Report\n\n");

    out.push_str("## Summary\n");
    out.push_str(&format!(
        "- run: `{}`\n- target: `{}`\n- scan mode: {}\n- rounds: {}\n",
        input.run_id, input.target, input.scan_mode, input.rounds
    ));
    out.push_str(&format!(
        "- findings: {}\n- fixed: {}\n- rejected: {}\n- fix rate: {:.2}\n- tools pass: {}\n",
        card.findings_total, card.fixed, card.rejected, card.fix_rate, card.tools_pass
    ));
    if let (Some(total), Some(delta), Some(overlap)) = (
        card.baseline_total,
        card.delta_vs_baseline,
        card.baseline_overlap,
    ) {
        out.push_str(&format!(
            "- baseline findings: {}\n- delta vs baseline: {:+}\n- baseline overlap: {}\n",
            total, delta, overlap
        ));
    }
    out.push('\n');

    out.push_str("## Verdict\n");
    match input.verdict {
        Some(v) => out.push_str(&format!("**{}**\n\n", v.as_str().to_uppercase())),
        None => out.push_str("_not validated_\n\n"),
    }

    out.push_str("## Findings\n");
    if input.findings.is_empty() {
        out.push_str("No findings.\n\n");
    } else {
        out.push_str("| id | severity | cwe | location | title | status |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for f in &input.findings {
            out.push_str(&format!(
                "| {} | {} | {} | `{}:{}` | {} | {} |\n",
                cell(&f.id),
                f.severity,
                cell(&f.cwe),
                cell(&f.file),
                f.line,
                cell(&f.title),
                f.status
            ));
        }
        out.push('\n');
    }

    out.push_str("## Patches\n");
    if input.patches.is_empty() {
        out.push_str("No patches proposed.\n\n");
    } else {
        for p in &input.patches {
            let status = match input.apply_results.iter().find(|r| r.id == p.id) {
                Some(r) if r.ok => format!("applied ({})", r.method),
                Some(r) if r.note.is_empty() => format!("not applied ({})", r.method),
                Some(r) => format!("not applied ({}): {}", r.method, cell(r.note.trim())),
                None => "not applied".to_string(),
            };
            out.push_str(&format!("### {}\n", p.id));
            out.push_str(&format!("- status: {}\n", status));
            if !p.rationale.trim().is_empty() {
                out.push_str(&format!("- rationale: {}\n", cell(p.rationale.trim())));
            }
            out.push_str("\n```diff\n");
            out.push_str(p.diff.trim_end());
            out.push_str("\n```\n\n");
        }
    }

    out.push_str("## Verification\n");
    if input.verification.is_empty() {
        out.push_str("No tools ran.\n\n");
    } else {
        out.push_str("| tool | command | exit code | result |\n");
        out.push_str("|---|---|---|---|\n");
        for v in &input.verification {
            let result = if v.passed() {
                "pass"
            } else if v.not_found() {
                "not found"
            } else {
                "fail"
            };
            out.push_str(&format!(
                "| {} | `{}` | {} | {} |\n",
                cell(&v.name),
                cell(&v.command.join(" ")),
                v.exit_code,
                result
            ));
        }
        out.push('\n');
    }

    out.push_str("## Decisions\n");
    if input.decisions.is_empty() {
        out.push_str("No decisions.\n");
    } else {
        for d in &input.decisions {
            out.push_str(&format!("- `{}`: **{}**", d.id, d.status));
            if !d.reason.trim().is_empty() {
                out.push_str(&format!(" ({})", cell(d.reason.trim())));
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FindingStatus, Severity};
    use crate::patch::ApplyMethod;
    use crate::scorecard::build_scorecard;

    fn input() -> ReportInput {
        let findings = vec![Finding {
            id: "F-001".into(),
            title: "SQL | injection".into(),
            cwe: "CWE-89".into(),
            severity: Severity::High,
            file: "app.py".into(),
            line: 4,
            evidence: String::new(),
            impact: String::new(),
            fix_plan: String::new(),
            status: FindingStatus::Fixed,
        }];
        let decisions = vec![Decision::fixed("F-001", "Re-attack did not reproduce the issue")];
        let scorecard = build_scorecard(&findings, &decisions, &[], None);
        ReportInput {
            run_id: "20250101_000000_deadbeef".into(),
            target: "/srv/app".into(),
            scan_mode: "heuristic".into(),
            rounds: 1,
            verdict: Some(Verdict::Approved),
            findings,
            patches: vec![Patch {
                id: "F-001".into(),
                diff: "--- a/app.py\n+++ b/app.py\n".into(),
                rationale: "parameterize".into(),
            }],
            apply_results: vec![ApplyResult {
                id: "F-001".into(),
                ok: true,
                method: ApplyMethod::Loose,
                files: vec!["app.py".into()],
                ..Default::default()
            }],
            verification: Vec::new(),
            decisions,
            scorecard,
        }
    }

    #[test]
    fn test_report_sections() {
        let md = render_report(&input());
        for heading in ["## Summary", "## Verdict", "## Findings", "## Patches", "## Verification", "## Decisions"] {
            assert!(md.contains(heading), "missing {heading}");
        }
        assert!(md.contains("**APPROVED**"));
        assert!(md.contains("applied (loose)"));
        assert!(md.contains("SQL \\| injection"));
        assert!(md.contains("No tools ran."));
    }

    #[test]
    fn test_report_is_deterministic() {
        assert_eq!(render_report(&input()), render_report(&input()));
    }
}
