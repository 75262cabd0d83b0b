//! Decision reconciliation over realistic round evidence.

use redteam_core::domain::{Decision, DecisionStatus, Finding, FindingStatus, Severity, Verdict};
use redteam_core::patch::{ApplyMethod, ApplyResult};
use redteam_core::reconcile::{reconcile, ArbiterOutcome, RoundEvidence, MISSING_DECISION_REASON};
use redteam_core::same_issue;

fn sqli(id: &str, file: &str, evidence: &str) -> Finding {
    Finding {
        id: id.to_string(),
        title: "SQL injection".to_string(),
        cwe: "CWE-89".to_string(),
        severity: Severity::High,
        file: file.to_string(),
        line: 10,
        evidence: evidence.to_string(),
        impact: String::new(),
        fix_plan: String::new(),
        status: FindingStatus::Open,
    }
}

fn applied(id: &str, file: &str) -> ApplyResult {
    ApplyResult {
        id: id.to_string(),
        ok: true,
        method: ApplyMethod::GitApply,
        files: vec![file.to_string()],
        ..ApplyResult::default()
    }
}

fn evidence<'a>(
    findings: &'a [Finding],
    apply_results: &'a [ApplyResult],
    reattack: &'a [Finding],
) -> RoundEvidence<'a> {
    RoundEvidence {
        findings,
        apply_results,
        reattack,
        verification: &[],
    }
}

#[test]
fn reattack_match_is_rejected() {
    let findings = vec![sqli(
        "F-001",
        "app.py",
        "SELECT * FROM users WHERE name = '{username}'",
    )];
    let reattack = vec![sqli("R-7", "/tmp/checkout/app.py", "SELECT * FROM users")];

    let decisions = reconcile(
        &evidence(&findings, &[], &reattack),
        ArbiterOutcome::Unavailable("model disabled".into()),
    );

    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].id, "F-001");
    assert_eq!(decisions[0].status, DecisionStatus::Rejected);
    assert!(decisions[0].reason.contains("Re-attack"));
}

#[test]
fn applied_and_not_reproduced_is_fixed() {
    let findings = vec![sqli(
        "F-001",
        "app.py",
        "SELECT * FROM users WHERE name = '{username}'",
    )];
    let apply = vec![applied("F-001", "app.py")];

    let decisions = reconcile(
        &evidence(&findings, &apply, &[]),
        ArbiterOutcome::Unavailable("model disabled".into()),
    );

    assert_eq!(decisions, vec![Decision::fixed("F-001", decisions[0].reason.clone())]);
    assert_eq!(Verdict::from_decisions(&decisions), Verdict::Approved);
}

#[test]
fn arbiter_omission_is_synthesized_not_dropped() {
    let findings = vec![
        sqli("F-001", "app.py", "a"),
        sqli("F-002", "db.py", "b"),
        sqli("F-003", "web.py", "c"),
    ];
    let arbiter = ArbiterOutcome::Decided(vec![
        Decision::fixed("F-002", "patched"),
        Decision::rejected("F-002", "duplicate, ignored"),
        Decision::fixed("F-999", "unknown id"),
    ]);

    let decisions = reconcile(&evidence(&findings, &[], &[]), arbiter);

    let ids: Vec<&str> = decisions.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["F-001", "F-002", "F-003"]);
    assert_eq!(decisions[0].reason, MISSING_DECISION_REASON);
    assert_eq!(decisions[1].status, DecisionStatus::Fixed);
    assert_eq!(decisions[2].status, DecisionStatus::Rejected);
    assert_eq!(Verdict::from_decisions(&decisions), Verdict::Partial);
}

#[test]
fn arbiter_rejection_repaired_by_file_level_match() {
    // Defender labelled the combined patch with only one of the two ids.
    let findings = vec![sqli("F-001", "app.py", "a"), sqli("F-002", "app.py", "b")];
    let apply = vec![applied("F-001", "app.py")];
    let arbiter = ArbiterOutcome::Decided(vec![
        Decision::fixed("F-001", "patched"),
        Decision::rejected("F-002", "no patch for this id"),
    ]);

    let decisions = reconcile(&evidence(&findings, &apply, &[]), arbiter);

    assert!(decisions.iter().all(|d| d.status == DecisionStatus::Fixed));
    assert!(decisions[1].reason.contains("file-level match"));
}

#[test]
fn one_decision_per_finding_with_empty_arbiter() {
    let findings: Vec<Finding> = (1..=5)
        .map(|i| sqli(&format!("F-{i:03}"), "app.py", "x"))
        .collect();
    let decisions = reconcile(
        &evidence(&findings, &[], &[]),
        ArbiterOutcome::Decided(Vec::new()),
    );
    assert_eq!(decisions.len(), findings.len());
}

#[test]
fn correlation_requires_same_cwe() {
    let a = sqli("F-001", "app.py", "SELECT * FROM users");
    let mut b = sqli("X", "src/app.py", "cursor.execute(SELECT * FROM users WHERE id=1)");
    assert!(same_issue(&a, &b));

    b.cwe = "CWE-79".to_string();
    assert!(!same_issue(&a, &b));
}
