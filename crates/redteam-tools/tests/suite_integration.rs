//! LinterSuite as the round verifier.

use std::sync::Arc;
use std::time::Duration;

use redteam_core::domain::{DecisionStatus, Finding, FindingStatus, Severity};
use redteam_core::fakes::ScriptedRoles;
use redteam_core::round::{RoundConfig, RoundController, Verifier};
use redteam_tools::{BuiltinTool, LinterSuite};

fn finding() -> Finding {
    Finding {
        id: "F-001".to_string(),
        title: "Weak hash".to_string(),
        cwe: "CWE-327".to_string(),
        severity: Severity::Medium,
        file: "app.py".to_string(),
        line: 2,
        evidence: "hashlib.md5(data)".to_string(),
        impact: String::new(),
        fix_plan: String::new(),
        status: FindingStatus::Open,
    }
}

/// Test: every configured tool yields a result, installed or not
#[tokio::test]
async fn test_suite_reports_every_tool() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.py"), "import hashlib\nhashlib.md5(b'x')\n").unwrap();

    let suite = LinterSuite::new(Duration::from_secs(60));
    let results = suite.verify(dir.path()).await;

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["bandit", "ruff", "pytest"]);
    assert_eq!(results[2].exit_code, 0, "no test files means the runner is skipped");
}

/// Test: failing tools are informational for the fallback reconciler
#[tokio::test]
async fn test_tool_failures_do_not_reject_fixed_findings() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.py"), "import hashlib\n").unwrap();

    let suite = LinterSuite::new(Duration::from_secs(60))
        .with_tools(vec![BuiltinTool::StyleLint, BuiltinTool::TestRunner]);
    let roles = Arc::new(ScriptedRoles::new(vec![finding()]));
    let controller = RoundController::new(roles, Arc::new(suite), RoundConfig::new(1, false));

    let outcome = controller.run(dir.path()).await.unwrap();

    let round = outcome.last_round().unwrap();
    assert_eq!(round.verification.len(), 2);
    assert_eq!(round.decisions.len(), 1);
    assert_eq!(round.decisions[0].status, DecisionStatus::Fixed);
    if round.verification.iter().any(|v| !v.passed()) {
        assert!(round.decisions[0].reason.contains("informational"));
    }
}
