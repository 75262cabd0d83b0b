//! Full loop with the model disabled: heuristic scan, heuristic patches,
//! loose apply, heuristic re-attack and deterministic reconciliation.

use std::sync::Arc;
use std::time::Duration;

use redteam_core::agents::ModelRoles;
use redteam_core::completion::DisabledCompletion;
use redteam_core::config::AuditSettings;
use redteam_core::domain::{AuditError, FindingStatus, Verdict};
use redteam_core::fakes::StaticVerifier;
use redteam_core::patch::PatchApplier;
use redteam_core::round::{RoundConfig, RoundController, ScanMode};
use redteam_core::scorecard::build_scorecard;

fn roles() -> Arc<ModelRoles> {
    let settings = AuditSettings::from_lookup(|_| None);
    Arc::new(ModelRoles::new(Arc::new(DisabledCompletion::default()), settings))
}

fn applier() -> PatchApplier {
    PatchApplier::new(Duration::from_secs(5))
        .with_programs("redteam-test-missing-git", "redteam-test-missing-patch")
}

#[tokio::test]
async fn pickle_loads_is_fixed_in_one_round() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("loader.py");
    std::fs::write(&file, "import pickle\n\n\ndef load(blob):\n    return pickle.loads(blob)\n").unwrap();

    let controller = RoundController::new(
        roles(),
        Arc::new(StaticVerifier::default()),
        RoundConfig::new(2, true),
    )
    .with_applier(applier());
    let outcome = controller.run(dir.path()).await.unwrap();

    assert_eq!(outcome.scan_mode, ScanMode::Heuristic);
    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].cwe, "CWE-502");
    assert_eq!(outcome.verdict, Verdict::Approved);
    assert_eq!(outcome.rounds_run(), 1);
    assert_eq!(outcome.findings[0].status, FindingStatus::Fixed);

    let patched = std::fs::read_to_string(&file).unwrap();
    assert!(patched.contains("json.loads(blob)"));
    assert!(patched.contains("import json"));

    let round = outcome.last_round().unwrap();
    assert!(round.reattack.is_empty());
    let card = build_scorecard(&outcome.findings, &round.decisions, &round.verification, None);
    assert_eq!(card.fix_rate, 1.0);
    assert!(!card.tools_pass);
}

#[tokio::test]
async fn without_autofix_the_issue_stays_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("loader.py");
    let original = "import pickle\nx = pickle.loads(data)\n";
    std::fs::write(&file, original).unwrap();

    let controller = RoundController::new(
        roles(),
        Arc::new(StaticVerifier::default()),
        RoundConfig::new(1, false),
    );
    let outcome = controller.run(dir.path()).await.unwrap();

    assert_eq!(outcome.verdict, Verdict::Rejected);
    assert_eq!(std::fs::read_to_string(&file).unwrap(), original);
    let round = outcome.last_round().unwrap();
    assert!(!round.patches.is_empty());
    assert!(round.apply_results.is_empty());
    assert!(round.decisions[0].reason.contains("Re-attack"));
}

#[tokio::test]
async fn empty_tree_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "# nothing here\n").unwrap();

    let controller = RoundController::new(
        roles(),
        Arc::new(StaticVerifier::default()),
        RoundConfig::default(),
    );
    let err = controller.run(dir.path()).await.unwrap_err();
    assert!(matches!(err, AuditError::NoSourceFiles(_)));
}
