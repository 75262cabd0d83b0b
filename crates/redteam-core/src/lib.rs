//! RedTeam Auditor Core Library
//!
//! Adversarial audit loop over a source tree: an attacker reports findings,
//! a defender proposes unified-diff patches, the patches are applied, the
//! attacker re-scans, external tools verify, and an arbiter decides each
//! finding. Rounds repeat until approval or the round budget runs out.

pub mod agents;
pub mod completion;
pub mod config;
pub mod correlate;
pub mod domain;
pub mod fakes;
pub mod files;
pub mod heuristics;
pub mod obs;
pub mod patch;
pub mod process;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod round;
pub mod run_state;
pub mod scorecard;
pub mod telemetry;

pub use domain::{
    apply_decisions, normalize_findings, normalize_patches, AuditError, Decision, DecisionCounts,
    DecisionStatus, Finding, FindingStatus, Patch, Result, Severity, Verdict, VerificationResult,
};

pub use agents::{Arbiter, Attacker, ContextHints, Defender, ModelRoles};
pub use completion::{
    extract_json, CompletionError, CompletionService, DisabledCompletion, OpenAiCompletion,
};
pub use config::AuditSettings;
pub use correlate::{find_match, is_still_present, same_issue};
pub use patch::{
    parse_unified_diff, ApplyError, ApplyMethod, ApplyResult, ApplyStrategy, FilePatch,
    PatchApplier,
};
pub use process::{run_command, CommandOutput};
pub use reconcile::{reconcile, ArbiterOutcome, RoundEvidence};
pub use registry::{RunRecord, RunRegistry, RunStatus};
pub use report::{render_report, ReportInput};
pub use round::{
    apply_root, AuditRoles, Phase, PhaseTransition, RoundConfig, RoundController, RoundFeedback,
    RoundState, RunOutcome, ScanMode, ScanOutcome, Verifier,
};
pub use run_state::{create_run_id, RunFile, RunMeta, RunStore};
pub use scorecard::{build_scorecard, Scorecard};

pub use obs::{
    emit_patch_applied, emit_phase, emit_round_verdict, emit_run_finished, emit_run_started,
    run_span, AuditSpan,
};
pub use telemetry::init_tracing;

/// RedTeam Auditor version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
