//! Round controller: scan once, then fix → re-attack → validate until the
//! verdict is `approved` or the round budget is spent.
//!
//! Phases run strictly one after another. `max_rounds` (floored at 1) is
//! the only termination guarantee. Snapshot writes are side effects only:
//! a failed snapshot is logged and the loop carries on, while a failure to
//! persist the main run state aborts the run with [`AuditError::Io`].
//!
//! Two controllers pointed at the same target directory are not mutually
//! excluded and may race on file writes.
//!
//! [`AuditError::Io`]: crate::domain::AuditError::Io

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{
    apply_decisions, DecisionCounts, Decision, Finding, Patch, Result, Verdict, VerificationResult,
};
use crate::obs;
use crate::patch::{ApplyResult, PatchApplier};
use crate::reconcile::{reconcile, ArbiterOutcome, RoundEvidence};
use crate::run_state::{RunFile, RunStore};

/// How the initial scan produced its findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    Model,
    Heuristic,
    /// The model was configured but its scan failed.
    HeuristicFallback,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Model => "model",
            ScanMode::Heuristic => "heuristic",
            ScanMode::HeuristicFallback => "heuristic-fallback",
        }
    }
}

/// Result of the attacker's initial scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub findings: Vec<Finding>,
    pub mode: ScanMode,
    /// Code context the scan was run against.
    pub context: String,
}

/// Prior-round evidence handed to the defender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundFeedback {
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub reattack: Vec<Finding>,
    #[serde(default)]
    pub apply_results: Vec<ApplyResult>,
}

impl RoundFeedback {
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty() && self.reattack.is_empty() && self.apply_results.is_empty()
    }
}

/// The attacker, defender and arbiter as seen by the controller.
#[async_trait]
pub trait AuditRoles: Send + Sync {
    /// Initial scan. No supported source files is an error.
    async fn scan(&self, target: &Path) -> Result<ScanOutcome>;

    /// Patches for `findings` (the round's active findings).
    async fn propose_patches(
        &self,
        target: &Path,
        findings: &[Finding],
        feedback: &RoundFeedback,
    ) -> Result<Vec<Patch>>;

    /// Fresh scan of the patched tree.
    async fn reattack(&self, target: &Path) -> Result<Vec<Finding>>;

    async fn arbitrate(
        &self,
        findings: &[Finding],
        patches: &[Patch],
        verification: &[VerificationResult],
        reattack: &[Finding],
    ) -> ArbiterOutcome;

    /// Independent reference scan used by the scorecard.
    async fn baseline(&self, _target: &Path) -> Option<Vec<Finding>> {
        None
    }
}

/// External verification tools run against the target.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, target: &Path) -> Vec<VerificationResult>;
}

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    pub max_rounds: u32,
    pub autofix: bool,
    pub baseline: bool,
}

impl RoundConfig {
    pub fn new(max_rounds: u32, autofix: bool) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
            autofix,
            baseline: false,
        }
    }

    pub fn with_baseline(mut self, baseline: bool) -> Self {
        self.baseline = baseline;
        self
    }
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self::new(2, false)
    }
}

/// Controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Scanning,
    Fixing,
    ReAttacking,
    Validating,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Scanning => "scanning",
            Phase::Fixing => "fixing",
            Phase::ReAttacking => "re_attacking",
            Phase::Validating => "validating",
            Phase::Done => "done",
        }
    }
}

/// One entry of the phase trace; round 0 is the initial scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub round: u32,
    pub phase: Phase,
}

/// Working set of one round. Overwritten every round; snapshotted per index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundState {
    pub round: u32,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub patches: Vec<Patch>,
    #[serde(default)]
    pub apply_results: Vec<ApplyResult>,
    #[serde(default)]
    pub reattack: Vec<Finding>,
    #[serde(default)]
    pub verification: Vec<VerificationResult>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub verdict: Option<Verdict>,
}

impl RoundState {
    pub fn feedback(&self) -> RoundFeedback {
        RoundFeedback {
            decisions: self.decisions.clone(),
            reattack: self.reattack.clone(),
            apply_results: self.apply_results.clone(),
        }
    }
}

/// Output of the fix phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixOutcome {
    pub patches: Vec<Patch>,
    pub apply_results: Vec<ApplyResult>,
}

/// Output of the validate phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub verification: Vec<VerificationResult>,
    pub decisions: Vec<Decision>,
    pub verdict: Verdict,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub scan_mode: ScanMode,
    pub findings: Vec<Finding>,
    pub baseline: Option<Vec<Finding>>,
    pub rounds: Vec<RoundState>,
    pub verdict: Verdict,
    pub trace: Vec<PhaseTransition>,
}

impl RunOutcome {
    pub fn last_round(&self) -> Option<&RoundState> {
        self.rounds.last()
    }

    pub fn rounds_run(&self) -> u32 {
        self.rounds.len() as u32
    }
}

/// Drives the audit loop over one target.
pub struct RoundController {
    roles: Arc<dyn AuditRoles>,
    verifier: Arc<dyn Verifier>,
    applier: PatchApplier,
    config: RoundConfig,
    store: Option<RunStore>,
}

impl RoundController {
    pub fn new(roles: Arc<dyn AuditRoles>, verifier: Arc<dyn Verifier>, config: RoundConfig) -> Self {
        Self {
            roles,
            verifier,
            applier: PatchApplier::default(),
            config,
            store: None,
        }
    }

    pub fn with_applier(mut self, applier: PatchApplier) -> Self {
        self.applier = applier;
        self
    }

    /// Persist run state and round snapshots into `store`.
    pub fn with_store(mut self, store: RunStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> RoundConfig {
        self.config
    }

    pub fn store(&self) -> Option<&RunStore> {
        self.store.as_ref()
    }

    /// Full loop: Scanning → (Fixing → ReAttacking → Validating)+ → Done.
    pub async fn run(&self, target: &Path) -> Result<RunOutcome> {
        let started = Instant::now();
        let mut trace = Vec::new();

        self.enter(&mut trace, 0, Phase::Scanning);
        let scan = self.roles.scan(target).await?;
        info!(
            findings = scan.findings.len(),
            mode = scan.mode.as_str(),
            "initial scan complete"
        );
        if let Some(store) = &self.store {
            store.write_text(RunFile::Context, &scan.context)?;
            store.write_json(RunFile::Findings, &scan.findings)?;
        }

        let baseline = if self.config.baseline {
            self.roles.baseline(target).await
        } else {
            None
        };
        if let (Some(store), Some(baseline)) = (&self.store, &baseline) {
            store.write_json(RunFile::Baseline, baseline)?;
        }

        let mut findings = scan.findings;
        let mut feedback = RoundFeedback::default();
        let mut rounds: Vec<RoundState> = Vec::new();
        let mut verdict = Verdict::Rejected;

        for round in 1..=self.config.max_rounds.max(1) {
            let state = self.run_round(round, target, &findings, &feedback, &mut trace).await?;
            findings = state.findings.clone();
            feedback = state.feedback();
            verdict = state.verdict.unwrap_or(Verdict::Rejected);
            rounds.push(state);

            if verdict == Verdict::Approved {
                debug!(round, "approved, stopping");
                break;
            }
        }

        let last = rounds.last().map(|s| s.round).unwrap_or(0);
        self.enter(&mut trace, last, Phase::Done);
        if let Some(store) = &self.store {
            obs::emit_run_finished(
                store.run_id(),
                verdict.as_str(),
                last,
                started.elapsed().as_millis() as u64,
            );
        }

        Ok(RunOutcome {
            scan_mode: scan.mode,
            findings,
            baseline,
            rounds,
            verdict,
            trace,
        })
    }

    async fn run_round(
        &self,
        round: u32,
        target: &Path,
        findings: &[Finding],
        feedback: &RoundFeedback,
        trace: &mut Vec<PhaseTransition>,
    ) -> Result<RoundState> {
        let active: Vec<Finding> = findings.iter().filter(|f| f.is_active()).cloned().collect();

        self.enter(trace, round, Phase::Fixing);
        let fix = self.fix(target, &active, feedback).await?;

        self.enter(trace, round, Phase::ReAttacking);
        let reattack = self.reattack(target).await?;

        self.enter(trace, round, Phase::Validating);
        let validation = self
            .validate(target, &active, &fix.patches, &fix.apply_results, &reattack)
            .await;

        let counts = DecisionCounts::from_decisions(&validation.decisions);
        obs::emit_round_verdict(
            round,
            validation.verdict.as_str(),
            counts.fixed,
            counts.rejected,
        );

        let state = RoundState {
            round,
            findings: apply_decisions(findings, &validation.decisions),
            patches: fix.patches,
            apply_results: fix.apply_results,
            reattack,
            verification: validation.verification,
            decisions: validation.decisions,
            verdict: Some(validation.verdict),
        };
        self.persist(&state)?;
        Ok(state)
    }

    /// Defender pass over `active` findings, applying patches when autofix is on.
    pub async fn fix(
        &self,
        target: &Path,
        active: &[Finding],
        feedback: &RoundFeedback,
    ) -> Result<FixOutcome> {
        if active.is_empty() {
            return Ok(FixOutcome::default());
        }

        let patches = self.roles.propose_patches(target, active, feedback).await?;
        let apply_results = if self.config.autofix {
            self.apply_all(target, &patches).await
        } else {
            Vec::new()
        };

        Ok(FixOutcome {
            patches,
            apply_results,
        })
    }

    /// Apply every patch; identical diff texts are applied once and the
    /// result is reused for each patch id.
    pub async fn apply_all(&self, target: &Path, patches: &[Patch]) -> Vec<ApplyResult> {
        let root = apply_root(target);
        let mut by_diff: HashMap<String, ApplyResult> = HashMap::new();
        let mut results = Vec::with_capacity(patches.len());

        for patch in patches {
            let key = patch.diff.trim().to_string();
            let result = match by_diff.get(&key) {
                Some(cached) => cached.for_patch(&patch.id),
                None => {
                    let result = self.applier.apply(&patch.diff, &root).await.for_patch(&patch.id);
                    obs::emit_patch_applied(
                        &patch.id,
                        result.ok,
                        result.method.as_str(),
                        result.files.len(),
                    );
                    by_diff.insert(key, result.clone());
                    result
                }
            };
            results.push(result);
        }
        results
    }

    pub async fn reattack(&self, target: &Path) -> Result<Vec<Finding>> {
        self.roles.reattack(target).await
    }

    /// Run verification tools, consult the arbiter and reconcile.
    pub async fn validate(
        &self,
        target: &Path,
        active: &[Finding],
        patches: &[Patch],
        apply_results: &[ApplyResult],
        reattack: &[Finding],
    ) -> ValidationOutcome {
        let verification = self.verifier.verify(target).await;
        let arbiter = self
            .roles
            .arbitrate(active, patches, &verification, reattack)
            .await;

        let evidence = RoundEvidence {
            findings: active,
            apply_results,
            reattack,
            verification: &verification,
        };
        let decisions = reconcile(&evidence, arbiter);
        let verdict = Verdict::from_decisions(&decisions);

        ValidationOutcome {
            verification,
            decisions,
            verdict,
        }
    }

    fn persist(&self, state: &RoundState) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store.write_state(state)?;
        if let Err(e) = store.write_round_snapshot(state) {
            obs::emit_snapshot_failed(state.round, &e.to_string());
        }
        Ok(())
    }

    fn enter(&self, trace: &mut Vec<PhaseTransition>, round: u32, phase: Phase) {
        obs::emit_phase(round, phase.as_str());
        trace.push(PhaseTransition { round, phase });
    }
}

/// Directory patches are applied in: the target itself, or its parent for
/// a single-file target.
pub fn apply_root(target: &Path) -> PathBuf {
    if target.is_dir() {
        target.to_path_buf()
    } else {
        target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
