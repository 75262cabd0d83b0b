//! Structured observability hooks for the audit loop.
//!
//! - Run-scoped tracing spans via the [`AuditSpan`] RAII guard
//! - `emit_*` functions for phase transitions, patch application, verdicts
//!   and snapshot failures
//!
//! All events are `info!` (snapshot failures `warn!`) and carry an `event`
//! field so JSON logs can be filtered by kind.

use tracing::{info, warn};

/// RAII guard that enters a run-scoped span for the duration of an audit run.
///
/// ```ignore
/// let _span = AuditSpan::enter("20250101_120000_deadbeef", "./app");
/// // every event below is tagged with run_id and target
/// ```
pub struct AuditSpan {
    _span: tracing::span::EnteredSpan,
}

impl AuditSpan {
    pub fn enter(run_id: &str, target: &str) -> Self {
        Self {
            _span: run_span(run_id, target).entered(),
        }
    }
}

/// The run-scoped span itself, for futures that must stay `Send`
/// (attach with `tracing::Instrument::instrument`).
pub fn run_span(run_id: &str, target: &str) -> tracing::Span {
    tracing::info_span!("redteam.run", run_id = %run_id, target = %target)
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, target: &str, mode: &str, max_rounds: u32) {
    info!(
        event = "run.started",
        run_id = %run_id,
        target = %target,
        mode = %mode,
        max_rounds = max_rounds,
    );
}

/// Emit event: the round controller entered a phase.
pub fn emit_phase(round: u32, phase: &str) {
    info!(event = "round.phase", round = round, phase = %phase);
}

/// Emit event: one patch went through the applier.
pub fn emit_patch_applied(patch_id: &str, ok: bool, method: &str, files: usize) {
    info!(
        event = "patch.applied",
        patch_id = %patch_id,
        ok = ok,
        method = %method,
        files = files,
    );
}

/// Emit event: a round finished with a verdict.
pub fn emit_round_verdict(round: u32, verdict: &str, fixed: usize, rejected: usize) {
    info!(
        event = "round.verdict",
        round = round,
        verdict = %verdict,
        fixed = fixed,
        rejected = rejected,
    );
}

/// Emit event: a round snapshot could not be written. Never fatal.
pub fn emit_snapshot_failed(round: u32, error: &str) {
    warn!(event = "round.snapshot_failed", round = round, error = %error);
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, verdict: &str, rounds: u32, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        verdict = %verdict,
        rounds = rounds,
        duration_ms = duration_ms,
    );
}
