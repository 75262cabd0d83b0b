//! In-memory fakes for the audit seams (testing only)
//!
//! `ScriptedRoles`, `StaticVerifier` and `ScriptedCompletion` satisfy the
//! trait contracts with canned answers and record how they were called.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::completion::{CompletionError, CompletionService};
use crate::domain::{Finding, Patch, Result, VerificationResult};
use crate::reconcile::ArbiterOutcome;
use crate::round::{AuditRoles, RoundFeedback, ScanMode, ScanOutcome, Verifier};

// ---------------------------------------------------------------------------
// ScriptedRoles
// ---------------------------------------------------------------------------

/// Roles that replay per-round scripts. Exhausted scripts answer with
/// nothing (no patches, clean re-attack, unavailable arbiter).
#[derive(Debug, Default)]
pub struct ScriptedRoles {
    findings: Vec<Finding>,
    baseline: Option<Vec<Finding>>,
    patches: Mutex<VecDeque<Vec<Patch>>>,
    reattacks: Mutex<VecDeque<Vec<Finding>>>,
    arbiter: Mutex<VecDeque<ArbiterOutcome>>,
    calls: Mutex<Vec<String>>,
    feedback: Mutex<Vec<RoundFeedback>>,
}

impl ScriptedRoles {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            ..Self::default()
        }
    }

    /// Patches returned by the next `propose_patches` call.
    pub fn then_patches(self, patches: Vec<Patch>) -> Self {
        self.patches.lock().unwrap().push_back(patches);
        self
    }

    /// Findings returned by the next `reattack` call.
    pub fn then_reattack(self, findings: Vec<Finding>) -> Self {
        self.reattacks.lock().unwrap().push_back(findings);
        self
    }

    /// Outcome returned by the next `arbitrate` call.
    pub fn then_arbiter(self, outcome: ArbiterOutcome) -> Self {
        self.arbiter.lock().unwrap().push_back(outcome);
        self
    }

    pub fn with_baseline(mut self, baseline: Vec<Finding>) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Role calls in order: `scan`, `propose`, `reattack`, `arbitrate`, `baseline`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Feedback passed to each `propose_patches` call.
    pub fn feedback_seen(&self) -> Vec<RoundFeedback> {
        self.feedback.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl AuditRoles for ScriptedRoles {
    async fn scan(&self, _target: &Path) -> Result<ScanOutcome> {
        self.record("scan");
        Ok(ScanOutcome {
            findings: self.findings.clone(),
            mode: ScanMode::Heuristic,
            context: String::new(),
        })
    }

    async fn propose_patches(
        &self,
        _target: &Path,
        _findings: &[Finding],
        feedback: &RoundFeedback,
    ) -> Result<Vec<Patch>> {
        self.record("propose");
        self.feedback.lock().unwrap().push(feedback.clone());
        Ok(self.patches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn reattack(&self, _target: &Path) -> Result<Vec<Finding>> {
        self.record("reattack");
        Ok(self.reattacks.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn arbitrate(
        &self,
        _findings: &[Finding],
        _patches: &[Patch],
        _verification: &[VerificationResult],
        _reattack: &[Finding],
    ) -> ArbiterOutcome {
        self.record("arbitrate");
        self.arbiter
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ArbiterOutcome::Unavailable("scripted".to_string()))
    }

    async fn baseline(&self, _target: &Path) -> Option<Vec<Finding>> {
        self.record("baseline");
        self.baseline.clone()
    }
}

// ---------------------------------------------------------------------------
// StaticVerifier
// ---------------------------------------------------------------------------

/// Verifier that always returns the same results.
#[derive(Debug, Default, Clone)]
pub struct StaticVerifier {
    results: Vec<VerificationResult>,
}

impl StaticVerifier {
    pub fn new(results: Vec<VerificationResult>) -> Self {
        Self { results }
    }
}

#[async_trait]
impl Verifier for StaticVerifier {
    async fn verify(&self, _target: &Path) -> Vec<VerificationResult> {
        self.results.clone()
    }
}

// ---------------------------------------------------------------------------
// ScriptedCompletion
// ---------------------------------------------------------------------------

/// Available completion service replaying canned replies in order.
/// Once exhausted every call fails with `EmptyResponse`.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// `(system, user)` pairs received so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn is_available(&self) -> bool {
        true
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> std::result::Result<String, CompletionError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(CompletionError::EmptyResponse)
    }
}
