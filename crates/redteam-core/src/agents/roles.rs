//! [`AuditRoles`] backed by the model roles, with the heuristic scanner and
//! patch generator as the explicit alternative path.
//!
//! The model is used only when the completion service reports itself
//! available and heuristics are not forced. Re-attack always runs: with
//! the model when enabled, otherwise (or when the model call fails) with
//! the heuristic scanner.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Arbiter, Attacker, Defender};
use crate::completion::CompletionService;
use crate::config::AuditSettings;
use crate::domain::{
    normalize_findings, normalize_patches, uncovered, AuditError, Finding, Patch, Result,
    VerificationResult,
};
use crate::files::{build_code_context, list_code_files};
use crate::heuristics::{heuristic_patches, scan_files};
use crate::reconcile::ArbiterOutcome;
use crate::round::{apply_root, AuditRoles, RoundFeedback, ScanMode, ScanOutcome};

const SCAN_MAX_FINDINGS: usize = 12;
const REATTACK_MAX_FINDINGS: usize = 8;
const BASELINE_MAX_FINDINGS: usize = 6;

/// Extra text appended to the attacker's code context (security linter
/// summaries and the like).
#[async_trait]
pub trait ContextHints: Send + Sync {
    async fn hints(&self, target: &Path) -> Option<String>;
}

/// Model-backed roles with heuristic fallbacks.
pub struct ModelRoles {
    completion: Arc<dyn CompletionService>,
    settings: AuditSettings,
    force_heuristics: bool,
    hints: Option<Arc<dyn ContextHints>>,
}

impl ModelRoles {
    pub fn new(completion: Arc<dyn CompletionService>, settings: AuditSettings) -> Self {
        Self {
            completion,
            settings,
            force_heuristics: false,
            hints: None,
        }
    }

    /// Skip the model entirely, even when it is available.
    pub fn with_heuristics(mut self, force: bool) -> Self {
        self.force_heuristics = force;
        self
    }

    pub fn with_hints(mut self, hints: Arc<dyn ContextHints>) -> Self {
        self.hints = Some(hints);
        self
    }

    pub fn model_enabled(&self) -> bool {
        self.completion.is_available() && !self.force_heuristics
    }

    pub fn model(&self) -> &str {
        self.completion.model()
    }

    fn files(&self, target: &Path) -> Result<Vec<PathBuf>> {
        list_code_files(target, &self.settings.extensions)
    }

    fn context(&self, files: &[PathBuf]) -> Result<String> {
        build_code_context(
            files,
            self.settings.max_file_bytes,
            self.settings.max_total_bytes,
        )
    }

    /// Code context plus linter hints when the model will read it.
    async fn attacker_context(&self, target: &Path, files: &[PathBuf]) -> Result<String> {
        let mut context = self.context(files)?;
        if self.model_enabled() {
            if let Some(hints) = &self.hints {
                if let Some(extra) = hints.hints(target).await {
                    context.push_str("\n\n");
                    context.push_str(&extra);
                }
            }
        }
        Ok(context)
    }

    fn heuristic_scan(&self, files: &[PathBuf]) -> Result<Vec<Finding>> {
        scan_files(files, self.settings.max_file_bytes)
    }
}

#[async_trait]
impl AuditRoles for ModelRoles {
    async fn scan(&self, target: &Path) -> Result<ScanOutcome> {
        if !target.exists() {
            return Err(AuditError::TargetNotFound(target.to_path_buf()));
        }
        let files = self.files(target)?;
        if files.is_empty() {
            return Err(AuditError::NoSourceFiles(target.to_path_buf()));
        }
        let context = self.attacker_context(target, &files).await?;

        if !self.model_enabled() {
            let findings = self.heuristic_scan(&files)?;
            return Ok(ScanOutcome {
                findings,
                mode: ScanMode::Heuristic,
                context,
            });
        }

        let attacker = Attacker::new(self.completion.clone());
        let (findings, mode) = match attacker.scan(&context, SCAN_MAX_FINDINGS).await {
            Ok(findings) => (normalize_findings(findings), ScanMode::Model),
            Err(e) => {
                warn!(error = %e, "model scan failed, falling back to heuristics");
                (self.heuristic_scan(&files)?, ScanMode::HeuristicFallback)
            }
        };
        Ok(ScanOutcome {
            findings,
            mode,
            context,
        })
    }

    async fn propose_patches(
        &self,
        target: &Path,
        findings: &[Finding],
        feedback: &RoundFeedback,
    ) -> Result<Vec<Patch>> {
        let mut patches: Vec<Patch> = Vec::new();

        if self.model_enabled() {
            let files = self.files(target)?;
            let context = self.context(&files)?;
            let defender = Defender::new(self.completion.clone());

            match defender.propose(&context, findings, feedback, &[]).await {
                Ok(proposed) => patches = normalize_patches(proposed, findings),
                Err(e) => warn!(error = %e, "defender request failed"),
            }

            // One diff often fixes several issues but is labelled with one id.
            let missing: Vec<Finding> = uncovered(findings, &patches).into_iter().cloned().collect();
            if !missing.is_empty() {
                let ids: Vec<String> = missing.iter().map(|f| f.id.clone()).collect();
                info!(missing = ids.len(), "asking defender for uncovered findings");
                match defender.propose(&context, &missing, feedback, &ids).await {
                    Ok(more) => patches.extend(normalize_patches(more, &missing)),
                    Err(e) => warn!(error = %e, "defender retry failed"),
                }
            }
        }

        let missing: Vec<Finding> = uncovered(findings, &patches).into_iter().cloned().collect();
        if !missing.is_empty() {
            let generated = heuristic_patches(&missing, &apply_root(target));
            info!(
                requested = missing.len(),
                generated = generated.len(),
                "heuristic patches for uncovered findings"
            );
            patches.extend(generated);
        }
        Ok(patches)
    }

    async fn reattack(&self, target: &Path) -> Result<Vec<Finding>> {
        let files = self.files(target)?;
        if files.is_empty() {
            return Ok(Vec::new());
        }

        if self.model_enabled() {
            let context = self.attacker_context(target, &files).await?;
            let attacker = Attacker::new(self.completion.clone());
            match attacker.scan(&context, REATTACK_MAX_FINDINGS).await {
                Ok(findings) => return Ok(normalize_findings(findings)),
                Err(e) => warn!(error = %e, "model re-attack failed, using heuristic scanner"),
            }
        }
        self.heuristic_scan(&files)
    }

    async fn arbitrate(
        &self,
        findings: &[Finding],
        patches: &[Patch],
        verification: &[VerificationResult],
        reattack: &[Finding],
    ) -> ArbiterOutcome {
        if !self.model_enabled() {
            return ArbiterOutcome::Unavailable("model disabled".to_string());
        }
        if findings.is_empty() {
            return ArbiterOutcome::Decided(Vec::new());
        }
        let arbiter = Arbiter::new(self.completion.clone());
        match arbiter
            .decide(findings, patches, verification, reattack)
            .await
        {
            Ok(decisions) => ArbiterOutcome::Decided(decisions),
            Err(e) => ArbiterOutcome::Unavailable(e.to_string()),
        }
    }

    async fn baseline(&self, target: &Path) -> Option<Vec<Finding>> {
        if !self.model_enabled() {
            return None;
        }
        let files = self.files(target).ok()?;
        if files.is_empty() {
            return Some(Vec::new());
        }
        let context = self.context(&files).ok()?;
        let attacker = Attacker::new(self.completion.clone());
        match attacker.scan(&context, BASELINE_MAX_FINDINGS).await {
            Ok(findings) => Some(normalize_findings(findings)),
            Err(e) => {
                warn!(error = %e, "baseline scan failed");
                None
            }
        }
    }
}
