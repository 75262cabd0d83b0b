use std::sync::Arc;

use super::prompts::ARBITER_SYSTEM;
use super::{decode_items, AgentError};
use crate::completion::CompletionService;
use crate::domain::{Decision, Finding, Patch, VerificationResult};

/// Decides per finding whether the round fixed it. Advisory only: the
/// reconciler filters, completes and repairs whatever comes back.
#[derive(Clone)]
pub struct Arbiter {
    completion: Arc<dyn CompletionService>,
}

impl Arbiter {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    pub async fn decide(
        &self,
        findings: &[Finding],
        patches: &[Patch],
        verification: &[VerificationResult],
        reattack: &[Finding],
    ) -> Result<Vec<Decision>, AgentError> {
        let user = format!(
            "Decide if each finding is fixed based on patches, tool outputs and the re-attack scan.\n\
             Reject if evidence suggests the issue remains.\n\n\
             Findings:\n{}\n\nPatches:\n{}\n\nVerification:\n{}\n\nRe-attack findings:\n{}\n",
            serde_json::to_string_pretty(findings)?,
            serde_json::to_string_pretty(patches)?,
            serde_json::to_string_pretty(verification)?,
            serde_json::to_string_pretty(reattack)?,
        );
        let raw = self.completion.complete(ARBITER_SYSTEM, &user).await?;
        decode_items(&raw, "decisions")
    }
}
