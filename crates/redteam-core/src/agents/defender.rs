use std::sync::Arc;

use serde::Serialize;

use super::prompts::{DEFENDER_SYSTEM, MISSING_IDS_INSTRUCTION};
use super::{decode_items, AgentError};
use crate::completion::CompletionService;
use crate::domain::{Finding, Patch};
use crate::round::RoundFeedback;

#[derive(Serialize)]
struct Feedback<'a> {
    #[serde(flatten)]
    round: &'a RoundFeedback,
    #[serde(skip_serializing_if = "no_ids")]
    missing_finding_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    instruction: Option<&'static str>,
}

fn no_ids(ids: &&[String]) -> bool {
    ids.is_empty()
}

/// Blue-team role: proposes unified-diff patches for findings.
#[derive(Clone)]
pub struct Defender {
    completion: Arc<dyn CompletionService>,
}

impl Defender {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Ask for patches. `missing_ids` names findings an earlier answer left
    /// uncovered; the defender is told to cover each of them.
    pub async fn propose(
        &self,
        code_context: &str,
        findings: &[Finding],
        feedback: &RoundFeedback,
        missing_ids: &[String],
    ) -> Result<Vec<Patch>, AgentError> {
        let feedback = Feedback {
            round: feedback,
            missing_finding_ids: missing_ids,
            instruction: (!missing_ids.is_empty()).then_some(MISSING_IDS_INSTRUCTION),
        };
        let user = format!(
            "Propose minimal patches for the findings below.\nReturn only unified diffs.\n\n\
             Findings JSON:\n{}\n\nFeedback from previous round:\n{}\n\nCode context:\n{code_context}",
            serde_json::to_string_pretty(findings)?,
            serde_json::to_string_pretty(&feedback)?,
        );
        let raw = self.completion.complete(DEFENDER_SYSTEM, &user).await?;
        decode_items(&raw, "patches")
    }
}
