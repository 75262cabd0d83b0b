use std::sync::Arc;

use super::prompts::{ATTACKER_SYSTEM, VULN_CATEGORIES};
use super::{decode_items, AgentError};
use crate::completion::CompletionService;
use crate::domain::Finding;

/// Red-team role: finds evidenced vulnerabilities in a code context.
#[derive(Clone)]
pub struct Attacker {
    completion: Arc<dyn CompletionService>,
}

impl Attacker {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    pub async fn scan(
        &self,
        code_context: &str,
        max_findings: usize,
    ) -> Result<Vec<Finding>, AgentError> {
        let user = format!(
            "Scan the code context for vulnerabilities. Focus on these categories:\n- {}\n\n\
             Limit to at most {max_findings} findings.\n\nReturn JSON only.\n\n{code_context}",
            VULN_CATEGORIES.join("\n- ")
        );
        let raw = self.completion.complete(ATTACKER_SYSTEM, &user).await?;
        let mut findings: Vec<Finding> = decode_items(&raw, "findings")?;
        findings.truncate(max_findings);
        Ok(findings)
    }
}
