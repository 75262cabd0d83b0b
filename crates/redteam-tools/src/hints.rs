//! Security-linter output condensed into attacker context.

use redteam_core::domain::VerificationResult;
use serde::Deserialize;

/// Upper bound on hint lines handed to the attacker.
pub const MAX_HINTS: usize = 20;

#[derive(Debug, Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<BanditIssue>,
}

#[derive(Debug, Deserialize)]
struct BanditIssue {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    line_number: u64,
    #[serde(default)]
    test_id: String,
    #[serde(default)]
    issue_severity: String,
    #[serde(default)]
    issue_text: String,
}

/// Hint block from a security-linter JSON report, or `None` when the
/// report is missing, unparseable or empty.
pub fn security_hints(result: &VerificationResult) -> Option<String> {
    let parsed = result.parsed.as_ref()?;
    let report: BanditReport = serde_json::from_value(parsed.clone()).ok()?;
    if report.results.is_empty() {
        return None;
    }

    let mut out = String::from("Security linter hints:\n");
    for issue in report.results.iter().take(MAX_HINTS) {
        out.push_str(&format!(
            "- [{}] {} {}:{} {}\n",
            issue.issue_severity.to_uppercase(),
            issue.test_id,
            issue.filename,
            issue.line_number,
            issue.issue_text.trim()
        ));
    }
    if report.results.len() > MAX_HINTS {
        out.push_str(&format!(
            "- ... {} more\n",
            report.results.len() - MAX_HINTS
        ));
    }
    Some(out)
}
