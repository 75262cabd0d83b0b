//! Content-based matching of findings across scans.
//!
//! Finding ids are not stable between rounds, nor between a model scan and
//! a heuristic scan of the same tree, so "is this issue still present?" is
//! answered from CWE, file and evidence. The tiers are permissive: a false
//! match only delays a `fixed` decision, a missed match would approve a
//! finding that is still exploitable.

use crate::domain::Finding;

/// High-signal sink tokens. Sharing one is enough to correlate two findings
/// that already agree on CWE and file.
pub const SINK_TOKENS: &[&str] = &[
    "innerHTML",
    "outerHTML",
    "document.write",
    "insertAdjacentHTML",
    "dangerouslySetInnerHTML",
    "eval(",
    "exec(",
    "new Function(",
    "pickle.loads",
    "yaml.load(",
    "shell=True",
    "os.system",
    "hashlib.md5",
];

/// True if `a` and `b` describe the same underlying issue.
pub fn same_issue(a: &Finding, b: &Finding) -> bool {
    if !a.cwe.trim().eq_ignore_ascii_case(b.cwe.trim()) {
        return false;
    }
    if a.base_name() != b.base_name() {
        return false;
    }
    evidence_overlaps(&a.evidence, &b.evidence)
        || a.title.trim().to_lowercase() == b.title.trim().to_lowercase()
        || shares_sink(a, b)
}

/// True if `finding` correlates with any of `later`.
pub fn is_still_present(finding: &Finding, later: &[Finding]) -> bool {
    later.iter().any(|other| same_issue(finding, other))
}

/// The first finding in `later` that correlates with `finding`.
pub fn find_match<'a>(finding: &Finding, later: &'a [Finding]) -> Option<&'a Finding> {
    later.iter().find(|other| same_issue(finding, other))
}

/// Empty evidence is a substring of anything, so a finding with no evidence
/// correlates with every finding of the same CWE in the same file.
fn evidence_overlaps(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    a.contains(b) || b.contains(a)
}

fn shares_sink(a: &Finding, b: &Finding) -> bool {
    let text_a = combined_text(a);
    let text_b = combined_text(b);
    SINK_TOKENS
        .iter()
        .any(|token| text_a.contains(token) && text_b.contains(token))
}

fn combined_text(f: &Finding) -> String {
    format!("{}\n{}\n{}", f.title, f.evidence, f.fix_plan)
}
