//! Rule-based scanner and patch generator used when no model is available.

pub mod fixes;
pub mod unified;

use std::path::{Path, PathBuf};

use crate::domain::{Finding, FindingStatus, Result, Severity};
use crate::files::read_file;

pub use fixes::heuristic_patches;
pub use unified::unified_diff;

/// One line-matching rule.
struct Rule {
    title: &'static str,
    cwe: &'static str,
    severity: Severity,
    impact: &'static str,
    fix_plan: &'static str,
    matches: fn(&str) -> bool,
}

const RULES: &[Rule] = &[
    Rule {
        title: "Insecure deserialization",
        cwe: "CWE-502",
        severity: Severity::High,
        impact: "Untrusted pickle data can execute code.",
        fix_plan: "Avoid pickle for untrusted data; use safe serializers.",
        matches: |l| l.contains("pickle.loads"),
    },
    Rule {
        title: "Shell injection",
        cwe: "CWE-78",
        severity: Severity::High,
        impact: "User input can execute shell commands.",
        fix_plan: "Avoid shell=True and pass args as a list.",
        matches: |l| l.contains("shell=True") && l.contains("subprocess"),
    },
    Rule {
        title: "Weak hashing",
        cwe: "CWE-327",
        severity: Severity::Medium,
        impact: "MD5 is cryptographically broken.",
        fix_plan: "Use SHA-256 or a password hashing library.",
        matches: |l| l.contains("hashlib.md5") || l.contains("md5("),
    },
    Rule {
        title: "Unsafe YAML load",
        cwe: "CWE-20",
        severity: Severity::Medium,
        impact: "yaml.load can construct unsafe objects.",
        fix_plan: "Use yaml.safe_load for untrusted input.",
        matches: |l| l.contains("yaml.load(") && !l.contains("SafeLoader"),
    },
    Rule {
        title: "Possible SQL injection",
        cwe: "CWE-89",
        severity: Severity::High,
        impact: "String-formatted SQL can be injected.",
        fix_plan: "Use parameterized queries.",
        matches: |l| l.contains("SELECT") && (l.contains("f\"") || l.contains('%')),
    },
    Rule {
        title: "Path traversal risk",
        cwe: "CWE-22",
        severity: Severity::Medium,
        impact: "User-controlled path may escape base directory.",
        fix_plan: "Normalize and validate paths before opening.",
        matches: |l| l.contains("os.path.join") && l.contains("filename"),
    },
    Rule {
        title: "DOM XSS",
        cwe: "CWE-79",
        severity: Severity::High,
        impact: "Untrusted markup can run script in the page.",
        fix_plan: "Write text with textContent instead of innerHTML or document.write.",
        matches: |l| l.contains(".innerHTML") || l.contains("document.write("),
    },
    Rule {
        title: "Dynamic code execution",
        cwe: "CWE-95",
        severity: Severity::High,
        impact: "Evaluating untrusted strings executes attacker code.",
        fix_plan: "Parse data instead of evaluating it.",
        matches: |l| {
            l.contains("eval(") && !l.contains("literal_eval(") && !l.contains(".eval(")
        },
    },
];

/// Findings for one file's text. Ids are left empty for the caller to number.
pub fn scan_source(path: &Path, text: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        for rule in RULES {
            if (rule.matches)(line) {
                findings.push(Finding {
                    id: String::new(),
                    title: rule.title.to_string(),
                    cwe: rule.cwe.to_string(),
                    severity: rule.severity,
                    file: path.display().to_string(),
                    line: (idx + 1) as u32,
                    evidence: line.trim().to_string(),
                    impact: rule.impact.to_string(),
                    fix_plan: rule.fix_plan.to_string(),
                    status: FindingStatus::Open,
                });
            }
        }
    }
    findings
}

/// Scan every file, numbering findings `F-001`, `F-002`, ... across files.
pub fn scan_files(paths: &[PathBuf], max_file_bytes: usize) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();
    for path in paths {
        let text = read_file(path, max_file_bytes)?;
        findings.extend(scan_source(path, &text));
    }
    for (idx, finding) in findings.iter_mut().enumerate() {
        finding.id = format!("F-{:03}", idx + 1);
    }
    Ok(findings)
}
