//! Rule-based rewrites for heuristic findings, emitted as unified diffs.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::unified::unified_diff;
use crate::domain::{Finding, Patch};

const RATIONALE: &str = "Heuristic fix based on rule matching.";

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("rewrite pattern is valid")
}

static SQL_COLUMN: LazyLock<Regex> = LazyLock::new(|| pattern(r"WHERE\s+([A-Za-z_]\w*)\s*="));
static FORMAT_VAR: LazyLock<Regex> = LazyLock::new(|| pattern(r"\{([A-Za-z_]\w*)\}"));
static SQL_TABLE: LazyLock<Regex> = LazyLock::new(|| pattern(r"FROM\s+([A-Za-z_]\w*)"));
static EXECUTE_CALL: LazyLock<Regex> = LazyLock::new(|| pattern(r"execute\(([^,\)]+)\)"));
static SUBPROCESS_ARG: LazyLock<Regex> = LazyLock::new(|| pattern(r"subprocess\.run\(([^,]+)"));
static ASSIGN_TARGET: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*([A-Za-z_]\w*)\s*="));
static JOIN_BASE: LazyLock<Regex> = LazyLock::new(|| pattern(r"os\.path\.join\(([^,]+),"));
static DOCUMENT_WRITE: LazyLock<Regex> = LazyLock::new(|| pattern(r"document\.write\((.+)\)"));
static EVAL_CALL: LazyLock<Regex> = LazyLock::new(|| pattern(r"(^|[^\w.])eval\("));

/// First capture group of `re` in `line`, trimmed.
fn capture(re: &Regex, line: &str) -> Option<String> {
    re.captures(line).map(|c| c[1].trim().to_string())
}

/// One patch per finding that a rule can rewrite; others are skipped.
pub fn heuristic_patches(findings: &[Finding], root: &Path) -> Vec<Patch> {
    findings
        .iter()
        .filter_map(|f| patch_for_finding(f, root))
        .collect()
}

fn patch_for_finding(finding: &Finding, root: &Path) -> Option<Patch> {
    let path = resolve_source(&finding.file, root)?;
    let original = std::fs::read_to_string(&path).ok()?;
    let lines: Vec<String> = original.lines().map(str::to_string).collect();
    let mut updated = lines.clone();

    let title = finding.title.to_lowercase();
    let cwe = finding.cwe.trim().to_uppercase();
    let python = path.extension().and_then(|e| e.to_str()) == Some("py");

    let changed = if cwe == "CWE-89" || title.contains("sql injection") {
        fix_sql_injection(&mut updated, finding)
    } else if cwe == "CWE-20" && title.contains("yaml") {
        simple_replace(&mut updated, "yaml.load(", "yaml.safe_load(")
    } else if cwe == "CWE-327" || title.contains("weak hashing") {
        simple_replace(&mut updated, "hashlib.md5", "hashlib.sha256")
    } else if cwe == "CWE-78" || title.contains("shell injection") {
        fix_shell_injection(&mut updated, finding)
    } else if cwe == "CWE-502" || title.contains("deserialization") {
        fix_pickle_loads(&mut updated)
    } else if cwe == "CWE-22" || title.contains("path traversal") {
        fix_path_traversal(&mut updated, finding)
    } else if cwe == "CWE-79" || title.contains("xss") {
        fix_dom_xss(&mut updated, finding)
    } else if cwe == "CWE-95" || title.contains("dynamic code") {
        fix_dynamic_eval(&mut updated, python)
    } else {
        false
    };
    if !changed {
        return None;
    }

    let rel = rel_path(&path, root);
    let mut rewritten = updated.join("\n");
    if original.ends_with('\n') {
        rewritten.push('\n');
    }
    let diff = unified_diff(&original, &rewritten, &format!("a/{rel}"), &format!("b/{rel}"), 3);
    if diff.trim().is_empty() {
        return None;
    }
    debug!(id = %finding.id, file = %rel, "heuristic patch generated");
    Some(Patch {
        id: finding.id.clone(),
        diff,
        rationale: RATIONALE.to_string(),
    })
}

/// The finding's file as reported, or relative to `root`.
fn resolve_source(file: &str, root: &Path) -> Option<PathBuf> {
    let file = file.trim();
    if file.is_empty() {
        return None;
    }
    let direct = PathBuf::from(file);
    if direct.is_file() {
        return Some(direct);
    }
    let joined = root.join(file);
    joined.is_file().then_some(joined)
}

fn rel_path(path: &Path, root: &Path) -> String {
    let rel = match (path.canonicalize(), root.canonicalize()) {
        (Ok(p), Ok(r)) => p.strip_prefix(&r).ok().map(|p| p.to_path_buf()),
        _ => None,
    };
    rel.map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| crate::domain::base_name(&path.to_string_lossy()).to_string())
}

fn find_line(lines: &[String], needle: &str) -> Option<usize> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }
    lines.iter().position(|l| l.contains(needle))
}

fn simple_replace(lines: &mut [String], old: &str, new: &str) -> bool {
    let mut changed = false;
    for line in lines.iter_mut() {
        if line.contains(old) {
            *line = line.replace(old, new);
            changed = true;
        }
    }
    changed
}

/// Insert `stmt` after the last top-level import unless already present.
fn ensure_import(lines: &mut Vec<String>, stmt: &str) {
    if lines.iter().any(|l| l.trim() == stmt) {
        return;
    }
    let insert_at = lines
        .iter()
        .rposition(|l| l.starts_with("import ") || l.starts_with("from "))
        .map(|idx| idx + 1)
        .unwrap_or(0);
    lines.insert(insert_at, stmt.to_string());
}

fn indent_of(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn fix_sql_injection(lines: &mut [String], finding: &Finding) -> bool {
    let Some(idx) = find_line(lines, &finding.evidence) else {
        return false;
    };
    let line = lines[idx].clone();
    let indent = indent_of(&line);

    let column = capture(&SQL_COLUMN, &line).unwrap_or_else(|| "value".to_string());
    let var_name = capture(&FORMAT_VAR, &line).unwrap_or_else(|| "value".to_string());
    let table = capture(&SQL_TABLE, &line).unwrap_or_else(|| "users".to_string());

    lines[idx] = format!("{indent}query = \"SELECT * FROM {table} WHERE {column} = ?\"");

    let end = (idx + 5).min(lines.len());
    if let Some(exec_idx) = (idx + 1..end).find(|&j| lines[j].contains("execute(query")) {
        let replacement = format!("execute(${{1}}, ({var_name},))");
        lines[exec_idx] = EXECUTE_CALL
            .replace(&lines[exec_idx], replacement.as_str())
            .into_owned();
    }
    true
}

fn fix_shell_injection(lines: &mut Vec<String>, finding: &Finding) -> bool {
    let Some(idx) = find_line(lines, &finding.evidence) else {
        return false;
    };
    let mut line = lines[idx].clone();
    if !line.contains("subprocess.run") {
        return false;
    }
    line = line.replace("shell=True", "shell=False");

    let mut needs_shlex = false;
    if let Some(arg) = capture(&SUBPROCESS_ARG, &line) {
        if !arg.starts_with('[') && !arg.contains("shlex.split") {
            line = line.replacen(&arg, &format!("shlex.split({arg})"), 1);
            needs_shlex = true;
        }
    }

    lines[idx] = line;
    if needs_shlex {
        ensure_import(lines, "import shlex");
    }
    true
}

fn fix_pickle_loads(lines: &mut Vec<String>) -> bool {
    let changed = simple_replace(lines, "pickle.loads", "json.loads");
    if changed {
        ensure_import(lines, "import json");
    }
    changed
}

fn fix_path_traversal(lines: &mut Vec<String>, finding: &Finding) -> bool {
    let Some(idx) = find_line(lines, &finding.evidence) else {
        return false;
    };
    let mut line = lines[idx].clone();
    let indent = indent_of(&line).to_string();

    let target = capture(&ASSIGN_TARGET, &line).unwrap_or_else(|| "path".to_string());
    let base_var = capture(&JOIN_BASE, &line).unwrap_or_else(|| "base_dir".to_string());

    if !line.contains("os.path.normpath") {
        line = line.replacen("os.path.join", "os.path.normpath(os.path.join", 1);
        if line.matches('(').count() > line.matches(')').count() {
            line.push(')');
        }
    }
    lines[idx] = line;
    lines.insert(
        idx + 1,
        format!(
            "{indent}if not os.path.abspath({target}).startswith(os.path.abspath({base_var}) + os.sep):"
        ),
    );
    lines.insert(idx + 2, format!("{indent}    raise ValueError(\"Invalid path\")"));
    true
}

fn fix_dom_xss(lines: &mut [String], finding: &Finding) -> bool {
    let Some(idx) = find_line(lines, &finding.evidence) else {
        return false;
    };
    let line = lines[idx].clone();
    if line.contains(".innerHTML") {
        lines[idx] = line.replace(".innerHTML", ".textContent");
        return true;
    }
    if line.contains("document.write(") {
        lines[idx] = DOCUMENT_WRITE
            .replace(&line, "document.body.textContent = $1")
            .into_owned();
        return true;
    }
    false
}

fn fix_dynamic_eval(lines: &mut Vec<String>, python: bool) -> bool {
    let re = &*EVAL_CALL;
    let replacement = if python {
        "${1}ast.literal_eval("
    } else {
        "${1}JSON.parse("
    };
    let mut changed = false;
    for line in lines.iter_mut() {
        if re.is_match(line) {
            *line = re.replace_all(line, replacement).into_owned();
            changed = true;
        }
    }
    if changed && python {
        ensure_import(lines, "import ast");
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FindingStatus, Severity};
    use crate::heuristics::scan_source;
    use crate::patch::{apply_hunks, parse_unified_diff};
    use tempfile::tempdir;

    fn finding(cwe: &str, title: &str, file: &Path, evidence: &str) -> Finding {
        Finding {
            id: "F-001".to_string(),
            title: title.to_string(),
            cwe: cwe.to_string(),
            severity: Severity::High,
            file: file.display().to_string(),
            line: 1,
            evidence: evidence.to_string(),
            impact: String::new(),
            fix_plan: String::new(),
            status: FindingStatus::Open,
        }
    }

    fn apply(diff: &str, original: &str) -> String {
        let fp = parse_unified_diff(diff).remove(0);
        apply_hunks(original, &fp, "f").unwrap()
    }

    #[test]
    fn test_sql_injection_is_parameterized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.py");
        let src = "def find(cursor, username):\n    query = f\"SELECT * FROM users WHERE name = '{username}'\"\n    cursor.execute(query)\n    return cursor.fetchall()\n";
        std::fs::write(&path, src).unwrap();

        let f = finding("CWE-89", "Possible SQL injection", &path, "SELECT * FROM users WHERE name");
        let patches = heuristic_patches(&[f], dir.path());
        assert_eq!(patches.len(), 1);
        assert!(patches[0].diff.starts_with("--- a/app.py\n+++ b/app.py\n"));

        let fixed = apply(&patches[0].diff, src);
        assert!(fixed.contains("query = \"SELECT * FROM users WHERE name = ?\""));
        assert!(fixed.contains("cursor.execute(query, (username,))"));
    }

    #[test]
    fn test_pickle_adds_json_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("svc.py");
        let src = "import pickle\n\ndef load(b):\n    return pickle.loads(b)\n";
        std::fs::write(&path, src).unwrap();
        let f = finding("CWE-502", "Insecure deserialization", &path, "pickle.loads(b)");
        let patches = heuristic_patches(&[f], dir.path());
        let fixed = apply(&patches[0].diff, src);
        assert!(fixed.contains("import json\n"));
        assert!(fixed.contains("return json.loads(b)"));
    }

    #[test]
    fn test_dom_fixes_clear_the_scanner() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ui.js");
        let src = "function show(msg) {\n  el.innerHTML = msg;\n  const v = eval(msg);\n}\n";
        std::fs::write(&path, src).unwrap();

        let found = scan_source(&path, src);
        assert_eq!(found.len(), 2);
        let mut text = src.to_string();
        for f in &found {
            std::fs::write(&path, &text).unwrap();
            let patches = heuristic_patches(std::slice::from_ref(f), dir.path());
            assert_eq!(patches.len(), 1, "no patch for {}", f.cwe);
            text = apply(&patches[0].diff, &text);
        }
        assert!(text.contains("el.textContent = msg;"));
        assert!(text.contains("JSON.parse(msg)"));
        assert!(scan_source(&path, &text).is_empty());
    }

    #[test]
    fn test_shell_injection_uses_shlex() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.py");
        let src = "import subprocess\n\ndef run(cmd):\n    subprocess.run(cmd, shell=True)\n";
        std::fs::write(&path, src).unwrap();
        let f = finding("CWE-78", "Shell injection", &path, "subprocess.run(cmd, shell=True)");
        let patches = heuristic_patches(&[f], dir.path());
        let fixed = apply(&patches[0].diff, src);
        assert!(fixed.contains("subprocess.run(shlex.split(cmd), shell=False)"));
        assert!(fixed.contains("import shlex"));
    }

    #[test]
    fn test_unknown_rule_or_missing_file_yields_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.py");
        std::fs::write(&path, "x = 1\n").unwrap();
        let unknown = finding("CWE-1000", "Something else", &path, "x = 1");
        let missing = finding("CWE-89", "SQLi", &dir.path().join("gone.py"), "SELECT");
        assert!(heuristic_patches(&[unknown, missing], dir.path()).is_empty());
    }
}
