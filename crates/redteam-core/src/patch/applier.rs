//! Strategy chain that realizes a diff against a working tree.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::ApplyError;
use super::loose::loose_apply;
use super::parser::{extended_header_paths, parse_unified_diff, target_paths};
use super::safety::first_unsafe_path;
use crate::process::run_command;

/// Default bound on each external apply tool.
pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(15);

/// One strategy in the chain, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStrategy {
    GitApply,
    Patch,
    Loose,
}

impl ApplyStrategy {
    pub const CHAIN: [ApplyStrategy; 3] =
        [ApplyStrategy::GitApply, ApplyStrategy::Patch, ApplyStrategy::Loose];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyStrategy::GitApply => "git_apply",
            ApplyStrategy::Patch => "patch",
            ApplyStrategy::Loose => "loose",
        }
    }
}

/// Winning strategy, or why nothing won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMethod {
    GitApply,
    Patch,
    Loose,
    #[default]
    None,
    Blocked,
}

impl ApplyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyMethod::GitApply => "git_apply",
            ApplyMethod::Patch => "patch",
            ApplyMethod::Loose => "loose",
            ApplyMethod::None => "none",
            ApplyMethod::Blocked => "blocked",
        }
    }
}

impl From<ApplyStrategy> for ApplyMethod {
    fn from(s: ApplyStrategy) -> Self {
        match s {
            ApplyStrategy::GitApply => ApplyMethod::GitApply,
            ApplyStrategy::Patch => ApplyMethod::Patch,
            ApplyStrategy::Loose => ApplyMethod::Loose,
        }
    }
}

impl std::fmt::Display for ApplyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log entry for one strategy try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyAttempt {
    pub method: ApplyStrategy,
    pub ok: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Outcome of applying one patch. `ok` holds iff some attempt succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    #[serde(default)]
    pub id: String,
    pub ok: bool,
    pub method: ApplyMethod,
    #[serde(default)]
    pub attempts: Vec<ApplyAttempt>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub note: String,
}

impl ApplyResult {
    fn blocked(files: Vec<String>, err: &ApplyError) -> Self {
        Self {
            id: String::new(),
            ok: false,
            method: ApplyMethod::Blocked,
            attempts: Vec::new(),
            files,
            note: err.to_string(),
        }
    }

    /// Copy of this result attributed to another patch id.
    pub fn for_patch(&self, id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..self.clone()
        }
    }

    /// True when this result touched a file with the given base name.
    pub fn touches_base_name(&self, name: &str) -> bool {
        self.files
            .iter()
            .any(|f| crate::domain::base_name(f) == name)
    }
}

/// Applies diffs under a root using git apply, then patch, then the loose matcher.
#[derive(Debug, Clone)]
pub struct PatchApplier {
    timeout: Duration,
    git_program: String,
    patch_program: String,
}

impl Default for PatchApplier {
    fn default() -> Self {
        Self::new(DEFAULT_APPLY_TIMEOUT)
    }
}

impl PatchApplier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            git_program: "git".to_string(),
            patch_program: "patch".to_string(),
        }
    }

    /// Override the external programs; a name that does not resolve simply
    /// records a failed attempt.
    pub fn with_programs(mut self, git: impl Into<String>, patch: impl Into<String>) -> Self {
        self.git_program = git.into();
        self.patch_program = patch.into();
        self
    }

    /// Apply `diff` under `root`. Never writes outside `root`.
    pub async fn apply(&self, diff: &str, root: &Path) -> ApplyResult {
        let files = target_paths(diff);

        let root = match root.canonicalize() {
            Ok(root) => root,
            Err(source) => {
                let err = ApplyError::Io {
                    path: root.display().to_string(),
                    source,
                };
                return ApplyResult {
                    files,
                    note: err.to_string(),
                    ..ApplyResult::default()
                };
            }
        };

        let mut checked = files.clone();
        checked.extend(extended_header_paths(diff));
        if let Some(path) = first_unsafe_path(&checked, &root) {
            let err = ApplyError::UnsafePath {
                path: path.to_string(),
            };
            warn!(path, "patch blocked");
            return ApplyResult::blocked(files, &err);
        }

        let mut attempts = Vec::with_capacity(ApplyStrategy::CHAIN.len());
        for strategy in ApplyStrategy::CHAIN {
            let attempt = self.attempt(strategy, diff, &root).await;
            let ok = attempt.ok;
            debug!(method = strategy.as_str(), ok, "apply attempt");
            attempts.push(attempt);
            if ok {
                return ApplyResult {
                    id: String::new(),
                    ok: true,
                    method: strategy.into(),
                    attempts,
                    files,
                    note: String::new(),
                };
            }
        }

        let note = attempts
            .last()
            .map(|a| {
                if a.stderr.trim().is_empty() {
                    a.stdout.trim().to_string()
                } else {
                    a.stderr.trim().to_string()
                }
            })
            .unwrap_or_default();

        ApplyResult {
            id: String::new(),
            ok: false,
            method: ApplyMethod::None,
            attempts,
            files,
            note,
        }
    }

    async fn attempt(&self, strategy: ApplyStrategy, diff: &str, root: &Path) -> ApplyAttempt {
        match strategy {
            ApplyStrategy::GitApply => {
                self.external(strategy, &self.git_program, &["apply", "-p1"], diff, root)
                    .await
            }
            ApplyStrategy::Patch => {
                self.external(
                    strategy,
                    &self.patch_program,
                    &["-p1", "--batch", "--forward", "-i"],
                    diff,
                    root,
                )
                .await
            }
            ApplyStrategy::Loose => match loose_apply(&parse_unified_diff(diff), root) {
                Ok(report) => ApplyAttempt {
                    method: strategy,
                    ok: true,
                    stdout: format!("Loose apply wrote {}", report.files_written.join(", ")),
                    stderr: String::new(),
                },
                Err(err) => ApplyAttempt {
                    method: strategy,
                    ok: false,
                    stdout: String::new(),
                    stderr: err.to_string(),
                },
            },
        }
    }

    /// Run an external tool with the diff in a temp file appended as the last argument.
    async fn external(
        &self,
        strategy: ApplyStrategy,
        program: &str,
        flags: &[&str],
        diff: &str,
        root: &Path,
    ) -> ApplyAttempt {
        let diff_file = match write_diff_file(diff) {
            Ok(file) => file,
            Err(e) => {
                return ApplyAttempt {
                    method: strategy,
                    ok: false,
                    stdout: String::new(),
                    stderr: format!("failed to stage diff: {e}"),
                }
            }
        };

        let mut args: Vec<String> = flags.iter().map(|s| s.to_string()).collect();
        args.push(diff_file.path().display().to_string());

        let out = run_command(program, &args, root, self.timeout).await;
        ApplyAttempt {
            method: strategy,
            ok: out.success(),
            stdout: out.stdout,
            stderr: out.stderr,
        }
    }
}

fn write_diff_file(diff: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("redteam-")
        .suffix(".diff")
        .tempfile()?;
    file.write_all(diff.as_bytes())?;
    if !diff.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn loose_only() -> PatchApplier {
        PatchApplier::new(Duration::from_secs(5))
            .with_programs("no-such-git-4242", "no-such-patch-4242")
    }

    #[tokio::test]
    async fn test_traversal_is_blocked_without_attempts() {
        let dir = tempdir().unwrap();
        let diff = "--- a/../../etc/passwd\n+++ b/../../etc/passwd\n@@\n-root\n+owned\n";
        let result = loose_only().apply(diff, dir.path()).await;
        assert!(!result.ok);
        assert_eq!(result.method, ApplyMethod::Blocked);
        assert!(result.attempts.is_empty());
        assert!(result.note.contains("unsafe path"));
    }

    #[tokio::test]
    async fn test_rename_header_is_checked() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x\n").unwrap();
        let diff = "diff --git a/a.py b/a.py\nrename to ../escape.py\n--- a/a.py\n+++ b/a.py\n@@\n-x\n+y\n";
        let result = loose_only().apply(diff, dir.path()).await;
        assert_eq!(result.method, ApplyMethod::Blocked);
    }

    #[tokio::test]
    async fn test_falls_through_to_loose() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "a\nb\nc\n").unwrap();
        let diff = "--- a/app.py\n+++ b/app.py\n@@ -40,3 +40,3 @@\n a\n-b\n+B\n c\n";
        let result = loose_only().apply(diff, dir.path()).await;
        assert!(result.ok, "{}", result.note);
        assert_eq!(result.method, ApplyMethod::Loose);
        assert_eq!(result.attempts.len(), 3);
        assert!(!result.attempts[0].ok);
        assert!(result.attempts[0].stderr.contains("not found"));
        assert_eq!(result.files, vec!["app.py".to_string()]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app.py")).unwrap(),
            "a\nB\nc\n"
        );
    }

    #[tokio::test]
    async fn test_failure_note_comes_from_last_attempt() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "a\n").unwrap();
        let diff = "--- a/app.py\n+++ b/app.py\n@@\n-zzz\n+B\n";
        let result = loose_only().apply(diff, dir.path()).await;
        assert!(!result.ok);
        assert_eq!(result.method, ApplyMethod::None);
        assert!(result.note.contains("context not found"));
    }

    #[tokio::test]
    async fn test_garbage_diff_reports_no_patches() {
        let dir = tempdir().unwrap();
        let result = loose_only().apply("just prose", dir.path()).await;
        assert!(!result.ok);
        assert!(result.files.is_empty());
        assert!(result.note.contains("No file patches"));
    }

    #[test]
    fn test_method_serializes_snake_case() {
        let json = serde_json::to_string(&ApplyMethod::GitApply).unwrap();
        assert_eq!(json, "\"git_apply\"");
        assert_eq!(ApplyMethod::Blocked.to_string(), "blocked");
    }
}
