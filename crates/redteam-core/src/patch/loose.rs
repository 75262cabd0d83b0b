//! Built-in context matcher used when both external patch tools fail.
//!
//! Hunks are located by their `before` block (context + removed lines);
//! declared `@@` ranges are never consulted. Hunks within one file apply
//! left to right and never overlap.
//!
//! Each file is written as soon as all of its hunks succeed, before the
//! next file of the same diff is processed. A failure in a later file does
//! not roll back files already written by the same call.

use std::path::Path;

use tracing::debug;

use super::error::ApplyError;
use super::parser::FilePatch;
use super::safety::resolve_within;

/// Files rewritten by a successful loose apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LooseReport {
    pub files_written: Vec<String>,
}

/// Apply `file_patches` under `root` (already canonical).
pub fn loose_apply(file_patches: &[FilePatch], root: &Path) -> Result<LooseReport, ApplyError> {
    if file_patches.is_empty() {
        return Err(ApplyError::NoFilePatches);
    }

    let mut report = LooseReport::default();
    for fp in file_patches {
        if fp.is_deletion() {
            return Err(ApplyError::DeleteUnsupported {
                path: fp.old_path.clone(),
            });
        }
        let rel = fp.target().ok_or(ApplyError::MissingTarget)?;
        let target = resolve_within(root, rel).ok_or_else(|| ApplyError::UnsafePath {
            path: rel.to_string(),
        })?;

        let original = if target.exists() {
            let bytes = std::fs::read(&target).map_err(|source| ApplyError::Io {
                path: rel.to_string(),
                source,
            })?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            String::new()
        };

        let updated = apply_hunks(&original, fp, rel)?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ApplyError::Io {
                path: rel.to_string(),
                source,
            })?;
        }
        std::fs::write(&target, updated).map_err(|source| ApplyError::Io {
            path: rel.to_string(),
            source,
        })?;
        debug!(file = rel, hunks = fp.hunks.len(), "loose apply wrote file");
        report.files_written.push(rel.to_string());
    }

    Ok(report)
}

/// Apply every hunk of `fp` to `original`, returning the new content.
pub fn apply_hunks(original: &str, fp: &FilePatch, rel: &str) -> Result<String, ApplyError> {
    let had_trailing_newline = original.is_empty() || original.ends_with('\n');
    let separator = if original.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = original.lines().map(str::to_string).collect();

    let mut cursor = 0usize;
    for (idx, hunk) in fp.hunks.iter().enumerate() {
        let before = hunk.before();
        let after = hunk.after();

        // The context of an insertion survives it, so look for a previous
        // application before matching the context.
        if hunk.is_insertion_only() {
            if let Some(found) = find_subsequence(&lines, &after, cursor, exact) {
                cursor = found + after.len();
                continue;
            }
        }

        let start = match find_subsequence(&lines, &before, cursor, exact) {
            Some(start) => start,
            None => {
                if let Some(found) = find_subsequence(&lines, &after, cursor, exact) {
                    cursor = found + after.len();
                    continue;
                }
                find_subsequence(&lines, &before, cursor, trailing_ws_insensitive).ok_or_else(
                    || ApplyError::ContextNotFound {
                        path: rel.to_string(),
                        hunk: idx + 1,
                    },
                )?
            }
        };

        let replacement: Vec<String> = after.iter().map(|s| s.to_string()).collect();
        lines.splice(start..start + before.len(), replacement);
        cursor = start + after.len();
    }

    let mut text = lines.join(separator);
    if had_trailing_newline && !text.is_empty() {
        text.push_str(separator);
    }
    Ok(text)
}

fn exact(a: &str, b: &str) -> bool {
    a == b
}

fn trailing_ws_insensitive(a: &str, b: &str) -> bool {
    a.trim_end() == b.trim_end()
}

/// First index `>= start` where `needle` occurs contiguously in `haystack`.
/// An empty needle matches at `start`.
fn find_subsequence(
    haystack: &[String],
    needle: &[&str],
    start: usize,
    eq: fn(&str, &str) -> bool,
) -> Option<usize> {
    if needle.is_empty() {
        return Some(start.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    let last = haystack.len() - needle.len();
    (start..=last).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(h, n)| eq(h, n))
    })
}
