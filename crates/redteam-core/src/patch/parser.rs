//! Unified-diff parsing that distrusts declared hunk ranges.
//!
//! Diff text here usually comes from a language model: `@@` headers are
//! frequently wrong or missing entirely. Only the prefixed hunk lines
//! (`' '`, `'+'`, `'-'`, `'\'`) carry meaning.

use serde::{Deserialize, Serialize};

/// Sentinel path used by unified diffs for file creation and deletion.
pub const DEV_NULL: &str = "/dev/null";

/// One tagged line of a hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum HunkLine {
    Context(String),
    Add(String),
    Remove(String),
}

/// Contiguous block of context/added/removed lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Context and removed lines: what the file must contain before.
    pub fn before(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(t) | HunkLine::Remove(t) => Some(t.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect()
    }

    /// Context and added lines: what the file contains after.
    pub fn after(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(t) | HunkLine::Add(t) => Some(t.as_str()),
                HunkLine::Remove(_) => None,
            })
            .collect()
    }

    /// Adds lines without removing any.
    pub fn is_insertion_only(&self) -> bool {
        self.lines.iter().any(|l| matches!(l, HunkLine::Add(_)))
            && !self.lines.iter().any(|l| matches!(l, HunkLine::Remove(_)))
    }
}

/// All hunks targeting one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePatch {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    pub fn is_deletion(&self) -> bool {
        self.new_path == DEV_NULL
    }

    pub fn is_creation(&self) -> bool {
        self.old_path == DEV_NULL
    }

    /// Path the patch writes to: `new_path`, or `old_path` if that is empty.
    pub fn target(&self) -> Option<&str> {
        [self.new_path.as_str(), self.old_path.as_str()]
            .into_iter()
            .find(|p| !p.is_empty() && *p != DEV_NULL)
    }
}

/// Strip a literal `a/` or `b/` prefix.
pub fn strip_prefix(path: &str) -> &str {
    let p = path.trim();
    p.strip_prefix("a/")
        .or_else(|| p.strip_prefix("b/"))
        .unwrap_or(p)
}

/// Normalise a `--- `/`+++ ` header payload: drop a tab-separated
/// timestamp, trim, strip the `a/`/`b/` prefix.
pub fn header_path(raw: &str) -> String {
    let path = raw.split('\t').next().unwrap_or_default();
    strip_prefix(path).to_string()
}

/// Parse diff text into per-file hunks.
///
/// A file block starts at a `--- ` line immediately followed by a `+++ `
/// line and runs until the next `--- ` line. An empty result means "no
/// patches detected", not a fatal error.
pub fn parse_unified_diff(diff: &str) -> Vec<FilePatch> {
    let lines: Vec<&str> = diff.lines().collect();
    let mut patches = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let is_header = lines[i].starts_with("--- ")
            && lines.get(i + 1).is_some_and(|next| next.starts_with("+++ "));
        if !is_header {
            i += 1;
            continue;
        }

        let old_path = header_path(&lines[i][4..]);
        let new_path = header_path(&lines[i + 1][4..]);
        i += 2;

        let mut hunks = Vec::new();
        let mut current: Option<Hunk> = None;

        while i < lines.len() && !lines[i].starts_with("--- ") {
            let line = lines[i];
            i += 1;

            if line.starts_with("@@") {
                flush(&mut current, &mut hunks);
                current = Some(Hunk::default());
                continue;
            }

            let tagged = match line.chars().next() {
                Some(' ') => Some(HunkLine::Context(line[1..].to_string())),
                Some('+') => Some(HunkLine::Add(line[1..].to_string())),
                Some('-') => Some(HunkLine::Remove(line[1..].to_string())),
                // "\ No newline at end of file": keeps the hunk open, adds no content.
                Some('\\') => None,
                _ => {
                    flush(&mut current, &mut hunks);
                    continue;
                }
            };

            let hunk = current.get_or_insert_with(Hunk::default);
            if let Some(tagged) = tagged {
                hunk.lines.push(tagged);
            }
        }

        flush(&mut current, &mut hunks);
        patches.push(FilePatch {
            old_path,
            new_path,
            hunks,
        });
    }

    patches
}

fn flush(current: &mut Option<Hunk>, hunks: &mut Vec<Hunk>) {
    if let Some(hunk) = current.take() {
        if !hunk.lines.is_empty() {
            hunks.push(hunk);
        }
    }
}

/// Every path named by a `--- `/`+++ ` line, prefix-stripped, `/dev/null`
/// skipped, deduplicated in first-seen order.
pub fn target_paths(diff: &str) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for line in diff.lines() {
        if !(line.starts_with("+++ ") || line.starts_with("--- ")) {
            continue;
        }
        let rel = header_path(&line[4..]);
        if rel.is_empty() || rel == DEV_NULL {
            continue;
        }
        if !files.contains(&rel) {
            files.push(rel);
        }
    }
    files
}

/// Paths named by git extended headers (`rename from`, `copy to`, ...).
pub(crate) fn extended_header_paths(diff: &str) -> Vec<String> {
    const HEADERS: [&str; 4] = ["rename from ", "rename to ", "copy from ", "copy to "];
    diff.lines()
        .filter_map(|line| {
            HEADERS
                .iter()
                .find_map(|h| line.strip_prefix(h))
                .map(|p| p.trim().to_string())
        })
        .filter(|p| !p.is_empty())
        .collect()
}
