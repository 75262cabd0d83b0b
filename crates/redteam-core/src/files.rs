//! Source file discovery and the numbered code context sent to the roles.

use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::domain::Result;

/// Directory names never descended into.
pub const IGNORE_DIRS: &[&str] = &[
    ".git",
    ".venv",
    "__pycache__",
    "runs",
    "dist",
    "build",
    "node_modules",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
];

/// Source files under `root` whose extension is in `extensions`, sorted.
/// A file `root` is returned alone iff its extension matches.
pub fn list_code_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(if has_extension(root, extensions) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e));
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if path.is_file() && has_extension(path, extensions) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORE_DIRS.contains(&name))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let dotted = format!(".{e}");
            extensions.iter().any(|x| x.eq_ignore_ascii_case(&dotted))
        })
        .unwrap_or(false)
}

/// First `max_bytes` of `path`, decoded lossily.
pub fn read_file(path: &Path, max_bytes: usize) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut buf = Vec::with_capacity(max_bytes.min(64 * 1024));
    file.take(max_bytes as u64).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `# File: <path>` sections with `NNNN ` line numbers. Stops before the
/// file that would push the total past `max_total_bytes`.
pub fn build_code_context(
    paths: &[PathBuf],
    max_file_bytes: usize,
    max_total_bytes: usize,
) -> Result<String> {
    let mut sections = Vec::new();
    let mut total = 0usize;

    for path in paths {
        let text = read_file(path, max_file_bytes)?;
        total += text.len();
        if total > max_total_bytes {
            break;
        }
        let numbered = text
            .lines()
            .enumerate()
            .map(|(idx, line)| format!("{:04} {line}", idx + 1))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("# File: {}\n{numbered}", path.display()));
    }

    Ok(sections.join("\n\n"))
}
