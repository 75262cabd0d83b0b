//! Path-containment checks run before any mutation.

use std::path::{Component, Path, PathBuf};

/// Resolve `rel` against an already-canonical `root`, following symlinks
/// that exist on disk. Returns `None` for absolute paths, for anything that
/// lands outside `root`, and for symlinks that cannot be resolved.
pub fn resolve_within(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel = rel.trim();
    if rel.is_empty() || looks_absolute(rel) {
        return None;
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(rel).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                let is_symlink = std::fs::symlink_metadata(&resolved)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if is_symlink {
                    resolved = std::fs::canonicalize(&resolved).ok()?;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    resolved.starts_with(root).then_some(resolved)
}

/// First path in `paths` that is absolute or escapes `root`.
pub fn first_unsafe_path<'a>(paths: &'a [String], root: &Path) -> Option<&'a str> {
    paths
        .iter()
        .map(String::as_str)
        .filter(|p| !p.trim().is_empty())
        .find(|p| resolve_within(root, p).is_none())
}

fn looks_absolute(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute() {
        return true;
    }
    // Windows drive letters ("C:\..." / "C:/...") on any host.
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
