//! Unified diff text for rewritten files.

use similar::TextDiff;

/// Unified diff from `old` to `new` with `context` lines around each change.
/// Returns an empty string when the inputs are equal.
pub fn unified_diff(old: &str, new: &str, from: &str, to: &str, context: usize) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(context)
        .header(from, to)
        .to_string()
}
