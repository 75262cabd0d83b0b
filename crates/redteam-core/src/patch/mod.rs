//! Patch engine: unified-diff parsing and a safe, multi-strategy applier.

pub mod applier;
pub mod error;
pub mod loose;
pub mod parser;
pub mod safety;

pub use applier::{
    ApplyAttempt, ApplyMethod, ApplyResult, ApplyStrategy, PatchApplier, DEFAULT_APPLY_TIMEOUT,
};
pub use error::ApplyError;
pub use loose::{apply_hunks, loose_apply, LooseReport};
pub use parser::{parse_unified_diff, target_paths, FilePatch, Hunk, HunkLine, DEV_NULL};
pub use safety::{first_unsafe_path, resolve_within};
