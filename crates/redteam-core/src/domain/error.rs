//! Domain-level error taxonomy for the audit loop.
//!
//! Recoverable conditions (blocked patches, missing hunk context, an
//! unavailable arbiter, ...) never reach this type: the component that
//! detects them turns them into data (`ApplyResult::note`,
//! `Decision::reason`). What remains here aborts the current round.

use std::path::PathBuf;

/// Audit errors surfaced to the orchestrating caller.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("no supported source files found in {0}")]
    NoSourceFiles(PathBuf),

    #[error("target path does not exist: {0}")]
    TargetNotFound(PathBuf),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_error_display() {
        let err = AuditError::NoSourceFiles(PathBuf::from("/tmp/empty"));
        assert!(err.to_string().contains("no supported source files"));
        assert!(err.to_string().contains("/tmp/empty"));

        let err = AuditError::RunNotFound("20250101_000000_deadbeef".to_string());
        assert!(err.to_string().contains("run not found"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = AuditError::DigestMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AuditError = io.into();
        assert!(matches!(err, AuditError::Io(_)));
    }
}
