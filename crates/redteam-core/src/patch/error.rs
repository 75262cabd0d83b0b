//! Error taxonomy for patch application.
//!
//! None of these escape [`super::PatchApplier::apply`]: they are rendered
//! into `ApplyResult::note` and the failing `ApplyAttempt`.

/// Why one apply strategy (or the whole call) failed.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("Refusing to apply patch with unsafe path: {path}")]
    UnsafePath { path: String },

    #[error("No file patches detected in diff")]
    NoFilePatches,

    #[error("Missing target path in diff")]
    MissingTarget,

    #[error("Refusing to delete file: {path}")]
    DeleteUnsupported { path: String },

    #[error("Failed to apply hunk {hunk} to {path}: context not found")]
    ContextNotFound { path: String, hunk: usize },

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = ApplyError::ContextNotFound {
            path: "app.py".into(),
            hunk: 2,
        };
        assert_eq!(
            err.to_string(),
            "Failed to apply hunk 2 to app.py: context not found"
        );

        let err = ApplyError::UnsafePath {
            path: "../../etc/passwd".into(),
        };
        assert!(err.to_string().contains("../../etc/passwd"));
    }
}
