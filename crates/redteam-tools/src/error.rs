//! Tool adapter errors.

/// Errors raised while preparing a tool invocation.
///
/// A tool that runs and fails, times out or is missing is not an error:
/// it is reported as a `VerificationResult` with the matching exit code.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool {0} has an empty command")]
    EmptyCommand(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
