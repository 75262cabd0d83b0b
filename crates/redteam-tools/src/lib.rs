//! RedTeam Tools - external verification for the audit loop
//!
//! Provides adapters that:
//! - Run the security linter, style linter and test runner against a target
//! - Report every invocation as a `VerificationResult`, missing tools included
//! - Summarise security-linter output as hints for the attacker

pub mod error;
pub mod hints;
pub mod runner;
pub mod suite;
pub mod tool;

// Re-export key types
pub use error::{Result, ToolError};
pub use hints::security_hints;
pub use runner::ToolRunner;
pub use suite::LinterSuite;
pub use tool::{BuiltinTool, ToolConfig};
