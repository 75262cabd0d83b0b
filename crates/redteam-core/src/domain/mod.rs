//! Domain models for the audit loop.
//!
//! - `Finding`: one reported issue
//! - `Patch`: a proposed unified-diff fix for one finding
//! - `Decision` / `Verdict`: per-finding and per-round outcomes
//! - `VerificationResult`: output of one external tool run

pub mod decision;
pub mod error;
pub mod finding;
pub mod patch;
pub mod verification;

pub use decision::{Decision, DecisionCounts, DecisionStatus, Verdict};
pub use error::{AuditError, Result};
pub use finding::{
    apply_decisions, base_name, normalize_findings, Finding, FindingStatus, Severity,
};
pub use patch::{normalize_patches, uncovered, Patch};
pub use verification::{
    failing_tools, VerificationResult, NOT_FOUND_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
