//! Registry of audit runs in this process.
//!
//! Runs on different targets share nothing but this map. Two runs on the
//! same target directory are allowed and may race on file writes; the
//! registry only warns about it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{AuditError, Result, Verdict};

/// Lifecycle of a registered run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub target: PathBuf,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub verdict: Option<Verdict>,
    pub error: Option<String>,
}

/// Mutex-guarded map of run id to [`RunRecord`].
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, RunRecord>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RunRecord>> {
        // A poisoned map is still consistent: every update is a single insert.
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a queued run. Returns true if another active run already
    /// targets the same directory.
    pub fn register(&self, run_id: &str, target: &Path) -> bool {
        let mut runs = self.lock();
        let shared = runs
            .values()
            .any(|r| r.status.is_active() && r.target == target);
        if shared {
            warn!(
                run_id,
                target = %target.display(),
                "another active run targets the same directory; file writes may race"
            );
        }
        runs.insert(
            run_id.to_string(),
            RunRecord {
                run_id: run_id.to_string(),
                target: target.to_path_buf(),
                status: RunStatus::Queued,
                started_at: Utc::now(),
                finished_at: None,
                verdict: None,
                error: None,
            },
        );
        shared
    }

    pub fn update_status(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let mut runs = self.lock();
        let record = runs
            .get_mut(run_id)
            .ok_or_else(|| AuditError::RunNotFound(run_id.to_string()))?;
        record.status = status;
        Ok(())
    }

    /// Mark a run completed with `verdict`, or failed with `error`.
    pub fn finish(
        &self,
        run_id: &str,
        outcome: std::result::Result<Verdict, String>,
    ) -> Result<()> {
        let mut runs = self.lock();
        let record = runs
            .get_mut(run_id)
            .ok_or_else(|| AuditError::RunNotFound(run_id.to_string()))?;
        record.finished_at = Some(Utc::now());
        match outcome {
            Ok(verdict) => {
                record.status = RunStatus::Completed;
                record.verdict = Some(verdict);
            }
            Err(error) => {
                record.status = RunStatus::Failed;
                record.error = Some(error);
            }
        }
        Ok(())
    }

    pub fn get(&self, run_id: &str) -> Option<RunRecord> {
        self.lock().get(run_id).cloned()
    }

    pub fn remove(&self, run_id: &str) -> Option<RunRecord> {
        self.lock().remove(run_id)
    }

    /// All records, oldest first.
    pub fn list(&self) -> Vec<RunRecord> {
        let mut records: Vec<RunRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.run_id.cmp(&b.run_id)));
        records
    }

    /// Targets of queued or running runs, deduplicated.
    pub fn active_targets(&self) -> Vec<PathBuf> {
        let mut targets: Vec<PathBuf> = self
            .lock()
            .values()
            .filter(|r| r.status.is_active())
            .map(|r| r.target.clone())
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }
}
