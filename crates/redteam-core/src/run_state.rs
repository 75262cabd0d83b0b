//! On-disk run directory: `<run_root>/<run_id>/`.
//!
//! Main state files are overwritten every round. Each round also gets an
//! append-only snapshot under `rounds/round_<n>/` with a sha256 digest of
//! the serialized [`RoundState`], verified on read.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{AuditError, Result};
use crate::round::RoundState;

const SNAPSHOT_STATE: &str = "state.json";
const SNAPSHOT_DIGEST: &str = "snapshot.digest";

/// Generate a run id: `YYYYmmdd_HHMMSS_<8 hex>` (UTC).
pub fn create_run_id() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{stamp}_{}", &suffix[..8])
}

/// Lowercase hex sha256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Files inside a run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunFile {
    Context,
    Findings,
    Patches,
    Apply,
    Reattack,
    Verification,
    Decisions,
    Baseline,
    Scorecard,
    Meta,
    Report,
}

impl RunFile {
    pub fn file_name(&self) -> &'static str {
        match self {
            RunFile::Context => "context.txt",
            RunFile::Findings => "findings.json",
            RunFile::Patches => "patches.json",
            RunFile::Apply => "apply.json",
            RunFile::Reattack => "reattack.json",
            RunFile::Verification => "verification.json",
            RunFile::Decisions => "decisions.json",
            RunFile::Baseline => "baseline.json",
            RunFile::Scorecard => "scorecard.json",
            RunFile::Meta => "meta.json",
            RunFile::Report => "REPORT.md",
        }
    }
}

/// Run metadata written once at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub target_path: String,
    pub model: String,
    pub mode: String,
}

/// Handle on one run directory.
#[derive(Debug, Clone)]
pub struct RunStore {
    run_id: String,
    dir: PathBuf,
}

impl RunStore {
    /// Create (if needed) and open `<run_root>/<run_id>/`.
    pub fn open(run_root: &Path, run_id: &str) -> Result<Self> {
        let dir = run_root.join(run_id);
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            run_id: run_id.to_string(),
            dir,
        })
    }

    /// Open a run directory that must already exist.
    pub fn existing(run_root: &Path, run_id: &str) -> Result<Self> {
        let dir = run_root.join(run_id);
        if !dir.is_dir() {
            return Err(AuditError::RunNotFound(run_id.to_string()));
        }
        Ok(Self {
            run_id: run_id.to_string(),
            dir,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: RunFile) -> PathBuf {
        self.dir.join(file.file_name())
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, file: RunFile, value: &T) -> Result<()> {
        write_json_at(&self.path(file), value)
    }

    /// Read `file`, returning `default` when it does not exist yet.
    pub fn read_json<T: DeserializeOwned>(&self, file: RunFile, default: T) -> Result<T> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(default);
        }
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn write_text(&self, file: RunFile, text: &str) -> Result<()> {
        std::fs::write(self.path(file), text)?;
        Ok(())
    }

    pub fn read_text(&self, file: RunFile) -> Result<String> {
        Ok(std::fs::read_to_string(self.path(file))?)
    }

    pub fn write_meta(&self, target: &Path, model: &str, mode: &str) -> Result<RunMeta> {
        let meta = RunMeta {
            run_id: self.run_id.clone(),
            created_at: Utc::now(),
            target_path: target.display().to_string(),
            model: model.to_string(),
            mode: mode.to_string(),
        };
        self.write_json(RunFile::Meta, &meta)?;
        Ok(meta)
    }

    /// Overwrite the main state files with `state`.
    pub fn write_state(&self, state: &RoundState) -> Result<()> {
        write_state_files(&self.dir, state)
    }

    /// Persist `rounds/round_<n>/` for `state.round`. Returns the snapshot dir.
    pub fn write_round_snapshot(&self, state: &RoundState) -> Result<PathBuf> {
        let dir = self.round_dir(state.round);
        std::fs::create_dir_all(&dir)?;
        write_state_files(&dir, state)?;

        let json = serde_json::to_vec_pretty(state)?;
        std::fs::write(dir.join(SNAPSHOT_STATE), &json)?;
        std::fs::write(dir.join(SNAPSHOT_DIGEST), sha256_hex(&json))?;
        Ok(dir)
    }

    /// Read and verify the snapshot of `round`.
    pub fn read_round_snapshot(&self, round: u32) -> Result<RoundState> {
        let dir = self.round_dir(round);
        let json = std::fs::read(dir.join(SNAPSHOT_STATE))?;
        let expected = std::fs::read_to_string(dir.join(SNAPSHOT_DIGEST))?;
        let actual = sha256_hex(&json);
        if expected.trim() != actual {
            return Err(AuditError::DigestMismatch {
                expected: expected.trim().to_string(),
                actual,
            });
        }
        Ok(serde_json::from_slice(&json)?)
    }

    /// Round indices with a snapshot directory, ascending.
    pub fn snapshot_rounds(&self) -> Result<Vec<u32>> {
        let rounds_dir = self.dir.join("rounds");
        if !rounds_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut rounds = Vec::new();
        for entry in std::fs::read_dir(&rounds_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(n) = name
                .to_str()
                .and_then(|n| n.strip_prefix("round_"))
                .and_then(|n| n.parse().ok())
            {
                rounds.push(n);
            }
        }
        rounds.sort_unstable();
        Ok(rounds)
    }

    fn round_dir(&self, round: u32) -> PathBuf {
        self.dir.join("rounds").join(format!("round_{round}"))
    }
}

fn write_json_at<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn write_state_files(dir: &Path, state: &RoundState) -> Result<()> {
    write_json_at(&dir.join(RunFile::Findings.file_name()), &state.findings)?;
    write_json_at(&dir.join(RunFile::Patches.file_name()), &state.patches)?;
    write_json_at(&dir.join(RunFile::Apply.file_name()), &state.apply_results)?;
    write_json_at(&dir.join(RunFile::Reattack.file_name()), &state.reattack)?;
    write_json_at(
        &dir.join(RunFile::Verification.file_name()),
        &state.verification,
    )?;
    write_json_at(&dir.join(RunFile::Decisions.file_name()), &state.decisions)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decision, Finding, Verdict};
    use tempfile::tempdir;

    fn state(round: u32) -> RoundState {
        RoundState {
            round,
            decisions: vec![Decision::fixed("F-001", "gone")],
            verdict: Some(Verdict::Approved),
            ..RoundState::default()
        }
    }

    #[test]
    fn test_run_id_format() {
        let id = create_run_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(create_run_id(), create_run_id());
    }

    #[test]
    fn test_read_json_default_when_missing() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path(), "r1").unwrap();
        let findings: Vec<Finding> = store.read_json(RunFile::Findings, Vec::new()).unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_existing_requires_directory() {
        let dir = tempdir().unwrap();
        let err = RunStore::existing(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, AuditError::RunNotFound(_)));
    }

    #[test]
    fn test_snapshot_is_verified() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path(), "r1").unwrap();
        let snap = store.write_round_snapshot(&state(1)).unwrap();
        assert!(snap.join("decisions.json").exists());
        assert_eq!(store.read_round_snapshot(1).unwrap(), state(1));
        assert_eq!(store.snapshot_rounds().unwrap(), vec![1]);

        std::fs::write(snap.join(SNAPSHOT_STATE), b"{\"round\": 7}").unwrap();
        let err = store.read_round_snapshot(1).unwrap_err();
        assert!(matches!(err, AuditError::DigestMismatch { .. }));
    }

    #[test]
    fn test_write_meta() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path(), "r1").unwrap();
        store
            .write_meta(Path::new("/srv/app"), "gpt-4o-mini", "heuristic")
            .unwrap();
        let meta: RunMeta = serde_json::from_str(&store.read_text(RunFile::Meta).unwrap()).unwrap();
        assert_eq!(meta.run_id, "r1");
        assert_eq!(meta.mode, "heuristic");
    }
}
