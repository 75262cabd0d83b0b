//! RedTeam Auditor CLI
//!
//! The `redteam` command drives the adversarial audit loop over a source tree.
//!
//! ## Commands
//!
//! - `scan`: Initial attacker scan, persisted under a new run id
//! - `fix`: One defender pass over a run's findings (optionally applied)
//! - `verify`: Re-attack, run verification tools and decide each finding
//! - `run`: Full round loop over one or more targets, concurrently
//! - `apply`: Apply a unified diff under a root directory
//! - `show`: Print a run's scorecard and decisions

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Instrument, Level};

use redteam_core::agents::ModelRoles;
use redteam_core::completion::{CompletionService, DisabledCompletion, OpenAiCompletion};
use redteam_core::config::AuditSettings;
use redteam_core::domain::{apply_decisions, Decision, Finding, Patch, Verdict, VerificationResult};
use redteam_core::patch::{ApplyResult, PatchApplier};
use redteam_core::registry::{RunRegistry, RunStatus};
use redteam_core::report::{render_report, ReportInput};
use redteam_core::round::{AuditRoles, RoundConfig, RoundController, RoundFeedback, RunOutcome};
use redteam_core::run_state::{create_run_id, RunFile, RunMeta, RunStore};
use redteam_core::scorecard::{build_scorecard, Scorecard};
use redteam_core::{emit_run_started, run_span, AuditSpan};
use redteam_tools::LinterSuite;

#[derive(Parser)]
#[command(name = "redteam")]
#[command(author = "RedTeam Auditor Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Adversarial security audit loop: attack, patch, re-attack, decide", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding run directories (default: AUDIT_RUN_DIR or ./runs)
    #[arg(long, global = true)]
    run_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a file or directory and persist the findings under a run id
    Scan {
        /// File or directory to audit
        path: PathBuf,

        /// Run id to write into (default: a fresh one)
        #[arg(long)]
        run_id: Option<String>,

        /// Use the heuristic scanner even if a model is configured
        #[arg(long)]
        heuristic: bool,
    },

    /// Propose patches for a run's open findings
    Fix {
        path: PathBuf,

        #[arg(long)]
        run_id: String,

        /// Apply the proposed patches to the target
        #[arg(long)]
        autofix: bool,

        #[arg(long)]
        heuristic: bool,
    },

    /// Re-attack, run verification tools and decide each finding
    Verify {
        path: PathBuf,

        #[arg(long)]
        run_id: String,

        #[arg(long)]
        heuristic: bool,
    },

    /// Run the full audit loop; several targets run concurrently
    Run {
        /// Files or directories to audit
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Round budget (default: AUDIT_MAX_ROUNDS or 2)
        #[arg(long)]
        max_rounds: Option<u32>,

        #[arg(long)]
        autofix: bool,

        #[arg(long)]
        heuristic: bool,

        /// Skip the independent baseline scan
        #[arg(long)]
        no_baseline: bool,
    },

    /// Apply a unified diff under a root directory and print the result
    Apply {
        /// Diff file to apply
        diff: PathBuf,

        /// Directory the diff paths are relative to
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Show a run's scorecard and decisions
    Show {
        run_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    redteam_core::init_tracing(cli.json, level);

    let mut settings = AuditSettings::from_env();
    if let Some(run_dir) = cli.run_dir {
        settings.run_dir = run_dir;
    }

    match cli.command {
        Commands::Scan {
            path,
            run_id,
            heuristic,
        } => cmd_scan(&settings, &path, run_id, heuristic).await.map(|_| ()),
        Commands::Fix {
            path,
            run_id,
            autofix,
            heuristic,
        } => cmd_fix(&settings, &path, &run_id, autofix, heuristic)
            .await
            .map(|_| ()),
        Commands::Verify {
            path,
            run_id,
            heuristic,
        } => cmd_verify(&settings, &path, &run_id, heuristic)
            .await
            .map(|_| ()),
        Commands::Run {
            paths,
            max_rounds,
            autofix,
            heuristic,
            no_baseline,
        } => {
            let options = RunOptions {
                max_rounds: max_rounds.unwrap_or(settings.max_rounds),
                autofix,
                heuristic,
                baseline: !no_baseline,
            };
            cmd_run(&settings, &paths, options).await.map(|_| ())
        }
        Commands::Apply { diff, root } => cmd_apply(&settings, &diff, &root).await.map(|_| ()),
        Commands::Show { run_id } => cmd_show(&settings, &run_id),
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn completion_service(settings: &AuditSettings) -> Result<Arc<dyn CompletionService>> {
    if settings.has_api_key() {
        let client = OpenAiCompletion::new(settings).context("Failed to build completion client")?;
        Ok(Arc::new(client))
    } else {
        Ok(Arc::new(DisabledCompletion::default()))
    }
}

fn linter_suite(settings: &AuditSettings) -> LinterSuite {
    LinterSuite::new(settings.tool_timeout())
}

fn model_roles(settings: &AuditSettings, heuristic: bool) -> Result<Arc<ModelRoles>> {
    let roles = ModelRoles::new(completion_service(settings)?, settings.clone())
        .with_heuristics(heuristic)
        .with_hints(Arc::new(linter_suite(settings)));
    Ok(Arc::new(roles))
}

fn controller(
    settings: &AuditSettings,
    roles: Arc<ModelRoles>,
    config: RoundConfig,
) -> RoundController {
    RoundController::new(roles, Arc::new(linter_suite(settings)), config)
        .with_applier(PatchApplier::new(settings.apply_timeout()))
}

fn mode_label(roles: &ModelRoles) -> &'static str {
    if roles.model_enabled() {
        "model"
    } else {
        "heuristic"
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn print_findings(findings: &[Finding]) {
    for f in findings {
        println!(
            "  {} [{}] {} {}:{} ({})",
            f.id, f.severity, f.cwe, f.file, f.line, f.title
        );
    }
}

/// Scorecard and REPORT.md for the state currently persisted in `store`.
fn write_summary(
    store: &RunStore,
    target: &Path,
    scan_mode: &str,
    rounds: u32,
    verdict: Option<Verdict>,
) -> Result<Scorecard> {
    let findings: Vec<Finding> = store.read_json(RunFile::Findings, Vec::new())?;
    let patches: Vec<Patch> = store.read_json(RunFile::Patches, Vec::new())?;
    let apply_results: Vec<ApplyResult> = store.read_json(RunFile::Apply, Vec::new())?;
    let verification: Vec<VerificationResult> = store.read_json(RunFile::Verification, Vec::new())?;
    let decisions: Vec<Decision> = store.read_json(RunFile::Decisions, Vec::new())?;
    let baseline: Option<Vec<Finding>> = store.read_json(RunFile::Baseline, None)?;

    let scorecard = build_scorecard(&findings, &decisions, &verification, baseline.as_deref());
    store.write_json(RunFile::Scorecard, &scorecard)?;

    let report = render_report(&ReportInput {
        run_id: store.run_id().to_string(),
        target: target.display().to_string(),
        scan_mode: scan_mode.to_string(),
        rounds,
        verdict,
        findings,
        patches,
        apply_results,
        verification,
        decisions,
        scorecard: scorecard.clone(),
    });
    store.write_text(RunFile::Report, &report)?;
    Ok(scorecard)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Scan `path` and persist context, findings and meta. Returns the run id.
async fn cmd_scan(
    settings: &AuditSettings,
    path: &Path,
    run_id: Option<String>,
    heuristic: bool,
) -> Result<String> {
    let run_id = run_id.unwrap_or_else(create_run_id);
    let _span = AuditSpan::enter(&run_id, &path.display().to_string());

    let roles = model_roles(settings, heuristic)?;
    let store = RunStore::open(&settings.run_dir, &run_id)
        .with_context(|| format!("Failed to open run directory for {}", run_id))?;

    let scan = roles
        .scan(path)
        .await
        .with_context(|| format!("Scan of {} failed", path.display()))?;

    store.write_text(RunFile::Context, &scan.context)?;
    store.write_json(RunFile::Findings, &scan.findings)?;
    store.write_meta(path, roles.model(), scan.mode.as_str())?;

    println!("Run ID: {}", run_id);
    println!("Mode: {}", scan.mode.as_str());
    println!("Findings: {}", scan.findings.len());
    print_findings(&scan.findings);
    Ok(run_id)
}

/// One defender pass over the run's active findings.
async fn cmd_fix(
    settings: &AuditSettings,
    path: &Path,
    run_id: &str,
    autofix: bool,
    heuristic: bool,
) -> Result<Vec<ApplyResult>> {
    let _span = AuditSpan::enter(run_id, &path.display().to_string());
    let store = RunStore::existing(&settings.run_dir, run_id)
        .with_context(|| format!("Unknown run {}", run_id))?;

    let findings: Vec<Finding> = store.read_json(RunFile::Findings, Vec::new())?;
    let active: Vec<Finding> = findings.iter().filter(|f| f.is_active()).cloned().collect();
    let feedback = RoundFeedback {
        decisions: store.read_json(RunFile::Decisions, Vec::new())?,
        reattack: store.read_json(RunFile::Reattack, Vec::new())?,
        apply_results: store.read_json(RunFile::Apply, Vec::new())?,
    };

    let roles = model_roles(settings, heuristic)?;
    let controller = controller(settings, roles, RoundConfig::new(1, autofix));
    let outcome = controller
        .fix(path, &active, &feedback)
        .await
        .context("Defender pass failed")?;

    store.write_json(RunFile::Patches, &outcome.patches)?;
    store.write_json(RunFile::Apply, &outcome.apply_results)?;

    println!("Patches: {}", outcome.patches.len());
    for patch in &outcome.patches {
        let status = match outcome.apply_results.iter().find(|r| r.id == patch.id) {
            Some(r) if r.ok => format!("✓ applied ({})", r.method),
            Some(r) => format!("✗ {} {}", r.method, r.note.trim()),
            None => "proposed".to_string(),
        };
        println!("  {} {}", patch.id, status);
    }
    Ok(outcome.apply_results)
}

/// Re-attack, verify and decide over the persisted state.
async fn cmd_verify(
    settings: &AuditSettings,
    path: &Path,
    run_id: &str,
    heuristic: bool,
) -> Result<Verdict> {
    let _span = AuditSpan::enter(run_id, &path.display().to_string());
    let store = RunStore::existing(&settings.run_dir, run_id)
        .with_context(|| format!("Unknown run {}", run_id))?;

    let findings: Vec<Finding> = store.read_json(RunFile::Findings, Vec::new())?;
    let patches: Vec<Patch> = store.read_json(RunFile::Patches, Vec::new())?;
    let apply_results: Vec<ApplyResult> = store.read_json(RunFile::Apply, Vec::new())?;
    let active: Vec<Finding> = findings.iter().filter(|f| f.is_active()).cloned().collect();

    let roles = model_roles(settings, heuristic)?;
    let mode = mode_label(&roles);
    let controller = controller(settings, roles, RoundConfig::default());

    let reattack = controller.reattack(path).await.context("Re-attack failed")?;
    let validation = controller
        .validate(path, &active, &patches, &apply_results, &reattack)
        .await;
    let findings = apply_decisions(&findings, &validation.decisions);

    store.write_json(RunFile::Reattack, &reattack)?;
    store.write_json(RunFile::Verification, &validation.verification)?;
    store.write_json(RunFile::Decisions, &validation.decisions)?;
    store.write_json(RunFile::Findings, &findings)?;

    let meta: Option<RunMeta> = store.read_json(RunFile::Meta, None)?;
    let scan_mode = meta.map(|m| m.mode).unwrap_or_else(|| mode.to_string());
    let scorecard = write_summary(&store, path, &scan_mode, 1, Some(validation.verdict))?;

    println!("Verdict: {}", validation.verdict);
    for decision in &validation.decisions {
        println!("  {} {} ({})", decision.id, decision.status, decision.reason);
    }
    println!(
        "Fixed {}/{} (fix rate {:.2}), tools pass: {}",
        scorecard.fixed, scorecard.findings_total, scorecard.fix_rate, scorecard.tools_pass
    );
    Ok(validation.verdict)
}

#[derive(Debug, Clone, Copy)]
struct RunOptions {
    max_rounds: u32,
    autofix: bool,
    heuristic: bool,
    baseline: bool,
}

/// One target's finished run.
#[derive(Debug)]
struct TargetRun {
    run_id: String,
    target: PathBuf,
    outcome: RunOutcome,
    scorecard: Scorecard,
}

async fn run_target(
    settings: AuditSettings,
    target: PathBuf,
    run_id: String,
    options: RunOptions,
) -> Result<TargetRun> {
    let roles = model_roles(&settings, options.heuristic)?;
    let store = RunStore::open(&settings.run_dir, &run_id)?;
    emit_run_started(
        &run_id,
        &target.display().to_string(),
        mode_label(&roles),
        options.max_rounds,
    );

    let model = roles.model().to_string();
    let config = RoundConfig::new(options.max_rounds, options.autofix).with_baseline(options.baseline);
    let controller = controller(&settings, roles, config).with_store(store.clone());
    let outcome = controller
        .run(&target)
        .await
        .with_context(|| format!("Audit of {} failed", target.display()))?;

    store.write_meta(&target, &model, outcome.scan_mode.as_str())?;
    let scorecard = write_summary(
        &store,
        &target,
        outcome.scan_mode.as_str(),
        outcome.rounds_run(),
        Some(outcome.verdict),
    )?;

    Ok(TargetRun {
        run_id,
        target,
        outcome,
        scorecard,
    })
}

/// Full loop over every target; each target gets its own run id and task.
async fn cmd_run(
    settings: &AuditSettings,
    paths: &[PathBuf],
    options: RunOptions,
) -> Result<Vec<TargetRun>> {
    let registry = Arc::new(RunRegistry::new());
    let mut handles = Vec::with_capacity(paths.len());

    for target in paths {
        let run_id = create_run_id();
        registry.register(&run_id, target);

        let registry = registry.clone();
        let settings = settings.clone();
        let target = target.clone();
        let span = run_span(&run_id, &target.display().to_string());
        let handle = tokio::spawn(
            async move {
                if let Err(e) = registry.update_status(&run_id, RunStatus::Running) {
                    warn!(error = %e, "registry update failed");
                }
                let result = run_target(settings, target, run_id.clone(), options).await;
                let verdict = result
                    .as_ref()
                    .map(|run| run.outcome.verdict)
                    .map_err(|e| format!("{:#}", e));
                if let Err(e) = registry.finish(&run_id, verdict) {
                    warn!(error = %e, "registry update failed");
                }
                result
            }
            .instrument(span),
        );
        handles.push(handle);
    }

    let mut runs = Vec::with_capacity(handles.len());
    let mut failed = 0usize;
    for handle in handles {
        match handle.await.context("Audit task panicked")? {
            Ok(run) => runs.push(run),
            Err(e) => {
                failed += 1;
                warn!(error = %format!("{:#}", e), "audit run failed");
                eprintln!("✗ {:#}", e);
            }
        }
    }

    for run in &runs {
        let status = if run.outcome.verdict == Verdict::Approved {
            "✓"
        } else {
            "✗"
        };
        println!(
            "{} {} {} after {} round(s) [run {}] fixed {}/{}",
            status,
            run.target.display(),
            run.outcome.verdict,
            run.outcome.rounds_run(),
            run.run_id,
            run.scorecard.fixed,
            run.scorecard.findings_total
        );
    }
    info!(
        runs = runs.len(),
        failed,
        registered = registry.list().len(),
        "audit runs finished"
    );

    if failed > 0 {
        anyhow::bail!("{} of {} audit run(s) failed", failed, paths.len());
    }
    Ok(runs)
}

/// Apply a diff file under `root` and print the ApplyResult JSON.
async fn cmd_apply(settings: &AuditSettings, diff: &Path, root: &Path) -> Result<ApplyResult> {
    let text = std::fs::read_to_string(diff)
        .with_context(|| format!("Failed to read diff {}", diff.display()))?;
    let applier = PatchApplier::new(settings.apply_timeout());
    let result = applier.apply(&text, root).await;
    print_json(&result)?;
    Ok(result)
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    run_id: String,
    meta: Option<RunMeta>,
    scorecard: Option<Scorecard>,
    decisions: Vec<Decision>,
}

fn load_show(settings: &AuditSettings, run_id: &str) -> Result<ShowOutput> {
    let store = RunStore::existing(&settings.run_dir, run_id)
        .with_context(|| format!("Unknown run {}", run_id))?;
    Ok(ShowOutput {
        run_id: run_id.to_string(),
        meta: store.read_json(RunFile::Meta, None)?,
        scorecard: store.read_json(RunFile::Scorecard, None)?,
        decisions: store.read_json(RunFile::Decisions, Vec::new())?,
    })
}

fn cmd_show(settings: &AuditSettings, run_id: &str) -> Result<()> {
    print_json(&load_show(settings, run_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redteam_core::domain::FindingStatus;
    use redteam_core::patch::ApplyMethod;

    fn settings(run_dir: &Path) -> AuditSettings {
        let mut settings = AuditSettings::from_lookup(|_| None);
        settings.run_dir = run_dir.to_path_buf();
        settings.tool_timeout_secs = 30;
        settings
    }

    fn vulnerable_tree(dir: &Path) {
        std::fs::write(
            dir.join("loader.py"),
            "import pickle\n\n\ndef load(blob):\n    return pickle.loads(blob)\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_scan_persists_findings_and_meta() {
        let runs = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        vulnerable_tree(target.path());
        let settings = settings(runs.path());

        let run_id = cmd_scan(&settings, target.path(), None, true).await.unwrap();

        let store = RunStore::existing(runs.path(), &run_id).unwrap();
        let findings: Vec<Finding> = store.read_json(RunFile::Findings, Vec::new()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].cwe, "CWE-502");
        let meta: RunMeta = store.read_json(RunFile::Meta, None).unwrap().unwrap();
        assert_eq!(meta.mode, "heuristic");
        assert!(store.read_text(RunFile::Context).unwrap().contains("# File:"));
    }

    #[tokio::test]
    async fn test_scan_fix_verify_flow() {
        let runs = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        vulnerable_tree(target.path());
        let settings = settings(runs.path());

        let run_id = cmd_scan(&settings, target.path(), Some("flow".into()), true)
            .await
            .unwrap();
        let applied = cmd_fix(&settings, target.path(), &run_id, true, true).await.unwrap();
        assert!(applied.iter().all(|r| r.ok));

        let verdict = cmd_verify(&settings, target.path(), &run_id, true).await.unwrap();
        assert_eq!(verdict, Verdict::Approved);

        let shown = load_show(&settings, &run_id).unwrap();
        assert_eq!(shown.decisions.len(), 1);
        assert_eq!(shown.scorecard.unwrap().fixed, 1);

        let store = RunStore::existing(runs.path(), &run_id).unwrap();
        let findings: Vec<Finding> = store.read_json(RunFile::Findings, Vec::new()).unwrap();
        assert_eq!(findings[0].status, FindingStatus::Fixed);
        assert!(store.read_text(RunFile::Report).unwrap().contains("**APPROVED**"));
    }

    #[tokio::test]
    async fn test_run_audits_targets_concurrently() {
        let runs = tempfile::tempdir().unwrap();
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        vulnerable_tree(a.path());
        vulnerable_tree(b.path());
        let settings = settings(runs.path());

        let options = RunOptions {
            max_rounds: 2,
            autofix: true,
            heuristic: true,
            baseline: true,
        };
        let results = cmd_run(&settings, &[a.path().to_path_buf(), b.path().to_path_buf()], options)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_ne!(results[0].run_id, results[1].run_id);
        for run in &results {
            assert_eq!(run.outcome.verdict, Verdict::Approved);
            let store = RunStore::existing(runs.path(), &run.run_id).unwrap();
            assert!(store.path(RunFile::Scorecard).exists());
            assert!(store.path(RunFile::Report).exists());
            assert_eq!(store.snapshot_rounds().unwrap(), vec![1]);
        }
    }

    #[tokio::test]
    async fn test_run_reports_missing_target() {
        let runs = tempfile::tempdir().unwrap();
        let settings = settings(runs.path());
        let options = RunOptions {
            max_rounds: 1,
            autofix: false,
            heuristic: true,
            baseline: false,
        };

        let err = cmd_run(&settings, &[runs.path().join("missing")], options)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 of 1"));
    }

    #[tokio::test]
    async fn test_apply_blocks_traversal() {
        let runs = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let diff = runs.path().join("evil.diff");
        std::fs::write(
            &diff,
            "--- a/../../etc/passwd\n+++ b/../../etc/passwd\n@@ -1 +1 @@\n-root\n+owned\n",
        )
        .unwrap();

        let result = cmd_apply(&settings(runs.path()), &diff, root.path()).await.unwrap();
        assert!(!result.ok);
        assert_eq!(result.method, ApplyMethod::Blocked);
    }

    #[test]
    fn test_show_unknown_run() {
        let runs = tempfile::tempdir().unwrap();
        assert!(load_show(&settings(runs.path()), "nope").is_err());
    }
}
