//! Log subscriber for the `redteam` binary.
//!
//! Logs always go to stderr: stdout carries command output (`--json`
//! results, `apply` reports) and must stay parseable.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose debug output drowns the audit events.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Filter used when `RUST_LOG` is unset: `level` for everything, with the
/// HTTP stack held at `warn` unless `level` is already stricter.
pub fn default_directives(level: Level) -> String {
    let quiet = if level < Level::WARN { level } else { Level::WARN };
    std::iter::once(level.as_str().to_lowercase())
        .chain(
            QUIET_TARGETS
                .iter()
                .map(|target| format!("{target}={}", quiet.as_str().to_lowercase())),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber; `json` selects newline-delimited JSON.
/// Only the first call in a process has any effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();
}
