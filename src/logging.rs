//! Structured logging for the air-quality pipeline.
//!
//! Events go through `tracing`. Every helper tags the event with the
//! component that produced it and, where there is one, the station name, so
//! a failed run can be traced back to the stage and district involved.
//! Output is a human-readable console stream plus an optional append-only
//! log file for scheduled (cron) runs.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Snapshot,
    Normalize,
    Alert,
    Notify,
    Database,
    Collector,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Snapshot => write!(f, "SNAP"),
            Component::Normalize => write!(f, "NORM"),
            Component::Alert => write!(f, "ALERT"),
            Component::Notify => write!(f, "NOTIFY"),
            Component::Database => write!(f, "DB"),
            Component::Collector => write!(f, "COLLECT"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The run stops here; nothing after this stage happens.
    Fatal,
    /// Logged and counted; the run carries on.
    NonFatal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Fatal => write!(f, "FATAL"),
            FailureKind::NonFatal => write!(f, "NON-FATAL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Installs the global subscriber.
///
/// `default_level` is used when `RUST_LOG` is unset. When `log_file` is
/// given, every event is also appended to that file. Calling this twice is
/// harmless; the first subscriber wins.
pub fn init_logger(default_level: &str, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = tracing_subscriber::fmt::layer()
        .with_timer(ChronoUtc::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);

    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

pub fn info(component: Component, station: Option<&str>, message: &str) {
    tracing::info!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

pub fn warn(component: Component, station: Option<&str>, message: &str) {
    tracing::warn!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

pub fn error(component: Component, station: Option<&str>, message: &str) {
    tracing::error!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

pub fn debug(component: Component, station: Option<&str>, message: &str) {
    tracing::debug!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Logs a stage failure at the level its kind calls for.
pub fn log_failure(
    component: Component,
    station: Option<&str>,
    operation: &str,
    kind: FailureKind,
    err: &dyn std::error::Error,
) {
    let message = format!("{} failed [{}]: {}", operation, kind, err);
    match kind {
        FailureKind::Fatal => error(component, station, &message),
        FailureKind::NonFatal => warn(component, station, &message),
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Logs the outcome of one completed run.
///
/// Info when every alert went out, warn when some deliveries failed, error
/// when none did.
pub fn log_run_summary(rows_persisted: usize, alerts_sent: usize, alerts_failed: usize) {
    let message = format!(
        "Run complete: {} rows appended, {}/{} alerts delivered",
        rows_persisted,
        alerts_sent,
        alerts_sent + alerts_failed
    );

    let level = summary_level(alerts_sent, alerts_failed);
    if level == tracing::Level::ERROR {
        error(Component::System, None, &message);
    } else if level == tracing::Level::WARN {
        warn(Component::System, None, &message);
    } else {
        info(Component::System, None, &message);
    }
}

fn summary_level(alerts_sent: usize, alerts_failed: usize) -> tracing::Level {
    if alerts_failed == 0 {
        tracing::Level::INFO
    } else if alerts_sent == 0 {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    }
}
