//! One batch run: load → normalize → evaluate → notify → persist.
//!
//! A run handles exactly one snapshot and either completes every stage or
//! stops at the first fatal failure. Fatal failures are typed by stage
//! (`PipelineError`); alert delivery failures are not fatal and are only
//! counted. Alerts go out before the rows are stored, so a persist failure
//! can leave alerts delivered for rows that never reach the table. Nothing
//! retries.

use crate::alert::{AlertPolicy, Notifier};
use crate::db::ReadingSink;
use crate::ingest::SnapshotSource;
use crate::logging::{self, Component, FailureKind};
use crate::model::{AlertEvent, LoadError, NormalizedReading, ParseError, PersistError};
use crate::normalize;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Loading,
    Normalizing,
    Evaluating,
    Notifying,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Idle => "idle",
            RunStage::Loading => "loading",
            RunStage::Normalizing => "normalizing",
            RunStage::Evaluating => "evaluating",
            RunStage::Notifying => "notifying",
            RunStage::Persisting => "persisting",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A fatal run failure, named by the stage that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("loading snapshot: {0}")]
    Load(#[from] LoadError),
    #[error("normalizing snapshot: {0}")]
    Parse(#[from] ParseError),
    #[error("persisting readings: {0}")]
    Persist(#[from] PersistError),
}

impl PipelineError {
    pub fn stage(&self) -> RunStage {
        match self {
            PipelineError::Load(_) => RunStage::Loading,
            PipelineError::Parse(_) => RunStage::Normalizing,
            PipelineError::Persist(_) => RunStage::Persisting,
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub snapshot_key: String,
    pub rows_normalized: usize,
    pub rows_persisted: usize,
    pub alerts_raised: usize,
    pub alerts_delivered: usize,
    pub alerts_failed: usize,
}

/// Run-time knobs that are not collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub district_suffix: char,
    pub alert_policy: AlertPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            district_suffix: crate::model::DISTRICT_SUFFIX,
            alert_policy: AlertPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct PipelineRunner<S, N, P> {
    source: S,
    notifier: N,
    sink: P,
    settings: PipelineSettings,
    stage: RunStage,
}

impl<S, N, P> PipelineRunner<S, N, P>
where
    S: SnapshotSource,
    N: Notifier,
    P: ReadingSink,
{
    pub fn new(source: S, notifier: N, sink: P, settings: PipelineSettings) -> Self {
        Self { source, notifier, sink, settings, stage: RunStage::Idle }
    }

    /// Current (or, after `run`, terminal) stage.
    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn into_parts(self) -> (S, N, P) {
        (self.source, self.notifier, self.sink)
    }

    /// Executes one full run.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        match self.run_stages() {
            Ok(summary) => {
                self.stage = RunStage::Done;
                logging::log_run_summary(
                    summary.rows_persisted,
                    summary.alerts_delivered,
                    summary.alerts_failed,
                );
                Ok(summary)
            }
            Err(err) => {
                logging::log_failure(
                    component_for(err.stage()),
                    None,
                    &format!("stage '{}'", err.stage()),
                    FailureKind::Fatal,
                    &err,
                );
                self.stage = RunStage::Failed;
                Err(err)
            }
        }
    }

    fn run_stages(&mut self) -> Result<RunSummary, PipelineError> {
        self.stage = RunStage::Loading;
        let snapshot = self.source.latest()?;
        logging::info(Component::Snapshot, None, &format!("loading {}", snapshot.key));

        self.stage = RunStage::Normalizing;
        let readings = normalize::normalize(&snapshot.body, self.settings.district_suffix)?;
        logging::info(
            Component::Normalize,
            None,
            &format!("{} district readings normalized", readings.len()),
        );

        self.stage = RunStage::Evaluating;
        let alerts = self.settings.alert_policy.evaluate_all(&readings);

        self.stage = RunStage::Notifying;
        let (delivered, failed) = self.deliver(&alerts);

        self.stage = RunStage::Persisting;
        let persisted = self.persist(&readings)?;

        Ok(RunSummary {
            snapshot_key: snapshot.key,
            rows_normalized: readings.len(),
            rows_persisted: persisted,
            alerts_raised: alerts.len(),
            alerts_delivered: delivered,
            alerts_failed: failed,
        })
    }

    /// Sends every alert; a failed send is logged and counted, never raised.
    fn deliver(&self, alerts: &[AlertEvent]) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;
        for event in alerts {
            match self.notifier.notify(event) {
                Ok(()) => {
                    delivered += 1;
                    logging::info(
                        Component::Notify,
                        Some(&event.station_name),
                        &format!("alert sent (PM10 {})", event.pm10_value),
                    );
                }
                Err(err) => {
                    failed += 1;
                    logging::log_failure(
                        Component::Notify,
                        Some(&event.station_name),
                        "alert delivery",
                        FailureKind::NonFatal,
                        &err,
                    );
                }
            }
        }
        (delivered, failed)
    }

    fn persist(&mut self, readings: &[NormalizedReading]) -> Result<usize, PersistError> {
        let written = self.sink.append(readings)?;
        logging::info(Component::Database, None, &format!("{} rows appended", written));
        Ok(written)
    }
}

fn component_for(stage: RunStage) -> Component {
    match stage {
        RunStage::Loading => Component::Snapshot,
        RunStage::Normalizing => Component::Normalize,
        RunStage::Evaluating => Component::Alert,
        RunStage::Notifying => Component::Notify,
        RunStage::Persisting => Component::Database,
        RunStage::Idle | RunStage::Done | RunStage::Failed => Component::System,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
