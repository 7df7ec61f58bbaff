//! Core data types for the air-quality monitoring service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the raw snapshot item, the normalized row that gets persisted, the alert
//! event handed to notifiers, and the error type of each collaborator
//! boundary. It contains no logic and no I/O.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Station filtering
// ---------------------------------------------------------------------------

/// Trailing character marking a city district station ("구").
///
/// The provincial listing mixes district stations with roadside and
/// background stations; only names ending in this character are kept.
pub const DISTRICT_SUFFIX: char = '구';

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// One item of the `response.body.items` array of a raw snapshot.
///
/// Every field is optional at this layer. The provider serializes values as
/// text and uses `"-"` for an interval with no measurement; `null` and bare
/// JSON numbers are accepted as well. Any other item fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub data_time: Option<String>,
    #[serde(default)]
    pub pm10_value: Option<serde_json::Value>,
    #[serde(default)]
    pub pm25_value: Option<serde_json::Value>,
    #[serde(default)]
    pub o3_value: Option<serde_json::Value>,
}

/// A district station reading after sanitization.
///
/// All three values are finite. A value the provider did not measure is
/// stored as `0.0`, so "missing" and "measured zero" are indistinguishable
/// once a row reaches storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReading {
    pub station_name: String,
    pub data_time: String, // provider text, e.g. "2026-10-18 14:00"
    pub pm10_value: f64,   // µg/m³
    pub pm25_value: f64,   // µg/m³
    pub o3_value: f64,     // ppm
}

/// An alert decision for one reading. Delivered by a `Notifier`, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub station_name: String,
    pub pm10_value: f64,
    pub status: String,
}

/// One raw snapshot object as read from the snapshot store.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Store key, e.g. `raw/air_data_20261018_140512.json`.
    pub key: String,
    /// Undecoded JSON document.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Snapshot retrieval failures. Always fatal for a run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no snapshots found under {location}")]
    EmptyListing { location: String },
}

/// Structural problems with a raw document. Always fatal for a run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("snapshot is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("snapshot has no item list at {0}")]
    MissingItems(&'static str),
    #[error("snapshot item list is malformed: {0}")]
    MalformedItems(#[source] serde_json::Error),
}

/// Alert delivery failures. Logged by the pipeline, never fatal.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Storage failures. Fatal for a run.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("database {operation} failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: postgres::Error,
    },
    #[error("invalid table name {0:?}")]
    InvalidTable(String),
}

impl PersistError {
    pub(crate) fn db(operation: &'static str) -> impl FnOnce(postgres::Error) -> Self {
        move |source| PersistError::Database { operation, source }
    }
}

/// Failures while fetching a fresh snapshot from the provider.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("AIR_API_KEY is not set")]
    MissingApiKey,
    #[error("invalid provider endpoint {0}")]
    InvalidEndpoint(String),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response is not JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
    #[error("writing snapshot {path} failed: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
