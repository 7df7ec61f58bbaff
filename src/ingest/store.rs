//! Snapshot object store.
//!
//! Raw provider payloads are written once under a time-stamped key and never
//! modified. The pipeline only ever asks for the most recently written one.
//! `DirSnapshotStore` keeps objects as files below a root directory, keyed
//! by their path relative to that root (`raw/air_data_20261018_140512.json`).

use crate::model::{LoadError, Snapshot};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Key prefix for raw provider snapshots.
pub const RAW_PREFIX: &str = "raw/";

/// Name prefix of in-progress writes; never listed.
const STAGING_PREFIX: &str = ".air_data_";

/// Source of raw snapshots for a pipeline run.
pub trait SnapshotSource {
    /// Returns the most recently written snapshot.
    fn latest(&self) -> Result<Snapshot, LoadError>;
}

#[derive(Debug, Clone)]
pub struct DirSnapshotStore {
    root: PathBuf,
    prefix: String,
}

impl DirSnapshotStore {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self { root: root.into(), prefix: prefix.into() }
    }

    /// Key a snapshot written at `now` is stored under.
    pub fn key_for(&self, now: DateTime<Utc>) -> String {
        format!("{}air_data_{}.json", self.prefix, now.format("%Y%m%d_%H%M%S"))
    }

    fn prefix_dir(&self) -> PathBuf {
        self.root.join(self.prefix.trim_end_matches('/'))
    }

    /// Writes `body` under a new time-stamped key and returns the key.
    ///
    /// The body is written to a hidden staging file in the same directory
    /// and linked onto the key only once complete, so a key never holds a
    /// partial object. Existing objects are never replaced; a second write
    /// in the same second fails with `AlreadyExists`.
    pub fn put(&self, body: &str, now: DateTime<Utc>) -> std::io::Result<String> {
        let key = self.key_for(now);
        let path = self.root.join(&key);
        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir)?;

        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".partial")
            .tempfile_in(dir)?;
        staged.write_all(body.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist_noclobber(&path).map_err(|e| e.error)?;
        Ok(key)
    }

    /// Lists keys under the prefix with their modification times. Hidden
    /// files (staging writes) are skipped.
    pub fn list(&self) -> Result<Vec<(String, SystemTime)>, LoadError> {
        let dir = self.prefix_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(LoadError::Io { path: dir, source }),
        };

        let mut objects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Io { path: dir.clone(), source })?;
            let path = entry.path();
            let metadata = entry
                .metadata()
                .map_err(|source| LoadError::Io { path: path.clone(), source })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !metadata.is_file() || name.starts_with('.') {
                continue;
            }
            let modified = metadata
                .modified()
                .map_err(|source| LoadError::Io { path: path.clone(), source })?;
            objects.push((format!("{}{}", self.prefix, name), modified));
        }
        Ok(objects)
    }

    pub fn get(&self, key: &str) -> Result<Snapshot, LoadError> {
        let path = self.root.join(key);
        let body =
            fs::read_to_string(&path).map_err(|source| LoadError::Io { path, source })?;
        Ok(Snapshot { key: key.to_string(), body })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SnapshotSource for DirSnapshotStore {
    fn latest(&self) -> Result<Snapshot, LoadError> {
        let newest = self
            .list()?
            .into_iter()
            .max_by(|(key_a, time_a), (key_b, time_b)| {
                time_a.cmp(time_b).then_with(|| key_a.cmp(key_b))
            })
            .ok_or_else(|| LoadError::EmptyListing {
                location: self.prefix_dir().display().to_string(),
            })?;
        self.get(&newest.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
