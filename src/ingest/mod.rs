//! Snapshot ingestion.
//!
//! Submodules:
//! - `airkorea`: fetches the provider payload and stores it as a snapshot.
//! - `store`: the time-stamped snapshot store the pipeline loads from.

pub mod airkorea;
pub mod store;

pub use store::{DirSnapshotStore, SnapshotSource, RAW_PREFIX};
