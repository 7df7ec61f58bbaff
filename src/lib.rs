//! Air-quality snapshot pipeline.
//!
//! Turns the most recent raw provider snapshot into graded, alert-checked
//! district readings and appends them to PostgreSQL.
//!
//! Module structure:
//! - `model`: shared types and boundary errors
//! - `grades`: pollutant grade policy (shared with the dashboard)
//! - `normalize`: raw snapshot → normalized rows
//! - `alert`: threshold decision and notifiers
//! - `ingest`: provider collector and snapshot store
//! - `db`: PostgreSQL storage
//! - `pipeline`: the run orchestrator
//! - `report`: dashboard read path
//! - `config`, `logging`: ambient infrastructure

pub mod alert;
pub mod config;
pub mod db;
pub mod grades;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod report;
