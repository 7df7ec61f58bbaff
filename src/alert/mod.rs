//! Alert decisions and delivery.
//!
//! Submodules:
//! - `thresholds`: decides whether a reading warrants an alert.
//! - `notify`: delivers alert events (webhook or log).

pub mod notify;
pub mod thresholds;

pub use notify::{LogNotifier, Notifier, SlackNotifier};
pub use thresholds::{AlertPolicy, evaluate};
