//! PM10 hazard threshold checking.
//!
//! One decision per reading, no memory between runs: a station that stays
//! above the threshold fires again on every run. Delivery is the notifier's
//! job and is never fed back into this decision.

use crate::grades::GradeLabel;
use crate::model::{AlertEvent, NormalizedReading};
use serde::Deserialize;

/// Lower bound of the "아주 나쁨" PM10 interval, in µg/m³.
pub const DEFAULT_PM10_ALERT_ABOVE: f64 = 150.0;

/// When to raise an alert and what status to attach.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertPolicy {
    /// An alert fires when PM10 is strictly greater than this value.
    #[serde(default = "default_pm10_above")]
    pub pm10_above: f64,
}

fn default_pm10_above() -> f64 {
    DEFAULT_PM10_ALERT_ABOVE
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self { pm10_above: DEFAULT_PM10_ALERT_ABOVE }
    }
}

impl AlertPolicy {
    /// Returns an alert if the reading's PM10 exceeds the threshold.
    ///
    /// The comparison is strict: a reading exactly at the threshold is graded
    /// "아주 나쁨" but does not alert.
    pub fn evaluate(&self, reading: &NormalizedReading) -> Option<AlertEvent> {
        if reading.pm10_value > self.pm10_above {
            Some(AlertEvent {
                station_name: reading.station_name.clone(),
                pm10_value: reading.pm10_value,
                status: GradeLabel::VeryBad.label().to_string(),
            })
        } else {
            None
        }
    }

    /// Evaluates every reading, keeping input order.
    pub fn evaluate_all(&self, readings: &[NormalizedReading]) -> Vec<AlertEvent> {
        readings.iter().filter_map(|r| self.evaluate(r)).collect()
    }
}

/// Evaluates with the default 150 µg/m³ threshold.
pub fn evaluate(reading: &NormalizedReading) -> Option<AlertEvent> {
    AlertPolicy::default().evaluate(reading)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
