//! Alert delivery channels.
//!
//! `SlackNotifier` posts an attachment-style message to an incoming webhook.
//! `LogNotifier` only writes the alert to the log and is used when no
//! webhook is configured.

use crate::logging::{self, Component};
use crate::model::{AlertEvent, NotifyError};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::time::Duration;

/// Something that can deliver an alert event.
pub trait Notifier {
    fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        (**self).notify(event)
    }
}

// ---------------------------------------------------------------------------
// Slack webhook
// ---------------------------------------------------------------------------

pub struct SlackNotifier {
    client: reqwest::blocking::Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, webhook_url: webhook_url.into() })
    }
}

impl Notifier for SlackNotifier {
    fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let payload = build_payload(event, Utc::now());

        let response = self
            .client
            .post(&self.webhook_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(NotifyError::Status { status: status.as_u16(), body });
        }
        Ok(())
    }
}

/// Builds the webhook body for one alert.
///
/// Field layout: district and concentration side by side, status on its own
/// line, unix timestamp of the send in `ts`.
pub fn build_payload(event: &AlertEvent, now: DateTime<Utc>) -> Value {
    json!({
        "attachments": [
            {
                "fallback": "대기질 비상 알림!",
                "color": "#990000",
                "pretext": "*서울시 대기질 비상 알림*",
                "fields": [
                    { "title": "지역", "value": event.station_name, "short": true },
                    {
                        "title": "미세먼지 농도",
                        "value": format!("{} µg/m³", event.pm10_value),
                        "short": true
                    },
                    { "title": "상태", "value": format!("*{}*", event.status), "short": false }
                ],
                "footer": "Air Quality Monitor",
                "ts": now.timestamp()
            }
        ]
    })
}

// ---------------------------------------------------------------------------
// Log-only
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        logging::warn(
            Component::Alert,
            Some(&event.station_name),
            &format!("PM10 {} µg/m³: {}", event.pm10_value, event.status),
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
