//! AirKorea real-time measurement API client.
//!
//! Retrieves the current measurements for every station in one province
//! (시도) from the public data portal and writes the untouched JSON payload
//! to the snapshot store. Nothing here interprets the measurements; that is
//! the normalizer's job on the next pipeline run.
//!
//! API: https://www.data.go.kr/data/15073861/openapi.do
//! Operation: `getCtprvnRltmMesureDnsty` (시도별 실시간 측정정보 조회)

use crate::ingest::store::DirSnapshotStore;
use crate::logging::{self, Component};
use crate::model::CollectError;
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::Deserialize;

pub const AIRKOREA_ENDPOINT: &str =
    "http://apis.data.go.kr/B552584/ArpltnInforInqireSvc/getCtprvnRltmMesureDnsty";

// ============================================================================
// Request parameters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollectorSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_sido_name")]
    pub sido_name: String,
    #[serde(default = "default_num_of_rows")]
    pub num_of_rows: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    AIRKOREA_ENDPOINT.to_string()
}

fn default_sido_name() -> String {
    "서울".to_string()
}

fn default_num_of_rows() -> u32 {
    100 // Seoul has ~40 stations; one page covers them all
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            sido_name: default_sido_name(),
            num_of_rows: default_num_of_rows(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Portal keys are often issued URL-encoded; the request needs the raw key.
///
/// Plain percent-decoding: a literal `+` stays a `+`.
pub fn decode_service_key(key: &str) -> String {
    if !key.contains('%') {
        return key.to_string();
    }
    percent_decode_str(key).decode_utf8_lossy().into_owned()
}

/// Builds the full request URL (query parameters percent-encoded).
pub fn build_request_url(
    settings: &CollectorSettings,
    service_key: &str,
) -> Result<reqwest::Url, CollectError> {
    let params = [
        ("serviceKey", decode_service_key(service_key)),
        ("returnType", "json".to_string()),
        ("numOfRows", settings.num_of_rows.to_string()),
        ("pageNo", "1".to_string()),
        ("sidoName", settings.sido_name.clone()),
        ("ver", "1.0".to_string()),
    ];
    reqwest::Url::parse_with_params(&settings.endpoint, &params)
        .map_err(|e| CollectError::InvalidEndpoint(format!("{}: {}", settings.endpoint, e)))
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Fetches the current provincial payload and checks it is JSON.
///
/// The body is returned verbatim so the stored snapshot is byte-for-byte
/// what the provider sent.
pub fn fetch_snapshot(
    client: &reqwest::blocking::Client,
    settings: &CollectorSettings,
    service_key: &str,
) -> Result<String, CollectError> {
    let url = build_request_url(settings, service_key)?;

    let response = client.get(url).header("Accept", "application/json").send()?;
    let status = response.status();
    logging::debug(Component::Collector, None, &format!("response status: {}", status));

    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(CollectError::Status { status: status.as_u16(), body });
    }

    let body = response.text()?;
    serde_json::from_str::<serde_json::Value>(&body)?;
    Ok(body)
}

/// Fetches one snapshot and writes it to the store. Returns the new key.
pub fn collect(
    client: &reqwest::blocking::Client,
    settings: &CollectorSettings,
    service_key: Option<&str>,
    store: &DirSnapshotStore,
    now: DateTime<Utc>,
) -> Result<String, CollectError> {
    let service_key = service_key.ok_or(CollectError::MissingApiKey)?;
    let body = fetch_snapshot(client, settings, service_key)?;

    let key = store.put(&body, now).map_err(|source| CollectError::Store {
        path: store.root().join(store.key_for(now)),
        source,
    })?;
    logging::info(Component::Collector, None, &format!("snapshot stored: {}", key));
    Ok(key)
}

// ============================================================================
// Tests
// ============================================================================
