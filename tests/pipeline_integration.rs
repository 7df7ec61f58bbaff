/// Integration tests for the snapshot → normalize → alert → persist run
///
/// These tests drive `PipelineRunner` end to end against a real snapshot
/// store in a temporary directory, with an in-memory sink and a recording
/// notifier standing in for PostgreSQL and the webhook.
///
/// No network or database access is needed.
///
/// Run with: cargo test --test pipeline_integration

use aqmon_service::alert::Notifier;
use aqmon_service::config::Config;
use aqmon_service::db::ReadingSink;
use aqmon_service::grades::{classify, GradeLabel, GradePolicy, Pollutant};
use aqmon_service::ingest::{DirSnapshotStore, SnapshotSource, RAW_PREFIX};
use aqmon_service::model::{AlertEvent, NormalizedReading, NotifyError, PersistError};
use aqmon_service::pipeline::{PipelineError, PipelineRunner, PipelineSettings, RunStage};

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SentAlerts(Rc<RefCell<Vec<AlertEvent>>>);

impl Notifier for SentAlerts {
    fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        self.0.borrow_mut().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemorySink {
    batches: Vec<Vec<NormalizedReading>>,
}

impl ReadingSink for MemorySink {
    fn append(&mut self, rows: &[NormalizedReading]) -> Result<usize, PersistError> {
        self.batches.push(rows.to_vec());
        Ok(rows.len())
    }
}

fn item(station: &str, pm10: &str, pm25: &str, o3: &str) -> Value {
    json!({
        "so2Grade": "1",
        "coFlag": null,
        "khaiValue": "54",
        "so2Value": "0.003",
        "coValue": "0.4",
        "pm10Flag": null,
        "o3Grade": "2",
        "pm10Value": pm10,
        "khaiGrade": "2",
        "pm25Value": pm25,
        "sidoName": "서울",
        "no2Flag": null,
        "no2Grade": "1",
        "o3Flag": null,
        "pm25Grade": "1",
        "so2Flag": null,
        "dataTime": "2026-10-18 14:00",
        "coGrade": "1",
        "no2Value": "0.021",
        "stationName": station,
        "pm10Grade": "2",
        "o3Value": o3
    })
}

fn provider_document(items: Vec<Value>) -> String {
    json!({
        "response": {
            "body": {
                "totalCount": items.len(),
                "items": items,
                "pageNo": 1,
                "numOfRows": 100
            },
            "header": { "resultMsg": "NORMAL_CODE", "resultCode": "00" }
        }
    })
    .to_string()
}

fn store_with(body: &str) -> (tempfile::TempDir, DirSnapshotStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = DirSnapshotStore::new(dir.path(), RAW_PREFIX);
    store
        .put(body, Utc.with_ymd_and_hms(2026, 10, 18, 5, 10, 0).unwrap())
        .expect("write snapshot");
    (dir, store)
}

// ---------------------------------------------------------------------------
// Concrete scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_sentinel_reading_is_normalized_graded_and_stored_without_alert() {
    let (_dir, store) = store_with(&provider_document(vec![item("강남구", "45", "-", "0.031")]));
    let alerts = SentAlerts::default();
    let mut runner =
        PipelineRunner::new(store, alerts.clone(), MemorySink::default(), PipelineSettings::default());

    let summary = runner.run().expect("run should succeed");
    assert_eq!(summary.rows_persisted, 1);
    assert!(alerts.0.borrow().is_empty());

    let (_, _, sink) = runner.into_parts();
    let row = &sink.batches[0][0];
    assert_eq!((row.pm10_value, row.pm25_value, row.o3_value), (45.0, 0.0, 0.031));
    assert_eq!(classify(Pollutant::Pm10, row.pm10_value).0, GradeLabel::Moderate);
}

#[test]
fn test_very_bad_pm10_fires_alert_with_korean_status() {
    let (_dir, store) = store_with(&provider_document(vec![item("종로구", "160", "70", "0.05")]));
    let alerts = SentAlerts::default();
    let mut runner =
        PipelineRunner::new(store, alerts.clone(), MemorySink::default(), PipelineSettings::default());

    runner.run().unwrap();
    let sent = alerts.0.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].station_name, "종로구");
    assert_eq!(sent[0].pm10_value, 160.0);
    assert_eq!(sent[0].status, "아주 나쁨");
    assert_eq!(classify(Pollutant::Pm10, 160.0).0, GradeLabel::VeryBad);
}

#[test]
fn test_boundary_pm10_is_very_bad_but_silent() {
    let (_dir, store) = store_with(&provider_document(vec![item("종로구", "150", "30", "0.05")]));
    let alerts = SentAlerts::default();
    let mut runner =
        PipelineRunner::new(store, alerts.clone(), MemorySink::default(), PipelineSettings::default());

    let summary = runner.run().unwrap();
    assert_eq!(summary.alerts_raised, 0);
    assert_eq!(classify(Pollutant::Pm10, 150.0).0, GradeLabel::VeryBad);
}

#[test]
fn test_ten_items_with_three_non_district_stations_store_seven_rows() {
    let names = [
        "중구", "한강대로", "종로구", "청계천로", "용산구",
        "광진구", "성동구", "강변북로", "중랑구", "동대문구",
    ];
    let items = names.iter().map(|n| item(n, "30", "15", "0.02")).collect();
    let (_dir, store) = store_with(&provider_document(items));
    let mut runner = PipelineRunner::new(
        store,
        SentAlerts::default(),
        MemorySink::default(),
        PipelineSettings::default(),
    );

    let summary = runner.run().unwrap();
    assert_eq!(summary.rows_normalized, 7);

    let (_, _, sink) = runner.into_parts();
    let stored: Vec<&str> = sink.batches[0].iter().map(|r| r.station_name.as_str()).collect();
    assert_eq!(stored, vec!["중구", "종로구", "용산구", "광진구", "성동구", "중랑구", "동대문구"]);
}

// ---------------------------------------------------------------------------
// Store behaviour seen from a run
// ---------------------------------------------------------------------------

#[test]
fn test_run_uses_most_recent_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirSnapshotStore::new(dir.path(), RAW_PREFIX);
    store
        .put(
            &provider_document(vec![item("종로구", "10", "5", "0.01")]),
            Utc.with_ymd_and_hms(2026, 10, 18, 4, 0, 0).unwrap(),
        )
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(50));
    let newest = store
        .put(
            &provider_document(vec![item("종로구", "200", "5", "0.01")]),
            Utc.with_ymd_and_hms(2026, 10, 18, 5, 0, 0).unwrap(),
        )
        .unwrap();

    assert_eq!(store.latest().unwrap().key, newest);

    let alerts = SentAlerts::default();
    let mut runner =
        PipelineRunner::new(store, alerts.clone(), MemorySink::default(), PipelineSettings::default());
    let summary = runner.run().unwrap();
    assert_eq!(summary.snapshot_key, newest);
    assert_eq!(alerts.0.borrow().len(), 1);
}

#[test]
fn test_empty_store_fails_at_loading() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirSnapshotStore::new(dir.path(), RAW_PREFIX);
    let mut runner = PipelineRunner::new(
        store,
        SentAlerts::default(),
        MemorySink::default(),
        PipelineSettings::default(),
    );

    let err = runner.run().unwrap_err();
    assert!(matches!(err, PipelineError::Load(_)));
    assert_eq!(runner.stage(), RunStage::Failed);
    let (_, _, sink) = runner.into_parts();
    assert!(sink.batches.is_empty());
}

#[test]
fn test_provider_error_payload_fails_at_normalizing() {
    // The portal answers quota/key errors with a header and no body.
    let body = json!({
        "response": { "header": { "resultCode": "22", "resultMsg": "LIMITED_NUMBER_OF_SERVICE_REQUESTS_EXCEEDS_ERROR" } }
    })
    .to_string();
    let (_dir, store) = store_with(&body);
    let mut runner = PipelineRunner::new(
        store,
        SentAlerts::default(),
        MemorySink::default(),
        PipelineSettings::default(),
    );

    let err = runner.run().unwrap_err();
    assert_eq!(err.stage(), RunStage::Normalizing);
}

// ---------------------------------------------------------------------------
// Shipped configuration
// ---------------------------------------------------------------------------

#[test]
fn test_shipped_config_loads_and_matches_defaults_for_policy() {
    let config = Config::load("config/aqmon.toml").expect("shipped config should parse");
    assert_eq!(config.normalize.district_suffix, '구');
    assert_eq!(config.alert.pm10_above, 150.0);
    assert_eq!(config.grade_policy().unwrap(), GradePolicy::STANDARD);
}
