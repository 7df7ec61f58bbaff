//! Raw snapshot → normalized district readings.
//!
//! The provider document nests the station list at `response.body.items`.
//! Normalization keeps district stations only, projects each item to the
//! five persisted fields and coerces every measurement to a finite `f64`.
//!
//! # Sanitization
//! A value that does not parse as a finite decimal (the `"-"` sentinel, an
//! empty string, `null`, `"NaN"`) becomes `0.0`. This is lossy on purpose: a
//! station with an instrument gap reports as "zero" downstream.

use crate::model::{NormalizedReading, ParseError, RawReading};
use serde::Deserialize;
use serde_json::Value;

/// JSON pointer to the item list inside a snapshot document.
pub const ITEMS_POINTER: &str = "/response/body/items";

/// Parses a raw snapshot and returns its district readings in input order.
///
/// Fails only when the document itself is unusable; individual field
/// problems are absorbed by sanitization.
pub fn normalize(
    raw_document: &str,
    district_suffix: char,
) -> Result<Vec<NormalizedReading>, ParseError> {
    let document: Value = serde_json::from_str(raw_document).map_err(ParseError::InvalidJson)?;
    let items = extract_items(&document)?;
    Ok(normalize_items(items, district_suffix))
}

/// Pulls the typed item list out of a parsed document.
pub fn extract_items(document: &Value) -> Result<Vec<RawReading>, ParseError> {
    let items = document
        .pointer(ITEMS_POINTER)
        .ok_or(ParseError::MissingItems(ITEMS_POINTER))?;
    if !items.is_array() {
        return Err(ParseError::MissingItems(ITEMS_POINTER));
    }
    Vec::<RawReading>::deserialize(items).map_err(ParseError::MalformedItems)
}

/// Stable filter + projection. Never fails.
pub fn normalize_items(items: Vec<RawReading>, district_suffix: char) -> Vec<NormalizedReading> {
    items
        .into_iter()
        .filter_map(|item| {
            let station_name = item.station_name?;
            if !is_district_station(&station_name, district_suffix) {
                return None;
            }
            Some(NormalizedReading {
                station_name,
                data_time: item.data_time.unwrap_or_default(),
                pm10_value: sanitize(item.pm10_value.as_ref()),
                pm25_value: sanitize(item.pm25_value.as_ref()),
                o3_value: sanitize(item.o3_value.as_ref()),
            })
        })
        .collect()
}

pub fn is_district_station(station_name: &str, district_suffix: char) -> bool {
    station_name.ends_with(district_suffix)
}

/// Coerces one measurement field to a finite number, `0.0` on any failure.
pub fn sanitize(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(Value::Number(number)) => number.as_f64(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
