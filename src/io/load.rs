//! CSV loading of metered consumption.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::{AnalyticsError, Result};
use crate::store::{ConsumptionRecord, Resource, TimeSeriesStore};

/// Accepted timestamp layouts, tried in order.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Deserialize)]
struct Row {
    timestamp: String,
    campus_id: String,
    consumption: f64,
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Reads `timestamp,campus_id,consumption` rows from any reader.
///
/// # Errors
///
/// Returns [`AnalyticsError::Csv`] for malformed rows and
/// [`AnalyticsError::Data`] for unparseable timestamps.
pub fn read_csv(reader: impl Read) -> Result<Vec<ConsumptionRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for row in rdr.deserialize::<Row>() {
        let row = row?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| AnalyticsError::Data {
            campus_id: row.campus_id.clone(),
            timestamp: row.timestamp.clone(),
            reason: format!("timestamp must match one of {}", TIMESTAMP_FORMATS.join(" or ")),
        })?;
        records.push(ConsumptionRecord::new(timestamp, row.campus_id, row.consumption));
    }
    Ok(records)
}

/// Reads one resource file into a fresh store.
///
/// # Errors
///
/// I/O failures plus everything [`read_csv`] and
/// [`TimeSeriesStore::from_records`] reject.
pub fn load_csv(resource: Resource, path: &Path) -> Result<TimeSeriesStore> {
    let file = File::open(path)?;
    TimeSeriesStore::from_records(resource, read_csv(io::BufReader::new(file))?)
}

/// Loads `electricity.csv`, `gas.csv` and `water.csv` from `dir`.
///
/// A missing file leaves that resource empty.
///
/// # Errors
///
/// Same as [`load_csv`] for every file present.
pub fn load_dir(dir: &Path) -> Result<TimeSeriesStore> {
    let mut store = TimeSeriesStore::new();
    for resource in Resource::ALL {
        let path = dir.join(format!("{}.csv", resource.as_str()));
        if !path.exists() {
            tracing::warn!(path = %path.display(), "no data file for resource");
            continue;
        }
        let file = File::open(&path)?;
        let records = read_csv(io::BufReader::new(file))?;
        tracing::debug!(%resource, rows = records.len(), "loaded CSV");
        store.extend(resource, records)?;
    }
    Ok(store)
}
