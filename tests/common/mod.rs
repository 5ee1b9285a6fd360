//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::{Days, NaiveDate, NaiveDateTime};

use campus_analytics::store::{ConsumptionRecord, Resource, SeriesPoint, TimeSeriesStore};
use campus_analytics::synthetic::SyntheticGenerator;

/// First day of every fixture series (a Monday).
pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
}

/// Timestamp `hours` after midnight of [`start_date`].
pub fn hour(hours: u64) -> NaiveDateTime {
    start_date()
        .and_hms_opt(0, 0, 0)
        .map(|t| t + chrono::Duration::hours(hours as i64))
        .expect("valid timestamp")
}

/// Midnight of day `day` after [`start_date`].
pub fn day(day: u64) -> NaiveDateTime {
    start_date()
        .checked_add_days(Days::new(day))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid timestamp")
}

/// Hourly points for one campus (or the total when `campus` is `None`).
pub fn hourly_points(campus: Option<&str>, values: &[f64]) -> Vec<SeriesPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| SeriesPoint::new(hour(i as u64), campus, *v))
        .collect()
}

/// Campus with constant daily electricity 100, gas 50 and water 30.
pub fn constant_campus_store(campus: &str, days: u64) -> TimeSeriesStore {
    let mut store = TimeSeriesStore::new();
    for (resource, value) in [
        (Resource::Electricity, 100.0),
        (Resource::Gas, 50.0),
        (Resource::Water, 30.0),
    ] {
        let records = (0..days)
            .map(|d| ConsumptionRecord::new(day(d), campus, value))
            .collect();
        store.extend(resource, records).expect("valid records");
    }
    store
}

/// Three-campus synthetic demo store, two weeks long.
pub fn demo_store() -> TimeSeriesStore {
    SyntheticGenerator::default()
        .generate(&["North", "South", "East"], 14, start_date(), 42)
        .expect("valid profiles")
}

/// Deterministic wavy series with a few spikes, for property tests.
pub fn wavy_values(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let base = 50.0 + 10.0 * ((i as f64) * 0.7).sin();
            if i % 17 == 11 { base * 3.0 } else { base }
        })
        .collect()
}
