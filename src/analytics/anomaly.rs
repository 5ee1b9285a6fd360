//! Rolling-window anomaly detection (z-score and ratio-to-average).

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::{ConfigError, check_positive, check_window};
use crate::error::{AnalyticsError, Result, ensure_finite};
use crate::store::{CampusId, Resource, SeriesPoint, TimeSeriesStore};

use super::stats::{population_std, rolling_mean};

/// Policy that flagged a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMethod {
    /// Deviation from the rolling mean, normalized by the global std.
    ZScore,
    /// Observed value above a multiple of the rolling mean.
    Ratio,
}

impl fmt::Display for AnomalyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyMethod::ZScore => f.write_str("z_score"),
            AnomalyMethod::Ratio => f.write_str("ratio"),
        }
    }
}

/// One flagged point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub timestamp: NaiveDateTime,
    /// `None` when the scanned series aggregates several campuses.
    pub campus_id: Option<CampusId>,
    pub observed: f64,
    /// Rolling mean at this point.
    pub baseline: f64,
    /// Z-score, or `observed / baseline` for the ratio method.
    pub score: f64,
    pub method: AnomalyMethod,
}

/// Flagged points of one scan, ordered by timestamp then campus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub method: AnomalyMethod,
    pub window: usize,
    pub threshold: f64,
    pub anomalies: Vec<Anomaly>,
}

impl AnomalyReport {
    fn empty(method: AnomalyMethod, window: usize, threshold: f64) -> Self {
        Self {
            method,
            window,
            threshold,
            anomalies: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.anomalies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }

    fn sort(&mut self) {
        self.anomalies.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.campus_id.cmp(&b.campus_id))
        });
    }
}

/// Stateless rolling-window anomaly detector.
///
/// Both methods use a trailing window that ends at (and includes) the
/// evaluated point, so the first `window - 1` points of a series or campus
/// partition never have a baseline and are never flagged. Points whose score
/// cannot be evaluated (zero global std, zero rolling mean) are left out of
/// the report rather than counted as normal or anomalous.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnomalyDetector;

impl AnomalyDetector {
    /// Flags points whose z-score against the rolling mean exceeds `z_threshold`.
    ///
    /// The score is `(value - rolling_mean) / std` where `std` is the
    /// population standard deviation of the whole series. The rolling mean is
    /// kept per `campus_id` partition, in the order points are given.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `window` is zero or `z_threshold`
    /// is not positive, and [`AnalyticsError::NonFinite`] when the series
    /// holds non-finite values.
    pub fn detect(
        &self,
        series: &[SeriesPoint],
        window: usize,
        z_threshold: f64,
    ) -> Result<AnomalyReport> {
        validate(window, "window", z_threshold, "z_threshold")?;
        let mut report = AnomalyReport::empty(AnomalyMethod::ZScore, window, z_threshold);

        let values = finite_values(series, "z-score input")?;
        let Some(std) = population_std(&values) else {
            return Ok(report);
        };
        let std = ensure_finite(std, "series standard deviation")?;
        if std == 0.0 {
            tracing::debug!(points = values.len(), "constant series, z-score undefined");
            return Ok(report);
        }

        for points in partition_by_campus(series).values() {
            let values: Vec<f64> = points.iter().map(|p| p.value).collect();
            for (point, baseline) in points.iter().zip(rolling_mean(&values, window)) {
                let Some(baseline) = baseline else { continue };
                let score = ensure_finite((point.value - baseline) / std, "z-score")?;
                if score.abs() > z_threshold {
                    report.anomalies.push(Anomaly {
                        timestamp: point.timestamp,
                        campus_id: point.campus_id.clone(),
                        observed: point.value,
                        baseline,
                        score,
                        method: AnomalyMethod::ZScore,
                    });
                }
            }
        }

        report.sort();
        tracing::debug!(
            method = %report.method,
            points = values.len(),
            flagged = report.len(),
            "anomaly scan complete"
        );
        Ok(report)
    }

    /// Flags points above `ratio_threshold` times their rolling mean.
    ///
    /// The series is split by `campus_id` and each partition keeps its own
    /// rolling window, so campuses are never compared with each other.
    ///
    /// # Errors
    ///
    /// Same as [`AnomalyDetector::detect`].
    pub fn detect_ratio(
        &self,
        series: &[SeriesPoint],
        window: usize,
        ratio_threshold: f64,
    ) -> Result<AnomalyReport> {
        validate(window, "window", ratio_threshold, "ratio_threshold")?;
        let mut report = AnomalyReport::empty(AnomalyMethod::Ratio, window, ratio_threshold);

        let partitions = partition_by_campus(series);
        for points in partitions.values() {
            let mut values = Vec::with_capacity(points.len());
            for p in points {
                values.push(ensure_finite(p.value, "ratio input")?);
            }
            for (point, baseline) in points.iter().zip(rolling_mean(&values, window)) {
                let Some(baseline) = baseline else { continue };
                if baseline == 0.0 {
                    continue;
                }
                if point.value > ratio_threshold * baseline {
                    report.anomalies.push(Anomaly {
                        timestamp: point.timestamp,
                        campus_id: point.campus_id.clone(),
                        observed: point.value,
                        baseline,
                        score: ensure_finite(point.value / baseline, "ratio score")?,
                        method: AnomalyMethod::Ratio,
                    });
                }
            }
        }

        report.sort();
        tracing::debug!(
            method = %report.method,
            points = series.len(),
            partitions = partitions.len(),
            flagged = report.len(),
            "anomaly scan complete"
        );
        Ok(report)
    }

    /// Z-score scan over the per-timestamp total of `resource` across campuses.
    ///
    /// # Errors
    ///
    /// Same as [`AnomalyDetector::detect`].
    pub fn detect_total(
        &self,
        store: &TimeSeriesStore,
        resource: Resource,
        window: usize,
        z_threshold: f64,
    ) -> Result<AnomalyReport> {
        self.detect(&store.total_by_timestamp(resource), window, z_threshold)
    }

    /// Ratio scan over every campus partition of `resource`.
    ///
    /// # Errors
    ///
    /// Same as [`AnomalyDetector::detect_ratio`].
    pub fn detect_ratio_store(
        &self,
        store: &TimeSeriesStore,
        resource: Resource,
        window: usize,
        ratio_threshold: f64,
    ) -> Result<AnomalyReport> {
        let points: Vec<SeriesPoint> = store
            .partitions(resource)
            .flat_map(|(_, series)| series.iter().map(|r| r.to_point()))
            .collect();
        self.detect_ratio(&points, window, ratio_threshold)
    }
}

fn validate(window: usize, window_field: &str, threshold: f64, threshold_field: &str) -> Result<()> {
    let mut errors: Vec<ConfigError> = Vec::new();
    check_window(&mut errors, window_field, window);
    check_positive(&mut errors, threshold_field, threshold);
    AnalyticsError::from_config_errors(errors)
}

fn partition_by_campus(series: &[SeriesPoint]) -> BTreeMap<Option<&str>, Vec<&SeriesPoint>> {
    let mut partitions: BTreeMap<Option<&str>, Vec<&SeriesPoint>> = BTreeMap::new();
    for point in series {
        partitions
            .entry(point.campus_id.as_deref())
            .or_default()
            .push(point);
    }
    partitions
}

fn finite_values(series: &[SeriesPoint], context: &str) -> Result<Vec<f64>> {
    series
        .iter()
        .map(|p| ensure_finite(p.value, context))
        .collect()
}
