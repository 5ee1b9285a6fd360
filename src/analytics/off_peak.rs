//! Off-peak usage audit against a global consumption quantile.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::config::{ConfigError, check_hours, check_unit_interval};
use crate::error::{AnalyticsError, Result, ensure_finite};
use crate::store::ConsumptionRecord;

use super::stats::quantile;

/// Mean flagged consumption for one hour of day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyAlert {
    pub hour: u32,
    pub mean_consumption: f64,
    pub count: usize,
}

impl fmt::Display for HourlyAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Check systems around {:02}:00, avg usage {:.1} units over {} readings. Possible leak or inefficiency.",
            self.hour, self.mean_consumption, self.count
        )
    }
}

/// Result of an off-peak audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffPeakAudit {
    /// Global quantile threshold; `None` when the series was empty.
    pub threshold: Option<f64>,
    /// Off-peak records above the threshold, in input order.
    pub flagged: Vec<ConsumptionRecord>,
    /// Flagged records grouped by hour, ascending.
    pub by_hour: Vec<HourlyAlert>,
}

impl OffPeakAudit {
    fn empty(threshold: Option<f64>) -> Self {
        Self {
            threshold,
            flagged: Vec::new(),
            by_hour: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }

    /// One recommendation line per flagged hour.
    pub fn recommendations(&self) -> Vec<String> {
        self.by_hour.iter().map(ToString::to_string).collect()
    }
}

/// Flags heavy consumption during configured off-peak hours.
///
/// The threshold is taken over the *entire* series, so off-peak readings are
/// compared against the global upper consumption regime rather than against
/// other off-peak readings.
#[derive(Debug, Default, Clone, Copy)]
pub struct OffPeakAuditor;

impl OffPeakAuditor {
    /// Audits `records` for off-peak readings above the `q` quantile.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `q` is outside `[0, 1]` or an hour
    /// is not in `0..=23`.
    pub fn audit<'a, I>(&self, records: I, off_peak_hours: &BTreeSet<u32>, q: f64) -> Result<OffPeakAudit>
    where
        I: IntoIterator<Item = &'a ConsumptionRecord>,
    {
        let mut errors: Vec<ConfigError> = Vec::new();
        check_hours(&mut errors, "off_peak_hours", off_peak_hours);
        check_unit_interval(&mut errors, "quantile", q);
        AnalyticsError::from_config_errors(errors)?;

        let records: Vec<&ConsumptionRecord> = records.into_iter().collect();
        let values: Vec<f64> = records.iter().map(|r| r.consumption).collect();
        let Some(threshold) = quantile(&values, q) else {
            return Ok(OffPeakAudit::empty(None));
        };
        let threshold = ensure_finite(threshold, "off-peak threshold")?;

        let flagged: Vec<ConsumptionRecord> = records
            .into_iter()
            .filter(|r| off_peak_hours.contains(&r.hour) && r.consumption > threshold)
            .cloned()
            .collect();

        let mut groups: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for r in &flagged {
            let entry = groups.entry(r.hour).or_default();
            entry.0 += r.consumption;
            entry.1 += 1;
        }
        let by_hour = groups
            .into_iter()
            .map(|(hour, (sum, count))| HourlyAlert {
                hour,
                mean_consumption: sum / count as f64,
                count,
            })
            .collect();

        tracing::debug!(threshold, flagged = flagged.len(), "off-peak audit complete");
        Ok(OffPeakAudit {
            threshold: Some(threshold),
            flagged,
            by_hour,
        })
    }
}
