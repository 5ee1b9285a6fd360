//! Forecasting seam for daily consumption.
//!
//! The fitting algorithm is opaque to the rest of the crate: callers talk to
//! a [`Forecaster`] and memoize results in a [`ForecastCache`] they own.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::analytics::aggregate::DailyTotal;
use crate::analytics::stats::population_std;
use crate::error::{AnalyticsError, Result};

/// One predicted day with a symmetric uncertainty band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A fit/predict forecasting service.
pub trait Forecaster {
    type Model;

    /// Fits a model to an ascending daily series.
    fn fit(&self, series: &[DailyTotal]) -> Result<Self::Model>;

    /// Predicts `horizon` days following the fitted series.
    fn predict(&self, model: &Self::Model, horizon: usize) -> Result<Vec<ForecastPoint>>;
}

/// "Same day last season" forecaster.
///
/// Repeats the last `period` observed days and widens each prediction by
/// 1.96 standard deviations of the seasonal differences.
#[derive(Debug, Clone, Copy)]
pub struct SeasonalNaive {
    pub period: usize,
}

impl Default for SeasonalNaive {
    fn default() -> Self {
        Self { period: 7 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalModel {
    last_date: Option<NaiveDate>,
    season: Vec<f64>,
    residual_std: f64,
}

const Z_95: f64 = 1.96;

impl Forecaster for SeasonalNaive {
    type Model = SeasonalModel;

    fn fit(&self, series: &[DailyTotal]) -> Result<SeasonalModel> {
        if self.period == 0 {
            return Err(AnalyticsError::config("forecast.period", "must be > 0"));
        }
        let values: Vec<f64> = series.iter().map(|d| d.total).collect();
        let start = values.len().saturating_sub(self.period);
        let diffs: Vec<f64> = values
            .iter()
            .skip(self.period)
            .zip(&values)
            .map(|(now, before)| now - before)
            .collect();

        Ok(SeasonalModel {
            last_date: series.last().map(|d| d.date),
            season: values[start..].to_vec(),
            residual_std: population_std(&diffs).unwrap_or(0.0),
        })
    }

    fn predict(&self, model: &SeasonalModel, horizon: usize) -> Result<Vec<ForecastPoint>> {
        let Some(last_date) = model.last_date else {
            return Ok(Vec::new());
        };
        let band = Z_95 * model.residual_std;

        let mut out = Vec::with_capacity(horizon);
        for (step, yhat) in model.season.iter().cycle().take(horizon).enumerate() {
            let date = last_date
                .checked_add_days(Days::new(step as u64 + 1))
                .ok_or_else(|| AnalyticsError::config("forecast.horizon", "date out of range"))?;
            out.push(ForecastPoint {
                date,
                yhat: *yhat,
                lower: yhat - band,
                upper: yhat + band,
            });
        }
        Ok(out)
    }
}

/// Hex-encoded SHA-256 over a daily series and a horizon.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(series: &[DailyTotal], horizon: usize) -> Self {
        let mut hasher = Sha256::new();
        for d in series {
            hasher.update(d.date.num_days_from_ce().to_le_bytes());
            hasher.update(d.total.to_bits().to_le_bytes());
        }
        hasher.update((horizon as u64).to_le_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Caller-owned memo of forecasts keyed by [`Fingerprint`].
#[derive(Debug)]
pub struct ForecastCache<F: Forecaster> {
    forecaster: F,
    entries: HashMap<Fingerprint, Vec<ForecastPoint>>,
    hits: usize,
    misses: usize,
}

impl<F: Forecaster> ForecastCache<F> {
    pub fn new(forecaster: F) -> Self {
        Self {
            forecaster,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the cached forecast for identical input, fitting on a miss.
    ///
    /// # Errors
    ///
    /// Propagates the forecaster's fit or predict error; failures are not
    /// cached.
    pub fn get_or_predict(&mut self, series: &[DailyTotal], horizon: usize) -> Result<Vec<ForecastPoint>> {
        match self.entries.entry(Fingerprint::of(series, horizon)) {
            Entry::Occupied(e) => {
                self.hits += 1;
                Ok(e.get().clone())
            }
            Entry::Vacant(e) => {
                self.misses += 1;
                tracing::debug!(fingerprint = e.key().as_str(), horizon, "forecast cache miss");
                let model = self.forecaster.fit(series)?;
                let points = self.forecaster.predict(&model, horizon)?;
                Ok(e.insert(points).clone())
            }
        }
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
