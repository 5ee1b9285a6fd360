//! End-to-end analytics report for one campus, as printed by the binary.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::analytics::aggregate::{
    DailyTotal, EfficiencyScore, HourlyMean, MonthlyTotal, PeakComparison, WeekdayHourHeatmap,
    daily_totals, efficiency_scores, hourly_mean, monthly_by_campus, peak_vs_off_peak,
    recent_daily_totals, totals_by_campus, weekday_hour_heatmap,
};
use crate::analytics::monte_carlo::{HistogramBin, histogram};
use crate::analytics::{
    AnomalyDetector, AnomalyReport, CancelFlag, CostSavings, MonteCarloProjector, OffPeakAudit,
    OffPeakAuditor, Policy, PolicyImpact, PolicyImpactCalculator, SimulationParams,
    SimulationSummary,
};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::forecast::{ForecastCache, ForecastPoint, SeasonalNaive};
use crate::store::{CampusId, ConsumptionRecord, Resource, TimeSeriesStore};

/// Days predicted by the electricity forecast.
pub const FORECAST_HORIZON: usize = 30;

/// Days covered by the recent-trend rows.
pub const RECENT_DAYS: u64 = 30;

const HISTOGRAM_BINS: usize = 20;

/// Descriptive trend views of one resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceTrends {
    /// Daily totals over the last [`RECENT_DAYS`] days of data.
    pub recent: Vec<DailyTotal>,
    pub by_campus: BTreeMap<CampusId, f64>,
    pub monthly: Vec<MonthlyTotal>,
    pub hourly: Vec<HourlyMean>,
    pub heatmap: WeekdayHourHeatmap,
}

impl ResourceTrends {
    pub fn build(records: &[&ConsumptionRecord]) -> Self {
        let iter = || records.iter().copied();
        Self {
            recent: recent_daily_totals(iter(), RECENT_DAYS),
            by_campus: totals_by_campus(iter()),
            monthly: monthly_by_campus(iter()),
            hourly: hourly_mean(iter()),
            heatmap: weekday_hour_heatmap(iter()),
        }
    }

    /// Hour of day with the highest mean consumption.
    pub fn busiest_hour(&self) -> Option<HourlyMean> {
        self.hourly
            .iter()
            .copied()
            .max_by(|a, b| a.mean.total_cmp(&b.mean))
    }
}

/// Detector output for one resource across all campuses.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSection {
    pub resource: Resource,
    pub total: f64,
    pub z_score: AnomalyReport,
    pub ratio: AnomalyReport,
    pub off_peak: OffPeakAudit,
    pub peak: PeakComparison,
    pub trends: ResourceTrends,
}

impl ResourceSection {
    /// Runs every detector over `resource`.
    ///
    /// # Errors
    ///
    /// Propagates detector configuration and numeric errors.
    pub fn build(store: &TimeSeriesStore, config: &AnalyticsConfig, resource: Resource) -> Result<Self> {
        let detector = AnomalyDetector;
        let a = &config.anomaly;
        let records = store.records(resource);
        Ok(Self {
            resource,
            total: records.iter().map(|r| r.consumption).sum(),
            z_score: detector.detect_total(store, resource, a.z_window, a.z_threshold)?,
            ratio: detector.detect_ratio_store(store, resource, a.ratio_window, a.ratio_threshold)?,
            off_peak: OffPeakAuditor.audit(
                records.iter().copied(),
                &config.off_peak.hours,
                config.off_peak.quantile,
            )?,
            peak: peak_vs_off_peak(records.iter().copied(), &config.off_peak.peak_hours),
            trends: ResourceTrends::build(&records),
        })
    }
}

/// Policy impact, cost and projection for the selected campus.
#[derive(Debug, Clone, Serialize)]
pub struct CampusSection {
    pub campus_id: CampusId,
    pub policies: Vec<Policy>,
    pub impact: PolicyImpact,
    /// CO₂ savings of each policy applied on its own.
    pub comparison: BTreeMap<Policy, f64>,
    pub cost: CostSavings,
    pub projection: Option<SimulationSummary>,
    pub histogram: Vec<HistogramBin>,
    /// Raw trajectory totals, exported to CSV but not serialized.
    #[serde(skip)]
    pub runs: Vec<f64>,
    pub forecast: Vec<ForecastPoint>,
}

impl CampusSection {
    /// Computes impact, cost savings, the Monte Carlo projection and the
    /// electricity forecast of `campus_id`. Forecasts go through `forecasts`
    /// so repeated builds over the same data reuse the fitted result.
    ///
    /// # Errors
    ///
    /// Configuration, numeric and cancellation errors from the calculators.
    pub fn build(
        store: &TimeSeriesStore,
        config: &AnalyticsConfig,
        campus_id: &str,
        policies: &BTreeSet<Policy>,
        cancel: &CancelFlag,
        forecasts: &mut ForecastCache<SeasonalNaive>,
    ) -> Result<Self> {
        let snapshot = store.campus_snapshot(campus_id);
        let calc = PolicyImpactCalculator;
        let impact = calc.compute_impact(
            &snapshot,
            policies,
            &config.policies.effects,
            &config.emission_factors,
        )?;
        let cost = calc.cost_savings(impact.resource_savings, &config.cost_factors)?;
        let comparison = calc
            .compare_policies(&snapshot, &config.policies.effects, &config.emission_factors)?
            .into_iter()
            .map(|(p, single)| (p, single.co2_savings))
            .collect();

        let params = SimulationParams::for_campus(&snapshot, config, policies);
        let runs = match config.simulation.partitions {
            0 | 1 => MonteCarloProjector.simulate(&params, cancel)?,
            n => MonteCarloProjector.simulate_partitioned(&params, n, cancel)?,
        };

        let daily = daily_totals(store.series(Resource::Electricity, campus_id));
        let forecast = forecasts.get_or_predict(&daily, FORECAST_HORIZON)?;

        Ok(Self {
            campus_id: campus_id.to_string(),
            policies: policies.iter().copied().collect(),
            projection: SimulationSummary::from_results(&runs),
            histogram: histogram(&runs, HISTOGRAM_BINS),
            impact,
            comparison,
            cost,
            runs,
            forecast,
        })
    }
}

/// Everything the binary prints for one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub campuses: Vec<CampusId>,
    pub resources: Vec<ResourceSection>,
    pub efficiency: Vec<EfficiencyScore>,
    pub campus: CampusSection,
}

impl AnalyticsReport {
    /// Builds the report for `campus_id`, or the first campus when `None`.
    ///
    /// # Errors
    ///
    /// Returns a data error for an unknown campus or an empty store, and
    /// propagates every calculator error.
    pub fn build(
        store: &TimeSeriesStore,
        config: &AnalyticsConfig,
        campus_id: Option<&str>,
        policies: &BTreeSet<Policy>,
        cancel: &CancelFlag,
        forecasts: &mut ForecastCache<SeasonalNaive>,
    ) -> Result<Self> {
        let campuses = store.campuses();
        let campus = match campus_id {
            Some(id) => campuses.iter().find(|c| c.as_str() == id),
            None => campuses.first(),
        }
        .ok_or_else(|| AnalyticsError::Data {
            campus_id: campus_id.unwrap_or("<none>").to_string(),
            timestamp: String::new(),
            reason: "campus has no readings".to_string(),
        })?
        .clone();

        let resources = Resource::ALL
            .into_iter()
            .map(|r| ResourceSection::build(store, config, r))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            efficiency: efficiency_scores(store, Resource::Electricity),
            campus: CampusSection::build(store, config, &campus, policies, cancel, forecasts)?,
            campuses,
            resources,
        })
    }
}

impl fmt::Display for ResourceSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.resource.unit();
        writeln!(f, "--- {} ---", self.resource)?;
        writeln!(f, "Total consumption:     {:.1} {unit}", self.total)?;
        writeln!(
            f,
            "Z-score anomalies:     {} (window {}, |z| > {})",
            self.z_score.len(),
            self.z_score.window,
            self.z_score.threshold
        )?;
        writeln!(
            f,
            "Ratio anomalies:       {} (window {}, > {}x average)",
            self.ratio.len(),
            self.ratio.window,
            self.ratio.threshold
        )?;
        match self.peak.ratio {
            Some(r) => writeln!(f, "Peak/off-peak ratio:   {r:.2}")?,
            None => writeln!(f, "Peak/off-peak ratio:   n/a")?,
        }
        match self.off_peak.threshold {
            Some(t) => writeln!(
                f,
                "Off-peak alerts:       {} readings above {t:.1} {unit}",
                self.off_peak.flagged.len()
            )?,
            None => writeln!(f, "Off-peak alerts:       no data")?,
        }
        for line in self.off_peak.recommendations() {
            writeln!(f, "  {line}")?;
        }
        if let Some(busiest) = self.trends.busiest_hour() {
            writeln!(
                f,
                "Busiest hour:          {:02}:00 ({:.1} {unit} avg)",
                busiest.hour, busiest.mean
            )?;
        }
        let recent: f64 = self.trends.recent.iter().map(|d| d.total).sum();
        writeln!(
            f,
            "Last {} days:          {recent:.1} {unit}",
            self.trends.recent.len()
        )?;
        for (campus, total) in &self.trends.by_campus {
            writeln!(f, "  {campus:<12} {total:>12.1} {unit}")?;
        }
        Ok(())
    }
}

impl fmt::Display for CampusSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Campus {} ---", self.campus_id)?;
        if self.policies.is_empty() {
            writeln!(f, "Policies:              none")?;
        }
        for p in &self.policies {
            writeln!(f, "Policy:                {p}")?;
        }
        let i = &self.impact;
        writeln!(f, "Resource savings:      {:.1} units", i.resource_savings)?;
        writeln!(f, "CO₂ total:             {:.2} kg", i.total_co2)?;
        writeln!(f, "CO₂ savings:           {:.2} kg", i.co2_savings)?;
        writeln!(f, "CO₂ after policies:    {:.2} kg", i.co2_after_policies)?;
        writeln!(f, "Cost savings:          {:.2}", self.cost.total)?;
        writeln!(f, "Policy comparison (CO₂ saved on its own):")?;
        for (p, saved) in &self.comparison {
            writeln!(f, "  {:<28} {saved:>10.2} kg", p.label())?;
        }
        if let Some(last) = self.forecast.last() {
            writeln!(
                f,
                "Electricity forecast:  {:.1} kWh/day on {} ({:.1} .. {:.1})",
                last.yhat, last.date, last.lower, last.upper
            )?;
        }
        match &self.projection {
            Some(summary) => write!(f, "\n{summary}"),
            None => write!(f, "\nNo projection runs."),
        }
    }
}

impl fmt::Display for AnalyticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Campuses: {}", self.campuses.join(", "))?;
        for section in &self.resources {
            writeln!(f, "\n{section}")?;
        }
        writeln!(f, "--- Electricity efficiency ---")?;
        for e in &self.efficiency {
            writeln!(f, "{:<12} {:>8.2} kWh avg  score {:.2}", e.campus_id, e.mean, e.score)?;
        }
        write!(f, "\n{}", self.campus)
    }
}
