//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};

use super::AppState;
use super::types::{
    AnomalyQuery, ApiError, CampusesResponse, ComparisonResponse, ForecastQuery, ForecastResponse,
    ImpactResponse, OffPeakQuery, PolicyComparisonRow, PolicyQuery, SimulationQuery,
    SimulationResponse,
};
use crate::analytics::monte_carlo::histogram;
use crate::analytics::{
    AnomalyDetector, AnomalyReport, CancelFlag, MonteCarloProjector, OffPeakAudit, OffPeakAuditor,
    PolicyImpactCalculator, SimulationParams, SimulationSummary,
};
use crate::analytics::aggregate::daily_totals;
use crate::report::{FORECAST_HORIZON, ResourceTrends};
use crate::store::{CampusSnapshot, Resource};

/// Largest `simulations * years` a single request may ask for.
pub const MAX_SIMULATION_DRAWS: usize = 5_000 * 50;

/// Longest forecast a single request may ask for, in days.
pub const MAX_FORECAST_HORIZON: usize = 366;

const HISTOGRAM_BINS: usize = 20;

/// Raises its flag when dropped, so a simulation stops once its request
/// future is dropped by the server.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn resource(raw: &str) -> Result<Resource, ApiError> {
    raw.parse::<Resource>().map_err(|e| ApiError::bad_request(e.to_string()))
}

fn snapshot(state: &AppState, campus: &str) -> Result<CampusSnapshot, ApiError> {
    if !state.store.campuses().iter().any(|c| c == campus) {
        return Err(ApiError::not_found(format!("unknown campus \"{campus}\"")));
    }
    Ok(state.store.campus_snapshot(campus))
}

/// `GET /campuses` → 200 + campus ids
pub async fn get_campuses(State(state): State<Arc<AppState>>) -> Json<CampusesResponse> {
    Json(CampusesResponse {
        campuses: state.store.campuses(),
    })
}

/// `GET /anomalies/{resource}?method=ratio&window=7&threshold=1.5`
///
/// Unknown resource or method → 400.
pub async fn get_anomalies(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Query(query): Query<AnomalyQuery>,
) -> Result<Json<AnomalyReport>, ApiError> {
    let resource = resource(&raw)?;
    let a = &state.config.anomaly;
    let detector = AnomalyDetector;
    let report = match query.method.as_deref().unwrap_or("z_score") {
        "z_score" | "zscore" => detector.detect_total(
            &state.store,
            resource,
            query.window.unwrap_or(a.z_window),
            query.threshold.unwrap_or(a.z_threshold),
        )?,
        "ratio" => detector.detect_ratio_store(
            &state.store,
            resource,
            query.window.unwrap_or(a.ratio_window),
            query.threshold.unwrap_or(a.ratio_threshold),
        )?,
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown method \"{other}\", expected z_score or ratio"
            )));
        }
    };
    Ok(Json(report))
}

/// `GET /off-peak/{resource}?quantile=0.75`
pub async fn get_off_peak(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Query(query): Query<OffPeakQuery>,
) -> Result<Json<OffPeakAudit>, ApiError> {
    let resource = resource(&raw)?;
    let audit = OffPeakAuditor.audit(
        state.store.records(resource),
        &state.config.off_peak.hours,
        query.quantile.unwrap_or(state.config.off_peak.quantile),
    )?;
    Ok(Json(audit))
}

/// `GET /impact/{campus}?policies=solar_panels,reduce_heating`
///
/// Unknown campus → 404, unknown policy → 400.
pub async fn get_impact(
    State(state): State<Arc<AppState>>,
    Path(campus): Path<String>,
    Query(query): Query<PolicyQuery>,
) -> Result<Json<ImpactResponse>, ApiError> {
    let policies = query.parse()?;
    let snapshot = snapshot(&state, &campus)?;
    let calc = PolicyImpactCalculator;
    let impact = calc.compute_impact(
        &snapshot,
        &policies,
        &state.config.policies.effects,
        &state.config.emission_factors,
    )?;
    let cost = calc.cost_savings(impact.resource_savings, &state.config.cost_factors)?;
    Ok(Json(ImpactResponse {
        display_split: calc.display_split(impact.resource_savings),
        impact,
        cost,
    }))
}

/// `GET /simulation/{campus}?policies=..&years=..&simulations=..&seed=..`
///
/// Requests above [`MAX_SIMULATION_DRAWS`] → 400.
pub async fn get_simulation(
    State(state): State<Arc<AppState>>,
    Path(campus): Path<String>,
    Query(query): Query<SimulationQuery>,
) -> Result<Json<SimulationResponse>, ApiError> {
    let policies = PolicyQuery {
        policies: query.policies.clone(),
    }
    .parse()?;
    let snapshot = snapshot(&state, &campus)?;

    let mut params = SimulationParams::for_campus(&snapshot, &state.config, &policies);
    params.years = query.years.unwrap_or(params.years);
    params.simulations = query.simulations.unwrap_or(params.simulations);
    params.seed = query.seed.unwrap_or(params.seed);
    if params.years.saturating_mul(params.simulations) > MAX_SIMULATION_DRAWS {
        return Err(ApiError::bad_request(format!(
            "simulations * years must be <= {MAX_SIMULATION_DRAWS}"
        )));
    }

    let guard = CancelOnDrop(CancelFlag::new());
    let flag = guard.0.clone();
    let partitions = state.config.simulation.partitions;
    let runs = tokio::task::spawn_blocking(move || match partitions {
        0 | 1 => MonteCarloProjector.simulate(&params, &flag),
        n => MonteCarloProjector.simulate_partitioned(&params, n, &flag),
    })
    .await
    .map_err(|e| ApiError::internal(format!("simulation task failed: {e}")))??;
    Ok(Json(SimulationResponse {
        campus_id: campus,
        summary: SimulationSummary::from_results(&runs),
        histogram: histogram(&runs, HISTOGRAM_BINS),
    }))
}

/// `GET /trends/{resource}` → recent, per-campus, monthly, hourly and heatmap views
pub async fn get_trends(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<ResourceTrends>, ApiError> {
    let resource = resource(&raw)?;
    Ok(Json(ResourceTrends::build(&state.store.records(resource))))
}

/// `GET /compare/{campus}` → every policy applied on its own
pub async fn get_comparison(
    State(state): State<Arc<AppState>>,
    Path(campus): Path<String>,
) -> Result<Json<ComparisonResponse>, ApiError> {
    let snapshot = snapshot(&state, &campus)?;
    let rows = PolicyImpactCalculator
        .compare_policies(
            &snapshot,
            &state.config.policies.effects,
            &state.config.emission_factors,
        )?
        .into_iter()
        .map(|(policy, impact)| PolicyComparisonRow {
            policy,
            label: policy.label(),
            resource_savings: impact.resource_savings,
            co2_savings: impact.co2_savings,
        })
        .collect();
    Ok(Json(ComparisonResponse {
        campus_id: campus,
        policies: rows,
    }))
}

/// `GET /forecast/{campus}?horizon=..`
///
/// Daily electricity forecast, served from the shared cache when the
/// campus data and horizon were seen before.
pub async fn get_forecast(
    State(state): State<Arc<AppState>>,
    Path(campus): Path<String>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<ForecastResponse>, ApiError> {
    snapshot(&state, &campus)?;
    let horizon = query.horizon.unwrap_or(FORECAST_HORIZON);
    if horizon > MAX_FORECAST_HORIZON {
        return Err(ApiError::bad_request(format!(
            "horizon must be <= {MAX_FORECAST_HORIZON}"
        )));
    }
    let daily = daily_totals(state.store.series(Resource::Electricity, &campus));
    let points = state
        .forecasts
        .lock()
        .map_err(|_| ApiError::internal("forecast cache lock poisoned"))?
        .get_or_predict(&daily, horizon)?;
    Ok(Json(ForecastResponse {
        campus_id: campus,
        points,
    }))
}
