//! API response and query types.

use std::collections::BTreeSet;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::analytics::monte_carlo::HistogramBin;
use crate::analytics::{CostSavings, Policy, PolicyImpact, SimulationSummary};
use crate::error::AnalyticsError;
use crate::forecast::ForecastPoint;
use crate::store::{CampusId, ResourceTriple};

#[derive(Debug, Serialize)]
pub struct CampusesResponse {
    pub campuses: Vec<CampusId>,
}

/// `GET /anomalies/{resource}` query; omitted fields use the configuration.
#[derive(Debug, Default, Deserialize)]
pub struct AnomalyQuery {
    /// `z_score` (default) or `ratio`.
    pub method: Option<String>,
    pub window: Option<usize>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OffPeakQuery {
    pub quantile: Option<f64>,
}

/// Comma-separated policy keys or labels, e.g. `solar_panels,reduce_heating`.
#[derive(Debug, Default, Deserialize)]
pub struct PolicyQuery {
    pub policies: Option<String>,
}

impl PolicyQuery {
    /// Parsed policy set; empty or missing means none.
    pub fn parse(&self) -> Result<BTreeSet<Policy>, ApiError> {
        let Some(raw) = self.policies.as_deref() else {
            return Ok(BTreeSet::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Policy>().map_err(|e| ApiError::bad_request(e.to_string())))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub horizon: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub campus_id: CampusId,
    pub points: Vec<ForecastPoint>,
}

/// One row of the policy comparison chart.
#[derive(Debug, Serialize)]
pub struct PolicyComparisonRow {
    pub policy: Policy,
    pub label: &'static str,
    pub resource_savings: f64,
    pub co2_savings: f64,
}

#[derive(Debug, Serialize)]
pub struct ComparisonResponse {
    pub campus_id: CampusId,
    pub policies: Vec<PolicyComparisonRow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimulationQuery {
    pub policies: Option<String>,
    pub years: Option<usize>,
    pub simulations: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ImpactResponse {
    pub impact: PolicyImpact,
    pub cost: CostSavings,
    /// Resource savings split into display categories.
    pub display_split: ResourceTriple<f64>,
}

#[derive(Debug, Serialize)]
pub struct SimulationResponse {
    pub campus_id: CampusId,
    pub summary: Option<SimulationSummary>,
    pub histogram: Vec<HistogramBin>,
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        let status = match &err {
            e if e.is_config() => StatusCode::BAD_REQUEST,
            AnalyticsError::Data { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AnalyticsError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}
