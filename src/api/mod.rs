//! Read-only REST API over a loaded store.
//!
//! Endpoints:
//! - `/campuses`: campus ids with data
//! - `/anomalies/{resource}`: z-score or ratio report
//! - `/off-peak/{resource}`: off-peak audit
//! - `/impact/{campus}?policies=a,b`: policy impact and cost savings
//! - `/simulation/{campus}?policies=a,b`: Monte Carlo projection summary
//! - `/trends/{resource}`: recent, monthly, hourly and heatmap views
//! - `/compare/{campus}`: CO₂ savings of each policy on its own
//! - `/forecast/{campus}?horizon=n`: cached electricity forecast

mod handlers;
pub mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::routing::get;

use crate::config::AnalyticsConfig;
use crate::forecast::{ForecastCache, SeasonalNaive};
use crate::store::TimeSeriesStore;

/// State shared by every handler.
///
/// Built once after loading and wrapped in `Arc`. Store and configuration
/// are read-only; only the forecast cache is updated, behind its lock.
pub struct AppState {
    pub store: TimeSeriesStore,
    pub config: AnalyticsConfig,
    pub forecasts: Mutex<ForecastCache<SeasonalNaive>>,
}

impl AppState {
    pub fn new(
        store: TimeSeriesStore,
        config: AnalyticsConfig,
        forecasts: ForecastCache<SeasonalNaive>,
    ) -> Self {
        Self {
            store,
            config,
            forecasts: Mutex::new(forecasts),
        }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/campuses", get(handlers::get_campuses))
        .route("/anomalies/{resource}", get(handlers::get_anomalies))
        .route("/off-peak/{resource}", get(handlers::get_off_peak))
        .route("/impact/{campus}", get(handlers::get_impact))
        .route("/simulation/{campus}", get(handlers::get_simulation))
        .route("/trends/{resource}", get(handlers::get_trends))
        .route("/compare/{campus}", get(handlers::get_comparison))
        .route("/forecast/{campus}", get(handlers::get_forecast))
        .with_state(state)
}

/// Binds to `addr` and serves the API until the process stops.
///
/// # Errors
///
/// Returns the bind or accept-loop error.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, router(state)).await
}
