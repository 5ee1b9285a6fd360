//! Campus utility analytics: anomaly detection, off-peak audits, policy
//! impact and Monte Carlo CO₂ projection over electricity, gas and water
//! consumption.

pub mod analytics;
#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod forecast;
pub mod io;
pub mod logging;
pub mod report;
pub mod store;
pub mod synthetic;

pub use error::{AnalyticsError, Result};
