//! Crate-wide error type.

use thiserror::Error;

use crate::config::ConfigError;

/// Crate result alias.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Failures surfaced by the analytics engine and its loaders.
///
/// "No data" is never an error: empty inputs produce empty reports. Callers
/// can therefore tell bad configuration, bad input rows, and internal numeric
/// failures apart from a legitimately empty result.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A parameter failed validation before any computation started.
    #[error("{0}")]
    Config(ConfigError),

    /// Several parameters failed validation at once.
    #[error("{} configuration errors{}", .0.len(), first_config_error(.0))]
    ConfigList(Vec<ConfigError>),

    /// An input record violates a store invariant.
    #[error("invalid record for {campus_id} at {timestamp}: {reason}")]
    Data {
        campus_id: String,
        timestamp: String,
        reason: String,
    },

    /// A computation produced NaN or infinity.
    #[error("non-finite value produced while computing {context}")]
    NonFinite { context: String },

    /// A cooperative cancellation request was observed.
    #[error("computation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for AnalyticsError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl AnalyticsError {
    /// Builds a configuration error for `field`.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config(ConfigError::new(field, message))
    }

    /// Turns a list of validation errors into `Ok(())` or a single error.
    pub fn from_config_errors(mut errors: Vec<ConfigError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(Self::Config(errors.remove(0))),
            _ => Err(Self::ConfigList(errors)),
        }
    }

    /// Returns true for either configuration variant.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::ConfigList(_))
    }
}

fn first_config_error(errors: &[ConfigError]) -> String {
    errors
        .first()
        .map(|e| format!(", first: {e}"))
        .unwrap_or_default()
}

/// Fails with [`AnalyticsError::NonFinite`] unless `value` is finite.
pub(crate) fn ensure_finite(value: f64, context: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalyticsError::NonFinite {
            context: context.to_string(),
        })
    }
}
