//! TOML-based analytics configuration and preset definitions.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::policy::{Policy, PolicyEffects};
use crate::store::{Resource, ResourceTriple};

/// Top-level analytics configuration parsed from TOML.
///
/// All fields have defaults matching the baseline preset. Load from TOML
/// with [`AnalyticsConfig::from_toml_file`] or use
/// [`AnalyticsConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Rolling-window anomaly detection parameters.
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    /// Off-peak audit and peak comparison parameters.
    #[serde(default)]
    pub off_peak: OffPeakConfig,
    /// Selected interventions and their effect fractions.
    #[serde(default)]
    pub policies: PolicyConfig,
    /// CO₂ emitted per unit consumed (kg/kWh, kg/m³, kg/L).
    #[serde(default = "default_emission_factors")]
    pub emission_factors: ResourceTriple<f64>,
    /// Currency per unit consumed.
    #[serde(default = "default_cost_factors")]
    pub cost_factors: ResourceTriple<f64>,
    /// Monte Carlo projection parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Rolling-window anomaly detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnomalyConfig {
    /// Window of the z-score rolling mean (points, must be > 0).
    pub z_window: usize,
    /// Absolute z-score above which a point is anomalous (must be > 0).
    pub z_threshold: f64,
    /// Window of the ratio-method rolling mean (points, must be > 0).
    pub ratio_window: usize,
    /// Multiple of the rolling mean above which a point is anomalous (must be > 0).
    pub ratio_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_window: 10,
            z_threshold: 2.0,
            ratio_window: 7,
            ratio_threshold: 1.5,
        }
    }
}

/// Off-peak audit and peak comparison parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OffPeakConfig {
    /// Hours of day treated as off-peak by the auditor.
    pub hours: BTreeSet<u32>,
    /// Global consumption quantile used as the alert threshold (0.0–1.0).
    pub quantile: f64,
    /// Hours of day treated as peak by the peak/off-peak comparison.
    pub peak_hours: BTreeSet<u32>,
}

impl Default for OffPeakConfig {
    fn default() -> Self {
        Self {
            hours: (0..=6).collect(),
            quantile: 0.75,
            peak_hours: (6..=9).chain(17..=21).collect(),
        }
    }
}

/// Selected interventions and their effect fractions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Interventions applied by default when the caller selects none.
    pub selected: BTreeSet<Policy>,
    /// Effect fraction per intervention.
    pub effects: PolicyEffects,
}

/// Monte Carlo projection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Projection horizon in years (must be > 0).
    pub years: usize,
    /// Number of simulated trajectories (must be > 0).
    pub simulations: usize,
    /// Master random seed.
    pub seed: u64,
    /// Worker partitions of the simulations axis (must be > 0).
    pub partitions: usize,
    /// Standard deviation of the yearly relative change per resource.
    pub variability: ResourceTriple<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            years: 10,
            simulations: 1000,
            seed: 42,
            partitions: 1,
            variability: ResourceTriple::new(0.05, 0.05, 0.05),
        }
    }
}

fn default_emission_factors() -> ResourceTriple<f64> {
    ResourceTriple::new(0.233, 2.204, 0.0015)
}

fn default_cost_factors() -> ResourceTriple<f64> {
    ResourceTriple::new(0.12, 0.08, 0.005)
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.years"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub(crate) fn check_window(errors: &mut Vec<ConfigError>, field: &str, window: usize) {
    if window == 0 {
        errors.push(ConfigError::new(field, "must be > 0"));
    }
}

pub(crate) fn check_positive(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(ConfigError::new(field, format!("must be finite and > 0, got {value}")));
    }
}

pub(crate) fn check_non_negative(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(value.is_finite() && value >= 0.0) {
        errors.push(ConfigError::new(field, format!("must be finite and >= 0, got {value}")));
    }
}

pub(crate) fn check_unit_interval(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::new(field, format!("must be in [0.0, 1.0], got {value}")));
    }
}

pub(crate) fn check_hours<'a>(
    errors: &mut Vec<ConfigError>,
    field: &str,
    hours: impl IntoIterator<Item = &'a u32>,
) {
    if let Some(bad) = hours.into_iter().find(|h| **h >= 24) {
        errors.push(ConfigError::new(field, format!("hour {bad} is not in 0..=23")));
    }
}

pub(crate) fn check_triple(
    errors: &mut Vec<ConfigError>,
    section: &str,
    triple: &ResourceTriple<f64>,
) {
    for r in Resource::ALL {
        check_non_negative(errors, &format!("{section}.{r}"), triple.get(r));
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self::baseline()
    }
}

impl AnalyticsConfig {
    /// Returns the baseline configuration (dashboard defaults).
    pub fn baseline() -> Self {
        Self {
            anomaly: AnomalyConfig::default(),
            off_peak: OffPeakConfig::default(),
            policies: PolicyConfig::default(),
            emission_factors: default_emission_factors(),
            cost_factors: default_cost_factors(),
            simulation: SimulationConfig::default(),
        }
    }

    /// Returns the high-variability preset: wider yearly swings, more trajectories.
    pub fn high_variability() -> Self {
        Self {
            simulation: SimulationConfig {
                simulations: 2000,
                variability: ResourceTriple::new(0.15, 0.20, 0.10),
                ..SimulationConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the aggressive-policies preset: every intervention at its upper setting.
    pub fn aggressive_policies() -> Self {
        Self {
            policies: PolicyConfig {
                selected: Policy::ALL.into_iter().collect(),
                effects: PolicyEffects {
                    reduce_heating: 0.20,
                    efficient_water_fixtures: 0.50,
                    solar_panels: 0.50,
                    shorten_hours: 0.50,
                },
            },
            simulation: SimulationConfig {
                years: 20,
                ..SimulationConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "high_variability", "aggressive_policies"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "high_variability" => Ok(Self::high_variability()),
            "aggressive_policies" => Ok(Self::aggressive_policies()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let a = &self.anomaly;
        check_window(&mut errors, "anomaly.z_window", a.z_window);
        check_positive(&mut errors, "anomaly.z_threshold", a.z_threshold);
        check_window(&mut errors, "anomaly.ratio_window", a.ratio_window);
        check_positive(&mut errors, "anomaly.ratio_threshold", a.ratio_threshold);

        let o = &self.off_peak;
        check_hours(&mut errors, "off_peak.hours", &o.hours);
        check_hours(&mut errors, "off_peak.peak_hours", &o.peak_hours);
        check_unit_interval(&mut errors, "off_peak.quantile", o.quantile);

        self.policies.effects.validate_into(&mut errors);
        check_triple(&mut errors, "emission_factors", &self.emission_factors);
        check_triple(&mut errors, "cost_factors", &self.cost_factors);

        let s = &self.simulation;
        if s.years == 0 {
            errors.push(ConfigError::new("simulation.years", "must be > 0"));
        }
        if s.simulations == 0 {
            errors.push(ConfigError::new("simulation.simulations", "must be > 0"));
        }
        if s.partitions == 0 {
            errors.push(ConfigError::new("simulation.partitions", "must be > 0"));
        }
        check_triple(&mut errors, "simulation.variability", &s.variability);

        errors
    }
}
