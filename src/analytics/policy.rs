//! Deterministic per-policy impact model: resource, CO₂ and cost savings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, check_triple, check_unit_interval};
use crate::error::{AnalyticsError, Result, ensure_finite};
use crate::store::{CampusId, CampusSnapshot, Resource, ResourceTriple};

/// Consumption-reduction intervention.
///
/// Each variant is bound to exactly one resource and carries a default
/// effect fraction; see [`Policy::resource`] and [`Policy::default_fraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    ReduceHeating,
    EfficientWaterFixtures,
    SolarPanels,
    ShortenHours,
}

struct PolicyInfo {
    key: &'static str,
    label: &'static str,
    resource: Resource,
    default_fraction: f64,
}

const POLICY_INFO: [PolicyInfo; 4] = [
    PolicyInfo {
        key: "reduce_heating",
        label: "Reduce Heating by 10%",
        resource: Resource::Gas,
        default_fraction: 0.10,
    },
    PolicyInfo {
        key: "efficient_water_fixtures",
        label: "Efficient Water Fixtures",
        resource: Resource::Water,
        default_fraction: 0.15,
    },
    PolicyInfo {
        key: "solar_panels",
        label: "Solar Panels Installed",
        resource: Resource::Electricity,
        default_fraction: 0.20,
    },
    PolicyInfo {
        key: "shorten_hours",
        label: "Shorten Building Hours",
        resource: Resource::Electricity,
        default_fraction: 0.10,
    },
];

impl Policy {
    /// Every policy, in declaration order.
    pub const ALL: [Policy; 4] = [
        Policy::ReduceHeating,
        Policy::EfficientWaterFixtures,
        Policy::SolarPanels,
        Policy::ShortenHours,
    ];

    fn info(self) -> &'static PolicyInfo {
        &POLICY_INFO[self as usize]
    }

    /// Snake-case identifier used in TOML and on the command line.
    pub fn key(self) -> &'static str {
        self.info().key
    }

    /// Human-readable dashboard label.
    pub fn label(self) -> &'static str {
        self.info().label
    }

    /// Resource whose consumption this policy scales.
    pub fn resource(self) -> Resource {
        self.info().resource
    }

    /// Effect fraction used when the caller does not override it.
    pub fn default_fraction(self) -> f64 {
        self.info().default_fraction
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Policy {
    type Err = ConfigError;

    /// Accepts the snake-case key, its kebab-case form, or the label.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Policy::ALL
            .into_iter()
            .find(|p| p.key() == wanted || p.label().to_ascii_lowercase() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                let keys: Vec<&str> = Policy::ALL.iter().map(|p| p.key()).collect();
                ConfigError::new(
                    "policy",
                    format!("unknown policy \"{s}\", expected one of: {}", keys.join(", ")),
                )
            })
    }
}

/// Effect fraction per policy (0.0–1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyEffects {
    pub reduce_heating: f64,
    pub efficient_water_fixtures: f64,
    pub solar_panels: f64,
    pub shorten_hours: f64,
}

impl Default for PolicyEffects {
    fn default() -> Self {
        Self {
            reduce_heating: Policy::ReduceHeating.default_fraction(),
            efficient_water_fixtures: Policy::EfficientWaterFixtures.default_fraction(),
            solar_panels: Policy::SolarPanels.default_fraction(),
            shorten_hours: Policy::ShortenHours.default_fraction(),
        }
    }
}

impl PolicyEffects {
    /// Effect fraction configured for `policy`.
    pub fn fraction(&self, policy: Policy) -> f64 {
        match policy {
            Policy::ReduceHeating => self.reduce_heating,
            Policy::EfficientWaterFixtures => self.efficient_water_fixtures,
            Policy::SolarPanels => self.solar_panels,
            Policy::ShortenHours => self.shorten_hours,
        }
    }

    /// Returns a copy with `policy` set to `fraction`.
    pub fn with(mut self, policy: Policy, fraction: f64) -> Self {
        let slot = match policy {
            Policy::ReduceHeating => &mut self.reduce_heating,
            Policy::EfficientWaterFixtures => &mut self.efficient_water_fixtures,
            Policy::SolarPanels => &mut self.solar_panels,
            Policy::ShortenHours => &mut self.shorten_hours,
        };
        *slot = fraction;
        self
    }

    pub(crate) fn validate_into(&self, errors: &mut Vec<ConfigError>) {
        for p in Policy::ALL {
            check_unit_interval(errors, &format!("policies.effects.{}", p.key()), self.fraction(p));
        }
    }

    /// Multiplier applied to each resource when `policies` are active.
    ///
    /// Policies bound to the same resource compound multiplicatively.
    pub fn retained_share(&self, policies: &BTreeSet<Policy>) -> ResourceTriple<f64> {
        let mut share = ResourceTriple::new(1.0, 1.0, 1.0);
        for &p in policies {
            *share.get_mut(p.resource()) *= 1.0 - self.fraction(p);
        }
        share
    }
}

/// One policy's share of the savings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyContribution {
    pub resource: Resource,
    pub fraction: f64,
    /// Units of `resource` saved over the campus history.
    pub resource_savings: f64,
    /// kg CO₂ saved over the campus history.
    pub co2_savings: f64,
}

/// Savings estimate for one campus and one policy selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyImpact {
    pub campus_id: CampusId,
    /// Sum of per-policy resource savings (mixed units, as displayed).
    pub resource_savings: f64,
    pub co2_savings: f64,
    /// CO₂ of the unmodified history.
    pub total_co2: f64,
    /// `total_co2 - co2_savings`; not clamped.
    pub co2_after_policies: f64,
    pub per_policy: BTreeMap<Policy, PolicyContribution>,
}

/// Currency saved per resource cost factor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSavings {
    pub by_factor: ResourceTriple<f64>,
    pub total: f64,
}

/// Share of a savings figure shown per resource category (energy, gas, water).
pub const DISPLAY_SPLIT: ResourceTriple<f64> = ResourceTriple {
    electricity: 0.5,
    gas: 0.3,
    water: 0.2,
};

/// Linear, additive policy impact model.
///
/// Policies are independent: the impact of a selection is the sum of each
/// policy's impact on its own resource total, with no interaction or
/// double-counting correction.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyImpactCalculator;

impl PolicyImpactCalculator {
    /// Computes resource and CO₂ savings of `policies` for one campus.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an effect fraction is outside
    /// `[0, 1]` or an emission factor is negative, and
    /// [`AnalyticsError::NonFinite`] on overflow.
    pub fn compute_impact(
        &self,
        snapshot: &CampusSnapshot,
        policies: &BTreeSet<Policy>,
        effects: &PolicyEffects,
        emission_factors: &ResourceTriple<f64>,
    ) -> Result<PolicyImpact> {
        let mut errors = Vec::new();
        effects.validate_into(&mut errors);
        check_triple(&mut errors, "emission_factors", emission_factors);
        AnalyticsError::from_config_errors(errors)?;

        let totals = &snapshot.totals;
        let total_co2 = Resource::ALL
            .iter()
            .map(|&r| totals.get(r) * emission_factors.get(r))
            .sum::<f64>();

        let per_policy: BTreeMap<Policy, PolicyContribution> = policies
            .iter()
            .map(|&p| {
                let resource = p.resource();
                let fraction = effects.fraction(p);
                let contribution = PolicyContribution {
                    resource,
                    fraction,
                    resource_savings: fraction * totals.get(resource),
                    co2_savings: fraction * totals.get(resource) * emission_factors.get(resource),
                };
                (p, contribution)
            })
            .collect();

        let resource_savings = per_policy.values().map(|c| c.resource_savings).sum::<f64>();
        let co2_savings = per_policy.values().map(|c| c.co2_savings).sum::<f64>();

        Ok(PolicyImpact {
            campus_id: snapshot.campus_id.clone(),
            resource_savings: ensure_finite(resource_savings, "resource savings")?,
            co2_savings: ensure_finite(co2_savings, "CO2 savings")?,
            total_co2: ensure_finite(total_co2, "total CO2")?,
            co2_after_policies: ensure_finite(total_co2 - co2_savings, "CO2 after policies")?,
            per_policy,
        })
    }

    /// Impact of each policy applied on its own.
    ///
    /// # Errors
    ///
    /// Same as [`PolicyImpactCalculator::compute_impact`].
    pub fn compare_policies(
        &self,
        snapshot: &CampusSnapshot,
        effects: &PolicyEffects,
        emission_factors: &ResourceTriple<f64>,
    ) -> Result<Vec<(Policy, PolicyImpact)>> {
        Policy::ALL
            .into_iter()
            .map(|p| {
                let single: BTreeSet<Policy> = [p].into_iter().collect();
                self.compute_impact(snapshot, &single, effects, emission_factors)
                    .map(|impact| (p, impact))
            })
            .collect()
    }

    /// Converts a resource-savings figure into currency.
    ///
    /// The figure is passed linearly through every per-unit cost factor and
    /// the results summed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for negative cost factors.
    pub fn cost_savings(
        &self,
        resource_savings: f64,
        cost_factors: &ResourceTriple<f64>,
    ) -> Result<CostSavings> {
        let mut errors = Vec::new();
        check_triple(&mut errors, "cost_factors", cost_factors);
        AnalyticsError::from_config_errors(errors)?;

        let by_factor = ResourceTriple::from_fn(|r| resource_savings * cost_factors.get(r));
        Ok(CostSavings {
            total: ensure_finite(by_factor.total(), "cost savings")?,
            by_factor,
        })
    }

    /// Splits a savings figure into display categories using [`DISPLAY_SPLIT`].
    pub fn display_split(&self, savings: f64) -> ResourceTriple<f64> {
        ResourceTriple::from_fn(|r| savings * DISPLAY_SPLIT.get(r))
    }
}
