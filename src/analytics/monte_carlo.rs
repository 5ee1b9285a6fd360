//! Seeded Monte Carlo projection of multi-year CO₂ emissions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{AnalyticsConfig, ConfigError, check_triple};
use crate::error::{AnalyticsError, Result, ensure_finite};
use crate::store::{CampusSnapshot, Resource, ResourceTriple};

use super::policy::{Policy, PolicyEffects};
use super::stats::{mean, population_std, quantile};

/// Cooperative cancellation token shared between a caller and a running
/// simulation.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; running simulations stop at the next year step.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Inputs of one projection run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    /// Yearly consumption per resource before perturbation.
    pub base: ResourceTriple<f64>,
    pub policies: BTreeSet<Policy>,
    pub effects: PolicyEffects,
    pub emission_factors: ResourceTriple<f64>,
    /// Standard deviation of the relative yearly perturbation per resource.
    pub variability: ResourceTriple<f64>,
    pub years: usize,
    pub simulations: usize,
    pub seed: u64,
}

impl SimulationParams {
    /// Parameters for one campus, using its mean consumption as the base.
    pub fn for_campus(
        snapshot: &CampusSnapshot,
        config: &AnalyticsConfig,
        policies: &BTreeSet<Policy>,
    ) -> Self {
        let s = &config.simulation;
        Self {
            base: snapshot.means(),
            policies: policies.clone(),
            effects: config.policies.effects.clone(),
            emission_factors: config.emission_factors,
            variability: s.variability,
            years: s.years,
            simulations: s.simulations,
            seed: s.seed,
        }
    }

    fn validate(&self) -> Result<()> {
        let mut errors: Vec<ConfigError> = Vec::new();
        if self.years == 0 {
            errors.push(ConfigError::new("simulation.years", "must be > 0"));
        }
        if self.simulations == 0 {
            errors.push(ConfigError::new("simulation.simulations", "must be > 0"));
        }
        check_triple(&mut errors, "simulation.base", &self.base);
        check_triple(&mut errors, "simulation.variability", &self.variability);
        check_triple(&mut errors, "emission_factors", &self.emission_factors);
        self.effects.validate_into(&mut errors);
        AnalyticsError::from_config_errors(errors)
    }
}

/// Runs independent CO₂ trajectories under random consumption variability.
///
/// Per trajectory and year, one `Normal(0, variability[r])` draw is taken for
/// electricity, gas and water in that order and applied as `base[r] * (1 + draw)`.
/// Active policies then scale their bound resource by `1 - fraction`, and the
/// three values are converted to CO₂ and summed. A trajectory's result is
/// the sum over all years.
///
/// Perturbed consumption is not clamped: extreme variability can drive a
/// yearly value negative, and that value is kept as drawn.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonteCarloProjector;

impl MonteCarloProjector {
    /// Sequential projection from a single generator seeded with `params.seed`.
    ///
    /// # Errors
    ///
    /// Configuration errors for zero years or simulations and negative
    /// variability or factors, [`AnalyticsError::Cancelled`] when `cancel`
    /// is raised mid-run, and [`AnalyticsError::NonFinite`] on overflow.
    pub fn simulate(&self, params: &SimulationParams, cancel: &CancelFlag) -> Result<Vec<f64>> {
        params.validate()?;
        tracing::info!(
            years = params.years,
            simulations = params.simulations,
            seed = params.seed,
            "running Monte Carlo projection"
        );
        run_chunk(params, params.simulations, params.seed, cancel)
    }

    /// Projection with the simulations axis split into `partitions`
    /// contiguous chunks run on the rayon pool.
    ///
    /// Chunk `k` draws from its own generator seeded with `seed + k`
    /// (wrapping), so output is reproducible for a fixed partition count.
    /// With one partition the output equals [`MonteCarloProjector::simulate`].
    ///
    /// # Errors
    ///
    /// Same as [`MonteCarloProjector::simulate`], plus a configuration error
    /// for zero partitions.
    pub fn simulate_partitioned(
        &self,
        params: &SimulationParams,
        partitions: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<f64>> {
        if partitions == 0 {
            return Err(AnalyticsError::config("simulation.partitions", "must be > 0"));
        }
        params.validate()?;
        tracing::info!(
            years = params.years,
            simulations = params.simulations,
            seed = params.seed,
            partitions,
            "running partitioned Monte Carlo projection"
        );

        let sizes = chunk_sizes(params.simulations, partitions);
        let chunks: Vec<Vec<f64>> = sizes
            .into_par_iter()
            .enumerate()
            .map(|(k, count)| run_chunk(params, count, params.seed.wrapping_add(k as u64), cancel))
            .collect::<Result<_>>()?;
        Ok(chunks.into_iter().flatten().collect())
    }
}

/// Splits `total` into `parts` contiguous sizes differing by at most one.
fn chunk_sizes(total: usize, parts: usize) -> Vec<usize> {
    let base = total / parts;
    let rem = total % parts;
    (0..parts).map(|k| base + usize::from(k < rem)).collect()
}

fn normal(params: &SimulationParams, resource: Resource) -> Result<Normal<f64>> {
    Normal::new(0.0, params.variability.get(resource)).map_err(|e| {
        AnalyticsError::config(format!("simulation.variability.{resource}"), e.to_string())
    })
}

fn run_chunk(
    params: &SimulationParams,
    count: usize,
    seed: u64,
    cancel: &CancelFlag,
) -> Result<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let draws = [
        (Resource::Electricity, normal(params, Resource::Electricity)?),
        (Resource::Gas, normal(params, Resource::Gas)?),
        (Resource::Water, normal(params, Resource::Water)?),
    ];
    let retained = params.effects.retained_share(&params.policies);

    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let mut trajectory = 0.0;
        for _ in 0..params.years {
            if cancel.is_cancelled() {
                tracing::warn!(completed = out.len(), "Monte Carlo projection cancelled");
                return Err(AnalyticsError::Cancelled);
            }
            for (resource, dist) in &draws {
                let perturbed = params.base.get(*resource) * (1.0 + dist.sample(&mut rng));
                trajectory +=
                    perturbed * retained.get(*resource) * params.emission_factors.get(*resource);
            }
        }
        out.push(ensure_finite(trajectory, "simulated CO2 trajectory")?);
    }
    Ok(out)
}

/// Distribution summary of simulated totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub runs: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
}

impl SimulationSummary {
    /// Summarizes `results`; `None` when empty.
    pub fn from_results(results: &[f64]) -> Option<Self> {
        let min = results.iter().copied().reduce(f64::min)?;
        let max = results.iter().copied().reduce(f64::max)?;
        Some(Self {
            runs: results.len(),
            mean: mean(results)?,
            std: population_std(results)?,
            min,
            p5: quantile(results, 0.05)?,
            p50: quantile(results, 0.50)?,
            p95: quantile(results, 0.95)?,
            max,
        })
    }
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- CO₂ Projection ({} runs) ---", self.runs)?;
        writeln!(f, "Mean:        {:.1} kg (std {:.1})", self.mean, self.std)?;
        writeln!(f, "Median:      {:.1} kg", self.p50)?;
        writeln!(f, "5th-95th:    {:.1} .. {:.1} kg", self.p5, self.p95)?;
        write!(f, "Range:       {:.1} .. {:.1} kg", self.min, self.max)
    }
}

/// One histogram bucket, `[lower, upper)` except the last which is closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram of `values` over their range.
///
/// Returns a single bin when every value is equal and nothing for empty
/// input or zero bins.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let (Some(lo), Some(hi)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }
    if hi <= lo {
        return vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: values.len(),
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: lo + width * (i + 1) as f64,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(years: usize, simulations: usize) -> SimulationParams {
        SimulationParams {
            base: ResourceTriple::new(100.0, 50.0, 30.0),
            policies: BTreeSet::new(),
            effects: PolicyEffects::default(),
            emission_factors: ResourceTriple::new(0.233, 2.204, 0.0015),
            variability: ResourceTriple::new(0.05, 0.05, 0.05),
            years,
            simulations,
            seed: 42,
        }
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let p = params(1, 1);
        let a = MonteCarloProjector.simulate(&p, &CancelFlag::new()).expect("valid params");
        let b = MonteCarloProjector.simulate(&p, &CancelFlag::new()).expect("valid params");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].to_bits(), b[0].to_bits());
    }

    #[test]
    fn output_length_matches_simulations() {
        let out = MonteCarloProjector
            .simulate(&params(5, 250), &CancelFlag::new())
            .expect("valid params");
        assert_eq!(out.len(), 250);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_variability_is_deterministic_total() {
        let mut p = params(3, 4);
        p.variability = ResourceTriple::new(0.0, 0.0, 0.0);
        p.policies = [Policy::SolarPanels].into_iter().collect();
        let out = MonteCarloProjector.simulate(&p, &CancelFlag::new()).expect("valid params");
        let yearly = 100.0 * 0.8 * 0.233 + 50.0 * 2.204 + 30.0 * 0.0015;
        for v in out {
            assert!((v - 3.0 * yearly).abs() < 1e-9);
        }
    }

    #[test]
    fn policies_lower_the_projection() {
        let base = MonteCarloProjector
            .simulate(&params(10, 100), &CancelFlag::new())
            .expect("valid params");
        let mut p = params(10, 100);
        p.policies = Policy::ALL.into_iter().collect();
        let reduced = MonteCarloProjector.simulate(&p, &CancelFlag::new()).expect("valid params");
        // same seed, same draws: every trajectory drops
        assert!(base.iter().zip(&reduced).all(|(b, r)| r < b));
    }

    #[test]
    fn single_partition_equals_sequential() {
        let p = params(4, 37);
        let seq = MonteCarloProjector.simulate(&p, &CancelFlag::new()).expect("valid params");
        let par = MonteCarloProjector
            .simulate_partitioned(&p, 1, &CancelFlag::new())
            .expect("valid params");
        assert_eq!(seq, par);
    }

    #[test]
    fn partitioned_run_is_reproducible() {
        let p = params(4, 101);
        let a = MonteCarloProjector
            .simulate_partitioned(&p, 4, &CancelFlag::new())
            .expect("valid params");
        let b = MonteCarloProjector
            .simulate_partitioned(&p, 4, &CancelFlag::new())
            .expect("valid params");
        assert_eq!(a.len(), 101);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_sizes_differ_by_at_most_one() {
        assert_eq!(chunk_sizes(10, 3), vec![4, 3, 3]);
        assert_eq!(chunk_sizes(2, 4), vec![1, 1, 0, 0]);
    }

    #[test]
    fn raised_flag_cancels() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = MonteCarloProjector.simulate(&params(10, 10), &cancel);
        assert!(matches!(err, Err(AnalyticsError::Cancelled)));
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(MonteCarloProjector.simulate(&params(0, 10), &CancelFlag::new()).is_err());
        assert!(MonteCarloProjector.simulate(&params(10, 0), &CancelFlag::new()).is_err());

        let mut p = params(1, 1);
        p.variability.gas = -0.1;
        let err = MonteCarloProjector.simulate(&p, &CancelFlag::new());
        assert!(matches!(err, Err(ref e) if e.is_config()));
        assert!(MonteCarloProjector.simulate_partitioned(&params(1, 1), 0, &CancelFlag::new()).is_err());
    }

    #[test]
    fn summary_and_histogram() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let s = SimulationSummary::from_results(&values).expect("non-empty");
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.p50, 3.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);
        assert!(SimulationSummary::from_results(&[]).is_none());

        let bins = histogram(&values, 2);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 5);
        assert_eq!(histogram(&[7.0, 7.0], 10).len(), 1);
    }
}
