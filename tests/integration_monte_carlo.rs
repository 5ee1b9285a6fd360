mod common;

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use campus_analytics::AnalyticsError;
use campus_analytics::analytics::{
    CancelFlag, MonteCarloProjector, Policy, SimulationParams, SimulationSummary,
};
use campus_analytics::config::AnalyticsConfig;

use common::demo_store;

fn params(config: &AnalyticsConfig) -> SimulationParams {
    let store = demo_store();
    SimulationParams::for_campus(&store.campus_snapshot("North"), config, &BTreeSet::new())
}

#[test]
fn seed_42_single_run_is_reproducible() {
    let mut config = AnalyticsConfig::baseline();
    config.simulation.years = 1;
    config.simulation.simulations = 1;
    let p = params(&config);

    let a = MonteCarloProjector.simulate(&p, &CancelFlag::new()).expect("valid params");
    let b = MonteCarloProjector.simulate(&p, &CancelFlag::new()).expect("valid params");
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].to_bits(), b[0].to_bits());
}

#[test]
fn every_preset_yields_finite_runs_of_requested_length() {
    for name in AnalyticsConfig::PRESETS {
        let mut config = AnalyticsConfig::from_preset(name).expect("known preset");
        config.simulation.simulations = 200;
        let runs = MonteCarloProjector
            .simulate(&params(&config), &CancelFlag::new())
            .expect("valid params");
        assert_eq!(runs.len(), 200, "preset {name}");
        assert!(runs.iter().all(|v| v.is_finite()), "preset {name}");
    }
}

#[test]
fn higher_variability_widens_the_spread() {
    let mut calm = AnalyticsConfig::baseline();
    calm.simulation.simulations = 500;
    let mut wild = AnalyticsConfig::high_variability();
    wild.simulation.simulations = 500;

    let calm_runs = MonteCarloProjector.simulate(&params(&calm), &CancelFlag::new()).expect("valid");
    let wild_runs = MonteCarloProjector.simulate(&params(&wild), &CancelFlag::new()).expect("valid");
    let calm_std = SimulationSummary::from_results(&calm_runs).map(|s| s.std);
    let wild_std = SimulationSummary::from_results(&wild_runs).map(|s| s.std);
    assert!(wild_std > calm_std);
}

#[test]
fn partitioned_run_matches_sequential_with_one_partition() {
    let mut config = AnalyticsConfig::baseline();
    config.simulation.simulations = 300;
    let p = params(&config);
    let seq = MonteCarloProjector.simulate(&p, &CancelFlag::new()).expect("valid");
    let one = MonteCarloProjector
        .simulate_partitioned(&p, 1, &CancelFlag::new())
        .expect("valid");
    let many = MonteCarloProjector
        .simulate_partitioned(&p, 8, &CancelFlag::new())
        .expect("valid");
    assert_eq!(seq, one);
    assert_eq!(many.len(), seq.len());

    // equal distributions, different draws
    let a = SimulationSummary::from_results(&seq).map(|s| s.mean).unwrap_or_default();
    let b = SimulationSummary::from_results(&many).map(|s| s.mean).unwrap_or_default();
    assert!((a - b).abs() / a < 0.01);
}

#[test]
fn policies_reduce_mean_projection() {
    let store = demo_store();
    let snapshot = store.campus_snapshot("East");
    let config = AnalyticsConfig::baseline();
    let all: BTreeSet<Policy> = Policy::ALL.into_iter().collect();

    let base = SimulationParams::for_campus(&snapshot, &config, &BTreeSet::new());
    let reduced = SimulationParams::for_campus(&snapshot, &config, &all);
    let base_runs = MonteCarloProjector.simulate(&base, &CancelFlag::new()).expect("valid");
    let reduced_runs = MonteCarloProjector.simulate(&reduced, &CancelFlag::new()).expect("valid");
    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    assert!(mean(&reduced_runs) < mean(&base_runs));
}

#[test]
fn cancellation_from_another_thread_stops_large_run() {
    let mut config = AnalyticsConfig::baseline();
    config.simulation.years = 1_000;
    config.simulation.simulations = 1_000_000;
    let p = params(&config);

    let cancel = CancelFlag::new();
    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        remote.cancel();
    });

    let result = MonteCarloProjector.simulate_partitioned(&p, 4, &cancel);
    canceller.join().expect("canceller thread");
    assert!(matches!(result, Err(AnalyticsError::Cancelled)));
}
