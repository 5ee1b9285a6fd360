mod common;

use std::collections::BTreeSet;

use campus_analytics::analytics::aggregate::co2_breakdown;
use campus_analytics::analytics::{Policy, PolicyEffects, PolicyImpactCalculator};
use campus_analytics::config::AnalyticsConfig;
use campus_analytics::store::ResourceTriple;

use common::{constant_campus_store, demo_store};

fn factors() -> ResourceTriple<f64> {
    ResourceTriple::new(0.233, 2.204, 0.0015)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn thirty_day_constant_campus_scenario() {
    let store = constant_campus_store("A", 30);
    let snapshot = store.campus_snapshot("A");
    assert_eq!(snapshot.totals, ResourceTriple::new(3000.0, 1500.0, 900.0));

    let calc = PolicyImpactCalculator;
    let effects = PolicyEffects::default();

    let none = calc
        .compute_impact(&snapshot, &BTreeSet::new(), &effects, &factors())
        .expect("valid config");
    assert!(close(none.total_co2, 4006.35));
    assert_eq!(none.co2_savings, 0.0);

    let solar: BTreeSet<Policy> = ["Solar Panels Installed".parse().expect("known label")]
        .into_iter()
        .collect();
    let impact = calc
        .compute_impact(&snapshot, &solar, &effects, &factors())
        .expect("valid config");
    assert!(close(impact.co2_savings, 139.8));
    assert!(close(impact.co2_after_policies, 3866.55));

    let breakdown = co2_breakdown(&store, &factors());
    assert!(close(breakdown[0].total, 4006.35));
}

#[test]
fn empty_selection_is_zero_for_every_campus() {
    let store = demo_store();
    for campus in store.campuses() {
        let impact = PolicyImpactCalculator
            .compute_impact(
                &store.campus_snapshot(&campus),
                &BTreeSet::new(),
                &PolicyEffects::default(),
                &factors(),
            )
            .expect("valid config");
        assert_eq!(impact.resource_savings, 0.0);
        assert_eq!(impact.co2_savings, 0.0);
    }
}

#[test]
fn impact_is_additive_over_disjoint_resources() {
    let store = demo_store();
    let snapshot = store.campus_snapshot("South");
    let calc = PolicyImpactCalculator;
    let effects = PolicyEffects::default();
    let single = |p: Policy| {
        calc.compute_impact(&snapshot, &[p].into_iter().collect(), &effects, &factors())
            .expect("valid config")
    };

    let disjoint = [Policy::ReduceHeating, Policy::EfficientWaterFixtures, Policy::SolarPanels];
    let all = calc
        .compute_impact(&snapshot, &disjoint.into_iter().collect(), &effects, &factors())
        .expect("valid config");
    let resource_sum: f64 = disjoint.iter().map(|p| single(*p).resource_savings).sum();
    let co2_sum: f64 = disjoint.iter().map(|p| single(*p).co2_savings).sum();
    assert!(close(all.resource_savings, resource_sum));
    assert!(close(all.co2_savings, co2_sum));
}

#[test]
fn aggressive_preset_saves_more_than_baseline_effects() {
    let store = demo_store();
    let snapshot = store.campus_snapshot("North");
    let policies: BTreeSet<Policy> = Policy::ALL.into_iter().collect();
    let calc = PolicyImpactCalculator;

    let baseline = AnalyticsConfig::baseline();
    let aggressive = AnalyticsConfig::aggressive_policies();
    let low = calc
        .compute_impact(&snapshot, &policies, &baseline.policies.effects, &baseline.emission_factors)
        .expect("valid config");
    let high = calc
        .compute_impact(&snapshot, &policies, &aggressive.policies.effects, &aggressive.emission_factors)
        .expect("valid config");
    assert!(high.co2_savings > low.co2_savings);

    let cost = calc
        .cost_savings(high.resource_savings, &aggressive.cost_factors)
        .expect("valid factors");
    assert!(cost.total > 0.0);
}

#[test]
fn invalid_effect_fraction_fails_before_computing() {
    let store = constant_campus_store("A", 1);
    let effects = PolicyEffects::default().with(Policy::ReduceHeating, -0.1);
    let err = PolicyImpactCalculator
        .compute_impact(
            &store.campus_snapshot("A"),
            &[Policy::ReduceHeating].into_iter().collect(),
            &effects,
            &factors(),
        )
        .expect_err("negative fraction");
    assert!(err.is_config());
    assert!(err.to_string().contains("policies.effects.reduce_heating"));
}
