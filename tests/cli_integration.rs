mod common;

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

use campus_analytics::io::export::export_records_csv;
use campus_analytics::store::Resource;

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_campus-analytics"))
        .args(args)
        .output()
        .expect("failed to run campus-analytics binary")
}

fn run_json(args: &[&str]) -> Value {
    let mut all = vec!["--json"];
    all.extend_from_slice(args);
    let output = run_cli(&all);
    assert!(
        output.status.success(),
        "command failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be a JSON report")
}

fn metric(stdout: &str, label: &str, unit: &str) -> f64 {
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with(label))
        .unwrap_or_else(|| panic!("missing line `{label}` in output: {stdout}"));
    let raw = line
        .split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_else(|| panic!("invalid format for line `{line}`"));
    let numeric = raw.strip_suffix(unit).unwrap_or(raw).trim();
    numeric
        .parse::<f64>()
        .unwrap_or_else(|_| panic!("failed parsing `{numeric}` from line `{line}`"))
}

#[test]
fn text_report_lists_campus_policy_and_projection() {
    let output = run_cli(&["--days", "7", "--policy", "solar_panels"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Campuses: East, North, South"));
    assert!(stdout.contains("--- Campus East ---"));
    assert!(stdout.contains("Solar Panels Installed"));
    assert!(stdout.contains("CO₂ Projection (1000 runs)"));
    assert!(stdout.contains("Policy comparison"));
    assert!(stdout.contains("Busiest hour:"));

    let total = metric(&stdout, "CO₂ total:", "kg");
    let after = metric(&stdout, "CO₂ after policies:", "kg");
    assert!(after < total);
}

#[test]
fn same_seed_gives_identical_json() {
    let a = run_json(&["--days", "5", "--seed", "9"]);
    let b = run_json(&["--days", "5", "--seed", "9"]);
    let c = run_json(&["--days", "5", "--seed", "10"]);
    assert_eq!(a, b);
    assert_ne!(a["campus"]["projection"], c["campus"]["projection"]);
}

#[test]
fn presets_change_policies_and_spread() {
    let baseline = run_json(&["--days", "5", "--preset", "baseline"]);
    let aggressive = run_json(&["--days", "5", "--preset", "aggressive_policies"]);
    let wild = run_json(&["--days", "5", "--preset", "high_variability"]);

    let savings = |v: &Value| v["campus"]["impact"]["co2_savings"].as_f64().unwrap_or_default();
    assert_eq!(savings(&baseline), 0.0);
    assert!(savings(&aggressive) > 0.0);
    assert_eq!(aggressive["campus"]["policies"].as_array().map(Vec::len), Some(4));

    let std = |v: &Value| v["campus"]["projection"]["std"].as_f64().unwrap_or_default();
    assert!(std(&wild) > std(&baseline));
}

#[test]
fn loads_csv_directory_and_exports_results() {
    let data = tempfile::tempdir().expect("tempdir");
    let store = common::demo_store();
    for resource in Resource::ALL {
        let path = data.path().join(format!("{}.csv", resource.as_str()));
        export_records_csv(store.records(resource), &path).expect("write fixture CSV");
    }
    let out = tempfile::tempdir().expect("tempdir");

    let report = run_json(&[
        "--data-dir",
        path_str(data.path()),
        "--campus",
        "South",
        "--export-dir",
        path_str(out.path()),
    ]);
    assert_eq!(report["campus"]["campus_id"], "South");
    assert_eq!(report["campuses"].as_array().map(Vec::len), Some(3));
    assert_eq!(
        report["resources"][0]["trends"]["recent"].as_array().map(Vec::len),
        Some(14)
    );

    let sim = fs::read_to_string(out.path().join("simulation.csv")).expect("simulation.csv");
    assert_eq!(sim.lines().count(), 1001);
    assert!(out.path().join("anomalies_gas_ratio.csv").exists());
    assert!(out.path().join("anomalies_water_z_score.csv").exists());
}

#[test]
fn toml_config_is_applied_and_validated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("good.toml");
    fs::write(&good, "[simulation]\nsimulations = 25\nyears = 2\n").expect("write config");
    let report = run_json(&["--days", "3", "--config", path_str(&good)]);
    assert_eq!(report["campus"]["projection"]["runs"], 25);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[simulation]\nyears = 0\n").expect("write config");
    let output = run_cli(&["--config", path_str(&bad)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("simulation.years"));
}

#[test]
fn rejects_unknown_preset_and_campus() {
    let output = run_cli(&["--preset", "nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown preset"));

    let output = run_cli(&["--days", "2", "--campus", "Atlantis"]);
    assert!(!output.status.success());
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}
