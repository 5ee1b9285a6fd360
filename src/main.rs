//! Campus analytics entry point: CLI wiring, data loading and reporting.

use std::collections::BTreeSet;
use std::fs;
use std::process;

use chrono::NaiveDate;

use campus_analytics::analytics::{CancelFlag, Policy};
use campus_analytics::cli::{self, CliCommand, CliOptions};
use campus_analytics::config::AnalyticsConfig;
use campus_analytics::error::{AnalyticsError, Result};
use campus_analytics::forecast::{ForecastCache, SeasonalNaive};
use campus_analytics::io::export::{export_anomalies_csv, export_simulation_csv};
use campus_analytics::io::load::load_dir;
use campus_analytics::logging;
use campus_analytics::report::AnalyticsReport;
use campus_analytics::store::TimeSeriesStore;
use campus_analytics::synthetic::SyntheticGenerator;

/// Campuses of the synthetic demo data set.
const DEMO_CAMPUSES: [&str; 3] = ["North", "South", "East"];

fn load_config(opts: &CliOptions) -> Result<AnalyticsConfig> {
    let mut config = if let Some(ref path) = opts.config {
        AnalyticsConfig::from_toml_file(path)?
    } else if let Some(ref name) = opts.preset {
        AnalyticsConfig::from_preset(name)?
    } else {
        AnalyticsConfig::baseline()
    };

    if let Some(seed) = opts.seed {
        config.simulation.seed = seed;
    }

    AnalyticsError::from_config_errors(config.validate())?;
    Ok(config)
}

fn load_store(opts: &CliOptions, config: &AnalyticsConfig) -> Result<TimeSeriesStore> {
    match opts.data_dir {
        Some(ref dir) => load_dir(dir),
        None => {
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN);
            SyntheticGenerator::default().generate(
                &DEMO_CAMPUSES,
                opts.days,
                start,
                config.simulation.seed,
            )
        }
    }
}

fn export(opts: &CliOptions, report: &AnalyticsReport) -> Result<()> {
    let Some(ref dir) = opts.export_dir else {
        return Ok(());
    };
    fs::create_dir_all(dir)?;
    for section in &report.resources {
        let r = section.resource;
        export_anomalies_csv(&section.z_score, &dir.join(format!("anomalies_{r}_z_score.csv")))?;
        export_anomalies_csv(&section.ratio, &dir.join(format!("anomalies_{r}_ratio.csv")))?;
    }
    export_simulation_csv(&report.campus.runs, &dir.join("simulation.csv"))?;
    tracing::info!(dir = %dir.display(), "exported CSV files");
    Ok(())
}

fn run(opts: &CliOptions) -> Result<()> {
    let config = load_config(opts)?;
    let store = load_store(opts, &config)?;

    let policies: BTreeSet<Policy> = if opts.policies.is_empty() {
        config.policies.selected.clone()
    } else {
        opts.policies.iter().copied().collect()
    };

    let mut forecasts = ForecastCache::new(SeasonalNaive::default());
    let report = AnalyticsReport::build(
        &store,
        &config,
        opts.campus.as_deref(),
        &policies,
        &CancelFlag::new(),
        &mut forecasts,
    )?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    export(opts, &report)?;

    #[cfg(feature = "api")]
    if opts.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(campus_analytics::api::AppState::new(store, config, forecasts));
        let addr = SocketAddr::from(([0, 0, 0, 0], opts.port));
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(campus_analytics::api::serve(state, addr))?;
    }

    Ok(())
}

fn main() {
    logging::init();

    let opts = match cli::parse_args() {
        Ok(CliCommand::Run(opts)) => opts,
        Ok(CliCommand::Help) => {
            cli::print_usage();
            process::exit(0);
        }
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = run(&opts) {
        if let AnalyticsError::ConfigList(ref errors) = e {
            for err in errors {
                eprintln!("{err}");
            }
        } else {
            eprintln!("error: {e}");
        }
        process::exit(1);
    }
}
