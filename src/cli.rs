//! Command-line argument parsing for the `campus-analytics` binary.

use std::env;
use std::path::PathBuf;

use crate::analytics::Policy;

/// Default number of synthetic days when no `--data-dir` is given.
pub const DEFAULT_DEMO_DAYS: u64 = 60;

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub preset: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub campus: Option<String>,
    pub policies: Vec<Policy>,
    pub seed: Option<u64>,
    pub days: u64,
    pub export_dir: Option<PathBuf>,
    pub json: bool,
    #[cfg(feature = "api")]
    pub serve: bool,
    #[cfg(feature = "api")]
    pub port: u16,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            config: None,
            preset: None,
            data_dir: None,
            campus: None,
            policies: Vec::new(),
            seed: None,
            days: DEFAULT_DEMO_DAYS,
            export_dir: None,
            json: false,
            #[cfg(feature = "api")]
            serve: false,
            #[cfg(feature = "api")]
            port: 3000,
        }
    }
}

/// What the binary should do.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Run(CliOptions),
    Help,
}

pub fn parse_args() -> Result<CliCommand, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

/// Parses arguments, excluding the program name.
///
/// # Errors
///
/// Returns a message naming the offending argument.
pub fn parse_args_from(args: Vec<String>) -> Result<CliCommand, String> {
    let mut opts = CliOptions::default();
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => return Ok(CliCommand::Help),
            "--config" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                if opts.config.replace(PathBuf::from(path)).is_some() {
                    return Err("--config provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--data-dir" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --data-dir (expected a directory)")?;
                opts.data_dir = Some(PathBuf::from(path));
            }
            "--campus" => {
                i += 1;
                let id = args.next_or_err(i, "missing value for --campus (expected a campus id)")?;
                opts.campus = Some(id.to_string());
            }
            "--policy" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --policy (expected a policy name)")?;
                let policy: Policy = name.parse().map_err(|e| format!("{e}"))?;
                if !opts.policies.contains(&policy) {
                    opts.policies.push(policy);
                }
            }
            "--seed" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let seed = raw
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{raw}\" is not a valid u64"))?;
                opts.seed = Some(seed);
            }
            "--days" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --days (expected a day count)")?;
                opts.days = raw
                    .parse::<u64>()
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or_else(|| format!("--days value \"{raw}\" is not a positive integer"))?;
            }
            "--export-dir" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --export-dir (expected a directory)")?;
                opts.export_dir = Some(PathBuf::from(path));
            }
            "--json" => opts.json = true,
            #[cfg(feature = "api")]
            "--serve" => opts.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                opts.port = raw
                    .parse::<u16>()
                    .map_err(|_| format!("--port value \"{raw}\" is not a valid u16"))?;
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.config.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--config` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    Ok(CliCommand::Run(opts))
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("campus-analytics: utility anomaly detection and policy impact projection");
    eprintln!();
    eprintln!("Usage: campus-analytics [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>        Load configuration from a TOML file");
    eprintln!("  --preset <name>        Use a built-in preset (baseline, high_variability, aggressive_policies)");
    eprintln!("  --data-dir <dir>       Read electricity.csv, gas.csv and water.csv from <dir>");
    eprintln!("  --days <n>             Days of synthetic demo data without --data-dir (default: {DEFAULT_DEMO_DAYS})");
    eprintln!("  --campus <id>          Campus for policy impact and projection (default: first)");
    eprintln!("  --policy <name>        Apply a policy; repeatable");
    eprintln!("  --seed <u64>           Override the simulation seed");
    eprintln!("  --export-dir <dir>     Write anomaly and simulation CSV files");
    eprintln!("  --json                 Print the report as JSON");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                Start the REST API after reporting");
        eprintln!("  --port <u16>           API server port (default: 3000)");
    }
    eprintln!("  --help                 Show this help message");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(list: &[&str]) -> CliOptions {
        match parse_args_from(args(list)).expect("parse should succeed") {
            CliCommand::Run(opts) => opts,
            CliCommand::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn defaults_without_arguments() {
        assert_eq!(run(&[]), CliOptions::default());
    }

    #[test]
    fn supports_config_cli() {
        let opts = run(&["--config", "analytics.toml"]);
        assert_eq!(opts.config.as_deref().and_then(|p| p.to_str()), Some("analytics.toml"));
        assert!(opts.preset.is_none());
    }

    #[test]
    fn collects_repeated_policies() {
        let opts = run(&["--policy", "solar_panels", "--policy", "reduce-heating", "--policy", "solar_panels"]);
        assert_eq!(opts.policies, vec![Policy::SolarPanels, Policy::ReduceHeating]);
    }

    #[test]
    fn parses_values() {
        let opts = run(&["--seed", "7", "--campus", "North", "--json", "--days", "3"]);
        assert_eq!(opts.seed, Some(7));
        assert_eq!(opts.campus.as_deref(), Some("North"));
        assert!(opts.json);
        assert_eq!(opts.days, 3);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args_from(args(&["--seed", "-1"])).is_err());
        assert!(parse_args_from(args(&["--policy", "wind"])).is_err());
        assert!(parse_args_from(args(&["--days", "0"])).is_err());
        assert!(parse_args_from(args(&["--config", "a.toml", "--preset", "baseline"])).is_err());
        assert!(parse_args_from(args(&["--preset"])).is_err());
        assert!(parse_args_from(args(&["--bogus"])).is_err());
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(parse_args_from(args(&["--json", "-h"])), Ok(CliCommand::Help));
    }
}
