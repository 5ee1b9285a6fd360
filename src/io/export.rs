//! CSV export of readings, anomaly reports and simulation results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::analytics::AnomalyReport;
use crate::error::Result;
use crate::store::ConsumptionRecord;

/// Column header shared with [`crate::io::load::read_csv`].
pub const RECORD_HEADER: &str = "timestamp,campus_id,consumption";

const ANOMALY_HEADER: &str = "timestamp,campus_id,observed,baseline,score,method";

const SIMULATION_HEADER: &str = "run,co2_kg";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn create(path: &Path) -> Result<io::BufWriter<File>> {
    Ok(io::BufWriter::new(File::create(path)?))
}

/// Writes readings in the loader's layout.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_records_csv<'a, I>(records: I, writer: impl Write) -> Result<()>
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(RECORD_HEADER.split(','))?;
    for r in records {
        wtr.write_record([
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            r.campus_id.clone(),
            r.consumption.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports readings to a CSV file at `path`.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_records_csv<'a, I>(records: I, path: &Path) -> Result<()>
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    write_records_csv(records, create(path)?)
}

/// Writes one row per anomaly; the campus column is empty for totals.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_anomalies_csv(report: &AnomalyReport, writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(ANOMALY_HEADER.split(','))?;
    for a in &report.anomalies {
        wtr.write_record([
            a.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            a.campus_id.clone().unwrap_or_default(),
            format!("{:.4}", a.observed),
            format!("{:.4}", a.baseline),
            format!("{:.4}", a.score),
            a.method.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports an anomaly report to `path`.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_anomalies_csv(report: &AnomalyReport, path: &Path) -> Result<()> {
    write_anomalies_csv(report, create(path)?)
}

/// Writes one row per simulated trajectory.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_simulation_csv(results: &[f64], writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(SIMULATION_HEADER.split(','))?;
    for (run, co2) in results.iter().enumerate() {
        wtr.write_record([run.to_string(), format!("{co2:.4}")])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports simulation results to `path`.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_simulation_csv(results: &[f64], path: &Path) -> Result<()> {
    write_simulation_csv(results, create(path)?)
}
