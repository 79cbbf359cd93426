//! Tabular CSV exports of an accepted run for downstream presentation.

use super::views::AllocationReportSummary;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ALLOCATIONS_FILE: &str = "allocations.csv";
pub const REVENUE_FILE: &str = "revenue.csv";
pub const SENSITIVITY_FILE: &str = "sensitivity.csv";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to prepare export directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Serialize)]
struct RevenueRow<'a> {
    constituency_code: &'a str,
    constituency_name: &'a str,
    council_code: &'a str,
    scenario: &'a str,
    revenue: f64,
}

/// Writes the allocation, revenue and sensitivity tables into `dir`, creating it if needed.
pub fn write_csv_exports(
    summary: &AllocationReportSummary,
    dir: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(3);
    for (file, write) in [
        (ALLOCATIONS_FILE, write_allocations as WriteTable),
        (REVENUE_FILE, write_revenue as WriteTable),
        (SENSITIVITY_FILE, write_sensitivity as WriteTable),
    ] {
        let path = dir.join(file);
        let fail = |source: csv::Error| ExportError::Csv {
            path: path.clone(),
            source,
        };
        let mut writer = csv::Writer::from_path(&path).map_err(fail)?;
        write(summary, &mut writer).map_err(fail)?;
        writer.flush().map_err(|err| fail(err.into()))?;
        written.push(path);
    }

    info!(dir = %dir.display(), files = written.len(), "csv exports written");
    Ok(written)
}

type WriteTable = fn(&AllocationReportSummary, &mut csv::Writer<fs::File>) -> Result<(), csv::Error>;

/// One row per constituency with a stock column for every band.
pub fn write_allocations<W: Write>(
    summary: &AllocationReportSummary,
    writer: &mut csv::Writer<W>,
) -> Result<(), csv::Error> {
    let band_names: Vec<&str> = summary
        .allocations
        .first()
        .map(|record| {
            record
                .band_stock
                .iter()
                .map(|band| band.band.as_str())
                .collect()
        })
        .unwrap_or_default();

    let mut header = vec![
        "constituency_code".to_string(),
        "constituency_name".to_string(),
        "council_code".to_string(),
        "population".to_string(),
        "share".to_string(),
        "allocated_stock".to_string(),
        "allocated_transactions".to_string(),
    ];
    header.extend(band_names.iter().map(|band| format!("stock_{}", column_suffix(band))));
    writer.write_record(&header)?;

    for record in &summary.allocations {
        let mut row = vec![
            record.constituency_code.clone(),
            record.constituency_name.clone(),
            record.council_code.clone(),
            record.population.to_string(),
            record.share.to_string(),
            record.allocated_stock.to_string(),
            record.allocated_transactions.to_string(),
        ];
        row.extend(record.band_stock.iter().map(|band| band.stock.to_string()));
        writer.write_record(&row)?;
    }
    Ok(())
}

pub fn write_revenue<W: Write>(
    summary: &AllocationReportSummary,
    writer: &mut csv::Writer<W>,
) -> Result<(), csv::Error> {
    for record in &summary.revenues {
        writer.serialize(RevenueRow {
            constituency_code: &record.constituency_code,
            constituency_name: &record.constituency_name,
            council_code: &record.council_code,
            scenario: &record.scenario_name,
            revenue: record.revenue,
        })?;
    }
    Ok(())
}

pub fn write_sensitivity<W: Write>(
    summary: &AllocationReportSummary,
    writer: &mut csv::Writer<W>,
) -> Result<(), csv::Error> {
    let band_names: Vec<&str> = summary
        .sensitivity
        .first()
        .map(|row| row.band_rates.iter().map(|rate| rate.band.as_str()).collect())
        .unwrap_or_default();

    let mut header = vec!["scenario".to_string()];
    header.extend(band_names.iter().map(|band| format!("rate_{}", column_suffix(band))));
    header.extend([
        "total_revenue".to_string(),
        "average_rate".to_string(),
        "revenue_change_pct".to_string(),
    ]);
    writer.write_record(&header)?;

    for row in &summary.sensitivity {
        let mut record = vec![row.scenario.clone()];
        record.extend(row.band_rates.iter().map(|rate| rate.rate.to_string()));
        record.extend([
            row.total_revenue.to_string(),
            row.average_rate.to_string(),
            row.revenue_change_pct.to_string(),
        ]);
        writer.write_record(&record)?;
    }
    Ok(())
}

/// `Band I` -> `band_i`.
fn column_suffix(band: &str) -> String {
    band.split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}
