use crate::infra::{format_count, format_gbp, scenario_catalog};
use chrono::{DateTime, Utc};
use clap::Args;
use mansion_tax::allocation::report::views::AllocationReportSummary;
use mansion_tax::allocation::report::write_csv_exports;
use mansion_tax::allocation::{AllocationReport, AllocationRun, SourceTables};
use mansion_tax::config::{AppConfig, ModelParameters};
use mansion_tax::error::AppError;
use mansion_tax::sources::DatasetImporter;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Default)]
pub(crate) struct AllocateArgs {
    /// Directory holding constituencies.csv, concentration.csv and council_transactions.csv
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Model parameter JSON file (defaults to APP_MODEL_CONFIG or the built-in Scottish figures)
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
    /// Price only this scenario
    #[arg(long)]
    pub(crate) scenario: Option<String>,
    /// Number of constituencies to list in the revenue ranking
    #[arg(long)]
    pub(crate) top: Option<usize>,
    /// Print the full report as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
    /// Also write allocation, revenue and sensitivity tables as CSV into this directory
    #[arg(long)]
    pub(crate) export_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ScenariosArgs {
    /// Model parameter JSON file (defaults to APP_MODEL_CONFIG or the built-in Scottish figures)
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AllocationResponse {
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) data_source: String,
    pub(crate) report: AllocationReportSummary,
}

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let AllocateArgs {
        data_dir,
        model,
        scenario,
        top,
        json,
        export_dir,
    } = args;

    let config = AppConfig::load()?;
    let data_dir = data_dir.unwrap_or(config.data.data_dir.clone());
    let params = match model {
        Some(path) => ModelParameters::from_path(&path)?,
        None => config.data.model_parameters()?,
    };

    let tables = DatasetImporter::from_dir(&data_dir)?;
    let report = build_report(&tables, &params, scenario.as_deref(), top)?;
    let summary = report.summary();

    if json {
        let response = AllocationResponse {
            generated_at: Utc::now(),
            data_source: data_dir.display().to_string(),
            report: summary,
        };
        let body = serde_json::to_string_pretty(&response).map_err(std::io::Error::from)?;
        println!("{body}");
        if let Some(dir) = export_dir {
            write_csv_exports(&response.report, &dir)?;
        }
        return Ok(());
    }

    render_allocation_report(&summary, &data_dir);
    if let Some(dir) = export_dir {
        let written = write_csv_exports(&summary, &dir)?;
        println!("\nExported tables");
        for path in written {
            println!("- {}", path.display());
        }
    }

    Ok(())
}

pub(crate) fn run_scenarios(args: ScenariosArgs) -> Result<(), AppError> {
    let params = match args.model {
        Some(path) => ModelParameters::from_path(&path)?,
        None => AppConfig::load()?.data.model_parameters()?,
    };
    params.validate()?;

    println!(
        "Rate scenarios over a national stock of {} properties",
        format_count(params.national.total_stock as f64)
    );
    for band in &params.national.bands {
        println!(
            "- {}: {:.1}% of stock, default rate {}",
            band.name,
            band.stock_share * 100.0,
            format_gbp(band.rate)
        );
    }

    println!();
    for entry in scenario_catalog(&params) {
        let rates = entry
            .band_rates
            .iter()
            .map(|rate| format!("{} {}", rate.band, format_gbp(rate.rate)))
            .collect::<Vec<_>>()
            .join(", ");
        match &entry.description {
            Some(description) => println!("{} ({description})", entry.name),
            None => println!("{}", entry.name),
        }
        println!(
            "  {rates} -> {} nationally, average {} per property",
            format_gbp(entry.national_revenue),
            format_gbp(entry.average_rate)
        );
    }

    Ok(())
}

/// Runs the allocation and narrows the report to the requested scenario and ranking size.
pub(crate) fn build_report(
    tables: &SourceTables,
    params: &ModelParameters,
    scenario: Option<&str>,
    top: Option<usize>,
) -> Result<AllocationReport, AppError> {
    let mut report = AllocationRun::new(tables, params).execute()?;
    if let Some(name) = scenario {
        report = report
            .focus(name)
            .ok_or_else(|| AppError::UnknownScenario(name.to_string()))?;
    }
    if let Some(top) = top {
        report = report.with_top_constituencies(top);
    }
    Ok(report)
}

pub(crate) fn render_allocation_report(summary: &AllocationReportSummary, data_dir: &Path) {
    let national = &summary.national;

    println!("High-value property allocation");
    println!("Data source: {}", data_dir.display());
    println!("Status: {}", summary.status_label);
    println!(
        "National stock: {} properties across {} constituencies",
        format_count(national.total_stock as f64),
        national.constituencies
    );
    match (national.published_transaction_total, national.transaction_discrepancy) {
        (Some(published), Some(delta)) => println!(
            "Council transactions: {} (published national figure {}, difference {:+})",
            national.internal_transaction_total, published, delta
        ),
        _ => println!(
            "Council transactions: {}",
            national.internal_transaction_total
        ),
    }
    println!(
        "National average concentration ratio: {:.3}%",
        national.national_average_ratio * 100.0
    );

    println!("\nScenarios");
    for row in &summary.sensitivity {
        let rates = row
            .band_rates
            .iter()
            .map(|rate| format!("{} {}", rate.band, format_gbp(rate.rate)))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "- {}: {} -> {} total, {} average ({:+.1}%)",
            row.scenario,
            rates,
            format_gbp(row.total_revenue),
            format_gbp(row.average_rate),
            row.revenue_change_pct
        );
    }

    let reference = summary.reference_scenario.as_deref().unwrap_or("reference");
    println!("\nCouncil roll-up ({reference} rates)");
    for council in &summary.councils {
        println!(
            "- {}: {} constituencies, share {:.2}%, stock {}, revenue {}",
            council.council_code,
            council.constituencies,
            council.council_share * 100.0,
            format_count(council.allocated_stock),
            format_gbp(council.reference_revenue)
        );
    }

    println!(
        "\nTop {} constituencies by {reference} revenue",
        summary.top_constituencies.len()
    );
    for entry in &summary.top_constituencies {
        println!(
            "{:>3}. {} ({}, {}): stock {}, revenue {}",
            entry.rank,
            entry.constituency_name,
            entry.constituency_code,
            entry.council_code,
            format_count(entry.allocated_stock),
            format_gbp(entry.reference_revenue)
        );
    }

    let exclusions = &summary.exclusions;
    if exclusions.councils.is_empty() && exclusions.constituencies.is_empty() {
        println!("\nExclusions: none");
    } else {
        println!(
            "\nExclusions ({:.2}% of transactions renormalised away)",
            exclusions.excluded_share * 100.0
        );
        if !exclusions.councils.is_empty() {
            println!("- councils: {}", exclusions.councils.join(", "));
        }
        if !exclusions.constituencies.is_empty() {
            println!("- constituencies: {}", exclusions.constituencies.join(", "));
        }
    }

    if summary.issues.is_empty() {
        println!("\nIssues: none");
    } else {
        println!("\nIssues");
        for issue in &summary.issues {
            println!(
                "- [{}] {} ({}): {}",
                issue.severity_label, issue.kind_label, issue.subject, issue.detail
            );
        }
    }

    let invariant = &summary.invariant;
    println!(
        "\nInvariant check: share sum {:.9}, stock {} (deviation {:.1e}, tolerance {:.1e}) {}",
        invariant.share_sum,
        format_count(invariant.allocated_stock),
        invariant.share_deviation.max(invariant.stock_deviation),
        invariant.tolerance,
        if invariant.passed { "passed" } else { "failed" }
    );
}
