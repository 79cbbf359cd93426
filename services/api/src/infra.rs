use mansion_tax::allocation::BandRate;
use mansion_tax::config::ModelParameters;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) model: Arc<ModelParameters>,
    pub(crate) data_dir: Arc<PathBuf>,
}

/// Scenario rates priced against the whole national stock, before any allocation.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ScenarioCatalogEntry {
    pub(crate) name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    pub(crate) band_rates: Vec<BandRate>,
    pub(crate) national_revenue: f64,
    pub(crate) average_rate: f64,
}

pub(crate) fn scenario_catalog(params: &ModelParameters) -> Vec<ScenarioCatalogEntry> {
    let national = &params.national;
    params
        .effective_scenarios()
        .iter()
        .map(|scenario| ScenarioCatalogEntry {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            band_rates: scenario.resolved_rates(&national.bands),
            national_revenue: national.revenue_under(scenario),
            average_rate: national.average_rate_under(scenario),
        })
        .collect()
}

/// `18484410.4` -> `£18,484,410`.
pub(crate) fn format_gbp(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}£{}", group_thousands(value.abs().round() as u64))
}

pub(crate) fn format_count(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    let whole = rounded.trunc() as u64;
    let tenth = ((rounded - rounded.trunc()) * 10.0).round() as u64;
    format!("{}.{}", group_thousands(whole), tenth)
}

pub(crate) fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
