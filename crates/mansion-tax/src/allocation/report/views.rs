use super::super::domain::BandRate;
use super::super::engine::BandStock;
use super::super::issues::{IssueKind, IssueSeverity};
use super::super::scenarios::{BandRevenue, SensitivityRow};
use super::super::weights::WeightingMethod;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Clean,
    WithCaveats,
}

impl RunStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Clean => "Clean",
            Self::WithCaveats => "Results with caveats",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationRecordView {
    pub constituency_code: String,
    pub constituency_name: String,
    pub council_code: String,
    pub population: u64,
    pub proxy_ratio: f64,
    pub wealth_factor: f64,
    pub weighting_method: WeightingMethod,
    pub weighting_label: &'static str,
    pub intra_council_weight: f64,
    pub council_share: f64,
    pub share: f64,
    pub share_pct: f64,
    pub allocated_stock: f64,
    pub allocated_transactions: f64,
    pub band_stock: Vec<BandStock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueRecordView {
    pub constituency_code: String,
    pub constituency_name: String,
    pub council_code: String,
    pub scenario_name: String,
    pub revenue: f64,
    pub bands: Vec<BandRevenue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioTotalView {
    pub scenario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub band_rates: Vec<BandRate>,
    pub total_revenue: f64,
    pub average_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NationalSummaryView {
    pub total_stock: u64,
    pub transaction_total: f64,
    pub internal_transaction_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_transaction_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_discrepancy: Option<i128>,
    pub national_average_ratio: f64,
    pub constituencies: usize,
    pub scenarios: Vec<ScenarioTotalView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CouncilRollupEntry {
    pub council_code: String,
    pub constituencies: usize,
    pub council_share: f64,
    pub allocated_stock: f64,
    pub allocated_transactions: f64,
    pub reference_revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopConstituencyEntry {
    pub rank: usize,
    pub constituency_code: String,
    pub constituency_name: String,
    pub council_code: String,
    pub allocated_stock: f64,
    pub reference_revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExclusionView {
    pub excluded_share: f64,
    pub councils: Vec<String>,
    pub constituencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueView {
    pub kind: IssueKind,
    pub kind_label: &'static str,
    pub severity: IssueSeverity,
    pub severity_label: &'static str,
    pub subject: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvariantCheckView {
    pub share_sum: f64,
    pub share_deviation: f64,
    pub allocated_stock: f64,
    pub stock_deviation: f64,
    pub tolerance: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationReportSummary {
    pub status: RunStatus,
    pub status_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_scenario: Option<String>,
    pub national: NationalSummaryView,
    pub allocations: Vec<AllocationRecordView>,
    pub revenues: Vec<RevenueRecordView>,
    pub sensitivity: Vec<SensitivityRow>,
    pub councils: Vec<CouncilRollupEntry>,
    pub top_constituencies: Vec<TopConstituencyEntry>,
    pub exclusions: ExclusionView,
    pub issues: Vec<IssueView>,
    pub invariant: InvariantCheckView,
}
