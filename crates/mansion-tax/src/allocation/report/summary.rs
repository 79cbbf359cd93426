use super::super::engine::{AllocationResult, ConstituencyAllocation, InvariantCheck};
use super::super::issues::AllocationIssue;
use super::super::scenarios::{sensitivity_table, ScenarioProjection, SensitivityRow};
use super::views::{
    AllocationRecordView, AllocationReportSummary, CouncilRollupEntry, ExclusionView,
    InvariantCheckView, IssueView, NationalSummaryView, RevenueRecordView, RunStatus,
    ScenarioTotalView, TopConstituencyEntry,
};
use std::collections::{BTreeMap, HashMap};

/// Outcome of an accepted run: the allocation, every scenario priced over it,
/// and the issues recorded on the way.
#[derive(Debug, Clone)]
pub struct AllocationReport {
    pub result: AllocationResult,
    pub projections: Vec<ScenarioProjection>,
    pub issues: Vec<AllocationIssue>,
    pub transaction_discrepancy: Option<i128>,
    pub top_constituencies: usize,
}

impl AllocationReport {
    pub fn status(&self) -> RunStatus {
        if self.issues.is_empty() {
            RunStatus::Clean
        } else {
            RunStatus::WithCaveats
        }
    }

    pub fn projection(&self, scenario: &str) -> Option<&ScenarioProjection> {
        self.projections
            .iter()
            .find(|projection| projection.name() == scenario)
    }

    /// The first scenario; revenue rankings and roll-ups are priced with it.
    pub fn reference_projection(&self) -> Option<&ScenarioProjection> {
        self.projections.first()
    }

    pub fn sensitivity(&self) -> Vec<SensitivityRow> {
        sensitivity_table(&self.projections)
    }

    /// Restricts the report to one scenario, which becomes the reference.
    pub fn focus(mut self, scenario: &str) -> Option<Self> {
        let index = self
            .projections
            .iter()
            .position(|projection| projection.name() == scenario)?;
        let focused = self.projections.swap_remove(index);
        self.projections = vec![focused];
        Some(self)
    }

    pub fn with_top_constituencies(mut self, top: usize) -> Self {
        self.top_constituencies = top;
        self
    }

    pub fn summary(&self) -> AllocationReportSummary {
        let records = &self.result.records;
        let reference = self.reference_projection();
        let reference_revenue: HashMap<&str, f64> = reference
            .map(|projection| {
                projection
                    .estimates
                    .iter()
                    .map(|estimate| (estimate.constituency.key(), estimate.revenue))
                    .collect()
            })
            .unwrap_or_default();
        let revenue_of = |record: &ConstituencyAllocation| {
            reference_revenue
                .get(record.code.key())
                .copied()
                .unwrap_or_default()
        };

        let allocations = records.iter().map(allocation_view).collect();

        let names: HashMap<&str, &str> = records
            .iter()
            .map(|record| (record.code.key(), record.name.as_str()))
            .collect();
        let revenues = self
            .projections
            .iter()
            .flat_map(|projection| projection.estimates.iter())
            .map(|estimate| RevenueRecordView {
                constituency_code: estimate.constituency.to_string(),
                constituency_name: names
                    .get(estimate.constituency.key())
                    .map(|name| name.to_string())
                    .unwrap_or_default(),
                council_code: estimate.council.to_string(),
                scenario_name: estimate.scenario.clone(),
                revenue: estimate.revenue,
                bands: estimate.bands.clone(),
            })
            .collect();

        let mut rollup: BTreeMap<&str, CouncilRollupEntry> = BTreeMap::new();
        for record in records {
            let entry = rollup
                .entry(record.council.key())
                .or_insert_with(|| CouncilRollupEntry {
                    council_code: record.council.to_string(),
                    constituencies: 0,
                    council_share: record.council_share,
                    allocated_stock: 0.0,
                    allocated_transactions: 0.0,
                    reference_revenue: 0.0,
                });
            entry.constituencies += 1;
            entry.allocated_stock += record.allocated_stock;
            entry.allocated_transactions += record.allocated_transactions;
            entry.reference_revenue += revenue_of(record);
        }

        let mut ranked: Vec<&ConstituencyAllocation> = records.iter().collect();
        ranked.sort_by(|a, b| {
            revenue_of(b)
                .total_cmp(&revenue_of(a))
                .then_with(|| b.allocated_stock.total_cmp(&a.allocated_stock))
                .then_with(|| a.code.cmp(&b.code))
        });
        let top_constituencies = ranked
            .into_iter()
            .take(self.top_constituencies)
            .enumerate()
            .map(|(index, record)| TopConstituencyEntry {
                rank: index + 1,
                constituency_code: record.code.to_string(),
                constituency_name: record.name.clone(),
                council_code: record.council.to_string(),
                allocated_stock: record.allocated_stock,
                reference_revenue: revenue_of(record),
            })
            .collect();

        let status = self.status();
        AllocationReportSummary {
            status,
            status_label: status.label(),
            reference_scenario: reference.map(|projection| projection.name().to_string()),
            national: self.national_view(),
            allocations,
            revenues,
            sensitivity: self.sensitivity(),
            councils: rollup.into_values().collect(),
            top_constituencies,
            exclusions: ExclusionView {
                excluded_share: self.result.excluded_share,
                councils: self
                    .result
                    .excluded_councils
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                constituencies: self
                    .result
                    .excluded_constituencies
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            },
            issues: self.issues.iter().map(issue_view).collect(),
            invariant: invariant_view(&self.result.invariant),
        }
    }

    fn national_view(&self) -> NationalSummaryView {
        NationalSummaryView {
            total_stock: self.result.total_stock,
            transaction_total: self.result.transaction_total,
            internal_transaction_total: self.result.internal_transaction_total,
            published_transaction_total: self.result.published_transaction_total,
            transaction_discrepancy: self.transaction_discrepancy,
            national_average_ratio: self.result.national_average_ratio,
            constituencies: self.result.records.len(),
            scenarios: self
                .projections
                .iter()
                .map(|projection| ScenarioTotalView {
                    scenario: projection.scenario.name.clone(),
                    description: projection.scenario.description.clone(),
                    band_rates: projection.band_rates.clone(),
                    total_revenue: projection.total_revenue,
                    average_rate: projection.average_rate,
                })
                .collect(),
        }
    }
}

fn allocation_view(record: &ConstituencyAllocation) -> AllocationRecordView {
    AllocationRecordView {
        constituency_code: record.code.to_string(),
        constituency_name: record.name.clone(),
        council_code: record.council.to_string(),
        population: record.population,
        proxy_ratio: record.proxy_ratio,
        wealth_factor: record.wealth_factor,
        weighting_method: record.weighting_method,
        weighting_label: record.weighting_method.label(),
        intra_council_weight: record.intra_council_weight,
        council_share: record.council_share,
        share: record.share,
        share_pct: record.share * 100.0,
        allocated_stock: record.allocated_stock,
        allocated_transactions: record.allocated_transactions,
        band_stock: record.band_stock.clone(),
    }
}

fn issue_view(issue: &AllocationIssue) -> IssueView {
    IssueView {
        kind: issue.kind,
        kind_label: issue.kind.label(),
        severity: issue.severity,
        severity_label: issue.severity.label(),
        subject: issue.subject.clone(),
        detail: issue.detail.clone(),
    }
}

fn invariant_view(check: &InvariantCheck) -> InvariantCheckView {
    InvariantCheckView {
        share_sum: check.share_sum,
        share_deviation: check.share_deviation,
        allocated_stock: check.allocated_stock,
        stock_deviation: check.stock_deviation,
        tolerance: check.tolerance,
        passed: check.passed,
    }
}
