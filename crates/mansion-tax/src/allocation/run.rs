use super::council_shares::CouncilShareResolver;
use super::domain::SourceTables;
use super::engine::AllocationEngine;
use super::error::AllocationError;
use super::issues::IssueLog;
use super::report::AllocationReport;
use super::scenarios::ScenarioProjector;
use super::weights::WeightTableBuilder;
use crate::config::ModelParameters;
use tracing::info;

/// One end-to-end pass: weights, council shares, composition, then every scenario.
pub struct AllocationRun<'a> {
    tables: &'a SourceTables,
    params: &'a ModelParameters,
}

impl<'a> AllocationRun<'a> {
    pub fn new(tables: &'a SourceTables, params: &'a ModelParameters) -> Self {
        Self { tables, params }
    }

    pub fn execute(&self) -> Result<AllocationReport, AllocationError> {
        self.params.validate()?;
        let mut issues = IssueLog::default();

        let weights = WeightTableBuilder::new(&self.tables.constituencies, &self.tables.proxies)
            .with_national_average_ratio(self.params.national_average_ratio)
            .build(&mut issues);
        let shares = CouncilShareResolver::new()
            .with_published_total(self.params.published_transaction_total)
            .resolve(&self.tables.transactions, &mut issues)?;
        let result = AllocationEngine::new(self.params.tolerance).allocate(
            &weights,
            &shares,
            &self.params.national,
            &mut issues,
        )?;

        let projections =
            ScenarioProjector::new(&result).project_all(&self.params.effective_scenarios());

        info!(
            constituencies = result.records.len(),
            scenarios = projections.len(),
            issues = issues.issues().len(),
            share_sum = result.invariant.share_sum,
            "allocation run accepted"
        );

        Ok(AllocationReport {
            transaction_discrepancy: shares.discrepancy(),
            top_constituencies: self.params.top_constituencies,
            issues: issues.into_vec(),
            result,
            projections,
        })
    }
}
