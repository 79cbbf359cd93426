//! Geographic allocation of national high-value property totals.
//!
//! National figures are split down to constituencies in two levels: each
//! council receives its share of observed transactions, and each council's
//! share is divided among its constituencies by wealth-adjusted population.
//! The resulting allocation is priced under any number of rate scenarios.

mod council_shares;
mod domain;
mod engine;
mod error;
mod issues;
pub mod report;
mod run;
mod scenarios;
mod weights;

pub use council_shares::{CouncilShare, CouncilShareResolver, CouncilShares};
pub use domain::{
    Band, BandRate, ConcentrationProxy, Constituency, ConstituencyCode, CouncilCode,
    CouncilTransactionCount, NationalAggregate, RateScenario, SourceTables,
};
pub use engine::{
    AllocationEngine, AllocationResult, BandStock, ConstituencyAllocation, InvariantCheck,
    DEFAULT_TOLERANCE,
};
pub use error::{AllocationError, NormalizationError};
pub use issues::{AllocationIssue, IssueKind, IssueLog, IssueSeverity};
pub use report::AllocationReport;
pub use run::AllocationRun;
pub use scenarios::{
    sensitivity_table, BandRevenue, RevenueEstimate, ScenarioProjection, ScenarioProjector,
    SensitivityRow,
};
pub use weights::{
    ConstituencyWeight, CouncilWeights, WeightTable, WeightTableBuilder, WeightingMethod,
};
