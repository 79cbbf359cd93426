use super::domain::CouncilCode;
use crate::config::ModelConfigError;

/// Whole-run invariant violations. The inputs must be fixed upstream; there is no retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("council transaction counts sum to zero, so no council share can be computed")]
    NoTransactions,
    #[error("council transaction counts overflow a 64-bit total")]
    TransactionTotalOverflow,
    #[error("no council with both constituencies and transactions remains after exclusions")]
    NothingToAllocate,
    #[error(
        "intra-council weights for {council} sum to {sum} (deviation {deviation:e}, tolerance {tolerance:e})"
    )]
    CouncilWeightSum {
        council: CouncilCode,
        sum: f64,
        deviation: f64,
        tolerance: f64,
    },
    #[error(
        "constituency shares sum to {sum} (deviation {deviation:e}, tolerance {tolerance:e})"
    )]
    ShareSum {
        sum: f64,
        deviation: f64,
        tolerance: f64,
    },
    #[error(
        "allocated stock sums to {allocated} against a national stock of {expected} (deviation {deviation:e}, tolerance {tolerance:e})"
    )]
    StockConservation {
        allocated: f64,
        expected: f64,
        deviation: f64,
        tolerance: f64,
    },
}

impl NormalizationError {
    /// Stable name of the invariant that failed.
    pub const fn invariant(&self) -> &'static str {
        match self {
            Self::NoTransactions => "council_transactions_nonzero",
            Self::TransactionTotalOverflow => "council_transactions_representable",
            Self::NothingToAllocate => "retained_councils_nonempty",
            Self::CouncilWeightSum { .. } => "intra_council_weight_sum",
            Self::ShareSum { .. } => "constituency_share_sum",
            Self::StockConservation { .. } => "allocated_stock_total",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("allocation rejected: {0}")]
    Normalization(#[from] NormalizationError),
    #[error(transparent)]
    Model(#[from] ModelConfigError),
}

/// Relative deviation of `observed` from `expected`, scaled so a zero target compares absolutely.
pub(crate) fn relative_deviation(observed: f64, expected: f64) -> f64 {
    (observed - expected).abs() / expected.abs().max(1.0)
}
