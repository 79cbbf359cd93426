//! Composition of council shares with intra-council weights.
//!
//! `constituency_share = council_share * intra_council_weight`. Councils that
//! appear in only one of the two tables are excluded and the remaining council
//! shares are renormalized, so the constituency shares always form a partition
//! of unity. The three sum invariants are checked on every build.

use super::council_shares::CouncilShares;
use super::domain::{Band, ConstituencyCode, CouncilCode, NationalAggregate};
use super::error::{relative_deviation, NormalizationError};
use super::issues::{IssueKind, IssueLog};
use super::weights::{WeightTable, WeightingMethod};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandStock {
    pub band: String,
    pub stock: f64,
}

/// Allocation outcome for one constituency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstituencyAllocation {
    pub code: ConstituencyCode,
    pub name: String,
    pub council: CouncilCode,
    pub population: u64,
    pub proxy_ratio: f64,
    pub wealth_factor: f64,
    pub weighting_method: WeightingMethod,
    pub intra_council_weight: f64,
    /// Council share after renormalization over retained councils.
    pub council_share: f64,
    pub share: f64,
    pub allocated_stock: f64,
    pub allocated_transactions: f64,
    /// National band split applied uniformly to the allocated stock.
    pub band_stock: Vec<BandStock>,
}

impl ConstituencyAllocation {
    pub fn stock_in_band(&self, band: &str) -> Option<f64> {
        self.band_stock
            .iter()
            .find(|entry| entry.band == band)
            .map(|entry| entry.stock)
    }
}

/// Result of the sum checks that gate every accepted run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvariantCheck {
    pub share_sum: f64,
    pub share_deviation: f64,
    pub allocated_stock: f64,
    pub stock_deviation: f64,
    pub tolerance: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    pub records: Vec<ConstituencyAllocation>,
    pub bands: Vec<Band>,
    pub total_stock: u64,
    /// Transaction total distributed across constituencies.
    pub transaction_total: f64,
    pub internal_transaction_total: u64,
    pub published_transaction_total: Option<u64>,
    pub national_average_ratio: f64,
    /// Fraction of the internal transaction total dropped by exclusions before renormalizing.
    pub excluded_share: f64,
    pub excluded_councils: Vec<CouncilCode>,
    pub excluded_constituencies: Vec<ConstituencyCode>,
    pub invariant: InvariantCheck,
}

impl AllocationResult {
    pub fn record(&self, code: &ConstituencyCode) -> Option<&ConstituencyAllocation> {
        self.records.iter().find(|record| &record.code == code)
    }

    pub fn records_for_council<'a>(
        &'a self,
        council: &'a CouncilCode,
    ) -> impl Iterator<Item = &'a ConstituencyAllocation> + 'a {
        self.records
            .iter()
            .filter(move |record| &record.council == council)
    }

    pub fn allocated_stock_total(&self) -> f64 {
        self.records.iter().map(|record| record.allocated_stock).sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AllocationEngine {
    tolerance: f64,
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl AllocationEngine {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn allocate(
        &self,
        weights: &WeightTable,
        shares: &CouncilShares,
        national: &NationalAggregate,
        issues: &mut IssueLog,
    ) -> Result<AllocationResult, NormalizationError> {
        let mut excluded_councils = Vec::new();
        let mut excluded_constituencies = weights.excluded().to_vec();

        for share in shares.iter() {
            if !weights.contains_council(&share.council) {
                issues.record(
                    IssueKind::CouncilWithoutConstituencies,
                    share.council.as_str(),
                    format!(
                        "council {} has {} transactions but no constituencies; its share is excluded",
                        share.council, share.transaction_count
                    ),
                );
                excluded_councils.push(share.council.clone());
            }
        }

        let mut retained = Vec::new();
        for council in weights.councils() {
            match shares.get(&council.council) {
                Some(share) => retained.push((council, share.share)),
                None => {
                    issues.record(
                        IssueKind::CouncilWithoutTransactions,
                        council.council.as_str(),
                        format!(
                            "council {} has {} constituencies but no transaction row; they are excluded",
                            council.council,
                            council.members.len()
                        ),
                    );
                    excluded_councils.push(council.council.clone());
                    excluded_constituencies
                        .extend(council.members.iter().map(|member| member.code.clone()));
                }
            }
        }

        let retained_share: f64 = retained.iter().map(|(_, share)| share).sum();
        if retained.is_empty() || retained_share <= 0.0 {
            return Err(NormalizationError::NothingToAllocate);
        }
        let excluded_share = (1.0 - retained_share).max(0.0);

        let transaction_total = national
            .total_transactions
            .unwrap_or(shares.internal_total()) as f64;
        let total_stock = national.total_stock as f64;

        let mut records = Vec::with_capacity(weights.constituency_count());
        for (council, raw_share) in retained {
            let weight_sum = council.weight_sum();
            let weight_deviation = relative_deviation(weight_sum, 1.0);
            if weight_deviation > self.tolerance {
                return Err(NormalizationError::CouncilWeightSum {
                    council: council.council.clone(),
                    sum: weight_sum,
                    deviation: weight_deviation,
                    tolerance: self.tolerance,
                });
            }

            let council_share = raw_share / retained_share;
            for member in &council.members {
                let share = council_share * member.intra_council_weight;
                let allocated_stock = total_stock * share;
                records.push(ConstituencyAllocation {
                    code: member.code.clone(),
                    name: member.name.clone(),
                    council: council.council.clone(),
                    population: member.population,
                    proxy_ratio: member.proxy_ratio,
                    wealth_factor: member.wealth_factor,
                    weighting_method: council.method,
                    intra_council_weight: member.intra_council_weight,
                    council_share,
                    share,
                    allocated_stock,
                    allocated_transactions: transaction_total * share,
                    band_stock: national
                        .bands
                        .iter()
                        .map(|band| BandStock {
                            band: band.name.clone(),
                            stock: allocated_stock * band.stock_share,
                        })
                        .collect(),
                });
            }
        }

        let invariant = self.check_invariants(&records, total_stock)?;
        debug!(
            constituencies = records.len(),
            excluded_councils = excluded_councils.len(),
            excluded_share,
            share_sum = invariant.share_sum,
            "allocation composed"
        );

        Ok(AllocationResult {
            records,
            bands: national.bands.clone(),
            total_stock: national.total_stock,
            transaction_total,
            internal_transaction_total: shares.internal_total(),
            published_transaction_total: shares.published_total(),
            national_average_ratio: weights.national_average_ratio(),
            excluded_share,
            excluded_councils,
            excluded_constituencies,
            invariant,
        })
    }

    fn check_invariants(
        &self,
        records: &[ConstituencyAllocation],
        total_stock: f64,
    ) -> Result<InvariantCheck, NormalizationError> {
        let share_sum: f64 = records.iter().map(|record| record.share).sum();
        let share_deviation = relative_deviation(share_sum, 1.0);
        if share_deviation > self.tolerance {
            return Err(NormalizationError::ShareSum {
                sum: share_sum,
                deviation: share_deviation,
                tolerance: self.tolerance,
            });
        }

        let allocated_stock: f64 = records.iter().map(|record| record.allocated_stock).sum();
        let stock_deviation = relative_deviation(allocated_stock, total_stock);
        if stock_deviation > self.tolerance {
            return Err(NormalizationError::StockConservation {
                allocated: allocated_stock,
                expected: total_stock,
                deviation: stock_deviation,
                tolerance: self.tolerance,
            });
        }

        Ok(InvariantCheck {
            share_sum,
            share_deviation,
            allocated_stock,
            stock_deviation,
            tolerance: self.tolerance,
            passed: true,
        })
    }
}
