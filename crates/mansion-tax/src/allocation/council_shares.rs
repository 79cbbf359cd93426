use super::domain::{CouncilCode, CouncilTransactionCount};
use super::error::NormalizationError;
use super::issues::{IssueKind, IssueLog};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouncilShare {
    pub council: CouncilCode,
    pub transaction_count: u64,
    /// Fraction of the dataset's own transaction total.
    pub share: f64,
}

/// Council shares normalized against the per-council dataset's internal total.
#[derive(Debug, Clone, PartialEq)]
pub struct CouncilShares {
    shares: BTreeMap<CouncilCode, CouncilShare>,
    internal_total: u64,
    published_total: Option<u64>,
}

impl CouncilShares {
    pub fn get(&self, council: &CouncilCode) -> Option<&CouncilShare> {
        self.shares.get(council)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CouncilShare> {
        self.shares.values()
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Sum of the per-council counts; the denominator of every share.
    pub fn internal_total(&self) -> u64 {
        self.internal_total
    }

    pub fn published_total(&self) -> Option<u64> {
        self.published_total
    }

    /// Internal minus published total, when a headline figure is known and differs.
    pub fn discrepancy(&self) -> Option<i128> {
        self.published_total
            .map(|published| i128::from(self.internal_total) - i128::from(published))
            .filter(|delta| *delta != 0)
    }

    pub fn share_sum(&self) -> f64 {
        self.shares.values().map(|share| share.share).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CouncilShareResolver {
    published_total: Option<u64>,
}

impl CouncilShareResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headline national figure, kept only to annotate disagreement with the dataset.
    pub fn with_published_total(mut self, total: Option<u64>) -> Self {
        self.published_total = total;
        self
    }

    pub fn resolve(
        &self,
        rows: &[CouncilTransactionCount],
        issues: &mut IssueLog,
    ) -> Result<CouncilShares, NormalizationError> {
        let mut counts: BTreeMap<CouncilCode, u64> = BTreeMap::new();

        for row in rows {
            if row.council.is_blank() {
                issues.record(
                    IssueKind::CouncilRowWithoutCode,
                    "unidentified",
                    format!(
                        "transaction row with count {:?} names no council and is excluded",
                        row.transaction_count
                    ),
                );
                continue;
            }
            if counts.contains_key(&row.council) {
                issues.record(
                    IssueKind::DuplicateCouncilTransactions,
                    row.council.as_str(),
                    format!(
                        "council {} has more than one transaction row; the first row is used",
                        row.council
                    ),
                );
                continue;
            }

            let count = row.transaction_count.unwrap_or(0);
            if count == 0 {
                issues.record(
                    IssueKind::ZeroTransactions,
                    row.council.as_str(),
                    format!(
                        "council {} has no recorded transactions; its share is 0 and is not redistributed",
                        row.council
                    ),
                );
            }
            counts.insert(row.council.clone(), count);
        }

        let internal_total = counts
            .values()
            .try_fold(0_u64, |total, count| total.checked_add(*count))
            .ok_or(NormalizationError::TransactionTotalOverflow)?;
        if internal_total == 0 {
            return Err(NormalizationError::NoTransactions);
        }

        if let Some(published) = self.published_total {
            if published != internal_total {
                issues.record(
                    IssueKind::TransactionTotalMismatch,
                    "national",
                    format!(
                        "council rows sum to {internal_total} transactions but the published national total is {published}; shares use {internal_total}"
                    ),
                );
            }
        }

        let shares = counts
            .into_iter()
            .map(|(council, transaction_count)| {
                let share = CouncilShare {
                    council: council.clone(),
                    transaction_count,
                    share: transaction_count as f64 / internal_total as f64,
                };
                (council, share)
            })
            .collect::<BTreeMap<_, _>>();

        debug!(
            councils = shares.len(),
            internal_total,
            published_total = ?self.published_total,
            "council shares resolved"
        );

        Ok(CouncilShares {
            shares,
            internal_total,
            published_total: self.published_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(council: &str, count: Option<u64>) -> CouncilTransactionCount {
        CouncilTransactionCount {
            council: CouncilCode::new(council),
            transaction_count: count,
        }
    }

    #[test]
    fn shares_use_internal_total_not_headline_figure() {
        let rows = vec![
            row("City of Edinburgh", Some(200)),
            row("East Lothian", Some(129)),
            row("Aberdeen City", Some(100)),
        ];
        let mut issues = IssueLog::default();

        let shares = CouncilShareResolver::new()
            .with_published_total(Some(391))
            .resolve(&rows, &mut issues)
            .expect("shares resolve");

        assert_eq!(shares.internal_total(), 429);
        assert_eq!(shares.discrepancy(), Some(38));
        assert!((shares.share_sum() - 1.0).abs() < 1e-12);
        let edinburgh = shares
            .get(&CouncilCode::new("city of edinburgh"))
            .expect("edinburgh present");
        assert!((edinburgh.share - 200.0 / 429.0).abs() < 1e-15);
        assert!(issues.contains(IssueKind::TransactionTotalMismatch, "national"));
    }

    #[test]
    fn zero_and_blank_counts_get_zero_share() {
        let rows = vec![row("A", Some(10)), row("B", Some(0)), row("C", None)];
        let mut issues = IssueLog::default();

        let shares = CouncilShareResolver::new()
            .resolve(&rows, &mut issues)
            .expect("shares resolve");

        assert_eq!(shares.get(&CouncilCode::new("A")).map(|s| s.share), Some(1.0));
        assert_eq!(shares.get(&CouncilCode::new("B")).map(|s| s.share), Some(0.0));
        assert_eq!(shares.get(&CouncilCode::new("C")).map(|s| s.share), Some(0.0));
        assert!(issues.contains(IssueKind::ZeroTransactions, "B"));
        assert!(issues.contains(IssueKind::ZeroTransactions, "C"));
        assert_eq!(shares.discrepancy(), None);
    }

    #[test]
    fn duplicate_and_unnamed_rows_are_recorded() {
        let rows = vec![row("A", Some(10)), row("a", Some(99)), row(" ", Some(5))];
        let mut issues = IssueLog::default();

        let shares = CouncilShareResolver::new()
            .resolve(&rows, &mut issues)
            .expect("shares resolve");

        assert_eq!(shares.len(), 1);
        assert_eq!(shares.internal_total(), 10);
        assert!(issues.contains(IssueKind::DuplicateCouncilTransactions, "a"));
        assert!(issues.contains(IssueKind::CouncilRowWithoutCode, "unidentified"));
    }

    #[test]
    fn all_zero_counts_abort_the_run() {
        let rows = vec![row("A", Some(0)), row("B", None)];
        let mut issues = IssueLog::default();

        let error = CouncilShareResolver::new()
            .resolve(&rows, &mut issues)
            .expect_err("nothing to normalize");

        assert_eq!(error, NormalizationError::NoTransactions);
    }

    #[test]
    fn overflowing_counts_are_rejected_not_wrapped() {
        let half = u64::MAX / 2 + 1;
        let rows = vec![row("A", Some(half)), row("B", Some(half))];
        let mut issues = IssueLog::default();

        let error = CouncilShareResolver::new()
            .resolve(&rows, &mut issues)
            .expect_err("total exceeds u64");

        assert_eq!(error, NormalizationError::TransactionTotalOverflow);
        assert_eq!(error.invariant(), "council_transactions_representable");
    }

    #[test]
    fn discrepancy_spans_the_full_count_range() {
        let rows = vec![row("A", Some(u64::MAX))];
        let mut issues = IssueLog::default();

        let shares = CouncilShareResolver::new()
            .with_published_total(Some(0))
            .resolve(&rows, &mut issues)
            .expect("single council resolves");

        assert_eq!(shares.discrepancy(), Some(i128::from(u64::MAX)));
        assert_eq!(shares.get(&CouncilCode::new("A")).map(|s| s.share), Some(1.0));
    }
}
