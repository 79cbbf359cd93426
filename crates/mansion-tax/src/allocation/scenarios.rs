use super::domain::{BandRate, ConstituencyCode, CouncilCode, RateScenario};
use super::engine::AllocationResult;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandRevenue {
    pub band: String,
    pub stock: f64,
    pub rate: f64,
    pub revenue: f64,
}

/// Revenue for one constituency under one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueEstimate {
    pub constituency: ConstituencyCode,
    pub council: CouncilCode,
    pub scenario: String,
    pub revenue: f64,
    pub bands: Vec<BandRevenue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioProjection {
    pub scenario: RateScenario,
    pub band_rates: Vec<BandRate>,
    pub estimates: Vec<RevenueEstimate>,
    pub total_stock: u64,
    pub total_revenue: f64,
    /// National revenue over national stock. Display only; never fed back into allocation.
    pub average_rate: f64,
}

impl ScenarioProjection {
    pub fn name(&self) -> &str {
        &self.scenario.name
    }
}

/// One row of the average-rate sensitivity table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityRow {
    pub scenario: String,
    pub band_rates: Vec<BandRate>,
    pub total_revenue: f64,
    pub average_rate: f64,
    /// Percentage change in total revenue against the first scenario.
    pub revenue_change_pct: f64,
}

/// Prices an accepted allocation under any number of rate scenarios.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioProjector<'a> {
    allocation: &'a AllocationResult,
}

impl<'a> ScenarioProjector<'a> {
    pub fn new(allocation: &'a AllocationResult) -> Self {
        Self { allocation }
    }

    pub fn project(&self, scenario: &RateScenario) -> ScenarioProjection {
        let band_rates = scenario.resolved_rates(&self.allocation.bands);

        let estimates: Vec<RevenueEstimate> = self
            .allocation
            .records
            .iter()
            .map(|record| {
                let bands: Vec<BandRevenue> = record
                    .band_stock
                    .iter()
                    .zip(&band_rates)
                    .map(|(stock, rate)| BandRevenue {
                        band: stock.band.clone(),
                        stock: stock.stock,
                        rate: rate.rate,
                        revenue: stock.stock * rate.rate,
                    })
                    .collect();
                RevenueEstimate {
                    constituency: record.code.clone(),
                    council: record.council.clone(),
                    scenario: scenario.name.clone(),
                    revenue: bands.iter().map(|band| band.revenue).sum(),
                    bands,
                }
            })
            .collect();

        let total_revenue: f64 = estimates.iter().map(|estimate| estimate.revenue).sum();
        let average_rate = if self.allocation.total_stock > 0 {
            total_revenue / self.allocation.total_stock as f64
        } else {
            0.0
        };
        debug!(
            scenario = %scenario.name,
            total_revenue,
            average_rate,
            "scenario projected"
        );

        ScenarioProjection {
            scenario: scenario.clone(),
            band_rates,
            estimates,
            total_stock: self.allocation.total_stock,
            total_revenue,
            average_rate,
        }
    }

    pub fn project_all(&self, scenarios: &[RateScenario]) -> Vec<ScenarioProjection> {
        scenarios
            .iter()
            .map(|scenario| self.project(scenario))
            .collect()
    }
}

/// Compares every projection against the first one.
pub fn sensitivity_table(projections: &[ScenarioProjection]) -> Vec<SensitivityRow> {
    let reference = projections
        .first()
        .map(|projection| projection.total_revenue)
        .unwrap_or_default();

    projections
        .iter()
        .map(|projection| SensitivityRow {
            scenario: projection.scenario.name.clone(),
            band_rates: projection.band_rates.clone(),
            total_revenue: projection.total_revenue,
            average_rate: projection.average_rate,
            revenue_change_pct: if reference > 0.0 {
                (projection.total_revenue - reference) / reference * 100.0
            } else {
                0.0
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::council_shares::CouncilShareResolver;
    use crate::allocation::domain::{
        Band, ConcentrationProxy, Constituency, CouncilTransactionCount, NationalAggregate,
    };
    use crate::allocation::engine::AllocationEngine;
    use crate::allocation::issues::IssueLog;
    use crate::allocation::weights::WeightTableBuilder;
    use proptest::prelude::{prop_assert, proptest};

    fn bands() -> Vec<Band> {
        vec![
            Band {
                name: "Band I".into(),
                stock_share: 0.89,
                rate: 1_500.0,
            },
            Band {
                name: "Band J".into(),
                stock_share: 0.11,
                rate: 2_500.0,
            },
        ]
    }

    fn allocation(total_stock: u64) -> AllocationResult {
        let constituencies = vec![
            Constituency {
                code: ConstituencyCode::new("S1"),
                name: "Edinburgh Central".into(),
                council: Some(CouncilCode::new("EDN")),
                population: 70_000,
            },
            Constituency {
                code: ConstituencyCode::new("S2"),
                name: "Edinburgh Western".into(),
                council: Some(CouncilCode::new("EDN")),
                population: 80_000,
            },
            Constituency {
                code: ConstituencyCode::new("S3"),
                name: "Aberdeen Central".into(),
                council: Some(CouncilCode::new("ABD")),
                population: 65_000,
            },
        ];
        let proxies = vec![
            ConcentrationProxy {
                constituency: ConstituencyCode::new("S1"),
                high_value_band_ratio: Some(0.012),
                dwellings: None,
            },
            ConcentrationProxy {
                constituency: ConstituencyCode::new("S2"),
                high_value_band_ratio: Some(0.008),
                dwellings: None,
            },
            ConcentrationProxy {
                constituency: ConstituencyCode::new("S3"),
                high_value_band_ratio: Some(0.002),
                dwellings: None,
            },
        ];
        let rows = vec![
            CouncilTransactionCount {
                council: CouncilCode::new("EDN"),
                transaction_count: Some(300),
            },
            CouncilTransactionCount {
                council: CouncilCode::new("ABD"),
                transaction_count: Some(29),
            },
        ];

        let mut issues = IssueLog::default();
        let weights = WeightTableBuilder::new(&constituencies, &proxies).build(&mut issues);
        let shares = CouncilShareResolver::new()
            .resolve(&rows, &mut issues)
            .expect("shares resolve");
        let national = NationalAggregate {
            total_stock,
            total_transactions: None,
            bands: bands(),
        };
        AllocationEngine::default()
            .allocate(&weights, &shares, &national, &mut issues)
            .expect("allocation succeeds")
    }

    #[test]
    fn default_rates_reproduce_national_revenue() {
        let result = allocation(11_481);
        let projection = ScenarioProjector::new(&result).project(&RateScenario::new("benchmark"));

        assert!((projection.total_revenue - 18_484_410.0).abs() < 1e-3);
        assert!((projection.average_rate - 1_610.0).abs() < 1e-9);
        assert_eq!(projection.estimates.len(), 3);

        let s1 = &projection.estimates[0];
        let by_band: f64 = s1.bands.iter().map(|band| band.revenue).sum();
        assert!((s1.revenue - by_band).abs() < 1e-9);
    }

    #[test]
    fn band_overrides_only_touch_named_bands() {
        let result = allocation(1_000);
        let projection = ScenarioProjector::new(&result)
            .project(&RateScenario::new("band i cut").with_rate("Band I", 1_000.0));

        assert_eq!(projection.band_rates[0].rate, 1_000.0);
        assert_eq!(projection.band_rates[1].rate, 2_500.0);
        let expected = 1_000.0 * (0.89 * 1_000.0 + 0.11 * 2_500.0);
        assert!((projection.total_revenue - expected).abs() < 1e-6);
    }

    #[test]
    fn sensitivity_rows_compare_against_first_scenario() {
        let result = allocation(11_481);
        let projections = ScenarioProjector::new(&result).project_all(&[
            RateScenario::new("benchmark"),
            RateScenario::new("half")
                .with_rate("Band I", 750.0)
                .with_rate("Band J", 1_250.0),
        ]);

        let rows = sensitivity_table(&projections);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].revenue_change_pct, 0.0);
        assert!((rows[1].revenue_change_pct + 50.0).abs() < 1e-9);
        assert!((rows[1].average_rate - 805.0).abs() < 1e-9);
    }

    #[test]
    fn empty_scenario_set_yields_empty_table() {
        assert!(sensitivity_table(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_higher_rates_never_lower_any_constituency_revenue(
            low_i in 0.0f64..5_000.0,
            low_j in 0.0f64..5_000.0,
            bump_i in 0.0f64..2_000.0,
            bump_j in 0.0f64..2_000.0,
            total_stock in 0u64..100_000,
        ) {
            let result = allocation(total_stock);
            let projector = ScenarioProjector::new(&result);
            let low = projector.project(
                &RateScenario::new("low").with_rate("Band I", low_i).with_rate("Band J", low_j),
            );
            let high = projector.project(
                &RateScenario::new("high")
                    .with_rate("Band I", low_i + bump_i)
                    .with_rate("Band J", low_j + bump_j),
            );

            for (low, high) in low.estimates.iter().zip(&high.estimates) {
                prop_assert!(high.revenue >= low.revenue);
            }
        }
    }
}
