use crate::allocation::{Band, NationalAggregate, RateScenario};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

const DEFAULT_TOLERANCE: f64 = 1e-6;
const DEFAULT_TOP_CONSTITUENCIES: usize = 10;

/// Policy inputs injected into a run: national totals, band split, rate scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub national: NationalAggregate,
    /// Headline national transaction figure, used only to annotate disagreement.
    #[serde(default)]
    pub published_transaction_total: Option<u64>,
    /// Overrides the national concentration average derived from the proxy table.
    #[serde(default)]
    pub national_average_ratio: Option<f64>,
    #[serde(default)]
    pub scenarios: Vec<RateScenario>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_top_constituencies")]
    pub top_constituencies: usize,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_top_constituencies() -> usize {
    DEFAULT_TOP_CONSTITUENCIES
}

#[derive(Debug, thiserror::Error)]
pub enum ModelConfigError {
    #[error("failed to open model parameters at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model parameters are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("national aggregate declares no bands")]
    NoBands,
    #[error("band `{0}` is declared more than once")]
    DuplicateBand(String),
    #[error("band `{band}` has invalid stock share {value}")]
    InvalidBandShare { band: String, value: f64 },
    #[error("band `{band}` has invalid rate {value}")]
    InvalidBandRate { band: String, value: f64 },
    #[error("band stock shares sum to {sum}, expected 1")]
    BandShareSum { sum: f64 },
    #[error("scenario `{0}` is declared more than once")]
    DuplicateScenario(String),
    #[error("scenario `{scenario}` overrides unknown band `{band}`")]
    UnknownScenarioBand { scenario: String, band: String },
    #[error("scenario `{scenario}` sets invalid rate {value} for band `{band}`")]
    InvalidScenarioRate {
        scenario: String,
        band: String,
        value: f64,
    },
    #[error("tolerance must be a positive number, got {0}")]
    InvalidTolerance(f64),
    #[error("national average ratio must lie in (0, 1], got {0}")]
    InvalidAverageRatio(f64),
}

impl ModelParameters {
    /// Scottish high-value property figures: 11,481 properties split 89/11
    /// across Band I and Band J, with four rate scenarios from the published
    /// defaults down to a conservative schedule.
    pub fn scotland_default() -> Self {
        Self {
            national: NationalAggregate {
                total_stock: 11_481,
                total_transactions: None,
                bands: vec![
                    Band {
                        name: "Band I".to_string(),
                        stock_share: 0.89,
                        rate: 1_500.0,
                    },
                    Band {
                        name: "Band J".to_string(),
                        stock_share: 0.11,
                        rate: 2_500.0,
                    },
                ],
            },
            published_transaction_total: Some(391),
            national_average_ratio: None,
            scenarios: vec![
                RateScenario::new("benchmark").with_description("Published band rates"),
                RateScenario::new("moderate")
                    .with_description("Rates reduced by roughly a fifth")
                    .with_rate("Band I", 1_250.0)
                    .with_rate("Band J", 2_000.0),
                RateScenario::new("cautious")
                    .with_description("Rates reduced by roughly a third")
                    .with_rate("Band I", 1_000.0)
                    .with_rate("Band J", 1_500.0),
                RateScenario::new("conservative")
                    .with_description("Rates halved or lower")
                    .with_rate("Band I", 750.0)
                    .with_rate("Band J", 1_000.0),
            ],
            tolerance: DEFAULT_TOLERANCE,
            top_constituencies: DEFAULT_TOP_CONSTITUENCIES,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ModelConfigError> {
        let file = File::open(path).map_err(|source| ModelConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ModelConfigError> {
        let params: Self = serde_json::from_reader(reader)?;
        params.validate()?;
        Ok(params)
    }

    /// Scenarios to price, falling back to the band defaults when none are configured.
    pub fn effective_scenarios(&self) -> Vec<RateScenario> {
        if self.scenarios.is_empty() {
            vec![RateScenario::new("default")]
        } else {
            self.scenarios.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ModelConfigError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ModelConfigError::InvalidTolerance(self.tolerance));
        }

        let bands = &self.national.bands;
        if bands.is_empty() {
            return Err(ModelConfigError::NoBands);
        }
        let mut names = HashSet::new();
        for band in bands {
            if !names.insert(band.name.as_str()) {
                return Err(ModelConfigError::DuplicateBand(band.name.clone()));
            }
            if !band.stock_share.is_finite() || band.stock_share < 0.0 {
                return Err(ModelConfigError::InvalidBandShare {
                    band: band.name.clone(),
                    value: band.stock_share,
                });
            }
            if !band.rate.is_finite() || band.rate < 0.0 {
                return Err(ModelConfigError::InvalidBandRate {
                    band: band.name.clone(),
                    value: band.rate,
                });
            }
        }
        let share_sum: f64 = bands.iter().map(|band| band.stock_share).sum();
        if (share_sum - 1.0).abs() > self.tolerance {
            return Err(ModelConfigError::BandShareSum { sum: share_sum });
        }

        let mut scenarios = HashSet::new();
        for scenario in &self.scenarios {
            if !scenarios.insert(scenario.name.as_str()) {
                return Err(ModelConfigError::DuplicateScenario(scenario.name.clone()));
            }
            for (band, rate) in &scenario.rate_overrides {
                if !names.contains(band.as_str()) {
                    return Err(ModelConfigError::UnknownScenarioBand {
                        scenario: scenario.name.clone(),
                        band: band.clone(),
                    });
                }
                if !rate.is_finite() || *rate < 0.0 {
                    return Err(ModelConfigError::InvalidScenarioRate {
                        scenario: scenario.name.clone(),
                        band: band.clone(),
                        value: *rate,
                    });
                }
            }
        }

        if let Some(ratio) = self.national_average_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ModelConfigError::InvalidAverageRatio(ratio));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scotland_default_is_valid_and_ordered_by_rate() {
        let params = ModelParameters::scotland_default();
        params.validate().expect("defaults validate");

        let names: Vec<&str> = params.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["benchmark", "moderate", "cautious", "conservative"]);
        let benchmark = &params.scenarios[0];
        assert_eq!(params.national.revenue_under(benchmark).round(), 18_484_410.0);
        assert!((params.national.average_rate_under(&params.scenarios[3]) - 777.5).abs() < 1e-9);
    }

    #[test]
    fn minimal_json_takes_defaults() {
        let json = r#"{
            "national": {
                "total_stock": 1000,
                "bands": [{ "name": "Top", "stock_share": 1.0, "rate": 900 }]
            }
        }"#;

        let params = ModelParameters::from_reader(json.as_bytes()).expect("parse");

        assert_eq!(params.tolerance, 1e-6);
        assert_eq!(params.top_constituencies, 10);
        assert!(params.scenarios.is_empty());
        assert_eq!(params.effective_scenarios()[0].name, "default");
    }

    #[test]
    fn band_shares_must_sum_to_one() {
        let mut params = ModelParameters::scotland_default();
        params.national.bands[1].stock_share = 0.2;

        assert!(matches!(
            params.validate(),
            Err(ModelConfigError::BandShareSum { .. })
        ));
    }

    #[test]
    fn scenario_cannot_override_unknown_band() {
        let mut params = ModelParameters::scotland_default();
        params
            .scenarios
            .push(RateScenario::new("typo").with_rate("Band K", 3_000.0));

        let err = params.validate().expect_err("unknown band");
        assert!(err.to_string().contains("Band K"));
    }

    #[test]
    fn duplicate_scenarios_and_bad_ratio_are_rejected() {
        let mut params = ModelParameters::scotland_default();
        params.scenarios.push(RateScenario::new("moderate"));
        assert!(matches!(
            params.validate(),
            Err(ModelConfigError::DuplicateScenario(name)) if name == "moderate"
        ));

        let mut params = ModelParameters::scotland_default();
        params.national_average_ratio = Some(0.0);
        assert!(matches!(
            params.validate(),
            Err(ModelConfigError::InvalidAverageRatio(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ModelParameters::from_path(Path::new("/nonexistent/model.json"))
            .expect_err("missing file");
        assert!(err.to_string().contains("/nonexistent/model.json"));
    }
}
