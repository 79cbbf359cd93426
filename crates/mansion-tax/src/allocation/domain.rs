use crate::sources::normalizer::{clean_text, code_key};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier text as published plus the key used for joins across tables.
#[derive(Debug, Clone)]
struct CodeRepr {
    key: String,
    display: String,
}

impl CodeRepr {
    fn new(raw: &str) -> Self {
        Self {
            key: code_key(raw),
            display: clean_text(raw),
        }
    }
}

impl PartialEq for CodeRepr {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CodeRepr {}

impl PartialOrd for CodeRepr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CodeRepr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Hash for CodeRepr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

macro_rules! unit_code {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(CodeRepr);

        impl $name {
            pub fn new(raw: &str) -> Self {
                Self(CodeRepr::new(raw))
            }

            /// The code as published, with stray whitespace removed.
            pub fn as_str(&self) -> &str {
                &self.0.display
            }

            /// Case- and whitespace-insensitive join key.
            pub fn key(&self) -> &str {
                &self.0.key
            }

            pub fn is_blank(&self) -> bool {
                self.0.key.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok(Self::new(&raw))
            }
        }
    };
}

unit_code!(
    /// Upper-tier administrative unit identifier.
    CouncilCode
);

unit_code!(
    /// Lower-tier electoral unit identifier.
    ConstituencyCode
);

/// Reference record for one constituency and its population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constituency {
    pub code: ConstituencyCode,
    pub name: String,
    /// `None` when the source row declares no parent council.
    #[serde(default)]
    pub council: Option<CouncilCode>,
    pub population: u64,
}

/// Share of a constituency's housing stock that falls in the high-value band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationProxy {
    pub constituency: ConstituencyCode,
    #[serde(default)]
    pub high_value_band_ratio: Option<f64>,
    #[serde(default)]
    pub dwellings: Option<u64>,
}

/// Observed transactions for one council over the reference period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilTransactionCount {
    pub council: CouncilCode,
    #[serde(default)]
    pub transaction_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    pub stock_share: f64,
    /// Flat annual rate charged per property in this band.
    pub rate: f64,
}

/// National totals trusted as ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalAggregate {
    pub total_stock: u64,
    /// National transaction total when published separately from the stock figure.
    #[serde(default)]
    pub total_transactions: Option<u64>,
    pub bands: Vec<Band>,
}

impl NationalAggregate {
    /// Stock-weighted rate of a scenario across the bands.
    pub fn average_rate_under(&self, scenario: &RateScenario) -> f64 {
        self.bands
            .iter()
            .map(|band| band.stock_share * scenario.rate_for(band))
            .sum()
    }

    /// Revenue of a scenario applied to the whole national stock.
    pub fn revenue_under(&self, scenario: &RateScenario) -> f64 {
        self.total_stock as f64 * self.average_rate_under(scenario)
    }
}

/// Named set of per-band rates. Bands without an override keep their default rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateScenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rate_overrides: BTreeMap<String, f64>,
}

impl RateScenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            rate_overrides: BTreeMap::new(),
        }
    }

    pub fn with_rate(mut self, band: impl Into<String>, rate: f64) -> Self {
        self.rate_overrides.insert(band.into(), rate);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn rate_for(&self, band: &Band) -> f64 {
        self.rate_overrides
            .get(&band.name)
            .copied()
            .unwrap_or(band.rate)
    }

    /// Effective rate for every band, in band order.
    pub fn resolved_rates(&self, bands: &[Band]) -> Vec<BandRate> {
        bands
            .iter()
            .map(|band| BandRate {
                band: band.name.clone(),
                rate: self.rate_for(band),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandRate {
    pub band: String,
    pub rate: f64,
}

/// The three raw tables the engine consumes, already loaded into memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceTables {
    pub constituencies: Vec<Constituency>,
    #[serde(default)]
    pub proxies: Vec<ConcentrationProxy>,
    pub transactions: Vec<CouncilTransactionCount>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn codes_compare_on_normalized_key() {
        let a = CouncilCode::new(" City of  Edinburgh ");
        let b = CouncilCode::new("\u{feff}CITY OF EDINBURGH");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "City of Edinburgh");
        assert_eq!(a.key(), "CITY OF EDINBURGH");

        let set: BTreeSet<CouncilCode> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn blank_codes_are_detected() {
        assert!(ConstituencyCode::new("   ").is_blank());
        assert!(!ConstituencyCode::new("S16000104").is_blank());
    }

    #[test]
    fn scenario_falls_back_to_band_default_rate() {
        let band_i = Band {
            name: "Band I".into(),
            stock_share: 0.89,
            rate: 1_500.0,
        };
        let band_j = Band {
            name: "Band J".into(),
            stock_share: 0.11,
            rate: 2_500.0,
        };
        let scenario = RateScenario::new("moderate").with_rate("Band I", 1_250.0);

        assert_eq!(scenario.rate_for(&band_i), 1_250.0);
        assert_eq!(scenario.rate_for(&band_j), 2_500.0);

        let rates = scenario.resolved_rates(&[band_i, band_j]);
        assert_eq!(rates[0].rate, 1_250.0);
        assert_eq!(rates[1].band, "Band J");
    }

    #[test]
    fn codes_round_trip_through_json_as_plain_strings() {
        let code = ConstituencyCode::new("S16000104");
        let json = serde_json::to_string(&code).expect("serialize");
        assert_eq!(json, "\"S16000104\"");
        let parsed: ConstituencyCode = serde_json::from_str(" \"s16000104\" ").expect("parse");
        assert_eq!(parsed, code);
    }
}
