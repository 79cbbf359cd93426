use crate::allocation::{
    ConcentrationProxy, Constituency, ConstituencyCode, CouncilCode, CouncilTransactionCount,
};
use super::normalizer::clean_text;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::str::FromStr;

pub(crate) fn parse_constituencies<R: Read>(reader: R) -> Result<Vec<Constituency>, csv::Error> {
    parse_rows::<_, ConstituencyRow>(reader)
        .map(|rows| rows.into_iter().map(ConstituencyRow::into_record).collect())
}

pub(crate) fn parse_proxies<R: Read>(reader: R) -> Result<Vec<ConcentrationProxy>, csv::Error> {
    parse_rows::<_, ProxyRow>(reader)
        .map(|rows| rows.into_iter().map(ProxyRow::into_record).collect())
}

pub(crate) fn parse_transactions<R: Read>(
    reader: R,
) -> Result<Vec<CouncilTransactionCount>, csv::Error> {
    parse_rows::<_, TransactionRow>(reader)
        .map(|rows| rows.into_iter().map(TransactionRow::into_record).collect())
}

fn parse_rows<R: Read, T: for<'de> Deserialize<'de>>(reader: R) -> Result<Vec<T>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    csv_reader.deserialize::<T>().collect()
}

#[derive(Debug, Deserialize)]
struct ConstituencyRow {
    constituency_code: String,
    #[serde(alias = "name")]
    constituency_name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    council_code: Option<String>,
    population: u64,
}

impl ConstituencyRow {
    fn into_record(self) -> Constituency {
        Constituency {
            code: ConstituencyCode::new(&self.constituency_code),
            name: clean_text(&self.constituency_name),
            council: self.council_code.as_deref().map(CouncilCode::new),
            population: self.population,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProxyRow {
    constituency_code: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    high_value_band_ratio: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    dwellings: Option<u64>,
}

impl ProxyRow {
    fn into_record(self) -> ConcentrationProxy {
        ConcentrationProxy {
            constituency: ConstituencyCode::new(&self.constituency_code),
            high_value_band_ratio: self.high_value_band_ratio,
            dwellings: self.dwellings,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    #[serde(default)]
    council_code: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    transaction_count: Option<u64>,
}

impl TransactionRow {
    fn into_record(self) -> CouncilTransactionCount {
        CouncilTransactionCount {
            council: CouncilCode::new(&self.council_code),
            transaction_count: self.transaction_count,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Blank cells are missing values; anything else must parse.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    empty_string_as_none(deserializer)?
        .map(|value| value.trim().parse::<T>().map_err(D::Error::custom))
        .transpose()
}
