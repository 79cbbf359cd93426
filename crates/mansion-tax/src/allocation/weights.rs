//! Within-council weighting of constituencies.
//!
//! Each constituency gets a wealth factor (its high-value band ratio over the
//! national average ratio) and a raw weight of `population * wealth_factor`.
//! Raw weights are normalized inside each council so that every council's
//! constituency weights sum to one. A council whose raw weights are all zero
//! falls back to population-only weighting, and to an equal split when its
//! population is zero as well; both fallbacks are recorded as warnings.

use super::domain::{ConcentrationProxy, Constituency, ConstituencyCode, CouncilCode};
use super::issues::{IssueKind, IssueLog};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMethod {
    WealthAdjusted,
    PopulationFallback,
    EqualSplit,
}

impl WeightingMethod {
    pub const fn label(self) -> &'static str {
        match self {
            Self::WealthAdjusted => "Wealth-adjusted population",
            Self::PopulationFallback => "Population only (proxy absent)",
            Self::EqualSplit => "Equal split (no population)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstituencyWeight {
    pub code: ConstituencyCode,
    pub name: String,
    pub council: CouncilCode,
    pub population: u64,
    /// Sanitized high-value band ratio; missing values are zero.
    pub proxy_ratio: f64,
    pub wealth_factor: f64,
    pub raw_weight: f64,
    pub intra_council_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouncilWeights {
    pub council: CouncilCode,
    pub method: WeightingMethod,
    pub members: Vec<ConstituencyWeight>,
}

impl CouncilWeights {
    pub fn weight_sum(&self) -> f64 {
        self.members
            .iter()
            .map(|member| member.intra_council_weight)
            .sum()
    }
}

/// Intra-council weights for every constituency that could be placed in a council.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    national_average_ratio: f64,
    councils: BTreeMap<CouncilCode, CouncilWeights>,
    excluded: Vec<ConstituencyCode>,
}

impl WeightTable {
    pub fn national_average_ratio(&self) -> f64 {
        self.national_average_ratio
    }

    pub fn councils(&self) -> impl Iterator<Item = &CouncilWeights> {
        self.councils.values()
    }

    pub fn council(&self, code: &CouncilCode) -> Option<&CouncilWeights> {
        self.councils.get(code)
    }

    pub fn contains_council(&self, code: &CouncilCode) -> bool {
        self.councils.contains_key(code)
    }

    pub fn constituency(&self, code: &ConstituencyCode) -> Option<&ConstituencyWeight> {
        self.councils
            .values()
            .flat_map(|council| council.members.iter())
            .find(|member| &member.code == code)
    }

    pub fn constituency_count(&self) -> usize {
        self.councils
            .values()
            .map(|council| council.members.len())
            .sum()
    }

    /// Constituencies dropped because they could not be placed in a council.
    pub fn excluded(&self) -> &[ConstituencyCode] {
        &self.excluded
    }
}

pub struct WeightTableBuilder<'a> {
    constituencies: &'a [Constituency],
    proxies: &'a [ConcentrationProxy],
    national_average_ratio: Option<f64>,
}

impl<'a> WeightTableBuilder<'a> {
    pub fn new(constituencies: &'a [Constituency], proxies: &'a [ConcentrationProxy]) -> Self {
        Self {
            constituencies,
            proxies,
            national_average_ratio: None,
        }
    }

    /// Use an injected national average instead of deriving it from the proxy table.
    pub fn with_national_average_ratio(mut self, ratio: Option<f64>) -> Self {
        self.national_average_ratio = ratio;
        self
    }

    pub fn build(self, issues: &mut IssueLog) -> WeightTable {
        let (placed, excluded) = self.place_constituencies(issues);
        let proxies = self.proxy_lookup(issues);

        let national_average_ratio = self
            .national_average_ratio
            .unwrap_or_else(|| derived_average_ratio(&placed, &proxies));
        debug!(national_average_ratio, "national concentration average resolved");

        let mut grouped: BTreeMap<CouncilCode, Vec<ConstituencyWeight>> = BTreeMap::new();
        for (constituency, council) in placed {
            let proxy_ratio = proxies
                .get(&constituency.code)
                .map(|proxy| proxy.ratio)
                .unwrap_or(0.0);
            let wealth_factor = wealth_factor(proxy_ratio, national_average_ratio);
            grouped
                .entry(council.clone())
                .or_default()
                .push(ConstituencyWeight {
                    code: constituency.code.clone(),
                    name: constituency.name.clone(),
                    council: council.clone(),
                    population: constituency.population,
                    proxy_ratio,
                    wealth_factor,
                    raw_weight: constituency.population as f64 * wealth_factor,
                    intra_council_weight: 0.0,
                });
        }

        let councils = grouped
            .into_iter()
            .map(|(council, members)| {
                let weights = normalize_council(council.clone(), members, issues);
                (council, weights)
            })
            .collect();

        WeightTable {
            national_average_ratio,
            councils,
            excluded,
        }
    }

    fn place_constituencies(
        &self,
        issues: &mut IssueLog,
    ) -> (Vec<(&'a Constituency, &'a CouncilCode)>, Vec<ConstituencyCode>) {
        let mut seen: HashSet<&ConstituencyCode> = HashSet::new();
        let mut placed = Vec::with_capacity(self.constituencies.len());
        let mut excluded = Vec::new();

        for constituency in self.constituencies {
            if !seen.insert(&constituency.code) {
                issues.record(
                    IssueKind::DuplicateConstituency,
                    constituency.code.as_str(),
                    format!(
                        "constituency {} ({}) appears more than once; the first row is used",
                        constituency.code, constituency.name
                    ),
                );
                continue;
            }

            match constituency
                .council
                .as_ref()
                .filter(|council| !council.is_blank())
            {
                Some(council) => placed.push((constituency, council)),
                None => {
                    issues.record(
                        IssueKind::ConstituencyWithoutCouncil,
                        constituency.code.as_str(),
                        format!(
                            "constituency {} ({}) declares no parent council and is excluded",
                            constituency.code, constituency.name
                        ),
                    );
                    excluded.push(constituency.code.clone());
                }
            }
        }

        (placed, excluded)
    }

    fn proxy_lookup(&self, issues: &mut IssueLog) -> HashMap<ConstituencyCode, SanitizedProxy> {
        let known: HashSet<&ConstituencyCode> =
            self.constituencies.iter().map(|c| &c.code).collect();
        let mut lookup = HashMap::with_capacity(self.proxies.len());

        for proxy in self.proxies {
            if !known.contains(&proxy.constituency) {
                issues.record(
                    IssueKind::UnknownProxyConstituency,
                    proxy.constituency.as_str(),
                    format!(
                        "proxy row for {} matches no constituency and is ignored",
                        proxy.constituency
                    ),
                );
                continue;
            }
            if lookup.contains_key(&proxy.constituency) {
                issues.record(
                    IssueKind::DuplicateProxyRow,
                    proxy.constituency.as_str(),
                    format!(
                        "proxy for {} appears more than once; the first row is used",
                        proxy.constituency
                    ),
                );
                continue;
            }

            let ratio = sanitize_ratio(proxy, issues);
            lookup.insert(
                proxy.constituency.clone(),
                SanitizedProxy {
                    ratio,
                    dwellings: proxy.dwellings,
                },
            );
        }

        lookup
    }
}

#[derive(Debug, Clone, Copy)]
struct SanitizedProxy {
    ratio: f64,
    dwellings: Option<u64>,
}

fn sanitize_ratio(proxy: &ConcentrationProxy, issues: &mut IssueLog) -> f64 {
    match proxy.high_value_band_ratio {
        None => 0.0,
        Some(ratio) if ratio.is_nan() || ratio < 0.0 => {
            issues.record(
                IssueKind::InvalidProxyRatio,
                proxy.constituency.as_str(),
                format!(
                    "ratio {ratio} for {} is not a valid proportion; treated as 0",
                    proxy.constituency
                ),
            );
            0.0
        }
        Some(ratio) if ratio > 1.0 => {
            issues.record(
                IssueKind::InvalidProxyRatio,
                proxy.constituency.as_str(),
                format!(
                    "ratio {ratio} for {} exceeds 1; clamped to 1",
                    proxy.constituency
                ),
            );
            1.0
        }
        Some(ratio) => ratio,
    }
}

/// Dwelling-weighted mean ratio over every constituency placed in a council,
/// including councils later excluded for lacking a transaction row. Population
/// stands in for the dwelling count where the proxy table does not provide one.
fn derived_average_ratio(
    placed: &[(&Constituency, &CouncilCode)],
    proxies: &HashMap<ConstituencyCode, SanitizedProxy>,
) -> f64 {
    let (weighted, dwellings) =
        placed
            .iter()
            .fold((0.0_f64, 0.0_f64), |(weighted, dwellings), (constituency, _)| {
                let proxy = proxies.get(&constituency.code);
                let ratio = proxy.map(|p| p.ratio).unwrap_or(0.0);
                let count = proxy
                    .and_then(|p| p.dwellings)
                    .unwrap_or(constituency.population) as f64;
                (weighted + ratio * count, dwellings + count)
            });

    if dwellings > 0.0 {
        weighted / dwellings
    } else {
        0.0
    }
}

fn wealth_factor(local_ratio: f64, national_average_ratio: f64) -> f64 {
    if local_ratio <= 0.0 || national_average_ratio <= 0.0 {
        0.0
    } else {
        local_ratio / national_average_ratio
    }
}

fn normalize_council(
    council: CouncilCode,
    mut members: Vec<ConstituencyWeight>,
    issues: &mut IssueLog,
) -> CouncilWeights {
    let raw_total: f64 = members.iter().map(|member| member.raw_weight).sum();
    let population_total: f64 = members.iter().map(|member| member.population as f64).sum();

    let method = if raw_total > 0.0 {
        for member in &mut members {
            member.intra_council_weight = member.raw_weight / raw_total;
        }
        WeightingMethod::WealthAdjusted
    } else if population_total > 0.0 {
        issues.record(
            IssueKind::PopulationFallback,
            council.as_str(),
            format!(
                "no concentration signal in {council}; weighting its {} constituencies by population",
                members.len()
            ),
        );
        for member in &mut members {
            member.intra_council_weight = member.population as f64 / population_total;
        }
        WeightingMethod::PopulationFallback
    } else {
        issues.record(
            IssueKind::EqualSplitFallback,
            council.as_str(),
            format!(
                "{council} has neither concentration signal nor population; splitting equally"
            ),
        );
        let equal = 1.0 / members.len() as f64;
        for member in &mut members {
            member.intra_council_weight = equal;
        }
        WeightingMethod::EqualSplit
    };

    debug!(
        council = %council,
        method = ?method,
        constituencies = members.len(),
        "council weights normalized"
    );

    CouncilWeights {
        council,
        method,
        members,
    }
}
