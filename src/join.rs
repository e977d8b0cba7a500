//! Inner joins that build the unified daily tables.
//!
//! Rows without a partner on the other side are dropped, but every dropped
//! key is collected into a [`JoinReport`] so mismatched country spellings
//! show up in the logs instead of disappearing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EXCLUDED_CASE_COUNTRIES;
use crate::table::RawTable;
use crate::tidy::{LongObservation, TidyError, parse_count};

/// Canonical form of a country name used for lookup comparison.
pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A usable population reference row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    pub combined_key: String,
    pub population: u64,
}

/// Population reference keyed by normalized `Combined_Key`.
#[derive(Debug, Default)]
pub struct PopulationLookup {
    entries: HashMap<String, LookupEntry>,
}

impl PopulationLookup {
    /// Builds the lookup from the raw reference table. Entries with an empty
    /// or zero population are discarded; the first of several entries with
    /// the same normalized key wins.
    pub fn from_table(table: &RawTable) -> Result<Self, TidyError> {
        let key_idx = table
            .column_index("Combined_Key")
            .ok_or_else(|| TidyError::MissingColumn("Combined_Key".to_string()))?;
        let pop_idx = table
            .column_index("Population")
            .ok_or_else(|| TidyError::MissingColumn("Population".to_string()))?;

        let mut entries = Vec::new();
        for row in table.rows() {
            let population = parse_count("Population", &row[pop_idx])?;
            entries.push(LookupEntry {
                combined_key: row[key_idx].trim().to_string(),
                population,
            });
        }

        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = LookupEntry>) -> Self {
        let mut lookup: HashMap<String, LookupEntry> = HashMap::new();
        let mut unusable = 0usize;

        for entry in entries {
            if entry.population == 0 {
                unusable += 1;
                continue;
            }
            let key = normalize_key(&entry.combined_key);
            if let Some(existing) = lookup.get(&key) {
                warn!(
                    key = %entry.combined_key,
                    kept = existing.population,
                    ignored = entry.population,
                    "Duplicate lookup key"
                );
                continue;
            }
            lookup.insert(key, entry);
        }

        debug!(usable = lookup.len(), unusable, "Population lookup built");
        Self { entries: lookup }
    }

    pub fn population(&self, country: &str) -> Option<u64> {
        self.entries.get(&normalize_key(country)).map(|e| e.population)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keys dropped by a join, grouped by reason.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    /// Keys present in the cases table only.
    pub cases_only: Vec<String>,
    /// Keys present in the deaths table only.
    pub deaths_only: Vec<String>,
    /// Countries with no usable lookup population.
    pub missing_population: Vec<String>,
}

impl JoinReport {
    pub fn is_clean(&self) -> bool {
        self.cases_only.is_empty() && self.deaths_only.is_empty() && self.missing_population.is_empty()
    }

    pub fn log(&self, join: &str) {
        if self.is_clean() {
            debug!(join, "All keys matched");
            return;
        }
        warn!(
            join,
            cases_only = ?self.cases_only,
            deaths_only = ?self.deaths_only,
            missing_population = ?self.missing_population,
            "Join dropped unmatched keys"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsDaily {
    pub date: NaiveDate,
    pub cases: u64,
    pub deaths: u64,
    pub population: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalDaily {
    pub date: NaiveDate,
    pub country: String,
    pub cases: u64,
    pub deaths: u64,
    pub population: u64,
}

fn by_date(observations: &[LongObservation]) -> BTreeMap<NaiveDate, (u64, u64)> {
    let mut out: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for obs in observations {
        let entry = out.entry(obs.date).or_default();
        entry.0 += obs.value;
        entry.1 += obs.population.unwrap_or(0);
    }
    out
}

/// Joins the US case and death aggregates on date. Population comes from the
/// deaths side.
pub fn join_us(cases: &[LongObservation], deaths: &[LongObservation]) -> (Vec<UsDaily>, JoinReport) {
    let cases = by_date(cases);
    let deaths = by_date(deaths);

    let mut report = JoinReport::default();
    let mut out = Vec::with_capacity(cases.len().min(deaths.len()));

    for (date, (case_count, _)) in &cases {
        match deaths.get(date) {
            Some(&(death_count, population)) => out.push(UsDaily {
                date: *date,
                cases: *case_count,
                deaths: death_count,
                population,
            }),
            None => report.cases_only.push(date.to_string()),
        }
    }
    report.deaths_only = deaths
        .keys()
        .filter(|date| !cases.contains_key(date))
        .map(NaiveDate::to_string)
        .collect();

    (out, report)
}

/// Attaches lookup population to the global deaths, then joins with the
/// global cases on (date, country). The country name is taken from the
/// time-series tables; the lookup is matched on its normalized form.
pub fn join_global(
    cases: &[LongObservation],
    deaths: &[LongObservation],
    lookup: &PopulationLookup,
) -> (Vec<GlobalDaily>, JoinReport) {
    let mut missing_population = BTreeSet::new();
    let mut deaths_with_pop: BTreeMap<(NaiveDate, &str), (u64, u64)> = BTreeMap::new();

    for obs in deaths {
        match lookup.population(&obs.key) {
            Some(population) => {
                deaths_with_pop.insert((obs.date, obs.key.as_str()), (obs.value, population));
            }
            None => {
                missing_population.insert(obs.key.clone());
            }
        }
    }

    let mut cases_only = BTreeSet::new();
    let mut matched = BTreeSet::new();
    let mut out = Vec::with_capacity(cases.len());

    for obs in cases {
        let key = (obs.date, obs.key.as_str());
        match deaths_with_pop.get(&key) {
            Some(&(deaths, population)) => {
                matched.insert(key);
                out.push(GlobalDaily {
                    date: obs.date,
                    country: obs.key.clone(),
                    cases: obs.value,
                    deaths,
                    population,
                });
            }
            None if !missing_population.contains(&obs.key) => {
                cases_only.insert(obs.key.clone());
            }
            None => {}
        }
    }

    let (excluded, deaths_only): (BTreeSet<String>, BTreeSet<String>) = deaths_with_pop
        .keys()
        .filter(|key| !matched.contains(*key))
        .map(|(_, country)| country.to_string())
        .partition(|country| EXCLUDED_CASE_COUNTRIES.contains(&country.as_str()));
    if !excluded.is_empty() {
        debug!(?excluded, "Deaths kept out of the join by the case exclusion list");
    }

    out.sort_by(|a, b| (a.date, &a.country).cmp(&(b.date, &b.country)));

    let report = JoinReport {
        cases_only: cases_only.into_iter().collect(),
        deaths_only: deaths_only.into_iter().collect(),
        missing_population: missing_population.into_iter().collect(),
    };
    (out, report)
}
