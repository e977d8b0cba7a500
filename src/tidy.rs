//! Wide-to-long reshaping of the time-series tables.
//!
//! Each source row carries identifying columns followed by one count column
//! per reporting date. [`melt`] turns every date cell into a row and
//! [`tidy`] additionally sums rows sharing a (date, key) pair, which
//! collapses per-province rows into country totals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::table::RawTable;

/// Errors raised while reshaping a raw table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TidyError {
    #[error("The required column '{0}' was not found in the table.")]
    MissingColumn(String),
    #[error("Column header '{0}' is not a M/D/YY date.")]
    MalformedDate(String),
    #[error("Value '{value}' in column '{column}' is not a non-negative integer count.")]
    MalformedCount { column: String, value: String },
}

/// Describes which columns of a wide table identify the entity.
///
/// Every column after `last_id_column` is a date column.
#[derive(Debug, Clone, Copy)]
pub struct WideLayout {
    pub key_column: &'static str,
    pub last_id_column: &'static str,
    pub population_column: Option<&'static str>,
    pub excluded_keys: &'static [&'static str],
}

/// One (date, entity) count.
///
/// `population` is carried only from tables that have a population column,
/// and is summed alongside `value` when rows are grouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongObservation {
    pub date: NaiveDate,
    pub key: String,
    pub value: u64,
    pub population: Option<u64>,
}

/// Parses a `M/D/YY` reporting date. Two-digit years follow chrono's `%y`
/// rule, so `20` is 2020 and `99` is 1999.
pub fn parse_report_date(s: &str) -> Result<NaiveDate, TidyError> {
    let malformed = || TidyError::MalformedDate(s.to_string());

    let trimmed = s.trim();
    if !trimmed.chars().all(|c| c.is_ascii_digit() || c == '/') {
        return Err(malformed());
    }
    // %y also accepts a single digit; the headers always carry two.
    if trimmed.rsplit('/').next().map(str::len) != Some(2) {
        return Err(malformed());
    }

    NaiveDate::parse_from_str(trimmed, "%m/%d/%y").map_err(|_| malformed())
}

/// Parses a count cell. Empty cells count as zero.
pub fn parse_count(column: &str, value: &str) -> Result<u64, TidyError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse().map_err(|_| TidyError::MalformedCount {
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn require_column(table: &RawTable, name: &str) -> Result<usize, TidyError> {
    table
        .column_index(name)
        .ok_or_else(|| TidyError::MissingColumn(name.to_string()))
}

/// Emits one observation per date column of every row, skipping rows whose
/// key is excluded by the layout. No grouping is done.
pub fn melt(table: &RawTable, layout: &WideLayout) -> Result<Vec<LongObservation>, TidyError> {
    let key_idx = require_column(table, layout.key_column)?;
    let first_date_idx = require_column(table, layout.last_id_column)? + 1;
    let population_idx = layout
        .population_column
        .map(|name| require_column(table, name))
        .transpose()?;

    let headers = table.headers();
    let dates = headers[first_date_idx..]
        .iter()
        .map(|h| parse_report_date(h))
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(table.rows().len() * dates.len());

    for row in table.rows() {
        let key = row[key_idx].trim();
        if layout.excluded_keys.contains(&key) {
            continue;
        }

        let population = population_idx
            .map(|idx| parse_count(&headers[idx], &row[idx]))
            .transpose()?;

        for (offset, date) in dates.iter().enumerate() {
            let idx = first_date_idx + offset;
            out.push(LongObservation {
                date: *date,
                key: key.to_string(),
                value: parse_count(&headers[idx], &row[idx])?,
                population,
            });
        }
    }

    Ok(out)
}

/// Sums observations sharing a (date, key) pair. Output is ordered by date,
/// then key.
pub fn group_sum(observations: impl IntoIterator<Item = LongObservation>) -> Vec<LongObservation> {
    let mut groups: BTreeMap<(NaiveDate, String), (u64, Option<u64>)> = BTreeMap::new();

    for obs in observations {
        let entry = groups.entry((obs.date, obs.key)).or_insert((0, None));
        entry.0 += obs.value;
        entry.1 = match (entry.1, obs.population) {
            (Some(acc), Some(p)) => Some(acc + p),
            (None, p) => p,
            (acc, None) => acc,
        };
    }

    groups
        .into_iter()
        .map(|((date, key), (value, population))| LongObservation {
            date,
            key,
            value,
            population,
        })
        .collect()
}

/// Melts and groups a wide table in one step.
#[tracing::instrument(skip(table), fields(key = layout.key_column))]
pub fn tidy(table: &RawTable, layout: &WideLayout) -> Result<Vec<LongObservation>, TidyError> {
    let melted = melt(table, layout)?;
    let melted_rows = melted.len();
    let grouped = group_sum(melted);
    tracing::debug!(melted_rows, grouped_rows = grouped.len(), "Table tidied");
    Ok(grouped)
}
