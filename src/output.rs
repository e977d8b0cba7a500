//! Chart-ready series and their persistence.
//!
//! Every chart is a flat list of [`ChartPoint`]s; a plotting tool groups by
//! `series` and draws `y` against `x`.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::metrics::{GlobalRates, Metric, RankedCountry, UsRates};
use crate::regression::FittedRow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: NaiveDate,
    pub y: f64,
    pub series: String,
}

impl ChartPoint {
    fn new(x: NaiveDate, y: f64, series: &str) -> Self {
        Self {
            x,
            y,
            series: series.to_string(),
        }
    }
}

/// Flat CSV row of the unified US table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsRecord {
    pub date: NaiveDate,
    pub cases: u64,
    pub deaths: u64,
    pub population: u64,
    pub new_cases: u64,
    pub new_deaths: u64,
    pub cases_per_thousand: f64,
    pub deaths_per_thousand: f64,
}

impl From<&UsRates> for UsRecord {
    fn from(r: &UsRates) -> Self {
        Self {
            date: r.daily.date,
            cases: r.daily.cases,
            deaths: r.daily.deaths,
            population: r.daily.population,
            new_cases: r.new_cases,
            new_deaths: r.new_deaths,
            cases_per_thousand: r.cases_per_thousand,
            deaths_per_thousand: r.deaths_per_thousand,
        }
    }
}

/// Flat CSV row of the unified global table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalRecord {
    pub date: NaiveDate,
    pub country: String,
    pub cases: u64,
    pub deaths: u64,
    pub population: u64,
    pub new_cases: u64,
    pub new_deaths: u64,
    pub cases_per_thousand: f64,
    pub deaths_per_thousand: f64,
}

impl From<&GlobalRates> for GlobalRecord {
    fn from(r: &GlobalRates) -> Self {
        Self {
            date: r.daily.date,
            country: r.daily.country.clone(),
            cases: r.daily.cases,
            deaths: r.daily.deaths,
            population: r.daily.population,
            new_cases: r.new_cases,
            new_deaths: r.new_deaths,
            cases_per_thousand: r.cases_per_thousand,
            deaths_per_thousand: r.deaths_per_thousand,
        }
    }
}

/// US cumulative cases and deaths over time.
pub fn us_series(rows: &[UsRates]) -> Vec<ChartPoint> {
    let mut points = Vec::with_capacity(rows.len() * 2);
    for r in rows {
        points.push(ChartPoint::new(r.daily.date, r.daily.cases as f64, "cases"));
        points.push(ChartPoint::new(r.daily.date, r.daily.deaths as f64, "deaths"));
    }
    points
}

/// Worldwide cumulative cases and deaths, summed over countries per date.
pub fn global_series(rows: &[GlobalRates]) -> Vec<ChartPoint> {
    let mut totals: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for r in rows {
        let entry = totals.entry(r.daily.date).or_default();
        entry.0 += r.daily.cases;
        entry.1 += r.daily.deaths;
    }

    totals
        .into_iter()
        .flat_map(|(date, (cases, deaths))| {
            [
                ChartPoint::new(date, cases as f64, "cases"),
                ChartPoint::new(date, deaths as f64, "deaths"),
            ]
        })
        .collect()
}

/// Full history of `metric` for each ranked country, labelled by country.
pub fn trajectories(rows: &[GlobalRates], ranked: &[RankedCountry], metric: Metric) -> Vec<ChartPoint> {
    let wanted: HashSet<&str> = ranked.iter().map(|r| r.country.as_str()).collect();
    rows.iter()
        .filter(|r| wanted.contains(r.daily.country.as_str()))
        .map(|r| ChartPoint::new(r.daily.date, r.rate(metric), &r.daily.country))
        .collect()
}

/// Observed against predicted US deaths per thousand.
pub fn fit_series(rows: &[FittedRow]) -> Vec<ChartPoint> {
    rows.iter()
        .flat_map(|r| {
            [
                ChartPoint::new(r.date, r.deaths_per_thousand, "actual"),
                ChartPoint::new(r.date, r.predicted_deaths_per_thousand, "predicted"),
            ]
        })
        .collect()
}

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes serializable records to a CSV file, replacing any existing file.
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), records = records.len(), "Writing CSV");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes a value as pretty-printed JSON, replacing any existing file.
pub fn write_json(path: impl AsRef<Path>, value: &impl Serialize) -> Result<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Writing JSON");
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
