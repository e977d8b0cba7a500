//! End-to-end composition of the report stages.
//!
//! Fetching is the only async step; everything after [`RawInputs`] is a pure
//! function of its input.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::{
    GLOBAL_CASES_LAYOUT, GLOBAL_DEATHS_LAYOUT, Sources, US_CASES_LAYOUT, US_DEATHS_LAYOUT,
};
use crate::fetch::{HttpClient, fetch_table};
use crate::join::{JoinReport, PopulationLookup, join_global, join_us};
use crate::metrics::{GlobalRates, Metric, Rankings, UsRates, global_rates, rank, us_rates};
use crate::output::{
    ChartPoint, GlobalRecord, UsRecord, fit_series, global_series, trajectories, us_series,
    write_csv, write_json,
};
use crate::regression::{FittedModel, FittedRow, fit_us};
use crate::summary::{ColumnSummary, summarize_global, summarize_us};
use crate::table::RawTable;
use crate::tidy::tidy;

/// The five source tables, as delivered.
#[derive(Debug, Clone)]
pub struct RawInputs {
    pub us_cases: RawTable,
    pub us_deaths: RawTable,
    pub global_cases: RawTable,
    pub global_deaths: RawTable,
    pub lookup: RawTable,
}

/// Fetches every source in turn; the first failure aborts.
pub async fn fetch_inputs<C: HttpClient>(client: &C, sources: &Sources) -> Result<RawInputs> {
    Ok(RawInputs {
        us_cases: fetch_table(client, &sources.us_cases).await?,
        us_deaths: fetch_table(client, &sources.us_deaths).await?,
        global_cases: fetch_table(client, &sources.global_cases).await?,
        global_deaths: fetch_table(client, &sources.global_deaths).await?,
        lookup: fetch_table(client, &sources.lookup).await?,
    })
}

/// The joined daily tables with rates attached.
#[derive(Debug, Clone)]
pub struct Unified {
    pub us: Vec<UsRates>,
    pub global: Vec<GlobalRates>,
    pub us_join: JoinReport,
    pub global_join: JoinReport,
}

pub fn unify(inputs: &RawInputs) -> Result<Unified> {
    let us_cases = tidy(&inputs.us_cases, &US_CASES_LAYOUT).context("tidying US cases")?;
    let us_deaths = tidy(&inputs.us_deaths, &US_DEATHS_LAYOUT).context("tidying US deaths")?;
    let global_cases =
        tidy(&inputs.global_cases, &GLOBAL_CASES_LAYOUT).context("tidying global cases")?;
    let global_deaths =
        tidy(&inputs.global_deaths, &GLOBAL_DEATHS_LAYOUT).context("tidying global deaths")?;
    let lookup = PopulationLookup::from_table(&inputs.lookup).context("reading population lookup")?;

    let (us_daily, us_join) = join_us(&us_cases, &us_deaths);
    us_join.log("us");
    let (global_daily, global_join) = join_global(&global_cases, &global_deaths, &lookup);
    global_join.log("global");

    let us = us_rates(&us_daily);
    let global = global_rates(&global_daily);
    info!(
        us_rows = us.len(),
        us_dropped = us_daily.len() - us.len(),
        global_rows = global.len(),
        global_dropped = global_daily.len() - global.len(),
        "Unified tables built"
    );

    Ok(Unified {
        us,
        global,
        us_join,
        global_join,
    })
}

/// Scalar results of a run, written as `report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub rankings: Rankings,
    pub model: FittedModel,
    pub us_join: JoinReport,
    pub global_join: JoinReport,
    pub summaries: Vec<ColumnSummary>,
}

/// Report plus the per-row outputs behind the charts.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: Report,
    pub fitted: Vec<FittedRow>,
}

pub fn analyze(unified: &Unified) -> Result<Analysis> {
    let rankings = rank(&unified.global);
    let (model, fitted) = fit_us(&unified.us).context("fitting US deaths on cases")?;

    let mut summaries = summarize_us(&unified.us);
    summaries.extend(summarize_global(&unified.global));

    Ok(Analysis {
        report: Report {
            rankings,
            model,
            us_join: unified.us_join.clone(),
            global_join: unified.global_join.clone(),
            summaries,
        },
        fitted,
    })
}

/// Trajectories of every ranked country, labelled
/// `<top|bottom>_<metric>:<country>`.
pub fn ranked_trajectories(global: &[GlobalRates], rankings: &Rankings) -> Vec<ChartPoint> {
    let mut points = Vec::new();
    for metric in [Metric::Cases, Metric::Deaths] {
        for (list, ranked) in [("top", rankings.top(metric)), ("bottom", rankings.bottom(metric))] {
            points.extend(trajectories(global, ranked, metric).into_iter().map(|mut p| {
                p.series = format!("{list}_{}:{}", metric.label(), p.series);
                p
            }));
        }
    }
    points
}

/// Writes the chart series and the JSON report into `dir`.
#[tracing::instrument(skip(unified, analysis))]
pub fn write_outputs(dir: &Path, unified: &Unified, analysis: &Analysis) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    write_csv(dir.join("us_series.csv"), &us_series(&unified.us))?;
    write_csv(dir.join("global_series.csv"), &global_series(&unified.global))?;
    write_csv(
        dir.join("trajectories.csv"),
        &ranked_trajectories(&unified.global, &analysis.report.rankings),
    )?;
    write_csv(dir.join("us_fit.csv"), &fit_series(&analysis.fitted))?;
    let us_daily: Vec<UsRecord> = unified.us.iter().map(UsRecord::from).collect();
    write_csv(dir.join("us_daily.csv"), &us_daily)?;
    let global_daily: Vec<GlobalRecord> = unified.global.iter().map(GlobalRecord::from).collect();
    write_csv(dir.join("global_daily.csv"), &global_daily)?;
    write_json(dir.join("report.json"), &analysis.report)?;

    info!(dir = %dir.display(), "Report written");
    Ok(())
}
