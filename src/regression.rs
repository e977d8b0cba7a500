//! Least-squares line through the origin.
//!
//! Fits `deaths_per_thousand = slope * cases_per_thousand`, i.e. a constant
//! case-fatality ratio, over the US daily series.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::metrics::UsRates;

#[derive(Debug, Error, PartialEq)]
pub enum RegressionError {
    #[error("Cannot fit a line through the origin: all {0} predictor values are zero.")]
    DegenerateFit(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FittedModel {
    pub slope: f64,
    /// Residual sum of squares.
    pub rss: f64,
    pub observations: usize,
}

impl FittedModel {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x
    }
}

/// Ordinary least squares without intercept: `slope = Σxy / Σx²`.
pub fn fit_through_origin(points: &[(f64, f64)]) -> Result<FittedModel, RegressionError> {
    let sxx: f64 = points.iter().map(|(x, _)| x * x).sum();
    if sxx == 0.0 {
        return Err(RegressionError::DegenerateFit(points.len()));
    }
    let sxy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let slope = sxy / sxx;

    let rss = points.iter().map(|(x, y)| (y - slope * x).powi(2)).sum();

    Ok(FittedModel {
        slope,
        rss,
        observations: points.len(),
    })
}

/// A US observation with the model's prediction attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedRow {
    pub date: NaiveDate,
    pub cases_per_thousand: f64,
    pub deaths_per_thousand: f64,
    pub predicted_deaths_per_thousand: f64,
}

#[tracing::instrument(skip(rows), fields(rows = rows.len()))]
pub fn fit_us(rows: &[UsRates]) -> Result<(FittedModel, Vec<FittedRow>), RegressionError> {
    let points: Vec<(f64, f64)> = rows
        .iter()
        .map(|r| (r.cases_per_thousand, r.deaths_per_thousand))
        .collect();
    let model = fit_through_origin(&points)?;

    let fitted = rows
        .iter()
        .map(|r| FittedRow {
            date: r.daily.date,
            cases_per_thousand: r.cases_per_thousand,
            deaths_per_thousand: r.deaths_per_thousand,
            predicted_deaths_per_thousand: model.predict(r.cases_per_thousand),
        })
        .collect();

    tracing::info!(slope = model.slope, rss = model.rss, "US deaths-on-cases model fitted");
    Ok((model, fitted))
}
