use serde::Serialize;
use tracing::info;

use crate::metrics::{GlobalRates, UsRates};

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the population standard deviation given a pre-computed mean.
/// Returns 0.0 for empty input.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub table: &'static str,
    pub column: &'static str,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
}

impl ColumnSummary {
    pub fn from_values(table: &'static str, column: &'static str, values: &[f64]) -> Self {
        let avg = mean(values);
        let (min, max) = if values.is_empty() {
            (0.0, 0.0)
        } else {
            values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
        };

        Self {
            table,
            column,
            count: values.len(),
            min,
            max,
            mean: avg,
            stddev: stddev(values, avg),
        }
    }

    pub fn log(&self) {
        info!(
            table = self.table,
            column = self.column,
            count = self.count,
            min = self.min,
            max = self.max,
            mean = self.mean,
            stddev = self.stddev,
            "Column summary"
        );
    }
}

macro_rules! summarize {
    ($table:expr, $rows:expr, $($column:literal => $get:expr),+ $(,)?) => {
        vec![$(
            ColumnSummary::from_values(
                $table,
                $column,
                &$rows.iter().map($get).collect::<Vec<f64>>(),
            )
        ),+]
    };
}

pub fn summarize_us(rows: &[UsRates]) -> Vec<ColumnSummary> {
    summarize!("us", rows,
        "cases" => |r: &UsRates| r.daily.cases as f64,
        "deaths" => |r: &UsRates| r.daily.deaths as f64,
        "population" => |r: &UsRates| r.daily.population as f64,
        "new_cases" => |r: &UsRates| r.new_cases as f64,
        "new_deaths" => |r: &UsRates| r.new_deaths as f64,
        "cases_per_thousand" => |r: &UsRates| r.cases_per_thousand,
        "deaths_per_thousand" => |r: &UsRates| r.deaths_per_thousand,
    )
}

pub fn summarize_global(rows: &[GlobalRates]) -> Vec<ColumnSummary> {
    summarize!("global", rows,
        "cases" => |r: &GlobalRates| r.daily.cases as f64,
        "deaths" => |r: &GlobalRates| r.daily.deaths as f64,
        "population" => |r: &GlobalRates| r.daily.population as f64,
        "new_cases" => |r: &GlobalRates| r.new_cases as f64,
        "new_deaths" => |r: &GlobalRates| r.new_deaths as f64,
        "cases_per_thousand" => |r: &GlobalRates| r.cases_per_thousand,
        "deaths_per_thousand" => |r: &GlobalRates| r.deaths_per_thousand,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::UsDaily;
    use crate::metrics::us_rates;
    use chrono::NaiveDate;

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_stddev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(stddev(&values, 5.0), 2.0);
    }

    #[test]
    fn test_column_summary_min_max() {
        let s = ColumnSummary::from_values("t", "c", &[3.0, -1.0, 10.0]);
        assert_eq!(s.count, 3);
        assert_eq!(s.min, -1.0);
        assert_eq!(s.max, 10.0);
        assert_eq!(s.mean, 4.0);
    }

    #[test]
    fn test_column_summary_empty() {
        let s = ColumnSummary::from_values("t", "c", &[]);
        assert_eq!(s.count, 0);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 0.0);
    }

    #[test]
    fn test_summarize_us_covers_every_column() {
        let rows = us_rates(&[
            UsDaily {
                date: NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
                cases: 10,
                deaths: 1,
                population: 1000,
            },
            UsDaily {
                date: NaiveDate::from_ymd_opt(2020, 5, 2).unwrap(),
                cases: 30,
                deaths: 3,
                population: 1000,
            },
        ]);
        let summaries = summarize_us(&rows);

        assert_eq!(summaries.len(), 7);
        assert_eq!(summaries[0].column, "cases");
        assert_eq!(summaries[0].mean, 20.0);
        assert_eq!(summaries[3].max, 20.0);
        summaries.iter().for_each(ColumnSummary::log);
    }
}
