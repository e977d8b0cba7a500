//! Per-thousand rates and country rankings.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::{NOISE_FLOOR_PER_THOUSAND, RANK_SIZE};
use crate::join::{GlobalDaily, UsDaily};

/// Count per thousand population. Callers must exclude `population == 0`.
pub fn per_thousand(count: u64, population: u64) -> f64 {
    count as f64 / population as f64 * 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cases,
    Deaths,
}

impl Metric {
    pub fn label(self) -> &'static str {
        match self {
            Metric::Cases => "cases_per_thousand",
            Metric::Deaths => "deaths_per_thousand",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsRates {
    pub daily: UsDaily,
    pub new_cases: u64,
    pub new_deaths: u64,
    pub cases_per_thousand: f64,
    pub deaths_per_thousand: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalRates {
    pub daily: GlobalDaily,
    pub new_cases: u64,
    pub new_deaths: u64,
    pub cases_per_thousand: f64,
    pub deaths_per_thousand: f64,
}

impl GlobalRates {
    pub fn rate(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cases => self.cases_per_thousand,
            Metric::Deaths => self.deaths_per_thousand,
        }
    }
}

/// Day-over-day increase. Downward revisions and the first day of a series
/// yield zero.
fn increase(previous: Option<u64>, current: u64) -> u64 {
    previous.map_or(0, |p| current.saturating_sub(p))
}

/// Derives rates for the US table. Rows must be ordered by date.
pub fn us_rates(rows: &[UsDaily]) -> Vec<UsRates> {
    let mut previous: Option<(u64, u64)> = None;
    let mut out = Vec::with_capacity(rows.len());

    for row in rows.iter().filter(|r| r.population > 0) {
        out.push(UsRates {
            daily: *row,
            new_cases: increase(previous.map(|p| p.0), row.cases),
            new_deaths: increase(previous.map(|p| p.1), row.deaths),
            cases_per_thousand: per_thousand(row.cases, row.population),
            deaths_per_thousand: per_thousand(row.deaths, row.population),
        });
        previous = Some((row.cases, row.deaths));
    }

    out
}

/// Derives rates for the global table. Rows must be ordered by date; the
/// day-over-day increase is tracked per country.
pub fn global_rates(rows: &[GlobalDaily]) -> Vec<GlobalRates> {
    let mut previous: HashMap<&str, (u64, u64)> = HashMap::new();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows.iter().filter(|r| r.population > 0) {
        let prev = previous.insert(row.country.as_str(), (row.cases, row.deaths));
        out.push(GlobalRates {
            daily: row.clone(),
            new_cases: increase(prev.map(|p| p.0), row.cases),
            new_deaths: increase(prev.map(|p| p.1), row.deaths),
            cases_per_thousand: per_thousand(row.cases, row.population),
            deaths_per_thousand: per_thousand(row.deaths, row.population),
        });
    }

    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCountry {
    pub country: String,
    pub rate: f64,
    pub population: u64,
}

/// Highest `n` rates, descending. Equal rates keep input order.
pub fn top(rows: &[&GlobalRates], metric: Metric, n: usize) -> Vec<RankedCountry> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.rate(metric).total_cmp(&a.rate(metric)));
    sorted.into_iter().take(n).map(|r| ranked(r, metric)).collect()
}

/// Lowest `n` rates strictly above `floor`, ascending. Equal rates keep
/// input order.
pub fn bottom(rows: &[&GlobalRates], metric: Metric, n: usize, floor: f64) -> Vec<RankedCountry> {
    let mut eligible: Vec<_> = rows.iter().copied().filter(|r| r.rate(metric) > floor).collect();
    eligible.sort_by(|a, b| a.rate(metric).total_cmp(&b.rate(metric)));
    eligible.into_iter().take(n).map(|r| ranked(r, metric)).collect()
}

fn ranked(row: &GlobalRates, metric: Metric) -> RankedCountry {
    RankedCountry {
        country: row.daily.country.clone(),
        rate: row.rate(metric),
        population: row.daily.population,
    }
}

/// Top and bottom countries at the latest reported date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rankings {
    pub date: Option<NaiveDate>,
    pub top_cases: Vec<RankedCountry>,
    pub bottom_cases: Vec<RankedCountry>,
    pub top_deaths: Vec<RankedCountry>,
    pub bottom_deaths: Vec<RankedCountry>,
}

impl Rankings {
    pub fn top(&self, metric: Metric) -> &[RankedCountry] {
        match metric {
            Metric::Cases => &self.top_cases,
            Metric::Deaths => &self.top_deaths,
        }
    }

    pub fn bottom(&self, metric: Metric) -> &[RankedCountry] {
        match metric {
            Metric::Cases => &self.bottom_cases,
            Metric::Deaths => &self.bottom_deaths,
        }
    }
}

/// Ranks countries on the single latest date of `rows`. The slice at that
/// date is taken in input order (country name for tidy output), which
/// decides ties.
pub fn rank(rows: &[GlobalRates]) -> Rankings {
    let Some(latest) = rows.iter().map(|r| r.daily.date).max() else {
        return Rankings::default();
    };
    let slice: Vec<&GlobalRates> = rows.iter().filter(|r| r.daily.date == latest).collect();

    Rankings {
        date: Some(latest),
        top_cases: top(&slice, Metric::Cases, RANK_SIZE),
        bottom_cases: bottom(&slice, Metric::Cases, RANK_SIZE, NOISE_FLOOR_PER_THOUSAND),
        top_deaths: top(&slice, Metric::Deaths, RANK_SIZE),
        bottom_deaths: bottom(&slice, Metric::Deaths, RANK_SIZE, NOISE_FLOOR_PER_THOUSAND),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
    }

    fn global(d: u32, country: &str, cases: u64, deaths: u64, population: u64) -> GlobalDaily {
        GlobalDaily {
            date: date(d),
            country: country.to_string(),
            cases,
            deaths,
            population,
        }
    }

    /// Ten countries at day 2 with cases_per_thousand 0..=9, plus one under
    /// the noise floor.
    fn ranking_fixture() -> Vec<GlobalRates> {
        let mut rows = vec![global(1, "Old", 1_000_000, 1_000, 1_000)];
        for i in 0..10u64 {
            rows.push(global(2, &format!("C{i}"), i * 1_000, i * 10, 1_000_000));
        }
        rows.push(global(2, "Floor", 5, 5, 1_000_000));
        global_rates(&rows)
    }

    #[test]
    fn test_per_thousand_definition() {
        assert_eq!(per_thousand(5, 1000), 5.0);
        assert!((per_thousand(1, 3) - 1.0 / 3.0 * 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_us_rates_drop_zero_population_and_track_increases() {
        let rows = vec![
            UsDaily { date: date(1), cases: 10, deaths: 1, population: 0 },
            UsDaily { date: date(2), cases: 10, deaths: 1, population: 1000 },
            UsDaily { date: date(3), cases: 25, deaths: 2, population: 1000 },
            UsDaily { date: date(4), cases: 20, deaths: 2, population: 1000 },
        ];
        let rates = us_rates(&rows);

        assert_eq!(rates.len(), 3);
        assert!(rates.iter().all(|r| r.daily.population > 0));
        assert_eq!(rates[0].new_cases, 0);
        assert_eq!(rates[1].new_cases, 15);
        assert_eq!(rates[1].new_deaths, 1);
        assert_eq!(rates[2].new_cases, 0);
        for r in &rates {
            let expected = r.daily.cases as f64 / r.daily.population as f64 * 1000.0;
            assert!((r.cases_per_thousand - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_global_rates_increase_is_per_country() {
        let rows = vec![
            global(1, "A", 10, 0, 100),
            global(1, "B", 100, 0, 100),
            global(2, "A", 12, 1, 100),
            global(2, "B", 150, 0, 100),
        ];
        let rates = global_rates(&rows);
        assert_eq!(rates[2].new_cases, 2);
        assert_eq!(rates[3].new_cases, 50);
        assert_eq!(rates[2].new_deaths, 1);
    }

    #[test]
    fn test_rank_uses_latest_date_only() {
        let rankings = rank(&ranking_fixture());
        assert_eq!(rankings.date, Some(date(2)));
        assert!(rankings.top_cases.iter().all(|r| r.country != "Old"));
    }

    #[test]
    fn test_top_sorted_descending() {
        let rankings = rank(&ranking_fixture());
        let names: Vec<_> = rankings.top_cases.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(names, ["C9", "C8", "C7", "C6", "C5"]);
        assert!(rankings.top_cases.windows(2).all(|w| w[0].rate >= w[1].rate));
    }

    #[test]
    fn test_bottom_excludes_noise_floor() {
        let rankings = rank(&ranking_fixture());
        let names: Vec<_> = rankings.bottom_cases.iter().map(|r| r.country.as_str()).collect();
        // C0 has rate 0 and Floor sits below 0.01.
        assert_eq!(names, ["C1", "C2", "C3", "C4", "C5"]);
        assert!(rankings.bottom_cases.iter().all(|r| r.rate > NOISE_FLOOR_PER_THOUSAND));
        assert!(rankings.bottom_cases.windows(2).all(|w| w[0].rate <= w[1].rate));
    }

    #[test]
    fn test_bottom_shorter_when_few_clear_floor() {
        let rows = global_rates(&[
            global(1, "A", 0, 0, 1000),
            global(1, "B", 1, 0, 1000),
            global(1, "C", 0, 0, 1000),
        ]);
        let rankings = rank(&rows);
        assert_eq!(rankings.bottom_cases.len(), 1);
        assert!(rankings.bottom_deaths.is_empty());
        assert_eq!(rankings.top_deaths.len(), 3);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let rows = global_rates(&[
            global(1, "Alpha", 5, 0, 1000),
            global(1, "Beta", 5, 0, 1000),
            global(1, "Gamma", 5, 0, 1000),
        ]);
        let refs: Vec<&GlobalRates> = rows.iter().collect();
        let names: Vec<_> = top(&refs, Metric::Cases, 2).into_iter().map(|r| r.country).collect();
        assert_eq!(names, ["Alpha", "Beta"]);
    }

    #[test]
    fn test_rank_empty() {
        assert_eq!(rank(&[]), Rankings::default());
    }
}
