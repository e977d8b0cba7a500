//! Source locations, wide-table layouts and the tunable constants of the
//! report.

use crate::tidy::WideLayout;

const JHU_BASE: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data";

/// Countries dropped from the global case series before aggregation.
///
/// North Korea reports implausible figures; keeping it would place a
/// population of ~25M with near-zero cases at the bottom of every ranking.
pub const EXCLUDED_CASE_COUNTRIES: &[&str] = &["Korea, North"];

/// Rates at or below this many per thousand are treated as unreported when
/// picking the lowest-ranked countries.
pub const NOISE_FLOOR_PER_THOUSAND: f64 = 0.01;

/// Length of each top/bottom ranking.
pub const RANK_SIZE: usize = 5;

pub const US_CASES_LAYOUT: WideLayout = WideLayout {
    key_column: "Country_Region",
    last_id_column: "Combined_Key",
    population_column: None,
    excluded_keys: &[],
};

/// The US deaths file is the only US file carrying `Population`.
pub const US_DEATHS_LAYOUT: WideLayout = WideLayout {
    key_column: "Country_Region",
    last_id_column: "Population",
    population_column: Some("Population"),
    excluded_keys: &[],
};

pub const GLOBAL_CASES_LAYOUT: WideLayout = WideLayout {
    key_column: "Country/Region",
    last_id_column: "Long",
    population_column: None,
    excluded_keys: EXCLUDED_CASE_COUNTRIES,
};

pub const GLOBAL_DEATHS_LAYOUT: WideLayout = WideLayout {
    key_column: "Country/Region",
    last_id_column: "Long",
    population_column: None,
    excluded_keys: &[],
};

/// Where each input table is read from: an `http(s)` URL or a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sources {
    pub us_cases: String,
    pub us_deaths: String,
    pub global_cases: String,
    pub global_deaths: String,
    pub lookup: String,
}

impl Default for Sources {
    fn default() -> Self {
        let series = |name: &str| format!("{JHU_BASE}/csse_covid_19_time_series/{name}");
        Self {
            us_cases: series("time_series_covid19_confirmed_US.csv"),
            us_deaths: series("time_series_covid19_deaths_US.csv"),
            global_cases: series("time_series_covid19_confirmed_global.csv"),
            global_deaths: series("time_series_covid19_deaths_global.csv"),
            lookup: format!("{JHU_BASE}/UID_ISO_FIPS_LookUp_Table.csv"),
        }
    }
}

impl Sources {
    /// Defaults overridden by `COVID_*_URL` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            us_cases: var("COVID_US_CASES_URL").unwrap_or(defaults.us_cases),
            us_deaths: var("COVID_US_DEATHS_URL").unwrap_or(defaults.us_deaths),
            global_cases: var("COVID_GLOBAL_CASES_URL").unwrap_or(defaults.global_cases),
            global_deaths: var("COVID_GLOBAL_DEATHS_URL").unwrap_or(defaults.global_deaths),
            lookup: var("COVID_LOOKUP_URL").unwrap_or(defaults.lookup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources_point_at_jhu() {
        let sources = Sources::default();
        assert!(sources.us_deaths.ends_with("time_series_covid19_deaths_US.csv"));
        assert!(sources.lookup.ends_with("UID_ISO_FIPS_LookUp_Table.csv"));
        assert!(sources.global_cases.starts_with("https://"));
    }

    #[test]
    fn test_env_overrides_single_source() {
        let sources = Sources::from_lookup(|name| {
            (name == "COVID_LOOKUP_URL").then(|| "fixtures/lookup.csv".to_string())
        });
        assert_eq!(sources.lookup, "fixtures/lookup.csv");
        assert_eq!(sources.us_cases, Sources::default().us_cases);
    }
}
