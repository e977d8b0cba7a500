use chrono::NaiveDate;
use covid_rates::config::{NOISE_FLOOR_PER_THOUSAND, Sources};
use covid_rates::fetch::BasicClient;
use covid_rates::metrics::RankedCountry;
use covid_rates::pipeline::{RawInputs, Unified, analyze, fetch_inputs, unify, write_outputs};
use covid_rates::table::RawTable;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn table(bytes: &[u8]) -> RawTable {
    RawTable::from_csv(bytes).expect("fixture is valid CSV")
}

fn fixture_inputs() -> RawInputs {
    RawInputs {
        us_cases: table(include_bytes!("fixtures/us_cases.csv")),
        us_deaths: table(include_bytes!("fixtures/us_deaths.csv")),
        global_cases: table(include_bytes!("fixtures/global_cases.csv")),
        global_deaths: table(include_bytes!("fixtures/global_deaths.csv")),
        lookup: table(include_bytes!("fixtures/lookup.csv")),
    }
}

fn unified() -> Unified {
    unify(&fixture_inputs()).expect("fixtures unify")
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
}

#[test]
fn test_us_population_sums_jurisdictions_per_date() {
    let unified = unified();

    assert_eq!(unified.us.len(), 3);
    let cases: Vec<u64> = unified.us.iter().map(|r| r.daily.cases).collect();
    let deaths: Vec<u64> = unified.us.iter().map(|r| r.daily.deaths).collect();
    assert_eq!(cases, [1, 5, 10]);
    assert_eq!(deaths, [0, 1, 2]);
    assert!(unified.us.iter().all(|r| r.daily.population == 4000));
    assert_eq!(unified.us[0].daily.date, date(22));
    assert!(unified.us_join.is_clean());
}

#[test]
fn test_global_table_excludes_and_reports() {
    let unified = unified();
    let countries: Vec<&str> = unified
        .global
        .iter()
        .filter(|r| r.daily.date == date(22))
        .map(|r| r.daily.country.as_str())
        .collect();

    assert_eq!(countries, ["China", "Italy", "Spain", "Tuvalu"]);
    assert_eq!(unified.global.len(), 12);
    assert!(unified.global.iter().all(|r| r.daily.population > 0));
    assert_eq!(unified.global_join.missing_population, ["Narnia"]);
    assert!(unified.global_join.deaths_only.is_empty());
    assert!(unified.global_join.cases_only.is_empty());
}

#[test]
fn test_global_rates_match_definition() {
    for r in &unified().global {
        let expected = r.daily.cases as f64 / r.daily.population as f64 * 1000.0;
        assert!((r.cases_per_thousand - expected).abs() < 1e-9);
        let expected = r.daily.deaths as f64 / r.daily.population as f64 * 1000.0;
        assert!((r.deaths_per_thousand - expected).abs() < 1e-9);
    }
}

#[test]
fn test_rankings_at_latest_date() {
    let analysis = analyze(&unified()).unwrap();
    let rankings = &analysis.report.rankings;
    fn names(list: &[RankedCountry]) -> Vec<&str> {
        list.iter().map(|r| r.country.as_str()).collect()
    }

    assert_eq!(rankings.date, Some(date(24)));
    assert_eq!(names(&rankings.top_cases), ["Italy", "Spain", "China", "Tuvalu"]);
    assert_eq!(names(&rankings.bottom_cases), ["China", "Spain", "Italy"]);
    assert_eq!(names(&rankings.top_deaths), ["Italy", "China", "Spain", "Tuvalu"]);
    assert_eq!(names(&rankings.bottom_deaths), ["China", "Italy"]);
    assert!(
        rankings
            .bottom_cases
            .iter()
            .chain(&rankings.bottom_deaths)
            .all(|r| r.rate > NOISE_FLOOR_PER_THOUSAND)
    );
}

#[test]
fn test_us_model_through_origin() {
    let analysis = analyze(&unified()).unwrap();

    // x = [0.25, 1.25, 2.5], y = [0, 0.25, 0.5]
    let expected = (1.25 * 0.25 + 2.5 * 0.5) / (0.25f64.powi(2) + 1.25f64.powi(2) + 2.5f64.powi(2));
    assert!((analysis.report.model.slope - expected).abs() < 1e-12);
    assert_eq!(analysis.fitted.len(), 3);
    for row in &analysis.fitted {
        assert!((row.predicted_deaths_per_thousand - expected * row.cases_per_thousand).abs() < 1e-9);
    }
}

#[test]
fn test_malformed_date_aborts_unify() {
    let mut inputs = fixture_inputs();
    inputs.global_deaths =
        RawTable::from_csv(b"Province/State,Country/Region,Lat,Long,2020-01-22\n,Italy,0,0,1\n").unwrap();

    let err = unify(&inputs).unwrap_err();
    assert!(format!("{err:#}").contains("2020-01-22"));
}

#[tokio::test]
async fn test_full_pipeline_from_local_sources() {
    let sources = Sources {
        us_cases: fixture_path("us_cases.csv"),
        us_deaths: fixture_path("us_deaths.csv"),
        global_cases: fixture_path("global_cases.csv"),
        global_deaths: fixture_path("global_deaths.csv"),
        lookup: fixture_path("lookup.csv"),
    };
    let inputs = fetch_inputs(&BasicClient::new(), &sources).await.unwrap();
    let unified = unify(&inputs).unwrap();
    let analysis = analyze(&unified).unwrap();

    let dir = std::env::temp_dir().join("covid_rates_integration_report");
    let _ = std::fs::remove_dir_all(&dir);
    write_outputs(&dir, &unified, &analysis).unwrap();

    for file in [
        "us_series.csv",
        "global_series.csv",
        "trajectories.csv",
        "us_fit.csv",
        "us_daily.csv",
        "global_daily.csv",
        "report.json",
    ] {
        assert!(dir.join(file).exists(), "{file} missing");
    }

    let us_series = std::fs::read_to_string(dir.join("us_series.csv")).unwrap();
    assert_eq!(us_series.lines().next(), Some("x,y,series"));
    assert_eq!(us_series.lines().count(), 1 + 3 * 2);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("report.json")).unwrap()).unwrap();
    assert_eq!(report["rankings"]["top_cases"][0]["country"], "Italy");
    assert_eq!(report["global_join"]["missing_population"][0], "Narnia");

    std::fs::remove_dir_all(&dir).unwrap();
}
