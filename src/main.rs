//! CLI entry point for the COVID-19 rates report.
//!
//! Provides subcommands for producing the full report, printing the country
//! rankings, and fitting the US deaths-on-cases model.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use covid_rates::config::Sources;
use covid_rates::fetch::BasicClient;
use covid_rates::metrics::{Metric, rank};
use covid_rates::output::print_json;
use covid_rates::pipeline::{Unified, analyze, fetch_inputs, unify, write_outputs};
use covid_rates::regression::fit_us;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "covid_rates")]
#[command(about = "Per-capita COVID-19 case and death report", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline and write chart series plus report.json
    Report {
        /// Directory to write CSV series and the JSON report to
        #[arg(short, long, default_value = "reports")]
        output_dir: PathBuf,
    },
    /// Print the top and bottom countries at the latest date
    Rank {
        /// Rate to rank by
        #[arg(short, long, value_enum, default_value_t = MetricArg::Cases)]
        metric: MetricArg,
    },
    /// Fit US deaths per thousand against cases per thousand
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    Cases,
    Deaths,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Cases => Metric::Cases,
            MetricArg::Deaths => Metric::Deaths,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/covid_rates.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("covid_rates.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let sources = Sources::from_env();

    match cli.command {
        Commands::Report { output_dir } => {
            let unified = load(&sources).await?;
            let analysis = analyze(&unified)?;
            analysis.report.summaries.iter().for_each(|s| s.log());
            write_outputs(&output_dir, &unified, &analysis)?;
        }
        Commands::Rank { metric } => {
            let metric = Metric::from(metric);
            let unified = load(&sources).await?;
            let rankings = rank(&unified.global);

            info!(date = ?rankings.date, metric = metric.label(), "Rankings");
            for (position, country) in rankings.top(metric).iter().enumerate() {
                info!(position = position + 1, country = %country.country, rate = country.rate, "Top");
            }
            for (position, country) in rankings.bottom(metric).iter().enumerate() {
                info!(position = position + 1, country = %country.country, rate = country.rate, "Bottom");
            }
        }
        Commands::Fit => {
            let unified = load(&sources).await?;
            let (model, _) = fit_us(&unified.us)?;
            print_json(&model)?;
        }
    }

    Ok(())
}

/// Fetches every source and builds the unified tables.
#[tracing::instrument(skip(sources))]
async fn load(sources: &Sources) -> Result<Unified> {
    let client = BasicClient::new();
    let inputs = fetch_inputs(&client, sources).await?;
    unify(&inputs)
}
