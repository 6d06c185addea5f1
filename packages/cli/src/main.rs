#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the crime forecasting engine.
//!
//! Loads the monthly dataset into memory, then lists segments, summarizes
//! history, forecasts, evaluates, batch-forecasts every segment, or serves
//! the HTTP API. Without a subcommand it starts an interactive session that
//! walks through city, crime type and horizon selection.
//!
//! Uses `indicatif-log-bridge` (via [`crime_forecast_cli_utils::init_logger`])
//! so that log lines and the batch progress bar never fight for the
//! terminal.

mod interactive;
mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use crime_forecast_cli_utils::IndicatifProgress;
use crime_forecast_engine::{EngineConfig, ForecastEngine, ForecastRequest};
use crime_forecast_models::{ALL_CATEGORIES, Segment, Strategy};
use crime_forecast_store::dataset;

#[derive(Parser)]
#[command(name = "crime_forecast", about = "Monthly crime count forecasting")]
struct Cli {
    /// Dataset CSV with Year, Month, City, `Crime_Type` and
    /// `Incidents_Reported` columns
    #[arg(
        long,
        env = "CRIME_FORECAST_DATA",
        default_value = dataset::DEFAULT_DATASET_PATH,
        global = true
    )]
    data: PathBuf,

    /// Engine configuration TOML (defaults apply when omitted)
    #[arg(long, env = "CRIME_FORECAST_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every segment with history
    Segments {
        /// Only list segments of this city
        #[arg(long)]
        city: Option<String>,
    },
    /// Summarize a segment's history
    Summary {
        /// City name (e.g., "Delhi")
        #[arg(long)]
        city: String,
        /// Crime type, or "all" for the city-wide total
        #[arg(long, default_value = ALL_CATEGORIES)]
        category: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Forecast a segment with every (or selected) strategy
    Forecast {
        /// City name (e.g., "Delhi")
        #[arg(long)]
        city: String,
        /// Crime type, or "all" for the city-wide total
        #[arg(long, default_value = ALL_CATEGORIES)]
        category: String,
        /// Months to forecast (defaults to the configured default)
        #[arg(long)]
        horizon: Option<usize>,
        /// Comma-separated strategies, e.g. "trend-seasonal,lag-regression".
        /// All strategies run when omitted.
        #[arg(long, value_delimiter = ',')]
        strategy: Vec<Strategy>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Score every strategy on a segment's held-out tail
    Evaluate {
        /// City name (e.g., "Delhi")
        #[arg(long)]
        city: String,
        /// Crime type, or "all" for the city-wide total
        #[arg(long, default_value = ALL_CATEGORIES)]
        category: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Forecast every segment in the dataset
    Batch {
        /// Months to forecast (defaults to the configured default)
        #[arg(long)]
        horizon: Option<usize>,
        /// Only forecast city-wide totals
        #[arg(long)]
        city_wide_only: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Serve the HTTP API over the loaded dataset
    Serve {
        /// Prompt for bind address and port instead of reading `BIND_ADDR`
        /// and `PORT`
        #[arg(long)]
        interactive: bool,
    },
}

fn load_engine(
    data: &Path,
    config: Option<&Path>,
) -> Result<ForecastEngine, Box<dyn std::error::Error>> {
    let config = match config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let start = Instant::now();
    let store = dataset::load_path(data)?;
    log::info!(
        "Dataset ready in {:.1}s: {} segments",
        start.elapsed().as_secs_f64(),
        store.len()
    );

    Ok(ForecastEngine::new(Arc::new(store), config)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[allow(clippy::too_many_lines)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_forecast_cli_utils::init_logger();
    let cli = Cli::parse();

    let engine = load_engine(&cli.data, cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return interactive::run(&engine);
    };

    match command {
        Commands::Segments { city } => {
            let segments: Vec<Segment> = engine
                .list_segments()
                .into_iter()
                .filter(|s| city.as_ref().is_none_or(|c| &s.city == c))
                .collect();
            print!("{}", output::segments(&segments));
        }
        Commands::Summary {
            city,
            category,
            json,
        } => {
            let summary = engine.summarize(&Segment::new(city, category))?;
            if json {
                print_json(&summary)?;
            } else {
                print!("{}", output::summary(&summary));
            }
        }
        Commands::Forecast {
            city,
            category,
            horizon,
            strategy,
            json,
        } => {
            let request = ForecastRequest {
                segment: Segment::new(city, category),
                horizon: horizon.unwrap_or(engine.config().horizon.default),
                strategies: strategy,
            };
            let report = engine.forecast(&request)?;
            if json {
                print_json(&report)?;
            } else {
                let insight = engine.insight(&report)?;
                print!("{}", output::forecast(&report, insight.as_ref()));
            }
        }
        Commands::Evaluate {
            city,
            category,
            json,
        } => {
            let report = engine.evaluate(&Segment::new(city, category))?;
            if json {
                print_json(&report)?;
            } else {
                print!("{}", output::evaluation(&report));
            }
        }
        Commands::Batch {
            horizon,
            city_wide_only,
            json,
        } => {
            let horizon = horizon.unwrap_or(engine.config().horizon.default);
            let requests: Vec<ForecastRequest> = engine
                .list_segments()
                .into_iter()
                .filter(|s| !city_wide_only || s.is_city_wide())
                .map(|s| ForecastRequest::all_strategies(s, horizon))
                .collect();

            let progress = IndicatifProgress::batch_bar(&multi, "Forecasting segments");
            let results = engine.forecast_batch(&requests, &progress);

            if json {
                let reports: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
                print_json(&reports)?;
            } else {
                print!("{}", output::batch(&requests, &results));
            }
        }
        Commands::Serve { interactive } => {
            actix_rt::System::new().block_on(async move {
                if interactive {
                    crime_forecast_server::interactive::run(engine).await
                } else {
                    let (bind_addr, port) = crime_forecast_server::bind_from_env();
                    crime_forecast_server::serve(engine, bind_addr, port).await
                }
            })?;
        }
    }

    Ok(())
}
