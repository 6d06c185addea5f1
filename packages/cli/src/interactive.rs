//! Interactive session for the forecasting CLI.
//!
//! Walks through city, crime type and action selection with `dialoguer`
//! so forecasts can be explored without memorizing flags.

use crime_forecast_cli_utils::{prompt_in_range, select_one};
use crime_forecast_engine::{ForecastEngine, ForecastRequest};
use crime_forecast_models::{Segment, Strategy};
use dialoguer::{Confirm, MultiSelect, Select};

use crate::output;

/// Actions offered once a segment is chosen.
enum Action {
    Forecast,
    CompareStrategies,
    Evaluate,
    Summary,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Forecast,
        Self::CompareStrategies,
        Self::Evaluate,
        Self::Summary,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Forecast => "Forecast with all strategies",
            Self::CompareStrategies => "Forecast with selected strategies",
            Self::Evaluate => "Evaluate strategies on held-out months",
            Self::Summary => "Show historical summary",
        }
    }
}

/// Runs the interactive loop until the user declines to continue or
/// cancels a selection.
///
/// Engine errors for a single action are printed and the loop continues.
///
/// # Errors
///
/// Returns an error if terminal interaction fails.
pub fn run(engine: &ForecastEngine) -> Result<(), Box<dyn std::error::Error>> {
    println!("Crime Forecast");
    println!();

    let cities = engine.store().cities();
    if cities.is_empty() {
        println!("The dataset has no usable segments.");
        return Ok(());
    }

    loop {
        let Some(city) = select_one("City", &cities)? else {
            return Ok(());
        };
        let categories = engine.store().categories_for(&city);
        let Some(category) = select_one("Crime type", &categories)? else {
            return Ok(());
        };
        let segment = Segment::new(city, category);

        let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        if let Err(e) = run_action(engine, &Action::ALL[idx], segment) {
            println!("{e}");
        }

        println!();
        if !Confirm::new()
            .with_prompt("Look at another segment?")
            .default(true)
            .interact()?
        {
            return Ok(());
        }
    }
}

fn run_action(
    engine: &ForecastEngine,
    action: &Action,
    segment: Segment,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        Action::Forecast => {
            let horizon = prompt_horizon(engine)?;
            forecast(engine, &ForecastRequest::all_strategies(segment, horizon))?;
        }
        Action::CompareStrategies => {
            let strategies = select_strategies()?;
            if strategies.is_empty() {
                println!("No strategies selected.");
                return Ok(());
            }
            let horizon = prompt_horizon(engine)?;
            forecast(
                engine,
                &ForecastRequest {
                    segment,
                    horizon,
                    strategies,
                },
            )?;
        }
        Action::Evaluate => {
            let report = engine.evaluate(&segment)?;
            print!("{}", output::evaluation(&report));
        }
        Action::Summary => {
            let summary = engine.summarize(&segment)?;
            print!("{}", output::summary(&summary));
        }
    }
    Ok(())
}

fn forecast(
    engine: &ForecastEngine,
    request: &ForecastRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = engine.forecast(request)?;
    let insight = engine.insight(&report)?;
    println!();
    print!("{}", output::forecast(&report, insight.as_ref()));
    Ok(())
}

fn prompt_horizon(engine: &ForecastEngine) -> Result<usize, dialoguer::Error> {
    let bounds = &engine.config().horizon;
    prompt_in_range("Months to forecast", bounds.min, bounds.max, bounds.default)
}

fn select_strategies() -> Result<Vec<Strategy>, dialoguer::Error> {
    let labels: Vec<&str> = Strategy::all().iter().copied().map(Strategy::label).collect();
    let defaults = vec![true; labels.len()];

    let selected = MultiSelect::new()
        .with_prompt("Strategies (space=toggle, enter=confirm)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    Ok(selected.into_iter().map(|i| Strategy::all()[i]).collect())
}
