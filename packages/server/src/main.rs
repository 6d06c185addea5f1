#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the crime forecasting engine.
//!
//! Reads the dataset from `CRIME_FORECAST_DATA` and the engine
//! configuration from `CRIME_FORECAST_CONFIG`, then serves on
//! `BIND_ADDR`:`PORT`.

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    crime_forecast_server::run_server().await
}
