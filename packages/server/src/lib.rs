#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the crime forecasting engine.
//!
//! Loads the monthly dataset once at startup and serves segment listings,
//! summaries, forecasts and held-out evaluations as JSON. Forecasting is
//! CPU-bound, so handlers hand it to the blocking pool and the store is
//! shared read-only behind an `Arc`.

mod handlers;
pub mod interactive;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use crime_forecast_engine::{EngineConfig, EngineError, ForecastEngine};
use crime_forecast_store::{StoreError, dataset};
use thiserror::Error;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The dataset could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The engine configuration is invalid.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Shared application state.
pub struct AppState {
    /// Forecasting engine over the loaded dataset.
    pub engine: Arc<ForecastEngine>,
}

impl AppState {
    /// Wraps an engine for sharing across workers.
    #[must_use]
    pub fn new(engine: ForecastEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Builds the engine from `CRIME_FORECAST_DATA` and `CRIME_FORECAST_CONFIG`.
///
/// # Errors
///
/// Returns [`ServerError`] if the dataset or the configuration cannot be
/// loaded.
pub fn engine_from_env() -> Result<ForecastEngine, ServerError> {
    let data = std::env::var("CRIME_FORECAST_DATA")
        .map_or_else(|_| PathBuf::from(dataset::DEFAULT_DATASET_PATH), PathBuf::from);
    let config = match std::env::var("CRIME_FORECAST_CONFIG") {
        Ok(path) => EngineConfig::load(Path::new(&path))?,
        Err(_) => EngineConfig::default(),
    };

    let store = dataset::load_path(&data)?;
    log::info!("Loaded {} segments", store.len());

    Ok(ForecastEngine::new(Arc::new(store), config)?)
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/segments", web::get().to(handlers::segments))
            .route("/summary", web::get().to(handlers::summary))
            .route("/forecast", web::post().to(handlers::forecast))
            .route("/evaluate", web::get().to(handlers::evaluate)),
    );
}

/// Reads the bind address and port from `BIND_ADDR` and `PORT`, defaulting
/// to `127.0.0.1:8080`.
#[must_use]
pub fn bind_from_env() -> (String, u16) {
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    (bind_addr, port)
}

/// Serves `engine` on `bind_addr`:`port` until shut down.
///
/// This is a regular async function; the caller provides the async runtime
/// (e.g. via `#[actix_web::main]` or `actix_web::rt::System`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn serve(engine: ForecastEngine, bind_addr: String, port: u16) -> std::io::Result<()> {
    let state = web::Data::new(AppState::new(engine));

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

/// Starts the forecasting API server from environment configuration.
///
/// Loads the dataset (see [`engine_from_env`]) and binds per
/// [`bind_from_env`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the dataset cannot be loaded, or
/// if the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    // A front end may already have installed its own logger.
    pretty_env_logger::try_init_custom_env("RUST_LOG").ok();

    let engine = engine_from_env().map_err(std::io::Error::other)?;
    let (bind_addr, port) = bind_from_env();
    serve(engine, bind_addr, port).await
}
