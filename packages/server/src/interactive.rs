//! Interactive mode for the server.
//!
//! Prompts for bind address and port before starting the server.

use crime_forecast_engine::ForecastEngine;
use dialoguer::{Confirm, Input};

/// Prompts for a bind address and port, defaulting to
/// [`super::bind_from_env`], then serves `engine` there.
///
/// # Errors
///
/// Returns an `std::io::Result` error if a prompt fails or the server
/// fails to start.
#[allow(clippy::future_not_send)]
pub async fn run(engine: ForecastEngine) -> std::io::Result<()> {
    println!("Crime Forecast Server");
    println!();

    let (default_addr, default_port) = super::bind_from_env();

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default(default_addr)
        .interact_text()
        .map_err(std::io::Error::other)?;

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(default_port)
        .interact_text()
        .map_err(std::io::Error::other)?;

    if !Confirm::new()
        .with_prompt(format!("Start server on {bind_addr}:{port}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::serve(engine, bind_addr, port).await
}
