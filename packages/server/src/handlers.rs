//! HTTP handler functions for the forecasting API.

use actix_web::{HttpResponse, http::StatusCode, web};
use crime_forecast_engine::{EngineError, ForecastRequest};
use crime_forecast_server_models::{
    ApiCity, ApiError, ApiForecast, ApiHealth, ForecastBody, SegmentListParams,
    SegmentQueryParams,
};

use crate::AppState;

/// Status code and machine-readable kind for an engine error.
fn classify(err: &EngineError) -> (StatusCode, &'static str) {
    match err {
        EngineError::SegmentNotFound { .. } => (StatusCode::NOT_FOUND, "segment_not_found"),
        EngineError::InvalidHorizon { .. } => (StatusCode::BAD_REQUEST, "invalid_horizon"),
        EngineError::InsufficientHistory { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_history")
        }
        EngineError::NoModelAvailable { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "no_model_available")
        }
        EngineError::ModelUnfit { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "model_unfit"),
        EngineError::EvaluationUnavailable { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "evaluation_unavailable")
        }
        EngineError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
        EngineError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
    }
}

fn error_response(err: &EngineError) -> HttpResponse {
    let (status, kind) = classify(err);
    if status.is_server_error() {
        log::error!("Request failed: {err}");
    } else {
        log::debug!("Request rejected: {err}");
    }
    HttpResponse::build(status).json(ApiError {
        error: err.to_string(),
        kind: kind.to_string(),
    })
}

fn blocking_failed(e: &actix_web::error::BlockingError) -> HttpResponse {
    log::error!("Forecast worker failed: {e}");
    HttpResponse::InternalServerError().json(ApiError {
        error: "Forecast worker failed".to_string(),
        kind: "internal".to_string(),
    })
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        segments: state.engine.store().len(),
    })
}

/// `GET /api/segments`
///
/// Lists cities with the crime types each has history for.
pub async fn segments(
    state: web::Data<AppState>,
    params: web::Query<SegmentListParams>,
) -> HttpResponse {
    let store = state.engine.store();
    let cities: Vec<ApiCity> = store
        .cities()
        .into_iter()
        .filter(|city| params.city.as_ref().is_none_or(|c| c == city))
        .map(|city| ApiCity {
            categories: store.categories_for(&city),
            city,
        })
        .collect();

    HttpResponse::Ok().json(cities)
}

/// `GET /api/summary`
pub async fn summary(
    state: web::Data<AppState>,
    params: web::Query<SegmentQueryParams>,
) -> HttpResponse {
    match state.engine.summarize(&params.segment()) {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/forecast`
///
/// Runs the requested strategies (all when none are named) and returns
/// them ranked, with a reading of the best one.
pub async fn forecast(state: web::Data<AppState>, body: web::Json<ForecastBody>) -> HttpResponse {
    let engine = state.engine.clone();
    let body = body.into_inner();
    let request = ForecastRequest {
        segment: body.segment(),
        horizon: body.horizon.unwrap_or(engine.config().horizon.default),
        strategies: body.strategies,
    };

    let result = web::block(move || {
        let report = engine.forecast(&request)?;
        let insight = engine.insight(&report)?;
        Ok::<_, EngineError>(ApiForecast { report, insight })
    })
    .await;

    match result {
        Ok(Ok(forecast)) => HttpResponse::Ok().json(forecast),
        Ok(Err(e)) => error_response(&e),
        Err(e) => blocking_failed(&e),
    }
}

/// `GET /api/evaluate`
///
/// Scores every strategy on the segment's held-out tail.
pub async fn evaluate(
    state: web::Data<AppState>,
    params: web::Query<SegmentQueryParams>,
) -> HttpResponse {
    let engine = state.engine.clone();
    let segment = params.segment();

    match web::block(move || engine.evaluate(&segment)).await {
        Ok(Ok(report)) => HttpResponse::Ok().json(report),
        Ok(Err(e)) => error_response(&e),
        Err(e) => blocking_failed(&e),
    }
}
