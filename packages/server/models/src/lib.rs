#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crime forecasting server.
//!
//! Reports from the engine are serialized as-is; the types here only cover
//! query parameters, request bodies and the envelopes around them, so the
//! API contract can evolve without touching the engine's domain types.

use crime_forecast_models::{
    ALL_CATEGORIES, ForecastInsight, ForecastReport, Segment, Strategy,
};
use serde::{Deserialize, Serialize};

fn all_categories() -> String {
    ALL_CATEGORIES.to_string()
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Number of segments loaded.
    pub segments: usize,
}

/// Query parameters naming one segment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentQueryParams {
    /// City name.
    pub city: String,
    /// Crime type, `all` for the city-wide total.
    #[serde(default = "all_categories")]
    pub category: String,
}

impl SegmentQueryParams {
    /// The segment these parameters name.
    #[must_use]
    pub fn segment(&self) -> Segment {
        Segment::new(self.city.clone(), self.category.clone())
    }
}

/// Query parameters for the segment listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentListParams {
    /// Only list this city's segments.
    pub city: Option<String>,
}

/// One city and the crime types it has history for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCity {
    /// City name.
    pub city: String,
    /// Crime types, `all` first.
    pub categories: Vec<String>,
}

/// Body of `POST /api/forecast`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastBody {
    /// City name.
    pub city: String,
    /// Crime type, `all` for the city-wide total.
    #[serde(default = "all_categories")]
    pub category: String,
    /// Months to forecast. The server default applies when absent.
    pub horizon: Option<usize>,
    /// Strategies to run. Every strategy runs when empty.
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

impl ForecastBody {
    /// The segment this body names.
    #[must_use]
    pub fn segment(&self) -> Segment {
        Segment::new(self.city.clone(), self.category.clone())
    }
}

/// A forecast report with its plain-language reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiForecast {
    /// Ranked forecasts and exclusion notes.
    #[serde(flatten)]
    pub report: ForecastReport,
    /// Reading of the best forecast against the latest observed month.
    pub insight: Option<ForecastInsight>,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable error kind, e.g. `segment_not_found`.
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_body_defaults() {
        let body: ForecastBody = serde_json::from_str(r#"{"city":"Delhi"}"#).unwrap();
        assert_eq!(body.segment(), Segment::city_wide("Delhi"));
        assert_eq!(body.horizon, None);
        assert!(body.strategies.is_empty());
    }

    #[test]
    fn forecast_body_parses_kebab_case_strategies() {
        let body: ForecastBody = serde_json::from_str(
            r#"{
                "city": "Delhi",
                "category": "Theft",
                "horizon": 3,
                "strategies": ["lag-regression", "sequence-model"]
            }"#,
        )
        .unwrap();
        assert_eq!(body.segment(), Segment::new("Delhi", "Theft"));
        assert_eq!(body.horizon, Some(3));
        assert_eq!(
            body.strategies,
            vec![Strategy::LagRegression, Strategy::SequenceModel]
        );
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(
            serde_json::from_str::<ForecastBody>(r#"{"city":"Delhi","strategies":["arima"]}"#)
                .is_err()
        );
    }
}
