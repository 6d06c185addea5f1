#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Forecasting engine for monthly crime counts.
//!
//! For a requested segment and horizon the [`ForecastEngine`] trains every
//! applicable forecasting strategy on the segment's history, produces point
//! forecasts with widening intervals, scores each strategy on a held-out
//! tail and returns the forecasts ranked by accuracy. Strategies that cannot
//! be trained are reported next to the results instead of failing the
//! request.
//!
//! Variants are independent and run in parallel on the `rayon` pool; trained
//! models live only for the duration of a request.

pub mod config;
pub mod evaluator;
mod interval;
mod linalg;
pub mod models;
pub mod orchestrator;
pub mod progress;
mod recursive;
mod stats;

use std::fmt;

use crime_forecast_models::{Exclusion, Segment, Strategy};
use crime_forecast_store::StoreError;
use thiserror::Error;

pub use config::EngineConfig;
pub use orchestrator::{ForecastEngine, ForecastRequest};

/// Errors that can occur while forecasting or evaluating.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested segment has no history in the store.
    #[error("Segment not found: {segment}")]
    SegmentNotFound {
        /// Requested segment.
        segment: Segment,
    },

    /// The series is too short for the requested operation.
    #[error("insufficient history: need at least {needed} periods, got {got}")]
    InsufficientHistory {
        /// Periods required.
        needed: usize,
        /// Periods available.
        got: usize,
    },

    /// Horizon outside the configured bounds.
    #[error("invalid horizon {horizon}: expected {min}-{max}")]
    InvalidHorizon {
        /// Requested horizon.
        horizon: usize,
        /// Smallest accepted horizon.
        min: usize,
        /// Largest accepted horizon.
        max: usize,
    },

    /// A strategy could not be trained on a segment.
    #[error("{strategy} could not be fit: {reason}")]
    ModelUnfit {
        /// Strategy that failed.
        strategy: Strategy,
        /// Why it failed.
        reason: String,
    },

    /// No held-out score could be computed for a strategy.
    #[error("evaluation unavailable for {strategy}: {reason}")]
    EvaluationUnavailable {
        /// Strategy left unscored.
        strategy: Strategy,
        /// Why no score exists.
        reason: String,
    },

    /// Every requested strategy was excluded.
    #[error("no model available for {segment}: {}", ExclusionList(.exclusions))]
    NoModelAvailable {
        /// Segment requested.
        segment: Segment,
        /// Why each strategy was excluded.
        exclusions: Vec<Exclusion>,
    },

    /// The engine configuration is unusable.
    #[error("Config error: {0}")]
    Config(String),

    /// Any other store failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl EngineError {
    /// Shorthand for [`EngineError::ModelUnfit`].
    pub fn unfit(strategy: Strategy, reason: impl fmt::Display) -> Self {
        Self::ModelUnfit {
            strategy,
            reason: reason.to_string(),
        }
    }

    /// The bare reason, without the strategy prefix, for exclusion notes.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::ModelUnfit { reason, .. } | Self::EvaluationUnavailable { reason, .. } => {
                reason.clone()
            }
            other => other.to_string(),
        }
    }

    /// Whether the caller sent a bad request, as opposed to the data or the
    /// models falling short.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::SegmentNotFound { .. } | Self::InvalidHorizon { .. }
        )
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SegmentNotFound { segment } => Self::SegmentNotFound { segment },
            other => Self::Store(other),
        }
    }
}

struct ExclusionList<'a>(&'a [Exclusion]);

impl fmt::Display for ExclusionList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, exclusion) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{exclusion}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_forecast_models::ExclusionReason;

    #[test]
    fn no_model_message_lists_reasons() {
        let err = EngineError::NoModelAvailable {
            segment: Segment::city_wide("Patna"),
            exclusions: vec![Exclusion {
                strategy: Strategy::SequenceModel,
                reason: ExclusionReason::ModelUnfit("insufficient history".into()),
            }],
        };
        assert_eq!(
            err.to_string(),
            "no model available for Patna/all: Sequence Model unavailable: insufficient history"
        );
    }

    #[test]
    fn store_not_found_maps_to_segment_not_found() {
        let err: EngineError = StoreError::SegmentNotFound {
            segment: Segment::city_wide("NewCity"),
        }
        .into();
        assert!(matches!(err, EngineError::SegmentNotFound { .. }));
        assert!(err.is_caller_error());
    }

    #[test]
    fn reason_strips_strategy_prefix() {
        let err = EngineError::unfit(Strategy::GradientBoosted, "all-zero target");
        assert_eq!(err.reason(), "all-zero target");
        assert_eq!(
            err.to_string(),
            "gradient-boosted could not be fit: all-zero target"
        );
    }
}
