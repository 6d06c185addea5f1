//! Engine configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! [`EngineConfig::default`].
//!
//! ```toml
//! confidence_level = 0.95
//!
//! [horizon]
//! min = 3
//! max = 12
//! default = 6
//!
//! [evaluation]
//! holdout = 6
//! min_training = 12
//!
//! [features]
//! lags = [1, 3, 12]
//! rolling_window = 3
//!
//! [sequence]
//! training_budget_ms = 2000
//! ```

use std::path::Path;
use std::time::Duration;

use crime_forecast_features::FeatureConfig;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Coverage of the prediction intervals, strictly between 0 and 1.
    pub confidence_level: f64,
    /// Accepted forecast horizons.
    pub horizon: HorizonConfig,
    /// Held-out evaluation split.
    pub evaluation: EvaluationConfig,
    /// Features for the regression-style strategies.
    pub features: FeatureConfig,
    /// Trend-Seasonal parameters.
    pub trend_seasonal: TrendSeasonalConfig,
    /// Regression-with-Lags parameters.
    pub regression: RegressionConfig,
    /// Gradient-Boosted parameters.
    pub boosting: BoostingConfig,
    /// Sequence Model parameters.
    pub sequence: SequenceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            horizon: HorizonConfig::default(),
            evaluation: EvaluationConfig::default(),
            features: FeatureConfig::default(),
            trend_seasonal: TrendSeasonalConfig::default(),
            regression: RegressionConfig::default(),
            boosting: BoostingConfig::default(),
            sequence: SequenceConfig::default(),
        }
    }
}

/// Bounds on the number of months a request may forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    /// Smallest horizon.
    pub min: usize,
    /// Largest horizon.
    pub max: usize,
    /// Horizon used when a caller does not pick one.
    pub default: usize,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            min: 3,
            max: 12,
            default: 6,
        }
    }
}

/// Train/holdout split used to score strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Trailing months withheld from training and predicted.
    pub holdout: usize,
    /// Months that must remain for training.
    pub min_training: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            holdout: 6,
            min_training: 12,
        }
    }
}

impl EvaluationConfig {
    /// Shortest series that can be evaluated.
    #[must_use]
    pub const fn required_history(&self) -> usize {
        self.holdout + self.min_training
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSeasonalConfig {
    /// Months per seasonal cycle.
    pub season_length: usize,
    /// Relative widening of the interval per additional month ahead.
    pub interval_growth: f64,
}

impl Default for TrendSeasonalConfig {
    fn default() -> Self {
        Self {
            season_length: 12,
            interval_growth: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// L2 penalty applied to the standardized coefficients.
    pub ridge: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self { ridge: 0.001 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
    /// Number of boosting rounds.
    pub trees: usize,
    /// Shrinkage applied to every tree.
    pub learning_rate: f64,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Minimum rows in a leaf.
    pub min_samples_leaf: usize,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Trailing months fed to the network.
    pub window: usize,
    /// Hidden units.
    pub hidden: usize,
    /// Upper bound on training passes.
    pub max_epochs: usize,
    /// Gradient step size.
    pub learning_rate: f64,
    /// Momentum coefficient.
    pub momentum: f64,
    /// Training samples required beyond the window.
    pub min_samples: usize,
    /// Wall-clock training budget in milliseconds. A forecast request fits
    /// the model on the full series and again on the held-out prefix; both
    /// fits draw on the same budget.
    pub training_budget_ms: u64,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            window: 6,
            hidden: 8,
            max_epochs: 400,
            learning_rate: 0.05,
            momentum: 0.9,
            min_samples: 6,
            training_budget_ms: 2000,
            seed: 42,
        }
    }
}

impl SequenceConfig {
    /// The training budget as a [`Duration`].
    #[must_use]
    pub const fn training_budget(&self) -> Duration {
        Duration::from_millis(self.training_budget_ms)
    }

    /// A copy with `spent` taken off the budget, saturating at zero.
    #[must_use]
    pub fn with_budget_spent(mut self, spent: Duration) -> Self {
        let remaining = self.training_budget().saturating_sub(spent);
        self.training_budget_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

impl EngineConfig {
    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the TOML is malformed or the
    /// values fail [`EngineConfig::validate`].
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let config: Self = toml::de::from_str(content)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        log::info!("Loading engine config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::Config(msg));

        if !is_open_unit(self.confidence_level) {
            return invalid(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            ));
        }

        let h = &self.horizon;
        if h.min == 0 || h.min > h.max {
            return invalid(format!("horizon bounds {}..={} are invalid", h.min, h.max));
        }
        if !(h.min..=h.max).contains(&h.default) {
            return invalid(format!(
                "default horizon {} is outside {}..={}",
                h.default, h.min, h.max
            ));
        }

        if self.evaluation.holdout == 0 || self.evaluation.min_training == 0 {
            return invalid("evaluation holdout and min_training must be positive".into());
        }

        self.features
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        if self.trend_seasonal.season_length < 2 {
            return invalid("season_length must be at least 2".into());
        }
        if self.trend_seasonal.interval_growth < 0.0 {
            return invalid("interval_growth must not be negative".into());
        }

        if self.regression.ridge < 0.0 {
            return invalid("ridge penalty must not be negative".into());
        }

        let b = &self.boosting;
        if b.trees == 0 || b.max_depth == 0 || b.min_samples_leaf == 0 {
            return invalid(
                "boosting trees, max_depth and min_samples_leaf must be positive".into(),
            );
        }
        if !(is_open_unit(b.learning_rate) || (b.learning_rate - 1.0).abs() < f64::EPSILON) {
            return invalid(format!(
                "boosting learning_rate must be in (0, 1], got {}",
                b.learning_rate
            ));
        }

        let s = &self.sequence;
        if s.window == 0 || s.hidden == 0 || s.max_epochs == 0 || s.min_samples == 0 {
            return invalid(
                "sequence window, hidden, max_epochs and min_samples must be positive".into(),
            );
        }
        if s.learning_rate.is_nan() || s.learning_rate <= 0.0 || !(0.0..1.0).contains(&s.momentum) {
            return invalid("sequence learning_rate must be positive and momentum in [0, 1)".into());
        }

        Ok(())
    }
}

fn is_open_unit(value: f64) -> bool {
    value > 0.0 && value < 1.0
}
