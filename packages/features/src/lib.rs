#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature derivation for the regression-style forecasters.
//!
//! A [`FeatureVector`] describes one target month using only the values
//! observed strictly before it: calendar encodings, lagged counts at the
//! configured offsets, and rolling statistics over a short trailing window.
//! Vectors are recomputed on demand and never stored.

use std::f64::consts::TAU;

use crime_forecast_models::{HistoricalSeries, Period};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building features.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    /// Not enough preceding values for the largest lag.
    #[error("insufficient history: need at least {needed} periods, got {got}")]
    InsufficientHistory {
        /// Preceding values required.
        needed: usize,
        /// Preceding values available.
        got: usize,
    },

    /// Target period lies before the series or more than one month past it.
    #[error("period {period} is outside the series range")]
    PeriodOutOfRange {
        /// Requested target.
        period: Period,
    },

    /// The feature configuration is unusable.
    #[error("invalid feature config: {0}")]
    InvalidConfig(String),
}

/// Which features to derive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Lag offsets in months, e.g. `[1, 3, 12]`.
    pub lags: Vec<usize>,
    /// Trailing window for the rolling mean and variance.
    pub rolling_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 3, 12],
            rolling_window: 3,
        }
    }
}

impl FeatureConfig {
    /// Largest configured lag.
    #[must_use]
    pub fn max_lag(&self) -> usize {
        self.lags.iter().copied().max().unwrap_or(0)
    }

    /// Checks the configuration for values that cannot produce features.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::InvalidConfig`] for empty or zero lags, a
    /// zero rolling window, or a window wider than the largest lag.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.lags.is_empty() {
            return Err(FeatureError::InvalidConfig("no lags configured".into()));
        }
        if self.lags.contains(&0) {
            return Err(FeatureError::InvalidConfig("lag 0 leaks the target".into()));
        }
        if self.rolling_window == 0 {
            return Err(FeatureError::InvalidConfig(
                "rolling window must be positive".into(),
            ));
        }
        if self.rolling_window > self.max_lag() {
            return Err(FeatureError::InvalidConfig(format!(
                "rolling window {} exceeds largest lag {}",
                self.rolling_window,
                self.max_lag()
            )));
        }
        Ok(())
    }
}

/// Derived attributes of one target month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    /// Target month.
    pub period: Period,
    /// Month of year, `1..=12`.
    pub month_of_year: u32,
    /// Sine of the month angle.
    pub month_sin: f64,
    /// Cosine of the month angle.
    pub month_cos: f64,
    /// Months since the first observation.
    pub trend_index: f64,
    /// Counts at each configured lag, in config order.
    pub lags: Vec<f64>,
    /// Mean of the trailing window.
    pub rolling_mean: f64,
    /// Population variance of the trailing window.
    pub rolling_variance: f64,
}

impl FeatureVector {
    /// Numeric regressors in a fixed column order.
    ///
    /// The rolling variance enters as a standard deviation so its scale
    /// matches the counts.
    #[must_use]
    pub fn to_row(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(5 + self.lags.len());
        row.push(self.month_sin);
        row.push(self.month_cos);
        row.push(self.trend_index);
        row.extend_from_slice(&self.lags);
        row.push(self.rolling_mean);
        row.push(self.rolling_variance.sqrt());
        row
    }
}

/// Supervised-learning view of a series: one row per target month.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    /// Regressor rows, see [`FeatureVector::to_row`].
    pub rows: Vec<Vec<f64>>,
    /// Observed count for each row.
    pub targets: Vec<f64>,
}

impl DesignMatrix {
    /// Number of training rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of regressors per row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

/// Builds [`FeatureVector`]s from a series.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    /// Creates a builder after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::InvalidConfig`] if the config is unusable.
    pub fn new(config: FeatureConfig) -> Result<Self, FeatureError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Number of values a target needs before it.
    #[must_use]
    pub fn required_history(&self) -> usize {
        self.config.max_lag()
    }

    /// Builds features for `target`, which may be any month of `series`
    /// with enough predecessors or the month right after its end.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::InsufficientHistory`] when fewer than the
    /// largest lag of values precede `target`, and
    /// [`FeatureError::PeriodOutOfRange`] when `target` is outside the
    /// series.
    pub fn build_features(
        &self,
        series: &HistoricalSeries,
        target: Period,
    ) -> Result<FeatureVector, FeatureError> {
        let offset = series.first_period().months_until(target);
        let index = usize::try_from(offset)
            .ok()
            .filter(|&i| i <= series.len())
            .ok_or(FeatureError::PeriodOutOfRange { period: target })?;

        self.build_from_values(series.first_period(), &series.values(), index)
    }

    /// Builds features for position `index` of `values`, where `values[0]`
    /// falls in `start`. `index` may equal `values.len()` to describe the
    /// month after the last value.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::InsufficientHistory`] when `index` is below
    /// the largest lag, and [`FeatureError::PeriodOutOfRange`] when it is
    /// past `values.len()`.
    #[allow(clippy::cast_precision_loss)]
    pub fn build_from_values(
        &self,
        start: Period,
        values: &[f64],
        index: usize,
    ) -> Result<FeatureVector, FeatureError> {
        let period = start.plus(index);
        if index > values.len() {
            return Err(FeatureError::PeriodOutOfRange { period });
        }

        let needed = self.required_history();
        if index < needed {
            return Err(FeatureError::InsufficientHistory { needed, got: index });
        }

        let lags = self.config.lags.iter().map(|&k| values[index - k]).collect();

        let window = &values[index - self.config.rolling_window..index];
        let n = window.len() as f64;
        let rolling_mean = window.iter().sum::<f64>() / n;
        let rolling_variance = window
            .iter()
            .map(|v| (v - rolling_mean).powi(2))
            .sum::<f64>()
            / n;

        let month_of_year = period.month();
        let angle = TAU * f64::from(month_of_year - 1) / 12.0;

        Ok(FeatureVector {
            period,
            month_of_year,
            month_sin: angle.sin(),
            month_cos: angle.cos(),
            trend_index: index as f64,
            lags,
            rolling_mean,
            rolling_variance,
        })
    }

    /// Builds one row per month that has enough history, with the observed
    /// value as target.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::InsufficientHistory`] when `values` is
    /// shorter than the largest lag.
    pub fn design_matrix(
        &self,
        start: Period,
        values: &[f64],
    ) -> Result<DesignMatrix, FeatureError> {
        let needed = self.required_history();
        if values.len() < needed {
            return Err(FeatureError::InsufficientHistory {
                needed,
                got: values.len(),
            });
        }

        let mut rows = Vec::with_capacity(values.len() - needed);
        let mut targets = Vec::with_capacity(values.len() - needed);
        for index in needed..values.len() {
            rows.push(self.build_from_values(start, values, index)?.to_row());
            targets.push(values[index]);
        }

        Ok(DesignMatrix { rows, targets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_forecast_models::Segment;

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    fn series(len: u64) -> HistoricalSeries {
        HistoricalSeries::from_counts(Segment::city_wide("Delhi"), period(2019, 1), 1..=len)
            .unwrap()
    }

    fn builder() -> FeatureBuilder {
        FeatureBuilder::new(FeatureConfig::default()).unwrap()
    }

    #[test]
    fn builds_lags_and_rolling_stats() {
        let s = series(24);
        let fv = builder().build_features(&s, period(2020, 1)).unwrap();

        // Target is index 12, value 13; lags look back 1, 3 and 12 months.
        assert_eq!(fv.lags, vec![12.0, 10.0, 1.0]);
        assert!((fv.rolling_mean - 11.0).abs() < 1e-12);
        assert!((fv.rolling_variance - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(fv.month_of_year, 1);
        assert!((fv.month_sin).abs() < 1e-12);
        assert!((fv.month_cos - 1.0).abs() < 1e-12);
        assert!((fv.trend_index - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn builds_for_month_after_series_end() {
        let s = series(24);
        let fv = builder().build_features(&s, s.last_period().next()).unwrap();
        assert_eq!(fv.period, period(2021, 1));
        assert_eq!(fv.lags, vec![24.0, 22.0, 13.0]);
    }

    #[test]
    fn short_series_is_insufficient() {
        let s = series(11);
        let err = builder()
            .build_features(&s, s.last_period().next())
            .unwrap_err();
        assert_eq!(
            err,
            FeatureError::InsufficientHistory {
                needed: 12,
                got: 11
            }
        );
        assert!(builder().design_matrix(s.first_period(), &s.values()).is_err());
    }

    #[test]
    fn rejects_targets_outside_series() {
        let s = series(24);
        assert!(matches!(
            builder().build_features(&s, period(2018, 12)),
            Err(FeatureError::PeriodOutOfRange { .. })
        ));
        assert!(matches!(
            builder().build_features(&s, s.last_period().plus(2)),
            Err(FeatureError::PeriodOutOfRange { .. })
        ));
    }

    #[test]
    fn is_deterministic() {
        let s = series(30);
        let b = builder();
        assert_eq!(
            b.build_features(&s, period(2020, 6)).unwrap(),
            b.build_features(&s, period(2020, 6)).unwrap()
        );
    }

    #[test]
    fn design_matrix_has_one_row_per_eligible_month() {
        let s = series(20);
        let dm = builder().design_matrix(s.first_period(), &s.values()).unwrap();
        assert_eq!(dm.len(), 8);
        assert_eq!(dm.width(), 8);
        assert_eq!(dm.targets.first().copied(), Some(13.0));
    }

    #[test]
    fn validates_config() {
        assert!(
            FeatureBuilder::new(FeatureConfig {
                lags: vec![],
                rolling_window: 1
            })
            .is_err()
        );
        assert!(
            FeatureBuilder::new(FeatureConfig {
                lags: vec![0, 1],
                rolling_window: 1
            })
            .is_err()
        );
        assert!(
            FeatureBuilder::new(FeatureConfig {
                lags: vec![2],
                rolling_window: 3
            })
            .is_err()
        );
    }
}
