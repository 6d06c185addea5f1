//! Forecasting strategies behind a common two-phase interface.
//!
//! A [`ForecastModel`] is an untrained strategy with its settings. Fitting it
//! on a series yields a [`FittedModel`] that can predict any number of months
//! past the end of that series. Fitted models hold no references to the
//! store and are dropped at the end of the request that built them.

pub mod boosted;
pub mod lag_regression;
pub mod sequence;
pub mod trend_seasonal;

use crime_forecast_models::{Forecast, HistoricalSeries, Strategy};

use crate::{EngineConfig, EngineError};

pub use boosted::GradientBoosted;
pub use lag_regression::LagRegression;
pub use sequence::SequenceModel;
pub use trend_seasonal::TrendSeasonal;

/// An untrained forecasting strategy.
pub trait ForecastModel {
    /// Which strategy this is.
    fn strategy(&self) -> Strategy;

    /// Trains on `series`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModelUnfit`] if the series cannot support this
    /// strategy.
    fn fit(&self, series: &HistoricalSeries) -> Result<Box<dyn FittedModel>, EngineError>;
}

/// A strategy trained on one series.
pub trait FittedModel: std::fmt::Debug {
    /// Which strategy produced this model.
    fn strategy(&self) -> Strategy;

    /// Predicts the `horizon` months following the training series.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModelUnfit`] if prediction breaks down, e.g.
    /// a non-finite value.
    fn predict(&self, horizon: usize) -> Result<Forecast, EngineError>;
}

/// Builds the untrained model for `strategy` from the engine settings.
#[must_use]
pub fn for_strategy(strategy: Strategy, config: &EngineConfig) -> Box<dyn ForecastModel> {
    match strategy {
        Strategy::TrendSeasonal => Box::new(TrendSeasonal::new(
            config.trend_seasonal,
            config.confidence_level,
        )),
        Strategy::LagRegression => Box::new(LagRegression::new(
            config.features.clone(),
            config.regression,
            config.confidence_level,
        )),
        Strategy::GradientBoosted => Box::new(GradientBoosted::new(
            config.features.clone(),
            config.boosting,
            config.confidence_level,
        )),
        Strategy::SequenceModel => {
            Box::new(SequenceModel::new(config.sequence, config.confidence_level))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_forecast_models::{Period, Segment};

    #[test]
    fn dispatch_matches_strategy() {
        let config = EngineConfig::default();
        for &strategy in Strategy::all() {
            assert_eq!(for_strategy(strategy, &config).strategy(), strategy);
        }
    }

    #[test]
    fn fit_results_are_debug_formattable() {
        let series = HistoricalSeries::from_counts(
            Segment::new("Lucknow", "Theft"),
            Period::new(2019, 1).unwrap(),
            (0..48_u64).map(|i| 50 + (i % 12) * 3 + i / 2),
        )
        .unwrap();
        let config = EngineConfig::default();

        for &strategy in Strategy::all() {
            let fitted = for_strategy(strategy, &config).fit(&series);
            let rendered = format!("{fitted:?}");
            assert!(rendered.starts_with("Ok(Fitted"), "{strategy}: {rendered}");
        }

        let err = for_strategy(Strategy::LagRegression, &config)
            .fit(&series.head(3).unwrap())
            .unwrap_err();
        assert!(matches!(err, EngineError::ModelUnfit { .. }));
    }
}
