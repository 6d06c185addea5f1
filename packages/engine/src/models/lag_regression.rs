//! Ridge regression over lag and calendar features.

use crime_forecast_features::{FeatureBuilder, FeatureConfig};
use crime_forecast_models::{Forecast, HistoricalSeries, Strategy};

use crate::config::RegressionConfig;
use crate::interval::{self, IntervalRule};
use crate::linalg::LinearFit;
use crate::models::{FittedModel, ForecastModel};
use crate::recursive::{self, HistoryBuffer};
use crate::{EngineError, stats};

const STRATEGY: Strategy = Strategy::LagRegression;

#[derive(Debug, Clone)]
pub struct LagRegression {
    features: FeatureConfig,
    config: RegressionConfig,
    confidence: f64,
}

impl LagRegression {
    #[must_use]
    pub const fn new(features: FeatureConfig, config: RegressionConfig, confidence: f64) -> Self {
        Self {
            features,
            config,
            confidence,
        }
    }
}

impl ForecastModel for LagRegression {
    fn strategy(&self) -> Strategy {
        STRATEGY
    }

    fn fit(&self, series: &HistoricalSeries) -> Result<Box<dyn FittedModel>, EngineError> {
        let builder = FeatureBuilder::new(self.features.clone())
            .map_err(|e| EngineError::unfit(STRATEGY, e))?;
        let design = builder
            .design_matrix(series.first_period(), &series.values())
            .map_err(|e| EngineError::unfit(STRATEGY, e))?;

        // Intercept plus one coefficient per regressor.
        let parameters = design.width() + 1;
        if design.len() <= parameters {
            return Err(EngineError::unfit(
                STRATEGY,
                format!(
                    "need more than {parameters} training rows, got {}",
                    design.len()
                ),
            ));
        }

        let fit = LinearFit::ridge(&design.rows, &design.targets, self.config.ridge)
            .ok_or_else(|| EngineError::unfit(STRATEGY, "singular design matrix"))?;

        let residuals: Vec<f64> = design
            .rows
            .iter()
            .zip(&design.targets)
            .map(|(row, y)| y - fit.predict(row))
            .collect();
        let sigma = stats::rms(&residuals);
        if !sigma.is_finite() {
            return Err(EngineError::unfit(STRATEGY, "non-finite residuals"));
        }

        log::debug!(
            "{}: lag regression on {} rows, sigma={sigma:.3}",
            series.segment(),
            design.len()
        );

        Ok(Box::new(FittedLagRegression {
            builder,
            fit,
            history: HistoryBuffer::from_series(series),
            sigma,
            z: stats::z_for_confidence(self.confidence),
        }))
    }
}

#[derive(Debug)]
struct FittedLagRegression {
    builder: FeatureBuilder,
    fit: LinearFit,
    history: HistoryBuffer,
    sigma: f64,
    z: f64,
}

impl FittedModel for FittedLagRegression {
    fn strategy(&self) -> Strategy {
        STRATEGY
    }

    fn predict(&self, horizon: usize) -> Result<Forecast, EngineError> {
        let predictions = recursive::forecast(STRATEGY, self.history.clone(), horizon, |buffer| {
            let features = self
                .builder
                .build_from_values(buffer.start(), buffer.values(), buffer.values().len())
                .map_err(|e| EngineError::unfit(STRATEGY, e))?;
            Ok(self.fit.predict(&features.to_row()))
        })?;

        Ok(interval::assemble(
            STRATEGY,
            self.history.next_period(),
            &predictions,
            self.sigma,
            self.z,
            IntervalRule::SquareRoot,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_forecast_models::{Period, Segment};

    fn series(counts: Vec<u64>) -> HistoricalSeries {
        HistoricalSeries::from_counts(
            Segment::new("Mumbai", "Theft"),
            Period::new(2019, 1).unwrap(),
            counts,
        )
        .unwrap()
    }

    fn model() -> LagRegression {
        LagRegression::new(FeatureConfig::default(), RegressionConfig::default(), 0.95)
    }

    #[test]
    fn forecasts_seasonal_trend() {
        let counts: Vec<u64> = (0..60)
            .map(|i| 200 + 2 * i + if i % 12 == 11 { 40 } else { 0 })
            .collect();
        let s = series(counts);
        let forecast = model().fit(&s).unwrap().predict(12).unwrap();

        assert_eq!(forecast.horizon(), 12);
        assert_eq!(forecast.points[0].period, Period::new(2024, 1).unwrap());
        // December spike carries over through the 12-month lag.
        let december = forecast.points[11].point;
        let november = forecast.points[10].point;
        assert!(december > november);
    }

    #[test]
    fn too_few_rows_is_unfit() {
        // 20 months leave 8 rows for 9 parameters.
        let err = model().fit(&series((0..20).collect())).unwrap_err();
        assert!(matches!(err, EngineError::ModelUnfit { .. }));
    }

    #[test]
    fn shorter_than_largest_lag_is_unfit() {
        let err = model().fit(&series(vec![5; 8])).unwrap_err();
        assert!(err.reason().contains("insufficient history"));
    }

    #[test]
    fn intervals_widen_with_distance() {
        let counts: Vec<u64> = (0..48).map(|i| 30 + (i * 13 % 17)).collect();
        let forecast = model().fit(&series(counts)).unwrap().predict(6).unwrap();
        for pair in forecast.points.windows(2) {
            assert!(pair[1].width() >= pair[0].width() - 1e-9);
        }
        for p in &forecast.points {
            assert!(p.point >= 0.0 && p.lower <= p.point && p.point <= p.upper);
        }
    }
}
