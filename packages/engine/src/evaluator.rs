//! Held-out accuracy of a single strategy.
//!
//! The last `holdout` months of a series are withheld, the strategy is
//! trained on everything before them and asked to predict them, and the
//! predictions are compared with what was actually observed.

use crime_forecast_models::{
    EvaluationScore, HistoricalSeries, HoldoutEvaluation, Metric, Segment, Strategy,
};

use crate::{EngineConfig, EngineError, models};

/// Scores `strategy` on the held-out tail of `series`.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientHistory`] if the series is shorter
/// than `holdout + min_training`, and [`EngineError::ModelUnfit`] if the
/// strategy cannot be trained on the training prefix.
pub fn evaluate_strategy(
    strategy: Strategy,
    series: &HistoricalSeries,
    config: &EngineConfig,
) -> Result<HoldoutEvaluation, EngineError> {
    let holdout = config.evaluation.holdout;
    let needed = config.evaluation.required_history();
    if series.len() < needed {
        return Err(EngineError::InsufficientHistory {
            needed,
            got: series.len(),
        });
    }

    let training_len = series.len() - holdout;
    let (Some(training), Some(actual)) = (series.head(training_len), series.tail(holdout)) else {
        return Err(EngineError::InsufficientHistory {
            needed,
            got: series.len(),
        });
    };

    let fitted = models::for_strategy(strategy, config).fit(&training)?;
    let forecast = fitted.predict(holdout)?;

    let accuracy = Accuracy::compute(&actual.values(), &forecast.point_values());
    log::debug!(
        "{}: {strategy} holdout MAE={:.3} MAPE={:?}",
        series.segment(),
        accuracy.mae,
        accuracy.mape
    );

    Ok(HoldoutEvaluation {
        strategy,
        segment: series.segment().clone(),
        training_len,
        holdout_len: holdout,
        scores: accuracy.scores(strategy, series.segment()),
    })
}

/// Error metrics of predictions against actuals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accuracy {
    /// Mean absolute error.
    pub mae: f64,
    /// Mean absolute percentage error over non-zero actuals, `None` when
    /// every actual is zero.
    pub mape: Option<f64>,
}

impl Accuracy {
    /// Compares `predicted` with `actual` pairwise.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let pairs: Vec<(f64, f64)> = actual
            .iter()
            .copied()
            .zip(predicted.iter().copied())
            .collect();

        let mae = if pairs.is_empty() {
            0.0
        } else {
            pairs.iter().map(|(a, p)| (a - p).abs()).sum::<f64>() / pairs.len() as f64
        };

        let percentages: Vec<f64> = pairs
            .iter()
            .filter(|(a, _)| a.abs() > f64::EPSILON)
            .map(|(a, p)| ((a - p) / a).abs() * 100.0)
            .collect();
        let mape = (!percentages.is_empty())
            .then(|| percentages.iter().sum::<f64>() / percentages.len() as f64);

        Self { mae, mape }
    }

    fn scores(self, strategy: Strategy, segment: &Segment) -> Vec<EvaluationScore> {
        let score = |metric, value| EvaluationScore {
            strategy,
            segment: segment.clone(),
            metric,
            value,
        };

        let mut scores = vec![score(Metric::Mae, self.mae)];
        if let Some(mape) = self.mape {
            scores.push(score(Metric::Mape, mape));
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_forecast_models::Period;

    fn series(len: u64) -> HistoricalSeries {
        HistoricalSeries::from_counts(
            Segment::city_wide("Jaipur"),
            Period::new(2020, 1).unwrap(),
            (0..len).map(|i| 30 + i % 5),
        )
        .unwrap()
    }

    #[test]
    fn mae_and_mape() {
        let acc = Accuracy::compute(&[10.0, 20.0, 0.0], &[12.0, 15.0, 3.0]);
        assert!((acc.mae - 10.0 / 3.0).abs() < 1e-12);
        // The zero actual is left out of MAPE.
        assert!((acc.mape.unwrap() - 22.5).abs() < 1e-12);
    }

    #[test]
    fn mape_absent_when_all_actuals_zero() {
        let acc = Accuracy::compute(&[0.0, 0.0], &[1.0, 2.0]);
        assert!(acc.mape.is_none());
        assert!((acc.mae - 1.5).abs() < 1e-12);
    }

    #[test]
    fn minimum_history_evaluates() {
        let config = EngineConfig::default();
        let eval = evaluate_strategy(Strategy::TrendSeasonal, &series(18), &config).unwrap();
        assert_eq!(eval.training_len, 12);
        assert_eq!(eval.holdout_len, 6);
        assert!(eval.mae().is_some());
        assert!(eval.mape().is_some());
    }

    #[test]
    fn one_short_is_insufficient() {
        let config = EngineConfig::default();
        let err = evaluate_strategy(Strategy::TrendSeasonal, &series(17), &config).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientHistory {
                needed: 18,
                got: 17
            }
        ));
    }

    #[test]
    fn unfit_on_training_prefix_propagates() {
        // 24 months leave 18 for training: enough to evaluate, too few rows
        // for the regression's parameters.
        let config = EngineConfig::default();
        let err = evaluate_strategy(Strategy::LagRegression, &series(24), &config).unwrap_err();
        assert!(matches!(err, EngineError::ModelUnfit { .. }));
    }
}
