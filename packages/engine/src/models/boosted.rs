//! Gradient-boosted regression trees over lag and calendar features.
//!
//! Squared-loss boosting: every round fits a depth-limited tree to the
//! current residuals and adds it, shrunk by the learning rate, to the
//! ensemble. Training is deterministic; ties between candidate splits go
//! to the lower feature index and threshold.

use crime_forecast_features::{FeatureBuilder, FeatureConfig};
use crime_forecast_models::{Forecast, HistoricalSeries, Strategy};

use crate::config::BoostingConfig;
use crate::interval::{self, IntervalRule};
use crate::models::{FittedModel, ForecastModel};
use crate::recursive::{self, HistoryBuffer};
use crate::{EngineError, stats};

const STRATEGY: Strategy = Strategy::GradientBoosted;

#[derive(Debug, Clone)]
pub struct GradientBoosted {
    features: FeatureConfig,
    config: BoostingConfig,
    confidence: f64,
}

impl GradientBoosted {
    #[must_use]
    pub const fn new(features: FeatureConfig, config: BoostingConfig, confidence: f64) -> Self {
        Self {
            features,
            config,
            confidence,
        }
    }
}

impl ForecastModel for GradientBoosted {
    fn strategy(&self) -> Strategy {
        STRATEGY
    }

    fn fit(&self, series: &HistoricalSeries) -> Result<Box<dyn FittedModel>, EngineError> {
        let builder = FeatureBuilder::new(self.features.clone())
            .map_err(|e| EngineError::unfit(STRATEGY, e))?;
        let design = builder
            .design_matrix(series.first_period(), &series.values())
            .map_err(|e| EngineError::unfit(STRATEGY, e))?;

        let min_rows = 2 * self.config.min_samples_leaf;
        if design.len() < min_rows {
            return Err(EngineError::unfit(
                STRATEGY,
                format!("need at least {min_rows} training rows, got {}", design.len()),
            ));
        }

        let first = design.targets[0];
        if design.targets.iter().all(|&y| (y - first).abs() < f64::EPSILON) {
            let reason = if first.abs() < f64::EPSILON {
                "all-zero target".to_string()
            } else {
                format!("constant target {first}")
            };
            return Err(EngineError::unfit(STRATEGY, reason));
        }

        let ensemble = Ensemble::train(&design.rows, &design.targets, &self.config);
        let residuals: Vec<f64> = design
            .rows
            .iter()
            .zip(&design.targets)
            .map(|(row, y)| y - ensemble.predict(row))
            .collect();
        let sigma = stats::rms(&residuals);

        log::debug!(
            "{}: boosted {} trees on {} rows, sigma={sigma:.3}",
            series.segment(),
            ensemble.trees.len(),
            design.len()
        );

        Ok(Box::new(FittedBoosted {
            builder,
            ensemble,
            history: HistoryBuffer::from_series(series),
            sigma,
            z: stats::z_for_confidence(self.confidence),
        }))
    }
}

#[derive(Debug)]
struct FittedBoosted {
    builder: FeatureBuilder,
    ensemble: Ensemble,
    history: HistoryBuffer,
    sigma: f64,
    z: f64,
}

impl FittedModel for FittedBoosted {
    fn strategy(&self) -> Strategy {
        STRATEGY
    }

    fn predict(&self, horizon: usize) -> Result<Forecast, EngineError> {
        let predictions = recursive::forecast(STRATEGY, self.history.clone(), horizon, |buffer| {
            let features = self
                .builder
                .build_from_values(buffer.start(), buffer.values(), buffer.values().len())
                .map_err(|e| EngineError::unfit(STRATEGY, e))?;
            Ok(self.ensemble.predict(&features.to_row()))
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

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Self::Leaf(value) => *value,
            Self::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grows a regression tree on `targets` restricted to `indices`.
fn grow(
    rows: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    depth: usize,
    config: &BoostingConfig,
) -> Node {
    let values: Vec<f64> = indices.iter().map(|&i| targets[i]).collect();
    let leaf = Node::Leaf(stats::mean(&values));

    if depth >= config.max_depth || indices.len() < 2 * config.min_samples_leaf {
        return leaf;
    }

    let Some(best) = best_split(rows, targets, indices, config.min_samples_leaf) else {
        return leaf;
    };

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| rows[i][best.feature] <= best.threshold);

    Node::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(grow(rows, targets, &left, depth + 1, config)),
        right: Box::new(grow(rows, targets, &right, depth + 1, config)),
    }
}

/// Finds the split with the largest reduction in squared error that leaves
/// at least `min_leaf` rows on each side.
#[allow(clippy::cast_precision_loss)]
fn best_split(
    rows: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let total: f64 = indices.iter().map(|&i| targets[i]).sum();
    let base = total * total / n as f64;
    let width = rows[indices[0]].len();

    let mut best: Option<SplitCandidate> = None;
    for feature in 0..width {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

        let mut left_sum = 0.0;
        for (k, &i) in order.iter().enumerate().take(n - 1) {
            left_sum += targets[i];
            let left_n = k + 1;
            let right_n = n - left_n;

            let here = rows[i][feature];
            let next = rows[order[k + 1]][feature];
            if left_n < min_leaf || right_n < min_leaf || next <= here {
                continue;
            }

            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64
                - base;
            if gain > 1e-12 && best.is_none_or(|b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: f64::midpoint(here, next),
                    gain,
                });
            }
        }
    }

    best
}

#[derive(Debug, Clone)]
struct Ensemble {
    base: f64,
    learning_rate: f64,
    trees: Vec<Node>,
}

impl Ensemble {
    fn train(rows: &[Vec<f64>], targets: &[f64], config: &BoostingConfig) -> Self {
        let base = stats::mean(targets);
        let all: Vec<usize> = (0..rows.len()).collect();
        let mut fitted = vec![base; targets.len()];
        let mut trees = Vec::with_capacity(config.trees);

        for _ in 0..config.trees {
            let residuals: Vec<f64> = targets.iter().zip(&fitted).map(|(y, f)| y - f).collect();
            let tree = grow(rows, &residuals, &all, 0, config);
            for (f, row) in fitted.iter_mut().zip(rows) {
                *f += config.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Self {
            base,
            learning_rate: config.learning_rate,
            trees,
        }
    }

    fn predict(&self, row: &[f64]) -> f64 {
        self.base
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_forecast_models::{Period, Segment};

    fn series(counts: Vec<u64>) -> HistoricalSeries {
        HistoricalSeries::from_counts(
            Segment::new("Chennai", "Burglary"),
            Period::new(2019, 1).unwrap(),
            counts,
        )
        .unwrap()
    }

    fn model() -> GradientBoosted {
        GradientBoosted::new(FeatureConfig::default(), BoostingConfig::default(), 0.95)
    }

    #[test]
    fn single_split_separates_two_groups() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let targets: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 9.0 }).collect();
        let config = BoostingConfig {
            max_depth: 1,
            min_samples_leaf: 2,
            ..BoostingConfig::default()
        };
        let all: Vec<usize> = (0..10).collect();

        let tree = grow(&rows, &targets, &all, 0, &config);
        assert!((tree.predict(&[2.0]) - 1.0).abs() < 1e-12);
        assert!((tree.predict(&[7.0]) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn respects_min_leaf_size() {
        let rows: Vec<Vec<f64>> = (0..4).map(|i| vec![f64::from(i)]).collect();
        let targets = vec![0.0, 0.0, 0.0, 10.0];
        let split = best_split(&rows, &targets, &[0, 1, 2, 3], 2).unwrap();
        // The best unconstrained split would isolate the last row.
        assert!((split.threshold - 1.5).abs() < 1e-12);
    }

    #[test]
    fn boosting_reduces_training_error() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i % 12), f64::from(i)]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| r[0] * 3.0 + r[1]).collect();
        let ensemble = Ensemble::train(&rows, &targets, &BoostingConfig::default());

        let error: f64 = rows
            .iter()
            .zip(&targets)
            .map(|(r, y)| (y - ensemble.predict(r)).abs())
            .sum::<f64>()
            / 40.0;
        assert!(error < 3.0, "mean training error {error}");
    }

    #[test]
    fn all_zero_target_is_unfit() {
        let err = model().fit(&series(vec![0; 30])).unwrap_err();
        assert_eq!(err.reason(), "all-zero target");
    }

    #[test]
    fn constant_target_is_unfit() {
        let err = model().fit(&series(vec![7; 30])).unwrap_err();
        assert!(err.reason().starts_with("constant target"));
    }

    #[test]
    fn forecasts_full_horizon_without_negatives() {
        let counts: Vec<u64> = (0..48).map(|i| 5 + (i * 5 % 9)).collect();
        let forecast = model().fit(&series(counts)).unwrap().predict(9).unwrap();
        assert_eq!(forecast.horizon(), 9);
        assert_eq!(forecast.points[0].period, Period::new(2023, 1).unwrap());
        for pair in forecast.points.windows(2) {
            assert!(pair[1].width() >= pair[0].width() - 1e-9);
        }
        for p in &forecast.points {
            assert!(p.point >= 0.0 && p.lower >= 0.0 && p.lower <= p.point && p.point <= p.upper);
        }
    }
}
