//! Small feed-forward network over a trailing window of counts.
//!
//! The network maps the last `window` standardized counts through one
//! `tanh` hidden layer to the next standardized count. Weights are seeded
//! from a fixed seed so that the same series always trains to the same
//! model. Training stops at `max_epochs`, on convergence, or with an error
//! when the wall-clock budget runs out.

use std::time::Instant;

use crime_forecast_models::{Forecast, HistoricalSeries, Strategy};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::SequenceConfig;
use crate::interval::{self, IntervalRule};
use crate::models::{FittedModel, ForecastModel};
use crate::recursive::{self, HistoryBuffer};
use crate::{EngineError, stats};

const STRATEGY: Strategy = Strategy::SequenceModel;

/// Loss change below which training is considered converged.
const CONVERGENCE: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct SequenceModel {
    config: SequenceConfig,
    confidence: f64,
}

impl SequenceModel {
    #[must_use]
    pub const fn new(config: SequenceConfig, confidence: f64) -> Self {
        Self { config, confidence }
    }
}

impl ForecastModel for SequenceModel {
    fn strategy(&self) -> Strategy {
        STRATEGY
    }

    fn fit(&self, series: &HistoricalSeries) -> Result<Box<dyn FittedModel>, EngineError> {
        let config = &self.config;
        let values = series.values();

        let needed = config.window + config.min_samples;
        if values.len() < needed {
            let shortfall = EngineError::InsufficientHistory {
                needed,
                got: values.len(),
            };
            return Err(EngineError::unfit(STRATEGY, shortfall));
        }

        let scaler = Scaler::fit(&values);
        let scaled: Vec<f64> = values.iter().map(|&v| scaler.scale(v)).collect();
        let samples: Vec<(&[f64], f64)> = (config.window..scaled.len())
            .map(|t| (&scaled[t - config.window..t], scaled[t]))
            .collect();

        let mut network = Network::init(config.window, config.hidden, config.seed);
        let epochs = network
            .train(&samples, config)
            .map_err(|reason| EngineError::unfit(STRATEGY, reason))?;

        let residuals: Vec<f64> = samples
            .iter()
            .map(|(x, y)| (network.forward(x) - y) * scaler.spread)
            .collect();
        let sigma = stats::rms(&residuals);
        if !sigma.is_finite() {
            return Err(EngineError::unfit(STRATEGY, "non-finite residuals"));
        }

        log::debug!(
            "{}: sequence model trained for {epochs} epochs on {} samples, sigma={sigma:.3}",
            series.segment(),
            samples.len()
        );

        Ok(Box::new(FittedSequence {
            network,
            scaler,
            history: HistoryBuffer::from_series(series),
            sigma,
            z: stats::z_for_confidence(self.confidence),
        }))
    }
}

#[derive(Debug)]
struct FittedSequence {
    network: Network,
    scaler: Scaler,
    history: HistoryBuffer,
    sigma: f64,
    z: f64,
}

impl FittedModel for FittedSequence {
    fn strategy(&self) -> Strategy {
        STRATEGY
    }

    fn predict(&self, horizon: usize) -> Result<Forecast, EngineError> {
        let window = self.network.window;
        let predictions = recursive::forecast(STRATEGY, self.history.clone(), horizon, |buffer| {
            let values = buffer.values();
            let input: Vec<f64> = values[values.len() - window..]
                .iter()
                .map(|&v| self.scaler.scale(v))
                .collect();
            Ok(self.scaler.unscale(self.network.forward(&input)))
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

/// Standardizes counts to zero mean and unit variance.
#[derive(Debug, Clone, Copy)]
struct Scaler {
    mean: f64,
    spread: f64,
}

impl Scaler {
    fn fit(values: &[f64]) -> Self {
        let sd = stats::std_dev(values);
        Self {
            mean: stats::mean(values),
            spread: if sd > 1e-9 { sd } else { 1.0 },
        }
    }

    fn scale(self, value: f64) -> f64 {
        (value - self.mean) / self.spread
    }

    fn unscale(self, value: f64) -> f64 {
        value.mul_add(self.spread, self.mean)
    }
}

/// One-hidden-layer network with flat parameter storage:
/// input weights (`hidden * window`), hidden biases, output weights, output
/// bias.
#[derive(Debug, Clone)]
struct Network {
    window: usize,
    hidden: usize,
    params: Vec<f64>,
}

impl Network {
    #[allow(clippy::cast_precision_loss)]
    fn init(window: usize, hidden: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let input_bound = 1.0 / (window as f64).sqrt();
        let output_bound = 1.0 / (hidden as f64).sqrt();

        let mut params = Vec::with_capacity(hidden * window + 2 * hidden + 1);
        params.extend((0..hidden * window).map(|_| rng.gen_range(-input_bound..input_bound)));
        params.extend(std::iter::repeat_n(0.0, hidden));
        params.extend((0..hidden).map(|_| rng.gen_range(-output_bound..output_bound)));
        params.push(0.0);

        Self {
            window,
            hidden,
            params,
        }
    }

    const fn hidden_bias(&self) -> usize {
        self.hidden * self.window
    }

    const fn output_weights(&self) -> usize {
        self.hidden_bias() + self.hidden
    }

    const fn output_bias(&self) -> usize {
        self.output_weights() + self.hidden
    }

    fn activations(&self, input: &[f64]) -> Vec<f64> {
        (0..self.hidden)
            .map(|j| {
                let weights = &self.params[j * self.window..(j + 1) * self.window];
                let sum: f64 = weights.iter().zip(input).map(|(w, x)| w * x).sum();
                (sum + self.params[self.hidden_bias() + j]).tanh()
            })
            .collect()
    }

    fn output(&self, activations: &[f64]) -> f64 {
        let weights = &self.params[self.output_weights()..self.output_bias()];
        weights.iter().zip(activations).map(|(w, h)| w * h).sum::<f64>()
            + self.params[self.output_bias()]
    }

    fn forward(&self, input: &[f64]) -> f64 {
        self.output(&self.activations(input))
    }

    /// Mean squared error over `samples` and its gradient.
    #[allow(clippy::cast_precision_loss)]
    fn loss_and_gradient(&self, samples: &[(&[f64], f64)]) -> (f64, Vec<f64>) {
        let m = samples.len() as f64;
        let mut gradient = vec![0.0; self.params.len()];
        let mut loss = 0.0;

        for (input, target) in samples {
            let hidden = self.activations(input);
            let error = self.output(&hidden) - target;
            loss += error * error / m;

            let d_out = 2.0 * error / m;
            gradient[self.output_bias()] += d_out;
            for (j, h) in hidden.iter().enumerate() {
                gradient[self.output_weights() + j] += d_out * h;

                let d_hidden = d_out * self.params[self.output_weights() + j] * (1.0 - h * h);
                gradient[self.hidden_bias() + j] += d_hidden;
                for (k, x) in input.iter().enumerate() {
                    gradient[j * self.window + k] += d_hidden * x;
                }
            }
        }

        (loss, gradient)
    }

    /// Full-batch gradient descent with momentum. Returns the number of
    /// epochs run.
    fn train(
        &mut self,
        samples: &[(&[f64], f64)],
        config: &SequenceConfig,
    ) -> Result<usize, String> {
        let started = Instant::now();
        let budget = config.training_budget();
        let mut velocity = vec![0.0; self.params.len()];
        let mut previous = f64::INFINITY;

        for epoch in 0..config.max_epochs {
            if started.elapsed() >= budget {
                return Err(format!(
                    "training budget of {} ms exceeded after {epoch} epochs",
                    config.training_budget_ms
                ));
            }

            let (loss, gradient) = self.loss_and_gradient(samples);
            if !loss.is_finite() {
                return Err(format!("training loss diverged at epoch {epoch}"));
            }

            for ((param, v), g) in self.params.iter_mut().zip(&mut velocity).zip(&gradient) {
                *v = config.momentum * *v - config.learning_rate * g;
                *param += *v;
            }

            if (previous - loss).abs() < CONVERGENCE {
                return Ok(epoch + 1);
            }
            previous = loss;
        }

        Ok(config.max_epochs)
    }
}
