//! Additive seasonal decomposition with a damped Holt trend.
//!
//! Seasonal indices come from a centred moving average once at least two
//! full cycles are available; shorter series are treated as non-seasonal.
//! The deseasonalized series is smoothed with Holt's linear method, whose
//! parameters are picked from a fixed grid by one-step squared error.

use crime_forecast_models::{Forecast, HistoricalSeries, Period, Strategy};

use crate::config::TrendSeasonalConfig;
use crate::interval::{self, IntervalRule};
use crate::models::{FittedModel, ForecastModel};
use crate::{EngineError, stats};

const MIN_OBSERVATIONS: usize = 3;

const ALPHAS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
const BETAS: [f64; 5] = [0.01, 0.05, 0.1, 0.2, 0.3];
const PHIS: [f64; 5] = [0.8, 0.9, 0.95, 0.98, 1.0];

#[derive(Debug, Clone)]
pub struct TrendSeasonal {
    config: TrendSeasonalConfig,
    confidence: f64,
}

impl TrendSeasonal {
    #[must_use]
    pub const fn new(config: TrendSeasonalConfig, confidence: f64) -> Self {
        Self { config, confidence }
    }
}

impl ForecastModel for TrendSeasonal {
    fn strategy(&self) -> Strategy {
        Strategy::TrendSeasonal
    }

    fn fit(&self, series: &HistoricalSeries) -> Result<Box<dyn FittedModel>, EngineError> {
        let values = series.values();
        if values.len() < MIN_OBSERVATIONS {
            return Err(EngineError::unfit(
                Strategy::TrendSeasonal,
                format!(
                    "need at least {MIN_OBSERVATIONS} observations, got {}",
                    values.len()
                ),
            ));
        }

        let season_length = self.config.season_length;
        let first = series.first_period();
        let seasonal = seasonal_indices(&values, first, season_length);

        let adjusted: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(t, v)| v - seasonal[season_position(first.plus(t), season_length)])
            .collect();

        let holt = DampedHolt::fit(&adjusted);
        log::debug!(
            "{}: trend-seasonal alpha={} beta={} phi={} sigma={:.3}",
            series.segment(),
            holt.alpha,
            holt.beta,
            holt.phi,
            holt.sigma
        );

        Ok(Box::new(FittedTrendSeasonal {
            next: series.last_period().next(),
            seasonal,
            season_length,
            holt,
            z: stats::z_for_confidence(self.confidence),
            interval_growth: self.config.interval_growth,
        }))
    }
}

#[derive(Debug)]
struct FittedTrendSeasonal {
    next: Period,
    seasonal: Vec<f64>,
    season_length: usize,
    holt: DampedHolt,
    z: f64,
    interval_growth: f64,
}

impl FittedModel for FittedTrendSeasonal {
    fn strategy(&self) -> Strategy {
        Strategy::TrendSeasonal
    }

    fn predict(&self, horizon: usize) -> Result<Forecast, EngineError> {
        let predictions: Vec<f64> = (1..=horizon)
            .map(|h| {
                let period = self.next.plus(h - 1);
                self.holt.forecast(h) + self.seasonal[season_position(period, self.season_length)]
            })
            .collect();

        if predictions.iter().any(|p| !p.is_finite()) {
            return Err(EngineError::unfit(
                Strategy::TrendSeasonal,
                "non-finite trend extrapolation",
            ));
        }

        Ok(interval::assemble(
            Strategy::TrendSeasonal,
            self.next,
            &predictions,
            self.holt.sigma,
            self.z,
            IntervalRule::Linear {
                growth: self.interval_growth,
            },
        ))
    }
}

/// Position of `period` within a cycle of `season_length` months, aligned
/// to calendar months so that a 12-month cycle starts in January.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
fn season_position(period: Period, season_length: usize) -> usize {
    let ordinal = i64::from(period.year()) * 12 + i64::from(period.month()) - 1;
    ordinal.rem_euclid(season_length as i64) as usize
}

/// Mean-zero additive seasonal indices, one per cycle position.
#[allow(clippy::cast_precision_loss)]
fn seasonal_indices(values: &[f64], first: Period, season_length: usize) -> Vec<f64> {
    let n = values.len();
    if n < 2 * season_length {
        return vec![0.0; season_length];
    }

    let half = season_length / 2;
    let width = season_length as f64;
    let mut sums = vec![0.0; season_length];
    let mut counts = vec![0_usize; season_length];

    for t in half..n - half {
        let centred = if season_length % 2 == 0 {
            (0.5 * values[t - half]
                + values[t - half + 1..t + half].iter().sum::<f64>()
                + 0.5 * values[t + half])
                / width
        } else {
            values[t - half..=t + half].iter().sum::<f64>() / width
        };

        let pos = season_position(first.plus(t), season_length);
        sums[pos] += values[t] - centred;
        counts[pos] += 1;
    }

    let mut indices: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
        .collect();

    let offset = stats::mean(&indices);
    for index in &mut indices {
        *index -= offset;
    }

    indices
}

#[derive(Debug, Clone, Copy)]
struct DampedHolt {
    alpha: f64,
    beta: f64,
    phi: f64,
    level: f64,
    trend: f64,
    sigma: f64,
}

impl DampedHolt {
    /// Grid-searches the smoothing parameters and runs the final pass.
    /// `values` must hold at least two points.
    fn fit(values: &[f64]) -> Self {
        let mut best = (f64::INFINITY, ALPHAS[0], BETAS[0], PHIS[0]);
        for &alpha in &ALPHAS {
            for &beta in &BETAS {
                for &phi in &PHIS {
                    let (sse, ..) = Self::run(values, alpha, beta, phi);
                    if sse < best.0 {
                        best = (sse, alpha, beta, phi);
                    }
                }
            }
        }

        let (_, alpha, beta, phi) = best;
        let (_, level, trend, residuals) = Self::run(values, alpha, beta, phi);

        Self {
            alpha,
            beta,
            phi,
            level,
            trend,
            sigma: stats::rms(&residuals),
        }
    }

    /// One smoothing pass, returning the one-step SSE, the final state and
    /// the one-step residuals.
    fn run(values: &[f64], alpha: f64, beta: f64, phi: f64) -> (f64, f64, f64, Vec<f64>) {
        let mut level = values[0];
        let mut trend = values[1] - values[0];
        let mut residuals = Vec::with_capacity(values.len() - 1);

        for &y in &values[1..] {
            let error = y - (level + phi * trend);
            residuals.push(error);

            let previous = level;
            level = alpha * y + (1.0 - alpha) * (previous + phi * trend);
            trend = beta * (level - previous) + (1.0 - beta) * phi * trend;
        }

        let sse = residuals.iter().map(|e| e * e).sum();
        (sse, level, trend, residuals)
    }

    fn forecast(&self, h: usize) -> f64 {
        self.level + damped_sum(self.phi, h) * self.trend
    }
}

/// `phi + phi^2 + ... + phi^h`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn damped_sum(phi: f64, h: usize) -> f64 {
    if (phi - 1.0).abs() < 1e-10 {
        h as f64
    } else {
        phi * (1.0 - phi.powi(h as i32)) / (1.0 - phi)
    }
}
