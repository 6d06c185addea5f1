//! Multi-step prediction by feeding one-step predictions back as history.

use crime_forecast_models::{HistoricalSeries, Period, Strategy};

use crate::EngineError;

/// Values known (or assumed) so far, starting at a fixed month.
///
/// Never mutated: each step produces an extended copy, so a step function
/// cannot observe values from a later step.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    start: Period,
    values: Vec<f64>,
}

impl HistoryBuffer {
    pub const fn new(start: Period, values: Vec<f64>) -> Self {
        Self { start, values }
    }

    pub fn from_series(series: &HistoricalSeries) -> Self {
        Self::new(series.first_period(), series.values())
    }

    pub const fn start(&self) -> Period {
        self.start
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Month the next value would fall in.
    pub fn next_period(&self) -> Period {
        self.start.plus(self.values.len())
    }

    /// A copy with `value` appended.
    #[must_use]
    pub fn extended(&self, value: f64) -> Self {
        let mut values = Vec::with_capacity(self.values.len() + 1);
        values.extend_from_slice(&self.values);
        values.push(value);
        Self::new(self.start, values)
    }
}

/// Runs `step` `horizon` times, appending each clamped prediction to the
/// history the next step sees.
///
/// The value fed back is the same non-negative value that is reported.
///
/// # Errors
///
/// Propagates the first error from `step`, and fails with
/// [`EngineError::ModelUnfit`] if a prediction is not finite.
pub fn forecast<F>(
    strategy: Strategy,
    history: HistoryBuffer,
    horizon: usize,
    mut step: F,
) -> Result<Vec<f64>, EngineError>
where
    F: FnMut(&HistoryBuffer) -> Result<f64, EngineError>,
{
    let (_, predictions) = (0..horizon).try_fold(
        (history, Vec::with_capacity(horizon)),
        |(buffer, mut predictions), _| {
            let raw = step(&buffer)?;
            if !raw.is_finite() {
                return Err(EngineError::unfit(
                    strategy,
                    format!("non-finite prediction for {}", buffer.next_period()),
                ));
            }
            let value = raw.max(0.0);
            predictions.push(value);
            Ok((buffer.extended(value), predictions))
        },
    )?;

    Ok(predictions)
}
