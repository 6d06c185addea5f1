//! Turns raw predictions into [`ForecastPoint`]s with prediction intervals.

use crime_forecast_models::{Forecast, ForecastPoint, Period, Strategy};

/// How the interval half-width grows with forecast distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntervalRule {
    /// `base * (1 + growth * (h - 1))`.
    Linear {
        /// Relative widening per extra month.
        growth: f64,
    },
    /// `base * sqrt(h)`, the random-walk accumulation of one-step errors.
    SquareRoot,
}

impl IntervalRule {
    /// Half-width at 1-based step `step` for a one-step half-width `base`.
    #[allow(clippy::cast_precision_loss)]
    pub fn half_width(self, base: f64, step: usize) -> f64 {
        let h = step.max(1) as f64;
        match self {
            Self::Linear { growth } => base * (1.0 + growth * (h - 1.0)),
            Self::SquareRoot => base * h.sqrt(),
        }
    }
}

/// Assembles a forecast starting at `start` from raw predictions.
///
/// Points are clamped at zero and lower bounds never go negative. When
/// clamping the lower bound would make an interval narrower than the one
/// before it, the upper bound is raised to keep widths non-decreasing.
pub fn assemble(
    strategy: Strategy,
    start: Period,
    predictions: &[f64],
    sigma: f64,
    z: f64,
    rule: IntervalRule,
) -> Forecast {
    let base = (z * sigma).max(0.0);
    let mut previous_width = 0.0_f64;

    let points = predictions
        .iter()
        .enumerate()
        .map(|(i, &raw)| {
            let point = raw.max(0.0);
            let half = rule.half_width(base, i + 1);
            let lower = (point - half).max(0.0);
            let mut upper = point + half;
            if upper - lower < previous_width {
                upper = lower + previous_width;
            }
            previous_width = upper - lower;

            ForecastPoint {
                period: start.plus(i),
                point,
                lower,
                upper,
            }
        })
        .collect();

    Forecast { strategy, points }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Period {
        Period::new(2025, 1).unwrap()
    }

    #[test]
    fn linear_rule_grows_by_growth_per_step() {
        let rule = IntervalRule::Linear { growth: 0.1 };
        assert!((rule.half_width(10.0, 1) - 10.0).abs() < 1e-12);
        assert!((rule.half_width(10.0, 6) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn square_root_rule() {
        assert!((IntervalRule::SquareRoot.half_width(3.0, 4) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn periods_follow_start() {
        let f = assemble(
            Strategy::LagRegression,
            start(),
            &[1.0, 2.0, 3.0],
            1.0,
            1.96,
            IntervalRule::SquareRoot,
        );
        let periods: Vec<String> = f.points.iter().map(|p| p.period.to_string()).collect();
        assert_eq!(periods, vec!["2025-01", "2025-02", "2025-03"]);
    }

    #[test]
    fn clamps_negative_values() {
        let f = assemble(
            Strategy::TrendSeasonal,
            start(),
            &[-4.0, 2.0],
            1.0,
            2.0,
            IntervalRule::Linear { growth: 0.0 },
        );
        let first = f.points[0];
        assert!(first.point.abs() < f64::EPSILON);
        assert!(first.lower.abs() < f64::EPSILON);
        assert!(first.upper >= first.point);
    }

    #[test]
    fn widths_never_shrink_after_clamping() {
        // A falling forecast near zero: the raw interval would be cut by
        // the zero floor more at later steps.
        let f = assemble(
            Strategy::GradientBoosted,
            start(),
            &[20.0, 5.0, 1.0, 0.0],
            5.0,
            2.0,
            IntervalRule::SquareRoot,
        );
        for pair in f.points.windows(2) {
            assert!(pair[1].width() >= pair[0].width() - 1e-12);
        }
        for p in &f.points {
            assert!(p.lower <= p.point && p.point <= p.upper);
            assert!(p.lower >= 0.0);
        }
    }
}
