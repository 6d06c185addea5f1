#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the crime forecasting engine.
//!
//! Segments, monthly periods and historical series describe the input side;
//! forecasts, held-out evaluations and reports describe what the engine
//! hands back to its callers. Everything here is plain data: serializable,
//! immutable once built, and free of model internals.

mod period;
mod series;

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use period::{Period, PeriodError};
pub use series::{ALL_CATEGORIES, HistoricalSeries, Observation, Segment, SeriesError};

/// Forecasting technique identifier.
///
/// Declaration order is the fixed priority order used to rank results when
/// no held-out scores are available.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Strategy {
    /// Seasonal decomposition with damped linear trend extrapolation.
    TrendSeasonal,
    /// Ridge regression over lag and calendar features, predicted recursively.
    LagRegression,
    /// Gradient-boosted regression trees over the same features.
    GradientBoosted,
    /// Small neural network over a trailing window of counts.
    SequenceModel,
}

impl Strategy {
    /// Every strategy in priority order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::TrendSeasonal,
            Self::LagRegression,
            Self::GradientBoosted,
            Self::SequenceModel,
        ]
    }

    /// Position in the priority order, `0` being highest.
    #[must_use]
    pub const fn priority(self) -> usize {
        self as usize
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TrendSeasonal => "Trend-Seasonal",
            Self::LagRegression => "Regression-with-Lags",
            Self::GradientBoosted => "Gradient-Boosted Regression",
            Self::SequenceModel => "Sequence Model",
        }
    }
}

/// One forecasted month.
///
/// Values are fractional; use [`ForecastPoint::rounded`] only for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    /// Forecasted month.
    pub period: Period,
    /// Point estimate, never negative.
    pub point: f64,
    /// Lower interval bound.
    pub lower: f64,
    /// Upper interval bound.
    pub upper: f64,
}

/// A [`ForecastPoint`] rounded to whole incident counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundedPoint {
    /// Forecasted month.
    pub period: Period,
    /// Point estimate.
    pub point: u64,
    /// Lower interval bound.
    pub lower: u64,
    /// Upper interval bound.
    pub upper: u64,
}

impl ForecastPoint {
    /// Interval width, `upper - lower`.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Rounds every value to the nearest non-negative integer.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rounded(&self) -> RoundedPoint {
        let round = |v: f64| v.max(0.0).round() as u64;
        RoundedPoint {
            period: self.period,
            point: round(self.point),
            lower: round(self.lower),
            upper: round(self.upper),
        }
    }
}

/// Predictions for consecutive future months from one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    /// Strategy that produced the forecast.
    pub strategy: Strategy,
    /// One entry per forecasted month, oldest first.
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    /// Number of forecasted months.
    #[must_use]
    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    /// Point estimates in order.
    #[must_use]
    pub fn point_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.point).collect()
    }
}

/// Accuracy metric computed on a held-out tail.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Metric {
    /// Mean absolute error, in incidents.
    Mae,
    /// Mean absolute percentage error, in percent.
    Mape,
}

/// A single metric value for one strategy on one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationScore {
    /// Strategy scored.
    pub strategy: Strategy,
    /// Segment scored on.
    pub segment: Segment,
    /// Which metric.
    pub metric: Metric,
    /// Metric value.
    pub value: f64,
}

/// Held-out accuracy of one strategy on one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldoutEvaluation {
    /// Strategy scored.
    pub strategy: Strategy,
    /// Segment scored on.
    pub segment: Segment,
    /// Months used for training.
    pub training_len: usize,
    /// Months withheld and predicted.
    pub holdout_len: usize,
    /// Metric values.
    pub scores: Vec<EvaluationScore>,
}

impl HoldoutEvaluation {
    /// Value of `metric`, if it was computed.
    #[must_use]
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.metric == metric)
            .map(|s| s.value)
    }

    /// Mean absolute error on the held-out tail.
    #[must_use]
    pub fn mae(&self) -> Option<f64> {
        self.metric(Metric::Mae)
    }

    /// Mean absolute percentage error on the held-out tail.
    #[must_use]
    pub fn mape(&self) -> Option<f64> {
        self.metric(Metric::Mape)
    }
}

/// Why a strategy is missing (or partially missing) from a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum ExclusionReason {
    /// The strategy could not be trained; it has no forecast.
    ModelUnfit(String),
    /// The strategy has a forecast but no held-out score.
    EvaluationUnavailable(String),
}

/// A strategy excluded from a report, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exclusion {
    /// Affected strategy.
    pub strategy: Strategy,
    /// What happened.
    pub reason: ExclusionReason,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ExclusionReason::ModelUnfit(msg) => {
                write!(f, "{} unavailable: {msg}", self.strategy.label())
            }
            ExclusionReason::EvaluationUnavailable(msg) => {
                write!(f, "{} not scored: {msg}", self.strategy.label())
            }
        }
    }
}

/// A forecast with its position in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedForecast {
    /// 1-based rank.
    pub rank: usize,
    /// Producing strategy.
    pub strategy: Strategy,
    /// The forecast itself.
    pub forecast: Forecast,
    /// Held-out evaluation, when one could be computed.
    pub evaluation: Option<HoldoutEvaluation>,
}

/// Everything returned by a forecast request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
    /// Segment forecasted.
    pub segment: Segment,
    /// Requested horizon.
    pub horizon: usize,
    /// Ranked forecasts, best first.
    pub results: Vec<RankedForecast>,
    /// Strategies excluded or left unscored, with reasons.
    pub exclusions: Vec<Exclusion>,
}

impl ForecastReport {
    /// The top-ranked forecast.
    #[must_use]
    pub fn best(&self) -> Option<&RankedForecast> {
        self.results.first()
    }

    /// Strategies in ranked order.
    #[must_use]
    pub fn strategies(&self) -> Vec<Strategy> {
        self.results.iter().map(|r| r.strategy).collect()
    }
}

/// Held-out evaluations of every strategy for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    /// Segment evaluated.
    pub segment: Segment,
    /// Evaluations ordered by ascending MAE.
    pub evaluations: Vec<HoldoutEvaluation>,
    /// Strategies that could not be scored.
    pub exclusions: Vec<Exclusion>,
}

/// Incidents summed over one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearTotal {
    /// Calendar year.
    pub year: i32,
    /// Incidents in that year's observed months.
    pub total: u64,
}

/// Headline statistics for a segment's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSummary {
    /// Segment summarized.
    pub segment: Segment,
    /// First observed month.
    pub first_period: Period,
    /// Latest observed month.
    pub last_period: Period,
    /// All incidents across the history.
    pub total: u64,
    /// Mean incidents per month.
    pub monthly_average: f64,
    /// Latest month's observation.
    pub latest: Observation,
    /// Per-year totals, oldest first.
    pub yearly_totals: Vec<YearTotal>,
    /// Incidents per crime category, largest first. Only filled for
    /// city-wide segments of datasets that categorize crime types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category_distribution: Vec<CategoryTotal>,
}

impl SeriesSummary {
    /// Summarizes a historical series.
    #[must_use]
    pub fn from_series(series: &HistoricalSeries) -> Self {
        let mut yearly_totals: Vec<YearTotal> = Vec::new();
        for obs in series.observations() {
            match yearly_totals.last_mut() {
                Some(last) if last.year == obs.period.year() => last.total += obs.count,
                _ => yearly_totals.push(YearTotal {
                    year: obs.period.year(),
                    total: obs.count,
                }),
            }
        }

        Self {
            segment: series.segment().clone(),
            first_period: series.first_period(),
            last_period: series.last_period(),
            total: series.total(),
            monthly_average: series.mean(),
            latest: series.latest(),
            yearly_totals,
            category_distribution: Vec::new(),
        }
    }
}

/// Incidents of one crime category within a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    /// Category name, e.g. `Property Crimes`.
    pub category: String,
    /// Incidents across the whole history.
    pub total: u64,
    /// Percent of the city's categorized incidents.
    pub share: f64,
}

impl CategoryTotal {
    /// Builds a distribution from per-category totals, largest first.
    ///
    /// Ties are ordered by name. Shares are zero when every total is zero.
    #[must_use]
    pub fn distribution(totals: impl IntoIterator<Item = (String, u64)>) -> Vec<Self> {
        let totals: Vec<(String, u64)> = totals.into_iter().collect();
        let sum: u64 = totals.iter().map(|(_, total)| total).sum();

        #[allow(clippy::cast_precision_loss)]
        let mut distribution: Vec<Self> = totals
            .into_iter()
            .map(|(category, total)| Self {
                category,
                total,
                share: if sum == 0 {
                    0.0
                } else {
                    total as f64 / sum as f64 * 100.0
                },
            })
            .collect();
        distribution.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.category.cmp(&b.category))
        });
        distribution
    }
}

/// Direction of a forecast from its first to its last month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrendDirection {
    /// Last forecast month above the first.
    Increasing,
    /// Last forecast month below the first.
    Decreasing,
    /// First and last months equal.
    Flat,
}

/// Plain-language reading of a forecast against recent history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastInsight {
    /// Strategy the insight was derived from.
    pub strategy: Strategy,
    /// Mean of the point estimates.
    pub predicted_average: f64,
    /// Direction from first to last forecast month.
    pub trend: TrendDirection,
    /// Percent change of the final forecast against the latest observed
    /// month, absent when the latest month had no incidents.
    pub change_from_latest_pct: Option<f64>,
    /// First forecast month.
    pub from: Period,
    /// Last forecast month.
    pub to: Period,
}

impl ForecastInsight {
    /// Derives an insight from a forecast and the latest observed count.
    ///
    /// Returns `None` for an empty forecast.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_forecast(forecast: &Forecast, latest: Observation) -> Option<Self> {
        let first = forecast.points.first()?;
        let last = forecast.points.last()?;

        let predicted_average =
            forecast.points.iter().map(|p| p.point).sum::<f64>() / forecast.points.len() as f64;

        let trend = if last.point > first.point {
            TrendDirection::Increasing
        } else if last.point < first.point {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Flat
        };

        let change_from_latest_pct = (latest.count > 0).then(|| {
            let latest = latest.count as f64;
            (last.point - latest) / latest * 100.0
        });

        Some(Self {
            strategy: forecast.strategy,
            predicted_average,
            trend,
            change_from_latest_pct,
            from: first.period,
            to: last.period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    fn point(month: u32, value: f64) -> ForecastPoint {
        ForecastPoint {
            period: period(2025, month),
            point: value,
            lower: value - 1.0,
            upper: value + 1.0,
        }
    }

    #[test]
    fn category_distribution_is_largest_first_with_shares() {
        let distribution = CategoryTotal::distribution([
            ("Violent Crimes".to_string(), 25),
            ("Property Crimes".to_string(), 75),
            ("Cyber Crimes".to_string(), 0),
        ]);
        let names: Vec<&str> = distribution.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Property Crimes", "Violent Crimes", "Cyber Crimes"]);
        assert!((distribution[0].share - 75.0).abs() < 1e-9);
        assert!((distribution[1].share - 25.0).abs() < 1e-9);
        assert!(distribution[2].share.abs() < 1e-12);

        let empty = CategoryTotal::distribution([("Other".to_string(), 0)]);
        assert!(empty[0].share.abs() < 1e-12);
    }

    #[test]
    fn strategy_priority_matches_declaration_order() {
        let priorities: Vec<usize> = Strategy::all().iter().map(|s| s.priority()).collect();
        assert_eq!(priorities, vec![0, 1, 2, 3]);
        assert!(Strategy::TrendSeasonal < Strategy::SequenceModel);
    }

    #[test]
    fn strategy_identifiers_round_trip() {
        for strategy in Strategy::all() {
            let id = strategy.to_string();
            assert_eq!(id.parse::<Strategy>().unwrap(), *strategy);
        }
        assert_eq!(Strategy::LagRegression.as_ref(), "lag-regression");
        assert!("Lag-Regression".parse::<Strategy>().is_err());
    }

    #[test]
    fn rounding_happens_only_on_request() {
        let p = ForecastPoint {
            period: period(2025, 1),
            point: 12.6,
            lower: -0.4,
            upper: 20.49,
        };
        let r = p.rounded();
        assert_eq!((r.point, r.lower, r.upper), (13, 0, 20));
        assert!((p.point - 12.6).abs() < f64::EPSILON);
    }

    #[test]
    fn exclusion_message_names_strategy() {
        let exclusion = Exclusion {
            strategy: Strategy::SequenceModel,
            reason: ExclusionReason::ModelUnfit("insufficient history".to_string()),
        };
        assert_eq!(
            exclusion.to_string(),
            "Sequence Model unavailable: insufficient history"
        );
    }

    #[test]
    fn summary_groups_years() {
        let series = HistoricalSeries::from_counts(
            Segment::city_wide("Delhi"),
            period(2019, 11),
            [1, 2, 3, 4],
        )
        .unwrap();
        let summary = SeriesSummary::from_series(&series);
        assert_eq!(
            summary.yearly_totals,
            vec![
                YearTotal {
                    year: 2019,
                    total: 3
                },
                YearTotal {
                    year: 2020,
                    total: 7
                },
            ]
        );
        assert_eq!(summary.latest.count, 4);
        assert_eq!(summary.total, 10);
    }

    #[test]
    fn insight_reports_direction_and_change() {
        let forecast = Forecast {
            strategy: Strategy::TrendSeasonal,
            points: vec![point(1, 100.0), point(2, 110.0), point(3, 120.0)],
        };
        let latest = Observation {
            period: period(2024, 12),
            count: 100,
        };
        let insight = ForecastInsight::from_forecast(&forecast, latest).unwrap();
        assert_eq!(insight.trend, TrendDirection::Increasing);
        assert!((insight.predicted_average - 110.0).abs() < 1e-9);
        assert!((insight.change_from_latest_pct.unwrap() - 20.0).abs() < 1e-9);

        let zero = Observation {
            period: period(2024, 12),
            count: 0,
        };
        assert!(
            ForecastInsight::from_forecast(&forecast, zero)
                .unwrap()
                .change_from_latest_pct
                .is_none()
        );
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = ForecastReport {
            segment: Segment::city_wide("Delhi"),
            horizon: 1,
            results: vec![RankedForecast {
                rank: 1,
                strategy: Strategy::GradientBoosted,
                forecast: Forecast {
                    strategy: Strategy::GradientBoosted,
                    points: vec![point(1, 5.0)],
                },
                evaluation: None,
            }],
            exclusions: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["strategy"], "gradient-boosted");
        assert_eq!(json["results"][0]["forecast"]["points"][0]["period"], "2025-01");
        assert!(json.get("exclusions").is_some());
    }
}
