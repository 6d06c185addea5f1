//! Request-level coordination: validation, parallel variant runs, scoring
//! and ranking.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crime_forecast_models::{
    CategoryTotal, EvaluationReport, Exclusion, ExclusionReason, Forecast, ForecastInsight,
    ForecastReport, HistoricalSeries, HoldoutEvaluation, RankedForecast, Segment, SeriesSummary,
    Strategy,
};
use crime_forecast_store::TimeSeriesStore;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::progress::ProgressCallback;
use crate::{EngineConfig, EngineError, evaluator, models};

/// A request to forecast one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRequest {
    /// Segment to forecast.
    pub segment: Segment,
    /// Months to forecast.
    pub horizon: usize,
    /// Strategies to run; empty means all of them.
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

impl ForecastRequest {
    /// A request running every strategy.
    #[must_use]
    pub const fn all_strategies(segment: Segment, horizon: usize) -> Self {
        Self {
            segment,
            horizon,
            strategies: Vec::new(),
        }
    }

    /// The strategies to run, deduplicated, in priority order.
    #[must_use]
    pub fn resolved_strategies(&self) -> Vec<Strategy> {
        if self.strategies.is_empty() {
            return Strategy::all().to_vec();
        }
        let unique: BTreeSet<Strategy> = self.strategies.iter().copied().collect();
        unique.into_iter().collect()
    }
}

/// Outcome of running one strategy inside a forecast request.
enum VariantOutcome {
    Forecast {
        forecast: Forecast,
        evaluation: Option<HoldoutEvaluation>,
        note: Option<Exclusion>,
    },
    Unfit(Exclusion),
}

/// Multi-model forecasting engine over a read-only store.
///
/// Cheap to share: clone the `Arc` it holds or wrap the engine itself in one.
pub struct ForecastEngine {
    store: Arc<TimeSeriesStore>,
    config: EngineConfig,
}

impl ForecastEngine {
    /// Creates an engine after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is unusable.
    pub fn new(store: Arc<TimeSeriesStore>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    /// Every segment with history.
    #[must_use]
    pub fn list_segments(&self) -> BTreeSet<Segment> {
        self.store.segments()
    }

    /// Headline statistics for a segment's history.
    ///
    /// City-wide summaries also carry the city's crime category
    /// distribution.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SegmentNotFound`] for an unknown segment.
    pub fn summarize(&self, segment: &Segment) -> Result<SeriesSummary, EngineError> {
        let series = self.store.get_series(segment)?;
        let mut summary = SeriesSummary::from_series(series);
        if segment.is_city_wide() {
            summary.category_distribution = self.category_distribution(&segment.city).to_vec();
        }
        Ok(summary)
    }

    /// Incidents of `city` per crime category, largest first.
    #[must_use]
    pub fn category_distribution(&self, city: &str) -> &[CategoryTotal] {
        self.store.category_distribution(city)
    }

    /// Plain-language reading of the best forecast in `report`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SegmentNotFound`] if the report's segment is no
    /// longer in the store.
    pub fn insight(&self, report: &ForecastReport) -> Result<Option<ForecastInsight>, EngineError> {
        let series = self.store.get_series(&report.segment)?;
        Ok(report
            .best()
            .and_then(|best| ForecastInsight::from_forecast(&best.forecast, series.latest())))
    }

    /// Checks `horizon` against the configured bounds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidHorizon`] when out of bounds.
    pub fn validate_horizon(&self, horizon: usize) -> Result<(), EngineError> {
        let (min, max) = (self.config.horizon.min, self.config.horizon.max);
        if horizon < min || horizon > max {
            return Err(EngineError::InvalidHorizon { horizon, min, max });
        }
        Ok(())
    }

    /// Runs the requested strategies on a segment and ranks their forecasts.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidHorizon`] or
    /// [`EngineError::SegmentNotFound`] for a bad request, and
    /// [`EngineError::NoModelAvailable`] when no strategy produced a
    /// forecast.
    pub fn forecast(&self, request: &ForecastRequest) -> Result<ForecastReport, EngineError> {
        self.validate_horizon(request.horizon)?;
        let series = self.store.get_series(&request.segment)?;
        let strategies = request.resolved_strategies();

        log::debug!(
            "Forecasting {} for {} months with {} strategies",
            request.segment,
            request.horizon,
            strategies.len()
        );

        let outcomes: Vec<VariantOutcome> = strategies
            .par_iter()
            .map(|&strategy| self.run_variant(strategy, series, request.horizon))
            .collect();

        let mut scored = Vec::new();
        let mut unscored = Vec::new();
        let mut exclusions = Vec::new();
        for outcome in outcomes {
            match outcome {
                VariantOutcome::Forecast {
                    forecast,
                    evaluation,
                    note,
                } => {
                    exclusions.extend(note);
                    match evaluation {
                        Some(evaluation) => scored.push((forecast, Some(evaluation))),
                        None => unscored.push((forecast, None)),
                    }
                }
                VariantOutcome::Unfit(exclusion) => exclusions.push(exclusion),
            }
        }

        if scored.is_empty() && unscored.is_empty() {
            log::warn!(
                "No model available for {}: {} strategies excluded",
                request.segment,
                exclusions.len()
            );
            return Err(EngineError::NoModelAvailable {
                segment: request.segment.clone(),
                exclusions,
            });
        }

        scored.sort_by(|(a, ea), (b, eb)| {
            mae_of(ea.as_ref())
                .total_cmp(&mae_of(eb.as_ref()))
                .then(a.strategy.priority().cmp(&b.strategy.priority()))
        });
        unscored.sort_by_key(|(f, _)| f.strategy.priority());

        let results: Vec<RankedForecast> = scored
            .into_iter()
            .chain(unscored)
            .enumerate()
            .map(|(i, (forecast, evaluation))| RankedForecast {
                rank: i + 1,
                strategy: forecast.strategy,
                forecast,
                evaluation,
            })
            .collect();

        log::info!(
            "Forecast {} ({} months): {} ranked, {} notes, best {}",
            request.segment,
            request.horizon,
            results.len(),
            exclusions.len(),
            results[0].strategy
        );

        Ok(ForecastReport {
            segment: request.segment.clone(),
            horizon: request.horizon,
            results,
            exclusions,
        })
    }

    /// Scores every strategy on a segment's held-out tail.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SegmentNotFound`] for an unknown segment,
    /// [`EngineError::InsufficientHistory`] when the series is too short to
    /// split, and [`EngineError::NoModelAvailable`] when no strategy could
    /// be scored.
    pub fn evaluate(&self, segment: &Segment) -> Result<EvaluationReport, EngineError> {
        let series = self.store.get_series(segment)?;
        let needed = self.config.evaluation.required_history();
        if series.len() < needed {
            return Err(EngineError::InsufficientHistory {
                needed,
                got: series.len(),
            });
        }

        let outcomes: Vec<(Strategy, Result<HoldoutEvaluation, EngineError>)> = Strategy::all()
            .par_iter()
            .map(|&strategy| {
                (
                    strategy,
                    evaluator::evaluate_strategy(strategy, series, &self.config),
                )
            })
            .collect();

        let mut evaluations = Vec::new();
        let mut exclusions = Vec::new();
        for (strategy, outcome) in outcomes {
            match outcome {
                Ok(evaluation) => evaluations.push(evaluation),
                Err(err) => {
                    log::warn!("{segment}: {strategy} could not be evaluated: {}", err.reason());
                    exclusions.push(Exclusion {
                        strategy,
                        reason: ExclusionReason::ModelUnfit(err.reason()),
                    });
                }
            }
        }

        if evaluations.is_empty() {
            return Err(EngineError::NoModelAvailable {
                segment: segment.clone(),
                exclusions,
            });
        }

        evaluations.sort_by(|a, b| {
            mae_of(Some(a))
                .total_cmp(&mae_of(Some(b)))
                .then(a.strategy.priority().cmp(&b.strategy.priority()))
        });

        Ok(EvaluationReport {
            segment: segment.clone(),
            evaluations,
            exclusions,
        })
    }

    /// Runs many requests in parallel, returning one result per request in
    /// input order.
    pub fn forecast_batch(
        &self,
        requests: &[ForecastRequest],
        progress: &Arc<dyn ProgressCallback>,
    ) -> Vec<Result<ForecastReport, EngineError>> {
        progress.set_total(requests.len() as u64);
        progress.set_message("Forecasting segments".to_string());

        let results: Vec<Result<ForecastReport, EngineError>> = requests
            .par_iter()
            .map(|request| {
                let result = self.forecast(request);
                if let Err(e) = &result {
                    log::warn!("{}: {e}", request.segment);
                }
                progress.inc(1);
                result
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        progress.finish(format!(
            "Forecast {} segments ({failed} without a model)",
            results.len()
        ));

        results
    }

    fn run_variant(
        &self,
        strategy: Strategy,
        series: &HistoricalSeries,
        horizon: usize,
    ) -> VariantOutcome {
        let unfit = |err: EngineError| {
            log::warn!("{}: {} unavailable: {}", series.segment(), strategy.label(), err.reason());
            VariantOutcome::Unfit(Exclusion {
                strategy,
                reason: ExclusionReason::ModelUnfit(err.reason()),
            })
        };

        let started = Instant::now();
        let forecast = match models::for_strategy(strategy, &self.config)
            .fit(series)
            .and_then(|fitted| fitted.predict(horizon))
        {
            Ok(forecast) => forecast,
            Err(err) => return unfit(err),
        };

        // The held-out fit gets whatever training time the full fit left.
        let config = EngineConfig {
            sequence: self.config.sequence.with_budget_spent(started.elapsed()),
            ..self.config.clone()
        };
        let (evaluation, note) = match evaluator::evaluate_strategy(strategy, series, &config) {
            Ok(evaluation) => (Some(evaluation), None),
            Err(err) => {
                let unavailable = EngineError::EvaluationUnavailable {
                    strategy,
                    reason: err.reason(),
                };
                log::debug!("{}: {unavailable}", series.segment());
                (
                    None,
                    Some(Exclusion {
                        strategy,
                        reason: ExclusionReason::EvaluationUnavailable(unavailable.reason()),
                    }),
                )
            }
        };

        VariantOutcome::Forecast {
            forecast,
            evaluation,
            note,
        }
    }
}

fn mae_of(evaluation: Option<&HoldoutEvaluation>) -> f64 {
    evaluation.and_then(HoldoutEvaluation::mae).unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_forecast_models::Period;
    use crime_forecast_store::StoreBuilder;

    use crate::progress::null_progress;

    fn engine_with(segments: &[(Segment, u64)]) -> ForecastEngine {
        let mut builder = StoreBuilder::new();
        for (segment, len) in segments {
            for i in 0..*len {
                let period = Period::new(2019, 1).unwrap().plus(usize::try_from(i).unwrap());
                builder.record(segment.clone(), period, 50 + (i * 7) % 13 + i / 2);
            }
        }
        ForecastEngine::new(Arc::new(builder.build()), EngineConfig::default()).unwrap()
    }

    #[test]
    fn strategies_resolve_in_priority_order_without_duplicates() {
        let request = ForecastRequest {
            segment: Segment::city_wide("Delhi"),
            horizon: 6,
            strategies: vec![
                Strategy::SequenceModel,
                Strategy::TrendSeasonal,
                Strategy::SequenceModel,
            ],
        };
        assert_eq!(
            request.resolved_strategies(),
            vec![Strategy::TrendSeasonal, Strategy::SequenceModel]
        );
        assert_eq!(
            ForecastRequest::all_strategies(Segment::city_wide("Delhi"), 6).resolved_strategies(),
            Strategy::all().to_vec()
        );
    }

    #[test]
    fn horizon_checked_before_segment() {
        let engine = engine_with(&[]);
        let err = engine
            .forecast(&ForecastRequest::all_strategies(Segment::city_wide("Nowhere"), 0))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidHorizon { horizon: 0, .. }));
    }

    #[test]
    fn short_history_keeps_unscored_results() {
        // 14 months: Trend-Seasonal and the sequence model fit, but nothing
        // can be scored and the lag-based strategies are excluded.
        let segment = Segment::new("Lucknow", "Theft");
        let engine = engine_with(&[(segment.clone(), 14)]);
        let report = engine
            .forecast(&ForecastRequest::all_strategies(segment, 3))
            .unwrap();

        assert_eq!(
            report.strategies(),
            vec![Strategy::TrendSeasonal, Strategy::SequenceModel]
        );
        assert!(report.results.iter().all(|r| r.evaluation.is_none()));
        let ranks: Vec<usize> = report.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2]);

        let unfit: Vec<Strategy> = report
            .exclusions
            .iter()
            .filter(|e| matches!(e.reason, ExclusionReason::ModelUnfit(_)))
            .map(|e| e.strategy)
            .collect();
        assert_eq!(unfit, vec![Strategy::LagRegression, Strategy::GradientBoosted]);
        assert!(
            report
                .exclusions
                .iter()
                .any(|e| matches!(e.reason, ExclusionReason::EvaluationUnavailable(_)))
        );
    }

    #[test]
    fn exhausted_training_budget_excludes_only_the_sequence_model() {
        let segment = Segment::new("Indore", "Theft");
        let mut engine = engine_with(&[(segment.clone(), 40)]);
        engine.config.sequence.training_budget_ms = 0;

        let report = engine
            .forecast(&ForecastRequest::all_strategies(segment, 3))
            .unwrap();
        assert!(!report.strategies().contains(&Strategy::SequenceModel));
        let sequence = report
            .exclusions
            .iter()
            .find(|e| e.strategy == Strategy::SequenceModel)
            .unwrap();
        assert!(matches!(
            &sequence.reason,
            ExclusionReason::ModelUnfit(reason) if reason.contains("training budget")
        ));
    }

    #[test]
    fn batch_preserves_input_order() {
        let a = Segment::new("Pune", "Theft");
        let b = Segment::new("Pune", "Arson");
        let engine = engine_with(&[(a.clone(), 40), (b.clone(), 40)]);
        let requests = vec![
            ForecastRequest::all_strategies(b.clone(), 3),
            ForecastRequest::all_strategies(Segment::city_wide("Nowhere"), 3),
            ForecastRequest::all_strategies(a.clone(), 3),
        ];

        let results = engine.forecast_batch(&requests, &null_progress());
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().segment, b);
        assert!(matches!(
            results[1],
            Err(EngineError::SegmentNotFound { .. })
        ));
        assert_eq!(results[2].as_ref().unwrap().segment, a);
    }

    #[test]
    fn city_summary_includes_category_distribution() {
        let theft = Segment::new("Surat", "Theft");
        let fraud = Segment::new("Surat", "Fraud");
        let mut builder = StoreBuilder::new().with_city_aggregates(true);
        for i in 0..3 {
            let period = Period::new(2024, 1).unwrap().plus(i);
            builder.record(theft.clone(), period, 30).record(fraud.clone(), period, 10);
        }
        builder
            .assign_category(&theft, "Property Crimes")
            .assign_category(&fraud, "Economic Crimes");
        let engine = ForecastEngine::new(Arc::new(builder.build()), EngineConfig::default())
            .unwrap();

        let summary = engine.summarize(&Segment::city_wide("Surat")).unwrap();
        assert_eq!(summary.total, 120);
        let categories: Vec<(&str, u64)> = summary
            .category_distribution
            .iter()
            .map(|c| (c.category.as_str(), c.total))
            .collect();
        assert_eq!(categories, vec![("Property Crimes", 90), ("Economic Crimes", 30)]);

        let theft_summary = engine.summarize(&theft).unwrap();
        assert!(theft_summary.category_distribution.is_empty());
    }

    #[test]
    fn summary_and_insight() {
        let segment = Segment::new("Surat", "Fraud");
        let engine = engine_with(&[(segment.clone(), 30)]);
        let summary = engine.summarize(&segment).unwrap();
        assert_eq!(summary.first_period, Period::new(2019, 1).unwrap());
        assert_eq!(summary.last_period, Period::new(2021, 6).unwrap());

        let report = engine
            .forecast(&ForecastRequest::all_strategies(segment, 6))
            .unwrap();
        let insight = engine.insight(&report).unwrap().unwrap();
        assert_eq!(insight.strategy, report.results[0].strategy);
        assert_eq!(insight.from, Period::new(2021, 7).unwrap());
    }
}
