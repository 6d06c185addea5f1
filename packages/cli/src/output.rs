//! Plain-text rendering of engine results.
//!
//! Forecast values are rounded to whole incidents here and nowhere else.

use std::fmt::Write as _;

use crime_forecast_engine::{EngineError, ForecastRequest};
use crime_forecast_models::{
    EvaluationReport, ForecastInsight, ForecastReport, HoldoutEvaluation, Segment, SeriesSummary,
};

pub fn segments(segments: &[Segment]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<20} CATEGORY", "CITY");
    let _ = writeln!(out, "{}", "-".repeat(50));
    for segment in segments {
        let _ = writeln!(out, "{:<20} {}", segment.city, segment.category);
    }
    let _ = writeln!(out, "\n{} segments", segments.len());
    out
}

pub fn summary(summary: &SeriesSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({} to {})",
        summary.segment, summary.first_period, summary.last_period
    );
    let _ = writeln!(out, "  Total incidents:  {}", summary.total);
    let _ = writeln!(out, "  Monthly average:  {:.1}", summary.monthly_average);
    let _ = writeln!(
        out,
        "  Latest month:     {} ({})",
        summary.latest.count, summary.latest.period
    );
    let _ = writeln!(out, "  Yearly totals:");
    for year in &summary.yearly_totals {
        let _ = writeln!(out, "    {}  {}", year.year, year.total);
    }
    if !summary.category_distribution.is_empty() {
        let _ = writeln!(out, "  Crime categories:");
        for category in &summary.category_distribution {
            let _ = writeln!(
                out,
                "    {:<24} {:>8}  {:>5.1}%",
                category.category, category.total, category.share
            );
        }
    }
    out
}

fn score_line(evaluation: Option<&HoldoutEvaluation>) -> String {
    let Some(evaluation) = evaluation else {
        return "not scored".to_string();
    };
    let mae = evaluation
        .mae()
        .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    let mape = evaluation
        .mape()
        .map_or_else(|| "-".to_string(), |v| format!("{v:.1}%"));
    format!("MAE {mae}, MAPE {mape}")
}

pub fn forecast(report: &ForecastReport, insight: Option<&ForecastInsight>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Forecast for {} ({} months)\n",
        report.segment, report.horizon
    );

    for ranked in &report.results {
        let _ = writeln!(
            out,
            "#{} {} [{}]",
            ranked.rank,
            ranked.strategy.label(),
            score_line(ranked.evaluation.as_ref())
        );
        for point in &ranked.forecast.points {
            let r = point.rounded();
            let _ = writeln!(
                out,
                "    {}  {:>8}  ({} - {})",
                r.period, r.point, r.lower, r.upper
            );
        }
        out.push('\n');
    }

    if let Some(insight) = insight {
        let _ = write!(
            out,
            "Best model predicts an average of {:.0} incidents per month, {} from {} to {}",
            insight.predicted_average, insight.trend, insight.from, insight.to
        );
        if let Some(change) = insight.change_from_latest_pct {
            let _ = write!(out, " ({change:+.1}% vs latest month)");
        }
        out.push('\n');
    }

    if !report.exclusions.is_empty() {
        let _ = writeln!(out, "Notes:");
        for exclusion in &report.exclusions {
            let _ = writeln!(out, "  - {exclusion}");
        }
    }

    out
}

pub fn evaluation(report: &EvaluationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Held-out evaluation for {}\n", report.segment);
    let _ = writeln!(out, "{:<30} {:>10} {:>10}", "STRATEGY", "MAE", "MAPE");
    for evaluation in &report.evaluations {
        let _ = writeln!(
            out,
            "{:<30} {:>10} {:>10}",
            evaluation.strategy.label(),
            evaluation
                .mae()
                .map_or_else(|| "-".to_string(), |v| format!("{v:.2}")),
            evaluation
                .mape()
                .map_or_else(|| "-".to_string(), |v| format!("{v:.1}%")),
        );
    }
    if let Some(first) = report.evaluations.first() {
        let _ = writeln!(
            out,
            "\nTrained on {} months, scored on the last {}",
            first.training_len, first.holdout_len
        );
    }
    for exclusion in &report.exclusions {
        let _ = writeln!(out, "  - {exclusion}");
    }
    out
}

pub fn batch(
    requests: &[ForecastRequest],
    results: &[Result<ForecastReport, EngineError>],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<32} {:<28} NEXT MONTH", "SEGMENT", "BEST MODEL");
    let _ = writeln!(out, "{}", "-".repeat(75));
    for (request, result) in requests.iter().zip(results) {
        match result {
            Ok(report) => {
                if let Some(best) = report.best() {
                    let next = best
                        .forecast
                        .points
                        .first()
                        .map_or_else(String::new, |p| p.rounded().point.to_string());
                    let _ = writeln!(
                        out,
                        "{:<32} {:<28} {next}",
                        request.segment.to_string(),
                        best.strategy.label()
                    );
                }
            }
            Err(e) => {
                let _ = writeln!(out, "{:<32} error: {e}", request.segment.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_forecast_models::{
        CategoryTotal, Exclusion, ExclusionReason, Forecast, ForecastPoint, HistoricalSeries,
        Period, RankedForecast, Strategy, TrendDirection,
    };

    fn report() -> ForecastReport {
        let period = Period::new(2025, 1).unwrap();
        ForecastReport {
            segment: Segment::city_wide("Delhi"),
            horizon: 1,
            results: vec![RankedForecast {
                rank: 1,
                strategy: Strategy::TrendSeasonal,
                forecast: Forecast {
                    strategy: Strategy::TrendSeasonal,
                    points: vec![ForecastPoint {
                        period,
                        point: 101.6,
                        lower: 90.2,
                        upper: 113.0,
                    }],
                },
                evaluation: None,
            }],
            exclusions: vec![Exclusion {
                strategy: Strategy::SequenceModel,
                reason: ExclusionReason::ModelUnfit("training budget exceeded".into()),
            }],
        }
    }

    #[test]
    fn city_summary_lists_crime_categories() {
        let series = HistoricalSeries::from_counts(
            Segment::city_wide("Delhi"),
            Period::new(2024, 11).unwrap(),
            [60, 40],
        )
        .unwrap();
        let mut city = SeriesSummary::from_series(&series);
        assert!(!summary(&city).contains("Crime categories"));

        city.category_distribution = CategoryTotal::distribution([
            ("Property Crimes".to_string(), 75),
            ("Violent Crimes".to_string(), 25),
        ]);
        let text = summary(&city);
        assert!(text.contains("Yearly totals:\n    2024  100"));
        assert!(text.contains("Crime categories:"));
        assert!(text.contains("Property Crimes                75   75.0%"));
        assert!(text.contains("Violent Crimes                 25   25.0%"));
    }

    #[test]
    fn forecast_rounds_values_and_lists_notes() {
        let text = forecast(&report(), None);
        assert!(text.contains("#1 Trend-Seasonal [not scored]"));
        assert!(text.contains("2025-01       102  (90 - 113)"));
        assert!(text.contains("Sequence Model unavailable: training budget exceeded"));
    }

    #[test]
    fn forecast_includes_insight() {
        let insight = ForecastInsight {
            strategy: Strategy::TrendSeasonal,
            predicted_average: 101.6,
            trend: TrendDirection::Flat,
            change_from_latest_pct: Some(-2.5),
            from: Period::new(2025, 1).unwrap(),
            to: Period::new(2025, 1).unwrap(),
        };
        let text = forecast(&report(), Some(&insight));
        assert!(text.contains("average of 102 incidents per month, flat"));
        assert!(text.contains("(-2.5% vs latest month)"));
    }

    #[test]
    fn batch_reports_errors_inline() {
        let requests = vec![
            ForecastRequest::all_strategies(Segment::city_wide("Delhi"), 1),
            ForecastRequest::all_strategies(Segment::city_wide("Nowhere"), 1),
        ];
        let results = vec![
            Ok(report()),
            Err(EngineError::SegmentNotFound {
                segment: Segment::city_wide("Nowhere"),
            }),
        ];
        let text = batch(&requests, &results);
        assert!(text.contains("Delhi/all"));
        assert!(text.contains("Trend-Seasonal"));
        assert!(text.contains("error: Segment not found: Nowhere/all"));
    }
}
