#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory time-series store for monthly crime counts.
//!
//! The store maps each [`Segment`] to its [`HistoricalSeries`]. It is built
//! once through [`StoreBuilder`] (the ingestion seam, fed by the
//! [`dataset`] CSV loader or by tests) and is read-only afterwards, so it
//! can be shared behind an `Arc` by concurrent forecast requests without
//! locking.
//!
//! Segments whose months are not contiguous are rejected at build time
//! rather than interpolated; asking for one later yields
//! [`StoreError::SegmentNotFound`]. A city-wide total is only derived when
//! every crime type of the city covers every month of the total.

pub mod dataset;

use std::collections::{BTreeMap, BTreeSet};

use crime_forecast_models::{
    ALL_CATEGORIES, CategoryTotal, HistoricalSeries, Observation, Period, Segment, SeriesError,
};
use thiserror::Error;

/// Errors that can occur while building or querying the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The segment has no observations in the store.
    #[error("Segment not found: {segment}")]
    SegmentNotFound {
        /// Requested segment.
        segment: Segment,
    },

    /// A dataset row could not be interpreted.
    #[error("Invalid record on line {line}: {message}")]
    InvalidRecord {
        /// 1-based line number in the source file.
        line: u64,
        /// Description of what went wrong.
        message: String,
    },

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A segment dropped while building the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSegment {
    /// The dropped segment.
    pub segment: Segment,
    /// Why its observations did not form a valid series.
    pub reason: SeriesError,
}

/// Read-only collection of historical series keyed by segment.
#[derive(Debug, Default)]
pub struct TimeSeriesStore {
    series: BTreeMap<Segment, HistoricalSeries>,
    rejected: Vec<RejectedSegment>,
    distributions: BTreeMap<String, Vec<CategoryTotal>>,
}

impl TimeSeriesStore {
    /// Returns the historical series for `segment`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SegmentNotFound`] if the segment has no
    /// observations.
    pub fn get_series(&self, segment: &Segment) -> Result<&HistoricalSeries, StoreError> {
        self.series
            .get(segment)
            .ok_or_else(|| StoreError::SegmentNotFound {
                segment: segment.clone(),
            })
    }

    /// Every segment with a valid series.
    #[must_use]
    pub fn segments(&self) -> BTreeSet<Segment> {
        self.series.keys().cloned().collect()
    }

    /// Distinct city names, sorted.
    #[must_use]
    pub fn cities(&self) -> Vec<String> {
        let cities: BTreeSet<&str> = self.series.keys().map(|s| s.city.as_str()).collect();
        cities.into_iter().map(str::to_string).collect()
    }

    /// Categories available for `city`, with `"all"` first when present.
    #[must_use]
    pub fn categories_for(&self, city: &str) -> Vec<String> {
        let mut categories: Vec<String> = self
            .series
            .keys()
            .filter(|s| s.city == city)
            .map(|s| s.category.clone())
            .collect();
        categories.sort_by_key(|c| (c != ALL_CATEGORIES, c.clone()));
        categories
    }

    /// Number of stored segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the store holds no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Segments dropped while building.
    #[must_use]
    pub fn rejected(&self) -> &[RejectedSegment] {
        &self.rejected
    }

    /// Incidents of `city` per crime category, largest first.
    ///
    /// Counts every recorded row whose crime type was assigned a category,
    /// including rows of segments rejected for gaps. Empty when the city is
    /// unknown or none of its crime types has a category.
    #[must_use]
    pub fn category_distribution(&self, city: &str) -> &[CategoryTotal] {
        self.distributions.get(city).map_or(&[], Vec::as_slice)
    }
}

/// Accumulates observations and validates them into a [`TimeSeriesStore`].
#[derive(Debug, Default)]
pub struct StoreBuilder {
    counts: BTreeMap<Segment, BTreeMap<Period, u64>>,
    groups: BTreeMap<Segment, String>,
    city_aggregates: bool,
}

impl StoreBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also derive a `(city, "all")` segment summing every category.
    #[must_use]
    pub const fn with_city_aggregates(mut self, enabled: bool) -> Self {
        self.city_aggregates = enabled;
        self
    }

    /// Adds `count` incidents to `segment` in `period`.
    ///
    /// Repeated calls for the same segment and period are summed.
    pub fn record(&mut self, segment: Segment, period: Period, count: u64) -> &mut Self {
        *self
            .counts
            .entry(segment)
            .or_default()
            .entry(period)
            .or_default() += count;
        self
    }

    /// Files `segment`'s crime type under `category` for
    /// [`TimeSeriesStore::category_distribution`].
    ///
    /// The last assignment for a segment wins.
    pub fn assign_category(
        &mut self,
        segment: &Segment,
        category: impl Into<String>,
    ) -> &mut Self {
        self.groups.insert(segment.clone(), category.into());
        self
    }

    /// Validates every segment and freezes the store.
    ///
    /// Segments with missing months are logged, skipped, and reported via
    /// [`TimeSeriesStore::rejected`]. With city aggregates enabled, a city
    /// total is rejected the same way when any crime type lacks a month
    /// the total covers.
    #[must_use]
    pub fn build(self) -> TimeSeriesStore {
        let totals = if self.city_aggregates {
            city_totals(&self.counts)
        } else {
            Vec::new()
        };

        let mut store = TimeSeriesStore {
            distributions: distributions(&self.counts, &self.groups),
            ..TimeSeriesStore::default()
        };

        for (segment, periods) in self.counts {
            let observations = periods
                .into_iter()
                .map(|(period, count)| Observation { period, count })
                .collect();
            let series = HistoricalSeries::new(segment.clone(), observations);
            store.admit(segment, series);
        }

        for (segment, observations) in totals {
            let series =
                observations.and_then(|obs| HistoricalSeries::new(segment.clone(), obs));
            store.admit(segment, series);
        }

        log::debug!(
            "Built time-series store with {} segments ({} rejected)",
            store.series.len(),
            store.rejected.len()
        );

        store
    }
}

impl TimeSeriesStore {
    fn admit(&mut self, segment: Segment, series: Result<HistoricalSeries, SeriesError>) {
        match series {
            Ok(series) => {
                self.series.insert(segment, series);
            }
            Err(reason) => {
                log::warn!("Rejecting segment {segment}: {reason}");
                self.rejected.push(RejectedSegment { segment, reason });
            }
        }
    }
}

type Counts = BTreeMap<Segment, BTreeMap<Period, u64>>;

/// Sums each city's crime types into its `all` segment.
///
/// Cities that already have an explicit `all` segment are left alone. The
/// total spans the city's first to last observed month and fails with
/// [`SeriesError::IncompleteTotal`] at the first month some crime type has
/// no count for.
fn city_totals(counts: &Counts) -> Vec<(Segment, Result<Vec<Observation>, SeriesError>)> {
    let mut by_city: BTreeMap<&str, Vec<(&Segment, &BTreeMap<Period, u64>)>> = BTreeMap::new();
    for (segment, periods) in counts.iter().filter(|(s, _)| !s.is_city_wide()) {
        by_city
            .entry(segment.city.as_str())
            .or_default()
            .push((segment, periods));
    }

    by_city
        .into_iter()
        .map(|(city, components)| (Segment::city_wide(city), components))
        .filter(|(segment, _)| !counts.contains_key(segment))
        .map(|(segment, components)| {
            let total = sum_components(&segment, &components);
            (segment, total)
        })
        .collect()
}

fn sum_components(
    segment: &Segment,
    components: &[(&Segment, &BTreeMap<Period, u64>)],
) -> Result<Vec<Observation>, SeriesError> {
    let first = components
        .iter()
        .filter_map(|(_, periods)| periods.keys().next())
        .min();
    let last = components
        .iter()
        .filter_map(|(_, periods)| periods.keys().next_back())
        .max();
    let (Some(&first), Some(&last)) = (first, last) else {
        return Err(SeriesError::Empty {
            segment: segment.clone(),
        });
    };

    let span = usize::try_from(first.months_until(last)).unwrap_or_default();
    (0..=span)
        .map(|step| {
            let period = first.plus(step);
            let count = components.iter().try_fold(0_u64, |sum, (component, periods)| {
                periods
                    .get(&period)
                    .map(|count| sum + count)
                    .ok_or_else(|| SeriesError::IncompleteTotal {
                        segment: segment.clone(),
                        component: (*component).clone(),
                        missing: period,
                    })
            })?;
            Ok(Observation { period, count })
        })
        .collect()
}

/// Per-city category totals from raw counts.
fn distributions(
    counts: &Counts,
    groups: &BTreeMap<Segment, String>,
) -> BTreeMap<String, Vec<CategoryTotal>> {
    let mut totals: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();
    for (segment, category) in groups {
        let Some(periods) = counts.get(segment) else {
            continue;
        };
        *totals
            .entry(segment.city.as_str())
            .or_default()
            .entry(category.as_str())
            .or_default() += periods.values().sum::<u64>();
    }

    totals
        .into_iter()
        .map(|(city, categories)| {
            let categories = categories
                .into_iter()
                .map(|(category, total)| (category.to_string(), total));
            (city.to_string(), CategoryTotal::distribution(categories))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    #[test]
    fn returns_recorded_series() {
        let mut builder = StoreBuilder::new();
        builder
            .record(Segment::new("Delhi", "Theft"), period(2024, 1), 10)
            .record(Segment::new("Delhi", "Theft"), period(2024, 2), 12);
        let store = builder.build();

        let series = store.get_series(&Segment::new("Delhi", "Theft")).unwrap();
        assert_eq!(series.values(), vec![10.0, 12.0]);
    }

    #[test]
    fn unknown_segment_is_not_found() {
        let store = StoreBuilder::new().build();
        let err = store
            .get_series(&Segment::city_wide("NewCity"))
            .unwrap_err();
        assert!(matches!(err, StoreError::SegmentNotFound { .. }));
    }

    #[test]
    fn segment_lookup_is_case_sensitive() {
        let mut builder = StoreBuilder::new();
        builder.record(Segment::city_wide("Delhi"), period(2024, 1), 1);
        let store = builder.build();
        assert!(store.get_series(&Segment::city_wide("delhi")).is_err());
    }

    #[test]
    fn sums_duplicate_rows_and_builds_aggregates() {
        let mut builder = StoreBuilder::new().with_city_aggregates(true);
        builder
            .record(Segment::new("Pune", "Theft"), period(2024, 1), 3)
            .record(Segment::new("Pune", "Theft"), period(2024, 1), 2)
            .record(Segment::new("Pune", "Theft"), period(2024, 2), 4)
            .record(Segment::new("Pune", "Murder"), period(2024, 1), 1)
            .record(Segment::new("Pune", "Murder"), period(2024, 2), 0);
        let store = builder.build();

        let all = store.get_series(&Segment::city_wide("Pune")).unwrap();
        assert_eq!(all.values(), vec![6.0, 4.0]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.categories_for("Pune"), vec!["all", "Murder", "Theft"]);
        assert_eq!(store.cities(), vec!["Pune"]);
    }

    #[test]
    fn city_total_rejected_when_a_category_has_gaps() {
        let mut builder = StoreBuilder::new().with_city_aggregates(true);
        builder
            .record(Segment::new("Patna", "Arson"), period(2024, 1), 5)
            .record(Segment::new("Patna", "Arson"), period(2024, 3), 5)
            .record(Segment::new("Patna", "Riots"), period(2024, 1), 10)
            .record(Segment::new("Patna", "Riots"), period(2024, 2), 5)
            .record(Segment::new("Patna", "Riots"), period(2024, 3), 10);
        let store = builder.build();

        assert!(matches!(
            store.get_series(&Segment::city_wide("Patna")),
            Err(StoreError::SegmentNotFound { .. })
        ));
        let rejected: Vec<&Segment> = store.rejected().iter().map(|r| &r.segment).collect();
        assert_eq!(
            rejected,
            vec![&Segment::new("Patna", "Arson"), &Segment::city_wide("Patna")]
        );
        assert_eq!(
            store.rejected()[1].reason,
            SeriesError::IncompleteTotal {
                segment: Segment::city_wide("Patna"),
                component: Segment::new("Patna", "Arson"),
                missing: period(2024, 2),
            }
        );
        assert!(store.get_series(&Segment::new("Patna", "Riots")).is_ok());
    }

    #[test]
    fn city_total_rejected_when_categories_cover_different_months() {
        let mut builder = StoreBuilder::new().with_city_aggregates(true);
        builder
            .record(Segment::new("Agra", "Theft"), period(2024, 1), 3)
            .record(Segment::new("Agra", "Theft"), period(2024, 2), 3)
            .record(Segment::new("Agra", "Fraud"), period(2024, 2), 1)
            .record(Segment::new("Agra", "Fraud"), period(2024, 3), 1);
        let store = builder.build();

        // Both crime types are contiguous on their own.
        assert!(store.get_series(&Segment::new("Agra", "Theft")).is_ok());
        assert!(store.get_series(&Segment::new("Agra", "Fraud")).is_ok());
        assert!(store.get_series(&Segment::city_wide("Agra")).is_err());
        assert!(matches!(
            &store.rejected()[0].reason,
            SeriesError::IncompleteTotal { missing, .. } if *missing == period(2024, 1)
        ));
    }

    #[test]
    fn explicit_city_total_is_kept() {
        let mut builder = StoreBuilder::new().with_city_aggregates(true);
        builder
            .record(Segment::city_wide("Agra"), period(2024, 1), 99)
            .record(Segment::new("Agra", "Theft"), period(2024, 1), 3);
        let store = builder.build();

        let all = store.get_series(&Segment::city_wide("Agra")).unwrap();
        assert_eq!(all.values(), vec![99.0]);
        assert!(store.rejected().is_empty());
    }

    #[test]
    fn category_distribution_sums_every_row() {
        let arson = Segment::new("Patna", "Arson");
        let riots = Segment::new("Patna", "Riots");
        let theft = Segment::new("Patna", "Theft");
        let mut builder = StoreBuilder::new();
        builder
            .record(arson.clone(), period(2024, 1), 5)
            .record(arson.clone(), period(2024, 3), 5)
            .record(riots.clone(), period(2024, 1), 10)
            .record(theft.clone(), period(2024, 1), 30)
            .record(Segment::new("Patna", "Unfiled"), period(2024, 1), 7)
            .assign_category(&arson, "Property Crimes")
            .assign_category(&riots, "Violent Crimes")
            .assign_category(&theft, "Property Crimes");
        let store = builder.build();

        let distribution = store.category_distribution("Patna");
        assert_eq!(distribution.len(), 2);
        assert_eq!(distribution[0].category, "Property Crimes");
        assert_eq!(distribution[0].total, 40);
        assert_eq!(distribution[1].category, "Violent Crimes");
        assert_eq!(distribution[1].total, 10);
        assert!((distribution[0].share - 80.0).abs() < 1e-9);

        assert!(store.category_distribution("Agra").is_empty());
    }

    #[test]
    fn rejects_segments_with_gaps() {
        let mut builder = StoreBuilder::new();
        builder
            .record(Segment::new("Patna", "Arson"), period(2024, 1), 1)
            .record(Segment::new("Patna", "Arson"), period(2024, 3), 1)
            .record(Segment::new("Patna", "Riots"), period(2024, 1), 1);
        let store = builder.build();

        assert_eq!(store.rejected().len(), 1);
        assert_eq!(store.rejected()[0].segment, Segment::new("Patna", "Arson"));
        assert!(matches!(
            store.get_series(&Segment::new("Patna", "Arson")),
            Err(StoreError::SegmentNotFound { .. })
        ));
        assert!(store.get_series(&Segment::new("Patna", "Riots")).is_ok());
    }
}
