//! Segments and their historical observation series.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Period;

/// Category name used for the city-wide aggregate segment.
pub const ALL_CATEGORIES: &str = "all";

/// A `(city, crime category)` pair, the unit of training and forecasting.
///
/// Identifiers are case-sensitive. A category of [`ALL_CATEGORIES`] denotes
/// the aggregate over every category of the city.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// City name, e.g. `"Delhi"`.
    pub city: String,
    /// Crime category, or `"all"`.
    pub category: String,
}

impl Segment {
    /// Creates a segment for one city and category.
    #[must_use]
    pub fn new(city: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            category: category.into(),
        }
    }

    /// Creates the city-wide aggregate segment.
    #[must_use]
    pub fn city_wide(city: impl Into<String>) -> Self {
        Self::new(city, ALL_CATEGORIES)
    }

    /// Whether this is a city-wide aggregate.
    #[must_use]
    pub fn is_city_wide(&self) -> bool {
        self.category == ALL_CATEGORIES
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.city, self.category)
    }
}

/// One month of observed incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// The month observed.
    pub period: Period,
    /// Incidents reported in that month.
    pub count: u64,
}

/// Reasons a [`HistoricalSeries`] cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    /// No observations were supplied.
    #[error("series for {segment} is empty")]
    Empty {
        /// Offending segment.
        segment: Segment,
    },

    /// Two observations share a period, or periods go backwards.
    #[error("series for {segment} is not strictly increasing at {period}")]
    OutOfOrder {
        /// Offending segment.
        segment: Segment,
        /// First period that broke the ordering.
        period: Period,
    },

    /// A month is missing between two observations.
    #[error("series for {segment} is missing {missing} (next observed {found})")]
    Gap {
        /// Offending segment.
        segment: Segment,
        /// First missing period.
        missing: Period,
        /// Period observed instead.
        found: Period,
    },

    /// A derived total cannot be formed because one of its component
    /// segments has no count for a month the total covers.
    #[error("total for {segment} is missing {missing} of {component}")]
    IncompleteTotal {
        /// Total that was not formed.
        segment: Segment,
        /// Component segment lacking the month.
        component: Segment,
        /// First month the component lacks.
        missing: Period,
    },
}

/// Contiguous, chronologically ordered monthly counts for one segment.
///
/// Construction guarantees the series is non-empty and has exactly one
/// observation per month between its first and last period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalSeries {
    segment: Segment,
    observations: Vec<Observation>,
}

impl HistoricalSeries {
    /// Validates and wraps a segment's observations.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError`] if the observations are empty, unordered,
    /// duplicated, or skip a month.
    pub fn new(segment: Segment, observations: Vec<Observation>) -> Result<Self, SeriesError> {
        if observations.is_empty() {
            return Err(SeriesError::Empty { segment });
        }

        for pair in observations.windows(2) {
            let (prev, next) = (pair[0].period, pair[1].period);
            if next <= prev {
                return Err(SeriesError::OutOfOrder {
                    segment,
                    period: next,
                });
            }
            if next != prev.next() {
                return Err(SeriesError::Gap {
                    segment,
                    missing: prev.next(),
                    found: next,
                });
            }
        }

        Ok(Self {
            segment,
            observations,
        })
    }

    /// Builds a series from consecutive counts starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::Empty`] if `counts` is empty.
    pub fn from_counts(
        segment: Segment,
        start: Period,
        counts: impl IntoIterator<Item = u64>,
    ) -> Result<Self, SeriesError> {
        let observations = counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| Observation {
                period: start.plus(i),
                count,
            })
            .collect();
        Self::new(segment, observations)
    }

    /// The segment this series belongs to.
    #[must_use]
    pub const fn segment(&self) -> &Segment {
        &self.segment
    }

    /// All observations, oldest first.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of observed months.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always `false`; kept for clippy's `len_without_is_empty`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Earliest observed month.
    #[must_use]
    pub fn first_period(&self) -> Period {
        self.observations[0].period
    }

    /// Latest observed month.
    #[must_use]
    pub fn last_period(&self) -> Period {
        self.observations[self.observations.len() - 1].period
    }

    /// Latest observation.
    #[must_use]
    pub fn latest(&self) -> Observation {
        self.observations[self.observations.len() - 1]
    }

    /// Counts as floating point values for numeric work.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.count as f64).collect()
    }

    /// Sum of every observed count.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.observations.iter().map(|o| o.count).sum()
    }

    /// Mean monthly count.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        self.total() as f64 / self.len() as f64
    }

    /// The first `n` observations as their own series.
    ///
    /// Returns `None` when `n` is zero or exceeds the series length.
    #[must_use]
    pub fn head(&self, n: usize) -> Option<Self> {
        (n > 0 && n <= self.len()).then(|| Self {
            segment: self.segment.clone(),
            observations: self.observations[..n].to_vec(),
        })
    }

    /// The last `n` observations as their own series.
    ///
    /// Returns `None` when `n` is zero or exceeds the series length.
    #[must_use]
    pub fn tail(&self, n: usize) -> Option<Self> {
        (n > 0 && n <= self.len()).then(|| Self {
            segment: self.segment.clone(),
            observations: self.observations[self.len() - n..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    #[test]
    fn builds_contiguous_series() {
        let series =
            HistoricalSeries::from_counts(Segment::city_wide("Delhi"), period(2024, 11), [4, 5, 6])
                .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.last_period(), period(2025, 1));
        assert_eq!(series.total(), 15);
        assert!((series.mean() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_gap() {
        let segment = Segment::new("Pune", "Theft");
        let err = HistoricalSeries::new(
            segment.clone(),
            vec![
                Observation {
                    period: period(2020, 1),
                    count: 1,
                },
                Observation {
                    period: period(2020, 3),
                    count: 1,
                },
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SeriesError::Gap {
                segment,
                missing: period(2020, 2),
                found: period(2020, 3),
            }
        );
    }

    #[test]
    fn rejects_duplicates_and_empty() {
        let segment = Segment::new("Pune", "Theft");
        let obs = Observation {
            period: period(2020, 1),
            count: 1,
        };
        assert!(matches!(
            HistoricalSeries::new(segment.clone(), vec![obs, obs]),
            Err(SeriesError::OutOfOrder { .. })
        ));
        assert!(matches!(
            HistoricalSeries::new(segment, Vec::new()),
            Err(SeriesError::Empty { .. })
        ));
    }

    #[test]
    fn head_and_tail_split() {
        let series =
            HistoricalSeries::from_counts(Segment::city_wide("Delhi"), period(2019, 1), 1..=10)
                .unwrap();
        let head = series.head(7).unwrap();
        let tail = series.tail(3).unwrap();
        assert_eq!(head.last_period().next(), tail.first_period());
        assert_eq!(tail.values(), vec![8.0, 9.0, 10.0]);
        assert!(series.head(0).is_none());
        assert!(series.tail(11).is_none());
    }

    #[test]
    fn segment_display_and_city_wide() {
        let segment = Segment::city_wide("Mumbai");
        assert!(segment.is_city_wide());
        assert_eq!(segment.to_string(), "Mumbai/all");
        assert!(!Segment::new("Mumbai", "All").is_city_wide());
    }
}
