//! Calendar month periods.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single calendar month, the discrete time unit of every series.
///
/// Ordering is chronological. Serialized as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

/// Error returned when a [`Period`] cannot be built or parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    /// Month outside `1..=12`.
    #[error("invalid month {0}: expected 1-12")]
    InvalidMonth(u32),

    /// Year outside [`Period::MIN_YEAR`]`..=`[`Period::MAX_YEAR`].
    #[error("invalid year {0}: expected 1-9999")]
    YearOutOfRange(i32),

    /// Text was not in `YYYY-MM` form.
    #[error("invalid period '{0}': expected YYYY-MM")]
    Malformed(String),
}

impl Period {
    /// Earliest accepted year.
    pub const MIN_YEAR: i32 = 1;
    /// Latest accepted year. Keeps `YYYY-MM` four digits wide and leaves
    /// headroom for month arithmetic.
    pub const MAX_YEAR: i32 = 9999;

    /// Creates a period from a year and a 1-based month.
    ///
    /// # Errors
    ///
    /// * [`PeriodError::InvalidMonth`] if `month` is not in `1..=12`
    /// * [`PeriodError::YearOutOfRange`] if `year` is outside
    ///   [`Self::MIN_YEAR`]`..=`[`Self::MAX_YEAR`]
    pub const fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if month == 0 || month > 12 {
            return Err(PeriodError::InvalidMonth(month));
        }
        if year < Self::MIN_YEAR || year > Self::MAX_YEAR {
            return Err(PeriodError::YearOutOfRange(year));
        }
        Ok(Self { year, month })
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Month of year, `1..=12`.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The following month. December rolls over into January.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The period `steps` months after this one.
    #[must_use]
    pub const fn plus(self, steps: usize) -> Self {
        Self::from_ordinal(self.ordinal() + steps as i64)
    }

    /// Signed number of months from `self` to `other`.
    #[must_use]
    pub const fn months_until(self, other: Self) -> i64 {
        other.ordinal() - self.ordinal()
    }

    /// Month count since year 0, used for arithmetic.
    const fn ordinal(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    const fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }
}

impl TryFrom<NaiveDate> for Period {
    type Error = PeriodError;

    fn try_from(date: NaiveDate) -> Result<Self, Self::Error> {
        Self::new(date.year(), date.month())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PeriodError::Malformed(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(malformed)?;
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        Self::new(year, month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
