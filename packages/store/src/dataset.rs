//! CSV loader for tabulated monthly crime counts.
//!
//! Reads the dataset produced by the upstream generator: one row per
//! `(city, crime type, month)` with an `Incidents_Reported` column. An
//! optional `Crime_Category` column files each crime type under a broader
//! category for the per-city distribution. Other columns (state,
//! population, charge-sheet counts, ...) are ignored. The month comes from
//! the `Year`/`Month` columns, or from an ISO `Date` column when those are
//! absent.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use crime_forecast_models::{Period, Segment};
use serde::Deserialize;

use crate::{StoreBuilder, StoreError, TimeSeriesStore};

/// Where the front ends look for the dataset unless told otherwise.
pub const DEFAULT_DATASET_PATH: &str = "data/raw/india_crime_data_2019_2024.csv";

/// One raw dataset row.
#[derive(Debug, Deserialize)]
struct DatasetRow {
    #[serde(rename = "Year", default)]
    year: Option<i32>,
    #[serde(rename = "Month", default)]
    month: Option<u32>,
    #[serde(rename = "Date", default)]
    date: Option<String>,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "Crime_Type")]
    crime_type: String,
    #[serde(rename = "Crime_Category", default)]
    crime_category: Option<String>,
    #[serde(rename = "Incidents_Reported")]
    incidents: i64,
}

impl DatasetRow {
    fn period(&self) -> Result<Period, String> {
        if let (Some(year), Some(month)) = (self.year, self.month) {
            return Period::new(year, month).map_err(|e| e.to_string());
        }

        let date = self
            .date
            .as_deref()
            .ok_or_else(|| "row has neither Year/Month nor Date".to_string())?;

        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|e| format!("Invalid date '{date}': {e}. Expected format: YYYY-MM-DD"))?;
        Period::try_from(date).map_err(|e| e.to_string())
    }
}

/// Loads a dataset file into a store, deriving city-wide aggregates.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be opened or a row is
/// malformed.
pub fn load_path(path: &Path) -> Result<TimeSeriesStore, StoreError> {
    log::info!("Loading crime dataset from {}", path.display());
    let file = File::open(path)?;
    load_reader(file)
}

/// Loads a dataset from any reader, deriving city-wide aggregates.
///
/// # Errors
///
/// Returns [`StoreError`] if the CSV is malformed, a row has an invalid
/// year or month, or a count is negative.
pub fn load_reader<R: Read>(reader: R) -> Result<TimeSeriesStore, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut builder = StoreBuilder::new().with_city_aggregates(true);
    let mut rows = 0_u64;

    for (idx, result) in reader.deserialize::<DatasetRow>().enumerate() {
        let row = result?;
        let line = idx as u64 + 2;

        let period = row
            .period()
            .map_err(|message| StoreError::InvalidRecord { line, message })?;

        let count = u64::try_from(row.incidents).map_err(|_| StoreError::InvalidRecord {
            line,
            message: format!("negative incident count {}", row.incidents),
        })?;

        let segment = Segment::new(row.city, row.crime_type);
        if let Some(category) = row.crime_category.filter(|c| !c.is_empty()) {
            builder.assign_category(&segment, category);
        }
        builder.record(segment, period, count);
        rows += 1;
    }

    let store = builder.build();
    log::info!(
        "Loaded {rows} rows into {} segments across {} cities",
        store.len(),
        store.cities().len()
    );

    Ok(store)
}
