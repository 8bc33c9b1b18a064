//! Merging freshly fetched observations into the stored set.

use crate::frames::error::FrameError;
use crate::types::observation::{observation_schema, COL_CITY_ID, COL_DATE, DATE_DTYPE};
use crate::types::variable::HourlyVariable;
use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use polars::prelude::*;

/// Timestamp layouts accepted in textual `date` columns, tried in order.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Reads one textual timestamp as epoch milliseconds. A bare date means midnight.
fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
        })
        .map(|date| date.and_utc().timestamp_millis())
}

/// Reads a textual day/night flag. Unknown spellings become null.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" => Some(true),
        "false" | "f" | "no" => Some(false),
        other => other.parse::<f64>().ok().filter(|v| !v.is_nan()).map(|v| v != 0.0),
    }
}

fn flag_column(column: &Column) -> Result<Column, FrameError> {
    if column.dtype() == &DataType::String {
        let flags: Vec<Option<bool>> = column
            .str()?
            .into_iter()
            .map(|raw| raw.and_then(parse_flag))
            .collect();
        Ok(Column::new(column.name().clone(), flags))
    } else {
        // Numeric flags go through Float64 so that every integer width reads the same way.
        let numeric = column.cast(&DataType::Float64)?;
        let flags: Vec<Option<bool>> = numeric
            .f64()?
            .into_iter()
            .map(|value| value.filter(|v| !v.is_nan()).map(|v| v != 0.0))
            .collect();
        Ok(Column::new(column.name().clone(), flags))
    }
}

/// Parses a textual `date` column value by value, so one malformed entry only
/// nulls its own row.
fn date_column(column: &Column) -> Result<Column, FrameError> {
    if column.dtype() != &DataType::String {
        return Ok(column.cast(&DATE_DTYPE)?);
    }
    let text = column.str()?;
    let millis: Vec<Option<i64>> = text
        .into_iter()
        .map(|raw| raw.and_then(parse_timestamp))
        .collect();
    let unparsed = millis.iter().filter(|m| m.is_none()).count() - text.null_count();
    if unparsed > 0 {
        warn!("{} '{}' values are not timestamps, setting them to null", unparsed, column.name());
    }
    Ok(Series::new(column.name().clone(), millis)
        .cast(&DATE_DTYPE)?
        .into())
}

/// Coerces a frame to the observation schema.
///
/// Columns are cast non-strictly, so unparseable values become null instead of
/// failing; absent columns are added as nulls; extra columns are dropped and the
/// column order is the declared one.
pub fn conform(df: &DataFrame) -> Result<DataFrame, FrameError> {
    let height = df.height();
    let is_day = HourlyVariable::IsDay.column_name();
    let mut columns = Vec::with_capacity(observation_schema().len());

    for (name, dtype) in observation_schema().iter() {
        let column = match df.column(name.as_str()) {
            Ok(existing) if name.as_str() == is_day => flag_column(existing)?,
            Ok(existing) if name.as_str() == COL_DATE => date_column(existing)?,
            Ok(existing) => existing.cast(dtype)?,
            Err(_) => {
                warn!("Column '{}' missing, filling with nulls", name);
                Column::from(Series::full_null(name.clone(), height, dtype))
            }
        };
        columns.push(column);
    }
    Ok(DataFrame::new(columns)?)
}

/// Merges stored and freshly fetched observations.
///
/// The frames are concatenated stored-first, so when both hold the same
/// `(city_id, date)` the fetched row is kept. The result holds one row per key,
/// sorted by `date` (ties by `city_id`), in the observation schema. Rows whose key
/// could not be parsed are dropped.
pub fn merge_observations(
    stored: Option<&DataFrame>,
    fresh: &DataFrame,
) -> Result<DataFrame, FrameError> {
    let fresh = conform(fresh)?;
    let combined = match stored {
        Some(stored) if stored.height() > 0 => {
            let mut combined = conform(stored)?;
            combined.vstack_mut(&fresh)?;
            combined
        }
        _ => fresh,
    };

    let null_keys =
        combined.column(COL_CITY_ID)?.null_count() + combined.column(COL_DATE)?.null_count();
    if null_keys > 0 {
        warn!("Dropping rows with {} null key values", null_keys);
    }

    let merged = combined
        .lazy()
        .filter(col(COL_CITY_ID).is_not_null().and(col(COL_DATE).is_not_null()))
        .unique_stable(
            Some(vec![COL_CITY_ID.into(), COL_DATE.into()]),
            UniqueKeepStrategy::Last,
        )
        .sort(
            [COL_DATE, COL_CITY_ID],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;
    Ok(merged)
}
