//! Layout of the observation table and conversions between frames and rows.

use crate::types::variable::HourlyVariable;
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

pub const COL_CITY_ID: &str = "city_id";
pub const COL_DATE: &str = "date";

/// Number of columns in the observation table.
pub const OBSERVATION_WIDTH: usize = HourlyVariable::ALL.len() + 2;

/// Timestamps are stored as timezone-naive UTC with millisecond precision.
pub const DATE_DTYPE: DataType = DataType::Datetime(TimeUnit::Milliseconds, None);

/// One hourly record for one city.
///
/// `(city_id, date)` is the natural key of the observation set.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    pub city_id: i32,
    pub date: NaiveDateTime,
    pub temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub rain: Option<f64>,
    pub snowfall: Option<f64>,
    pub snow_depth: Option<f64>,
    pub is_day: Option<bool>,
    pub precipitation: Option<f64>,
    pub wind_direction: Option<f64>,
    pub wind_speed: Option<f64>,
}

/// Column names in output order: key columns first, then [`HourlyVariable::ALL`].
pub fn observation_columns() -> Vec<&'static str> {
    let mut names = vec![COL_CITY_ID, COL_DATE];
    names.extend(HourlyVariable::ALL.iter().map(|v| v.column_name()));
    names
}

pub fn observation_schema() -> Schema {
    let mut fields = vec![
        Field::new(COL_CITY_ID.into(), DataType::Int32),
        Field::new(COL_DATE.into(), DATE_DTYPE),
    ];
    fields.extend(
        HourlyVariable::ALL
            .iter()
            .map(|v| Field::new(v.column_name().into(), v.kind().dtype())),
    );
    Schema::from_iter(fields)
}

/// True when `df` has exactly the observation columns, in order, with their dtypes.
pub fn has_observation_layout(df: &DataFrame) -> bool {
    let schema = observation_schema();
    df.width() == schema.len()
        && df
            .get_columns()
            .iter()
            .zip(schema.iter())
            .all(|(column, (name, dtype))| column.name() == name && column.dtype() == dtype)
}

pub fn empty_observation_frame() -> DataFrame {
    DataFrame::empty_with_schema(&observation_schema())
}

/// Builds the `date` column from epoch milliseconds.
pub(crate) fn datetime_column(name: &str, millis: Vec<i64>) -> PolarsResult<Column> {
    Series::new(name.into(), millis)
        .cast(&DATE_DTYPE)
        .map(Column::from)
}

fn float_column<'a>(df: &'a DataFrame, variable: HourlyVariable) -> PolarsResult<&'a Float64Chunked> {
    df.column(variable.column_name())?.f64()
}

/// Reads a frame in the observation schema back into rows.
///
/// Rows with a null key cannot be represented and are reported as an error.
pub fn rows_from_frame(df: &DataFrame) -> PolarsResult<Vec<ObservationRow>> {
    let city_ids = df.column(COL_CITY_ID)?.i32()?;
    let dates = df.column(COL_DATE)?.cast(&DataType::Int64)?;
    let dates = dates.i64()?;
    let temperature = float_column(df, HourlyVariable::Temperature)?;
    let humidity = float_column(df, HourlyVariable::RelativeHumidity)?;
    let rain = float_column(df, HourlyVariable::Rain)?;
    let snowfall = float_column(df, HourlyVariable::Snowfall)?;
    let snow_depth = float_column(df, HourlyVariable::SnowDepth)?;
    let is_day = df.column(HourlyVariable::IsDay.column_name())?.bool()?;
    let precipitation = float_column(df, HourlyVariable::Precipitation)?;
    let wind_direction = float_column(df, HourlyVariable::WindDirection)?;
    let wind_speed = float_column(df, HourlyVariable::WindSpeed)?;

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(city_id), Some(millis)) = (city_ids.get(idx), dates.get(idx)) else {
            return Err(PolarsError::ComputeError(
                format!("observation row {idx} has a null key").into(),
            ));
        };
        let date = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| {
                PolarsError::ComputeError(format!("timestamp {millis} is out of range").into())
            })?
            .naive_utc();
        rows.push(ObservationRow {
            city_id,
            date,
            temperature: temperature.get(idx),
            relative_humidity: humidity.get(idx),
            rain: rain.get(idx),
            snowfall: snowfall.get(idx),
            snow_depth: snow_depth.get(idx),
            is_day: is_day.get(idx),
            precipitation: precipitation.get(idx),
            wind_direction: wind_direction.get(idx),
            wind_speed: wind_speed.get(idx),
        });
    }
    Ok(rows)
}

/// Builds a frame in the observation schema from rows, preserving their order.
pub fn frame_from_rows(rows: &[ObservationRow]) -> PolarsResult<DataFrame> {
    macro_rules! values {
        ($field:ident) => {
            rows.iter().map(|r| r.$field).collect::<Vec<_>>()
        };
    }

    let mut columns = vec![
        Column::new(COL_CITY_ID.into(), values!(city_id)),
        datetime_column(
            COL_DATE,
            rows.iter().map(|r| r.date.and_utc().timestamp_millis()).collect(),
        )?,
    ];
    for variable in HourlyVariable::ALL {
        let name = variable.column_name().into();
        let column = match variable {
            HourlyVariable::Temperature => Column::new(name, values!(temperature)),
            HourlyVariable::RelativeHumidity => Column::new(name, values!(relative_humidity)),
            HourlyVariable::Rain => Column::new(name, values!(rain)),
            HourlyVariable::Snowfall => Column::new(name, values!(snowfall)),
            HourlyVariable::SnowDepth => Column::new(name, values!(snow_depth)),
            HourlyVariable::IsDay => Column::new(name, values!(is_day)),
            HourlyVariable::Precipitation => Column::new(name, values!(precipitation)),
            HourlyVariable::WindDirection => Column::new(name, values!(wind_direction)),
            HourlyVariable::WindSpeed => Column::new(name, values!(wind_speed)),
        };
        debug_assert_eq!(column.dtype(), &variable.kind().dtype());
        columns.push(column);
    }
    DataFrame::new(columns)
}
