//! Turns one point's time-series envelope into rows of the observation table.

use crate::fetch::response::{HourlyEnvelope, VariableSeries};
use crate::frames::error::FrameError;
use crate::types::observation::{datetime_column, COL_CITY_ID, COL_DATE};
use crate::types::variable::{HourlyVariable, VariableKind};
use log::warn;
use polars::prelude::*;

/// Checks that the envelope carries exactly the declared variables, in order.
fn check_layout(envelope: &HourlyEnvelope) -> Result<(), FrameError> {
    if envelope.variables.len() != HourlyVariable::ALL.len() {
        return Err(FrameError::VariableCount {
            expected: HourlyVariable::ALL.len(),
            found: envelope.variables.len(),
        });
    }
    for (position, (series, expected)) in envelope
        .variables
        .iter()
        .zip(HourlyVariable::ALL)
        .enumerate()
    {
        if series.variable != expected {
            return Err(FrameError::SchemaMismatch {
                position,
                expected,
                found: series.variable,
            });
        }
    }
    Ok(())
}

/// Values of a series if they line up with the time axis, otherwise `None`.
fn aligned_values(city_id: i32, series: &VariableSeries, rows: usize) -> Option<&[Option<f64>]> {
    match &series.values {
        Some(values) if values.len() == rows => Some(values.as_slice()),
        Some(values) => {
            warn!(
                "City {}: '{}' has {} values for {} timestamps, storing nulls",
                city_id,
                series.variable,
                values.len(),
                rows
            );
            None
        }
        None => {
            warn!(
                "City {}: '{}' missing from response, storing nulls",
                city_id, series.variable
            );
            None
        }
    }
}

/// Builds the observation rows of one city.
///
/// One row per timestamp of the envelope. A variable that is absent, unreadable or
/// misaligned yields an all-null column instead of failing the whole point; `is_day`
/// is stored as a boolean (non-zero is day, null stays null).
pub fn normalize(city_id: i32, envelope: &HourlyEnvelope) -> Result<DataFrame, FrameError> {
    check_layout(envelope)?;
    let timestamps = envelope.timestamps()?;
    let rows = timestamps.len();

    let mut columns = vec![
        Column::new(COL_CITY_ID.into(), vec![city_id; rows]),
        datetime_column(COL_DATE, timestamps.iter().map(|s| s * 1000).collect())?,
    ];

    for series in &envelope.variables {
        let name = series.variable.column_name().into();
        let values = aligned_values(city_id, series, rows);
        let column = match series.variable.kind() {
            VariableKind::Numeric => {
                let values: Vec<Option<f64>> = match values {
                    Some(values) => values.to_vec(),
                    None => vec![None; rows],
                };
                Column::new(name, values)
            }
            VariableKind::Flag => {
                let flags: Vec<Option<bool>> = match values {
                    Some(values) => values.iter().map(|v| v.map(|v| v != 0.0)).collect(),
                    None => vec![None; rows],
                };
                Column::new(name, flags)
            }
        };
        columns.push(column);
    }

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::observation::{has_observation_layout, rows_from_frame};

    const T0: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z
    const HOUR: i64 = 3600;

    fn envelope(rows: usize) -> HourlyEnvelope {
        let variables = HourlyVariable::ALL
            .iter()
            .map(|variable| VariableSeries {
                variable: *variable,
                values: Some(
                    (0..rows)
                        .map(|i| match variable {
                            HourlyVariable::IsDay => Some((i % 2) as f64),
                            _ => Some(variable.position() as f64 + i as f64 / 10.0),
                        })
                        .collect(),
                ),
            })
            .collect();
        HourlyEnvelope {
            start: T0,
            end: T0 + rows as i64 * HOUR,
            interval: HOUR,
            variables,
        }
    }

    #[test]
    fn test_one_row_per_timestamp() -> Result<(), FrameError> {
        let df = normalize(42, &envelope(3))?;
        assert_eq!(df.height(), 3);
        assert!(has_observation_layout(&df));

        let rows = rows_from_frame(&df)?;
        assert!(rows.iter().all(|r| r.city_id == 42));
        assert_eq!(rows[0].date.and_utc().timestamp(), T0);
        assert_eq!(rows[2].date.and_utc().timestamp(), T0 + 2 * HOUR);
        assert_eq!(rows[1].temperature, Some(0.1));
        assert_eq!(rows[1].wind_speed, Some(8.1));
        Ok(())
    }

    #[test]
    fn test_is_day_becomes_boolean() -> Result<(), FrameError> {
        let mut env = envelope(3);
        env.variables[5].values = Some(vec![Some(0.0), Some(1.0), None]);
        let df = normalize(1, &env)?;
        let is_day: Vec<Option<bool>> = df.column("is_day")?.bool()?.into_iter().collect();
        assert_eq!(is_day, vec![Some(false), Some(true), None]);
        Ok(())
    }

    #[test]
    fn test_missing_variable_becomes_null_column() -> Result<(), FrameError> {
        for position in 0..HourlyVariable::ALL.len() {
            let mut env = envelope(4);
            env.variables[position].values = None;
            let df = normalize(7, &env)?;

            assert_eq!(df.height(), 4);
            let name = HourlyVariable::ALL[position].column_name();
            assert_eq!(df.column(name)?.null_count(), 4, "column {name}");
            let other = HourlyVariable::ALL[(position + 1) % 9].column_name();
            assert_eq!(df.column(other)?.null_count(), 0);
        }
        Ok(())
    }

    #[test]
    fn test_misaligned_series_becomes_null_column() -> Result<(), FrameError> {
        let mut env = envelope(4);
        env.variables[2].values = Some(vec![Some(1.0)]);
        let df = normalize(7, &env)?;
        assert_eq!(df.height(), 4);
        assert_eq!(df.column("rain")?.null_count(), 4);
        Ok(())
    }

    #[test]
    fn test_variable_order_is_checked() {
        let mut env = envelope(2);
        env.variables.swap(0, 1);
        assert!(matches!(
            normalize(1, &env),
            Err(FrameError::SchemaMismatch {
                position: 0,
                expected: HourlyVariable::Temperature,
                found: HourlyVariable::RelativeHumidity,
            })
        ));

        let mut short = envelope(2);
        short.variables.pop();
        assert!(matches!(
            normalize(1, &short),
            Err(FrameError::VariableCount {
                expected: 9,
                found: 8
            })
        ));
    }

    #[test]
    fn test_empty_time_axis_gives_empty_frame() -> Result<(), FrameError> {
        let mut env = envelope(0);
        env.end = env.start;
        let df = normalize(1, &env)?;
        assert_eq!(df.height(), 0);
        assert!(has_observation_layout(&df));
        Ok(())
    }
}
