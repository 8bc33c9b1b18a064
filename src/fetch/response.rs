//! The time-series envelope returned for one point and its JSON wire form.

use crate::fetch::error::FetchError;
use crate::types::variable::HourlyVariable;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// JSON body of an archive response (requested with `timeformat=unixtime`).
#[derive(Debug, Deserialize)]
pub struct ArchiveResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub utc_offset_seconds: i64,
    pub timezone: Option<String>,
    pub hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
pub struct HourlyBlock {
    /// Unix seconds, UTC.
    #[serde(default)]
    pub time: Vec<i64>,
    /// Every other key of the block: one array per requested variable.
    #[serde(flatten)]
    pub series: HashMap<String, Value>,
}

/// Error body the API sends with 4xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub reason: String,
}

/// Values of one variable, `None` when the response did not carry a usable array.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSeries {
    pub variable: HourlyVariable,
    pub values: Option<Vec<Option<f64>>>,
}

/// Hourly time-series of one point.
///
/// `start` is inclusive and `end` exclusive, both in Unix seconds; `variables` follows
/// the order the variables were requested in.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyEnvelope {
    pub start: i64,
    pub end: i64,
    pub interval: i64,
    pub variables: Vec<VariableSeries>,
}

/// Evenly spaced instants from `start` (inclusive) to `end` (exclusive).
pub fn timestamp_range(start: i64, end: i64, interval: i64) -> Result<Vec<i64>, FetchError> {
    if interval <= 0 {
        return Err(FetchError::InvalidInterval(interval));
    }
    if end <= start {
        return Ok(Vec::new());
    }
    Ok((start..end).step_by(interval as usize).collect())
}

/// Reads a JSON array of numbers and nulls. Anything else makes the whole series unusable.
fn numeric_values(value: &Value) -> Option<Vec<Option<f64>>> {
    value
        .as_array()?
        .iter()
        .map(|item| match item {
            Value::Null => Some(None),
            Value::Number(n) => n.as_f64().map(Some),
            Value::Bool(b) => Some(Some(if *b { 1.0 } else { 0.0 })),
            _ => None,
        })
        .collect()
}

impl HourlyEnvelope {
    /// Builds the envelope from a decoded response.
    ///
    /// `fallback_interval` is used only when the time axis has a single entry.
    pub fn from_response(
        response: ArchiveResponse,
        requested: &[HourlyVariable],
        fallback_interval: i64,
    ) -> Result<Self, FetchError> {
        let hourly = response.hourly.ok_or(FetchError::MissingHourly)?;
        let (&start, &last) = match (hourly.time.first(), hourly.time.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(FetchError::EmptyHourly),
        };

        let interval = if hourly.time.len() > 1 {
            hourly.time[1] - hourly.time[0]
        } else {
            fallback_interval
        };
        if interval <= 0 {
            return Err(FetchError::InvalidInterval(interval));
        }
        if let Some((position, found)) = hourly
            .time
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .enumerate()
            .find(|(_, step)| *step != interval)
        {
            return Err(FetchError::IrregularTimeAxis {
                position,
                expected: interval,
                found,
            });
        }

        let variables = requested
            .iter()
            .map(|variable| VariableSeries {
                variable: *variable,
                values: hourly
                    .series
                    .get(variable.api_name())
                    .and_then(numeric_values),
            })
            .collect();

        Ok(HourlyEnvelope {
            start,
            end: last + interval,
            interval,
            variables,
        })
    }

    /// The instants the series are aligned to.
    pub fn timestamps(&self) -> Result<Vec<i64>, FetchError> {
        timestamp_range(self.start, self.end, self.interval)
    }
}
