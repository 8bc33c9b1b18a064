//! Defines the fixed, ordered set of hourly variables requested from the weather API.
//!
//! The same list drives the `hourly=` request parameter and the column layout of the
//! normalized observation frame, so a response can be checked against it position by
//! position instead of being trusted blindly.

use polars::prelude::DataType;
use std::fmt;

/// How the values of a variable are stored once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Stored as a nullable `Float64`.
    Numeric,
    /// Delivered as `0`/`1` by the API, stored as a nullable `Boolean`.
    Flag,
}

impl VariableKind {
    pub fn dtype(&self) -> DataType {
        match self {
            VariableKind::Numeric => DataType::Float64,
            VariableKind::Flag => DataType::Boolean,
        }
    }
}

/// One hourly weather variable.
///
/// The declaration order is the order of [`HourlyVariable::ALL`], which is both the
/// request order and the output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HourlyVariable {
    /// Air temperature at 2 m, °C.
    Temperature,
    /// Relative humidity at 2 m, %.
    RelativeHumidity,
    /// Liquid precipitation of the preceding hour, mm.
    Rain,
    /// Snowfall of the preceding hour, cm.
    Snowfall,
    /// Snow depth on the ground, m.
    SnowDepth,
    /// Whether the hour is in daylight.
    IsDay,
    /// Total precipitation (rain, showers, snow) of the preceding hour, mm.
    Precipitation,
    /// Wind direction at 100 m, degrees.
    WindDirection,
    /// Wind speed at 100 m, km/h.
    WindSpeed,
}

impl HourlyVariable {
    pub const ALL: [HourlyVariable; 9] = [
        HourlyVariable::Temperature,
        HourlyVariable::RelativeHumidity,
        HourlyVariable::Rain,
        HourlyVariable::Snowfall,
        HourlyVariable::SnowDepth,
        HourlyVariable::IsDay,
        HourlyVariable::Precipitation,
        HourlyVariable::WindDirection,
        HourlyVariable::WindSpeed,
    ];

    /// Name used in the API request and in the `hourly` block of the response.
    pub fn api_name(&self) -> &'static str {
        match self {
            HourlyVariable::Temperature => "temperature_2m",
            HourlyVariable::RelativeHumidity => "relative_humidity_2m",
            HourlyVariable::Rain => "rain",
            HourlyVariable::Snowfall => "snowfall",
            HourlyVariable::SnowDepth => "snow_depth",
            HourlyVariable::IsDay => "is_day",
            HourlyVariable::Precipitation => "precipitation",
            HourlyVariable::WindDirection => "wind_direction_100m",
            HourlyVariable::WindSpeed => "wind_speed_100m",
        }
    }

    /// Column name in the observation frame and in the `weather` table.
    ///
    /// Identical to the API name; kept separate so storage can diverge from the API.
    pub fn column_name(&self) -> &'static str {
        self.api_name()
    }

    pub fn kind(&self) -> VariableKind {
        match self {
            HourlyVariable::IsDay => VariableKind::Flag,
            _ => VariableKind::Numeric,
        }
    }

    pub fn position(&self) -> usize {
        // ALL is exhaustive, so the lookup cannot miss.
        Self::ALL.iter().position(|v| v == self).unwrap_or_default()
    }

    /// Comma-separated list for the `hourly=` query parameter.
    pub fn request_list() -> String {
        Self::ALL
            .iter()
            .map(|v| v.api_name())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for HourlyVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_name())
    }
}
