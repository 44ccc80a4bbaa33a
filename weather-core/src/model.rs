use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::{Number, Value};

use crate::error::ArgumentError;

/// Number of geocoding matches requested when the caller gives no limit.
pub const DEFAULT_LOCATION_LIMIT: u32 = 5;

/// Blocks of the One Call response that can be left out of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExcludePart {
    Current,
    Minutely,
    Hourly,
    Daily,
    Alerts,
}

impl ExcludePart {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExcludePart::Current => "current",
            ExcludePart::Minutely => "minutely",
            ExcludePart::Hourly => "hourly",
            ExcludePart::Daily => "daily",
            ExcludePart::Alerts => "alerts",
        }
    }

    pub const fn all() -> &'static [ExcludePart] {
        &[
            ExcludePart::Current,
            ExcludePart::Minutely,
            ExcludePart::Hourly,
            ExcludePart::Daily,
            ExcludePart::Alerts,
        ]
    }
}

impl std::fmt::Display for ExcludePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments of `get_current_weather`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherQuery {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub exclude: Option<Vec<ExcludePart>>,
}

impl WeatherQuery {
    pub fn validate(&self) -> Result<(), ArgumentError> {
        check_coordinates(self.lat, self.lon)
    }

    /// Comma-joined `exclude` value, `None` when nothing is excluded.
    pub fn exclude_param(&self) -> Option<String> {
        let parts = self.exclude.as_ref().filter(|parts| !parts.is_empty())?;
        Some(parts.iter().map(ExcludePart::as_str).collect::<Vec<_>>().join(","))
    }
}

/// Arguments of `get_weather_history`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryQuery {
    pub lat: f64,
    pub lon: f64,
    /// Unix seconds, UTC. Integral floats such as `1700000000.0` are accepted.
    #[serde(deserialize_with = "integral_i64")]
    pub dt: i64,
}

impl HistoryQuery {
    pub fn validate(&self) -> Result<(), ArgumentError> {
        check_coordinates(self.lat, self.lon)?;

        if self.dt < 0 || DateTime::<Utc>::from_timestamp(self.dt, 0).is_none() {
            return Err(ArgumentError::Timestamp(self.dt));
        }

        Ok(())
    }
}

/// Daily aggregation request. Served by the gateway, not advertised as a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummaryQuery {
    pub lat: f64,
    pub lon: f64,
    pub date: NaiveDate,
}

impl DaySummaryQuery {
    pub fn validate(&self) -> Result<(), ArgumentError> {
        check_coordinates(self.lat, self.lon)
    }

    pub fn date_param(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Arguments of `search_location`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationQuery {
    pub query: String,
    #[serde(default, deserialize_with = "integral_u32_opt")]
    pub limit: Option<u32>,
}

impl LocationQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), limit: None }
    }

    pub fn validate(&self) -> Result<(), ArgumentError> {
        if self.query.trim().is_empty() {
            return Err(ArgumentError::EmptyQuery);
        }
        if self.limit == Some(0) {
            return Err(ArgumentError::Limit);
        }
        Ok(())
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LOCATION_LIMIT)
    }
}

/// One Call payload, kept exactly as the provider sent it.
///
/// Typical top-level fields are `lat`, `lon`, `timezone`, `current`,
/// `hourly` (48 h), `daily` (8 days) and `alerts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherData(pub Value);

impl WeatherData {
    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// Tool schemas advertise `number`, so `5` and `5.0` must both be accepted
/// where an integer is needed.
fn integral<E: serde::de::Error>(number: &Number) -> Result<i64, E> {
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }

    match number.as_f64() {
        Some(value)
            if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 =>
        {
            Ok(value as i64)
        }
        _ => Err(E::custom(format!("expected an integer, got {number}"))),
    }
}

fn integral_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    integral(&Number::deserialize(deserializer)?)
}

fn integral_u32_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let value = integral::<D::Error>(&number)?;
    u32::try_from(value)
        .map(Some)
        .map_err(|_| D::Error::custom(format!("expected a non-negative integer, got {number}")))
}

fn check_coordinates(lat: f64, lon: f64) -> Result<(), ArgumentError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ArgumentError::Latitude(lat));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(ArgumentError::Longitude(lon));
    }
    Ok(())
}
