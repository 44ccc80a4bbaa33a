//! Tool catalog and dispatch.
//!
//! The catalog is fixed: three tools, each with a JSON-Schema input
//! descriptor. [`ToolDispatcher::call`] turns every domain-level outcome into
//! a [`ToolResult`]; only an unrecognised tool name is reported as a
//! [`DispatchError`].

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::{
    error::{ArgumentError, DispatchError},
    gateway::WeatherGateway,
    model::{HistoryQuery, LocationQuery, WeatherQuery},
};

pub const GET_CURRENT_WEATHER: &str = "get_current_weather";
pub const GET_WEATHER_HISTORY: &str = "get_weather_history";
pub const SEARCH_LOCATION: &str = "search_location";

/// A callable tool as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self { content_type: "text".to_string(), text: text.into() }
    }
}

/// Envelope returned for every invocation of a known tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self { content: vec![Content::text(text)], is_error: false }
    }

    /// Error result; the text is prefixed with `Error: `.
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self { content: vec![Content::text(format!("Error: {message}"))], is_error: true }
    }

    /// Text of the first content block.
    pub fn text(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or_default()
    }
}

/// The three advertised tools, in listing order.
pub fn catalog() -> &'static [ToolDescriptor] {
    static CATALOG: OnceLock<Vec<ToolDescriptor>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

fn build_catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: GET_CURRENT_WEATHER.to_string(),
            description: "Get current weather and forecast for a specific location (lat/lon). \
                          Returns current weather, daily forecast for 8 days, and hourly \
                          forecast for 48 hours."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "lat": { "type": "number", "description": "Latitude" },
                    "lon": { "type": "number", "description": "Longitude" },
                    "exclude": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "enum": ["current", "minutely", "hourly", "daily", "alerts"]
                        },
                        "description": "Parts of weather data to exclude"
                    }
                },
                "required": ["lat", "lon"]
            }),
        },
        ToolDescriptor {
            name: GET_WEATHER_HISTORY.to_string(),
            description: "Get historical weather data for a specific timestamp (Time Machine)."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "lat": { "type": "number", "description": "Latitude" },
                    "lon": { "type": "number", "description": "Longitude" },
                    "dt": { "type": "number", "description": "Timestamp (Unix time, UTC)" }
                },
                "required": ["lat", "lon", "dt"]
            }),
        },
        ToolDescriptor {
            name: SEARCH_LOCATION.to_string(),
            description: "Search for a location by name to get its coordinates (lat/lon)."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "City name, state code (optional), country code (optional). \
                                        E.g. 'London', 'New York, NY, US'"
                    },
                    "limit": {
                        "type": "number",
                        "description": "Number of results to return (default 5)"
                    }
                },
                "required": ["query"]
            }),
        },
    ]
}

/// Routes tool invocations to a [`WeatherGateway`]. Holds no per-request state.
#[derive(Debug)]
pub struct ToolDispatcher {
    gateway: Arc<dyn WeatherGateway>,
}

impl ToolDispatcher {
    pub fn new(gateway: Arc<dyn WeatherGateway>) -> Self {
        Self { gateway }
    }

    pub fn list_tools(&self) -> &'static [ToolDescriptor] {
        catalog()
    }

    /// Runs one tool. `null` arguments are treated as an empty object.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolResult, DispatchError> {
        debug!(tool = name, "dispatching tool call");

        let outcome = match name {
            GET_CURRENT_WEATHER => {
                let query = match parse_args::<WeatherQuery>(arguments, WeatherQuery::validate) {
                    Ok(query) => query,
                    Err(err) => return Ok(invalid_arguments(name, err)),
                };
                self.gateway.fetch_current_and_forecast(&query).await.map(|d| d.into_inner())
            }
            GET_WEATHER_HISTORY => {
                let query = match parse_args::<HistoryQuery>(arguments, HistoryQuery::validate) {
                    Ok(query) => query,
                    Err(err) => return Ok(invalid_arguments(name, err)),
                };
                self.gateway.fetch_historical(&query).await.map(|d| d.into_inner())
            }
            SEARCH_LOCATION => {
                let query = match parse_args::<LocationQuery>(arguments, LocationQuery::validate) {
                    Ok(query) => query,
                    Err(err) => return Ok(invalid_arguments(name, err)),
                };
                self.gateway.search_location(&query).await.map(Value::Array)
            }
            _ => {
                warn!(tool = name, "unknown tool requested");
                return Err(DispatchError::UnknownTool(name.to_string()));
            }
        };

        Ok(match outcome {
            Ok(value) => render(&value),
            Err(err) => {
                warn!(tool = name, error = %err, "tool call failed");
                ToolResult::error(err)
            }
        })
    }
}

fn parse_args<T: DeserializeOwned>(
    arguments: Value,
    validate: fn(&T) -> Result<(), ArgumentError>,
) -> Result<T, ArgumentError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    let parsed: T = serde_json::from_value(arguments)?;
    validate(&parsed)?;
    Ok(parsed)
}

fn invalid_arguments(tool: &str, err: ArgumentError) -> ToolResult {
    debug!(tool, error = %err, "rejected tool arguments");
    ToolResult::error(format!("Invalid arguments for {tool}: {err}"))
}

fn render(value: &Value) -> ToolResult {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ToolResult::success(text),
        Err(err) => ToolResult::error(err),
    }
}
