//! Core library for the `weather-mcp` server.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather gateway client and its error normalisation
//! - The fixed tool catalog and dispatcher
//! - The MCP server (rmcp) and the newline-framed transport it runs on
//!
//! It is used by `weather-mcp`, but the dispatcher can be driven directly by
//! other binaries or tests.

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod server;
pub mod tools;
pub mod transport;

pub use config::{Config, GatewayConfig};
pub use error::{ArgumentError, DispatchError, GatewayError};
pub use gateway::{OpenWeatherClient, WeatherGateway};
pub use model::{DaySummaryQuery, ExcludePart, HistoryQuery, LocationQuery, WeatherData, WeatherQuery};
pub use server::WeatherServer;
pub use tools::{ToolDescriptor, ToolDispatcher, ToolResult, catalog};
