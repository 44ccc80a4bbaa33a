use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::{
    error::GatewayError,
    model::{DaySummaryQuery, HistoryQuery, LocationQuery, WeatherData, WeatherQuery},
};

pub mod openweather;

pub use openweather::OpenWeatherClient;

/// Outbound side of the server: the remote weather and geocoding service.
///
/// Queries reach the gateway already validated; implementations only talk to
/// the network and normalise failures into [`GatewayError`].
#[async_trait]
pub trait WeatherGateway: Send + Sync + Debug {
    /// Current conditions plus hourly and daily forecast (One Call).
    async fn fetch_current_and_forecast(
        &self,
        query: &WeatherQuery,
    ) -> Result<WeatherData, GatewayError>;

    /// Conditions at a past instant (One Call time machine).
    async fn fetch_historical(&self, query: &HistoryQuery) -> Result<WeatherData, GatewayError>;

    async fn fetch_day_summary(&self, query: &DaySummaryQuery) -> Result<Value, GatewayError>;

    /// Direct geocoding. Records are returned as the provider sent them.
    async fn search_location(&self, query: &LocationQuery) -> Result<Vec<Value>, GatewayError>;
}
