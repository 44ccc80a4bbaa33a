use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::GatewayConfig,
    error::GatewayError,
    model::{DaySummaryQuery, HistoryQuery, LocationQuery, WeatherData, WeatherQuery},
};

use super::WeatherGateway;

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    config: GatewayConfig,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| GatewayError::Transport(describe(err)))?;

        Ok(Self { config, http })
    }

    fn onecall_url(&self, suffix: Option<&str>) -> String {
        let base = self.config.onecall_url.trim_end_matches('/');
        match suffix {
            Some(suffix) => format!("{base}/{suffix}"),
            None => base.to_string(),
        }
    }

    fn current_request(&self, query: &WeatherQuery) -> reqwest::RequestBuilder {
        let mut params = vec![
            ("lat", query.lat.to_string()),
            ("lon", query.lon.to_string()),
        ];
        if let Some(exclude) = query.exclude_param() {
            params.push(("exclude", exclude));
        }
        params.push(("appid", self.config.api_key.clone()));
        params.push(("units", "metric".to_string()));

        self.http.get(self.onecall_url(None)).query(&params)
    }

    fn history_request(&self, query: &HistoryQuery) -> reqwest::RequestBuilder {
        self.http.get(self.onecall_url(Some("timemachine"))).query(&[
            ("lat", query.lat.to_string()),
            ("lon", query.lon.to_string()),
            ("dt", query.dt.to_string()),
            ("appid", self.config.api_key.clone()),
            ("units", "metric".to_string()),
        ])
    }

    fn day_summary_request(&self, query: &DaySummaryQuery) -> reqwest::RequestBuilder {
        self.http.get(self.onecall_url(Some("day_summary"))).query(&[
            ("lat", query.lat.to_string()),
            ("lon", query.lon.to_string()),
            ("date", query.date_param()),
            ("appid", self.config.api_key.clone()),
            ("units", "metric".to_string()),
        ])
    }

    fn geocoding_request(&self, query: &LocationQuery) -> reqwest::RequestBuilder {
        self.http.get(&self.config.geocoding_url).query(&[
            ("q", query.query.clone()),
            ("limit", query.effective_limit().to_string()),
            ("appid", self.config.api_key.clone()),
        ])
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        debug!(operation, "sending OpenWeather request");

        let res = request.send().await.map_err(|err| self.transport_error(err))?;

        let status = res.status();
        let body = res.text().await.map_err(|err| self.transport_error(err))?;

        if !status.is_success() {
            let err = status_error(status, &body);
            warn!(operation, status = status.as_u16(), error = %err, "OpenWeather request failed");
            return Err(err);
        }

        debug!(operation, status = status.as_u16(), bytes = body.len(), "OpenWeather response");

        serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        let err = if err.is_timeout() {
            GatewayError::Timeout(self.config.timeout.as_secs())
        } else {
            GatewayError::Transport(describe(err))
        };
        warn!(error = %err, "OpenWeather request did not complete");
        err
    }
}

#[async_trait]
impl WeatherGateway for OpenWeatherClient {
    async fn fetch_current_and_forecast(
        &self,
        query: &WeatherQuery,
    ) -> Result<WeatherData, GatewayError> {
        self.fetch("onecall", self.current_request(query)).await
    }

    async fn fetch_historical(&self, query: &HistoryQuery) -> Result<WeatherData, GatewayError> {
        self.fetch("timemachine", self.history_request(query)).await
    }

    async fn fetch_day_summary(&self, query: &DaySummaryQuery) -> Result<Value, GatewayError> {
        self.fetch("day_summary", self.day_summary_request(query)).await
    }

    async fn search_location(&self, query: &LocationQuery) -> Result<Vec<Value>, GatewayError> {
        self.fetch("geocoding", self.geocoding_request(query)).await
    }
}

/// Builds the error for a non-success reply, preferring the service's own
/// `message` field over the raw body.
fn status_error(status: StatusCode, body: &str) -> GatewayError {
    let reported = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        json.get("message")
            .and_then(Value::as_str)
            .filter(|msg| !msg.is_empty())
            .map(str::to_owned)
    });

    let message = reported.unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("request failed with status {status}")
        } else {
            format!("request failed with status {status}: {}", truncate_body(body))
        }
    });

    GatewayError::Status { status: status.as_u16(), message }
}

/// Flattens a reqwest error and its sources into one line. The URL carries
/// the credential, so it is stripped first.
fn describe(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
