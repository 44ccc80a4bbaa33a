use thiserror::Error;

/// Every failure of an outbound OpenWeather call.
///
/// All variants render with the same `OpenWeather API error: ` prefix so the
/// caller can tell gateway failures apart from local ones.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The service answered with a non-success status.
    #[error("OpenWeather API error: {message}")]
    Status { status: u16, message: String },

    #[error("OpenWeather API error: request timed out after {0} seconds")]
    Timeout(u64),

    /// Connection, DNS or TLS failure, or a body that could not be read.
    #[error("OpenWeather API error: {0}")]
    Transport(String),

    #[error("OpenWeather API error: unexpected response body: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A recognised tool was called with arguments that don't fit its schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("{0}")]
    Schema(String),

    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),

    #[error("timestamp {0} is not a valid Unix time")]
    Timestamp(i64),

    #[error("query must not be empty")]
    EmptyQuery,

    #[error("limit must be at least 1")]
    Limit,
}

impl From<serde_json::Error> for ArgumentError {
    fn from(err: serde_json::Error) -> Self {
        ArgumentError::Schema(err.to_string())
    }
}

/// Protocol-level dispatch failures. These are never wrapped into a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}
