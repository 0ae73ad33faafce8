//! Error types used by the crate.

use thiserror::Error;

use crate::client::MapsApiError;

/// Windshaft client error type.
#[derive(Debug, Clone, Error)]
pub enum WindshaftError {
    /// Required connection options are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Network failure, timeout or unexpected HTTP status.
    #[error("transport error: {0}")]
    Transport(String),
    /// The request was superseded by a newer one before it resolved.
    #[error("request was aborted")]
    Aborted,
    /// The service answered, but reported errors in the response body.
    #[error("maps api returned {} error(s)", .0.len())]
    Service(Vec<MapsApiError>),
    /// The same request was already performed the maximum number of times.
    #[error("maximum number of subsequent equal requests to the Maps API reached ({0})")]
    RequestLimitExceeded(u32),
    /// An argument is not of the type the operation works with.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// The item is already part of the collection.
    #[error("duplicate item: {0}")]
    Duplicate(String),
    /// Item not found.
    #[error("item not found: {0}")]
    NotFound(String),
    /// The service response lacks fields the client relies on.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// Failed to compress the map definition.
    #[error("compression failed: {0}")]
    Compression(String),
}

impl WindshaftError {
    /// Returns true if the error only means that a newer request took over.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<reqwest::Error> for WindshaftError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for WindshaftError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedResponse(value.to_string())
    }
}

impl From<std::io::Error> for WindshaftError {
    fn from(value: std::io::Error) -> Self {
        Self::Compression(value.to_string())
    }
}

impl From<xz2::stream::Error> for WindshaftError {
    fn from(value: xz2::stream::Error) -> Self {
        Self::Compression(value.to_string())
    }
}
