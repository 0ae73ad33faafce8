//! HTTP transport used to talk to the Maps API, and its default [`reqwest`] implementation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::WindshaftError;

pub mod native;
pub use native::ReqwestTransport;

/// Request prepared by the [`MapsApiClient`](crate::client::MapsApiClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpRequest {
    /// GET request. If `jsonp_callback` is set, the response is expected to be wrapped into
    /// a call of the function with this name.
    Get {
        /// Full url, including the query string.
        url: String,
        /// JSONP callback name.
        jsonp_callback: Option<String>,
    },
    /// POST request with a JSON body.
    Post {
        /// Full url, including the query string.
        url: String,
        /// JSON body.
        body: String,
    },
}

impl HttpRequest {
    /// Url of the request.
    pub fn url(&self) -> &str {
        match self {
            Self::Get { url, .. } | Self::Post { url, .. } => url,
        }
    }

    /// Returns true for GET requests.
    pub fn is_get(&self) -> bool {
        matches!(self, Self::Get { .. })
    }
}

/// Response received from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body with any JSONP envelope already removed.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a new response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport able to deliver [`HttpRequest`]s.
///
/// Errors returned from [`HttpTransport::send`] are treated as network failures. HTTP error
/// statuses must be returned as a normal [`HttpResponse`] so that the client can inspect the
/// body for service errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request and waits for the response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, WindshaftError>;
}
