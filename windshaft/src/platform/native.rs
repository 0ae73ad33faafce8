//! [`HttpTransport`](super::HttpTransport) implementation backed by [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};

use crate::error::WindshaftError;
use crate::platform::{HttpRequest, HttpResponse, HttpTransport};

/// Default request timeout of the transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`HttpTransport`] implementation based on [`reqwest`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a new transport. Requests that do not complete within `timeout` fail with
    /// [`WindshaftError::Transport`].
    pub fn new(timeout: Duration) -> Result<Self, WindshaftError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("windshaft-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| {
                WindshaftError::Configuration(format!("failed to create http client: {err}"))
            })?;

        Ok(Self { http_client })
    }

    async fn get(
        &self,
        url: &str,
        jsonp_callback: Option<&str>,
    ) -> Result<HttpResponse, WindshaftError> {
        let url = match jsonp_callback {
            Some(callback) => with_callback_param(url, callback),
            None => url.to_string(),
        };

        info!("Loading {url}");
        let response = self.http_client.get(&url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        let body = match jsonp_callback {
            Some(callback) => unwrap_jsonp(&body, callback),
            None => body,
        };

        Ok(HttpResponse { status, body })
    }

    async fn post(&self, url: &str, body: String) -> Result<HttpResponse, WindshaftError> {
        info!("Posting map definition to {url}");
        let response = self
            .http_client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, WindshaftError> {
        let response = match request {
            HttpRequest::Get {
                url,
                jsonp_callback,
            } => self.get(&url, jsonp_callback.as_deref()).await?,
            HttpRequest::Post { url, body } => self.post(&url, body).await?,
        };

        if !response.is_success() {
            debug!(
                "Maps API responded with status {}: {:?}",
                response.status,
                String::from_utf8_lossy(&response.body)
            );
        }

        Ok(response)
    }
}

fn with_callback_param(url: &str, callback: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}callback={callback}")
}

/// Strips `callback(...)` envelope from the body. Bodies that are not wrapped are returned as
/// is, since the service answers errors with plain JSON.
fn unwrap_jsonp(body: &Bytes, callback: &str) -> Bytes {
    let Ok(text) = std::str::from_utf8(body) else {
        return body.clone();
    };

    let prefix = format!("{callback}(");
    let Some(start) = text.rfind(&prefix).map(|pos| pos + prefix.len()) else {
        return body.clone();
    };
    let Some(end) = text.rfind(')') else {
        return body.clone();
    };

    if end < start {
        return body.clone();
    }

    body.slice(start..end)
}
