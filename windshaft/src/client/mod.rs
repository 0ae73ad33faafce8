//! Client for the layer group instantiation endpoint of the Maps API.
//!
//! [`MapsApiClient`] decides how a map definition is delivered to the service:
//!
//! 1. as a GET request with the JSON definition in the `config` parameter, if the resulting url
//!    is shorter than [`MAX_URL_LENGTH`],
//! 2. as a GET request with the LZMA compressed definition in the `lzma` parameter, if that url
//!    is short enough,
//! 3. as a POST request with the definition in the body otherwise.
//!
//! A client keeps at most one request in flight. Starting a new request aborts the previous
//! one, which then resolves to [`WindshaftError::Aborted`].

use std::sync::Arc;

use futures::future::{self, AbortHandle, Abortable, BoxFuture};
use futures::FutureExt;
use log::{debug, error};
use parking_lot::Mutex;
use quick_cache::unsync::Cache;
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle_encoding::hex;
use windshaft_types::{InstantiationResponse, MapDefinition};

use crate::error::WindshaftError;
use crate::platform::{HttpRequest, HttpResponse, HttpTransport};

mod compression;
pub mod encoding;
mod errors;
mod request;
mod request_tracker;
mod settings;

pub use compression::{compress, compress_to_hex, COMPRESSION_LEVEL};
pub use encoding::QueryParams;
pub use errors::{get_errors_from_response, ErrorOrigin, MapsApiError};
pub use request::Request;
pub use request_tracker::{RequestTracker, MAP_INSTANTIATION_LIMIT, TRACKED_REQUESTS_CAPACITY};
pub use settings::{ClientSettings, MAPS_API_BASE_URL};

use settings::Endpoints;

/// Urls of this length or longer are not sent as GET requests.
pub const MAX_URL_LENGTH: usize = 2033;

const JSONP_CALLBACK_PREFIX: &str = "_cdbc_";

/// Number of urls whose JSONP callback counters are remembered.
const CALLBACK_NAMES_CAPACITY: usize = 256;

type ResponseFuture<T> = BoxFuture<'static, Result<T, WindshaftError>>;

/// Client instantiating layer groups in the Maps API.
pub struct MapsApiClient {
    url: String,
    endpoints: Endpoints,
    transport: Arc<dyn HttpTransport>,
    request_tracker: Arc<Mutex<RequestTracker>>,
    in_flight: Mutex<Option<AbortHandle>>,
    callback_names: Mutex<Cache<String, u32>>,
}

impl std::fmt::Debug for MapsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapsApiClient")
            .field("url", &self.url)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl MapsApiClient {
    /// Creates a new client.
    ///
    /// Returns [`WindshaftError::Configuration`] if the url template or the user name is
    /// missing.
    pub fn new(
        settings: &ClientSettings,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, WindshaftError> {
        settings.validate()?;

        Ok(Self {
            url: settings.base_url().trim_end_matches('/').to_string(),
            endpoints: settings.endpoints(),
            transport,
            request_tracker: Arc::new(Mutex::new(RequestTracker::new(
                settings.instantiation_limit,
            ))),
            in_flight: Mutex::new(None),
            callback_names: Mutex::new(Cache::new(CALLBACK_NAMES_CAPACITY)),
        })
    }

    /// Base url of the service.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Chooses the way the definition is sent to the service and prepares the request.
    pub fn negotiate(
        &self,
        definition: &MapDefinition,
        params: &QueryParams,
    ) -> Result<HttpRequest, WindshaftError> {
        let config = serde_json::to_string(definition).map_err(|err| {
            WindshaftError::Configuration(format!("failed to serialize map definition: {err}"))
        })?;

        let encoded_url = self.get_url(
            &QueryParams::new()
                .with("config", config.as_str())
                .extended_with(params),
            &self.endpoints.get,
        );
        if is_url_valid(&encoded_url) {
            debug!("Sending map definition as GET ({} chars)", encoded_url.len());
            return Ok(self.get_request(encoded_url));
        }

        let data = serde_json::json!({ "config": config }).to_string();
        let lzma = compress_to_hex(data.as_bytes(), COMPRESSION_LEVEL)?;
        let compressed_url = self.get_url(
            &QueryParams::new().with("lzma", lzma).extended_with(params),
            &self.endpoints.get,
        );
        if is_url_valid(&compressed_url) {
            debug!(
                "Sending compressed map definition as GET ({} chars)",
                compressed_url.len()
            );
            return Ok(self.get_request(compressed_url));
        }

        debug!("Sending map definition as POST ({} chars)", config.len());
        Ok(HttpRequest::Post {
            url: self.get_url(params, &self.endpoints.post),
            body: config,
        })
    }

    /// Requests a new layer group for the definition.
    ///
    /// Any request started earlier by this client is aborted. The returned future resolves to
    /// [`WindshaftError::Aborted`] if this request is superseded before it completes.
    pub fn instantiate_map(
        &self,
        definition: &MapDefinition,
        params: &QueryParams,
    ) -> ResponseFuture<InstantiationResponse> {
        let request = match self.negotiate(definition, params) {
            Ok(request) => request,
            Err(err) => {
                self.abort();
                return future::ready(Err(err)).boxed();
            }
        };

        let (abort_handle, registration) = AbortHandle::new_pair();
        if let Some(previous) = self.in_flight.lock().replace(abort_handle) {
            previous.abort();
        }

        let transport = self.transport.clone();
        Abortable::new(
            async move {
                let response = transport.send(request).await?;
                interpret_response(response)
            },
            registration,
        )
        .map(|result| result.unwrap_or(Err(WindshaftError::Aborted)))
        .boxed()
    }

    /// Same as [`MapsApiClient::instantiate_map`], but refuses to send a request that was
    /// already performed the maximum number of times with the same result.
    ///
    /// A refused request resolves immediately to [`WindshaftError::RequestLimitExceeded`]
    /// without any network interaction. It still supersedes the request in flight.
    pub fn perform_request(&self, request: Request) -> ResponseFuture<InstantiationResponse> {
        if !self
            .request_tracker
            .lock()
            .can_request_be_performed(&request)
        {
            let limit = self.request_tracker.lock().limit();
            error!(
                "Maximum number of subsequent equal requests to the Maps API reached ({limit}): {}",
                request.key()
            );
            self.abort();
            return future::ready(Err(WindshaftError::RequestLimitExceeded(limit))).boxed();
        }

        let response = self.instantiate_map(&request.payload, &request.params);
        let tracker = self.request_tracker.clone();
        async move {
            let result = response.await;
            match &result {
                Ok(response) => tracker.lock().track(&request, response),
                Err(WindshaftError::Aborted) => {}
                Err(WindshaftError::Service(errors)) => tracker.lock().track(&request, errors),
                Err(other) => tracker.lock().track(&request, &other.to_string()),
            }

            result
        }
        .boxed()
    }

    /// Loads a JSON document from the service, e.g. feature attributes. These requests do
    /// not abort and are not aborted by instantiation requests.
    pub fn fetch_json(&self, url: String) -> ResponseFuture<Value> {
        let request = self.get_request(url);
        let transport = self.transport.clone();
        async move {
            let response = transport.send(request).await?;
            if !response.is_success() {
                return Err(WindshaftError::Transport(format!(
                    "unexpected response status {}",
                    response.status
                )));
            }

            Ok(serde_json::from_slice(&response.body)?)
        }
        .boxed()
    }

    /// Aborts the request in flight, if any.
    pub fn abort(&self) {
        if let Some(handle) = self.in_flight.lock().take() {
            handle.abort();
        }
    }

    fn get_url(&self, params: &QueryParams, endpoint: &str) -> String {
        format!("{}/{endpoint}{}", self.url, params.to_query_string())
    }

    fn get_request(&self, url: String) -> HttpRequest {
        let jsonp_callback = Some(self.jsonp_callback_name(&url));
        HttpRequest::Get {
            url,
            jsonp_callback,
        }
    }

    fn jsonp_callback_name(&self, url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        let hash = String::from_utf8(hex::encode(&digest[..4])).unwrap_or_default();

        let mut names = self.callback_names.lock();
        let counter = names.get(&hash).copied().unwrap_or(0) + 1;
        names.insert(hash.clone(), counter);

        format!("{JSONP_CALLBACK_PREFIX}{hash}_{counter}")
    }
}

impl Drop for MapsApiClient {
    fn drop(&mut self) {
        self.abort();
    }
}

fn is_url_valid(url: &str) -> bool {
    url.len() < MAX_URL_LENGTH
}

fn interpret_response(response: HttpResponse) -> Result<InstantiationResponse, WindshaftError> {
    if response.is_success() {
        let parsed: InstantiationResponse = serde_json::from_slice(&response.body)?;
        if parsed.has_errors() {
            return Err(WindshaftError::Service(get_errors_from_response(&parsed)));
        }

        return Ok(parsed);
    }

    match serde_json::from_slice::<InstantiationResponse>(&response.body) {
        Ok(parsed) if parsed.has_errors() => {
            Err(WindshaftError::Service(get_errors_from_response(&parsed)))
        }
        _ => Err(WindshaftError::Transport(format!(
            "unexpected response status {}",
            response.status
        ))),
    }
}
