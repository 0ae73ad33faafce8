use std::fmt;

use quick_cache::unsync::Cache;
use serde::Serialize;

use crate::client::request::Request;

/// Maximum number of times the same map can be instantiated with the same outcome.
pub const MAP_INSTANTIATION_LIMIT: u32 = 3;

/// Number of distinct requests the tracker remembers.
pub const TRACKED_REQUESTS_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct TrackedRequest {
    count: u32,
    last_response: String,
}

/// Counts subsequent identical requests to stop runaway reload loops.
///
/// Every distinct request key is accounted independently. The counter of a key grows while
/// the service keeps answering it with the same response and restarts when the response
/// changes. Once it reaches the limit, [`RequestTracker::can_request_be_performed`] returns
/// false for that key. At most [`TRACKED_REQUESTS_CAPACITY`] keys are remembered, the least
/// used ones are evicted first.
pub struct RequestTracker {
    limit: u32,
    requests: Cache<String, TrackedRequest>,
}

impl fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTracker")
            .field("limit", &self.limit)
            .field("requests", &self.requests.len())
            .finish()
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new(MAP_INSTANTIATION_LIMIT)
    }
}

impl RequestTracker {
    /// Creates a tracker allowing `limit` identical requests.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            requests: Cache::new(TRACKED_REQUESTS_CAPACITY),
        }
    }

    /// Maximum number of identical requests.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns false if the request was already performed `limit` times.
    pub fn can_request_be_performed(&self, request: &Request) -> bool {
        self.requests
            .get(&request.key())
            .map_or(true, |tracked| tracked.count < self.limit)
    }

    /// Records that the request was performed and got `response`.
    pub fn track(&mut self, request: &Request, response: &impl Serialize) {
        let key = request.key();
        let last_response = serde_json::to_string(response).unwrap_or_default();

        let count = match self.requests.get(&key) {
            Some(tracked) if tracked.last_response == last_response => {
                (tracked.count + 1).min(self.limit)
            }
            _ => 1,
        };

        self.requests.insert(
            key,
            TrackedRequest {
                count,
                last_response,
            },
        );
    }

    /// Number of remembered requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns true if no request was tracked yet.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
