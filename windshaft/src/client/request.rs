use serde::Serialize;
use windshaft_types::MapDefinition;

use crate::client::encoding::QueryParams;

/// Instantiation request: a map definition together with the extra request parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Map definition to instantiate.
    pub payload: MapDefinition,
    /// Additional parameters (`api_key`, `auth_token`, ...).
    pub params: QueryParams,
}

impl Request {
    /// Creates a new request.
    pub fn new(payload: MapDefinition, params: QueryParams) -> Self {
        Self { payload, params }
    }

    /// Key identifying equal requests. Two requests are equal if their payloads and params
    /// serialize identically.
    pub fn key(&self) -> String {
        // Serialization of plain data into a string cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use windshaft_types::LayerSpec;

    use super::*;

    #[test]
    fn equal_requests_have_equal_keys() {
        let a = Request::new(
            MapDefinition::new(vec![LayerSpec::mapnik("select 1", "#a {}")]),
            QueryParams::new().with("api_key", "k"),
        );
        let b = a.clone();
        let c = Request::new(a.payload.clone(), QueryParams::new().with("api_key", "other"));

        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }
}
