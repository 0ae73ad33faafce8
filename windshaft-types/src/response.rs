//! Layer group instantiation response.
//!
//! All fields are optional at the deserialization level: the service answers with either the
//! success fields or the error fields, and checking that a successful response carries
//! everything the client relies on is left to the consumer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of the service to a layer group instantiation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstantiationResponse {
    /// Id of the created layer group. All tile urls are derived from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layergroupid: Option<String>,
    /// Last modification time of the data used by the layer group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Per-layer, per-dataview and per-analysis information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
    /// CDN hosts that should be used to request tiles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_url: Option<CdnUrl>,
    /// Plain error messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Errors with information about what part of the definition caused them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors_with_context: Option<Vec<ErrorWithContext>>,
}

impl InstantiationResponse {
    /// Returns true if the response carries any of the error fields.
    pub fn has_errors(&self) -> bool {
        self.errors.is_some() || self.errors_with_context.is_some()
    }
}

/// Metadata section of a successful response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// One entry per layer of the definition, in the same order.
    #[serde(default)]
    pub layers: Vec<LayerMetadata>,
    /// Dataview urls keyed by dataview id.
    #[serde(default)]
    pub dataviews: BTreeMap<String, DataviewMetadata>,
    /// Analysis trees with the state of their nodes.
    #[serde(default)]
    pub analyses: Vec<AnalysisMetadata>,
}

/// Metadata of a single layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMetadata {
    /// Type tag of the layer as the service sees it.
    #[serde(rename = "type")]
    pub layer_type: String,
    /// Id of the layer, if it was given in the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Rendering metadata.
    #[serde(default)]
    pub meta: LayerMeta,
}

/// Rendering metadata of a layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMeta {
    /// Style as interpreted by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cartocss: Option<String>,
    /// Rendering statistics.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub stats: Value,
}

/// Pair of urls of the same resource for plain and secure protocols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPair {
    /// Plain HTTP url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    /// HTTPS url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,
}

impl UrlPair {
    /// Returns the url for the requested protocol, falling back to the other one.
    pub fn select(&self, secure: bool) -> Option<&str> {
        let (preferred, fallback) = if secure {
            (&self.https, &self.http)
        } else {
            (&self.http, &self.https)
        };

        preferred.as_deref().or(fallback.as_deref())
    }
}

/// Metadata of a dataview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataviewMetadata {
    /// Url the dataview data can be fetched from.
    #[serde(default)]
    pub url: UrlPair,
}

/// Metadata of an analysis tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Nodes of the tree keyed by node id.
    #[serde(default)]
    pub nodes: BTreeMap<String, AnalysisNodeMetadata>,
}

/// State of a single analysis node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisNodeMetadata {
    /// Processing status: `pending`, `running`, `ready` or `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Url to poll the node status from.
    #[serde(default)]
    pub url: UrlPair,
    /// Query producing the node output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// CDN configuration of the layer group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdnUrl {
    /// CDN host for plain HTTP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    /// CDN host for HTTPS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,
    /// Subdomain-aware url templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<CdnTemplates>,
}

/// CDN url templates per protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdnTemplates {
    /// Template for plain HTTP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<CdnTemplate>,
    /// Template for HTTPS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<CdnTemplate>,
}

/// CDN url template with a `{s}` subdomain placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnTemplate {
    /// Url template, e.g. `https://{s}.cartocdn.net`.
    pub url: String,
    /// Values the `{s}` placeholder can take.
    #[serde(default)]
    pub subdomains: Vec<String>,
}

/// Error entry of `errors_with_context`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorWithContext {
    /// Error category: `layer`, `analysis`, `dataview`, `limit`, `unknown`...
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Finer grained category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Layer the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<ErrorLayerContext>,
    /// Analysis node the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ErrorAnalysisContext>,
    /// Dataview the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataview: Option<ErrorDataviewContext>,
    /// Any other fields of the entry.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Layer reference of an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLayerContext {
    /// Index of the layer in the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Id of the layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Type tag of the layer.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub layer_type: Option<String>,
}

/// Analysis reference of an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysisContext {
    /// Id of the analysis tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Id of the failing node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Additional details.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub context: Value,
}

/// Dataview reference of an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDataviewContext {
    /// Id of the dataview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_success_response() {
        let json = r##"{
            "layergroupid": "abc123:1500000000000",
            "metadata": {
                "layers": [
                    {"type": "mapnik", "id": "l1", "meta": {"stats": [], "cartocss": "#l {}"}},
                    {"type": "http", "meta": {}}
                ],
                "dataviews": {
                    "dv1": {"url": {"http": "http://h/dv1", "https": "https://h/dv1"}}
                },
                "analyses": [
                    {"nodes": {"a0": {"status": "ready", "url": {"https": "https://h/a0"}, "query": "select 1"}}}
                ]
            },
            "cdn_url": {
                "http": "ashbu.cartocdn.com",
                "https": "cartocdn-ashbu.global.ssl.fastly.net",
                "templates": {
                    "https": {"url": "https://{s}.cartocdn.net", "subdomains": ["a", "b"]}
                }
            },
            "last_updated": "2024-01-01T00:00:00.000Z"
        }"##;

        let response: InstantiationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.layergroupid.as_deref(),
            Some("abc123:1500000000000")
        );
        assert!(!response.has_errors());

        let metadata = response.metadata.unwrap();
        assert_eq!(metadata.layers.len(), 2);
        assert_eq!(metadata.layers[0].meta.cartocss.as_deref(), Some("#l {}"));
        assert_eq!(
            metadata.dataviews["dv1"].url.select(true),
            Some("https://h/dv1")
        );
        assert_eq!(
            metadata.analyses[0].nodes["a0"].url.select(false),
            Some("https://h/a0")
        );

        let templates = response.cdn_url.unwrap().templates.unwrap();
        assert!(templates.http.is_none());
        assert_eq!(templates.https.unwrap().subdomains, vec!["a", "b"]);
    }

    #[test]
    fn parse_error_response() {
        let json = r#"{
            "errors": ["syntax error at or near \"selec\""],
            "errors_with_context": [{
                "type": "layer",
                "subtype": "query",
                "message": "syntax error at or near \"selec\"",
                "layer": {"id": "l1", "index": 0, "type": "mapnik"},
                "http_status": 400
            }]
        }"#;

        let response: InstantiationResponse = serde_json::from_str(json).unwrap();
        assert!(response.has_errors());

        let error = &response.errors_with_context.unwrap()[0];
        assert_eq!(error.error_type.as_deref(), Some("layer"));
        assert_eq!(error.layer.as_ref().unwrap().index, Some(0));
        assert_eq!(error.extra["http_status"], 400);
    }
}
