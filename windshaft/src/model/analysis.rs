//! Analysis nodes feeding layers and dataviews.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use windshaft_types::{AnalysisNodeMetadata, AnalysisSpec};

use crate::client::MapsApiError;

#[derive(Debug)]
struct AnalysisState {
    id: String,
    analysis_type: String,
    params: Map<String, Value>,
    status: Option<String>,
    url: Option<String>,
    query: Option<String>,
    error: Option<MapsApiError>,
}

/// Shared handle of an analysis node.
///
/// Clones refer to the same node and compare equal.
#[derive(Debug, Clone)]
pub struct AnalysisNode(Arc<RwLock<AnalysisState>>);

impl AnalysisNode {
    /// Creates an analysis node of the given type without parameters.
    pub fn new(id: impl Into<String>, analysis_type: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(AnalysisState {
            id: id.into(),
            analysis_type: analysis_type.into(),
            params: Map::new(),
            status: None,
            url: None,
            query: None,
            error: None,
        })))
    }

    /// Source node reading the result of `query`.
    pub fn source(id: impl Into<String>, query: impl Into<String>) -> Self {
        let query: String = query.into();
        Self::new(id, "source").with_param("query", query)
    }

    /// Sets an analysis parameter.
    pub fn with_param(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.write().params.insert(name.into(), value.into());
        self
    }

    /// Id of the node.
    pub fn id(&self) -> String {
        self.0.read().id.clone()
    }

    /// Processing status reported by the service: `pending`, `running`, `ready` or `failed`.
    pub fn status(&self) -> Option<String> {
        self.0.read().status.clone()
    }

    /// Url to poll the node status from.
    pub fn url(&self) -> Option<String> {
        self.0.read().url.clone()
    }

    /// Query producing the node output.
    pub fn query(&self) -> Option<String> {
        self.0.read().query.clone()
    }

    /// Error reported for this node in the last failed instantiation.
    pub fn error(&self) -> Option<MapsApiError> {
        self.0.read().error.clone()
    }

    /// Analysis definition as sent to the service.
    pub fn to_spec(&self) -> AnalysisSpec {
        let state = self.0.read();
        AnalysisSpec {
            id: state.id.clone(),
            analysis_type: state.analysis_type.clone(),
            params: state.params.clone(),
        }
    }

    pub(crate) fn set_metadata(&self, metadata: &AnalysisNodeMetadata, secure: bool) {
        let mut state = self.0.write();
        state.status.clone_from(&metadata.status);
        state.url = metadata.url.select(secure).map(str::to_string);
        state.query.clone_from(&metadata.query);
        state.error = None;
    }

    pub(crate) fn set_error(&self, error: MapsApiError) {
        self.0.write().error = Some(error);
    }
}

impl PartialEq for AnalysisNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for AnalysisNode {}
