//! Dataviews of a layer group.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use windshaft_types::{DataviewSpec, SourceRef};

use crate::client::MapsApiError;

#[derive(Debug)]
struct DataviewState {
    id: String,
    dataview_type: String,
    source_id: String,
    options: Map<String, Value>,
    url: Option<String>,
    error: Option<MapsApiError>,
}

/// Shared handle of a dataview: aggregated data (histogram, categories, ...) computed by the
/// service over the output of an analysis node.
///
/// Clones refer to the same dataview and compare equal.
#[derive(Debug, Clone)]
pub struct Dataview(Arc<RwLock<DataviewState>>);

impl Dataview {
    /// Creates a dataview of the given type over the node with `source_id`.
    pub fn new(
        id: impl Into<String>,
        dataview_type: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self(Arc::new(RwLock::new(DataviewState {
            id: id.into(),
            dataview_type: dataview_type.into(),
            source_id: source_id.into(),
            options: Map::new(),
            url: None,
            error: None,
        })))
    }

    /// Sets a type specific option, e.g. `column` or `bins`.
    pub fn with_option(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.write().options.insert(name.into(), value.into());
        self
    }

    /// Id of the dataview.
    pub fn id(&self) -> String {
        self.0.read().id.clone()
    }

    /// Url the dataview data can be fetched from, assigned by the last successful
    /// instantiation.
    pub fn url(&self) -> Option<String> {
        self.0.read().url.clone()
    }

    /// Error reported for this dataview in the last failed instantiation.
    pub fn error(&self) -> Option<MapsApiError> {
        self.0.read().error.clone()
    }

    /// Dataview definition as sent to the service.
    pub fn to_spec(&self) -> DataviewSpec {
        let state = self.0.read();
        DataviewSpec {
            dataview_type: state.dataview_type.clone(),
            source: SourceRef {
                id: state.source_id.clone(),
            },
            options: state.options.clone(),
        }
    }

    pub(crate) fn set_url(&self, url: String) {
        let mut state = self.0.write();
        state.url = Some(url);
        state.error = None;
    }

    pub(crate) fn set_error(&self, error: MapsApiError) {
        self.0.write().error = Some(error);
    }
}

impl PartialEq for Dataview {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Dataview {}
