//! Normalization of the different error shapes returned by the service.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use windshaft_types::{ErrorWithContext, InstantiationResponse};

/// Part of the map definition an error refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ErrorOrigin {
    /// Error caused by a layer.
    Layer {
        /// Index of the layer in the layer group.
        index: Option<usize>,
        /// Id of the layer.
        id: Option<String>,
    },
    /// Error caused by an analysis node.
    Analysis {
        /// Id of the failing node.
        node_id: String,
    },
    /// Error caused by a dataview.
    Dataview {
        /// Id of the dataview.
        id: String,
    },
    /// Error not attributed to any part of the definition.
    Unknown,
}

/// Error reported by the Maps API, in uniform shape regardless of how the service
/// formatted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapsApiError {
    /// Human readable message.
    pub message: String,
    /// Error category (`layer`, `analysis`, `limit`, ...), `unknown` if not given.
    pub error_type: String,
    /// Finer grained category.
    pub subtype: Option<String>,
    /// What caused the error.
    pub origin: ErrorOrigin,
    /// Original error entry as returned by the service.
    pub context: Option<Value>,
}

impl MapsApiError {
    /// Creates an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: "unknown".to_string(),
            subtype: None,
            origin: ErrorOrigin::Unknown,
            context: None,
        }
    }

    /// Creates an error from an `errors_with_context` entry.
    pub fn from_context(error: &ErrorWithContext) -> Self {
        let origin = if let Some(layer) = &error.layer {
            ErrorOrigin::Layer {
                index: layer.index,
                id: layer.id.clone(),
            }
        } else if let Some(node_id) = error.analysis.as_ref().and_then(|a| a.node_id.clone()) {
            ErrorOrigin::Analysis { node_id }
        } else if let Some(id) = error.dataview.as_ref().and_then(|d| d.id.clone()) {
            ErrorOrigin::Dataview { id }
        } else {
            ErrorOrigin::Unknown
        };

        Self {
            message: error.message.clone(),
            error_type: error
                .error_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            subtype: error.subtype.clone(),
            origin,
            context: serde_json::to_value(error).ok(),
        }
    }

    /// Returns true if the error is caused by a layer.
    pub fn is_layer_error(&self) -> bool {
        matches!(self.origin, ErrorOrigin::Layer { .. })
    }

    /// Returns true if the error is caused by an analysis node.
    pub fn is_analysis_error(&self) -> bool {
        matches!(self.origin, ErrorOrigin::Analysis { .. })
    }
}

impl fmt::Display for MapsApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.error_type, self.message)
    }
}

/// Extracts the errors from a service response.
///
/// `errors_with_context` takes precedence and every entry becomes an error. Otherwise only the
/// first of the plain `errors` is used. A response without error fields yields no errors.
pub fn get_errors_from_response(response: &InstantiationResponse) -> Vec<MapsApiError> {
    if let Some(errors) = &response.errors_with_context {
        return errors.iter().map(MapsApiError::from_context).collect();
    }

    if let Some(errors) = &response.errors {
        return errors
            .first()
            .map(|message| vec![MapsApiError::new(message.clone())])
            .unwrap_or_default();
    }

    vec![]
}
