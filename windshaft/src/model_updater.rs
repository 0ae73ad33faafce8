//! Application of instantiation results to the client-side models.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;
use windshaft_types::{AnalysisNodeMetadata, InstantiationResponse, ResponseMetadata};

use crate::client::{ErrorOrigin, MapsApiError};
use crate::error::WindshaftError;
use crate::layer_group::model::{LayerGroupModel, UrlSettings};
use crate::model::{LayerMeta, ModelSnapshot, VisModel};

/// Slot holding the model of the current layer group, if any.
pub type LayerGroupModelSlot = Arc<RwLock<Option<Arc<LayerGroupModel>>>>;

/// Updates layers, dataviews, analysis nodes and the layer group model with the results of
/// an instantiation.
///
/// A successful response is either applied completely or not at all: the response is checked
/// to contain everything the models need before any of them is touched.
#[derive(Debug)]
pub struct ModelUpdater {
    vis_model: Arc<VisModel>,
    layer_group_model: LayerGroupModelSlot,
    url_settings: UrlSettings,
}

impl ModelUpdater {
    /// Creates a new updater.
    pub fn new(
        vis_model: Arc<VisModel>,
        layer_group_model: LayerGroupModelSlot,
        url_settings: UrlSettings,
    ) -> Self {
        Self {
            vis_model,
            layer_group_model,
            url_settings,
        }
    }

    /// Applies a successful response to the models of the snapshot the request was made
    /// with.
    ///
    /// If the response lacks any of the information the models need, nothing is changed, the
    /// visualization is set into the error state and [`WindshaftError::MalformedResponse`] is
    /// returned.
    pub fn update_models(
        &self,
        snapshot: &ModelSnapshot,
        response: &InstantiationResponse,
    ) -> Result<(), WindshaftError> {
        let validated = match self.validate(snapshot, response) {
            Ok(validated) => validated,
            Err(err) => {
                warn!("Failed to apply instantiation response: {err}");
                self.vis_model
                    .set_error(vec![MapsApiError::new(err.to_string())]);
                return Err(err);
            }
        };

        for (index, (layer, metadata)) in snapshot
            .layers
            .iter()
            .zip(&validated.metadata.layers)
            .enumerate()
        {
            layer.set_meta(LayerMeta {
                cartocss: metadata.meta.cartocss.clone(),
                index,
                layer_type: metadata.layer_type.clone(),
                stats: metadata.meta.stats.clone(),
            });
        }

        for (dataview, url) in snapshot.dataviews.iter().zip(validated.dataview_urls) {
            dataview.set_url(url);
        }

        for (node, metadata) in snapshot.analyses.iter().zip(validated.analysis_nodes) {
            node.set_metadata(metadata, self.url_settings.is_secure);
        }

        debug!(
            "Layer group {} instantiated with {} layers",
            validated.model.layergroupid(),
            snapshot.layers.len()
        );
        *self.layer_group_model.write() = Some(Arc::new(validated.model));
        self.vis_model.set_ok();

        Ok(())
    }

    /// Reports the errors of a failed instantiation.
    ///
    /// The visualization is set into the error state and every error caused by a specific
    /// layer, dataview or analysis node is also set to that model. Metadata of the last
    /// successful instantiation is kept.
    pub fn set_errors(&self, snapshot: &ModelSnapshot, errors: &[MapsApiError]) {
        self.vis_model.set_error(errors.to_vec());

        for error in errors {
            match &error.origin {
                ErrorOrigin::Layer { index, id } => {
                    let layer = id
                        .as_ref()
                        .and_then(|id| snapshot.layers.iter().find(|layer| layer.id() == *id))
                        .or_else(|| index.and_then(|index| snapshot.layers.get(index)));
                    if let Some(layer) = layer {
                        layer.set_error(error.clone());
                    }
                }
                ErrorOrigin::Analysis { node_id } => {
                    if let Some(node) = snapshot.analyses.iter().find(|n| n.id() == *node_id) {
                        node.set_error(error.clone());
                    }
                }
                ErrorOrigin::Dataview { id } => {
                    if let Some(dataview) = snapshot.dataviews.iter().find(|d| d.id() == *id) {
                        dataview.set_error(error.clone());
                    }
                }
                ErrorOrigin::Unknown => {}
            }
        }
    }

    fn validate<'a>(
        &self,
        snapshot: &ModelSnapshot,
        response: &'a InstantiationResponse,
    ) -> Result<ValidatedResponse<'a>, WindshaftError> {
        let model = LayerGroupModel::from_response(response, &snapshot.layers, &self.url_settings)?;
        let metadata = response
            .metadata
            .as_ref()
            .ok_or_else(|| malformed("response has no metadata"))?;

        if metadata.layers.len() < snapshot.layers.len() {
            return Err(malformed(format!(
                "response has metadata for {} layers, but {} were requested",
                metadata.layers.len(),
                snapshot.layers.len()
            )));
        }

        let dataview_urls = snapshot
            .dataviews
            .iter()
            .map(|dataview| {
                let id = dataview.id();
                metadata
                    .dataviews
                    .get(&id)
                    .and_then(|entry| entry.url.select(self.url_settings.is_secure))
                    .map(str::to_string)
                    .ok_or_else(|| malformed(format!("response has no url for dataview {id}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let analysis_nodes = snapshot
            .analyses
            .iter()
            .map(|node| {
                let id = node.id();
                metadata
                    .analyses
                    .iter()
                    .find_map(|analysis| analysis.nodes.get(&id))
                    .ok_or_else(|| malformed(format!("response has no analysis node {id}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedResponse {
            model,
            metadata,
            dataview_urls,
            analysis_nodes,
        })
    }
}

struct ValidatedResponse<'a> {
    model: LayerGroupModel,
    metadata: &'a ResponseMetadata,
    dataview_urls: Vec<String>,
    analysis_nodes: Vec<&'a AnalysisNodeMetadata>,
}

fn malformed(message: impl Into<String>) -> WindshaftError {
    WindshaftError::MalformedResponse(message.into())
}
