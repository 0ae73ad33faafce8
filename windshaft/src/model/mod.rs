//! Client-side models a layer group is built from and that are updated with the results of
//! each instantiation.

use windshaft_types::MapDefinition;

pub mod analysis;
pub mod attribution;
pub mod collection;
pub mod dataview;
pub mod layer;
pub mod vis_model;

pub use analysis::AnalysisNode;
pub use attribution::Attribution;
pub use collection::Collection;
pub use dataview::Dataview;
pub use layer::{CartoLayer, Layer, LayerMeta};
pub use vis_model::{VisModel, VisRequest, VisState};

/// State of the collections at the moment an instantiation was requested.
///
/// The response to the request is applied to the models of the snapshot, not to the current
/// content of the collections, which may have changed while the request was in flight.
#[derive(Debug, Clone, Default)]
pub struct ModelSnapshot {
    /// Layers in layer group order.
    pub layers: Vec<CartoLayer>,
    /// Dataviews.
    pub dataviews: Vec<Dataview>,
    /// Analysis nodes.
    pub analyses: Vec<AnalysisNode>,
}

impl ModelSnapshot {
    /// Map definition describing the snapshot.
    pub fn to_definition(&self) -> MapDefinition {
        let mut definition =
            MapDefinition::new(self.layers.iter().map(CartoLayer::to_spec).collect());
        definition.dataviews = self
            .dataviews
            .iter()
            .map(|dataview| (dataview.id(), dataview.to_spec()))
            .collect();
        definition.analyses = self.analyses.iter().map(AnalysisNode::to_spec).collect();

        definition
    }
}
