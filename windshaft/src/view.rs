//! Interfaces between a [`LayerGroup`](crate::LayerGroup) and the rendering adapters of
//! specific map libraries.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::CartoLayer;

/// Urls a rendering adapter needs to draw the layer group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileUrls {
    /// Tile url templates, one per subdomain. Empty if there are no visible layers to render.
    pub tiles: Vec<String>,
    /// Interactivity grid url templates per subdomain, keyed by layer index. Only visible
    /// interactive layers have grids.
    pub grids: BTreeMap<usize, Vec<String>>,
}

/// Rendering of a layer group on a specific map widget.
///
/// Adapters implement this trait for every map library they support. The layer group calls
/// [`LayerGroupView::repaint`] every time the tile urls change.
pub trait LayerGroupView: Send + Sync {
    /// Redraws the layer group with new urls.
    fn repaint(&self, urls: &TileUrls);

    /// Removes the layer group from the map widget.
    fn remove(&self) {}
}

/// Kind of interaction with a feature.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FeatureEventKind {
    /// Pointer entered the feature.
    Over,
    /// Pointer left the feature.
    Out,
    /// Feature was clicked.
    Click,
}

/// Feature interaction as detected by a rendering adapter from the interactivity grids.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeatureEvent {
    /// Kind of the interaction.
    pub kind: FeatureEventKind,
    /// Index of the layer in the layer group.
    pub layer_index: usize,
    /// Geographic position of the pointer as `(lat, lng)`.
    pub position: Option<(f64, f64)>,
    /// Feature data from the grid.
    pub data: Value,
}

/// Feature interaction enriched with the layer the feature belongs to.
#[derive(Debug, Clone)]
pub struct FeatureEvent {
    /// Kind of the interaction.
    pub kind: FeatureEventKind,
    /// Layer of the feature.
    pub layer: CartoLayer,
    /// Index of the layer in the layer group.
    pub layer_index: usize,
    /// Geographic position of the pointer as `(lat, lng)`.
    pub position: Option<(f64, f64)>,
    /// Feature data from the grid.
    pub data: Value,
}
