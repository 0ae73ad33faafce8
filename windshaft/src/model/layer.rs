//! [Layers](Layer) of a layer group.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use windshaft_types::{LayerSpec, LayerType, CARTOCSS_VERSION};

use crate::client::MapsApiError;
use crate::model::analysis::AnalysisNode;
use crate::model::attribution::Attribution;

/// Any layer a rendering adapter may hand over to a [`LayerGroup`](crate::LayerGroup).
///
/// Only [`CartoLayer`]s can be part of a layer group. The trait exists so that adapters can
/// keep layers of different kinds in one list, and the layer group can reject the ones it does
/// not support.
pub trait Layer: Send + Sync {
    /// Layers are passed around as trait objects. This method can be used to convert the
    /// trait object into the concrete type.
    fn as_any(&self) -> &dyn Any;
    /// Returns the attribution of the layer, if available.
    fn attribution(&self) -> Option<Attribution> {
        None
    }
}

/// Rendering metadata assigned to a layer by the last successful instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMeta {
    /// Style as interpreted by the service.
    pub cartocss: Option<String>,
    /// Index of the layer in the layer group.
    pub index: usize,
    /// Type of the layer as reported by the service.
    pub layer_type: String,
    /// Rendering statistics.
    pub stats: Value,
}

#[derive(Debug)]
struct LayerState {
    id: String,
    layer_type: LayerType,
    options: Map<String, Value>,
    attribution: Option<Attribution>,
    meta: Option<LayerMeta>,
    error: Option<MapsApiError>,
}

/// Shared handle of a layer rendered by the Maps API.
///
/// Cloning the handle does not clone the layer: all clones see the same metadata and errors,
/// and compare equal to each other.
#[derive(Debug, Clone)]
pub struct CartoLayer(Arc<RwLock<LayerState>>);

static NEXT_LAYER_ID: AtomicU32 = AtomicU32::new(0);

impl CartoLayer {
    fn new(layer_type: LayerType, options: Map<String, Value>) -> Self {
        let id = format!("layer{}", NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed));
        Self(Arc::new(RwLock::new(LayerState {
            id,
            layer_type,
            options,
            attribution: None,
            meta: None,
            error: None,
        })))
    }

    /// Server rendered layer drawing the result of `sql` with the `cartocss` style.
    pub fn mapnik(sql: impl Into<String>, cartocss: impl Into<String>) -> Self {
        Self::new(LayerType::Mapnik, styled_options(sql, cartocss))
    }

    /// Animated layer drawing the result of `sql`.
    pub fn torque(sql: impl Into<String>, cartocss: impl Into<String>) -> Self {
        Self::new(LayerType::Torque, styled_options(sql, cartocss))
    }

    /// Server rendered layer drawing the output of an analysis node.
    pub fn from_analysis(node: &AnalysisNode, cartocss: impl Into<String>) -> Self {
        let mut options = Map::new();
        options.insert("source".into(), serde_json::json!({ "id": node.id() }));
        options.insert("cartocss".into(), Value::String(cartocss.into()));
        options.insert(
            "cartocss_version".into(),
            Value::String(CARTOCSS_VERSION.into()),
        );

        Self::new(LayerType::Mapnik, options)
    }

    /// Third party raster tiles, e.g. a basemap. `url_template` may contain the `{s}`
    /// subdomain placeholder.
    pub fn http(url_template: impl Into<String>, subdomains: Vec<String>) -> Self {
        let mut options = Map::new();
        options.insert("urlTemplate".into(), Value::String(url_template.into()));
        if !subdomains.is_empty() {
            options.insert("subdomains".into(), subdomains.into());
        }

        Self::new(LayerType::Http, options)
    }

    /// Layer filled with a single color.
    pub fn plain(color: impl Into<String>) -> Self {
        let mut options = Map::new();
        options.insert("color".into(), Value::String(color.into()));

        Self::new(LayerType::Plain, options)
    }

    /// Replaces the generated id of the layer. Service errors reference layers by id.
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.0.write().id = id.into();
        self
    }

    /// Sets a layer option, e.g. `interactivity` or `attributes`.
    pub fn with_option(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.write().options.insert(name.into(), value.into());
        self
    }

    /// Sets the data source credit of the layer.
    pub fn with_attribution(self, attribution: Attribution) -> Self {
        self.0.write().attribution = Some(attribution);
        self
    }

    /// Id of the layer.
    pub fn id(&self) -> String {
        self.0.read().id.clone()
    }

    /// Type of the layer.
    pub fn layer_type(&self) -> LayerType {
        self.0.read().layer_type
    }

    /// Value of a layer option.
    pub fn option(&self, name: &str) -> Option<Value> {
        self.0.read().options.get(name).cloned()
    }

    /// Returns true if the layer has interactivity grids.
    pub fn is_interactive(&self) -> bool {
        let state = self.0.read();
        state.layer_type == LayerType::Mapnik && state.options.contains_key("interactivity")
    }

    /// Metadata of the last successful instantiation that included the layer.
    pub fn meta(&self) -> Option<LayerMeta> {
        self.0.read().meta.clone()
    }

    /// Error reported by the service for this layer in the last failed instantiation.
    pub fn error(&self) -> Option<MapsApiError> {
        self.0.read().error.clone()
    }

    /// Layer definition as sent to the service.
    pub fn to_spec(&self) -> LayerSpec {
        let state = self.0.read();
        LayerSpec {
            layer_type: state.layer_type,
            id: Some(state.id.clone()),
            options: state.options.clone(),
        }
    }

    pub(crate) fn set_meta(&self, meta: LayerMeta) {
        let mut state = self.0.write();
        state.meta = Some(meta);
        state.error = None;
    }

    pub(crate) fn set_error(&self, error: MapsApiError) {
        self.0.write().error = Some(error);
    }
}

impl PartialEq for CartoLayer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for CartoLayer {}

impl Layer for CartoLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn attribution(&self) -> Option<Attribution> {
        self.0.read().attribution.clone()
    }
}

fn styled_options(sql: impl Into<String>, cartocss: impl Into<String>) -> Map<String, Value> {
    LayerSpec::mapnik(sql, cartocss).options
}

#[cfg(test)]
mod tests {
    use insta::assert_compact_debug_snapshot;

    use super::*;

    #[test]
    fn clones_share_state() {
        let layer = CartoLayer::mapnik("select 1", "#a {}");
        let clone = layer.clone();
        layer.set_error(MapsApiError::new("boom"));

        assert_eq!(layer, clone);
        assert_ne!(layer, CartoLayer::mapnik("select 1", "#a {}"));
        assert_eq!(clone.error(), Some(MapsApiError::new("boom")));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = CartoLayer::plain("#fff");
        let b = CartoLayer::plain("#fff");
        assert_ne!(a.id(), b.id());
        assert!(a.id().starts_with("layer"));
    }

    #[test]
    fn new_meta_clears_error() {
        let layer = CartoLayer::mapnik("select 1", "#a {}");
        layer.set_error(MapsApiError::new("boom"));
        layer.set_meta(LayerMeta {
            cartocss: None,
            index: 0,
            layer_type: "mapnik".into(),
            stats: Value::Null,
        });

        assert!(layer.error().is_none());
        assert_eq!(layer.meta().map(|meta| meta.index), Some(0));
    }

    #[test]
    fn analysis_layer_spec() {
        let node = AnalysisNode::source("a0", "select * from t");
        let layer = CartoLayer::from_analysis(&node, "#a {}").with_id("l1");

        assert_compact_debug_snapshot!(
            serde_json::to_string(&layer.to_spec()).unwrap(),
            @r##""{\"type\":\"mapnik\",\"id\":\"l1\",\"options\":{\"cartocss\":\"#a {}\",\"cartocss_version\":\"2.1.1\",\"source\":{\"id\":\"a0\"}}}""##
        );
    }

    #[test]
    fn interactivity() {
        let layer = CartoLayer::mapnik("select 1", "#a {}");
        assert!(!layer.is_interactive());

        let layer = layer.with_option("interactivity", "cartodb_id");
        assert!(layer.is_interactive());
        assert!(!CartoLayer::http("https://{s}.tiles/{z}/{x}/{y}.png", vec![])
            .with_option("interactivity", "x")
            .is_interactive());
    }
}
