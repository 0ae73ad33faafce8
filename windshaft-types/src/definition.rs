//! Map definition submitted to the service.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version of the layer group configuration format produced by this crate.
pub const MAP_CONFIG_VERSION: &str = "1.3.0";

/// CartoCSS version sent with every styled layer.
pub const CARTOCSS_VERSION: &str = "2.1.1";

/// Layer group configuration.
///
/// A definition is a snapshot: it is built from the current state of the client-side
/// collections right before an instantiation attempt and is not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDefinition {
    /// Configuration format version.
    pub version: String,
    /// Layers in rendering order. The position of a layer is its index in the layer group.
    pub layers: Vec<LayerSpec>,
    /// Dataviews keyed by their id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dataviews: BTreeMap<String, DataviewSpec>,
    /// Analysis trees.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analyses: Vec<AnalysisSpec>,
}

impl MapDefinition {
    /// Creates a definition with the given layers and no dataviews or analyses.
    pub fn new(layers: Vec<LayerSpec>) -> Self {
        Self {
            version: MAP_CONFIG_VERSION.to_string(),
            layers,
            dataviews: BTreeMap::new(),
            analyses: Vec::new(),
        }
    }
}

impl Default for MapDefinition {
    fn default() -> Self {
        Self::new(vec![])
    }
}

/// Kind of a layer as understood by the service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    /// Server-rendered layer styled with CartoCSS. Can be rendered into PNG tiles and has
    /// interactivity grids and attributes.
    Mapnik,
    /// Animated layer rendered on the client from data cubes.
    Torque,
    /// Third party raster tiles proxied by the service.
    Http,
    /// Solid color or image background.
    Plain,
}

impl LayerType {
    /// Parses the type tag used in response metadata. Legacy `cartodb` tag is an alias of
    /// `mapnik`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "mapnik" | "cartodb" => Some(Self::Mapnik),
            "torque" => Some(Self::Torque),
            "http" => Some(Self::Http),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }

    /// Type tag of the layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mapnik => "mapnik",
            Self::Torque => "torque",
            Self::Http => "http",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single layer of a [`MapDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Layer type tag.
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    /// Client-side id of the layer. Service errors reference layers by this id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Type specific options (`sql`, `cartocss`, `urlTemplate`, ...).
    pub options: Map<String, Value>,
}

impl LayerSpec {
    /// Mapnik layer rendering the result of `sql` with the `cartocss` style.
    pub fn mapnik(sql: impl Into<String>, cartocss: impl Into<String>) -> Self {
        let mut options = Map::new();
        options.insert(
            "cartocss_version".into(),
            Value::String(CARTOCSS_VERSION.into()),
        );
        options.insert("cartocss".into(), Value::String(cartocss.into()));
        options.insert("sql".into(), Value::String(sql.into()));

        Self {
            layer_type: LayerType::Mapnik,
            id: None,
            options,
        }
    }

    /// Sets the id of the layer.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Reference to an analysis node used as a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Id of the analysis node.
    pub id: String,
}

/// Dataview (aggregated data widget) of a [`MapDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataviewSpec {
    /// Dataview type: `histogram`, `category`, `formula`, `aggregation`...
    #[serde(rename = "type")]
    pub dataview_type: String,
    /// Analysis node the dataview aggregates.
    pub source: SourceRef,
    /// Type specific options.
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Analysis node of a [`MapDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSpec {
    /// Node id, unique within the definition.
    pub id: String,
    /// Analysis type: `source`, `buffer`, `trade-area`...
    #[serde(rename = "type")]
    pub analysis_type: String,
    /// Analysis parameters. Nested nodes appear here as `source` params.
    #[serde(default)]
    pub params: Map<String, Value>,
}
