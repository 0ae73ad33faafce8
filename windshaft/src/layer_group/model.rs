//! Urls derived from an instantiated layer group.

use windshaft_types::{CdnUrl, InstantiationResponse, LayerType};

use crate::client::{QueryParams, MAPS_API_BASE_URL};
use crate::error::WindshaftError;
use crate::model::CartoLayer;

const SUBDOMAIN_PLACEHOLDER: &str = "{s}";

/// Connection details used to build the urls of a layer group.
#[derive(Debug, Clone)]
pub struct UrlSettings {
    /// Base url of the service with the user name substituted.
    pub base_url: String,
    /// Account name, used as the path prefix on CDN hosts.
    pub user_name: String,
    /// Whether https urls should be preferred.
    pub is_secure: bool,
    /// Authentication parameters appended to every url.
    pub auth_params: QueryParams,
}

/// Layer group instantiated by the service.
///
/// The model is built from a single successful response and never changes afterwards. The
/// [`LayerGroup`](super::LayerGroup) replaces it as a whole after each instantiation.
///
/// Urls produced by the model may contain the `{s}` subdomain placeholder. Use
/// [`LayerGroupModel::with_subdomains`] to expand it.
#[derive(Debug, Clone)]
pub struct LayerGroupModel {
    layergroupid: String,
    last_updated: Option<String>,
    host: String,
    subdomains: Vec<String>,
    layers: Vec<CartoLayer>,
    layer_types: Vec<LayerType>,
    auth_query: String,
}

impl LayerGroupModel {
    /// Creates the model for the response to the request made with `layers`.
    pub fn from_response(
        response: &InstantiationResponse,
        layers: &[CartoLayer],
        settings: &UrlSettings,
    ) -> Result<Self, WindshaftError> {
        let layergroupid = response.layergroupid.clone().ok_or_else(|| {
            WindshaftError::MalformedResponse("response has no layergroupid".into())
        })?;
        let (host, subdomains) = host(response.cdn_url.as_ref(), settings);

        Ok(Self {
            layergroupid,
            last_updated: response.last_updated.clone(),
            host,
            subdomains,
            layers: layers.to_vec(),
            layer_types: layers.iter().map(CartoLayer::layer_type).collect(),
            auth_query: settings.auth_params.to_query_string(),
        })
    }

    /// Id of the layer group.
    pub fn layergroupid(&self) -> &str {
        &self.layergroupid
    }

    /// Last modification time of the data used by the layer group.
    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    /// Subdomains of the tile host. Empty if tiles are not served from a CDN with subdomains.
    pub fn subdomains(&self) -> &[String] {
        &self.subdomains
    }

    /// Layers the layer group was instantiated with, in layer group order.
    pub fn layers(&self) -> &[CartoLayer] {
        &self.layers
    }

    /// Layer at the given index of the layer group.
    pub fn layer_at(&self, index: usize) -> Option<&CartoLayer> {
        self.layers.get(index)
    }

    /// Url all the resources of the layer group are located under.
    pub fn base_url(&self) -> String {
        format!("{}/{MAPS_API_BASE_URL}/{}", self.host, self.layergroupid)
    }

    /// Tile url template rendering the layers with the given indexes, or `None` if there are
    /// no layers to render.
    pub fn tile_url_template(&self, layer_indexes: &[usize]) -> Option<String> {
        if layer_indexes.is_empty() {
            return None;
        }

        let indexes = layer_indexes
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Some(format!(
            "{}/{indexes}/{{z}}/{{x}}/{{y}}.png{}",
            self.base_url(),
            self.auth_query
        ))
    }

    /// Interactivity grid url template of the layer, or `None` if the layer is not rendered
    /// by the service.
    pub fn grid_url_template(&self, layer_index: usize) -> Option<String> {
        self.is_mapnik(layer_index).then(|| {
            format!(
                "{}/{layer_index}/{{z}}/{{x}}/{{y}}.grid.json{}",
                self.base_url(),
                self.auth_query
            )
        })
    }

    /// Url of the attributes of the feature with `feature_id` in the layer.
    pub fn attributes_url(&self, layer_index: usize, feature_id: &str) -> Option<String> {
        self.is_mapnik(layer_index).then(|| {
            format!(
                "{}/{layer_index}/attributes/{feature_id}{}",
                self.base_url(),
                self.auth_query
            )
        })
    }

    /// Expands the `{s}` placeholder of the url with every subdomain of the host.
    pub fn with_subdomains(&self, url: &str) -> Vec<String> {
        if self.subdomains.is_empty() {
            return vec![url.to_string()];
        }

        self.subdomains
            .iter()
            .map(|subdomain| url.replace(SUBDOMAIN_PLACEHOLDER, subdomain))
            .collect()
    }

    fn is_mapnik(&self, layer_index: usize) -> bool {
        self.layer_types.get(layer_index) == Some(&LayerType::Mapnik)
    }
}

fn host(cdn_url: Option<&CdnUrl>, settings: &UrlSettings) -> (String, Vec<String>) {
    let Some(cdn_url) = cdn_url else {
        return (settings.base_url.trim_end_matches('/').to_string(), vec![]);
    };

    let template = cdn_url.templates.as_ref().and_then(|templates| {
        if settings.is_secure {
            templates.https.as_ref()
        } else {
            templates.http.as_ref()
        }
    });
    if let Some(template) = template {
        return (
            format!(
                "{}/{}",
                template.url.trim_end_matches('/'),
                settings.user_name
            ),
            template.subdomains.clone(),
        );
    }

    let (protocol, cdn_host) = if settings.is_secure {
        ("https", cdn_url.https.as_ref())
    } else {
        ("http", cdn_url.http.as_ref())
    };
    match cdn_host {
        Some(cdn_host) => (
            format!("{protocol}://{cdn_host}/{}", settings.user_name),
            vec![],
        ),
        None => (settings.base_url.trim_end_matches('/').to_string(), vec![]),
    }
}
