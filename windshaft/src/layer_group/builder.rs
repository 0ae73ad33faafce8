use std::sync::Arc;
use std::time::Duration;

use super::model::UrlSettings;
use super::LayerGroup;
use crate::client::{ClientSettings, MapsApiClient, QueryParams, MAP_INSTANTIATION_LIMIT};
use crate::error::WindshaftError;
use crate::model::{AnalysisNode, CartoLayer, Dataview, VisModel};
use crate::platform::native::DEFAULT_TIMEOUT;
use crate::platform::{HttpTransport, ReqwestTransport};

/// Constructor for a [`LayerGroup`].
///
/// ```ignore
/// use windshaft::{CartoLayer, LayerGroupBuilder};
///
/// let layer_group = LayerGroupBuilder::new()
///     .with_url_template("https://{user}.carto.com")
///     .with_user_name("acme")
///     .with_api_key("default_public")
///     .with_layer(CartoLayer::mapnik(
///         "select * from populated_places",
///         "#layer { marker-fill: #f60; }",
///     ))
///     .build()?;
/// # Ok::<(), windshaft::WindshaftError>(())
/// ```
pub struct LayerGroupBuilder {
    url_template: Option<String>,
    user_name: Option<String>,
    template_name: Option<String>,
    api_key: Option<String>,
    auth_tokens: Vec<String>,
    instantiation_limit: u32,
    timeout: Duration,
    transport: Option<Arc<dyn HttpTransport>>,
    vis_model: Option<Arc<VisModel>>,
    layers: Vec<CartoLayer>,
    dataviews: Vec<Dataview>,
    analyses: Vec<AnalysisNode>,
}

impl Default for LayerGroupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerGroupBuilder {
    /// Initializes an empty builder.
    pub fn new() -> Self {
        Self {
            url_template: None,
            user_name: None,
            template_name: None,
            api_key: None,
            auth_tokens: vec![],
            instantiation_limit: MAP_INSTANTIATION_LIMIT,
            timeout: DEFAULT_TIMEOUT,
            transport: None,
            vis_model: None,
            layers: vec![],
            dataviews: vec![],
            analyses: vec![],
        }
    }

    /// Url of the service. `{user}` placeholder is replaced with the user name.
    pub fn with_url_template(mut self, url_template: impl Into<String>) -> Self {
        self.url_template = Some(url_template.into());
        self
    }

    /// Name of the account the maps belong to.
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    /// Instantiates the named map with the given template instead of an anonymous map.
    pub fn with_template_name(mut self, template_name: impl Into<String>) -> Self {
        self.template_name = Some(template_name.into());
        self
    }

    /// Api key sent with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Auth token of a named map. Can be called several times to add more tokens.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_tokens.push(token.into());
        self
    }

    /// How many times the same definition can be instantiated with the same outcome.
    pub fn with_instantiation_limit(mut self, limit: u32) -> Self {
        self.instantiation_limit = limit;
        self
    }

    /// Timeout of the requests to the service. Ignored if a custom transport is set.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Uses the given transport instead of the default [`ReqwestTransport`].
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Shares the visualization state with the application.
    pub fn with_vis_model(mut self, vis_model: Arc<VisModel>) -> Self {
        self.vis_model = Some(vis_model);
        self
    }

    /// Adds a layer.
    pub fn with_layer(mut self, layer: CartoLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Adds a dataview.
    pub fn with_dataview(mut self, dataview: Dataview) -> Self {
        self.dataviews.push(dataview);
        self
    }

    /// Adds an analysis node.
    pub fn with_analysis(mut self, node: AnalysisNode) -> Self {
        self.analyses.push(node);
        self
    }

    /// Consumes the builder and constructs the layer group.
    ///
    /// Returns an error if the url template or the user name is not set, or if the default
    /// transport cannot be initialized. No requests are made until the layer group is
    /// attached to a view or reloaded.
    pub fn build(self) -> Result<LayerGroup, WindshaftError> {
        let settings = ClientSettings {
            url_template: self.url_template.unwrap_or_default(),
            user_name: self.user_name.unwrap_or_default(),
            template_name: self.template_name,
            instantiation_limit: self.instantiation_limit,
        };
        settings.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout)?),
        };
        let client = MapsApiClient::new(&settings, transport)?;

        let mut auth_params = QueryParams::new();
        if let Some(api_key) = self.api_key {
            auth_params.insert("api_key", api_key);
        }
        if !self.auth_tokens.is_empty() {
            auth_params.insert("auth_token", self.auth_tokens);
        }

        let url_settings = UrlSettings {
            base_url: settings.base_url(),
            user_name: settings.user_name.clone(),
            is_secure: settings.is_secure(),
            auth_params,
        };

        Ok(LayerGroup::new(
            client,
            url_settings,
            self.vis_model.unwrap_or_default(),
            self.layers,
            self.dataviews,
            self.analyses,
        ))
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_compact_debug_snapshot;

    use super::*;
    use crate::tests::MockTransport;

    #[test]
    fn missing_options_fail_build() {
        let result = LayerGroupBuilder::new()
            .with_transport(MockTransport::new())
            .build()
            .map(|_| ());
        assert_compact_debug_snapshot!(result, @r#"Err(Configuration("client could not be initialized, the following options are missing: url_template, user_name"))"#);

        let result = LayerGroupBuilder::new()
            .with_url_template("https://{user}.carto.com")
            .build()
            .map(|_| ());
        assert_compact_debug_snapshot!(result, @r#"Err(Configuration("client could not be initialized, the following options are missing: user_name"))"#);
    }

    #[test]
    fn zero_limit_fails_build() {
        let result = LayerGroupBuilder::new()
            .with_url_template("https://{user}.carto.com")
            .with_user_name("acme")
            .with_instantiation_limit(0)
            .with_transport(MockTransport::new())
            .build()
            .map(|_| ());
        assert_compact_debug_snapshot!(result, @r#"Err(Configuration("instantiation limit must be greater than 0"))"#);
    }

    #[test]
    fn builds_with_default_transport() {
        let layer_group = LayerGroupBuilder::new()
            .with_url_template("https://{user}.carto.com")
            .with_user_name("acme")
            .with_layer(CartoLayer::mapnik("select 1", "#a {}"))
            .build()
            .unwrap();

        assert_eq!(layer_group.layers().len(), 1);
        assert!(layer_group.tile_url_template().is_none());
    }
}
