//! [`LayerGroup`] keeps a set of layers instantiated in the Maps API and the urls derived
//! from the instantiation up to date.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use windshaft_types::{InstantiationResponse, LayerType};

use crate::async_runtime;
use crate::client::{MapsApiClient, MapsApiError, QueryParams, Request};
use crate::error::WindshaftError;
use crate::events::{SubscriptionId, Subscribers};
use crate::model::{
    AnalysisNode, Attribution, CartoLayer, Collection, Dataview, Layer, ModelSnapshot, VisModel,
    VisRequest,
};
use crate::model_updater::{LayerGroupModelSlot, ModelUpdater};
use crate::view::{FeatureEvent, LayerGroupView, RawFeatureEvent, TileUrls};

mod builder;
pub mod model;

pub use builder::LayerGroupBuilder;
pub use model::{LayerGroupModel, UrlSettings};

type ReloadFuture = Shared<BoxFuture<'static, Result<(), WindshaftError>>>;

/// Instantiation state of a [`LayerGroup`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LayerGroupState {
    /// The layer group was never instantiated successfully and no request is in flight.
    Uninitialized,
    /// An instantiation request is in flight.
    Instantiating,
    /// The layer group was instantiated and its urls can be used.
    Active,
}

/// Layers, dataviews and analyses rendered together by the Maps API.
///
/// Every change of the content of the layer group (adding or removing a layer, dataview or
/// analysis) schedules a new instantiation. Only the last scheduled instantiation is applied:
/// starting a new one aborts the one in flight. Urls exposed by the layer group always belong
/// to the last successful instantiation. If an instantiation fails, the urls stay the same and
/// the errors are reported to the [`VisModel`].
///
/// Instantiations run on the tokio runtime, so the methods that schedule them must be called
/// within a runtime context.
///
/// The layer group is a cheap handle: clones refer to the same layer group.
#[derive(Clone)]
pub struct LayerGroup {
    inner: Arc<Inner>,
}

struct Inner {
    client: MapsApiClient,
    params: QueryParams,
    model_updater: ModelUpdater,
    layer_group_model: LayerGroupModelSlot,
    vis_model: Arc<VisModel>,
    layers: RwLock<Collection<CartoLayer>>,
    dataviews: RwLock<Collection<Dataview>>,
    analyses: RwLock<Collection<AnalysisNode>>,
    state: RwLock<LayerGroupState>,
    views: RwLock<Vec<Arc<dyn LayerGroupView>>>,
    pending_reload: Mutex<Option<ReloadFuture>>,
    feature_events: Subscribers<FeatureEvent>,
    vis_subscription: Mutex<Option<SubscriptionId>>,
}

impl fmt::Debug for LayerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerGroup")
            .field("client", &self.inner.client)
            .field("state", &self.state())
            .field("layers", &self.inner.layers.read().len())
            .finish()
    }
}

impl LayerGroup {
    pub(crate) fn new(
        client: MapsApiClient,
        url_settings: UrlSettings,
        vis_model: Arc<VisModel>,
        layers: Vec<CartoLayer>,
        dataviews: Vec<Dataview>,
        analyses: Vec<AnalysisNode>,
    ) -> Self {
        let layer_group_model = LayerGroupModelSlot::default();
        let params = url_settings.auth_params.clone();
        let model_updater =
            ModelUpdater::new(vis_model.clone(), layer_group_model.clone(), url_settings);

        let inner = Arc::new(Inner {
            client,
            params,
            model_updater,
            layer_group_model,
            vis_model,
            layers: RwLock::new(layers.into_iter().collect()),
            dataviews: RwLock::new(dataviews.into_iter().collect()),
            analyses: RwLock::new(analyses.into_iter().collect()),
            state: RwLock::new(LayerGroupState::Uninitialized),
            views: RwLock::new(vec![]),
            pending_reload: Mutex::new(None),
            feature_events: Subscribers::default(),
            vis_subscription: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = inner.vis_model.on_request(move |request| {
            let Some(inner) = weak.upgrade() else {
                return;
            };

            match request {
                VisRequest::Repaint => inner.repaint_views(),
                VisRequest::Reload => {
                    inner.schedule_reload();
                }
            }
        });
        *inner.vis_subscription.lock() = Some(subscription);

        Self { inner }
    }

    /// Current instantiation state.
    pub fn state(&self) -> LayerGroupState {
        *self.inner.state.read()
    }

    /// Visualization state the layer group reports to.
    pub fn vis_model(&self) -> Arc<VisModel> {
        self.inner.vis_model.clone()
    }

    /// Model of the last successful instantiation.
    pub fn layer_group_model(&self) -> Option<Arc<LayerGroupModel>> {
        self.inner.layer_group_model.read().clone()
    }

    /// Layers of the layer group in order.
    pub fn layers(&self) -> Vec<CartoLayer> {
        self.inner.layers.read().to_vec()
    }

    /// Dataviews of the layer group.
    pub fn dataviews(&self) -> Vec<Dataview> {
        self.inner.dataviews.read().to_vec()
    }

    /// Analysis nodes of the layer group.
    pub fn analyses(&self) -> Vec<AnalysisNode> {
        self.inner.analyses.read().to_vec()
    }

    /// Adds a layer to the end of the layer group and schedules a reload.
    ///
    /// Returns [`WindshaftError::TypeMismatch`] if the layer is not a [`CartoLayer`] and
    /// [`WindshaftError::Duplicate`] if it is already in the layer group.
    pub fn add_layer(&self, layer: &dyn Layer) -> Result<(), WindshaftError> {
        let layer = as_carto_layer(layer)?;
        {
            let mut layers = self.inner.layers.write();
            if layers.contains(&layer) {
                return Err(WindshaftError::Duplicate(format!("layer {}", layer.id())));
            }
            layers.push(layer);
        }

        self.inner.schedule_reload();
        Ok(())
    }

    /// Removes a layer from the layer group and schedules a reload.
    ///
    /// Returns [`WindshaftError::TypeMismatch`] if the layer is not a [`CartoLayer`] and
    /// [`WindshaftError::NotFound`] if it is not in the layer group.
    pub fn remove_layer(&self, layer: &dyn Layer) -> Result<(), WindshaftError> {
        let layer = as_carto_layer(layer)?;
        {
            let mut layers = self.inner.layers.write();
            let index = layers
                .position(&layer)
                .ok_or_else(|| WindshaftError::NotFound(format!("layer {}", layer.id())))?;
            layers.remove(index);
        }

        self.inner.schedule_reload();
        Ok(())
    }

    /// Shows a hidden layer. The layer group is not instantiated again, only the views are
    /// repainted.
    pub fn show_layer(&self, layer: &dyn Layer) -> Result<(), WindshaftError> {
        self.set_layer_visibility(layer, true)
    }

    /// Hides a layer. Hidden layers stay in the layer group but are not rendered.
    pub fn hide_layer(&self, layer: &dyn Layer) -> Result<(), WindshaftError> {
        self.set_layer_visibility(layer, false)
    }

    fn set_layer_visibility(&self, layer: &dyn Layer, visible: bool) -> Result<(), WindshaftError> {
        let layer = as_carto_layer(layer)?;
        {
            let mut layers = self.inner.layers.write();
            let index = layers
                .position(&layer)
                .ok_or_else(|| WindshaftError::NotFound(format!("layer {}", layer.id())))?;
            if visible {
                layers.show(index);
            } else {
                layers.hide(index);
            }
        }

        self.inner.repaint_views();
        Ok(())
    }

    /// Adds a dataview and schedules a reload.
    pub fn add_dataview(&self, dataview: Dataview) -> Result<(), WindshaftError> {
        {
            let mut dataviews = self.inner.dataviews.write();
            if dataviews.contains(&dataview) {
                return Err(WindshaftError::Duplicate(format!("dataview {}", dataview.id())));
            }
            dataviews.push(dataview);
        }

        self.inner.schedule_reload();
        Ok(())
    }

    /// Removes a dataview and schedules a reload.
    pub fn remove_dataview(&self, dataview: &Dataview) -> Result<(), WindshaftError> {
        {
            let mut dataviews = self.inner.dataviews.write();
            let index = dataviews.position(dataview).ok_or_else(|| {
                WindshaftError::NotFound(format!("dataview {}", dataview.id()))
            })?;
            dataviews.remove(index);
        }

        self.inner.schedule_reload();
        Ok(())
    }

    /// Adds an analysis node and schedules a reload.
    pub fn add_analysis(&self, node: AnalysisNode) -> Result<(), WindshaftError> {
        {
            let mut analyses = self.inner.analyses.write();
            if analyses.contains(&node) {
                return Err(WindshaftError::Duplicate(format!("analysis {}", node.id())));
            }
            analyses.push(node);
        }

        self.inner.schedule_reload();
        Ok(())
    }

    /// Removes an analysis node and schedules a reload.
    pub fn remove_analysis(&self, node: &AnalysisNode) -> Result<(), WindshaftError> {
        {
            let mut analyses = self.inner.analyses.write();
            let index = analyses
                .position(node)
                .ok_or_else(|| WindshaftError::NotFound(format!("analysis {}", node.id())))?;
            analyses.remove(index);
        }

        self.inner.schedule_reload();
        Ok(())
    }

    /// Instantiates the layer group with its current content.
    ///
    /// The request is started immediately, aborting any reload in flight. The returned future
    /// does not need to be polled for the reload to complete. It resolves to
    /// [`WindshaftError::Aborted`] if another reload was started before this one completed.
    pub fn reload(&self) -> impl Future<Output = Result<(), WindshaftError>> + Send + 'static {
        self.inner.reload()
    }

    /// Waits until the most recently scheduled reload completes and returns its result.
    ///
    /// Returns immediately if no reload was ever scheduled.
    pub async fn settled(&self) -> Result<(), WindshaftError> {
        loop {
            let pending = self.inner.pending_reload.lock().clone();
            let Some(pending) = pending else {
                return Ok(());
            };

            let result = pending.clone().await;
            let is_latest = self
                .inner
                .pending_reload
                .lock()
                .as_ref()
                .map_or(true, |latest| latest.ptr_eq(&pending));
            if is_latest {
                return result;
            }
        }
    }

    /// Attaches a view. If the layer group is already instantiated the view is repainted
    /// immediately, otherwise the first instantiation is scheduled.
    pub fn add_to(&self, view: Arc<dyn LayerGroupView>) {
        self.inner.views.write().push(view.clone());

        match self.state() {
            LayerGroupState::Active => {
                if let Some(urls) = self.inner.tile_urls() {
                    view.repaint(&urls);
                }
            }
            LayerGroupState::Uninitialized => {
                self.inner.schedule_reload();
            }
            LayerGroupState::Instantiating => {}
        }
    }

    /// Aborts the instantiation in flight and detaches all views.
    pub fn teardown(&self) {
        self.inner.client.abort();
        *self.inner.pending_reload.lock() = None;
        self.inner.settle_state();

        let views = std::mem::take(&mut *self.inner.views.write());
        for view in views {
            view.remove();
        }
    }

    /// Tile url template of the visible layers, or `None` if the layer group is not
    /// instantiated or nothing is visible.
    pub fn tile_url_template(&self) -> Option<String> {
        self.tile_url_templates_with_subdomains().into_iter().next()
    }

    /// Tile url templates of the visible layers, one per subdomain of the tile host.
    pub fn tile_url_templates_with_subdomains(&self) -> Vec<String> {
        self.inner
            .tile_urls()
            .map(|urls| urls.tiles)
            .unwrap_or_default()
    }

    /// Interactivity grid url templates of the layer, one per subdomain of the tile host.
    /// Empty if the layer is not rendered by the service.
    pub fn grid_url_templates_with_subdomains(&self, layer_index: usize) -> Vec<String> {
        let Some(model) = self.layer_group_model() else {
            return vec![];
        };

        model
            .grid_url_template(layer_index)
            .map(|template| model.with_subdomains(&template))
            .unwrap_or_default()
    }

    /// Loads the attributes of a feature of the layer.
    pub fn fetch_attributes(
        &self,
        layer_index: usize,
        feature_id: impl fmt::Display,
    ) -> BoxFuture<'static, Result<Value, WindshaftError>> {
        let url = self.layer_group_model().and_then(|model| {
            model
                .attributes_url(layer_index, &feature_id.to_string())
                .and_then(|url| model.with_subdomains(&url).into_iter().next())
        });

        match url {
            Some(url) => self.inner.client.fetch_json(url),
            None => future::ready(Err(WindshaftError::NotFound(format!(
                "layer {layer_index} has no attributes"
            ))))
            .boxed(),
        }
    }

    /// Layer at the given index of the last successful instantiation.
    pub fn layer_in_layer_group_at(&self, index: usize) -> Option<CartoLayer> {
        self.layer_group_model()
            .and_then(|model| model.layer_at(index).cloned())
    }

    /// Attributions of the visible layers, without duplicates.
    pub fn attributions(&self) -> Vec<Attribution> {
        let mut attributions: Vec<Attribution> = vec![];
        for attribution in self
            .inner
            .layers
            .read()
            .iter_visible()
            .filter_map(|layer| layer.attribution())
        {
            if !attributions.contains(&attribution) {
                attributions.push(attribution);
            }
        }

        attributions
    }

    /// Republishes a feature interaction detected by a rendering adapter, enriched with the
    /// layer the feature belongs to.
    ///
    /// Returns false if there is no layer with the index of the event.
    pub fn forward_feature_event(&self, event: RawFeatureEvent) -> bool {
        let Some(layer) = self.layer_in_layer_group_at(event.layer_index) else {
            warn!(
                "Ignoring {:?} event of unknown layer {}",
                event.kind, event.layer_index
            );
            return false;
        };

        self.inner.feature_events.publish(&FeatureEvent {
            kind: event.kind,
            layer,
            layer_index: event.layer_index,
            position: event.position,
            data: event.data,
        });
        true
    }

    /// Subscribes to the feature interactions.
    pub fn on_feature_event(
        &self,
        listener: impl Fn(&FeatureEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.feature_events.subscribe(listener)
    }

    /// Removes a listener added with [`LayerGroup::on_feature_event`].
    pub fn unsubscribe_feature_event(&self, id: SubscriptionId) -> bool {
        self.inner.feature_events.unsubscribe(id)
    }
}

impl Inner {
    fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            layers: self.layers.read().to_vec(),
            dataviews: self.dataviews.read().to_vec(),
            analyses: self.analyses.read().to_vec(),
        }
    }

    fn schedule_reload(self: &Arc<Self>) {
        let _ = self.reload();
    }

    fn reload(self: &Arc<Self>) -> ReloadFuture {
        let reload = self.start_reload().boxed().shared();
        *self.pending_reload.lock() = Some(reload.clone());
        async_runtime::spawn(reload.clone());

        reload
    }

    fn start_reload(
        self: &Arc<Self>,
    ) -> impl Future<Output = Result<(), WindshaftError>> + Send + 'static {
        let snapshot = self.snapshot();
        let request = Request::new(snapshot.to_definition(), self.params.clone());

        info!(
            "Instantiating layer group with {} layers",
            snapshot.layers.len()
        );
        *self.state.write() = LayerGroupState::Instantiating;
        let response = self.client.perform_request(request);

        let inner = Arc::downgrade(self);
        async move {
            let result = response.await;
            match inner.upgrade() {
                Some(inner) => inner.apply(&snapshot, result),
                None => Err(WindshaftError::Aborted),
            }
        }
    }

    fn apply(
        &self,
        snapshot: &ModelSnapshot,
        result: Result<InstantiationResponse, WindshaftError>,
    ) -> Result<(), WindshaftError> {
        match result {
            Ok(response) => {
                let updated = self.model_updater.update_models(snapshot, &response);
                self.settle_state();
                if updated.is_ok() {
                    self.repaint_views();
                }

                updated
            }
            Err(WindshaftError::Aborted) => {
                debug!("Instantiation request was superseded");
                Err(WindshaftError::Aborted)
            }
            Err(WindshaftError::Service(errors)) => {
                warn!("Layer group instantiation failed with {} errors", errors.len());
                self.model_updater.set_errors(snapshot, &errors);
                self.settle_state();
                Err(WindshaftError::Service(errors))
            }
            Err(err) => {
                warn!("Layer group instantiation failed: {err}");
                self.vis_model
                    .set_error(vec![MapsApiError::new(err.to_string())]);
                self.settle_state();
                Err(err)
            }
        }
    }

    fn settle_state(&self) {
        let state = if self.layer_group_model.read().is_some() {
            LayerGroupState::Active
        } else {
            LayerGroupState::Uninitialized
        };
        *self.state.write() = state;
    }

    fn tile_urls(&self) -> Option<TileUrls> {
        let model = self.layer_group_model.read().clone()?;
        let layers = self.layers.read();

        let visible: Vec<(usize, &CartoLayer)> = model
            .layers()
            .iter()
            .enumerate()
            .filter(|(_, layer)| {
                layer.layer_type() == LayerType::Mapnik && layers.is_item_visible(layer)
            })
            .collect();

        let indexes: Vec<usize> = visible.iter().map(|(index, _)| *index).collect();
        let tiles = model
            .tile_url_template(&indexes)
            .map(|template| model.with_subdomains(&template))
            .unwrap_or_default();
        let grids = visible
            .iter()
            .filter(|(_, layer)| layer.is_interactive())
            .filter_map(|(index, _)| {
                model
                    .grid_url_template(*index)
                    .map(|template| (*index, model.with_subdomains(&template)))
            })
            .collect();

        Some(TileUrls { tiles, grids })
    }

    fn repaint_views(&self) {
        let Some(urls) = self.tile_urls() else {
            return;
        };

        let views = self.views.read().clone();
        for view in views {
            view.repaint(&urls);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(id) = self.vis_subscription.get_mut().take() {
            self.vis_model.unsubscribe_request(id);
        }
    }
}

fn as_carto_layer(layer: &dyn Layer) -> Result<CartoLayer, WindshaftError> {
    layer
        .as_any()
        .downcast_ref::<CartoLayer>()
        .cloned()
        .ok_or_else(|| {
            WindshaftError::TypeMismatch("only CartoLayer can be added to a layer group".into())
        })
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::model::VisState;
    use crate::tests::{layer_group, success_body, MockTransport, RecordingView};
    use crate::view::FeatureEventKind;

    struct ForeignLayer;

    impl Layer for ForeignLayer {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[tokio::test]
    async fn successful_reload_updates_tile_template() {
        let transport = MockTransport::new();
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);
        assert_eq!(group.state(), LayerGroupState::Uninitialized);

        transport.reply_json(200, success_body("lg1", 1));
        group.reload().await.unwrap();

        assert_eq!(group.state(), LayerGroupState::Active);
        assert_eq!(
            group.tile_url_template().as_deref(),
            Some("https://acme.example.com/api/v1/map/lg1/0/{z}/{x}/{y}.png?api_key=secret")
        );
        assert!(transport.requests()[0]
            .url()
            .starts_with("https://acme.example.com/api/v1/map?config="));
        assert!(transport.requests()[0].url().ends_with("&api_key=secret"));
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_urls() {
        let transport = MockTransport::new();
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);

        transport.reply_json(200, success_body("lg1", 1));
        group.reload().await.unwrap();
        let before = group.tile_url_template();

        transport.reply_json(
            400,
            json!({"errors": ["syntax error"], "errors_with_context": [
                {"type": "layer", "message": "syntax error", "layer": {"index": 0}}
            ]}),
        );
        let result = group.reload().await;

        assert_matches!(result, Err(WindshaftError::Service(_)));
        assert_eq!(group.tile_url_template(), before);
        assert_eq!(group.state(), LayerGroupState::Active);
        assert_matches!(group.vis_model().state(), VisState::Error(errors) if errors.len() == 1);
        assert_eq!(
            group.layers()[0].error().map(|error| error.message),
            Some("syntax error".to_string())
        );
        assert!(group.layers()[0].meta().is_some());
    }

    #[tokio::test]
    async fn failed_first_reload_returns_to_uninitialized() {
        let transport = MockTransport::new();
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);

        transport.reply(Err(WindshaftError::Transport("connection refused".into())));
        let result = group.reload().await;

        assert_matches!(result, Err(WindshaftError::Transport(_)));
        assert_eq!(group.state(), LayerGroupState::Uninitialized);
        assert!(group.tile_url_template().is_none());
        assert!(!group.vis_model().is_ok());
    }

    #[tokio::test]
    async fn foreign_layers_are_rejected() {
        let transport = MockTransport::new();
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);

        assert_matches!(
            group.add_layer(&ForeignLayer),
            Err(WindshaftError::TypeMismatch(_))
        );
        assert_matches!(
            group.remove_layer(&ForeignLayer),
            Err(WindshaftError::TypeMismatch(_))
        );
        assert_eq!(group.layers().len(), 1);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn duplicate_and_unknown_layers() {
        let transport = MockTransport::new();
        let layer = CartoLayer::mapnik("select 1", "#a {}");
        let group = layer_group(transport.clone(), vec![layer.clone()]);

        assert_matches!(group.add_layer(&layer), Err(WindshaftError::Duplicate(_)));
        assert_matches!(
            group.remove_layer(&CartoLayer::mapnik("select 1", "#a {}")),
            Err(WindshaftError::NotFound(_))
        );
        assert_matches!(
            group.remove_dataview(&Dataview::new("d", "formula", "a0")),
            Err(WindshaftError::NotFound(_))
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn only_last_of_concurrent_reloads_is_applied() {
        let transport = MockTransport::new();
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);
        let view = Arc::new(RecordingView::default());

        transport.reply_json(200, success_body("lg0", 1));
        group.add_to(view.clone());
        group.settled().await.unwrap();
        assert_eq!(view.repaint_count(), 1);

        let first_gate = transport.reply_gated();
        let second_gate = transport.reply_gated();

        group
            .add_layer(&CartoLayer::mapnik("select 2", "#b {}"))
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(transport.requests().len(), 2);

        group
            .add_layer(&CartoLayer::mapnik("select 3", "#c {}"))
            .unwrap();
        let _ = first_gate.send(Ok(crate::platform::HttpResponse::new(
            200,
            success_body("first", 2).to_string(),
        )));
        let _ = second_gate.send(Ok(crate::platform::HttpResponse::new(
            200,
            success_body("second", 3).to_string(),
        )));

        group.settled().await.unwrap();

        assert_eq!(transport.requests().len(), 3);
        assert_eq!(view.repaint_count(), 2);
        assert_eq!(
            view.last_urls().map(|urls| urls.tiles),
            Some(vec![
                "https://acme.example.com/api/v1/map/second/0,1,2/{z}/{x}/{y}.png?api_key=secret"
                    .to_string()
            ])
        );
        assert_eq!(
            group.layer_group_model().map(|model| model.layergroupid().to_string()),
            Some("second".to_string())
        );
    }

    #[tokio::test]
    async fn hiding_layer_repaints_without_reload() {
        let transport = MockTransport::new();
        let hidden = CartoLayer::mapnik("select 2", "#b {}");
        let group = layer_group(
            transport.clone(),
            vec![CartoLayer::mapnik("select 1", "#a {}"), hidden.clone()],
        );
        let view = Arc::new(RecordingView::default());

        transport.reply_json(200, success_body("lg1", 2));
        group.add_to(view.clone());
        group.settled().await.unwrap();

        group.hide_layer(&hidden).unwrap();
        assert_eq!(
            view.last_urls().map(|urls| urls.tiles),
            Some(vec![
                "https://acme.example.com/api/v1/map/lg1/0/{z}/{x}/{y}.png?api_key=secret"
                    .to_string()
            ])
        );

        group.show_layer(&hidden).unwrap();
        assert!(group.tile_url_template().unwrap().contains("/lg1/0,1/"));
        assert_eq!(view.repaint_count(), 3);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn grids_are_provided_for_interactive_layers() {
        let transport = MockTransport::new();
        let group = layer_group(
            transport.clone(),
            vec![
                CartoLayer::mapnik("select 1", "#a {}"),
                CartoLayer::mapnik("select 2", "#b {}").with_option("interactivity", "cartodb_id"),
            ],
        );
        let view = Arc::new(RecordingView::default());

        transport.reply_json(200, success_body("lg1", 2));
        group.add_to(view.clone());
        group.settled().await.unwrap();

        let grids = view.last_urls().unwrap().grids;
        assert_eq!(grids.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(
            group.grid_url_templates_with_subdomains(1),
            vec!["https://acme.example.com/api/v1/map/lg1/1/{z}/{x}/{y}.grid.json?api_key=secret"]
        );
    }

    #[tokio::test]
    async fn vis_model_requests_are_handled() {
        let transport = MockTransport::new();
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);
        let view = Arc::new(RecordingView::default());

        transport.reply_json(200, success_body("lg1", 1));
        group.add_to(view.clone());
        group.settled().await.unwrap();

        group.vis_model().repaint();
        assert_eq!(view.repaint_count(), 2);

        transport.reply_json(200, success_body("lg2", 1));
        group.vis_model().reload();
        group.settled().await.unwrap();

        assert_eq!(view.repaint_count(), 3);
        assert!(group.tile_url_template().unwrap().contains("/lg2/"));
    }

    #[tokio::test]
    async fn repeated_reloads_hit_the_limit() {
        let transport = MockTransport::new();
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);

        for _ in 0..3 {
            transport.reply_json(200, success_body("lg1", 1));
            group.reload().await.unwrap();
        }

        let result = group.reload().await;
        assert_matches!(result, Err(WindshaftError::RequestLimitExceeded(3)));
        assert_eq!(transport.requests().len(), 3);
        assert!(!group.vis_model().is_ok());
        assert_eq!(group.state(), LayerGroupState::Active);
    }

    #[tokio::test]
    async fn rejected_reload_discards_reload_in_flight() {
        let transport = MockTransport::new();
        let group = LayerGroupBuilder::new()
            .with_url_template("https://{user}.example.com")
            .with_user_name("acme")
            .with_instantiation_limit(1)
            .with_transport(transport.clone())
            .with_layer(CartoLayer::mapnik("select 1", "#a {}"))
            .build()
            .unwrap();

        transport.reply_json(200, success_body("lg0", 1));
        group.reload().await.unwrap();

        let gate = transport.reply_gated();
        let extra = CartoLayer::mapnik("select 2", "#b {}");
        group.add_layer(&extra).unwrap();
        let superseded = group.inner.pending_reload.lock().clone().unwrap();
        tokio::task::yield_now().await;
        assert_eq!(transport.requests().len(), 2);

        group.remove_layer(&extra).unwrap();
        assert_matches!(
            group.settled().await,
            Err(WindshaftError::RequestLimitExceeded(1))
        );

        let _ = gate.send(Ok(crate::platform::HttpResponse::new(
            200,
            success_body("stale", 2).to_string(),
        )));
        assert_matches!(superseded.await, Err(WindshaftError::Aborted));

        assert_eq!(group.layers().len(), 1);
        assert_eq!(
            group.layer_group_model().map(|model| model.layergroupid().to_string()),
            Some("lg0".to_string())
        );
        assert!(!group.vis_model().is_ok());
        assert_eq!(group.state(), LayerGroupState::Active);
    }

    #[tokio::test]
    async fn removing_layer_reinstantiates_remaining_layers() {
        let transport = MockTransport::new();
        let removed = CartoLayer::mapnik("select 2", "#b {}");
        let group = layer_group(
            transport.clone(),
            vec![CartoLayer::mapnik("select 1", "#a {}"), removed.clone()],
        );

        transport.reply_json(200, success_body("lg1", 2));
        group.reload().await.unwrap();
        assert!(group.tile_url_template().unwrap().contains("/lg1/0,1/"));

        transport.reply_json(200, success_body("lg2", 1));
        group.remove_layer(&removed).unwrap();
        group.settled().await.unwrap();

        assert_eq!(transport.requests().len(), 2);
        assert!(!transport.requests()[1].url().contains("select%202"));
        assert_eq!(
            group.tile_url_template().as_deref(),
            Some("https://acme.example.com/api/v1/map/lg2/0/{z}/{x}/{y}.png?api_key=secret")
        );
    }

    #[tokio::test]
    async fn removing_dataviews_and_analyses_triggers_reload() {
        let transport = MockTransport::new();
        let node = AnalysisNode::source("a0", "select * from t");
        let dataview = Dataview::new("d0", "histogram", "a0");
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);
        group.add_analysis(node.clone()).unwrap();
        group.add_dataview(dataview.clone()).unwrap();

        transport.reply_json(
            200,
            json!({
                "layergroupid": "lg1",
                "metadata": {
                    "layers": [{"type": "mapnik", "meta": {}}],
                    "analyses": [{"nodes": {"a0": {"status": "ready"}}}]
                }
            }),
        );
        group.remove_dataview(&dataview).unwrap();
        group.settled().await.unwrap();
        assert!(group.dataviews().is_empty());

        transport.reply_json(200, success_body("lg2", 1));
        group.remove_analysis(&node).unwrap();
        group.settled().await.unwrap();
        assert!(group.analyses().is_empty());

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url().contains("analyses"));
        assert!(!requests[0].url().contains("histogram"));
        assert!(!requests[1].url().contains("analyses"));
        assert!(group.tile_url_template().unwrap().contains("/lg2/"));
    }

    #[tokio::test]
    async fn feature_events_are_enriched_with_layer() {
        let transport = MockTransport::new();
        let layer = CartoLayer::mapnik("select 1", "#a {}");
        let group = layer_group(transport.clone(), vec![layer.clone()]);

        transport.reply_json(200, success_body("lg1", 1));
        group.reload().await.unwrap();

        let received = Arc::new(Mutex::new(vec![]));
        let recorded = received.clone();
        group.on_feature_event(move |event| recorded.lock().push(event.clone()));

        let forwarded = group.forward_feature_event(RawFeatureEvent {
            kind: FeatureEventKind::Click,
            layer_index: 0,
            position: Some((40.4, -3.7)),
            data: json!({"cartodb_id": 5}),
        });
        assert!(forwarded);
        assert!(!group.forward_feature_event(RawFeatureEvent {
            kind: FeatureEventKind::Over,
            layer_index: 7,
            position: None,
            data: Value::Null,
        }));

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].layer, layer);
        assert_eq!(received[0].kind, FeatureEventKind::Click);
    }

    #[tokio::test]
    async fn attributes_are_fetched_from_layer_group() {
        let transport = MockTransport::new();
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);

        assert_matches!(
            group.fetch_attributes(0, 5).await,
            Err(WindshaftError::NotFound(_))
        );

        transport.reply_json(200, success_body("lg1", 1));
        group.reload().await.unwrap();

        transport.reply_json(200, json!({"name": "Madrid"}));
        let attributes = group.fetch_attributes(0, 5).await.unwrap();

        assert_eq!(attributes, json!({"name": "Madrid"}));
        assert_eq!(
            transport.requests()[1].url().split('?').next(),
            Some("https://acme.example.com/api/v1/map/lg1/0/attributes/5")
        );
    }

    #[tokio::test]
    async fn dataviews_and_analyses_trigger_reload() {
        let transport = MockTransport::new();
        let node = AnalysisNode::source("a0", "select * from t");
        let group = layer_group(transport.clone(), vec![CartoLayer::from_analysis(&node, "#a {}")]);

        transport.reply_json(200, success_body("lg1", 1));
        group.add_analysis(node.clone()).unwrap();
        assert_matches!(group.settled().await, Err(WindshaftError::MalformedResponse(_)));

        transport.reply_json(
            200,
            json!({
                "layergroupid": "lg2",
                "metadata": {
                    "layers": [{"type": "mapnik", "meta": {}}],
                    "dataviews": {"d0": {"url": {"https": "https://h/d0"}}},
                    "analyses": [{"nodes": {"a0": {"status": "ready"}}}]
                }
            }),
        );
        let dataview = Dataview::new("d0", "histogram", "a0");
        group.add_dataview(dataview.clone()).unwrap();
        group.settled().await.unwrap();

        assert_eq!(dataview.url().as_deref(), Some("https://h/d0"));
        assert_eq!(node.status().as_deref(), Some("ready"));
        assert!(group.vis_model().is_ok());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn teardown_detaches_views() {
        let transport = MockTransport::new();
        let group = layer_group(transport.clone(), vec![CartoLayer::mapnik("select 1", "#a {}")]);
        let view = Arc::new(RecordingView::default());

        let _gate = transport.reply_gated();
        group.add_to(view.clone());
        tokio::task::yield_now().await;
        assert_eq!(group.state(), LayerGroupState::Instantiating);

        group.teardown();

        assert!(view.is_removed());
        assert_eq!(group.state(), LayerGroupState::Uninitialized);
        assert!(group.settled().await.is_ok());
    }

    #[tokio::test]
    async fn attributions_of_visible_layers() {
        let transport = MockTransport::new();
        let osm = Attribution::new("OpenStreetMap contributors", None);
        let first = CartoLayer::mapnik("select 1", "#a {}").with_attribution(osm.clone());
        let second = CartoLayer::mapnik("select 2", "#b {}").with_attribution(osm.clone());
        let third = CartoLayer::mapnik("select 3", "#c {}")
            .with_attribution(Attribution::new("Acme", None));
        let group = layer_group(transport, vec![first, second, third.clone()]);

        group.hide_layer(&third).unwrap();
        assert_eq!(group.attributions(), vec![osm]);
    }
}
