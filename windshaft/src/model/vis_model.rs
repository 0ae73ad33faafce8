//! Visualization state and the refresh requests of rendering adapters.

use parking_lot::RwLock;

use crate::client::MapsApiError;
use crate::events::{SubscriptionId, Subscribers};

/// State of the visualization.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum VisState {
    /// Last instantiation succeeded, or none was made yet.
    #[default]
    Ok,
    /// Last instantiation failed with the given errors.
    Error(Vec<MapsApiError>),
}

/// Requests a rendering adapter may send to the layer group.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VisRequest {
    /// Refresh the tile urls of the attached views without a new instantiation.
    Repaint,
    /// Instantiate the layer group again and repaint.
    Reload,
}

/// Visualization state shared between the layer group and the application.
///
/// The layer group reports the outcome of every instantiation here. Applications subscribe to
/// state changes to show errors, and use [`VisModel::reload`] and [`VisModel::repaint`] to ask
/// the layer group to refresh.
#[derive(Debug, Default)]
pub struct VisModel {
    state: RwLock<VisState>,
    state_changes: Subscribers<VisState>,
    requests: Subscribers<VisRequest>,
}

impl VisModel {
    /// Current state.
    pub fn state(&self) -> VisState {
        self.state.read().clone()
    }

    /// Returns true if the last instantiation did not fail.
    pub fn is_ok(&self) -> bool {
        matches!(*self.state.read(), VisState::Ok)
    }

    /// Errors of the last failed instantiation.
    pub fn errors(&self) -> Vec<MapsApiError> {
        match &*self.state.read() {
            VisState::Ok => vec![],
            VisState::Error(errors) => errors.clone(),
        }
    }

    /// Switches to the [`VisState::Ok`] state.
    pub fn set_ok(&self) {
        self.set_state(VisState::Ok);
    }

    /// Switches to the [`VisState::Error`] state.
    pub fn set_error(&self, errors: Vec<MapsApiError>) {
        self.set_state(VisState::Error(errors));
    }

    /// Asks the layer group to repaint its views.
    pub fn repaint(&self) {
        self.requests.publish(&VisRequest::Repaint);
    }

    /// Asks the layer group to instantiate the map again.
    pub fn reload(&self) {
        self.requests.publish(&VisRequest::Reload);
    }

    /// Subscribes to state changes.
    pub fn on_state_change(
        &self,
        listener: impl Fn(&VisState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.state_changes.subscribe(listener)
    }

    /// Subscribes to repaint and reload requests.
    pub fn on_request(
        &self,
        listener: impl Fn(&VisRequest) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.requests.subscribe(listener)
    }

    /// Removes a listener added with [`VisModel::on_state_change`].
    pub fn unsubscribe_state_change(&self, id: SubscriptionId) -> bool {
        self.state_changes.unsubscribe(id)
    }

    /// Removes a listener added with [`VisModel::on_request`].
    pub fn unsubscribe_request(&self, id: SubscriptionId) -> bool {
        self.requests.unsubscribe(id)
    }

    fn set_state(&self, state: VisState) {
        *self.state.write() = state.clone();
        self.state_changes.publish(&state);
    }
}
