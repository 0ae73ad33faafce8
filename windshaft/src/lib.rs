//! Client for the Windshaft Maps API.
//!
//! A [`LayerGroup`] describes a set of map layers (SQL queries with CartoCSS styles), dataviews
//! and analyses. It instantiates them in the service and exposes the tile and interactivity
//! grid url templates a map widget needs to render the layers.
//!
//! ```ignore
//! use windshaft::{CartoLayer, LayerGroupBuilder};
//!
//! let layer_group = LayerGroupBuilder::new()
//!     .with_url_template("https://{user}.carto.com")
//!     .with_user_name("acme")
//!     .with_layer(CartoLayer::mapnik(
//!         "select * from populated_places",
//!         "#layer { marker-fill: #f60; }",
//!     ))
//!     .build()?;
//!
//! layer_group.reload().await?;
//! println!("{:?}", layer_group.tile_url_template());
//! ```
//!
//! The lower level [`client::MapsApiClient`] can be used to instantiate map definitions
//! directly.

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

mod async_runtime;
pub mod client;
pub mod error;
pub mod events;
pub mod layer_group;
pub mod model;
pub mod model_updater;
pub mod platform;
pub mod view;

pub use client::{MapsApiClient, MapsApiError, QueryParams, Request};
pub use error::WindshaftError;
pub use layer_group::{LayerGroup, LayerGroupBuilder, LayerGroupModel, LayerGroupState};
pub use model::{AnalysisNode, Attribution, CartoLayer, Dataview, Layer, VisModel, VisState};
pub use view::{FeatureEvent, FeatureEventKind, LayerGroupView, RawFeatureEvent, TileUrls};
pub use windshaft_types;

#[cfg(test)]
mod tests;
