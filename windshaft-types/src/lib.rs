//! Wire types of the Windshaft Maps API.
//!
//! * [`MapDefinition`] is the layer group configuration a client submits to create a layer
//!   group.
//! * [`InstantiationResponse`] is what the service answers with, either describing the new
//!   layer group or listing the errors that prevented its creation.

pub mod definition;
pub use definition::*;

pub mod response;
pub use response::*;
