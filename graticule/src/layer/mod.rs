//! Layers specify a data source and the way its features appear on the map surface.
//!
//! There are two layer types:
//! * [`VectorTileLayer`] - requests binary vector tiles from an online source,
//!   decodes them and shows the decoded features as shapes.
//! * [`FileLayer`] - shows a fixed set of feature records, coming for example from
//!   a file read by the application.
//!
//! Both build their [`Shape`]s with the shape factory (see [`crate::shape`]) and
//! install them onto a [`MapSurface`] provided by the application.

use crate::shape::{Shape, ShapeId};

pub mod data_provider;
pub mod file_layer;
pub mod tile_provider;
pub mod vector_tile_layer;

pub use file_layer::FileLayer;
pub use vector_tile_layer::VectorTileLayer;

/// The drawing collaborator that layers install their shapes onto.
///
/// The surface keeps non-owning drawing state keyed by shape identity; the layer
/// retains ownership of its shapes and controls their lifecycle.
pub trait MapSurface {
    /// Makes the shape visible on the surface. Adding a shape that is already
    /// present replaces it.
    fn add_item(&mut self, shape: &Shape);

    /// Removes the shape with the given id from the surface. Removing an absent
    /// shape does nothing.
    fn remove_item(&mut self, id: ShapeId);
}
