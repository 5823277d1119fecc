//! Graticule is the core of a tile-based interactive map widget. It addresses map
//! tiles in the standard zoom pyramid, loads and caches binary vector tiles,
//! converts the decoded features into styled drawable shapes, and drives
//! interactive markers that the user can drag around the map.
//!
//! What it deliberately does *not* do is draw anything: rendering, the camera and
//! the window belong to the application. The crate talks to them through narrow
//! seams:
//!
//! * [`layer::MapSurface`] - the drawing collaborator the layers install their
//!   [shapes](shape::Shape) onto;
//! * [`Messenger`] - the channel layers use to ask for a redraw when new data
//!   arrived;
//! * [`control::RawUserEvent`] - the pointer event stream the host feeds into the
//!   [`control::EventProcessor`], with the geographic pointer position attached by
//!   the host camera.
//!
//! # Showing tiles
//!
//! A [`layer::VectorTileLayer`] requests the tiles covering the visible region,
//! decodes them (see the `graticule-mvt` crate), and builds shapes out of the
//! decoded features:
//!
//! ```no_run
//! use graticule::layer::data_provider::TileUrlTemplate;
//! use graticule::layer::VectorTileLayer;
//! use graticule::shape::ShapeStyle;
//! use graticule::tiles::{GeoRect, ZoomBounds};
//!
//! let template = TileUrlTemplate::new("https://example.com/tiles/{z}/{x}/{y}.{type}")
//!     .expect("invalid template");
//! let layer = VectorTileLayer::from_url(template, ZoomBounds::new(0, 14), ShapeStyle::default());
//!
//! // On every view change:
//! let visible = GeoRect::new(52.3, 52.7, 13.1, 13.7);
//! layer.request_tiles(&visible, 11);
//! ```
//!
//! # Showing features from other sources
//!
//! A [`layer::FileLayer`] shows a fixed set of feature records, styled by the same
//! shape factory ([`shape::build_shape`]) the tile layer uses.
//!
//! # Interactive markers
//!
//! An [`icon::Icon`] is an image marker with a drag state machine: the host routes
//! pointer events to it, and it emits `MoveStarted` / `Moved` / `MoveStopped` /
//! `Clicked` notifications (see [`icon::IconEvent`]).

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

pub(crate) mod async_runtime;
mod color;
pub mod control;
pub mod error;
pub mod icon;
pub mod layer;
mod messenger;
pub mod shape;
pub mod tiles;

#[cfg(test)]
mod tests;

pub use color::Color;
pub use error::GraticuleError;
pub use messenger::{DummyMessenger, Messenger};
