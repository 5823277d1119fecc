//! Layer that shows vector tiles loaded from an online source.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::layer::data_provider::TileUrlTemplate;
use crate::layer::tile_provider::loader::RestTileLoader;
use crate::layer::tile_provider::VectorTileProvider;
use crate::layer::MapSurface;
use crate::messenger::Messenger;
use crate::shape::{build_shape, FeatureData, Shape, ShapeStyle};
use crate::tiles::{GeoRect, TileId, ZoomBounds};

/// Layer of vector tiles requested from an online source tile by tile.
///
/// The layer requests the tiles covering the visible region through its
/// [`VectorTileProvider`], converts the decoded features into shapes with the
/// configured style, and installs them onto the map surface per tile. A tile whose
/// fetch or decode failed simply stays empty; the application can observe the
/// failure through the provider.
pub struct VectorTileLayer {
    provider: VectorTileProvider,
    url_template: TileUrlTemplate,
    style: ShapeStyle,
    installed: HashMap<TileId, Vec<Shape>>,
}

impl VectorTileLayer {
    /// Creates a layer on top of an existing provider.
    pub fn new(url_template: TileUrlTemplate, provider: VectorTileProvider, style: ShapeStyle) -> Self {
        Self {
            provider,
            url_template,
            style,
            installed: HashMap::new(),
        }
    }

    /// Creates a layer that requests tiles from the url template with plain GET
    /// requests.
    pub fn from_url(
        url_template: TileUrlTemplate,
        zoom_bounds: ZoomBounds,
        style: ShapeStyle,
    ) -> Self {
        let source = url_template.clone();
        let loader = RestTileLoader::new(move |index: &TileId| source.url(index), None, false);
        let provider = VectorTileProvider::new(Arc::new(loader), zoom_bounds);

        Self::new(url_template, provider, style)
    }

    /// Lowest zoom level this layer has tiles for.
    pub fn min_zoom_level(&self) -> u32 {
        self.provider.zoom_bounds().min()
    }

    /// Highest zoom level this layer has tiles for.
    pub fn max_zoom_level(&self) -> u32 {
        self.provider.zoom_bounds().max()
    }

    /// Fetch url of the given tile.
    pub fn tile_url(&self, index: TileId) -> String {
        self.url_template.url(&index)
    }

    /// The provider the layer requests its tiles through.
    pub fn provider(&self) -> &VectorTileProvider {
        &self.provider
    }

    /// Sets the messenger that announces newly loaded tiles.
    pub fn set_messenger(&mut self, messenger: Box<dyn Messenger>) {
        self.provider.set_messenger(messenger);
    }

    /// Requests the tiles covering the given region at the given zoom level, and
    /// cancels requests for tiles that are no longer visible.
    ///
    /// A zoom level outside the layer bounds requests nothing: there are no tiles
    /// to show there.
    pub fn request_tiles(&self, rect: &GeoRect, zoom: u32) {
        if !self.provider.zoom_bounds().contains(zoom) {
            return;
        }

        let visible: HashSet<TileId> = TileId::cover(rect, zoom).collect();
        self.provider.cancel_stale(&visible);

        for index in &visible {
            self.provider.load_tile(*index);
        }
    }

    /// Builds the shapes of a loaded tile.
    ///
    /// Returns an empty list if the tile is not loaded (yet).
    pub fn build_shapes(&self, index: TileId) -> Vec<Shape> {
        let Some(tile) = self.provider.get_tile(index) else {
            return vec![];
        };

        let mut shapes = vec![];
        for layer in &tile.layers {
            for feature in &layer.features {
                let record = FeatureData::from_tile_feature(feature, index);
                if let Some(shape) = build_shape(record, &self.style) {
                    shapes.push(shape);
                }
            }
        }

        shapes
    }

    /// Builds the shapes of the tile and installs them onto the surface, replacing
    /// whatever this layer installed for the tile before.
    pub fn install_tile(&mut self, index: TileId, surface: &mut dyn MapSurface) {
        self.remove_tile(index, surface);

        let shapes = self.build_shapes(index);
        for shape in &shapes {
            surface.add_item(shape);
        }

        if !shapes.is_empty() {
            self.installed.insert(index, shapes);
        }
    }

    /// Removes the shapes this layer installed for the tile.
    pub fn remove_tile(&mut self, index: TileId, surface: &mut dyn MapSurface) {
        if let Some(shapes) = self.installed.remove(&index) {
            for shape in &shapes {
                surface.remove_item(shape.id());
            }
        }
    }

    /// Removes everything this layer installed and cancels its pending requests.
    pub fn clear(&mut self, surface: &mut dyn MapSurface) {
        let indices: Vec<TileId> = self.installed.keys().copied().collect();
        for index in indices {
            self.remove_tile(index, surface);
        }

        self.provider.cancel_all();
    }
}
