//! Seams between layers and the outside world: url construction for fetch keys and
//! pluggable persistent caches.

use std::collections::HashMap;

use crate::error::GraticuleError;
use crate::tiles::TileId;

/// Source of urls (or other fetch keys) for the given data key.
pub trait UrlSource<Key: ?Sized>: (Fn(&Key) -> String) + Send + Sync {}
impl<Key: ?Sized, T: Fn(&Key) -> String + Send + Sync> UrlSource<Key> for T {}

/// Persistent cache that the tile loaders consult before going to the network.
///
/// Disk-backed implementations are provided by the application; the crate itself
/// only uses this seam.
pub trait PersistentCacheController<Key: ?Sized, Data>: Send + Sync {
    /// Returns the stored data for the key, if any.
    fn get(&self, key: &Key) -> Option<Data>;
    /// Stores the data for the key.
    fn insert(&self, key: &Key, data: &Data) -> Result<(), GraticuleError>;
}

/// Url template for tile requests.
///
/// The template can reference `{z}`, `{x}` and `{y}` of the requested tile, and the
/// configured `{size}` and `{type}` parameters:
///
/// ```
/// use graticule::layer::data_provider::TileUrlTemplate;
/// use graticule::tiles::TileId;
///
/// let template = TileUrlTemplate::new(
///     "https://example.com/tiles/{z}/{x}/{y}.{type}?size={size}",
/// ).expect("invalid template");
///
/// assert_eq!(
///     template.url(&TileId::new(5, 3, 4)),
///     "https://example.com/tiles/4/5/3.pbf?size=512"
/// );
/// ```
///
/// For a given configuration the produced url depends on the tile id alone.
#[derive(Debug, Clone)]
pub struct TileUrlTemplate {
    template: String,
    tile_size: u32,
    tile_type: String,
}

impl TileUrlTemplate {
    const DEFAULT_TILE_SIZE: u32 = 512;
    const DEFAULT_TILE_TYPE: &'static str = "pbf";

    /// Creates a template, checking that all its placeholders are known.
    pub fn new(template: impl Into<String>) -> Result<Self, GraticuleError> {
        let template = Self {
            template: template.into(),
            tile_size: Self::DEFAULT_TILE_SIZE,
            tile_type: Self::DEFAULT_TILE_TYPE.into(),
        };

        // Catch unknown placeholders now rather than on every tile request.
        template.format(&TileId::new(0, 0, 0))?;

        Ok(template)
    }

    /// Sets the value substituted for `{size}`.
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Sets the value substituted for `{type}`.
    pub fn with_tile_type(mut self, tile_type: impl Into<String>) -> Self {
        self.tile_type = tile_type.into();
        self
    }

    /// The template string.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The value substituted for `{size}`.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// The value substituted for `{type}`.
    pub fn tile_type(&self) -> &str {
        &self.tile_type
    }

    /// Renders the fetch url for the given tile.
    pub fn url(&self, index: &TileId) -> String {
        self.format(index).unwrap_or_else(|e| {
            // The constructor validated the template, so this is unreachable in
            // practice.
            log::error!("Failed to format tile url: {e}");
            self.template.clone()
        })
    }

    fn format(&self, index: &TileId) -> Result<String, GraticuleError> {
        let vars: HashMap<String, String> = [
            ("z".into(), index.z.to_string()),
            ("x".into(), index.x.to_string()),
            ("y".into(), index.y.to_string()),
            ("size".into(), self.tile_size.to_string()),
            ("type".into(), self.tile_type.clone()),
        ]
        .into();

        Ok(strfmt::strfmt(&self.template, &vars)?)
    }
}
