//! Tile loader stuff.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::layer::data_provider::{PersistentCacheController, UrlSource};
use crate::tiles::TileId;

/// Error that can occur when trying to load a tile.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum TileLoadError {
    /// Could not connect to the remote server.
    #[error("failed to connect to the remote server")]
    Network,
    /// Tile with the given index does not exist.
    #[error("tile does not exist")]
    DoesNotExist,
    /// The layer does not provide tiles for the requested zoom level.
    #[error("zoom level is outside of the layer bounds")]
    OutsideZoomBounds,
    /// Failed to decode the tile from the binary data.
    #[error("failed to decode tile")]
    Decoding,
    /// The request was cancelled before it produced a tile.
    #[error("tile request was cancelled")]
    Cancelled,
}

/// Loader of raw tile payloads.
#[async_trait]
pub trait TileLoader: Send + Sync {
    /// Loads the payload of the tile with the given index.
    async fn load(&self, index: TileId) -> Result<Bytes, TileLoadError>;
}

/// Loads tiles with separate HTTP GET requests.
///
/// If constructed with a [`PersistentCacheController`] it will consult the cache
/// first and only request tiles from the network when they are not stored yet.
pub struct RestTileLoader {
    client: reqwest::Client,
    url_source: Box<dyn UrlSource<TileId>>,
    cache: Option<Box<dyn PersistentCacheController<str, Bytes>>>,
    offline_mode: bool,
}

impl RestTileLoader {
    /// Creates a new instance of the loader.
    pub fn new(
        url_source: impl UrlSource<TileId> + 'static,
        cache: Option<Box<dyn PersistentCacheController<str, Bytes>>>,
        offline_mode: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("graticule/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url_source: Box::new(url_source),
            cache,
            offline_mode,
        }
    }
}

#[async_trait]
impl TileLoader for RestTileLoader {
    async fn load(&self, index: TileId) -> Result<Bytes, TileLoadError> {
        let url = (self.url_source)(&index);

        if let Some(cache) = &self.cache {
            if let Some(data) = cache.get(&url) {
                log::trace!("Cache hit for url {url}");
                return Ok(data);
            }
        }

        if self.offline_mode {
            return Err(TileLoadError::DoesNotExist);
        }

        log::info!("Loading {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| TileLoadError::Network)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TileLoadError::DoesNotExist);
        }
        if !response.status().is_success() {
            log::info!("Failed to load {url}: {}", response.status());
            return Err(TileLoadError::Network);
        }

        let data = response.bytes().await.map_err(|_| TileLoadError::Network)?;

        if let Some(cache) = &self.cache {
            if let Err(error) = cache.insert(&url, &data) {
                log::warn!("Failed to write persistent cache entry: {error:?}");
            }
        }

        Ok(data)
    }
}
