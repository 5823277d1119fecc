//! Tile acquisition and caching.
//!
//! The [`VectorTileProvider`] is the shared store of decoded tiles. Any number of
//! concurrent requests for one tile collapse onto a single underlying fetch, and
//! every requester receives the same result. Requests outside the declared zoom
//! bounds never reach the loader. In-flight fetches can be cancelled when their
//! tile leaves the visible region or the owning layer goes away; a cancelled fetch
//! does not populate the store and produces no notification.

use std::collections::HashSet;
use std::sync::Arc;

use graticule_mvt::VectorTile;
use parking_lot::RwLock;
use tokio::sync::Semaphore;

use self::loader::{TileLoadError, TileLoader};
use self::tile_store::{LoadResult, LoadingHandle, TileState, TileStore};
use crate::messenger::Messenger;
use crate::tiles::{TileId, ZoomBounds};

pub mod loader;
mod tile_store;

/// Configuration of a [`VectorTileProvider`].
#[derive(Debug, Clone)]
pub struct TileProviderOptions {
    /// Maximum number of fetches running at the same time. Requests over the limit
    /// are dropped, to be issued again on the next visibility pass.
    pub max_in_flight: usize,
    /// Whether a tile whose fetch failed is fetched again when requested. When
    /// false (the default), a failed tile stays unavailable until the provider is
    /// torn down.
    pub retry_failed: bool,
    /// Approximate memory the decoded tile cache may occupy.
    pub cache_size_bytes: usize,
}

impl Default for TileProviderOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            retry_failed: false,
            cache_size_bytes: 64_000_000,
        }
    }
}

/// Shared store and acquisition pipeline of decoded vector tiles.
#[derive(Clone)]
pub struct VectorTileProvider {
    store: Arc<RwLock<TileStore>>,
    loader: Arc<dyn TileLoader>,
    messenger: Option<Arc<dyn Messenger>>,
    zoom_bounds: ZoomBounds,
    fetch_permits: Arc<Semaphore>,
    retry_failed: bool,
}

impl VectorTileProvider {
    /// Creates a provider with default options.
    pub fn new(loader: Arc<dyn TileLoader>, zoom_bounds: ZoomBounds) -> Self {
        Self::with_options(loader, zoom_bounds, TileProviderOptions::default())
    }

    /// Creates a provider with the given options.
    pub fn with_options(
        loader: Arc<dyn TileLoader>,
        zoom_bounds: ZoomBounds,
        options: TileProviderOptions,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(TileStore::with_capacity(
                options.cache_size_bytes,
            ))),
            loader,
            messenger: None,
            zoom_bounds,
            fetch_permits: Arc::new(Semaphore::new(options.max_in_flight)),
            retry_failed: options.retry_failed,
        }
    }

    /// Sets a messenger to notify the application when a new tile is loaded.
    pub fn set_messenger(&mut self, messenger: Box<dyn Messenger>) {
        self.messenger = Some(messenger.into());
    }

    /// Zoom levels this provider serves tiles for.
    pub fn zoom_bounds(&self) -> ZoomBounds {
        self.zoom_bounds
    }

    /// Returns the tile if it is loaded into the store.
    pub fn get_tile(&self, index: TileId) -> Option<Arc<VectorTile>> {
        self.store.read().get_loaded(index)
    }

    /// Returns true if a fetch for the tile is currently in flight.
    pub fn is_loading(&self, index: TileId) -> bool {
        matches!(self.store.read().get(index), Some(TileState::Loading(_)))
    }

    /// Returns true if the last fetch of the tile failed.
    pub fn is_failed(&self, index: TileId) -> bool {
        matches!(self.store.read().get(index), Some(TileState::Failed(_)))
    }

    /// Loads the tile and returns it when done.
    ///
    /// Concurrent calls for the same index share one underlying fetch and all
    /// receive its result. An index outside the provider's zoom bounds resolves
    /// immediately without touching the loader.
    pub async fn acquire(&self, index: TileId) -> Result<Arc<VectorTile>, TileLoadError> {
        if !index.is_valid() || !self.zoom_bounds.contains(index.z) {
            return Err(TileLoadError::OutsideZoomBounds);
        }

        let handle = {
            let mut store = self.store.write();
            match store.get(index) {
                Some(TileState::Loaded(tile)) => return Ok(tile),
                Some(TileState::Failed(error)) if !self.retry_failed => return Err(error),
                Some(TileState::Loading(handle)) => handle,
                _ => {
                    let handle = Arc::new(LoadingHandle::default());
                    store.insert(index, TileState::Loading(handle.clone()));
                    handle
                }
            }
        };

        let result = handle
            .cell()
            .get_or_init(|| self.fetch(index))
            .await
            .clone();

        let mut store = self.store.write();
        if handle.is_cancelled() {
            // A cancelled fetch must not populate the store.
            store.remove(index);
            return Err(TileLoadError::Cancelled);
        }

        match &result {
            Ok(tile) => store.insert(index, TileState::Loaded(tile.clone())),
            Err(error) => store.insert(index, TileState::Failed(*error)),
        }

        result
    }

    /// Requests the tile in the background.
    ///
    /// Does nothing if the tile is already loaded, loading, or (unless configured
    /// otherwise) failed, or if too many fetches are already in flight. Loaded
    /// results are announced through the messenger.
    pub fn load_tile(&self, index: TileId) {
        if !index.is_valid() || !self.zoom_bounds.contains(index.z) {
            return;
        }

        match self.store.read().get(index) {
            None => {}
            Some(TileState::Failed(_)) if self.retry_failed => {}
            Some(_) => return,
        }

        let Ok(permit) = self.fetch_permits.clone().try_acquire_owned() else {
            log::debug!("Too many tile requests in flight, skipping tile {index:?}");
            return;
        };

        let provider = self.clone();
        crate::async_runtime::spawn(async move {
            let _permit = permit;
            match provider.acquire(index).await {
                Ok(_) => provider.notify(),
                Err(TileLoadError::Cancelled) => {}
                Err(error) => {
                    log::debug!("Failed to load tile {index:?}: {error}");
                    provider.notify();
                }
            }
        });
    }

    /// Cancels in-flight fetches for tiles that are not in the visible set.
    pub fn cancel_stale(&self, visible: &HashSet<TileId>) {
        let store = self.store.read();
        for (index, handle) in store.loading() {
            if !visible.contains(&index) {
                log::trace!("Cancelling request of tile {index:?}");
                handle.cancel();
            }
        }
    }

    /// Cancels all in-flight fetches. Called when the owning layer is torn down.
    pub fn cancel_all(&self) {
        let store = self.store.read();
        for (_, handle) in store.loading() {
            handle.cancel();
        }
    }

    async fn fetch(&self, index: TileId) -> LoadResult {
        let bytes = self.loader.load(index).await?;

        log::trace!("Tile {index:?} loaded. Byte size: {}", bytes.len());

        match VectorTile::decode(bytes) {
            Ok(tile) => Ok(Arc::new(tile)),
            Err(error) => {
                log::warn!("Failed to decode tile {index:?}: {error}");
                Err(TileLoadError::Decoding)
            }
        }
    }

    fn notify(&self) {
        if let Some(messenger) = &self.messenger {
            messenger.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Notify;

    use super::*;
    use crate::tests::test_tile_bytes;

    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TileLoader for CountingLoader {
        async fn load(&self, _index: TileId) -> Result<Bytes, TileLoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(test_tile_bytes())
        }
    }

    #[derive(Default)]
    struct FailingLoader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TileLoader for FailingLoader {
        async fn load(&self, _index: TileId) -> Result<Bytes, TileLoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TileLoadError::Network)
        }
    }

    /// Loader that does not return until released from the test body.
    #[derive(Default)]
    struct BlockingLoader {
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TileLoader for BlockingLoader {
        async fn load(&self, _index: TileId) -> Result<Bytes, TileLoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(test_tile_bytes())
        }
    }

    fn provider(loader: Arc<dyn TileLoader>) -> VectorTileProvider {
        VectorTileProvider::new(loader, ZoomBounds::new(0, 10))
    }

    #[tokio::test]
    async fn concurrent_acquisitions_collapse_to_one_fetch() {
        let loader = Arc::new(CountingLoader::default());
        let provider = provider(loader.clone());
        let index = TileId::new(0, 0, 0);

        let (first, second) = tokio::join!(provider.acquire(index), provider.acquire(index));

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loaded_tiles_are_served_from_the_store() {
        let loader = Arc::new(CountingLoader::default());
        let provider = provider(loader.clone());
        let index = TileId::new(0, 0, 0);

        provider.acquire(index).await.expect("failed to load tile");
        provider.acquire(index).await.expect("failed to load tile");

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(provider.get_tile(index).is_some());
    }

    #[tokio::test]
    async fn out_of_zoom_bounds_requests_never_reach_the_loader() {
        let loader = Arc::new(CountingLoader::default());
        let provider = VectorTileProvider::new(loader.clone(), ZoomBounds::new(2, 5));

        let too_low = provider.acquire(TileId::new(0, 0, 1)).await;
        let too_high = provider.acquire(TileId::new(0, 0, 6)).await;

        assert_eq!(too_low, Err(TileLoadError::OutsideZoomBounds));
        assert_eq!(too_high, Err(TileLoadError::OutsideZoomBounds));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);

        provider.load_tile(TileId::new(0, 0, 1));
        tokio::task::yield_now().await;
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_index_is_not_requested() {
        let loader = Arc::new(CountingLoader::default());
        let provider = provider(loader.clone());

        let result = provider.acquire(TileId::new(4, 0, 2)).await;

        assert_eq!(result, Err(TileLoadError::OutsideZoomBounds));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_retried_by_default() {
        let loader = Arc::new(FailingLoader::default());
        let provider = provider(loader.clone());
        let index = TileId::new(0, 0, 0);

        assert_eq!(provider.acquire(index).await, Err(TileLoadError::Network));
        assert_eq!(provider.acquire(index).await, Err(TileLoadError::Network));

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(provider.is_failed(index));
        assert!(provider.get_tile(index).is_none());
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_when_configured() {
        let loader = Arc::new(FailingLoader::default());
        let options = TileProviderOptions {
            retry_failed: true,
            ..TileProviderOptions::default()
        };
        let provider =
            VectorTileProvider::with_options(loader.clone(), ZoomBounds::new(0, 10), options);
        let index = TileId::new(0, 0, 0);

        assert_eq!(provider.acquire(index).await, Err(TileLoadError::Network));
        assert_eq!(provider.acquire(index).await, Err(TileLoadError::Network));

        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_fetch_does_not_populate_the_store() {
        let loader = Arc::new(BlockingLoader::default());
        let provider = provider(loader.clone());
        let index = TileId::new(0, 0, 0);

        let task = tokio::spawn({
            let provider = provider.clone();
            async move { provider.acquire(index).await }
        });

        while !provider.is_loading(index) {
            tokio::task::yield_now().await;
        }

        provider.cancel_all();
        loader.release.notify_one();

        let result = task.await.expect("acquire task panicked");
        assert_eq!(result, Err(TileLoadError::Cancelled));
        assert!(provider.get_tile(index).is_none());
        assert!(!provider.is_failed(index));

        // The slot is free again, so the tile can be requested anew.
        loader.release.notify_one();
        assert!(provider.acquire(index).await.is_ok());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn in_flight_fetches_are_bounded() {
        let loader = Arc::new(BlockingLoader::default());
        let options = TileProviderOptions {
            max_in_flight: 1,
            ..TileProviderOptions::default()
        };
        let provider =
            VectorTileProvider::with_options(loader.clone(), ZoomBounds::new(0, 10), options);

        provider.load_tile(TileId::new(0, 0, 1));
        while !provider.is_loading(TileId::new(0, 0, 1)) {
            tokio::task::yield_now().await;
        }

        // The only permit is taken, so this request is dropped.
        provider.load_tile(TileId::new(1, 0, 1));
        tokio::task::yield_now().await;
        assert!(!provider.is_loading(TileId::new(1, 0, 1)));

        loader.release.notify_one();
        while provider.get_tile(TileId::new(0, 0, 1)).is_none() {
            tokio::task::yield_now().await;
        }

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(provider.get_tile(TileId::new(1, 0, 1)).is_none());
    }

    #[tokio::test]
    async fn messenger_is_notified_about_loaded_tiles() {
        #[derive(Default)]
        struct CountingMessenger(AtomicUsize);

        impl Messenger for CountingMessenger {
            fn request_redraw(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        struct ForwardingMessenger(Arc<CountingMessenger>);

        impl Messenger for ForwardingMessenger {
            fn request_redraw(&self) {
                self.0.request_redraw();
            }
        }

        let messenger = Arc::new(CountingMessenger::default());
        let loader = Arc::new(CountingLoader::default());
        let mut provider = provider(loader);
        provider.set_messenger(Box::new(ForwardingMessenger(messenger.clone())));

        let index = TileId::new(0, 0, 0);
        provider.load_tile(index);

        while provider.get_tile(index).is_none() {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;

        assert_eq!(messenger.0.load(Ordering::SeqCst), 1);
    }
}
