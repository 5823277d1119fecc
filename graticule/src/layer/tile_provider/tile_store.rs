use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use graticule_mvt::{MvtGeometry, VectorTile};
use quick_cache::unsync::{Cache, DefaultLifecycle};
use quick_cache::Weighter;
use tokio::sync::OnceCell;

use super::loader::TileLoadError;
use crate::tiles::TileId;

const DEFAULT_CACHE_CAPACITY: usize = 64_000_000;
const AVG_TILE_SIZE: usize = 100_000;
const EMPTY_ENTRY_WEIGHT: u32 = 1024;

pub(super) type LoadResult = Result<Arc<VectorTile>, TileLoadError>;

/// Synchronization point of all requests for one tile.
///
/// The first request initializes the cell; every concurrent request for the same
/// tile awaits the same cell and receives the same result.
#[derive(Debug, Default)]
pub(super) struct LoadingHandle {
    cell: OnceCell<LoadResult>,
    cancelled: AtomicBool,
}

impl LoadingHandle {
    pub fn cell(&self) -> &OnceCell<LoadResult> {
        &self.cell
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub(super) enum TileState {
    Loading(Arc<LoadingHandle>),
    Loaded(Arc<VectorTile>),
    Failed(TileLoadError),
}

pub(super) struct TileStore {
    tiles: Cache<TileId, TileState, TileWeighter, ahash::RandomState, DefaultLifecycle<TileId, TileState>>,
}

impl Default for TileStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl TileStore {
    pub fn with_capacity(bytes_size: usize) -> Self {
        Self {
            tiles: Cache::with(
                bytes_size / AVG_TILE_SIZE,
                bytes_size as u64,
                TileWeighter,
                ahash::RandomState::default(),
                DefaultLifecycle::default(),
            ),
        }
    }

    pub fn get(&self, index: TileId) -> Option<TileState> {
        self.tiles.get(&index).cloned()
    }

    pub fn get_loaded(&self, index: TileId) -> Option<Arc<VectorTile>> {
        match self.tiles.get(&index) {
            Some(TileState::Loaded(tile)) => Some(tile.clone()),
            _ => None,
        }
    }

    pub fn insert(&mut self, index: TileId, state: TileState) {
        self.tiles.insert(index, state);
    }

    pub fn remove(&mut self, index: TileId) {
        self.tiles.remove(&index);
    }

    /// In-flight entries of the store.
    pub fn loading(&self) -> Vec<(TileId, Arc<LoadingHandle>)> {
        self.tiles
            .iter()
            .filter_map(|(index, state)| match state {
                TileState::Loading(handle) => Some((*index, handle.clone())),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone)]
struct TileWeighter;

impl Weighter<TileId, TileState> for TileWeighter {
    fn weight(&self, _key: &TileId, state: &TileState) -> u32 {
        match state {
            TileState::Loaded(tile) => approx_tile_size(tile) as u32,
            _ => EMPTY_ENTRY_WEIGHT,
        }
    }
}

fn approx_tile_size(tile: &VectorTile) -> usize {
    tile.layers
        .iter()
        .flat_map(|layer| &layer.features)
        .map(|feature| {
            let coordinates = match &feature.geometry {
                MvtGeometry::Point(points) => points.len(),
                MvtGeometry::Line(paths) | MvtGeometry::Polygon(paths) => {
                    paths.iter().map(Vec::len).sum()
                }
            };

            coordinates * std::mem::size_of::<graticule_mvt::Point>()
                + feature.properties.len() * 64
                + 64
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graticule_mvt::MvtLayer;

    fn tile_with_points(count: usize) -> Arc<VectorTile> {
        let points = (0..count)
            .map(|i| graticule_mvt::Point::new(i as f32, 0.0))
            .collect();
        Arc::new(VectorTile {
            layers: vec![MvtLayer {
                name: "test".into(),
                extent: 4096,
                features: vec![graticule_mvt::MvtFeature {
                    id: None,
                    properties: Default::default(),
                    geometry: MvtGeometry::Point(points),
                }],
            }],
        })
    }

    #[test]
    fn evicts_tiles_over_capacity() {
        const CAPACITY: usize = 100_000;

        let mut store = TileStore::with_capacity(CAPACITY);
        let item_weight = approx_tile_size(&tile_with_points(1000));
        let fitting = CAPACITY / item_weight;

        for i in 0..(fitting as u32 * 2) {
            store.insert(
                TileId::new(i, i, 10),
                TileState::Loaded(tile_with_points(1000)),
            );
        }

        let stored = (0..(fitting as u32 * 2))
            .filter(|i| store.get(TileId::new(*i, *i, 10)).is_some())
            .count();
        assert!(stored <= fitting, "too many items in the store: {stored}");
        assert!(stored > 0, "store evicted everything");
    }

    #[test]
    fn loading_lists_only_in_flight_entries() {
        let mut store = TileStore::default();
        store.insert(
            TileId::new(0, 0, 1),
            TileState::Loading(Arc::default()),
        );
        store.insert(TileId::new(1, 0, 1), TileState::Loaded(tile_with_points(1)));
        store.insert(
            TileId::new(1, 1, 1),
            TileState::Failed(TileLoadError::Network),
        );

        let loading = store.loading();
        assert_eq!(loading.len(), 1);
        assert_eq!(loading[0].0, TileId::new(0, 0, 1));
    }
}
