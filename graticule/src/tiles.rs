//! Tile addressing in the standard web-mercator tile pyramid.
//!
//! A [`TileId`] identifies one tile of the pyramid by zoom level and grid position.
//! Level `z` splits the world into `2^z × 2^z` tiles, with `x` growing eastward and
//! `y` growing southward from the north-west corner. The functions here convert
//! between geographic positions and tile indices, and navigate the pyramid
//! (parent/child tiles, covering sets of a geographic rectangle).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Maximum latitude (in degrees) representable in the web-mercator tile pyramid.
pub const MAX_LATITUDE: f64 = 85.0511287798066;

/// Geographic position in degrees.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    /// Creates a position from latitude and longitude in degrees.
    pub fn latlon(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    pub fn lon(&self) -> f64 {
        self.lon
    }
}

/// Axis-aligned geographic rectangle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
}

impl GeoRect {
    /// Creates a rectangle spanning the given latitude and longitude ranges.
    ///
    /// The bounds are normalized, so the arguments can be given in any order.
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min: lat_min.min(lat_max),
            lat_max: lat_min.max(lat_max),
            lon_min: lon_min.min(lon_max),
            lon_max: lon_min.max(lon_max),
        }
    }

    /// South bound in degrees.
    pub fn lat_min(&self) -> f64 {
        self.lat_min
    }

    /// North bound in degrees.
    pub fn lat_max(&self) -> f64 {
        self.lat_max
    }

    /// West bound in degrees.
    pub fn lon_min(&self) -> f64 {
        self.lon_min
    }

    /// East bound in degrees.
    pub fn lon_max(&self) -> f64 {
        self.lon_max
    }

    /// Returns true if the given position is inside the rectangle.
    pub fn contains(&self, position: GeoPoint) -> bool {
        position.lat >= self.lat_min
            && position.lat <= self.lat_max
            && position.lon >= self.lon_min
            && position.lon <= self.lon_max
    }
}

/// Inclusive zoom level range of a tile layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomBounds {
    min: u32,
    max: u32,
}

impl ZoomBounds {
    /// Creates a new range. The bounds are normalized, so the arguments can be given
    /// in any order.
    pub fn new(min: u32, max: u32) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Minimum zoom level of the range.
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Maximum zoom level of the range.
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Returns true if the given zoom level is inside the range.
    pub fn contains(&self, z: u32) -> bool {
        z >= self.min && z <= self.max
    }
}

/// Tile index.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct TileId {
    /// X index.
    pub x: u32,
    /// Y index.
    pub y: u32,
    /// Z index.
    pub z: u32,
}

impl TileId {
    /// Creates a new index instance.
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Returns true if the index addresses a tile of the pyramid, i.e.
    /// `x, y < 2^z`.
    pub fn is_valid(&self) -> bool {
        self.z < 32 && (self.x as u64) < side(self.z) && (self.y as u64) < side(self.z)
    }

    /// The tile of the previous zoom level that contains this tile.
    ///
    /// Returns `None` for the root tile.
    pub fn parent(&self) -> Option<TileId> {
        if self.z == 0 {
            return None;
        }

        Some(TileId::new(self.x >> 1, self.y >> 1, self.z - 1))
    }

    /// The four tiles of the next zoom level that this tile splits into.
    pub fn children(&self) -> [TileId; 4] {
        let (x, y, z) = (self.x * 2, self.y * 2, self.z + 1);
        [
            TileId::new(x, y, z),
            TileId::new(x + 1, y, z),
            TileId::new(x, y + 1, z),
            TileId::new(x + 1, y + 1, z),
        ]
    }

    /// Returns true if `other` is this tile or lies under it in the pyramid.
    pub fn contains(&self, other: &TileId) -> bool {
        let Some(shift) = other.z.checked_sub(self.z) else {
            return false;
        };

        shift < 32 && other.x >> shift == self.x && other.y >> shift == self.y
    }

    /// The tile of the given zoom level containing the given position.
    ///
    /// Latitude is clamped to [`MAX_LATITUDE`], longitude to the ±180 range.
    pub fn from_geo(position: GeoPoint, z: u32) -> TileId {
        let side = side(z) as f64;

        let lon = position.lon().clamp(-180.0, 180.0);
        let x = (lon + 180.0) / 360.0 * side;

        let lat = position
            .lat()
            .clamp(-MAX_LATITUDE, MAX_LATITUDE)
            .to_radians();
        let y = (1.0 - lat.tan().asinh() / PI) / 2.0 * side;

        TileId::new(
            (x.floor().max(0.0) as u64).min(side as u64 - 1) as u32,
            (y.floor().max(0.0) as u64).min(side as u64 - 1) as u32,
            z,
        )
    }

    /// Iterates over the tiles of the given zoom level that cover the rectangle.
    pub fn cover(rect: &GeoRect, z: u32) -> impl Iterator<Item = TileId> {
        let north_west = Self::from_geo(GeoPoint::latlon(rect.lat_max(), rect.lon_min()), z);
        let south_east = Self::from_geo(GeoPoint::latlon(rect.lat_min(), rect.lon_max()), z);

        (north_west.x..=south_east.x).flat_map(move |x| {
            (north_west.y..=south_east.y).map(move |y| TileId::new(x, y, z))
        })
    }

    /// Geographic bounds of the tile.
    pub fn bounds(&self) -> GeoRect {
        GeoRect::new(
            self.lat_at(1.0),
            self.lat_at(0.0),
            self.lon_at(0.0),
            self.lon_at(1.0),
        )
    }

    /// Geographic position of a point inside the tile.
    ///
    /// `fx` and `fy` are fractions of the tile size from its north-west corner,
    /// `fy` growing southward as tile-local coordinates do.
    pub fn position_at(&self, fx: f64, fy: f64) -> GeoPoint {
        GeoPoint::latlon(self.lat_at(fy), self.lon_at(fx))
    }

    fn lon_at(&self, fx: f64) -> f64 {
        (self.x as f64 + fx) / side(self.z) as f64 * 360.0 - 180.0
    }

    fn lat_at(&self, fy: f64) -> f64 {
        let n = PI * (1.0 - 2.0 * (self.y as f64 + fy) / side(self.z) as f64);
        n.sinh().atan().to_degrees()
    }
}

fn side(z: u32) -> u64 {
    1u64 << z.min(31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_validity() {
        assert!(TileId::new(0, 0, 0).is_valid());
        assert!(!TileId::new(1, 0, 0).is_valid());
        assert!(TileId::new(3, 1, 2).is_valid());
        assert!(!TileId::new(4, 1, 2).is_valid());
        assert!(!TileId::new(1, 4, 2).is_valid());
    }

    #[test]
    fn parent_and_children() {
        let root = TileId::new(0, 0, 0);
        assert_eq!(root.parent(), None);

        let tile = TileId::new(3, 5, 4);
        assert_eq!(tile.parent(), Some(TileId::new(1, 2, 3)));

        for child in tile.children() {
            assert_eq!(child.parent(), Some(tile));
            assert!(tile.contains(&child));
        }

        assert!(root.contains(&tile));
        assert!(!tile.contains(&root));
        assert!(tile.contains(&tile));
    }

    #[test]
    fn from_geo_known_positions() {
        let anywhere = GeoPoint::latlon(48.13, 11.57);
        assert_eq!(TileId::from_geo(anywhere, 0), TileId::new(0, 0, 0));

        // Berlin, see https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames
        let berlin = GeoPoint::latlon(52.52, 13.405);
        assert_eq!(TileId::from_geo(berlin, 10), TileId::new(550, 335, 10));

        // Poles and the antimeridian stay in range.
        let corner = GeoPoint::latlon(-90.0, 180.0);
        assert!(TileId::from_geo(corner, 3).is_valid());
    }

    #[test]
    fn bounds_roundtrip() {
        let tile = TileId::new(550, 335, 10);
        let bounds = tile.bounds();
        let center = GeoPoint::latlon(
            (bounds.lat_min() + bounds.lat_max()) / 2.0,
            (bounds.lon_min() + bounds.lon_max()) / 2.0,
        );

        assert_eq!(TileId::from_geo(center, 10), tile);
        assert!(bounds.contains(center));
    }

    #[test]
    fn position_at_tile_corners() {
        let tile = TileId::new(0, 0, 1);
        let bounds = tile.bounds();

        let nw = tile.position_at(0.0, 0.0);
        assert!((nw.lat() - bounds.lat_max()).abs() < 1e-10);
        assert!((nw.lon() - bounds.lon_min()).abs() < 1e-10);

        let se = tile.position_at(1.0, 1.0);
        assert!((se.lat() - bounds.lat_min()).abs() < 1e-10);
        assert!((se.lon() - bounds.lon_max()).abs() < 1e-10);
    }

    #[test]
    fn cover_whole_world() {
        let world = GeoRect::new(-MAX_LATITUDE, MAX_LATITUDE, -180.0, 180.0);
        assert_eq!(TileId::cover(&world, 0).count(), 1);
        assert_eq!(TileId::cover(&world, 1).count(), 4);
        assert_eq!(TileId::cover(&world, 2).count(), 16);
    }

    #[test]
    fn cover_partial_rect() {
        // North-eastern quarter of the world.
        let quarter = GeoRect::new(1.0, MAX_LATITUDE, 1.0, 179.0);
        let tiles: Vec<_> = TileId::cover(&quarter, 1).collect();
        assert_eq!(tiles, vec![TileId::new(1, 0, 1)]);

        let tiles: Vec<_> = TileId::cover(&quarter, 2).collect();
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|t| t.x >= 2 && t.y <= 1));
    }

    #[test]
    fn zoom_bounds() {
        let bounds = ZoomBounds::new(5, 10);
        assert!(bounds.contains(5));
        assert!(bounds.contains(10));
        assert!(!bounds.contains(4));
        assert!(!bounds.contains(11));

        let normalized = ZoomBounds::new(10, 5);
        assert_eq!(normalized, bounds);
    }
}
