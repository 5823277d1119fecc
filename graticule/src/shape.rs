//! Drawable shapes and the factory that builds them from geographic features.
//!
//! A [`FeatureData`] record (a geometry with an attribute map, coming from a decoded
//! vector tile or from a file reader) is turned into a [`Shape`] by [`build_shape`].
//! Style overrides are written into the attribute map *before* the shape is
//! constructed, so the properties of the built shape always reflect the resolved
//! style.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use graticule_mvt::{MvtFeature, MvtGeometry, MvtValue};
use serde::{Deserialize, Serialize};

use crate::tiles::{GeoPoint, TileId};
use crate::Color;

/// Image used for point shapes when no other icon is configured.
pub const DEFAULT_MARKER_IMAGE: &str = "resources/pin-icon.png";

/// Fill opacity written into the attribute map when a polygon color override is
/// applied.
pub const OVERRIDE_FILL_OPACITY: f64 = 0.5;

// Defaults of the simplestyle properties ("stroke", "fill", ...) the shapes read.
const DEFAULT_STROKE: Color = Color::rgba(0x55, 0x55, 0x55, 255);
const DEFAULT_FILL: Color = Color::rgba(0x55, 0x55, 0x55, 255);
const DEFAULT_STROKE_WIDTH: f64 = 2.0;
const DEFAULT_FILL_OPACITY: f64 = 0.6;

/// Attribute map of a feature or shape.
pub type Properties = HashMap<String, MvtValue>;

/// Reference to an image resource (a path or url resolved by the host).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef(String);

impl ImageRef {
    /// Creates a new reference.
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// The referenced path or url.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Process-unique identifier of a [`Shape`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(u64);

impl ShapeId {
    /// Returns an id that was not returned before in this process.
    pub fn next_id() -> Self {
        static ID: AtomicU64 = AtomicU64::new(0);
        Self(ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A geographic feature before shape construction.
#[derive(Debug, Clone)]
pub struct FeatureData {
    /// Geometry of the feature, in geographic coordinates.
    pub geometry: FeatureGeometry,
    /// Attribute map of the feature.
    pub properties: Properties,
}

impl FeatureData {
    /// Creates a new record.
    pub fn new(geometry: FeatureGeometry, properties: Properties) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    /// Converts a feature decoded from a vector tile into geographic coordinates
    /// using the position of the tile it was decoded from.
    pub fn from_tile_feature(feature: &MvtFeature, tile: TileId) -> Self {
        let geometry = match &feature.geometry {
            MvtGeometry::Point(points) => FeatureGeometry::Point(
                points
                    .iter()
                    .map(|p| tile.position_at(p.x as f64, p.y as f64))
                    .collect(),
            ),
            MvtGeometry::Line(contours) => FeatureGeometry::Line(convert_paths(contours, tile)),
            MvtGeometry::Polygon(rings) => FeatureGeometry::Polygon(convert_paths(rings, tile)),
        };

        Self {
            geometry,
            properties: feature.properties.clone(),
        }
    }
}

fn convert_paths(paths: &[Vec<graticule_mvt::Point>], tile: TileId) -> Vec<Vec<GeoPoint>> {
    paths
        .iter()
        .map(|path| {
            path.iter()
                .map(|p| tile.position_at(p.x as f64, p.y as f64))
                .collect()
        })
        .collect()
}

/// Geometry of a [`FeatureData`] record.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    /// One or more separate points.
    Point(Vec<GeoPoint>),
    /// Contours of a line.
    Line(Vec<Vec<GeoPoint>>),
    /// Rings of a polygon.
    Polygon(Vec<Vec<GeoPoint>>),
}

/// Style overrides applied by the shape factory.
///
/// A `None` field means the built-in default (or whatever the feature's own
/// attributes specify) is used.
#[derive(Debug, Clone, Default)]
pub struct ShapeStyle {
    /// Image for point shapes.
    pub point_icon: Option<ImageRef>,
    /// Stroke color for line shapes.
    pub line_color: Option<Color>,
    /// Stroke and fill color for polygon shapes.
    pub polygon_color: Option<Color>,
}

impl ShapeStyle {
    /// Sets the image for point shapes.
    pub fn with_point_icon(mut self, icon: ImageRef) -> Self {
        self.point_icon = Some(icon);
        self
    }

    /// Sets the stroke color for line shapes.
    pub fn with_line_color(mut self, color: Color) -> Self {
        self.line_color = Some(color);
        self
    }

    /// Sets the stroke and fill color for polygon shapes.
    pub fn with_polygon_color(mut self, color: Color) -> Self {
        self.polygon_color = Some(color);
        self
    }
}

/// A drawable, styled object placed on the map surface.
#[derive(Debug, Clone)]
pub struct Shape {
    id: ShapeId,
    properties: Properties,
    geometry: ShapeGeometry,
}

impl Shape {
    /// Identity of the shape on the map surface.
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Attribute map of the source feature, with style overrides resolved.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Styled geometry of the shape.
    pub fn geometry(&self) -> &ShapeGeometry {
        &self.geometry
    }
}

/// Styled geometry variants of a [`Shape`].
#[derive(Debug, Clone)]
pub enum ShapeGeometry {
    /// An image marker placed at each point of a point feature.
    Icon(IconShape),
    /// A stroked line.
    Line(LineShape),
    /// A filled polygon with an outline.
    Polygon(PolygonShape),
}

/// Point feature rendered as an image marker.
#[derive(Debug, Clone)]
pub struct IconShape {
    /// Marker positions.
    pub positions: Vec<GeoPoint>,
    /// Marker image.
    pub image: ImageRef,
}

/// Line feature rendered as a stroked path.
#[derive(Debug, Clone)]
pub struct LineShape {
    /// Contours of the line.
    pub contours: Vec<Vec<GeoPoint>>,
    /// Stroke color.
    pub stroke: Color,
    /// Stroke width in pixels.
    pub width: f64,
}

/// Polygon feature rendered as a filled area with an outline.
#[derive(Debug, Clone)]
pub struct PolygonShape {
    /// Rings of the polygon: the outer ring and the holes, in source order.
    pub rings: Vec<Vec<GeoPoint>>,
    /// Outline color.
    pub stroke: Color,
    /// Fill color.
    pub fill: Color,
    /// Opacity of the fill, `0.0..=1.0`.
    pub fill_opacity: f64,
}

/// Builds a drawable shape from a feature, applying the given style overrides.
///
/// Returns `None` for degenerate features that have nothing to draw (no
/// coordinates).
pub fn build_shape(feature: FeatureData, style: &ShapeStyle) -> Option<Shape> {
    let FeatureData {
        geometry,
        mut properties,
    } = feature;

    let geometry = match geometry {
        FeatureGeometry::Point(positions) => {
            if positions.is_empty() {
                return None;
            }

            let image = style
                .point_icon
                .clone()
                .unwrap_or_else(|| ImageRef::new(DEFAULT_MARKER_IMAGE));
            ShapeGeometry::Icon(IconShape { positions, image })
        }
        FeatureGeometry::Line(contours) => {
            if contours.iter().all(|c| c.is_empty()) {
                return None;
            }

            if let Some(color) = style.line_color {
                properties.insert("stroke".into(), MvtValue::String(color.to_hex()));
            }

            ShapeGeometry::Line(LineShape {
                stroke: color_property(&properties, "stroke").unwrap_or(DEFAULT_STROKE),
                width: f64_property(&properties, "stroke-width").unwrap_or(DEFAULT_STROKE_WIDTH),
                contours,
            })
        }
        FeatureGeometry::Polygon(rings) => {
            if rings.iter().all(|r| r.is_empty()) {
                return None;
            }

            if let Some(color) = style.polygon_color {
                let hex = MvtValue::String(color.to_hex());
                properties.insert("stroke".into(), hex.clone());
                properties.insert("fill".into(), hex);
                properties.insert(
                    "fill-opacity".into(),
                    MvtValue::Double(OVERRIDE_FILL_OPACITY),
                );
            }

            ShapeGeometry::Polygon(PolygonShape {
                stroke: color_property(&properties, "stroke").unwrap_or(DEFAULT_STROKE),
                fill: color_property(&properties, "fill").unwrap_or(DEFAULT_FILL),
                fill_opacity: f64_property(&properties, "fill-opacity")
                    .unwrap_or(DEFAULT_FILL_OPACITY),
                rings,
            })
        }
    };

    Some(Shape {
        id: ShapeId::next_id(),
        properties,
        geometry,
    })
}

fn color_property(properties: &Properties, key: &str) -> Option<Color> {
    match properties.get(key)? {
        MvtValue::String(value) => Color::try_from_hex(value),
        _ => None,
    }
}

fn f64_property(properties: &Properties, key: &str) -> Option<f64> {
    match properties.get(key)? {
        MvtValue::Double(value) => Some(*value),
        MvtValue::Float(value) => Some(*value as f64),
        MvtValue::Int64(value) => Some(*value as f64),
        MvtValue::Uint64(value) => Some(*value as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_feature() -> FeatureData {
        FeatureData::new(
            FeatureGeometry::Point(vec![GeoPoint::latlon(52.52, 13.405)]),
            Properties::new(),
        )
    }

    fn line_feature(properties: Properties) -> FeatureData {
        FeatureData::new(
            FeatureGeometry::Line(vec![vec![
                GeoPoint::latlon(0.0, 0.0),
                GeoPoint::latlon(1.0, 1.0),
            ]]),
            properties,
        )
    }

    fn polygon_feature() -> FeatureData {
        FeatureData::new(
            FeatureGeometry::Polygon(vec![vec![
                GeoPoint::latlon(0.0, 0.0),
                GeoPoint::latlon(1.0, 0.0),
                GeoPoint::latlon(1.0, 1.0),
                GeoPoint::latlon(0.0, 0.0),
            ]]),
            Properties::new(),
        )
    }

    #[test]
    fn point_uses_default_marker() {
        let shape = build_shape(point_feature(), &ShapeStyle::default()).unwrap();
        let ShapeGeometry::Icon(icon) = shape.geometry() else {
            panic!("invalid shape geometry");
        };
        assert_eq!(icon.image.as_str(), DEFAULT_MARKER_IMAGE);
    }

    #[test]
    fn point_icon_override() {
        let style = ShapeStyle::default().with_point_icon(ImageRef::new("custom.png"));
        let shape = build_shape(point_feature(), &style).unwrap();
        let ShapeGeometry::Icon(icon) = shape.geometry() else {
            panic!("invalid shape geometry");
        };
        assert_eq!(icon.image.as_str(), "custom.png");
    }

    #[test]
    fn line_color_override_resolves_into_properties() {
        let style = ShapeStyle::default().with_line_color(Color::BLUE);
        let shape = build_shape(line_feature(Properties::new()), &style).unwrap();

        assert_eq!(
            shape.properties().get("stroke"),
            Some(&MvtValue::String("#0000FFFF".into()))
        );
        let ShapeGeometry::Line(line) = shape.geometry() else {
            panic!("invalid shape geometry");
        };
        assert_eq!(line.stroke, Color::BLUE);
    }

    #[test]
    fn line_respects_feature_stroke_property() {
        let mut properties = Properties::new();
        properties.insert("stroke".into(), MvtValue::String("#00FF00".into()));
        properties.insert("stroke-width".into(), MvtValue::Double(4.0));

        let shape = build_shape(line_feature(properties), &ShapeStyle::default()).unwrap();
        let ShapeGeometry::Line(line) = shape.geometry() else {
            panic!("invalid shape geometry");
        };
        assert_eq!(line.stroke, Color::GREEN);
        assert_eq!(line.width, 4.0);
    }

    #[test]
    fn polygon_color_override() {
        let style = ShapeStyle::default().with_polygon_color(Color::RED);
        let shape = build_shape(polygon_feature(), &style).unwrap();

        let red = MvtValue::String("#FF0000FF".into());
        assert_eq!(shape.properties().get("stroke"), Some(&red));
        assert_eq!(shape.properties().get("fill"), Some(&red));
        assert_eq!(
            shape.properties().get("fill-opacity"),
            Some(&MvtValue::Double(0.5))
        );

        let ShapeGeometry::Polygon(polygon) = shape.geometry() else {
            panic!("invalid shape geometry");
        };
        assert_eq!(polygon.stroke, Color::RED);
        assert_eq!(polygon.fill, Color::RED);
        assert_eq!(polygon.fill_opacity, 0.5);
    }

    #[test]
    fn degenerate_features_produce_no_shape() {
        let empty_point = FeatureData::new(FeatureGeometry::Point(vec![]), Properties::new());
        assert!(build_shape(empty_point, &ShapeStyle::default()).is_none());

        let empty_line = FeatureData::new(FeatureGeometry::Line(vec![]), Properties::new());
        assert!(build_shape(empty_line, &ShapeStyle::default()).is_none());
    }

    #[test]
    fn shape_ids_are_unique() {
        let a = build_shape(point_feature(), &ShapeStyle::default()).unwrap();
        let b = build_shape(point_feature(), &ShapeStyle::default()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn tile_feature_converts_to_geographic_coordinates() {
        let feature = MvtFeature {
            id: None,
            properties: Default::default(),
            geometry: MvtGeometry::Point(vec![graticule_mvt::Point::new(0.5, 0.5)]),
        };

        let converted = FeatureData::from_tile_feature(&feature, TileId::new(0, 0, 0));
        let FeatureGeometry::Point(points) = &converted.geometry else {
            panic!("invalid geometry");
        };
        assert_eq!(points.len(), 1);
        assert!(points[0].lat().abs() < 1e-10);
        assert!(points[0].lon().abs() < 1e-10);
    }
}
