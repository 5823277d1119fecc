//! Reader for the Mapbox Vector Tile (MVT) binary format.
//!
//! A tile payload is decoded into a list of named [layers](MvtLayer), each containing
//! [features](MvtFeature) with a geometry and an attribute map. Coordinates are
//! normalized into the `0..1` square of the tile extent, so the consumer can place
//! them by the tile position alone.
//!
//! Decoding is tolerant to feature-local problems: a malformed feature or attribute
//! value is skipped (with a warning) and the rest of the tile is decoded. Only a
//! payload in which no valid layer can be located fails as a whole.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use bytes::Buf;
use geozero::mvt::tile::GeomType;
use geozero::mvt::{Message as _, Tile};
use serde::{Deserialize, Serialize};

use crate::error::MvtError;

pub mod error;

/// Point of a tile geometry, in tile-extent units (`0..1` covers the tile).
pub type Point = nalgebra::Point2<f32>;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// Decoded vector tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorTile {
    /// Feature layers of the tile.
    pub layers: Vec<MvtLayer>,
}

/// A named feature layer of a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MvtLayer {
    /// Name of the layer.
    pub name: String,
    /// Features of the layer, in encoding order.
    pub features: Vec<MvtFeature>,
    /// Tile extent the geometries were encoded with.
    pub extent: u32,
}

/// One feature of a tile layer: a geometry with an attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MvtFeature {
    /// Feature id, if the source assigned one.
    pub id: Option<u64>,
    /// Attribute map of the feature.
    pub properties: HashMap<String, MvtValue>,
    /// Geometry of the feature.
    pub geometry: MvtGeometry,
}

/// Typed attribute value of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MvtValue {
    /// String value.
    String(String),
    /// F32 value.
    Float(f32),
    /// F64 value.
    Double(f64),
    /// Signed integer value (both `int` and `sint` wire variants).
    Int64(i64),
    /// Unsigned integer value.
    Uint64(u64),
    /// Boolean value.
    Bool(bool),
    /// A value that could not be decoded.
    Unknown,
}

impl Display for MvtValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MvtValue::String(v) => write!(f, "{v}"),
            MvtValue::Float(v) => write!(f, "{v}"),
            MvtValue::Double(v) => write!(f, "{v}"),
            MvtValue::Int64(v) => write!(f, "{v}"),
            MvtValue::Uint64(v) => write!(f, "{v}"),
            MvtValue::Bool(v) => write!(f, "{v}"),
            MvtValue::Unknown => write!(f, "<NONE>"),
        }
    }
}

impl MvtValue {
    /// Compares the value with its string representation without allocating.
    pub fn eq_str(&self, str_value: &str) -> bool {
        match &self {
            MvtValue::String(s) => s == str_value,
            MvtValue::Float(v) => str_value.parse::<f32>() == Ok(*v),
            MvtValue::Double(v) => str_value.parse::<f64>() == Ok(*v),
            MvtValue::Int64(v) => str_value.parse::<i64>() == Ok(*v),
            MvtValue::Uint64(v) => str_value.parse::<u64>() == Ok(*v),
            MvtValue::Bool(v) => str_value.parse::<bool>() == Ok(*v),
            MvtValue::Unknown => false,
        }
    }
}

/// Feature geometry.
///
/// Line and polygon geometries consist of one or more coordinate sequences: separate
/// contours of a multiline, or rings of a polygon (outer and holes, in encoding
/// order). Polygon rings are closed, with the last point equal to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MvtGeometry {
    /// One or more separate points.
    Point(Vec<Point>),
    /// Contours of a line.
    Line(Vec<Vec<Point>>),
    /// Rings of a polygon.
    Polygon(Vec<Vec<Point>>),
}

impl VectorTile {
    /// Decodes a tile from its binary representation.
    ///
    /// Returns an error only if the payload structure cannot be read at all; individual
    /// invalid layers, features and values are skipped.
    pub fn decode<B: Buf>(buffer: B) -> Result<VectorTile, MvtError> {
        let pb = Tile::decode(buffer)?;

        let mut layers = Vec::with_capacity(pb.layers.len());
        for pb_layer in pb.layers {
            let name = pb_layer.name.clone();
            match MvtLayer::decode(pb_layer) {
                Ok(layer) => layers.push(layer),
                Err(e) => log::warn!("Skipping tile layer {name}: {e}"),
            }
        }

        if layers.is_empty() {
            return Err(MvtError::Format(
                "tile does not contain any valid layers".into(),
            ));
        }

        Ok(VectorTile { layers })
    }
}

impl MvtLayer {
    fn decode(pb_layer: geozero::mvt::tile::Layer) -> Result<Self, MvtError> {
        let geozero::mvt::tile::Layer {
            name,
            keys,
            values,
            features,
            version,
            extent,
        } = pb_layer;

        if version != 2 {
            return Err(MvtError::Format(format!("unsupported version: {version}")));
        }

        let extent = extent.unwrap_or(4096);
        let values: Vec<MvtValue> = values
            .into_iter()
            .map(|pb_value| {
                MvtValue::decode(pb_value).unwrap_or_else(|e| {
                    log::warn!("Invalid attribute value in layer {name}: {e}");
                    MvtValue::Unknown
                })
            })
            .collect();

        let mut decoded = Vec::with_capacity(features.len());
        for feature in features {
            match MvtFeature::decode(feature, extent, &keys, &values) {
                // `None` means the geometry type is not supported, which is not an error
                Ok(Some(feature)) => decoded.push(feature),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping feature in layer {name}: {e}"),
            }
        }

        Ok(MvtLayer {
            name,
            features: decoded,
            extent,
        })
    }
}

impl MvtValue {
    fn decode(pb_value: geozero::mvt::tile::Value) -> Result<MvtValue, MvtError> {
        let candidates = [
            pb_value.string_value.map(MvtValue::String),
            pb_value.float_value.map(MvtValue::Float),
            pb_value.double_value.map(MvtValue::Double),
            pb_value.int_value.map(MvtValue::Int64),
            pb_value.uint_value.map(MvtValue::Uint64),
            pb_value.sint_value.map(MvtValue::Int64),
            pb_value.bool_value.map(MvtValue::Bool),
        ];

        let mut present = candidates.into_iter().flatten();
        match (present.next(), present.next()) {
            (Some(value), None) => Ok(value),
            (None, _) => Err(MvtError::Format("no value present".into())),
            (Some(_), Some(_)) => Err(MvtError::Format("more than one value present".into())),
        }
    }
}

impl MvtFeature {
    fn decode(
        pb_feature: geozero::mvt::tile::Feature,
        extent: u32,
        keys: &[String],
        values: &[MvtValue],
    ) -> Result<Option<MvtFeature>, MvtError> {
        let geozero::mvt::tile::Feature {
            id,
            tags,
            r#type,
            geometry,
        } = pb_feature;

        let geometry = match geom_type(r#type) {
            GeomType::Point => MvtGeometry::Point(decode_points(&geometry, extent)?),
            GeomType::Linestring => MvtGeometry::Line(decode_paths(&geometry, extent)?),
            GeomType::Polygon => MvtGeometry::Polygon(decode_paths(&geometry, extent)?),
            GeomType::Unknown => return Ok(None),
        };

        let properties = decode_properties(&tags, keys, values)?;

        Ok(Some(MvtFeature {
            id,
            properties,
            geometry,
        }))
    }
}

fn geom_type(pb_type: Option<i32>) -> GeomType {
    match pb_type {
        Some(1) => GeomType::Point,
        Some(2) => GeomType::Linestring,
        Some(3) => GeomType::Polygon,
        _ => GeomType::Unknown,
    }
}

fn decode_properties(
    tags: &[u32],
    keys: &[String],
    values: &[MvtValue],
) -> Result<HashMap<String, MvtValue>, MvtError> {
    if tags.len() % 2 != 0 {
        return Err(MvtError::Format(
            "invalid number of tags in feature".into(),
        ));
    }

    let mut properties = HashMap::with_capacity(tags.len() / 2);
    for pair in tags.chunks_exact(2) {
        let key = keys
            .get(pair[0] as usize)
            .ok_or_else(|| MvtError::Format(format!("invalid tag key index {}", pair[0])))?;
        let value = values
            .get(pair[1] as usize)
            .ok_or_else(|| MvtError::Format(format!("invalid tag value index {}", pair[1])))?;

        properties.insert(key.clone(), value.clone());
    }

    Ok(properties)
}

fn decode_points(commands: &[u32], extent: u32) -> Result<Vec<Point>, MvtError> {
    let mut scanner = GeomScanner::new(commands, extent);
    let mut points = vec![];

    while !scanner.is_done() {
        let (command, count) = scanner.next_header()?;
        if command != CMD_MOVE_TO {
            return Err(MvtError::Format(format!(
                "point geometry cannot contain command {command}"
            )));
        }

        for _ in 0..count {
            points.push(scanner.next_point()?);
        }
    }

    Ok(points)
}

fn decode_paths(commands: &[u32], extent: u32) -> Result<Vec<Vec<Point>>, MvtError> {
    let mut scanner = GeomScanner::new(commands, extent);
    let mut paths = vec![];
    let mut current: Option<Vec<Point>> = None;

    while !scanner.is_done() {
        let (command, count) = scanner.next_header()?;
        match command {
            CMD_MOVE_TO => {
                if count != 1 {
                    return Err(MvtError::Format(format!(
                        "MoveTo in a path must have count 1, but has {count}"
                    )));
                }

                if let Some(path) = current.take() {
                    paths.push(path);
                }
                current = Some(vec![scanner.next_point()?]);
            }
            CMD_LINE_TO => {
                let path = current
                    .as_mut()
                    .ok_or_else(|| MvtError::Format("LineTo before MoveTo".into()))?;
                for _ in 0..count {
                    path.push(scanner.next_point()?);
                }
            }
            CMD_CLOSE_PATH => {
                if count != 1 {
                    return Err(MvtError::Format(format!(
                        "ClosePath must have count 1, but has {count}"
                    )));
                }

                let mut path = current
                    .take()
                    .ok_or_else(|| MvtError::Format("ClosePath before MoveTo".into()))?;
                if let Some(first) = path.first().copied() {
                    path.push(first);
                }
                paths.push(path);
            }
            other => {
                return Err(MvtError::Format(format!("unknown command id {other}")));
            }
        }
    }

    if let Some(path) = current {
        paths.push(path);
    }

    Ok(paths)
}

/// Reads a geometry command stream, keeping track of the delta-encoded cursor.
///
/// The cursor is accumulated in integer tile units and only divided by the extent
/// when a point is emitted, so rounding does not drift along long paths.
struct GeomScanner<'a> {
    commands: &'a [u32],
    position: usize,
    cursor: (i32, i32),
    scale: f32,
}

impl<'a> GeomScanner<'a> {
    fn new(commands: &'a [u32], extent: u32) -> Self {
        Self {
            commands,
            position: 0,
            cursor: (0, 0),
            scale: extent as f32,
        }
    }

    fn is_done(&self) -> bool {
        self.position >= self.commands.len()
    }

    fn next_header(&mut self) -> Result<(u32, u32), MvtError> {
        let integer = self.next_integer()?;
        let count = integer >> 3;
        if count == 0 {
            return Err(MvtError::Format("command count cannot be 0".into()));
        }

        Ok((integer & 0x7, count))
    }

    fn next_point(&mut self) -> Result<Point, MvtError> {
        let dx = decode_zigzag(self.next_integer()?);
        let dy = decode_zigzag(self.next_integer()?);
        self.cursor.0 = self.cursor.0.wrapping_add(dx);
        self.cursor.1 = self.cursor.1.wrapping_add(dy);

        Ok(Point::new(
            self.cursor.0 as f32 / self.scale,
            self.cursor.1 as f32 / self.scale,
        ))
    }

    fn next_integer(&mut self) -> Result<u32, MvtError> {
        let value = self.commands.get(self.position).copied().ok_or_else(|| {
            MvtError::Format("expected value to be present, but found end of data".into())
        })?;
        self.position += 1;

        Ok(value)
    }
}

fn decode_zigzag(value: u32) -> i32 {
    if value == u32::MAX {
        // Edge case. The +1 below would overflow with this value.
        return i32::MIN;
    }

    if value & 1 == 0 {
        (value >> 1) as i32
    } else {
        -(((value >> 1) + 1) as i32)
    }
}
