//! Shared fixtures for the test modules of the crate.

use std::collections::HashMap;

use bytes::Bytes;
use geozero::mvt::{tile, Message as _, Tile};

use crate::layer::MapSurface;
use crate::shape::{Shape, ShapeId};

fn cmd(id: u32, count: u32) -> u32 {
    (count << 3) | id
}

fn zig(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Encodes a small valid tile: two point features, one line and one polygon, with
/// a `kind` attribute on every feature.
pub(crate) fn test_tile_bytes() -> Bytes {
    let features = vec![
        tile::Feature {
            id: Some(1),
            tags: vec![0, 0],
            r#type: Some(1),
            geometry: vec![cmd(1, 1), zig(1024), zig(1024)],
        },
        tile::Feature {
            id: Some(2),
            tags: vec![0, 0],
            r#type: Some(1),
            geometry: vec![cmd(1, 1), zig(2048), zig(2048)],
        },
        tile::Feature {
            id: Some(3),
            tags: vec![0, 1],
            r#type: Some(2),
            geometry: vec![cmd(1, 1), zig(0), zig(0), cmd(2, 2), zig(512), zig(0), zig(0), zig(512)],
        },
        tile::Feature {
            id: Some(4),
            tags: vec![0, 2],
            r#type: Some(3),
            geometry: vec![
                cmd(1, 1),
                zig(0),
                zig(0),
                cmd(2, 3),
                zig(1024),
                zig(0),
                zig(0),
                zig(1024),
                zig(-1024),
                zig(0),
                cmd(7, 1),
            ],
        },
    ];

    let layer = tile::Layer {
        version: 2,
        name: "features".into(),
        features,
        keys: vec!["kind".into()],
        values: vec![
            tile::Value {
                string_value: Some("point".into()),
                ..Default::default()
            },
            tile::Value {
                string_value: Some("line".into()),
                ..Default::default()
            },
            tile::Value {
                string_value: Some("polygon".into()),
                ..Default::default()
            },
        ],
        extent: Some(4096),
    };

    Bytes::from(Tile { layers: vec![layer] }.encode_to_vec())
}

/// Map surface that records the shapes installed on it.
#[derive(Default)]
pub(crate) struct TestSurface {
    items: Vec<ShapeId>,
}

impl TestSurface {
    pub fn ids(&self) -> &[ShapeId] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl MapSurface for TestSurface {
    fn add_item(&mut self, shape: &Shape) {
        if !self.items.contains(&shape.id()) {
            self.items.push(shape.id());
        }
    }

    fn remove_item(&mut self, id: ShapeId) {
        self.items.retain(|item| *item != id);
    }
}

/// Properties map with a single `kind` attribute, as the test tile features carry.
pub(crate) fn kind_properties(kind: &str) -> HashMap<String, graticule_mvt::MvtValue> {
    let mut properties = HashMap::new();
    properties.insert(
        "kind".into(),
        graticule_mvt::MvtValue::String(kind.into()),
    );
    properties
}
