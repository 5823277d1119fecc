//! Layer that shows a fixed set of geographic feature records.

use crate::layer::MapSurface;
use crate::shape::{build_shape, FeatureData, Shape, ShapeStyle};

/// Layer built from a set of feature records that do not come from tiles.
///
/// The records are typically produced by an application-side reader of some vector
/// file format; the layer does not care where they come from.
///
/// The layer goes through a simple lifecycle: it starts empty, [`activate`](Self::activate)
/// builds the shape collection from the current records and installs it onto the
/// map surface, and [`clear_shapes`](Self::clear_shapes) empties it again. When the
/// records change, the next activation rebuilds everything from scratch; shapes of
/// the previous build are discarded, not reused.
pub struct FileLayer {
    records: Vec<FeatureData>,
    style: ShapeStyle,
    shapes: Vec<Shape>,
}

impl FileLayer {
    /// Creates a layer from the given records.
    pub fn new(records: Vec<FeatureData>, style: ShapeStyle) -> Self {
        Self {
            records,
            style,
            shapes: Vec::new(),
        }
    }

    /// Replaces the source records. The shape collection is not touched until the
    /// next activation.
    pub fn set_records(&mut self, records: Vec<FeatureData>) {
        self.records = records;
    }

    /// The shapes of the current build.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Builds the shape collection from the current records and installs it onto
    /// the surface.
    ///
    /// Shapes of a previous build are removed from the surface and dropped first.
    /// Records the factory produces no shape for are skipped.
    pub fn activate(&mut self, surface: &mut dyn MapSurface) {
        for shape in &self.shapes {
            surface.remove_item(shape.id());
        }

        self.shapes = self
            .records
            .iter()
            .filter_map(|record| build_shape(record.clone(), &self.style))
            .collect();

        self.add_shapes_to_map(surface);
    }

    /// Appends a shape to the collection without installing it.
    pub fn add_shape(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    /// Installs the current shape collection onto the surface.
    ///
    /// Every shape is removed before it is added, so repeated calls with the same
    /// collection leave the surface unchanged.
    pub fn add_shapes_to_map(&self, surface: &mut dyn MapSurface) {
        for shape in &self.shapes {
            surface.remove_item(shape.id());
            surface.add_item(shape);
        }
    }

    /// Removes all shapes from the surface and empties the collection.
    pub fn clear_shapes(&mut self, surface: &mut dyn MapSurface) {
        for shape in &self.shapes {
            surface.remove_item(shape.id());
        }

        self.shapes.clear();
    }
}
