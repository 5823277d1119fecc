//! Interactive image markers ("icons") placed on the map.
//!
//! An [`Icon`] is an image drawn at a geographic position, with a pixel size and an
//! anchor offset that tells the renderer where the image origin lies relative to
//! the position. A draggable icon reacts to the pointer events the host routes to
//! it: while the user drags it around, its position follows the pointer, a
//! separate image variant is shown if one is configured, and every transition is
//! announced to the registered subscribers in order.
//!
//! The host decides which icon a pointer interaction belongs to (it knows where
//! icons are drawn on the screen) and delivers the events through the icon's
//! [`UserEventHandler`] implementation, typically via a [`SharedIcon`] handle that
//! keeps the icon accessible after it was registered with the event processor.

use std::sync::Arc;

use nalgebra::Vector2;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::control::{EventPropagation, MouseButton, UserEvent, UserEventHandler};
use crate::shape::ImageRef;
use crate::tiles::GeoPoint;

/// Size in pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Size {
    width: f64,
    height: f64,
}

impl Size {
    /// Creates a new size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Width in pixels.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> f64 {
        self.height
    }
}

/// An image drawn at a geographic position.
#[derive(Debug, Clone)]
pub struct ImageMarker {
    position: GeoPoint,
    size: Size,
    anchor: Vector2<f64>,
    image: ImageRef,
}

impl ImageMarker {
    /// Creates a marker with the anchor in the image center.
    pub fn new(position: GeoPoint, image: ImageRef, size: Size) -> Self {
        Self {
            position,
            size,
            anchor: Vector2::new(size.width() / 2.0, size.height() / 2.0),
            image,
        }
    }

    /// Sets the anchor: the pixel offset from the image origin to the point of the
    /// image that is drawn at the marker position.
    pub fn with_anchor(mut self, anchor: Vector2<f64>) -> Self {
        self.anchor = anchor;
        self
    }

    /// Position of the marker.
    pub fn position(&self) -> GeoPoint {
        self.position
    }

    /// Moves the marker.
    pub fn set_position(&mut self, position: GeoPoint) {
        self.position = position;
    }

    /// Size of the image in pixels.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Anchor offset in pixels.
    pub fn anchor(&self) -> Vector2<f64> {
        self.anchor
    }

    /// The image of the marker.
    pub fn image(&self) -> &ImageRef {
        &self.image
    }
}

/// Notification sent to the subscribers of an [`Icon`].
///
/// Every event carries the geographic position of the pointer at the moment of the
/// event.
#[derive(Debug, Clone, PartialEq)]
pub enum IconEvent {
    /// The user started dragging the icon; the position is where the pointer was
    /// pressed.
    MoveStarted(GeoPoint),
    /// The icon followed the pointer to a new position. One event per pointer
    /// move.
    Moved(GeoPoint),
    /// The user released the icon; the position is where the pointer was released.
    MoveStopped(GeoPoint),
    /// The icon was clicked without being dragged.
    Clicked(GeoPoint),
}

/// A draggable image marker.
pub struct Icon {
    marker: ImageMarker,
    movement_image: Option<ImageRef>,
    draggable: bool,
    moving: bool,
    subscribers: Vec<Box<dyn FnMut(&IconEvent)>>,
}

impl Icon {
    /// Creates an icon at the given position, with the anchor in the image center.
    pub fn new(position: GeoPoint, image: ImageRef, size: Size) -> Self {
        Self {
            marker: ImageMarker::new(position, image, size),
            movement_image: None,
            draggable: false,
            moving: false,
            subscribers: Vec::new(),
        }
    }

    /// Sets the anchor offset of the icon image.
    pub fn with_anchor(mut self, anchor: Vector2<f64>) -> Self {
        self.marker = self.marker.with_anchor(anchor);
        self
    }

    /// Makes the icon draggable (or not).
    pub fn draggable(mut self, draggable: bool) -> Self {
        self.draggable = draggable;
        self
    }

    /// Sets the image shown while the icon is dragged.
    pub fn with_movement_image(mut self, image: ImageRef) -> Self {
        self.movement_image = Some(image);
        self
    }

    /// Current position of the icon.
    pub fn position(&self) -> GeoPoint {
        self.marker.position()
    }

    /// Size of the icon in pixels.
    pub fn size(&self) -> Size {
        self.marker.size()
    }

    /// Anchor offset of the icon image in pixels.
    pub fn anchor(&self) -> Vector2<f64> {
        self.marker.anchor()
    }

    /// Sets the image shown while the icon is dragged.
    pub fn set_movement_image(&mut self, image: Option<ImageRef>) {
        self.movement_image = image;
    }

    /// The image shown while the icon is dragged, if one is configured.
    pub fn movement_image(&self) -> Option<&ImageRef> {
        self.movement_image.as_ref()
    }

    /// Returns true while the user is dragging the icon.
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Returns true if the user can drag the icon.
    pub fn is_draggable(&self) -> bool {
        self.draggable
    }

    /// The image the renderer should currently draw.
    ///
    /// While the icon is dragged this is the movement image, if one is configured;
    /// in every other case it is the regular icon image.
    pub fn active_image(&self) -> &ImageRef {
        if self.moving {
            self.movement_image.as_ref().unwrap_or(self.marker.image())
        } else {
            self.marker.image()
        }
    }

    /// Subscribes to the [events](IconEvent) of the icon.
    ///
    /// Subscribers are called synchronously, in subscription order, once per event.
    pub fn on_event(&mut self, subscriber: impl FnMut(&IconEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    fn emit(&mut self, event: IconEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }

    fn start_move(&mut self, position: GeoPoint) {
        self.moving = true;
        self.emit(IconEvent::MoveStarted(position));
    }

    fn move_to(&mut self, position: GeoPoint) {
        self.marker.set_position(position);
        self.emit(IconEvent::Moved(position));
    }

    fn stop_move(&mut self, position: GeoPoint) {
        self.moving = false;
        self.emit(IconEvent::MoveStopped(position));
    }
}

/// Shared handle to an [`Icon`].
///
/// The event processor takes ownership of its handlers, so an icon is wrapped
/// into a shared handle first: one clone goes to the processor, another stays
/// with the application to read the icon state or subscribe to its events.
#[derive(Clone)]
pub struct SharedIcon(Arc<RwLock<Icon>>);

impl SharedIcon {
    /// Wraps the icon for shared access.
    pub fn new(icon: Icon) -> Self {
        Self(Arc::new(RwLock::new(icon)))
    }

    /// Locks the icon for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Icon> {
        self.0.read()
    }

    /// Locks the icon for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Icon> {
        self.0.write()
    }
}

impl UserEventHandler for SharedIcon {
    fn handle(&mut self, event: &UserEvent) -> EventPropagation {
        self.0.write().handle(event)
    }
}

impl UserEventHandler for Icon {
    fn handle(&mut self, event: &UserEvent) -> EventPropagation {
        match event {
            UserEvent::DragStarted(MouseButton::Left, event) if self.draggable => {
                self.start_move(event.geo_position);
                EventPropagation::Consume
            }
            UserEvent::Drag(_, event) if self.moving => {
                self.move_to(event.geo_position);
                EventPropagation::Stop
            }
            UserEvent::DragEnded(_, event) if self.moving => {
                self.stop_move(event.geo_position);
                EventPropagation::Stop
            }
            UserEvent::Click(MouseButton::Left, event) => {
                self.emit(IconEvent::Clicked(event.geo_position));
                EventPropagation::Stop
            }
            _ => EventPropagation::Propagate,
        }
    }
}
