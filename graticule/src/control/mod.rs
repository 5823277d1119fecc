//! User interaction handling for the map surface.
//!
//! Interaction is processed in two steps:
//! 1. The windowing host converts its native events into [`RawUserEvent`] values.
//!    Because the host owns the camera, it also attaches the geographic position
//!    under the pointer to every event (see [`PointerInput`]).
//! 2. The [`EventProcessor`] keeps track of the input state (pressed buttons,
//!    pointer position, click timing) and converts the raw events into
//!    [`UserEvent`]s, which it feeds to the registered [`UserEventHandler`]s.
//!
//! Handlers are called in registration order until one of them claims the event.
//! A handler that returns [`EventPropagation::Consume`] for a
//! [`UserEvent::DragStarted`] becomes the owner of the drag: all further drag
//! events are delivered only to it.

use nalgebra::Point2;

use crate::tiles::GeoPoint;

mod event_processor;

pub use event_processor::EventProcessor;

/// Screen position in pixels from the top-left corner.
pub type ScreenPoint = Point2<f64>;

/// Pointer state attached by the host to every raw event.
#[derive(Debug, Copy, Clone)]
pub struct PointerInput {
    /// Position of the pointer on the screen.
    pub screen_position: ScreenPoint,
    /// Geographic position under the pointer.
    pub geo_position: GeoPoint,
}

/// Raw user interaction event, as reported by the windowing host.
#[derive(Debug, Clone)]
pub enum RawUserEvent {
    /// A mouse button was pressed.
    ButtonPressed(MouseButton, PointerInput),
    /// A mouse button was released.
    ButtonReleased(MouseButton, PointerInput),
    /// The pointer moved.
    PointerMoved(PointerInput),
}

/// User interaction event, produced by the [`EventProcessor`].
#[derive(Debug, Clone)]
pub enum UserEvent {
    /// A mouse button was pressed.
    ButtonPressed(MouseButton, MouseEvent),
    /// A mouse button was released.
    ButtonReleased(MouseButton, MouseEvent),
    /// A mouse button was clicked: pressed and released shortly after, without
    /// dragging in between.
    Click(MouseButton, MouseEvent),
    /// The pointer moved.
    PointerMoved(MouseEvent),
    /// The user pressed a button and moved the pointer without releasing it. The
    /// event carries the position where the button was pressed.
    DragStarted(MouseButton, MouseEvent),
    /// The pointer moved while dragging. Fired for every pointer move, without
    /// coalescing.
    Drag(MouseButton, MouseEvent),
    /// The button was released while dragging.
    DragEnded(MouseButton, MouseEvent),
}

/// Value returned by a [`UserEventHandler`] to indicate what to do with the event.
pub enum EventPropagation {
    /// Give the event to the next handler.
    Propagate,
    /// Do not give the event to the next handler.
    Stop,
    /// Do not give the event to the next handler, and make this handler the owner
    /// of the started drag.
    Consume,
}

/// Handler of user interaction events.
pub trait UserEventHandler {
    /// Handle the event.
    fn handle(&mut self, event: &UserEvent) -> EventPropagation;
}

impl<T: for<'a> FnMut(&'a UserEvent) -> EventPropagation> UserEventHandler for T {
    fn handle(&mut self, event: &UserEvent) -> EventPropagation {
        self(event)
    }
}

/// State of the pointer at the moment of an event.
#[derive(Debug, Clone)]
pub struct MouseEvent {
    /// Position of the pointer on the screen.
    pub screen_position: ScreenPoint,
    /// Geographic position under the pointer.
    pub geo_position: GeoPoint,
    /// State of the mouse buttons.
    pub buttons: MouseButtonsState,
}

/// Mouse button enum.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MouseButton {
    /// Left mouse button.
    Left,
    /// Middle mouse button (wheel).
    Middle,
    /// Right mouse button.
    Right,
    /// Any other mouse button.
    Other,
}

/// State of a mouse button.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MouseButtonState {
    /// Button is pressed.
    Pressed,
    /// Button is not pressed.
    Released,
}

/// State of all mouse buttons.
#[derive(Debug, Copy, Clone)]
pub struct MouseButtonsState {
    /// State of the left mouse button.
    pub left: MouseButtonState,
    /// State of the middle mouse button.
    pub middle: MouseButtonState,
    /// State of the right mouse button.
    pub right: MouseButtonState,
}

impl MouseButtonsState {
    pub(crate) fn set_pressed(&mut self, button: MouseButton) {
        self.set_state(button, MouseButtonState::Pressed);
    }

    pub(crate) fn set_released(&mut self, button: MouseButton) {
        self.set_state(button, MouseButtonState::Released);
    }

    fn set_state(&mut self, button: MouseButton, state: MouseButtonState) {
        match button {
            MouseButton::Left => self.left = state,
            MouseButton::Middle => self.middle = state,
            MouseButton::Right => self.right = state,
            MouseButton::Other => {}
        }
    }

    pub(crate) fn single_pressed(&self) -> Option<MouseButton> {
        let mut button = None;
        if self.left == MouseButtonState::Pressed && button.replace(MouseButton::Left).is_some() {
            return None;
        }
        if self.middle == MouseButtonState::Pressed && button.replace(MouseButton::Middle).is_some()
        {
            return None;
        }
        if self.right == MouseButtonState::Pressed && button.replace(MouseButton::Right).is_some() {
            return None;
        }

        button
    }
}

impl Default for MouseButtonsState {
    fn default() -> Self {
        Self {
            left: MouseButtonState::Released,
            middle: MouseButtonState::Released,
            right: MouseButtonState::Released,
        }
    }
}
