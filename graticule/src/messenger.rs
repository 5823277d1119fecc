/// Messengers notify the application when a layer changed and the map surface
/// should be redrawn.
pub trait Messenger: Send + Sync {
    /// Request an update of the map surface.
    fn request_redraw(&self);
}

/// Messenger that does nothing.
#[derive(Debug, Default, Copy, Clone)]
pub struct DummyMessenger;

impl Messenger for DummyMessenger {
    fn request_redraw(&self) {}
}
