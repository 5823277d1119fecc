use web_time::SystemTime;

use crate::control::{
    EventPropagation, MouseButtonsState, MouseEvent, PointerInput, RawUserEvent, ScreenPoint,
    UserEvent, UserEventHandler,
};
use crate::tiles::GeoPoint;

const DRAG_THRESHOLD: f64 = 3.0;
const CLICK_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(200);

/// Converts raw events from the windowing host into [`UserEvent`]s and feeds them
/// to the registered handlers.
pub struct EventProcessor {
    handlers: Vec<Box<dyn UserEventHandler>>,
    pointer: PointerInput,
    pressed: PointerInput,

    buttons_state: MouseButtonsState,
    last_pressed_time: SystemTime,

    drag_target: Option<usize>,
}

impl Default for EventProcessor {
    fn default() -> Self {
        let origin = PointerInput {
            screen_position: ScreenPoint::origin(),
            geo_position: GeoPoint::default(),
        };

        Self {
            handlers: vec![],
            pointer: origin,
            pressed: origin,
            buttons_state: Default::default(),
            last_pressed_time: SystemTime::UNIX_EPOCH,
            drag_target: None,
        }
    }
}

impl EventProcessor {
    /// Adds a handler to the end of the handler list.
    pub fn add_handler(&mut self, handler: impl UserEventHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Processes a raw event from the host.
    pub fn handle(&mut self, event: RawUserEvent) {
        for user_event in self.process(event) {
            self.dispatch(user_event);
        }
    }

    fn process(&mut self, event: RawUserEvent) -> Vec<UserEvent> {
        let now = SystemTime::now();
        match event {
            RawUserEvent::ButtonPressed(button, input) => {
                self.buttons_state.set_pressed(button);
                self.last_pressed_time = now;
                self.pointer = input;
                self.pressed = input;

                vec![UserEvent::ButtonPressed(button, self.mouse_event(input))]
            }
            RawUserEvent::ButtonReleased(button, input) => {
                self.buttons_state.set_released(button);
                self.pointer = input;

                let mut events = vec![UserEvent::ButtonReleased(button, self.mouse_event(input))];

                if self.drag_target.is_some() {
                    // A release that ends a drag is never also a click.
                    events.push(UserEvent::DragEnded(button, self.mouse_event(input)));
                } else if now
                    .duration_since(self.last_pressed_time)
                    .unwrap_or_default()
                    < CLICK_TIMEOUT
                {
                    events.push(UserEvent::Click(button, self.mouse_event(input)));
                }

                events
            }
            RawUserEvent::PointerMoved(input) => {
                self.pointer = input;

                let mut events = vec![UserEvent::PointerMoved(self.mouse_event(input))];

                if let Some(button) = self.buttons_state.single_pressed() {
                    if self.drag_target.is_some() {
                        events.push(UserEvent::Drag(button, self.mouse_event(input)));
                    } else if taxicab_distance(
                        input.screen_position,
                        self.pressed.screen_position,
                    ) > DRAG_THRESHOLD
                    {
                        // The drag starts where the button was pressed, not where
                        // the threshold was crossed.
                        events.push(UserEvent::DragStarted(
                            button,
                            self.mouse_event(self.pressed),
                        ));
                    }
                }

                events
            }
        }
    }

    fn dispatch(&mut self, event: UserEvent) {
        if matches!(event, UserEvent::Drag(..) | UserEvent::DragEnded(..)) {
            let Some(target) = self.drag_target else {
                return;
            };

            if let Some(handler) = self.handlers.get_mut(target) {
                handler.handle(&event);
            }

            if matches!(event, UserEvent::DragEnded(..)) {
                self.drag_target = None;
            }

            return;
        }

        // The pointer move that crossed the drag threshold is delivered to the
        // consuming handler as the first drag event.
        let first_drag = match &event {
            UserEvent::DragStarted(button, _) => {
                Some(UserEvent::Drag(*button, self.mouse_event(self.pointer)))
            }
            _ => None,
        };

        let mut drag_target = None;
        for (index, handler) in self.handlers.iter_mut().enumerate() {
            match handler.handle(&event) {
                EventPropagation::Propagate => {}
                EventPropagation::Stop => break,
                EventPropagation::Consume => {
                    if let Some(drag) = &first_drag {
                        drag_target = Some(index);
                        handler.handle(drag);
                    }

                    break;
                }
            }
        }

        if drag_target.is_some() {
            self.drag_target = drag_target;
        }
    }

    fn mouse_event(&self, input: PointerInput) -> MouseEvent {
        MouseEvent {
            screen_position: input.screen_position,
            geo_position: input.geo_position,
            buttons: self.buttons_state,
        }
    }
}

fn taxicab_distance(a: ScreenPoint, b: ScreenPoint) -> f64 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}
