use crate::coords::Vec2;

use super::frame::InputFrame;
use super::keyboard::Keyboard;
use super::mouse::Mouse;
use super::types::{InputEvent, KeyState, Modifiers, MouseButtonState};

/// Input state for a single window.
///
/// Events are applied as they arrive. Once per poll cycle the runtime calls
/// [`InputState::update`], hands the returned [`InputFrame`] to the
/// application, then calls [`InputState::end_frame`].
#[derive(Debug, Default)]
pub struct InputState {
    pub keyboard: Keyboard,
    pub mouse: Mouse,

    /// Current modifier state.
    pub modifiers: Modifiers,

    /// Whether the window is focused.
    pub focused: bool,

    /// Whether the pointer is inside the window.
    pub pointer_inside: bool,

    // Per-cycle streams, cleared by `end_frame`.
    events: Vec<InputEvent>,
    text: String,
    wheel: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a platform-agnostic input event.
    pub fn apply_event(&mut self, ev: InputEvent) {
        match &ev {
            InputEvent::ModifiersChanged(m) => {
                self.modifiers = *m;
            }

            InputEvent::Focused(f) => {
                self.focused = *f;
                if !*f {
                    // Releases are not delivered to unfocused windows.
                    self.keyboard.release_all();
                    self.mouse.release_all();
                }
            }

            InputEvent::PointerMoved { x, y } => {
                self.pointer_inside = true;
                self.mouse.on_cursor_moved(Vec2::new(*x, *y));
            }

            InputEvent::PointerMotion { dx, dy } => {
                self.mouse.on_raw_motion(*dx, *dy);
            }

            InputEvent::PointerLeft => {
                self.pointer_inside = false;
            }

            InputEvent::Key {
                key,
                state,
                modifiers,
                repeat,
                ..
            } => {
                self.modifiers = *modifiers;

                match state {
                    // Auto-repeat is not a new press.
                    KeyState::Pressed if *repeat => {}
                    KeyState::Pressed => self.keyboard.on_key_press(*key),
                    KeyState::Released => self.keyboard.on_key_release(*key),
                }
            }

            InputEvent::PointerButton {
                button,
                state,
                modifiers,
            } => {
                self.modifiers = *modifiers;

                match state {
                    MouseButtonState::Pressed => self.mouse.on_button_press(*button),
                    MouseButtonState::Released => self.mouse.on_button_release(*button),
                }
            }

            InputEvent::MouseWheel { delta, modifiers } => {
                self.modifiers = *modifiers;
                self.wheel += delta.as_vec2();
            }

            InputEvent::Text(t) => {
                self.text.push_str(t);
            }
        }

        self.events.push(ev);
    }

    /// Closes the current poll cycle on both devices and returns the frame
    /// snapshot.
    pub fn update(&mut self) -> InputFrame<'_> {
        InputFrame {
            keyboard: self.keyboard.update(),
            mouse: self.mouse.update(),
            modifiers: self.modifiers,
            focused: self.focused,
            pointer_inside: self.pointer_inside,
            events: &self.events,
            text: &self.text,
            wheel: self.wheel,
        }
    }

    /// Drops the per-cycle event streams.
    pub fn end_frame(&mut self) {
        self.events.clear();
        self.text.clear();
        self.wheel = Vec2::zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Key, MouseButton, MouseWheelDelta};

    fn key(key: Key, state: KeyState, repeat: bool) -> InputEvent {
        InputEvent::Key {
            key,
            state,
            modifiers: Modifiers::default(),
            code: 0,
            repeat,
        }
    }

    fn button(button: MouseButton, state: MouseButtonState) -> InputEvent {
        InputEvent::PointerButton {
            button,
            state,
            modifiers: Modifiers::default(),
        }
    }

    #[test]
    fn key_press_reaches_frame_after_update() {
        let mut input = InputState::new();
        input.apply_event(key(Key::W, KeyState::Pressed, false));

        let frame = input.update();
        assert!(frame.keyboard.is_key_just_pressed(Key::W));
        assert!(frame.keyboard.is_key_held(Key::W));
    }

    #[test]
    fn key_repeat_does_not_restamp() {
        let mut input = InputState::new();
        input.apply_event(key(Key::W, KeyState::Pressed, false));
        input.update();
        input.end_frame();

        input.apply_event(key(Key::W, KeyState::Pressed, true));
        let frame = input.update();
        assert!(frame.keyboard.is_key_held(Key::W));
        assert!(!frame.keyboard.is_key_just_pressed(Key::W));
    }

    #[test]
    fn keyboard_and_mouse_frames_are_independent() {
        let mut input = InputState::new();
        input.apply_event(key(Key::Unknown(0), KeyState::Pressed, false));
        input.apply_event(button(MouseButton::Other(0), MouseButtonState::Pressed));

        // Advancing one device leaves the other untouched.
        input.keyboard.update();
        assert_eq!(input.keyboard.frame(), 2);

        let frame = input.update();
        assert_eq!(frame.keyboard.frame(), 3);
        assert_eq!(frame.mouse.frame(), 2);
        assert!(!frame.keyboard.is_key_just_pressed(Key::Unknown(0)));
        assert!(frame.mouse.is_button_just_pressed(MouseButton::Other(0)));
    }

    #[test]
    fn both_shift_keys_are_tracked_separately() {
        let mut input = InputState::new();
        input.apply_event(key(Key::ShiftLeft, KeyState::Pressed, false));
        input.apply_event(key(Key::ShiftRight, KeyState::Pressed, false));
        input.apply_event(key(Key::ShiftLeft, KeyState::Released, false));

        let frame = input.update();
        assert!(!frame.keyboard.is_key_held(Key::ShiftLeft));
        assert!(frame.keyboard.is_key_held(Key::ShiftRight));
        assert!(frame.keyboard.is_key_just_pressed(Key::ShiftRight));
    }

    #[test]
    fn focus_loss_releases_everything() {
        let mut input = InputState::new();
        input.apply_event(InputEvent::Focused(true));
        input.apply_event(key(Key::ShiftLeft, KeyState::Pressed, false));
        input.apply_event(button(MouseButton::Left, MouseButtonState::Pressed));
        input.apply_event(InputEvent::Focused(false));

        let frame = input.update();
        assert!(!frame.focused);
        assert!(!frame.keyboard.is_key_held(Key::ShiftLeft));
        assert!(!frame.mouse.is_button_held(MouseButton::Left));
    }

    #[test]
    fn per_cycle_streams_reset_after_end_frame() {
        let mut input = InputState::new();
        input.apply_event(InputEvent::Text("hé".to_string()));
        input.apply_event(InputEvent::Text("!".to_string()));
        input.apply_event(InputEvent::MouseWheel {
            delta: MouseWheelDelta::Line { x: 0.0, y: 1.0 },
            modifiers: Modifiers::default(),
        });
        input.apply_event(InputEvent::MouseWheel {
            delta: MouseWheelDelta::Line { x: 0.0, y: 2.0 },
            modifiers: Modifiers::default(),
        });

        {
            let frame = input.update();
            assert_eq!(frame.text, "hé!");
            assert_eq!(frame.wheel, Vec2::new(0.0, 3.0));
            assert_eq!(frame.events.len(), 4);
        }

        input.end_frame();
        let frame = input.update();
        assert!(frame.text.is_empty());
        assert!(frame.events.is_empty());
        assert_eq!(frame.wheel, Vec2::zero());
    }

    #[test]
    fn pointer_events_track_position_and_presence() {
        let mut input = InputState::new();
        input.apply_event(InputEvent::PointerMoved { x: 3.0, y: 4.0 });
        assert!(input.pointer_inside);
        assert_eq!(input.mouse.position(), Vec2::new(3.0, 4.0));

        input.apply_event(InputEvent::PointerLeft);
        assert!(!input.pointer_inside);
    }
}
