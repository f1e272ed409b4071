use winit::dpi::PhysicalPosition;
use winit::event::{
    DeviceEvent, ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent,
};
use winit::keyboard::{KeyCode, ModifiersState, NativeKeyCode, PhysicalKey};
use winit::window::Window;

use crate::input::{
    InputEvent, Key, KeyState, Modifiers, MouseButton, MouseButtonState, MouseWheelDelta,
};

/// Translates a winit `WindowEvent` into an engine `InputEvent`.
///
/// `modifiers` is the last known modifier state; winit 0.30 only reports it
/// through `ModifiersChanged`.
///
/// Returns `None` for events not represented by the input subsystem.
pub(crate) fn translate_window_event(
    window: &Window,
    modifiers: Modifiers,
    event: &WindowEvent,
) -> Option<InputEvent> {
    match event {
        WindowEvent::ModifiersChanged(m) => Some(InputEvent::ModifiersChanged(map_modifiers(m.state()))),

        WindowEvent::Focused(f) => Some(InputEvent::Focused(*f)),

        WindowEvent::CursorLeft { .. } => Some(InputEvent::PointerLeft),

        WindowEvent::CursorMoved { position, .. } => {
            let (x, y) = to_logical_f32(window, *position);
            Some(InputEvent::PointerMoved { x, y })
        }

        WindowEvent::MouseInput { state, button, .. } => Some(InputEvent::PointerButton {
            button: map_mouse_button(*button),
            state: match state {
                ElementState::Pressed => MouseButtonState::Pressed,
                ElementState::Released => MouseButtonState::Released,
            },
            modifiers,
        }),

        WindowEvent::MouseWheel { delta, .. } => {
            let delta = match delta {
                MouseScrollDelta::LineDelta(x, y) => MouseWheelDelta::Line { x: *x, y: *y },
                MouseScrollDelta::PixelDelta(p) => {
                    let (x, y) = to_logical_f32(window, *p);
                    MouseWheelDelta::Pixel { x, y }
                }
            };
            Some(InputEvent::MouseWheel { delta, modifiers })
        }

        WindowEvent::KeyboardInput { event, .. } => {
            let (key, code) = map_key(event.physical_key);

            Some(InputEvent::Key {
                key,
                state: match event.state {
                    ElementState::Pressed => KeyState::Pressed,
                    ElementState::Released => KeyState::Released,
                },
                modifiers,
                code,
                repeat: event.repeat,
            })
        }

        WindowEvent::Ime(winit::event::Ime::Commit(text)) if !text.is_empty() => {
            Some(InputEvent::Text(text.clone()))
        }

        _ => None,
    }
}

/// Translates raw device input. Only relative pointer motion is used.
pub(crate) fn translate_device_event(event: &DeviceEvent) -> Option<InputEvent> {
    match event {
        DeviceEvent::MouseMotion { delta: (dx, dy) } => Some(InputEvent::PointerMotion {
            dx: *dx as f32,
            dy: *dy as f32,
        }),
        _ => None,
    }
}

fn to_logical_f32(window: &Window, pos: PhysicalPosition<f64>) -> (f32, f32) {
    let scale = window.scale_factor();
    let logical = pos.to_logical::<f64>(scale);
    (logical.x as f32, logical.y as f32)
}

fn map_modifiers(m: ModifiersState) -> Modifiers {
    Modifiers {
        shift: m.shift_key(),
        ctrl: m.control_key(),
        alt: m.alt_key(),
        meta: m.super_key(),
    }
}

fn map_mouse_button(b: WinitMouseButton) -> MouseButton {
    match b {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Back => MouseButton::Back,
        WinitMouseButton::Forward => MouseButton::Forward,
        WinitMouseButton::Other(v) => MouseButton::Other(v),
    }
}

fn map_key(pk: PhysicalKey) -> (Key, u32) {
    match pk {
        PhysicalKey::Code(code) => {
            let key = match code {
                KeyCode::Escape => Key::Escape,
                KeyCode::Enter => Key::Enter,
                KeyCode::Tab => Key::Tab,
                KeyCode::Backspace => Key::Backspace,
                KeyCode::Space => Key::Space,

                KeyCode::Insert => Key::Insert,
                KeyCode::Delete => Key::Delete,
                KeyCode::Home => Key::Home,
                KeyCode::End => Key::End,
                KeyCode::PageUp => Key::PageUp,
                KeyCode::PageDown => Key::PageDown,

                KeyCode::ArrowUp => Key::ArrowUp,
                KeyCode::ArrowDown => Key::ArrowDown,
                KeyCode::ArrowLeft => Key::ArrowLeft,
                KeyCode::ArrowRight => Key::ArrowRight,

                KeyCode::Minus => Key::Minus,
                KeyCode::Equal => Key::Equal,
                KeyCode::Comma => Key::Comma,
                KeyCode::Period => Key::Period,
                KeyCode::Slash => Key::Slash,
                KeyCode::Semicolon => Key::Semicolon,
                KeyCode::Quote => Key::Quote,
                KeyCode::Backquote => Key::Backquote,
                KeyCode::BracketLeft => Key::BracketLeft,
                KeyCode::BracketRight => Key::BracketRight,
                KeyCode::Backslash => Key::Backslash,

                KeyCode::ShiftLeft => Key::ShiftLeft,
                KeyCode::ShiftRight => Key::ShiftRight,
                KeyCode::ControlLeft => Key::ControlLeft,
                KeyCode::ControlRight => Key::ControlRight,
                KeyCode::AltLeft => Key::AltLeft,
                KeyCode::AltRight => Key::AltRight,
                KeyCode::SuperLeft => Key::MetaLeft,
                KeyCode::SuperRight => Key::MetaRight,

                KeyCode::KeyA => Key::A,
                KeyCode::KeyB => Key::B,
                KeyCode::KeyC => Key::C,
                KeyCode::KeyD => Key::D,
                KeyCode::KeyE => Key::E,
                KeyCode::KeyF => Key::F,
                KeyCode::KeyG => Key::G,
                KeyCode::KeyH => Key::H,
                KeyCode::KeyI => Key::I,
                KeyCode::KeyJ => Key::J,
                KeyCode::KeyK => Key::K,
                KeyCode::KeyL => Key::L,
                KeyCode::KeyM => Key::M,
                KeyCode::KeyN => Key::N,
                KeyCode::KeyO => Key::O,
                KeyCode::KeyP => Key::P,
                KeyCode::KeyQ => Key::Q,
                KeyCode::KeyR => Key::R,
                KeyCode::KeyS => Key::S,
                KeyCode::KeyT => Key::T,
                KeyCode::KeyU => Key::U,
                KeyCode::KeyV => Key::V,
                KeyCode::KeyW => Key::W,
                KeyCode::KeyX => Key::X,
                KeyCode::KeyY => Key::Y,
                KeyCode::KeyZ => Key::Z,

                KeyCode::Digit0 => Key::Digit0,
                KeyCode::Digit1 => Key::Digit1,
                KeyCode::Digit2 => Key::Digit2,
                KeyCode::Digit3 => Key::Digit3,
                KeyCode::Digit4 => Key::Digit4,
                KeyCode::Digit5 => Key::Digit5,
                KeyCode::Digit6 => Key::Digit6,
                KeyCode::Digit7 => Key::Digit7,
                KeyCode::Digit8 => Key::Digit8,
                KeyCode::Digit9 => Key::Digit9,

                KeyCode::F1 => Key::F1,
                KeyCode::F2 => Key::F2,
                KeyCode::F3 => Key::F3,
                KeyCode::F4 => Key::F4,
                KeyCode::F5 => Key::F5,
                KeyCode::F6 => Key::F6,
                KeyCode::F7 => Key::F7,
                KeyCode::F8 => Key::F8,
                KeyCode::F9 => Key::F9,
                KeyCode::F10 => Key::F10,
                KeyCode::F11 => Key::F11,
                KeyCode::F12 => Key::F12,

                other => Key::Unknown(other as u32),
            };

            (key, code as u32)
        }

        PhysicalKey::Unidentified(native) => {
            let code = NATIVE_KEY_FLAG | native_code(native);
            (Key::Unknown(code), code)
        }
    }
}

/// Set on codes that come from the platform's native scancode rather than a
/// winit `KeyCode`, so the two ranges never share a table entry.
const NATIVE_KEY_FLAG: u32 = 0x8000_0000;

fn native_code(native: NativeKeyCode) -> u32 {
    match native {
        NativeKeyCode::Unidentified => 0,
        NativeKeyCode::Android(c) | NativeKeyCode::Xkb(c) => c & !NATIVE_KEY_FLAG,
        NativeKeyCode::MacOS(c) | NativeKeyCode::Windows(c) => u32::from(c),
    }
}
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_and_right_modifiers_stay_distinct() {
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::ShiftLeft)).0, Key::ShiftLeft);
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::ShiftRight)).0, Key::ShiftRight);
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::SuperRight)).0, Key::MetaRight);
        assert!(Key::ControlRight.is_modifier());
    }

    #[test]
    fn native_codes_keep_their_value() {
        let (a, code_a) = map_key(PhysicalKey::Unidentified(NativeKeyCode::Xkb(191)));
        let (b, code_b) = map_key(PhysicalKey::Unidentified(NativeKeyCode::Windows(0x5d)));
        assert_eq!(a, Key::Unknown(code_a));
        assert_ne!(a, b);
        assert_ne!(code_a, code_b);
        assert_eq!(code_a & !NATIVE_KEY_FLAG, 191);

        // A native value never aliases a winit `KeyCode` with the same number.
        let (mapped, _) = map_key(PhysicalKey::Code(KeyCode::NumpadAdd));
        let (native, _) =
            map_key(PhysicalKey::Unidentified(NativeKeyCode::Xkb(KeyCode::NumpadAdd as u32)));
        assert_ne!(mapped, native);
    }

    #[test]
    fn unmapped_codes_keep_their_value() {
        let (key, code) = map_key(PhysicalKey::Code(KeyCode::NumpadAdd));
        assert_eq!(key, Key::Unknown(code));
        assert_eq!(code, KeyCode::NumpadAdd as u32);
    }

    #[test]
    fn raw_motion_translates() {
        let ev = translate_device_event(&DeviceEvent::MouseMotion { delta: (1.5, -2.0) });
        assert_eq!(ev, Some(InputEvent::PointerMotion { dx: 1.5, dy: -2.0 }));
    }

    #[test]
    fn other_buttons_pass_through() {
        assert_eq!(map_mouse_button(WinitMouseButton::Other(7)), MouseButton::Other(7));
    }
}
