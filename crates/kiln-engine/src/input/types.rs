use std::fmt;

use crate::coords::Vec2;

/// Keyboard key identifier.
///
/// Physical keys (layout independent). Platform codes without a dedicated
/// variant are kept as `Key::Unknown(code)` so they can still be tracked.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,

    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    Minus,
    Equal,
    Comma,
    Period,
    Slash,
    Semicolon,
    Quote,
    Backquote,
    BracketLeft,
    BracketRight,
    Backslash,

    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    AltLeft,
    AltRight,
    MetaLeft,
    MetaRight,

    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    F1, F2, F3, F4, F5, F6,
    F7, F8, F9, F10, F11, F12,

    Unknown(u32),
}

impl Key {
    /// Top-row digit key for `n` in `0..=9`.
    pub fn digit(n: u8) -> Option<Key> {
        const DIGITS: [Key; 10] = [
            Key::Digit0, Key::Digit1, Key::Digit2, Key::Digit3, Key::Digit4,
            Key::Digit5, Key::Digit6, Key::Digit7, Key::Digit8, Key::Digit9,
        ];
        DIGITS.get(n as usize).copied()
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Key::ShiftLeft
                | Key::ShiftRight
                | Key::ControlLeft
                | Key::ControlRight
                | Key::AltLeft
                | Key::AltRight
                | Key::MetaLeft
                | Key::MetaRight
        )
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Unknown(code) => write!(f, "Unknown(0x{code:x})"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MouseButtonState {
    Pressed,
    Released,
}

/// Modifier keys state.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Mouse wheel delta.
///
/// `Line` is notched-wheel input; `Pixel` comes from touchpads.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MouseWheelDelta {
    Line { x: f32, y: f32 },
    Pixel { x: f32, y: f32 },
}

impl MouseWheelDelta {
    #[inline]
    pub fn as_vec2(self) -> Vec2 {
        match self {
            MouseWheelDelta::Line { x, y } | MouseWheelDelta::Pixel { x, y } => Vec2::new(x, y),
        }
    }
}

/// Platform-agnostic input events.
///
/// The runtime translates window system events into these; nothing below the
/// platform layer sees `winit` types.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    ModifiersChanged(Modifiers),

    Key {
        key: Key,
        state: KeyState,
        modifiers: Modifiers,
        /// Platform key code when available.
        code: u32,
        /// Auto-repeat while the key is held.
        repeat: bool,
    },

    /// Absolute pointer position in logical pixels.
    PointerMoved { x: f32, y: f32 },

    /// Raw relative device motion (unaccelerated, not clamped to the window).
    PointerMotion { dx: f32, dy: f32 },

    PointerButton {
        button: MouseButton,
        state: MouseButtonState,
        modifiers: Modifiers,
    },

    MouseWheel {
        delta: MouseWheelDelta,
        modifiers: Modifiers,
    },

    /// Committed text (IME commit).
    Text(String),

    PointerLeft,

    Focused(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_lookup() {
        assert_eq!(Key::digit(0), Some(Key::Digit0));
        assert_eq!(Key::digit(9), Some(Key::Digit9));
        assert_eq!(Key::digit(10), None);
    }

    #[test]
    fn unknown_key_display_is_hex() {
        assert_eq!(Key::Unknown(255).to_string(), "Unknown(0xff)");
        assert_eq!(Key::Space.to_string(), "Space");
    }
}
