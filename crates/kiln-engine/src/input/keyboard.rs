use super::edge::{EdgeDetector, EdgeFrame};
use super::types::Key;

/// Keyboard edge state for a single window.
#[derive(Debug, Default)]
pub struct Keyboard {
    keys: EdgeDetector<Key>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key_press(&mut self, key: Key) {
        self.keys.on_press(key);
    }

    pub fn on_key_release(&mut self, key: Key) {
        self.keys.on_release(key);
    }

    pub fn release_all(&mut self) {
        self.keys.release_all();
    }

    pub fn is_key_held(&self, key: Key) -> bool {
        self.keys.is_held(key)
    }

    pub fn frame(&self) -> u64 {
        self.keys.frame()
    }

    /// Advances the keyboard frame. See [`EdgeDetector::update`].
    pub fn update(&mut self) -> KeyboardFrame<'_> {
        KeyboardFrame {
            keys: self.keys.update(),
        }
    }
}

/// Keyboard queries for the current frame.
#[derive(Debug, Copy, Clone)]
pub struct KeyboardFrame<'a> {
    keys: EdgeFrame<'a, Key>,
}

impl<'a> KeyboardFrame<'a> {
    pub fn frame(&self) -> u64 {
        self.keys.frame()
    }

    pub fn is_key_held(&self, key: Key) -> bool {
        self.keys.is_held(key)
    }

    pub fn is_key_just_pressed(&self, key: Key) -> bool {
        self.keys.is_just_pressed(key)
    }

    /// Keys held this frame.
    pub fn held(self) -> impl Iterator<Item = Key> + 'a {
        self.keys.held()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_tap_reports_one_edge() {
        let mut kb = Keyboard::new();
        kb.on_key_press(Key::Space);
        assert!(kb.update().is_key_just_pressed(Key::Space));
        assert!(!kb.update().is_key_just_pressed(Key::Space));

        kb.on_key_release(Key::Space);
        assert!(!kb.update().is_key_held(Key::Space));
    }

    #[test]
    fn unknown_keys_use_their_platform_code() {
        let mut kb = Keyboard::new();
        kb.on_key_press(Key::Unknown(91));
        let f = kb.update();
        assert!(f.is_key_just_pressed(Key::Unknown(91)));
        assert!(!f.is_key_held(Key::Unknown(92)));
    }
}
