use crate::coords::Vec2;

use super::edge::{EdgeDetector, EdgeFrame};
use super::types::MouseButton;

/// Mouse button edge state plus pointer tracking for a single window.
///
/// Position is in logical pixels. Velocity is the position delta between the
/// last two updates (pixels per frame, not per second).
#[derive(Debug, Default)]
pub struct Mouse {
    buttons: EdgeDetector<MouseButton>,

    position: Vec2,
    last_position: Vec2,
    velocity: Vec2,

    grabbed: bool,
}

impl Mouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_button_press(&mut self, button: MouseButton) {
        self.buttons.on_press(button);
    }

    pub fn on_button_release(&mut self, button: MouseButton) {
        self.buttons.on_release(button);
    }

    pub fn release_all(&mut self) {
        self.buttons.release_all();
    }

    pub fn is_button_held(&self, button: MouseButton) -> bool {
        self.buttons.is_held(button)
    }

    /// Records an absolute pointer position. Ignored while grabbed, where
    /// raw motion drives the position.
    pub fn on_cursor_moved(&mut self, position: Vec2) {
        if !self.grabbed {
            self.position = position;
        }
    }

    /// Accumulates raw device motion while the cursor is grabbed.
    ///
    /// Locked cursors stop reporting absolute moves on some platforms, so
    /// relative motion is the only source of movement in that mode.
    pub fn on_raw_motion(&mut self, dx: f32, dy: f32) {
        if self.grabbed {
            self.position += Vec2::new(dx, dy);
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn is_grabbed(&self) -> bool {
        self.grabbed
    }

    /// Records the grab state and restarts velocity tracking from the
    /// current position.
    pub fn set_grabbed(&mut self, grabbed: bool) {
        self.grabbed = grabbed;
        self.last_position = self.position;
        self.velocity = Vec2::zero();
    }

    /// Advances the mouse frame and refreshes velocity.
    pub fn update(&mut self) -> MouseFrame<'_> {
        self.velocity = self.position - self.last_position;
        self.last_position = self.position;

        MouseFrame {
            buttons: self.buttons.update(),
            position: self.position,
            velocity: self.velocity,
            grabbed: self.grabbed,
        }
    }
}

/// Mouse queries for the current frame.
#[derive(Debug, Copy, Clone)]
pub struct MouseFrame<'a> {
    buttons: EdgeFrame<'a, MouseButton>,
    position: Vec2,
    velocity: Vec2,
    grabbed: bool,
}

impl MouseFrame<'_> {
    pub fn frame(&self) -> u64 {
        self.buttons.frame()
    }

    pub fn is_button_held(&self, button: MouseButton) -> bool {
        self.buttons.is_held(button)
    }

    pub fn is_button_just_pressed(&self, button: MouseButton) -> bool {
        self.buttons.is_just_pressed(button)
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn is_grabbed(&self) -> bool {
        self.grabbed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_is_delta_between_updates() {
        let mut m = Mouse::new();
        m.on_cursor_moved(Vec2::new(10.0, 20.0));
        assert_eq!(m.update().velocity(), Vec2::new(10.0, 20.0));

        m.on_cursor_moved(Vec2::new(15.0, 18.0));
        let f = m.update();
        assert_eq!(f.position(), Vec2::new(15.0, 18.0));
        assert_eq!(f.velocity(), Vec2::new(5.0, -2.0));

        // No movement since the last update.
        assert_eq!(m.update().velocity(), Vec2::zero());
    }

    #[test]
    fn grab_resets_velocity_baseline() {
        let mut m = Mouse::new();
        m.update();
        m.on_cursor_moved(Vec2::new(100.0, 100.0));
        m.set_grabbed(true);

        let f = m.update();
        assert!(f.is_grabbed());
        assert_eq!(f.velocity(), Vec2::zero());
    }

    #[test]
    fn raw_motion_only_moves_grabbed_cursor() {
        let mut m = Mouse::new();
        m.on_raw_motion(4.0, 4.0);
        assert_eq!(m.position(), Vec2::zero());

        m.set_grabbed(true);
        m.on_raw_motion(4.0, -2.0);
        m.on_cursor_moved(Vec2::new(500.0, 500.0));
        m.on_raw_motion(1.0, 0.0);
        assert_eq!(m.update().velocity(), Vec2::new(5.0, -2.0));
    }

    #[test]
    fn buttons_edge_independently_of_pointer() {
        let mut m = Mouse::new();
        m.on_button_press(MouseButton::Left);
        m.on_cursor_moved(Vec2::new(1.0, 1.0));

        let f = m.update();
        assert!(f.is_button_just_pressed(MouseButton::Left));
        assert!(!f.is_button_held(MouseButton::Right));
        assert!(!m.update().is_button_just_pressed(MouseButton::Left));
    }
}
