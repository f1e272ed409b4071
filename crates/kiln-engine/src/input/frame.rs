use crate::coords::Vec2;

use super::keyboard::KeyboardFrame;
use super::mouse::MouseFrame;
use super::types::{InputEvent, Modifiers};

/// Input snapshot for one frame, produced by [`InputState::update`].
///
/// Edge queries ("just pressed") are only reachable through this type, so they
/// always observe a completed poll cycle.
///
/// [`InputState::update`]: super::InputState::update
#[derive(Debug, Copy, Clone)]
pub struct InputFrame<'a> {
    pub keyboard: KeyboardFrame<'a>,
    pub mouse: MouseFrame<'a>,

    pub modifiers: Modifiers,
    pub focused: bool,
    pub pointer_inside: bool,

    /// Raw events of the cycle, in arrival order.
    pub events: &'a [InputEvent],

    /// Text committed during the cycle.
    pub text: &'a str,

    /// Wheel movement accumulated over the cycle.
    pub wheel: Vec2,
}
