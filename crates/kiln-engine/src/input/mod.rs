//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! `platform` translates window system events into `InputEvent`s; the
//! runtime feeds them into an `InputState` and closes each poll cycle with
//! `InputState::update`.

mod edge;
mod frame;
mod keyboard;
mod mouse;
mod state;
mod types;

pub(crate) mod platform;

pub use edge::{EdgeDetector, EdgeFrame};
pub use frame::InputFrame;
pub use keyboard::{Keyboard, KeyboardFrame};
pub use mouse::{Mouse, MouseFrame};
pub use state::InputState;
pub use types::{
    InputEvent,
    Key,
    KeyState,
    Modifiers,
    MouseButton,
    MouseButtonState,
    MouseWheelDelta,
};
