//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and its windows, wires each window to its own
//! GPU context, input state and frame clock, and drives `core::App`.

mod runtime;

pub use runtime::{AspectRatio, Runtime, RuntimeConfig, RuntimeCtx};
pub use winit::window::{CursorIcon, WindowId};
