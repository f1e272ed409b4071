//! Kiln engine crate.
//!
//! Window runtime, per-window GPU context, frame-stamped input with edge
//! detection, frame timing, logging and thin GPU resource wrappers.

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;
pub mod coords;
pub mod render;
pub mod paint;
