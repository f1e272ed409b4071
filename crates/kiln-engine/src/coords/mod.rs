//! Plain geometry types shared by input and rendering.
//!
//! Canonical CPU space:
//! - Logical pixels (DPI-aware)
//! - Origin top-left
//! - +X right, +Y down

mod vec2;
mod viewport;

pub use vec2::Vec2;
pub use viewport::Viewport;
