//! Color values handed to the GPU (clear colors, uniform tints).

mod color;

pub use color::Color;
