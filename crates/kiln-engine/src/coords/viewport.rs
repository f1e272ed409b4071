/// Viewport size in logical pixels.
///
/// Shaders that place geometry in pixel units divide by this to reach NDC.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Width over height, or 1 for a degenerate viewport.
    #[inline]
    pub fn aspect(self) -> f32 {
        if self.is_valid() {
            self.width / self.height
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_of_valid_and_degenerate_viewports() {
        assert_eq!(Viewport::new(960.0, 540.0).aspect(), 960.0 / 540.0);
        assert_eq!(Viewport::new(0.0, 540.0).aspect(), 1.0);
        assert!(!Viewport::default().is_valid());
    }
}
