/// Drawable size in physical pixels.
///
/// The camera projection divides by both dimensions, so callers should go through
/// [`Viewport::clamped`] before building a matrix from a size that may be zero
/// (minimized window, first frame before the surface is configured).
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

    /// Returns the viewport with each dimension raised to at least one pixel.
    #[inline]
    pub fn clamped(self) -> Self {
        Self::new(self.width.max(1.0), self.height.max(1.0))
    }
}
