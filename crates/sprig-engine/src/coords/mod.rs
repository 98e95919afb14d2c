//! Coordinate, color and matrix types shared by the scene graph and renderers.
//!
//! Canonical world space:
//! - world units map 1:1 to physical pixels at camera scale 1
//! - origin top-left, +X right, +Y down
//!
//! The camera (`render::Camera`) produces a [`Mat4`] that maps world space to clip space.

mod color;
mod mat4;
mod rect;
mod vec2;
mod viewport;

pub use color::{ColorRgba, Rgb};
pub use mat4::Mat4;
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
