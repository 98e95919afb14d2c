use crate::coords::{Rect, Vec2};

/// Backend-issued texture identity.
///
/// Two frames batch together iff their texture ids are equal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Texture identity plus its dimensions in texels, as returned by the backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureHandle {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

/// Texture-space rectangle in normalized coordinates (`u0,v0` top-left).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    pub const FULL: UvRect = UvRect { u0: 0.0, v0: 0.0, u1: 1.0, v1: 1.0 };

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.u0, self.v0, self.u1, self.v1]
    }
}

/// Immutable description of a texture sub-region that sprites draw.
///
/// - `anchor` is the pivot as a fraction of `size` (`(0,0)` top-left, `(0.5,0.5)` center);
///   sprite position and rotation are relative to it.
/// - `size` is the quad size in world units.
/// - `opaque` is a hint: frames known to contain no transparent texels let their
///   sprites go to the opaque list.
///
/// Frames are plain values; "modifying" one produces a new frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    anchor: Vec2,
    size: Vec2,
    uv: UvRect,
    texture: TextureHandle,
    opaque: bool,
}

impl Frame {
    /// Full-extent frame over `texture`: anchor (0,0), size = texture size, UV (0,0,1,1).
    pub fn full(texture: TextureHandle, opaque: bool) -> Self {
        Self {
            anchor: Vec2::zero(),
            size: Vec2::new(texture.width as f32, texture.height as f32),
            uv: UvRect::FULL,
            texture,
            opaque,
        }
    }

    /// Frame for a texture whose pixels have not arrived yet.
    ///
    /// Its size is (0,0), so sprites using it pack zero-area quads until they are
    /// given the loaded frame. It is never considered opaque. `id` must come from
    /// the backend so it cannot collide with another texture.
    pub(crate) fn pending(id: TextureId) -> Self {
        Self {
            anchor: Vec2::zero(),
            size: Vec2::zero(),
            uv: UvRect::FULL,
            texture: TextureHandle { id, width: 0, height: 0 },
            opaque: false,
        }
    }

    /// Sub-frame covering `region` (texel coordinates) of this frame's texture.
    ///
    /// The region is clipped to the texture bounds; a region entirely outside the
    /// texture yields a zero-size frame. The anchor and opacity hint are inherited.
    pub fn region(&self, region: Rect) -> Self {
        let tw = self.texture.width as f32;
        let th = self.texture.height as f32;

        let clipped = Rect::new(0.0, 0.0, tw, th)
            .intersect(region)
            .unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));

        let uv = if clipped.is_empty() {
            UvRect { u0: 0.0, v0: 0.0, u1: 0.0, v1: 0.0 }
        } else {
            let max = clipped.max();
            UvRect {
                u0: clipped.origin.x / tw,
                v0: clipped.origin.y / th,
                u1: max.x / tw,
                v1: max.y / th,
            }
        };

        Self { size: clipped.size, uv, ..*self }
    }

    /// Same frame with a different pivot.
    pub fn with_anchor(&self, anchor: Vec2) -> Self {
        Self { anchor, ..*self }
    }

    /// Same frame with a different opacity hint.
    pub fn with_opaque(&self, opaque: bool) -> Self {
        Self { opaque, ..*self }
    }

    #[inline]
    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    #[inline]
    pub fn uv(&self) -> UvRect {
        self.uv
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture.id
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// Whether the texture behind this frame has not been uploaded yet.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.texture.width == 0 || self.texture.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlas() -> Frame {
        Frame::full(TextureHandle { id: TextureId(3), width: 128, height: 64 }, true)
    }

    #[test]
    fn full_frame_covers_texture() {
        let f = atlas();
        assert_eq!(f.anchor(), Vec2::zero());
        assert_eq!(f.size(), Vec2::new(128.0, 64.0));
        assert_eq!(f.uv(), UvRect::FULL);
        assert_eq!(f.texture(), TextureId(3));
        assert!(f.is_opaque());
    }

    #[test]
    fn region_maps_texels_to_uv() {
        let f = atlas().region(Rect::new(32.0, 16.0, 32.0, 16.0));
        assert_eq!(f.size(), Vec2::new(32.0, 16.0));
        assert_eq!(f.uv(), UvRect { u0: 0.25, v0: 0.25, u1: 0.5, v1: 0.5 });
        assert_eq!(f.texture(), TextureId(3));
    }

    #[test]
    fn region_is_clipped_to_texture() {
        let f = atlas().region(Rect::new(96.0, 0.0, 64.0, 64.0));
        assert_eq!(f.size(), Vec2::new(32.0, 64.0));
        assert_eq!(f.uv().u1, 1.0);
    }

    #[test]
    fn region_outside_is_zero_size() {
        let f = atlas().region(Rect::new(500.0, 500.0, 8.0, 8.0));
        assert_eq!(f.size(), Vec2::zero());
    }

    #[test]
    fn pending_frame_is_zero_size_and_translucent() {
        let f = Frame::pending(TextureId(9));
        assert_eq!(f.size(), Vec2::zero());
        assert!(!f.is_opaque());
        assert!(f.is_pending());
        assert!(!atlas().is_pending());
    }

    #[test]
    fn with_anchor_keeps_everything_else() {
        let f = atlas();
        let g = f.with_anchor(Vec2::splat(0.5));
        assert_eq!(g.anchor(), Vec2::splat(0.5));
        assert_eq!(g.size(), f.size());
        assert_eq!(g.uv(), f.uv());
    }
}
