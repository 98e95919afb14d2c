/// Straight-alpha RGBA color with `f32` channels in `[0, 1]`.
///
/// Used for the stage clear color. Sprite tints use the compact [`Rgb`] form.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRgba {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

/// 24-bit RGB tint, stored as `0xRRGGBB`.
///
/// The upper byte is ignored; it is replaced by the sprite alpha when packed
/// into an instance record.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Rgb(u32);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0x00FF_FFFF);

    #[inline]
    pub const fn new(rgb: u32) -> Self {
        Self(rgb & 0x00FF_FFFF)
    }

    #[inline]
    pub const fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Packs the tint with `alpha` into a single `0xAARRGGBB` word.
    ///
    /// `alpha` is clamped to `[0, 1]` and rounded to the nearest byte.
    #[inline]
    pub fn pack_with_alpha(self, alpha: f32) -> u32 {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u32;
        (a << 24) | self.0
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}
