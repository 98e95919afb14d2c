use crate::coords::{Mat4, Vec2, Viewport};

/// Depth-range normalization constant.
///
/// Layer z values in `[-DEPTH, DEPTH]` land inside the clip volume.
pub const DEPTH: f32 = 1e5;

/// 2D camera read once per frame.
///
/// - `at`: world point the camera looks at; rotation happens around it.
/// - `to`: where `at` lands in the viewport, normalized (`(0,0)` top-left, `(0.5,0.5)` center).
/// - `angle`: radians.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Camera {
    pub at: Vec2,
    pub to: Vec2,
    pub angle: f32,
}

impl Camera {
    #[inline]
    pub const fn new(at: Vec2, to: Vec2, angle: f32) -> Self {
        Self { at, to, angle }
    }

    /// World → clip projection for a viewport of the given size.
    ///
    /// Y is flipped (world +Y down, clip +Y up) and z maps linearly through `-1/DEPTH`.
    pub fn projection(&self, viewport: Viewport) -> Mat4 {
        let Viewport { width, height } = viewport.clamped();

        let (s, c) = self.angle.sin_cos();
        let w = 2.0 / width;
        let h = -2.0 / height;
        let x = self.at.x - width * self.to.x;
        let y = self.at.y - height * self.to.y;
        let at = self.at;

        Mat4::from_cols(
            [c * w, s * h, 0.0, 0.0],
            [-s * w, c * h, 0.0, 0.0],
            [0.0, 0.0, -1.0 / DEPTH, 0.0],
            [
                (at.x * (1.0 - c) + at.y * s) * w - 2.0 * x / width - 1.0,
                (at.y * (1.0 - c) - at.x * s) * h + 2.0 * y / height + 1.0,
                0.0,
                1.0,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VP: Viewport = Viewport::new(800.0, 600.0);

    fn assert_clip(m: &Mat4, p: Vec2, expect: (f32, f32)) {
        let out = m.transform_point(p, 0.0);
        assert!(
            (out[0] - expect.0).abs() < 1e-4 && (out[1] - expect.1).abs() < 1e-4,
            "{p:?} -> ({}, {}), expected {expect:?}",
            out[0],
            out[1]
        );
    }

    #[test]
    fn default_camera_is_pure_axis_scale() {
        let m = Camera::default().projection(VP);
        assert_eq!(m.at(0, 0), 2.0 / 800.0);
        assert_eq!(m.at(1, 1), -2.0 / 600.0);
        assert_eq!(m.at(0, 1), 0.0);
        assert_eq!(m.at(1, 0), 0.0);
        // Only the fixed viewport-origin offset remains; no camera-induced translation.
        assert_eq!(m.cols[3], [-1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn world_origin_maps_to_top_left() {
        let m = Camera::default().projection(VP);
        assert_clip(&m, Vec2::zero(), (-1.0, 1.0));
        assert_clip(&m, Vec2::new(800.0, 600.0), (1.0, -1.0));
    }

    #[test]
    fn focus_point_sits_at_top_left_with_zero_pivot() {
        let cam = Camera::new(Vec2::new(250.0, -40.0), Vec2::zero(), 0.0);
        assert_clip(&cam.projection(VP), cam.at, (-1.0, 1.0));
    }

    #[test]
    fn centered_pivot_puts_focus_in_the_middle() {
        let cam = Camera::new(Vec2::new(1000.0, 500.0), Vec2::splat(0.5), 0.0);
        assert_clip(&cam.projection(VP), cam.at, (0.0, 0.0));
    }

    #[test]
    fn rotation_keeps_focus_fixed() {
        let cam = Camera::new(Vec2::new(120.0, 80.0), Vec2::splat(0.5), 1.1);
        assert_clip(&cam.projection(VP), cam.at, (0.0, 0.0));
    }

    #[test]
    fn rotation_turns_points_around_focus() {
        let cam = Camera::new(Vec2::zero(), Vec2::splat(0.5), core::f32::consts::FRAC_PI_2);
        let m = cam.projection(Viewport::new(200.0, 200.0));
        // +X in world rotates onto world +Y, i.e. screen-down, i.e. clip -Y.
        assert_clip(&m, Vec2::new(100.0, 0.0), (0.0, -1.0));
    }

    #[test]
    fn depth_column_uses_fixed_range() {
        let m = Camera::default().projection(VP);
        assert_eq!(m.at(2, 2), -1.0 / DEPTH);
        let z = m.transform_point(Vec2::zero(), 3.0)[2];
        assert!((z + 3.0 / DEPTH).abs() < 1e-9);
    }

    #[test]
    fn zero_viewport_does_not_produce_infinities() {
        let m = Camera::default().projection(Viewport::new(0.0, 0.0));
        assert!(m.cols.iter().flatten().all(|v| v.is_finite()));
    }
}
