use winit::window::{Window, WindowId};

use crate::device::{Gpu, GpuFrame, SurfaceErrorAction};
use crate::render::{FrameStats, WgpuBackend, WgpuTarget};
use crate::stage::Stage;
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    /// Logical window size as `(width, height)`.
    pub fn logical_size(&self) -> (f32, f32) {
        let phys = self.window.inner_size();
        let logi: winit::dpi::LogicalSize<f64> = phys.to_logical(self.window.scale_factor());
        (logi.width as f32, logi.height as f32)
    }

    #[inline]
    pub fn scale_factor(&self) -> f32 {
        self.window.scale_factor() as f32
    }
}

/// What happened to a frame handed to [`FrameCtx::render_stage`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FrameOutcome {
    Presented(FrameStats),
    /// Surface unavailable this frame (lost, outdated, timed out); nothing drawn.
    Skipped,
    /// Unrecoverable surface error.
    Fatal,
}

impl FrameOutcome {
    pub fn control(self) -> AppControl {
        match self {
            FrameOutcome::Fatal => AppControl::Exit,
            _ => AppControl::Continue,
        }
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Acquires the next swapchain image, renders `stage` into it and presents.
    ///
    /// The stage picks up the window's current scale factor every frame.
    pub fn render_stage(&mut self, stage: &mut Stage<WgpuBackend>) -> FrameOutcome {
        let frame = match self.gpu.acquire_frame() {
            Ok(f) => f,
            Err(err) => {
                log::warn!("surface error: {err}");
                let action = self.gpu.handle_surface_error(err);
                return match action {
                    SurfaceErrorAction::Fatal => FrameOutcome::Fatal,
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        FrameOutcome::Skipped
                    }
                };
            }
        };

        let (width, height) = frame.size();
        let GpuFrame { surface_texture, view } = frame;

        stage.set_pixel_ratio(self.window.scale_factor());
        stage.backend_mut().set_target(WgpuTarget { view, width, height });
        let stats = stage.render();
        // The view must go before the surface texture is presented.
        drop(stage.backend_mut().release_target());

        self.window.window.pre_present_notify();
        surface_texture.present();

        FrameOutcome::Presented(stats)
    }
}
