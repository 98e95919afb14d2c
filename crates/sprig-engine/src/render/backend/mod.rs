//! GPU backend contract.
//!
//! The batch renderer only talks to the GPU through [`GpuBackend`]. Two
//! implementations ship with the engine:
//! - [`WgpuBackend`]: renders to a window surface through wgpu
//! - [`RecordingBackend`]: headless, records every call (tests, offscreen checks)

mod recording;
mod wgpu;

use anyhow::Result;
use image::RgbaImage;

use crate::coords::{ColorRgba, Mat4};
use crate::scene::{TextureHandle, TextureId};

pub use self::recording::{BackendCall, RecordingBackend};
pub use self::wgpu::{WgpuBackend, WgpuTarget};

/// Vertices per sprite instance: two triangles over a unit quad.
pub const QUAD_VERTEX_COUNT: u32 = 6;

/// Uniform name the renderer binds the camera matrix to.
pub const PROJECTION_UNIFORM: &str = "projection";

/// Backend-issued identity of an instance storage buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferHandle(pub u32);

/// One instanced draw submission.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawBatch {
    /// Storage holding the instance records, uploaded from offset 0.
    pub storage: BufferHandle,
    pub texture: TextureId,
    pub vertex_count: u32,
    pub instance_count: u32,
    /// `false` when every instance came from an opaque list; the backend may
    /// then draw without blending.
    pub blend: bool,
}

/// Capabilities the sprite core needs from a GPU.
///
/// Setup calls (`create_*`) may fail and surface to the caller. Per-frame calls
/// are infallible from the core's point of view; a backend that cannot render a
/// frame declines it in [`begin_frame`](GpuBackend::begin_frame).
pub trait GpuBackend {
    /// Issues a texture identity whose pixels arrive later via
    /// [`upload_texture`](GpuBackend::upload_texture). The id is never handed
    /// out again.
    fn reserve_texture(&mut self) -> TextureId;

    /// Uploads pixel data under a reserved id. Each id is uploaded at most once.
    fn upload_texture(&mut self, id: TextureId, image: &RgbaImage) -> Result<TextureHandle>;

    /// Uploads pixel data and returns a stable texture identity.
    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle> {
        let id = self.reserve_texture();
        self.upload_texture(id, image)
    }

    /// Allocates one dynamic buffer of `capacity_bytes` for instance records.
    fn create_instance_storage(&mut self, capacity_bytes: u64) -> Result<BufferHandle>;

    /// Partial update of `buffer` before a draw.
    fn upload_subrange(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]);

    /// Issues one instanced draw.
    fn draw_instanced(&mut self, batch: &DrawBatch);

    fn set_uniform_matrix(&mut self, name: &str, matrix: &Mat4);

    fn set_viewport(&mut self, width: u32, height: u32);

    fn clear(&mut self, color: ColorRgba);

    /// Current drawable size in physical pixels, polled once per frame.
    fn drawable_size(&self) -> (u32, u32);

    /// Starts a frame. Returning `false` skips the frame entirely.
    fn begin_frame(&mut self) -> bool;

    fn end_frame(&mut self);
}
