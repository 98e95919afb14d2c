use anyhow::{bail, ensure, Result};
use image::RgbaImage;

use crate::coords::{ColorRgba, Mat4};
use crate::scene::{TextureHandle, TextureId};

use super::{BufferHandle, DrawBatch, GpuBackend};

/// A single recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    ReserveTexture(TextureId),
    UploadTexture(TextureHandle),
    CreateInstanceStorage { buffer: BufferHandle, capacity_bytes: u64 },
    Upload { buffer: BufferHandle, offset: u64, len: usize },
    Draw(DrawBatch),
    UniformMatrix { name: String, matrix: Mat4 },
    Viewport { width: u32, height: u32 },
    Clear(ColorRgba),
    BeginFrame,
    EndFrame,
}

/// Headless backend that records calls instead of touching a GPU.
///
/// Uploaded bytes are kept per storage buffer so callers can decode what a draw
/// would have consumed.
#[derive(Debug)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    storages: Vec<Vec<u8>>,
    /// Indexed by texture id; `None` while reserved but not uploaded.
    textures: Vec<Option<(u32, u32)>>,
    size: (u32, u32),
    accept_frames: bool,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            calls: Vec::new(),
            storages: Vec::new(),
            textures: Vec::new(),
            size: (width, height),
            accept_frames: true,
        }
    }

    /// Simulates a window resize picked up at the next frame start.
    pub fn set_drawable_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Makes `begin_frame` decline (lost surface, minimized window).
    pub fn set_accept_frames(&mut self, accept: bool) {
        self.accept_frames = accept;
    }

    #[inline]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Draw submissions in issue order.
    pub fn draws(&self) -> Vec<DrawBatch> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::Draw(batch) => Some(*batch),
                _ => None,
            })
            .collect()
    }

    /// Current contents of a storage buffer.
    pub fn storage(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.storages.get(buffer.0 as usize).map(Vec::as_slice)
    }
}

impl GpuBackend for RecordingBackend {
    fn reserve_texture(&mut self) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(None);
        self.calls.push(BackendCall::ReserveTexture(id));
        id
    }

    fn upload_texture(&mut self, id: TextureId, image: &RgbaImage) -> Result<TextureHandle> {
        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, "texture has zero size ({width}x{height})");
        match self.textures.get_mut(id.0 as usize) {
            Some(slot) if slot.is_none() => *slot = Some((width, height)),
            Some(_) => bail!("texture {} already uploaded", id.0),
            None => bail!("texture {} was never reserved", id.0),
        }

        let handle = TextureHandle { id, width, height };
        self.calls.push(BackendCall::UploadTexture(handle));
        Ok(handle)
    }

    fn create_instance_storage(&mut self, capacity_bytes: u64) -> Result<BufferHandle> {
        let buffer = BufferHandle(self.storages.len() as u32);
        self.storages.push(vec![0; capacity_bytes as usize]);
        self.calls.push(BackendCall::CreateInstanceStorage { buffer, capacity_bytes });
        Ok(buffer)
    }

    fn upload_subrange(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]) {
        if let Some(storage) = self.storages.get_mut(buffer.0 as usize) {
            let start = offset as usize;
            let end = (start + bytes.len()).min(storage.len());
            if start < end {
                storage[start..end].copy_from_slice(&bytes[..end - start]);
            }
        }
        self.calls.push(BackendCall::Upload { buffer, offset, len: bytes.len() });
    }

    fn draw_instanced(&mut self, batch: &DrawBatch) {
        self.calls.push(BackendCall::Draw(*batch));
    }

    fn set_uniform_matrix(&mut self, name: &str, matrix: &Mat4) {
        self.calls.push(BackendCall::UniformMatrix { name: name.to_string(), matrix: *matrix });
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.calls.push(BackendCall::Viewport { width, height });
    }

    fn clear(&mut self, color: ColorRgba) {
        self.calls.push(BackendCall::Clear(color));
    }

    fn drawable_size(&self) -> (u32, u32) {
        self.size
    }

    fn begin_frame(&mut self) -> bool {
        if self.accept_frames {
            self.calls.push(BackendCall::BeginFrame);
        }
        self.accept_frames
    }

    fn end_frame(&mut self) {
        self.calls.push(BackendCall::EndFrame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn image() -> RgbaImage {
        RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn reserved_ids_are_not_reused_by_create() {
        let mut backend = RecordingBackend::new(8, 8);
        let reserved = backend.reserve_texture();
        let created = backend.create_texture(&image()).unwrap();
        assert_ne!(reserved, created.id);
    }

    #[test]
    fn upload_requires_a_fresh_reservation() {
        let mut backend = RecordingBackend::new(8, 8);
        let id = backend.reserve_texture();
        assert!(backend.upload_texture(TextureId(id.0 + 1), &image()).is_err());
        assert!(backend.upload_texture(id, &image()).is_ok());
        assert!(backend.upload_texture(id, &image()).is_err());
    }
}
