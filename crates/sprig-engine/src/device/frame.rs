/// A single acquired swapchain image.
///
/// Short-lived: holding the surface texture blocks acquisition of the next one.
/// Everything rendered into `view` must be submitted before the surface texture
/// is presented.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

impl GpuFrame {
    /// Size of the acquired image in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        let t = &self.surface_texture.texture;
        (t.width(), t.height())
    }
}
