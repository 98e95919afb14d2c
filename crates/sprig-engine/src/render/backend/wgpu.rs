use anyhow::{bail, ensure, Result};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::coords::{ColorRgba, Mat4};
use crate::device::Gpu;
use crate::render::common::{
    depth_state, premul_alpha_blend, projection_ubo_size, QuadVertex, DEPTH_FORMAT, QUAD_INDICES,
    QUAD_VERTICES,
};
use crate::render::SpriteInstance;
use crate::scene::{TextureHandle, TextureId};

use super::{BufferHandle, DrawBatch, GpuBackend, PROJECTION_UNIFORM};

/// Color target for one frame (usually the acquired swapchain view).
pub struct WgpuTarget {
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

struct TextureSlot {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct DepthTarget {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// `GpuBackend` over wgpu.
///
/// Every flush records its own render pass and submits it immediately, so the
/// single instance buffer can be rewritten between batches of the same frame.
/// The first pass of a frame clears color and depth; later passes load.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    opaque_pipeline: wgpu::RenderPipeline,
    blend_pipeline: wgpu::RenderPipeline,

    camera_ubo: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,

    texture_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Indexed by texture id; `None` while reserved but not uploaded.
    textures: Vec<Option<TextureSlot>>,

    storages: Vec<wgpu::Buffer>,

    quad_vbo: wgpu::Buffer,
    quad_ibo: wgpu::Buffer,

    depth: Option<DepthTarget>,
    target: Option<WgpuTarget>,

    size: (u32, u32),
    viewport: (u32, u32),
    pending_clear: Option<ColorRgba>,
    warned_missing_texture: bool,
}

impl WgpuBackend {
    /// Builds pipelines and static buffers for `gpu`'s device and surface format.
    pub fn new(gpu: &Gpu<'_>) -> Self {
        let size = gpu.size();
        Self::with_device(
            gpu.device().clone(),
            gpu.queue().clone(),
            gpu.surface_format(),
            (size.width, size.height),
        )
    }

    /// Builds a backend rendering to targets of `color_format`.
    pub fn with_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        size: (u32, u32),
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprig sprite shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/sprite.wgsl").into()),
        });

        let camera_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprig camera bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(projection_ubo_size()),
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprig texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprig sprite pipeline layout"),
            bind_group_layouts: &[&camera_bgl, &texture_bgl],
            immediate_size: 0,
        });

        let make_pipeline = |label: &str, blend: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[QuadVertex::layout(), SpriteInstance::layout()],
                },

                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format,
                        blend: blend.then(premul_alpha_blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: Some(depth_state(!blend)),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        let opaque_pipeline = make_pipeline("sprig opaque pipeline", false);
        let blend_pipeline = make_pipeline("sprig blend pipeline", true);

        let camera_ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprig camera ubo"),
            contents: bytemuck::bytes_of(&Mat4::IDENTITY),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprig camera bind group"),
            layout: &camera_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_ubo.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprig sprite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprig quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let quad_ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprig quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            device,
            queue,
            opaque_pipeline,
            blend_pipeline,
            camera_ubo,
            camera_bind_group,
            texture_bgl,
            sampler,
            textures: Vec::new(),
            storages: Vec::new(),
            quad_vbo,
            quad_ibo,
            depth: None,
            target: None,
            size,
            viewport: size,
            pending_clear: None,
            warned_missing_texture: false,
        }
    }

    /// Sets the color target for the next frame; its size becomes the drawable size.
    pub fn set_target(&mut self, target: WgpuTarget) {
        self.size = (target.width, target.height);
        self.target = Some(target);
    }

    /// Drops the color target so the surface texture can be presented.
    pub fn release_target(&mut self) -> Option<WgpuTarget> {
        self.target.take()
    }

    fn ensure_depth(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if self.depth.as_ref().is_some_and(|d| d.width == width && d.height == height) {
            return;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sprig depth"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        self.depth = Some(DepthTarget {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            width,
            height,
        });
    }

    /// Records and submits one pass. `draw` is `None` for a clear-only pass.
    fn submit_pass(&mut self, draw: Option<&DrawBatch>) {
        let clear = self.pending_clear.take();

        let Some((tw, th)) = self.target.as_ref().map(|t| (t.width, t.height)) else { return };
        self.ensure_depth(tw, th);
        let (Some(target), Some(depth)) = (self.target.as_ref(), self.depth.as_ref()) else {
            return;
        };

        let (color_load, depth_load) = match clear {
            Some(c) => (wgpu::LoadOp::Clear(c.to_wgpu()), wgpu::LoadOp::Clear(1.0)),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sprig batch encoder"),
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprig batch pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: color_load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations { load: depth_load, store: wgpu::StoreOp::Store }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(batch) = draw {
                let storage = self.storages.get(batch.storage.0 as usize);
                let texture = self.textures.get(batch.texture.0 as usize).and_then(Option::as_ref);
                if let (Some(storage), Some(texture)) = (storage, texture) {
                    let vw = self.viewport.0.clamp(1, target.width.max(1));
                    let vh = self.viewport.1.clamp(1, target.height.max(1));
                    rpass.set_viewport(0.0, 0.0, vw as f32, vh as f32, 0.0, 1.0);

                    let pipeline =
                        if batch.blend { &self.blend_pipeline } else { &self.opaque_pipeline };
                    rpass.set_pipeline(pipeline);
                    rpass.set_bind_group(0, &self.camera_bind_group, &[]);
                    rpass.set_bind_group(1, &texture.bind_group, &[]);
                    rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
                    rpass.set_vertex_buffer(1, storage.slice(..));
                    rpass.set_index_buffer(self.quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
                    rpass.draw_indexed(0..batch.vertex_count, 0, 0..batch.instance_count);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl GpuBackend for WgpuBackend {
    fn reserve_texture(&mut self) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(None);
        log::debug!("wgpu: texture {} reserved", id.0);
        id
    }

    fn upload_texture(&mut self, id: TextureId, image: &RgbaImage) -> Result<TextureHandle> {
        match self.textures.get(id.0 as usize) {
            Some(None) => {}
            Some(Some(_)) => bail!("texture {} already uploaded", id.0),
            None => bail!("texture {} was never reserved", id.0),
        }

        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, "texture has zero size ({width}x{height})");
        let max = self.device.limits().max_texture_dimension_2d;
        ensure!(
            width <= max && height <= max,
            "texture {width}x{height} exceeds device limit {max}"
        );

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sprig sprite texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprig texture bind group"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        self.textures[id.0 as usize] = Some(TextureSlot { _texture: texture, bind_group });
        log::debug!("wgpu: texture {} uploaded ({width}x{height})", id.0);

        Ok(TextureHandle { id, width, height })
    }

    fn create_instance_storage(&mut self, capacity_bytes: u64) -> Result<BufferHandle> {
        ensure!(capacity_bytes > 0, "instance storage must not be empty");
        let max = self.device.limits().max_buffer_size;
        ensure!(
            capacity_bytes <= max,
            "instance storage of {capacity_bytes} bytes exceeds device limit {max}"
        );

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprig instance vbo"),
            size: capacity_bytes,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let handle = BufferHandle(self.storages.len() as u32);
        self.storages.push(buffer);
        Ok(handle)
    }

    fn upload_subrange(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]) {
        let Some(storage) = self.storages.get(buffer.0 as usize) else {
            log::warn!("wgpu: upload to unknown storage {}", buffer.0);
            return;
        };
        if bytes.is_empty() {
            return;
        }
        self.queue.write_buffer(storage, offset, bytes);
    }

    fn draw_instanced(&mut self, batch: &DrawBatch) {
        let loaded = self.textures.get(batch.texture.0 as usize).is_some_and(Option::is_some);
        if !loaded && !self.warned_missing_texture {
            // Pending frames reference textures that are not uploaded yet.
            log::debug!("wgpu: draw references unknown texture {}; skipped", batch.texture.0);
            self.warned_missing_texture = true;
        }
        self.submit_pass(Some(batch));
    }

    fn set_uniform_matrix(&mut self, name: &str, matrix: &Mat4) {
        if name != PROJECTION_UNIFORM {
            log::debug!("wgpu: ignoring unknown uniform '{name}'");
            return;
        }
        self.queue.write_buffer(&self.camera_ubo, 0, bytemuck::bytes_of(matrix));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn clear(&mut self, color: ColorRgba) {
        self.pending_clear = Some(color);
    }

    fn drawable_size(&self) -> (u32, u32) {
        self.size
    }

    fn begin_frame(&mut self) -> bool {
        self.pending_clear = None;
        self.target.is_some()
    }

    fn end_frame(&mut self) {
        // Nothing was drawn this frame; still honor the clear.
        if self.pending_clear.is_some() {
            self.submit_pass(None);
        }
    }
}
