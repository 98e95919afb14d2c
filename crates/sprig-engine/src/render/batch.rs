use anyhow::{Context, Result};

use crate::coords::{ColorRgba, Viewport};
use crate::scene::{Pass, SceneGraph, SpriteArena, TextureId};

use super::backend::{BufferHandle, DrawBatch, GpuBackend, PROJECTION_UNIFORM, QUAD_VERTEX_COUNT};
use super::camera::Camera;
use super::instance::{InstanceBuffer, SpriteInstance, MAX_BATCH};

/// Where the renderer is within a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RenderPhase {
    Idle,
    FrameStart,
    Traversing,
    Flushing,
}

/// Texture the pending instances will be drawn with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Binding {
    Unbound,
    Bound(TextureId),
}

/// Per-frame summary returned by [`BatchRenderer::render`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub instances: u32,
    pub skipped_invisible: u32,
}

/// Packing state carried through one traversal.
#[derive(Debug, Copy, Clone)]
struct Batch {
    binding: Binding,
    blend: bool,
}

impl Batch {
    const START: Batch = Batch { binding: Binding::Unbound, blend: false };
}

/// Walks the scene once per frame and turns it into instanced draws.
///
/// A flush happens exactly when the instance buffer is full or the next
/// sprite's texture differs from the bound one, plus once at the end of the
/// traversal.
#[derive(Debug)]
pub struct BatchRenderer {
    instances: InstanceBuffer,
    storage: BufferHandle,
    phase: RenderPhase,
    drawable: Option<(u32, u32)>,
    pixel_ratio: f32,
}

impl BatchRenderer {
    /// Allocates the instance buffer (`max_batch` records, capped at [`MAX_BATCH`])
    /// and its backend storage.
    pub fn new<B: GpuBackend>(backend: &mut B, max_batch: usize) -> Result<Self> {
        let instances = InstanceBuffer::new(max_batch.min(MAX_BATCH));
        let storage = backend
            .create_instance_storage(instances.capacity_bytes())
            .context("failed to allocate sprite instance storage")?;

        log::debug!(
            "batch: {} instances x {} bytes",
            instances.capacity(),
            SpriteInstance::STRIDE
        );

        Ok(Self {
            instances,
            storage,
            phase: RenderPhase::Idle,
            drawable: None,
            pixel_ratio: 1.0,
        })
    }

    /// Physical pixels per world unit at zoom 1. Non-positive values reset to 1.
    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 };
    }

    #[inline]
    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.instances.capacity()
    }

    /// Renders one frame.
    ///
    /// Returns default stats when the backend declines the frame.
    pub fn render<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        scene: &SceneGraph,
        sprites: &SpriteArena,
        camera: &Camera,
        clear: ColorRgba,
    ) -> FrameStats {
        self.phase = RenderPhase::FrameStart;
        self.instances.reset();

        if !backend.begin_frame() {
            log::trace!("batch: frame declined by backend");
            self.phase = RenderPhase::Idle;
            return FrameStats::default();
        }

        let (width, height) = backend.drawable_size();
        if self.drawable != Some((width, height)) {
            log::debug!("batch: drawable resized to {width}x{height}");
            backend.set_viewport(width, height);
            self.drawable = Some((width, height));
        }

        let viewport = Viewport::new(width as f32 / self.pixel_ratio, height as f32 / self.pixel_ratio);
        backend.set_uniform_matrix(PROJECTION_UNIFORM, &camera.projection(viewport));
        backend.clear(clear);

        self.phase = RenderPhase::Traversing;
        let mut stats = FrameStats::default();
        let mut batch = Batch::START;

        for layer in scene.layers() {
            for (pass, list) in layer.passes() {
                for &id in list.iter(scene.nodes()) {
                    let Some(sprite) = sprites.get(id) else {
                        log::warn!("batch: list references a destroyed sprite");
                        continue;
                    };
                    if !sprite.visible {
                        stats.skipped_invisible += 1;
                        continue;
                    }

                    if self.instances.is_full() {
                        batch = self.flush(backend, batch, &mut stats);
                    }

                    let texture = Binding::Bound(sprite.frame.texture());
                    if batch.binding != texture {
                        batch = self.flush(backend, batch, &mut stats);
                        batch.binding = texture;
                    }

                    self.instances.push(SpriteInstance::from_sprite(sprite, layer.z()));
                    batch.blend |= pass == Pass::Translucent;
                }
            }
        }

        self.flush(backend, batch, &mut stats);
        backend.end_frame();
        self.phase = RenderPhase::Idle;

        log::trace!(
            "batch: {} draws, {} instances, {} hidden",
            stats.draw_calls,
            stats.instances,
            stats.skipped_invisible
        );
        stats
    }

    /// Submits the pending instances and returns the state for the next batch.
    ///
    /// The binding survives the flush; the blend flag starts over.
    fn flush<B: GpuBackend>(&mut self, backend: &mut B, batch: Batch, stats: &mut FrameStats) -> Batch {
        let next = Batch { binding: batch.binding, blend: false };
        if self.instances.is_empty() {
            return next;
        }
        let Binding::Bound(texture) = batch.binding else {
            self.instances.reset();
            return next;
        };

        let resume = self.phase;
        self.phase = RenderPhase::Flushing;

        let count = self.instances.count() as u32;
        backend.upload_subrange(self.storage, 0, self.instances.bytes());
        backend.draw_instanced(&DrawBatch {
            storage: self.storage,
            texture,
            vertex_count: QUAD_VERTEX_COUNT,
            instance_count: count,
            blend: batch.blend,
        });
        log::trace!("batch: flush {count} instances (texture {})", texture.0);

        stats.draw_calls += 1;
        stats.instances += count;
        self.instances.reset();
        self.phase = resume;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::render::backend::{BackendCall, RecordingBackend};
    use crate::scene::{Frame, Sprite, SpriteId, TextureHandle, ZIndex};

    struct Fixture {
        backend: RecordingBackend,
        scene: SceneGraph,
        sprites: SpriteArena,
        batch: BatchRenderer,
    }

    impl Fixture {
        fn new(max_batch: usize) -> Self {
            let mut backend = RecordingBackend::new(640, 480);
            let batch = BatchRenderer::new(&mut backend, max_batch).unwrap();
            Self { backend, scene: SceneGraph::new(), sprites: SpriteArena::new(), batch }
        }

        fn spawn(&mut self, z: i32, frame: Frame) -> SpriteId {
            let id = self.sprites.insert(Sprite::new(frame));
            self.scene.attach(&mut self.sprites, ZIndex(z), id).unwrap();
            id
        }

        fn render(&mut self) -> FrameStats {
            self.backend.clear_calls();
            self.batch.render(
                &mut self.backend,
                &self.scene,
                &self.sprites,
                &Camera::default(),
                ColorRgba::black(),
            )
        }

        fn draw_counts(&self) -> Vec<u32> {
            self.backend.draws().iter().map(|d| d.instance_count).collect()
        }

        fn draw_textures(&self) -> Vec<u32> {
            self.backend.draws().iter().map(|d| d.texture.0).collect()
        }
    }

    fn frame(texture: u32, opaque: bool) -> Frame {
        Frame::full(TextureHandle { id: TextureId(texture), width: 8, height: 8 }, opaque)
    }

    fn first_record(fx: &Fixture) -> SpriteInstance {
        let storage = fx.backend.storage(fx.batch.storage).unwrap();
        bytemuck::pod_read_unaligned(&storage[..SpriteInstance::STRIDE])
    }

    // ── flush policy ──────────────────────────────────────────────────────

    #[test]
    fn seventy_thousand_sprites_one_texture_two_draws() {
        let mut fx = Fixture::new(MAX_BATCH);
        for _ in 0..70_000 {
            fx.spawn(0, frame(1, true));
        }

        let stats = fx.render();
        let counts = fx.draw_counts();

        assert_eq!(counts.len(), 2);
        assert!(counts.iter().all(|&c| c as usize <= MAX_BATCH));
        assert_eq!(counts.iter().sum::<u32>(), 70_000);
        assert_eq!(counts, vec![65_535, 4_465]);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.instances, 70_000);
    }

    #[test]
    fn texture_switch_back_and_forth_is_three_draws() {
        let mut fx = Fixture::new(MAX_BATCH);
        fx.spawn(0, frame(1, true));
        fx.spawn(0, frame(2, true));
        fx.spawn(0, frame(1, true));

        fx.render();
        assert_eq!(fx.draw_counts(), vec![1, 1, 1]);
        assert_eq!(fx.draw_textures(), vec![1, 2, 1]);
    }

    #[test]
    fn full_buffer_and_texture_change_flush_once() {
        let mut fx = Fixture::new(2);
        // Enumeration is most recent first: T1, T1, T2.
        fx.spawn(0, frame(2, true));
        fx.spawn(0, frame(1, true));
        fx.spawn(0, frame(1, true));

        let stats = fx.render();
        assert_eq!(fx.draw_counts(), vec![2, 1]);
        assert_eq!(fx.draw_textures(), vec![1, 2]);
        assert_eq!(stats.draw_calls, 2);
    }

    #[test]
    fn small_capacity_splits_evenly() {
        let mut fx = Fixture::new(4);
        for _ in 0..10 {
            fx.spawn(0, frame(1, true));
        }
        fx.render();
        assert_eq!(fx.draw_counts(), vec![4, 4, 2]);
    }

    #[test]
    fn capacity_is_capped_at_max_batch() {
        let mut backend = RecordingBackend::new(1, 1);
        let batch = BatchRenderer::new(&mut backend, 1_000_000).unwrap();
        assert_eq!(batch.capacity(), MAX_BATCH);
    }

    #[test]
    fn empty_scene_issues_no_draw_but_still_clears() {
        let mut fx = Fixture::new(16);
        let stats = fx.render();
        assert_eq!(stats, FrameStats::default());
        assert!(fx.backend.draws().is_empty());
        assert!(fx.backend.calls().iter().any(|c| matches!(c, BackendCall::Clear(_))));
        assert_eq!(fx.backend.calls().last(), Some(&BackendCall::EndFrame));
    }

    #[test]
    fn uploads_cover_only_the_written_prefix() {
        let mut fx = Fixture::new(16);
        for _ in 0..3 {
            fx.spawn(0, frame(1, true));
        }
        fx.render();
        let uploads: Vec<usize> = fx
            .backend
            .calls()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Upload { offset: 0, len, .. } => Some(*len),
                _ => None,
            })
            .collect();
        assert_eq!(uploads, vec![3 * SpriteInstance::STRIDE]);
    }

    // ── passes and layers ─────────────────────────────────────────────────

    #[test]
    fn pass_change_on_same_texture_does_not_flush() {
        let mut fx = Fixture::new(16);
        fx.spawn(0, frame(1, true));
        fx.spawn(0, frame(1, false));

        fx.render();
        let draws = fx.backend.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].instance_count, 2);
        assert!(draws[0].blend);
    }

    #[test]
    fn fully_opaque_batch_skips_blending() {
        let mut fx = Fixture::new(16);
        fx.spawn(0, frame(1, true));
        fx.spawn(0, frame(1, true));

        fx.render();
        assert!(!fx.backend.draws()[0].blend);
    }

    #[test]
    fn blend_flag_resets_after_each_flush() {
        let mut fx = Fixture::new(16);
        fx.spawn(0, frame(1, false));
        fx.spawn(1, frame(2, true));

        fx.render();
        let blends: Vec<bool> = fx.backend.draws().iter().map(|d| d.blend).collect();
        assert_eq!(blends, vec![true, false]);
    }

    #[test]
    fn layers_draw_in_ascending_z() {
        let mut fx = Fixture::new(16);
        fx.spawn(2, frame(30, true));
        fx.spawn(-1, frame(10, true));
        fx.spawn(0, frame(20, true));

        fx.render();
        assert_eq!(fx.draw_textures(), vec![10, 20, 30]);
    }

    #[test]
    fn opaque_list_drawn_before_translucent_within_a_layer() {
        let mut fx = Fixture::new(16);
        fx.spawn(0, frame(2, false));
        fx.spawn(0, frame(1, true));

        fx.render();
        assert_eq!(fx.draw_textures(), vec![1, 2]);
    }

    #[test]
    fn record_carries_layer_z() {
        let mut fx = Fixture::new(16);
        fx.spawn(7, frame(1, true));
        fx.render();
        assert_eq!(first_record(&fx).z, 7.0);
    }

    // ── sprite state ──────────────────────────────────────────────────────

    #[test]
    fn invisible_sprites_are_never_packed() {
        let mut fx = Fixture::new(16);
        let hidden = fx.spawn(0, frame(1, true));
        fx.spawn(0, frame(1, true));
        fx.sprites.get_mut(hidden).unwrap().visible = false;

        let stats = fx.render();
        assert_eq!(fx.draw_counts(), vec![1]);
        assert_eq!(stats.skipped_invisible, 1);
    }

    #[test]
    fn invisible_sprite_does_not_break_a_batch() {
        let mut fx = Fixture::new(16);
        fx.spawn(0, frame(1, true));
        let hidden = fx.spawn(0, frame(2, true));
        fx.spawn(0, frame(1, true));
        fx.sprites.get_mut(hidden).unwrap().visible = false;

        fx.render();
        assert_eq!(fx.draw_counts(), vec![2]);
    }

    #[test]
    fn pending_frame_packs_zero_size_quad() {
        let mut fx = Fixture::new(16);
        let id = fx.spawn(0, Frame::pending(TextureId(5)));
        fx.sprites.get_mut(id).unwrap().position = Vec2::new(3.0, 4.0);

        let stats = fx.render();
        assert_eq!(stats.instances, 1);
        let record = first_record(&fx);
        assert_eq!(record.size, [0.0, 0.0]);
        assert_eq!(record.position, [3.0, 4.0]);
    }

    #[test]
    fn detached_sprite_is_not_drawn() {
        let mut fx = Fixture::new(16);
        let id = fx.spawn(0, frame(1, true));
        fx.scene.detach(&mut fx.sprites, id);

        assert_eq!(fx.render().instances, 0);
    }

    // ── frame start ───────────────────────────────────────────────────────

    #[test]
    fn frame_start_order_is_viewport_projection_clear() {
        let mut fx = Fixture::new(16);
        fx.render();
        let calls = fx.backend.calls();
        assert_eq!(calls[0], BackendCall::BeginFrame);
        assert_eq!(calls[1], BackendCall::Viewport { width: 640, height: 480 });
        assert!(matches!(&calls[2], BackendCall::UniformMatrix { name, .. } if name == PROJECTION_UNIFORM));
        assert!(matches!(calls[3], BackendCall::Clear(_)));
    }

    #[test]
    fn viewport_is_only_reset_on_resize() {
        let mut fx = Fixture::new(16);
        fx.render();
        fx.render();
        assert!(!fx.backend.calls().iter().any(|c| matches!(c, BackendCall::Viewport { .. })));

        fx.backend.set_drawable_size(800, 600);
        fx.render();
        assert!(fx.backend.calls().contains(&BackendCall::Viewport { width: 800, height: 600 }));
    }

    #[test]
    fn projection_matches_camera_for_drawable() {
        let mut fx = Fixture::new(16);
        fx.render();
        let expected = Camera::default().projection(Viewport::new(640.0, 480.0));
        assert!(fx.backend.calls().contains(&BackendCall::UniformMatrix {
            name: PROJECTION_UNIFORM.to_string(),
            matrix: expected,
        }));
    }

    #[test]
    fn pixel_ratio_scales_the_logical_viewport() {
        let mut fx = Fixture::new(16);
        fx.batch.set_pixel_ratio(2.0);
        fx.render();
        let expected = Camera::default().projection(Viewport::new(320.0, 240.0));
        assert!(fx.backend.calls().iter().any(
            |c| matches!(c, BackendCall::UniformMatrix { matrix, .. } if *matrix == expected)
        ));
    }

    #[test]
    fn declined_frame_submits_nothing() {
        let mut fx = Fixture::new(16);
        fx.spawn(0, frame(1, true));
        fx.backend.set_accept_frames(false);

        let stats = fx.render();
        assert_eq!(stats, FrameStats::default());
        assert!(fx.backend.calls().is_empty());
        assert_eq!(fx.batch.phase(), RenderPhase::Idle);

        fx.backend.set_accept_frames(true);
        assert_eq!(fx.render().instances, 1);
    }

    #[test]
    fn renderer_returns_to_idle() {
        let mut fx = Fixture::new(2);
        for _ in 0..5 {
            fx.spawn(0, frame(1, true));
        }
        fx.render();
        assert_eq!(fx.batch.phase(), RenderPhase::Idle);
    }
}
