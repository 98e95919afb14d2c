//! Host-facing sprite stage.
//!
//! A `Stage` owns everything a frame needs: the scene graph, the sprite arena,
//! the camera, the clear color, the batch renderer and the GPU backend. Hosts
//! mutate it between frames and call [`Stage::render`] once per redraw.

use anyhow::{Context, Result, ensure};
use image::RgbaImage;

use crate::coords::ColorRgba;
use crate::render::{BatchRenderer, Camera, FrameStats, GpuBackend, MAX_BATCH};
use crate::scene::{Frame, Pass, SceneError, SceneGraph, Sprite, SpriteArena, SpriteId, ZIndex};

/// Stage construction parameters.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Instances per draw submission, capped at [`MAX_BATCH`].
    pub max_batch: usize,

    /// Initial background color.
    pub clear_color: ColorRgba,

    /// Physical pixels per world unit (window scale factor).
    pub pixel_ratio: f32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            max_batch: MAX_BATCH,
            clear_color: ColorRgba::black(),
            pixel_ratio: 1.0,
        }
    }
}

/// Retained sprite scene plus the machinery to draw it.
pub struct Stage<B: GpuBackend> {
    scene: SceneGraph,
    sprites: SpriteArena,
    camera: Camera,
    clear: ColorRgba,
    batch: BatchRenderer,
    backend: B,
}

impl<B: GpuBackend> Stage<B> {
    /// Creates an empty stage (layer 0 only) drawing through `backend`.
    pub fn new(mut backend: B, config: StageConfig) -> Result<Self> {
        let mut batch = BatchRenderer::new(&mut backend, config.max_batch)
            .context("failed to create batch renderer")?;
        batch.set_pixel_ratio(config.pixel_ratio);

        Ok(Self {
            scene: SceneGraph::new(),
            sprites: SpriteArena::new(),
            camera: Camera::default(),
            clear: config.clear_color,
            batch,
            backend,
        })
    }

    // ── sprites ───────────────────────────────────────────────────────────

    /// Creates a detached sprite. It is not drawn until added to a layer.
    pub fn create_sprite(&mut self, frame: Frame) -> SpriteId {
        self.sprites.insert(Sprite::new(frame))
    }

    #[inline]
    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(id)
    }

    /// Mutable access to drawing state.
    ///
    /// Changes to `alpha` or `frame` that cross the opaque/translucent boundary
    /// take effect after [`refresh`](Self::refresh) or a re-add.
    #[inline]
    pub fn sprite_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.get_mut(id)
    }

    /// Destroys a detached sprite and returns it.
    pub fn destroy_sprite(&mut self, id: SpriteId) -> Result<Sprite, SceneError> {
        let sprite = self.sprites.get(id).ok_or(SceneError::UnknownSprite(id))?;
        if let Some(z) = sprite.layer() {
            return Err(SceneError::SpriteAttached(id, z.0));
        }
        self.sprites.take(id).ok_or(SceneError::UnknownSprite(id))
    }

    #[inline]
    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    // ── attachment ────────────────────────────────────────────────────────

    /// Attaches `id` to layer 0.
    pub fn add(&mut self, id: SpriteId) -> Result<Pass, SceneError> {
        self.add_to(ZIndex::ZERO, id)
    }

    /// Attaches `id` to layer `z`, moving it out of its current list first.
    pub fn add_to(&mut self, z: ZIndex, id: SpriteId) -> Result<Pass, SceneError> {
        self.scene.attach(&mut self.sprites, z, id)
    }

    /// Detaches `id`. Returns `false` if it was not attached (or does not exist).
    pub fn remove(&mut self, id: SpriteId) -> bool {
        self.scene.detach(&mut self.sprites, id)
    }

    /// Re-classifies an attached sprite in its current layer.
    ///
    /// Returns `Ok(None)` for a detached sprite.
    pub fn refresh(&mut self, id: SpriteId) -> Result<Option<Pass>, SceneError> {
        let sprite = self.sprites.get(id).ok_or(SceneError::UnknownSprite(id))?;
        let Some(z) = sprite.layer() else {
            return Ok(None);
        };
        self.scene.attach(&mut self.sprites, z, id).map(Some)
    }

    pub fn is_attached(&self, id: SpriteId) -> bool {
        self.sprites.get(id).is_some_and(Sprite::is_attached)
    }

    // ── layers ────────────────────────────────────────────────────────────

    /// Returns the id of layer `z`, creating the layer if needed.
    pub fn layer(&mut self, z: i32) -> ZIndex {
        let z = ZIndex(z);
        self.scene.ensure_layer(z);
        z
    }

    /// Drops layer `z` if it is empty. Layer 0 always stays. Returns whether a
    /// layer was dropped.
    pub fn drop_layer(&mut self, z: ZIndex) -> bool {
        self.scene.remove_layer(z)
    }

    /// Number of sprites attached to layer `z` (0 for a missing layer).
    pub fn layer_len(&self, z: ZIndex) -> usize {
        self.scene.layer(z).map_or(0, |l| l.len())
    }

    #[inline]
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    // ── resources ─────────────────────────────────────────────────────────

    /// Uploads `image` and returns a full-extent frame over it.
    ///
    /// The frame is opaque iff every pixel has alpha 255.
    pub fn texture(&mut self, image: &RgbaImage) -> Result<Frame> {
        let handle = self
            .backend
            .create_texture(image)
            .context("failed to create sprite texture")?;
        Ok(Frame::full(handle, is_opaque(image)))
    }

    /// Reserves a texture whose pixels arrive later.
    ///
    /// The returned frame is (0,0)-sized, so sprites using it draw nothing until
    /// [`load_texture`](Self::load_texture) completes it.
    pub fn pending_texture(&mut self) -> Frame {
        Frame::pending(self.backend.reserve_texture())
    }

    /// Uploads the pixels of a pending texture and returns its full frame.
    ///
    /// Every sprite still showing `pending` switches to the loaded frame (keeping
    /// its anchor) and is re-classified if attached.
    pub fn load_texture(&mut self, pending: Frame, image: &RgbaImage) -> Result<Frame> {
        ensure!(pending.is_pending(), "texture {} is already loaded", pending.texture().0);
        let handle = self
            .backend
            .upload_texture(pending.texture(), image)
            .context("failed to upload pending texture")?;
        let loaded = Frame::full(handle, is_opaque(image));

        let mut moved = Vec::new();
        for (id, sprite) in self.sprites.iter_mut() {
            if sprite.frame.is_pending() && sprite.frame.texture() == handle.id {
                sprite.frame = loaded.with_anchor(sprite.frame.anchor());
                if let Some(z) = sprite.layer() {
                    moved.push((id, z));
                }
            }
        }
        for (id, z) in moved {
            self.scene.attach(&mut self.sprites, z, id)?;
        }

        log::debug!("stage: texture {} loaded ({}x{})", handle.id.0, handle.width, handle.height);
        Ok(loaded)
    }

    // ── frame state ───────────────────────────────────────────────────────

    /// Sets the clear color. Omitted alpha means fully opaque; an explicit
    /// `Some(0.0)` is kept.
    pub fn background(&mut self, r: f32, g: f32, b: f32, a: Option<f32>) {
        self.clear = ColorRgba::new(r, g, b, a.unwrap_or(1.0));
    }

    #[inline]
    pub fn background_color(&self) -> ColorRgba {
        self.clear
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Updates physical pixels per world unit, e.g. after a DPI change.
    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.batch.set_pixel_ratio(ratio);
    }

    /// Draws the whole scene once.
    pub fn render(&mut self) -> FrameStats {
        self.batch.render(&mut self.backend, &self.scene, &self.sprites, &self.camera, self.clear)
    }
}

fn is_opaque(image: &RgbaImage) -> bool {
    image.pixels().all(|p| p.0[3] == u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Rect, Vec2};
    use crate::render::{BackendCall, RecordingBackend};
    use image::Rgba;

    fn stage() -> Stage<RecordingBackend> {
        Stage::new(RecordingBackend::new(320, 200), StageConfig::default()).unwrap()
    }

    fn solid(w: u32, h: u32, alpha: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([200, 100, 50, alpha]))
    }

    fn last_clear(stage: &Stage<RecordingBackend>) -> Option<ColorRgba> {
        stage.backend().calls().iter().rev().find_map(|c| match c {
            BackendCall::Clear(color) => Some(*color),
            _ => None,
        })
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn texture_frame_covers_the_image() {
        let mut stage = stage();
        let frame = stage.texture(&solid(32, 16, 255)).unwrap();
        assert_eq!(frame.size(), Vec2::new(32.0, 16.0));
        assert_eq!(frame.anchor(), Vec2::zero());
        assert!(frame.is_opaque());
    }

    #[test]
    fn any_transparent_pixel_makes_the_frame_translucent() {
        let mut stage = stage();
        let mut image = solid(4, 4, 255);
        image.put_pixel(3, 3, Rgba([0, 0, 0, 128]));
        assert!(!stage.texture(&image).unwrap().is_opaque());
    }

    #[test]
    fn textures_get_distinct_ids() {
        let mut stage = stage();
        let a = stage.texture(&solid(2, 2, 255)).unwrap();
        let b = stage.texture(&solid(2, 2, 255)).unwrap();
        assert_ne!(a.texture(), b.texture());
    }

    #[test]
    fn pending_texture_ids_are_never_reissued() {
        let mut stage = stage();
        let pending = stage.pending_texture();
        let real = stage.texture(&solid(2, 2, 255)).unwrap();
        assert_ne!(pending.texture(), real.texture());

        let waiting = stage.create_sprite(pending);
        let ready = stage.create_sprite(real);
        stage.add(waiting).unwrap();
        stage.add(ready).unwrap();
        stage.render();

        let textures: Vec<_> = stage.backend().draws().iter().map(|d| d.texture).collect();
        assert_eq!(textures, vec![real.texture(), pending.texture()]);
    }

    #[test]
    fn loading_a_pending_texture_updates_its_sprites() {
        let mut stage = stage();
        let pending = stage.pending_texture().with_anchor(Vec2::splat(0.5));
        let id = stage.create_sprite(pending);
        assert_eq!(stage.add(id).unwrap(), Pass::Translucent);

        let loaded = stage.load_texture(pending, &solid(8, 4, 255)).unwrap();
        assert_eq!(loaded.texture(), pending.texture());
        assert_eq!(loaded.size(), Vec2::new(8.0, 4.0));

        let sprite = stage.sprite(id).unwrap();
        assert_eq!(sprite.frame.size(), Vec2::new(8.0, 4.0));
        assert_eq!(sprite.frame.anchor(), Vec2::splat(0.5));

        let layer = stage.scene().layer(ZIndex::ZERO).unwrap();
        assert_eq!(layer.opaque().len(), 1);
        assert!(layer.translucent().is_empty());
    }

    #[test]
    fn a_texture_loads_only_once() {
        let mut stage = stage();
        let pending = stage.pending_texture();
        let loaded = stage.load_texture(pending, &solid(2, 2, 255)).unwrap();
        assert!(stage.load_texture(pending, &solid(2, 2, 255)).is_err());
        assert!(stage.load_texture(loaded, &solid(2, 2, 255)).is_err());
    }

    // ── add / remove ──────────────────────────────────────────────────────

    #[test]
    fn add_goes_to_layer_zero() {
        let mut stage = stage();
        let frame = stage.texture(&solid(2, 2, 255)).unwrap();
        let id = stage.create_sprite(frame);

        assert_eq!(stage.add(id).unwrap(), Pass::Opaque);
        assert_eq!(stage.sprite(id).unwrap().layer(), Some(ZIndex::ZERO));
        assert_eq!(stage.layer_len(ZIndex::ZERO), 1);
    }

    #[test]
    fn add_to_another_layer_moves_the_sprite() {
        let mut stage = stage();
        let frame = stage.texture(&solid(2, 2, 255)).unwrap();
        let id = stage.create_sprite(frame);
        let top = stage.layer(4);

        stage.add(id).unwrap();
        stage.add_to(top, id).unwrap();

        assert_eq!(stage.layer_len(ZIndex::ZERO), 0);
        assert_eq!(stage.layer_len(top), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut stage = stage();
        let frame = stage.texture(&solid(2, 2, 255)).unwrap();
        let id = stage.create_sprite(frame);
        stage.add(id).unwrap();

        assert!(stage.remove(id));
        assert!(!stage.remove(id));
        assert!(!stage.is_attached(id));
        assert_eq!(stage.layer_len(ZIndex::ZERO), 0);
    }

    #[test]
    fn refresh_reclassifies_after_alpha_change() {
        let mut stage = stage();
        let frame = stage.texture(&solid(2, 2, 255)).unwrap();
        let id = stage.create_sprite(frame);
        stage.add(id).unwrap();

        stage.sprite_mut(id).unwrap().alpha = 0.5;
        assert_eq!(stage.refresh(id).unwrap(), Some(Pass::Translucent));

        let layer = stage.scene().layer(ZIndex::ZERO).unwrap();
        assert!(layer.opaque().is_empty());
        assert_eq!(layer.translucent().len(), 1);
    }

    #[test]
    fn refresh_on_detached_sprite_is_none() {
        let mut stage = stage();
        let pending = stage.pending_texture();
        let id = stage.create_sprite(pending);
        assert_eq!(stage.refresh(id).unwrap(), None);
    }

    // ── layers ────────────────────────────────────────────────────────────

    #[test]
    fn empty_layers_can_be_dropped() {
        let mut stage = stage();
        let frame = stage.texture(&solid(2, 2, 255)).unwrap();
        let id = stage.create_sprite(frame);
        let z = stage.layer(7);
        stage.add_to(z, id).unwrap();

        assert!(!stage.drop_layer(z));
        stage.remove(id);
        assert!(stage.drop_layer(z));
        assert!(!stage.drop_layer(ZIndex::ZERO));
        assert_eq!(stage.scene().layers().len(), 1);
    }

    // ── destroy ───────────────────────────────────────────────────────────

    #[test]
    fn destroying_an_attached_sprite_is_rejected() {
        let mut stage = stage();
        let frame = stage.texture(&solid(2, 2, 255)).unwrap();
        let id = stage.create_sprite(frame);
        let z = stage.layer(3);
        stage.add_to(z, id).unwrap();

        assert_eq!(stage.destroy_sprite(id), Err(SceneError::SpriteAttached(id, 3)));

        stage.remove(id);
        assert!(stage.destroy_sprite(id).is_ok());
        assert_eq!(stage.destroy_sprite(id), Err(SceneError::UnknownSprite(id)));
        assert_eq!(stage.sprite_count(), 0);
    }

    #[test]
    fn stale_id_cannot_be_added() {
        let mut stage = stage();
        let pending = stage.pending_texture();
        let id = stage.create_sprite(pending);
        stage.destroy_sprite(id).unwrap();
        assert_eq!(stage.add(id), Err(SceneError::UnknownSprite(id)));
        assert!(!stage.remove(id));
    }

    // ── background ────────────────────────────────────────────────────────

    #[test]
    fn omitted_background_alpha_is_opaque() {
        let mut stage = stage();
        stage.background(0.1, 0.2, 0.3, None);
        stage.render();
        assert_eq!(last_clear(&stage), Some(ColorRgba::new(0.1, 0.2, 0.3, 1.0)));
    }

    #[test]
    fn explicit_zero_background_alpha_is_kept() {
        let mut stage = stage();
        stage.background(0.1, 0.2, 0.3, Some(0.0));
        stage.render();
        assert_eq!(last_clear(&stage), Some(ColorRgba::new(0.1, 0.2, 0.3, 0.0)));
    }

    #[test]
    fn config_clear_color_is_the_initial_background() {
        let config = StageConfig { clear_color: ColorRgba::new(1.0, 0.0, 0.0, 1.0), ..Default::default() };
        let stage = Stage::new(RecordingBackend::new(8, 8), config).unwrap();
        assert_eq!(stage.background_color(), ColorRgba::new(1.0, 0.0, 0.0, 1.0));
    }

    // ── render ────────────────────────────────────────────────────────────

    #[test]
    fn atlas_regions_share_one_draw() {
        let mut stage = stage();
        let atlas = stage.texture(&solid(64, 64, 255)).unwrap();
        for i in 0..4 {
            let frame = atlas.region(Rect::new(i as f32 * 16.0, 0.0, 16.0, 16.0));
            let id = stage.create_sprite(frame);
            stage.add(id).unwrap();
        }

        let stats = stage.render();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.instances, 4);
    }

    #[test]
    fn pixel_ratio_changes_apply_to_the_next_frame() {
        let mut stage = stage();
        stage.set_pixel_ratio(2.0);
        stage.render();

        let expected = stage.camera().projection(crate::coords::Viewport::new(160.0, 100.0));
        assert!(stage.backend().calls().iter().any(
            |c| matches!(c, BackendCall::UniformMatrix { matrix, .. } if *matrix == expected)
        ));
    }

    #[test]
    fn camera_changes_are_read_at_render() {
        let mut stage = stage();
        stage.camera_mut().at = Vec2::new(50.0, 50.0);
        stage.camera_mut().to = Vec2::splat(0.5);
        stage.render();

        let expected = stage.camera().projection(crate::coords::Viewport::new(320.0, 200.0));
        assert!(stage.backend().calls().iter().any(
            |c| matches!(c, BackendCall::UniformMatrix { matrix, .. } if *matrix == expected)
        ));
    }
}
