use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use sprig_engine::coords::{Rect, Rgb, Vec2};
use sprig_engine::core::{App, AppControl, FrameCtx, FrameOutcome};
use sprig_engine::device::GpuInit;
use sprig_engine::logging::{init_logging, LoggingConfig};
use sprig_engine::render::WgpuBackend;
use sprig_engine::scene::{Frame, SpriteId, ZIndex};
use sprig_engine::window::{Runtime, RuntimeConfig};
use sprig_engine::{Stage, StageConfig};

/// Atlas is `TILES × TILES` cells of `TILE` texels.
const TILE: u32 = 32;
const TILES: u32 = 4;

const WORLD: Vec2 = Vec2 { x: 4096.0, y: 4096.0 };
const SPINNERS: usize = 12_000;
const GHOSTS: usize = 4_000;
const STATS_EVERY: u64 = 240;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig { title: "sprig demo".to_string(), ..Default::default() },
        GpuInit::default(),
        Demo::default(),
    )
}

#[derive(Default)]
struct Demo {
    scene: Option<DemoScene>,
}

impl App for Demo {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.scene.is_none() {
            match DemoScene::new(ctx) {
                Ok(scene) => self.scene = Some(scene),
                Err(e) => {
                    log::error!("demo setup failed: {e:#}");
                    return AppControl::Exit;
                }
            }
        }
        let Some(scene) = self.scene.as_mut() else {
            return AppControl::Exit;
        };

        scene.animate(ctx.time.dt, ctx.time.elapsed as f32);

        let outcome = ctx.render_stage(&mut scene.stage);
        if let FrameOutcome::Presented(stats) = outcome {
            if ctx.time.frame_index % STATS_EVERY == 0 {
                log::info!(
                    "frame {}: {} draws, {} sprites, {} hidden",
                    ctx.time.frame_index,
                    stats.draw_calls,
                    stats.instances,
                    stats.skipped_invisible
                );
            }
        }
        outcome.control()
    }
}

struct Spinner {
    id: SpriteId,
    speed: f32,
}

struct DemoScene {
    stage: Stage<WgpuBackend>,
    spinners: Vec<Spinner>,
    ghosts: Vec<SpriteId>,
}

impl DemoScene {
    fn new(ctx: &mut FrameCtx<'_, '_>) -> Result<Self> {
        let backend = WgpuBackend::new(ctx.gpu);
        let config = StageConfig { pixel_ratio: ctx.window.scale_factor(), ..Default::default() };
        let mut stage = Stage::new(backend, config).context("failed to create stage")?;
        stage.background(0.05, 0.06, 0.09, None);

        let atlas = stage.texture(&atlas_image()).context("failed to upload atlas")?;
        let checker = stage.texture(&checker_image(64)).context("failed to upload checker")?;

        let floor = stage.layer(-1);
        let actors = stage.layer(0);
        let overlay = stage.layer(1);

        // Floor: opaque tiles from the first atlas row.
        let cols = (WORLD.x / TILE as f32) as u32;
        let rows = (WORLD.y / TILE as f32) as u32;
        for y in 0..rows {
            for x in 0..cols {
                let cell = (x + y) % TILES;
                let id = stage.create_sprite(tile(&atlas, cell, 0).with_opaque(true));
                if let Some(s) = stage.sprite_mut(id) {
                    s.position = Vec2::new((x * TILE) as f32, (y * TILE) as f32);
                }
                stage.add_to(floor, id)?;
            }
        }

        // Actors: translucent atlas shapes spinning around their centers.
        let mut spinners = Vec::with_capacity(SPINNERS);
        for i in 0..SPINNERS {
            let frame = tile(&atlas, i as u32 % TILES, 1 + (i as u32 / TILES) % (TILES - 1))
                .with_anchor(Vec2::splat(0.5));
            let id = stage.create_sprite(frame);
            if let Some(s) = stage.sprite_mut(id) {
                s.position = scatter(i, 0.0);
                s.tint = Rgb::from_u8(255, 200 + (i % 56) as u8, 160 + (i % 96) as u8);
            }
            stage.add_to(actors, id)?;
            spinners.push(Spinner { id, speed: 0.5 + (i % 7) as f32 * 0.35 });
        }

        // Overlay: half-transparent checker sprites on a second texture.
        let mut ghosts = Vec::with_capacity(GHOSTS);
        for i in 0..GHOSTS {
            let id = stage.create_sprite(checker.with_anchor(Vec2::splat(0.5)));
            if let Some(s) = stage.sprite_mut(id) {
                s.position = scatter(i, 0.37);
                s.alpha = 0.5;
            }
            stage.add_to(overlay, id)?;
            ghosts.push(id);
        }

        let camera = stage.camera_mut();
        camera.at = WORLD * 0.5;
        camera.to = Vec2::splat(0.5);

        log::info!(
            "demo: {} sprites across {} layers",
            stage.sprite_count(),
            stage.scene().layers().len()
        );

        Ok(Self { stage, spinners, ghosts })
    }

    fn animate(&mut self, dt: f32, t: f32) {
        for spinner in &self.spinners {
            if let Some(s) = self.stage.sprite_mut(spinner.id) {
                s.rotation += spinner.speed * dt;
            }
        }

        // Blink a slice of the overlay to exercise visibility.
        let phase = (t * 2.0) as usize;
        for (i, &id) in self.ghosts.iter().enumerate() {
            if let Some(s) = self.stage.sprite_mut(id) {
                s.visible = (i + phase) % 5 != 0;
            }
        }

        let camera = self.stage.camera_mut();
        camera.angle = (t * 0.15).sin() * 0.4;
        camera.at = WORLD * 0.5 + Vec2::new((t * 0.1).cos(), (t * 0.13).sin()) * 600.0;
    }
}

/// Atlas cell `(cx, cy)` as a frame.
fn tile(atlas: &Frame, cx: u32, cy: u32) -> Frame {
    atlas.region(Rect::new((cx * TILE) as f32, (cy * TILE) as f32, TILE as f32, TILE as f32))
}

/// Low-discrepancy placement inside the world.
fn scatter(i: usize, offset: f32) -> Vec2 {
    let u = (i as f32 * 0.618_034 + offset).fract();
    let v = (i as f32 * 0.754_877 + offset * 0.5).fract();
    Vec2::new(u * WORLD.x, v * WORLD.y)
}

/// Row 0: solid floor colors. Other rows: soft discs with transparent corners.
fn atlas_image() -> RgbaImage {
    const PALETTE: [[u8; 3]; 4] = [[46, 52, 64], [59, 66, 82], [67, 76, 94], [52, 60, 70]];
    const SHADES: [[u8; 3]; 4] = [[191, 97, 106], [235, 203, 139], [163, 190, 140], [129, 161, 193]];

    let size = TILE * TILES;
    RgbaImage::from_fn(size, size, |x, y| {
        let (cx, cy) = (x / TILE, y / TILE);
        if cy == 0 {
            let [r, g, b] = PALETTE[cx as usize];
            return Rgba([r, g, b, 255]);
        }

        let half = TILE as f32 / 2.0;
        let dx = (x % TILE) as f32 + 0.5 - half;
        let dy = (y % TILE) as f32 + 0.5 - half;
        let d = (dx * dx + dy * dy).sqrt() / half;
        let a = ((1.0 - d) * 4.0).clamp(0.0, 1.0);
        let [r, g, b] = SHADES[((cx + cy) % 4) as usize];
        Rgba([r, g, b, (a * 255.0) as u8])
    })
}

fn checker_image(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgba([236, 239, 244, 255])
        } else {
            Rgba([76, 86, 106, 255])
        }
    })
}
