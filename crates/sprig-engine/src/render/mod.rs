//! Sprite batching and GPU submission.
//!
//! Convention:
//! - world units, top-left origin, +Y down
//! - the camera matrix maps world to clip space; layer z rides along as depth
//! - all GPU work goes through a [`GpuBackend`]

pub mod backend;
mod batch;
mod camera;
mod common;
mod instance;

pub use backend::{
    BackendCall, BufferHandle, DrawBatch, GpuBackend, RecordingBackend, WgpuBackend, WgpuTarget,
    PROJECTION_UNIFORM, QUAD_VERTEX_COUNT,
};
pub use batch::{BatchRenderer, Binding, FrameStats, RenderPhase};
pub use camera::{Camera, DEPTH};
pub use instance::{InstanceBuffer, SpriteInstance, MAX_BATCH};
