//! sprig engine crate.
//!
//! Retained-mode 2D sprite renderer: a scene of layered sprites, batched into
//! instanced draws through a pluggable GPU backend, plus the wgpu/winit runtime
//! that hosts it.

pub mod coords;
pub mod render;
pub mod scene;
pub mod stage;

pub mod core;
pub mod device;
pub mod logging;
pub mod time;
pub mod window;

pub use stage::{Stage, StageConfig};
