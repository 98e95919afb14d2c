//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and windows, one `Gpu` per window.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
