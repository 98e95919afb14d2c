//! Contracts between the window runtime and the application.
//!
//! The runtime owns windows and GPU contexts; the app owns its `Stage` and
//! draws it through [`FrameCtx::render_stage`].

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, FrameOutcome, WindowCtx};
