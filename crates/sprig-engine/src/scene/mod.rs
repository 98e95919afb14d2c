//! Retained scene graph.
//!
//! Responsibilities:
//! - own sprites in a generational arena (`SpriteArena`)
//! - keep each attached sprite in exactly one layer list, with O(1) attach/detach
//! - classify sprites into opaque/translucent lists per layer
//! - expose layers in ascending z for the batch renderer

mod error;
mod frame;
mod graph;
mod layer;
mod list;
mod sprite;
mod z_index;

pub use error::SceneError;
pub use frame::{Frame, TextureHandle, TextureId, UvRect};
pub use graph::SceneGraph;
pub use layer::{Layer, Pass};
pub use list::{IntrusiveList, Iter, ListId, NodeHandle, NodePool};
pub use sprite::{Sprite, SpriteArena, SpriteId};
pub use z_index::ZIndex;
