use thiserror::Error;

use super::SpriteId;

/// Scene graph misuse reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SceneError {
    /// The id is stale or was never issued by this stage.
    #[error("unknown sprite {0:?}")]
    UnknownSprite(SpriteId),

    /// A sprite must be detached before it is destroyed.
    #[error("sprite {0:?} is still attached to layer {1}; remove it before destroying")]
    SpriteAttached(SpriteId, i32),
}
