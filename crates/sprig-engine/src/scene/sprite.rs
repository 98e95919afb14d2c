use slotmap::{SlotMap, new_key_type};

use crate::coords::{Rgb, Vec2};

use super::frame::Frame;
use super::list::NodeHandle;
use super::ZIndex;

new_key_type! {
    /// Stable identity of a sprite owned by a stage.
    ///
    /// Ids are generational: once the sprite is destroyed the id never resolves
    /// again, even after its slot is reused.
    pub struct SpriteId;
}

/// Mutable drawable.
///
/// Drawing state (`position`, `rotation`, `tint`, `alpha`, `visible`, `frame`) is
/// read every frame. The opaque/translucent split is decided when the sprite is
/// attached, so changing `alpha` or `frame` across that boundary needs a re-add
/// (see `Stage::refresh`).
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub position: Vec2,
    /// Radians, around the frame anchor.
    pub rotation: f32,
    pub tint: Rgb,
    /// `[0, 1]`. Anything other than exactly 1 classifies the sprite as translucent.
    pub alpha: f32,
    pub visible: bool,
    pub frame: Frame,

    node: Option<NodeHandle>,
    layer: Option<ZIndex>,
}

impl Sprite {
    /// Creates a detached, visible, untinted, fully opaque sprite at the origin.
    pub fn new(frame: Frame) -> Self {
        Self {
            position: Vec2::zero(),
            rotation: 0.0,
            tint: Rgb::WHITE,
            alpha: 1.0,
            visible: true,
            frame,
            node: None,
            layer: None,
        }
    }

    /// Whether the sprite would go to a translucent list if attached now.
    #[inline]
    pub fn is_translucent(&self) -> bool {
        self.alpha != 1.0 || !self.frame.is_opaque()
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.node.is_some()
    }

    /// Layer the sprite is attached to, if any.
    #[inline]
    pub fn layer(&self) -> Option<ZIndex> {
        self.layer
    }

    #[inline]
    pub(crate) fn node(&self) -> Option<NodeHandle> {
        self.node
    }

    #[inline]
    pub(crate) fn set_attachment(&mut self, node: NodeHandle, layer: ZIndex) {
        self.node = Some(node);
        self.layer = Some(layer);
    }

    /// Clears the back-reference and returns what it pointed at.
    #[inline]
    pub(crate) fn take_attachment(&mut self) -> Option<(NodeHandle, ZIndex)> {
        let node = self.node.take()?;
        let layer = self.layer.take()?;
        Some((node, layer))
    }
}

/// Owning arena for sprites.
#[derive(Debug)]
pub struct SpriteArena {
    sprites: SlotMap<SpriteId, Sprite>,
}

impl Default for SpriteArena {
    fn default() -> Self {
        Self { sprites: SlotMap::with_key() }
    }
}

impl SpriteArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sprite: Sprite) -> SpriteId {
        self.sprites.insert(sprite)
    }

    /// Removes a sprite regardless of attachment. Callers check attachment first.
    pub(crate) fn take(&mut self, id: SpriteId) -> Option<Sprite> {
        self.sprites.remove(id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (SpriteId, &mut Sprite)> {
        self.sprites.iter_mut()
    }

    #[inline]
    pub fn get(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.get_mut(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
