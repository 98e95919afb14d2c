use super::list::{IntrusiveList, NodeHandle, NodePool};
use super::sprite::{Sprite, SpriteId};
use super::ZIndex;

/// Which of a layer's two lists a sprite lives in.
///
/// Traversal visits `Opaque` before `Translucent` within each layer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Pass {
    Opaque,
    Translucent,
}

/// Sprites drawn at one z-level, split by blending needs.
#[derive(Debug)]
pub struct Layer {
    z: ZIndex,
    opaque: IntrusiveList,
    translucent: IntrusiveList,
}

impl Layer {
    pub(crate) fn new(z: ZIndex, pool: &mut NodePool<SpriteId>) -> Self {
        Self {
            z,
            opaque: pool.new_list(),
            translucent: pool.new_list(),
        }
    }

    #[inline]
    pub fn z(&self) -> ZIndex {
        self.z
    }

    #[inline]
    pub fn opaque(&self) -> &IntrusiveList {
        &self.opaque
    }

    #[inline]
    pub fn translucent(&self) -> &IntrusiveList {
        &self.translucent
    }

    /// Lists in traversal order.
    #[inline]
    pub fn passes(&self) -> [(Pass, &IntrusiveList); 2] {
        [(Pass::Opaque, &self.opaque), (Pass::Translucent, &self.translucent)]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.opaque.len() + self.translucent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.translucent.is_empty()
    }

    /// Classifies and links a detached sprite, storing the handle on it.
    pub(crate) fn add(
        &mut self,
        pool: &mut NodePool<SpriteId>,
        id: SpriteId,
        sprite: &mut Sprite,
    ) -> Pass {
        debug_assert!(!sprite.is_attached(), "Layer::add expects a detached sprite");

        let (pass, list) = if sprite.is_translucent() {
            (Pass::Translucent, &mut self.translucent)
        } else {
            (Pass::Opaque, &mut self.opaque)
        };

        let node = list.add(pool, id);
        sprite.set_attachment(node, self.z);
        pass
    }

    /// Unlinks `node` from whichever of this layer's lists produced it.
    pub(crate) fn remove(&mut self, pool: &mut NodePool<SpriteId>, node: NodeHandle) -> bool {
        let list = if node.list() == self.opaque.id() {
            &mut self.opaque
        } else if node.list() == self.translucent.id() {
            &mut self.translucent
        } else {
            return false;
        };
        list.remove(pool, node).is_some()
    }
}
