use super::error::SceneError;
use super::layer::{Layer, Pass};
use super::list::NodePool;
use super::sprite::{Sprite, SpriteArena, SpriteId};
use super::ZIndex;

/// Layers in ascending z plus the node pool their lists share.
///
/// Layer `ZIndex::ZERO` always exists.
#[derive(Debug)]
pub struct SceneGraph {
    layers: Vec<Layer>,
    nodes: NodePool<SpriteId>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        let mut nodes = NodePool::new();
        let zero = Layer::new(ZIndex::ZERO, &mut nodes);
        Self { layers: vec![zero], nodes }
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers in traversal (ascending z) order.
    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn nodes(&self) -> &NodePool<SpriteId> {
        &self.nodes
    }

    pub fn layer(&self, z: ZIndex) -> Option<&Layer> {
        self.layers
            .binary_search_by_key(&z, Layer::z)
            .ok()
            .map(|i| &self.layers[i])
    }

    /// Returns the index of layer `z`, creating it in order if missing.
    pub fn ensure_layer(&mut self, z: ZIndex) -> usize {
        match self.layers.binary_search_by_key(&z, Layer::z) {
            Ok(i) => i,
            Err(i) => {
                log::debug!("scene: creating layer {}", z.0);
                let layer = Layer::new(z, &mut self.nodes);
                self.layers.insert(i, layer);
                i
            }
        }
    }

    /// Drops layer `z` when it holds no sprites. Layer 0 is never dropped.
    pub(crate) fn remove_layer(&mut self, z: ZIndex) -> bool {
        if z == ZIndex::ZERO {
            return false;
        }
        match self.layers.binary_search_by_key(&z, Layer::z) {
            Ok(i) if self.layers[i].is_empty() => {
                log::debug!("scene: dropping layer {}", z.0);
                self.layers.remove(i);
                true
            }
            _ => false,
        }
    }

    /// Attaches sprite `id` to layer `z`, detaching it from its current list first.
    ///
    /// Re-adding to the same layer re-runs classification. The sprite is looked
    /// up in `sprites`, so the id stored in the list and the sprite holding the
    /// node handle are always the same sprite.
    pub(crate) fn attach(
        &mut self,
        sprites: &mut SpriteArena,
        z: ZIndex,
        id: SpriteId,
    ) -> Result<Pass, SceneError> {
        let sprite = sprites.get_mut(id).ok_or(SceneError::UnknownSprite(id))?;
        self.unlink(sprite);
        let i = self.ensure_layer(z);
        Ok(self.layers[i].add(&mut self.nodes, id, sprite))
    }

    /// Detaches sprite `id` if attached. Returns whether anything was unlinked.
    pub(crate) fn detach(&mut self, sprites: &mut SpriteArena, id: SpriteId) -> bool {
        sprites.get_mut(id).is_some_and(|sprite| self.unlink(sprite))
    }

    fn unlink(&mut self, sprite: &mut Sprite) -> bool {
        let Some((node, z)) = sprite.take_attachment() else {
            return false;
        };
        let Ok(i) = self.layers.binary_search_by_key(&z, Layer::z) else {
            log::warn!("scene: sprite referenced missing layer {}", z.0);
            return false;
        };
        self.layers[i].remove(&mut self.nodes, node)
    }

    /// Number of attached sprites across all layers.
    #[inline]
    pub fn attached(&self) -> usize {
        self.nodes.len()
    }
}
