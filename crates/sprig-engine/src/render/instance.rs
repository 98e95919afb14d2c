use bytemuck::{Pod, Zeroable};

use crate::scene::{Sprite, ZIndex};

/// Largest number of instances a single flush can carry.
pub const MAX_BATCH: usize = 65_535;

/// Per-instance record consumed by the sprite vertex stage.
///
/// Layout (52 bytes, 13 scalars):
///
///  offset  0  anchor    [f32; 2]   loc 1
///  offset  8  size      [f32; 2]   loc 2
///  offset 16  rotation  f32        loc 3
///  offset 20  position  [f32; 2]   loc 4
///  offset 28  uv        [f32; 4]   loc 5
///  offset 44  tint      u32        loc 6   0xAARRGGBB
///  offset 48  z         f32        loc 7
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    pub anchor: [f32; 2],
    pub size: [f32; 2],
    pub rotation: f32,
    pub position: [f32; 2],
    pub uv: [f32; 4],
    pub tint: u32,
    pub z: f32,
}

impl SpriteInstance {
    pub const STRIDE: usize = std::mem::size_of::<SpriteInstance>();

    const ATTRS: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
        1 => Float32x2, // anchor
        2 => Float32x2, // size
        3 => Float32,   // rotation
        4 => Float32x2, // position
        5 => Float32x4, // uv
        6 => Uint32,    // tint
        7 => Float32    // z
    ];

    pub fn from_sprite(sprite: &Sprite, z: ZIndex) -> Self {
        let frame = &sprite.frame;
        Self {
            anchor: frame.anchor().to_array(),
            size: frame.size().to_array(),
            rotation: sprite.rotation,
            position: sprite.position.to_array(),
            uv: frame.uv().to_array(),
            tint: sprite.tint.pack_with_alpha(sprite.alpha),
            z: z.depth(),
        }
    }

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

/// Fixed-capacity staging area for instance records.
///
/// Storage is allocated once and reused for every batch; `count` is the write
/// cursor and never exceeds `capacity`.
#[derive(Debug)]
pub struct InstanceBuffer {
    records: Box<[SpriteInstance]>,
    count: usize,
}

impl InstanceBuffer {
    /// Creates a buffer for `capacity` instances (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: vec![SpriteInstance::zeroed(); capacity].into_boxed_slice(),
            count: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.records.len()
    }

    /// Size of the whole backing store in bytes.
    #[inline]
    pub fn capacity_bytes(&self) -> u64 {
        (self.records.len() * SpriteInstance::STRIDE) as u64
    }

    /// Writes `record` at the cursor.
    ///
    /// Returns `false` (and writes nothing) when the buffer is full; the caller
    /// is expected to flush before pushing again.
    #[inline]
    pub fn push(&mut self, record: SpriteInstance) -> bool {
        let Some(slot) = self.records.get_mut(self.count) else {
            return false;
        };
        *slot = record;
        self.count += 1;
        true
    }

    /// The written prefix as raw bytes, ready for upload.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records[..self.count])
    }

    #[inline]
    pub fn reset(&mut self) {
        self.count = 0;
    }
}
