use core::cmp::Ordering;

/// Layer key.
///
/// Layers are traversed in ascending order, so higher values are drawn on top.
/// The value is also written into every instance record as its depth scalar.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ZIndex(pub i32);

impl ZIndex {
    /// The layer every stage starts with and `Stage::add` attaches to.
    pub const ZERO: ZIndex = ZIndex(0);

    #[inline]
    pub const fn new(v: i32) -> Self {
        Self(v)
    }

    /// Depth scalar packed into instance records.
    #[inline]
    pub fn depth(self) -> f32 {
        self.0 as f32
    }
}

impl Ord for ZIndex {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for ZIndex {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
