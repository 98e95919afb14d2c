use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Generational key of a list node. A removed node's key never resolves again.
    pub struct NodeKey;
}

/// Identity of one [`IntrusiveList`], unique within its [`NodePool`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ListId(pub(crate) u32);

/// Position of an item inside a specific list.
///
/// Handles are only meaningful for the list that produced them. Once the node is
/// removed the handle goes stale and every further use is a no-op.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct NodeHandle {
    key: NodeKey,
    list: ListId,
}

impl NodeHandle {
    #[inline]
    pub fn list(self) -> ListId {
        self.list
    }
}

#[derive(Debug)]
struct Node<T> {
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
    list: ListId,
    cargo: T,
}

/// Storage for the nodes of every list that shares it.
///
/// Links are pool keys rather than references, so a node can be unlinked from
/// the middle of a list without walking it.
#[derive(Debug)]
pub struct NodePool<T> {
    nodes: SlotMap<NodeKey, Node<T>>,
    next_list: u32,
}

impl<T> Default for NodePool<T> {
    fn default() -> Self {
        Self { nodes: SlotMap::with_key(), next_list: 0 }
    }
}

impl<T> NodePool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty list whose nodes live in this pool.
    pub fn new_list(&mut self) -> IntrusiveList {
        let id = ListId(self.next_list);
        self.next_list = self.next_list.wrapping_add(1);
        IntrusiveList { id, head: None, len: 0 }
    }

    /// Total number of linked nodes across all lists.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the cargo behind a live handle.
    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        self.nodes
            .get(handle.key)
            .filter(|n| n.list == handle.list)
            .map(|n| &n.cargo)
    }
}

/// Doubly-linked list with O(1) head insertion and O(1) removal by handle.
///
/// Enumeration runs head to tail, i.e. most recently inserted first.
#[derive(Debug)]
pub struct IntrusiveList {
    id: ListId,
    head: Option<NodeKey>,
    len: usize,
}

impl IntrusiveList {
    #[inline]
    pub fn id(&self) -> ListId {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Links `cargo` at the head of the list.
    pub fn add<T>(&mut self, pool: &mut NodePool<T>, cargo: T) -> NodeHandle {
        let old_head = self.head;
        let key = pool.nodes.insert(Node {
            prev: None,
            next: old_head,
            list: self.id,
            cargo,
        });

        if let Some(node) = old_head.and_then(|h| pool.nodes.get_mut(h)) {
            node.prev = Some(key);
        }

        self.head = Some(key);
        self.len += 1;

        NodeHandle { key, list: self.id }
    }

    /// Unlinks the node behind `handle` and returns its cargo.
    ///
    /// Returns `None` without touching anything when the handle is stale or
    /// belongs to another list.
    pub fn remove<T>(&mut self, pool: &mut NodePool<T>, handle: NodeHandle) -> Option<T> {
        if handle.list != self.id {
            return None;
        }

        let (prev, next) = {
            let node = pool.nodes.get(handle.key)?;
            if node.list != self.id {
                return None;
            }
            (node.prev, node.next)
        };

        match prev {
            Some(p) => {
                if let Some(node) = pool.nodes.get_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        if let Some(node) = next.and_then(|n| pool.nodes.get_mut(n)) {
            node.prev = prev;
        }

        self.len -= 1;
        pool.nodes.remove(handle.key).map(|n| n.cargo)
    }

    /// Iterates cargo from head to tail.
    pub fn iter<'a, T>(&self, pool: &'a NodePool<T>) -> Iter<'a, T> {
        Iter { pool, cursor: self.head }
    }
}

/// Head-to-tail cargo iterator returned by [`IntrusiveList::iter`].
pub struct Iter<'a, T> {
    pool: &'a NodePool<T>,
    cursor: Option<NodeKey>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.pool.nodes.get(self.cursor?)?;
        self.cursor = node.next;
        Some(&node.cargo)
    }
}
