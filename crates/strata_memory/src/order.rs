// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recency ordering for in-memory tiers.
//!
//! Keys live in a slab of nodes chained into a doubly-linked list, oldest at the
//! head and most recently touched at the tail. Node slots are recycled through a
//! free list so that steady-state insert/evict cycles do not allocate.

#![expect(
    clippy::cast_possible_truncation,
    reason = "NodeIndex is u32, which is sufficient for expected tier capacities"
)]

/// Index type for list nodes.
pub type NodeIndex = u32;

/// Sentinel value indicating no node.
pub const NULL_INDEX: NodeIndex = NodeIndex::MAX;

#[derive(Debug)]
struct Node<K> {
    key: Option<K>,
    prev: NodeIndex,
    next: NodeIndex,
}

impl<K> Node<K> {
    const fn vacant() -> Self {
        Self {
            key: None,
            prev: NULL_INDEX,
            next: NULL_INDEX,
        }
    }
}

/// Doubly-linked recency list with O(1) push, unlink and move-to-back.
#[derive(Debug)]
pub struct RecencyList<K> {
    nodes: Vec<Node<K>>,
    /// Oldest entry.
    head: NodeIndex,
    /// Most recently touched entry.
    tail: NodeIndex,
    free_head: NodeIndex,
    len: usize,
}

impl<K> Default for RecencyList<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RecencyList<K> {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            head: NULL_INDEX,
            tail: NULL_INDEX,
            free_head: NULL_INDEX,
            len: 0,
        }
    }

    /// Returns the number of keys in the list.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn alloc_node(&mut self, key: K) -> NodeIndex {
        if self.free_head == NULL_INDEX {
            self.nodes.push(Node::vacant());
            let idx = (self.nodes.len() - 1) as NodeIndex;
            self.nodes[idx as usize].key = Some(key);
            return idx;
        }

        let idx = self.free_head;
        self.free_head = self.nodes[idx as usize].next;
        let node = &mut self.nodes[idx as usize];
        node.key = Some(key);
        node.prev = NULL_INDEX;
        node.next = NULL_INDEX;
        idx
    }

    fn free_node(&mut self, idx: NodeIndex) -> Option<K> {
        let node = &mut self.nodes[idx as usize];
        let key = node.key.take();
        node.prev = NULL_INDEX;
        node.next = self.free_head;
        self.free_head = idx;
        key
    }

    fn link_back(&mut self, idx: NodeIndex) {
        self.nodes[idx as usize].prev = self.tail;
        self.nodes[idx as usize].next = NULL_INDEX;
        if self.tail == NULL_INDEX {
            self.head = idx;
        } else {
            self.nodes[self.tail as usize].next = idx;
        }
        self.tail = idx;
    }

    fn unlink(&mut self, idx: NodeIndex) {
        let prev = self.nodes[idx as usize].prev;
        let next = self.nodes[idx as usize].next;

        if prev == NULL_INDEX {
            self.head = next;
        } else {
            self.nodes[prev as usize].next = next;
        }

        if next == NULL_INDEX {
            self.tail = prev;
        } else {
            self.nodes[next as usize].prev = prev;
        }
    }

    fn is_live(&self, idx: NodeIndex) -> bool {
        self.nodes.get(idx as usize).is_some_and(|node| node.key.is_some())
    }

    /// Appends a key at the most recent end, returning its node index.
    pub fn push_back(&mut self, key: K) -> NodeIndex {
        let idx = self.alloc_node(key);
        self.link_back(idx);
        self.len += 1;
        idx
    }

    /// Moves a node to the most recent end.
    pub fn move_to_back(&mut self, idx: NodeIndex) {
        if !self.is_live(idx) || self.tail == idx {
            return;
        }
        self.unlink(idx);
        self.link_back(idx);
    }

    /// Removes a node, returning its key.
    pub fn remove(&mut self, idx: NodeIndex) -> Option<K> {
        if !self.is_live(idx) {
            return None;
        }
        self.unlink(idx);
        self.len -= 1;
        self.free_node(idx)
    }

    /// Returns the index of the oldest node.
    #[must_use]
    pub fn front(&self) -> Option<NodeIndex> {
        (self.head != NULL_INDEX).then_some(self.head)
    }

    /// Returns the key stored at a node.
    #[must_use]
    pub fn key(&self, idx: NodeIndex) -> Option<&K> {
        self.nodes.get(idx as usize).and_then(|node| node.key.as_ref())
    }

    /// Iterates keys from the oldest to the most recent.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Removes every key and releases the node storage.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = NULL_INDEX;
        self.tail = NULL_INDEX;
        self.free_head = NULL_INDEX;
        self.len = 0;
    }
}

/// Iterator over the keys of a [`RecencyList`], oldest first.
#[derive(Debug)]
pub struct Iter<'a, K> {
    list: &'a RecencyList<K>,
    cursor: NodeIndex,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NULL_INDEX {
            return None;
        }
        let node = &self.list.nodes[self.cursor as usize];
        self.cursor = node.next;
        node.key.as_ref()
    }
}
