//! Recency list with O(1) insert, remove, touch and pop.
//!
//! Nodes live in a slot vector and are linked by index; a hash index maps each
//! item to its slot so any member can be unlinked without a scan.
//!
//! ```text
//!   index: { A -> 2, B -> 0, C -> 1 }
//!
//!   head (MRU) ─► [2:A] ◄──► [0:B] ◄──► [1:C] ◄── tail (LRU)
//! ```

use std::hash::Hash;

use rustc_hash::FxHashMap;

#[derive(Debug)]
struct Node<T> {
    item: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Ordered set of unique items, most recently used first.
#[derive(Debug)]
pub struct Lru<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    index: FxHashMap<T, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<T: Hash + Eq + Clone> Lru<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: FxHashMap::default(),
            head: None,
            tail: None,
        }
    }

    /// Pushes `item` to the front. The item must not already be present.
    pub fn insert(&mut self, item: T) {
        debug_assert!(!self.index.contains_key(&item), "item already in LRU");
        if self.index.contains_key(&item) {
            return;
        }
        let node = Node {
            item: item.clone(),
            prev: None,
            next: self.head,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        if let Some(head) = self.head {
            self.node_mut(head).prev = Some(slot);
        } else {
            self.tail = Some(slot);
        }
        self.head = Some(slot);
        self.index.insert(item, slot);
    }

    /// Removes `item`. The item must be present.
    pub fn remove(&mut self, item: &T) {
        let slot = self.index.remove(item);
        debug_assert!(slot.is_some(), "item not in LRU");
        if let Some(slot) = slot {
            self.unlink(slot);
            self.slots[slot] = None;
            self.free.push(slot);
        }
    }

    /// Marks `item` as most recently used, inserting it if absent.
    pub fn touch(&mut self, item: T) {
        if self.index.contains_key(&item) {
            self.remove(&item);
        }
        self.insert(item);
    }

    /// Removes and returns the least recently used item.
    pub fn pop(&mut self) -> Option<T> {
        let tail = self.tail?;
        let item = self.node(tail).item.clone();
        self.remove(&item);
        Some(item)
    }

    /// The least recently used item, without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.tail.map(|tail| &self.node(tail).item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index.contains_key(item)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    /// Items from most to least recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            lru: self,
            current: self.head,
        }
    }

    fn node(&self, slot: usize) -> &Node<T> {
        match &self.slots[slot] {
            Some(node) => node,
            None => unreachable!("LRU link points at a free slot"),
        }
    }

    fn node_mut(&mut self, slot: usize) -> &mut Node<T> {
        match &mut self.slots[slot] {
            Some(node) => node,
            None => unreachable!("LRU link points at a free slot"),
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.node(slot);
            (node.prev, node.next)
        };
        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }
    }
}

impl<T: Hash + Eq + Clone> Default for Lru<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a, T> {
    lru: &'a Lru<T>,
    current: Option<usize>,
}

impl<'a, T: Hash + Eq + Clone> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.lru.node(self.current?);
        self.current = node.next;
        Some(&node.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_reorders() {
        let mut lru = Lru::new();
        lru.insert('A');
        lru.insert('B');
        lru.insert('C');
        lru.touch('A');

        assert_eq!(lru.pop(), Some('B'));
        assert_eq!(lru.pop(), Some('C'));
        assert_eq!(lru.pop(), Some('A'));
        assert_eq!(lru.pop(), None);
    }

    #[test]
    fn test_membership_tracks_every_call() {
        let mut lru = Lru::new();
        lru.insert(1u32);
        lru.insert(2);
        assert_eq!(lru.len(), 2);
        assert!(lru.contains(&1));

        lru.remove(&1);
        assert!(!lru.contains(&1));
        assert_eq!(lru.len(), 1);

        lru.touch(3);
        assert!(lru.contains(&3));
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.peek(), Some(&2));
    }

    #[test]
    fn test_slots_are_reused() {
        let mut lru = Lru::new();
        for i in 0..4 {
            lru.insert(i);
        }
        lru.remove(&1);
        lru.remove(&2);
        lru.insert(10);
        lru.insert(11);
        assert_eq!(lru.slots.len(), 4);
        assert_eq!(lru.iter().copied().collect::<Vec<_>>(), vec![11, 10, 3, 0]);
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut lru = Lru::new();
        lru.insert("x");
        lru.insert("y");
        lru.insert("z");
        lru.remove(&"z");
        lru.remove(&"x");
        assert_eq!(lru.peek(), Some(&"y"));
        assert_eq!(lru.iter().count(), 1);
        lru.clear();
        assert!(lru.is_empty());
        assert_eq!(lru.peek(), None);
    }
}
