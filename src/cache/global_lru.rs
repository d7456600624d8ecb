//! Eviction authority shared by a group of caches.
//!
//! Every cache in a group contributes to one block budget (`max_size`) and one
//! resident-block count (`data_size`), and places its unpinned blocks in one
//! shared recency order. When the group is over budget, [`GlobalLru::prune`]
//! pops the least recently used blocks across all caches and hands each owning
//! cache its victims in a single [`BlockOwner::release_blocks`] call, so every
//! affected cache runs one notification pass instead of one per block.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use crate::cache::block::BlockId;
use crate::cache::lru::Lru;
use crate::config::LruConfig;

/// Identity of a cache within its group.
pub type OwnerId = u64;

/// Group-wide key of a block. A lookup key only; confers no ownership.
pub type GlobalBlockId = (OwnerId, BlockId);

/// A cache whose blocks can be evicted by the group.
pub trait BlockOwner {
    /// Drops the given blocks. Called by [`GlobalLru::prune`] after the blocks
    /// have left the shared LRU. The owner withdraws them from the group's
    /// `data_size` before telling anyone else.
    fn release_blocks(&self, blocks: &[BlockId]);
}

/// Snapshot of the group's accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlobalLruStats {
    pub data_size: usize,
    pub max_size: usize,
    pub lru_len: usize,
    pub owners: usize,
    pub evicted_total: u64,
}

struct LruState {
    lru: Lru<GlobalBlockId>,
    max_size: usize,
    data_size: usize,
    owners: FxHashMap<OwnerId, Weak<dyn BlockOwner>>,
    next_owner: OwnerId,
    prune_scheduled: bool,
    background_prune_batch: usize,
    evicted_total: u64,
}

impl LruState {
    fn pruneable(&self) -> bool {
        self.data_size > self.max_size && !self.lru.is_empty()
    }

    fn schedule_prune(&mut self) {
        if self.pruneable() {
            self.prune_scheduled = true;
        }
    }
}

impl Drop for LruState {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        debug_assert!(self.lru.is_empty(), "shared LRU dropped with blocks");
        debug_assert_eq!(self.data_size, 0, "shared LRU dropped with data");
        debug_assert_eq!(self.max_size, 0, "shared LRU dropped with budget");
    }
}

/// Shared handle to a group's eviction state.
///
/// Cloning the handle shares the group. The group lives until the last cache
/// and the last outside handle are gone.
#[derive(Clone)]
pub struct GlobalLru {
    state: Rc<RefCell<LruState>>,
}

impl GlobalLru {
    pub fn new() -> Self {
        Self::with_config(&LruConfig::default())
    }

    pub fn with_config(config: &LruConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(LruState {
                lru: Lru::new(),
                max_size: 0,
                data_size: 0,
                owners: FxHashMap::default(),
                next_owner: 0,
                prune_scheduled: false,
                background_prune_batch: config.background_prune_batch,
                evicted_total: 0,
            })),
        }
    }

    /// Adds a cache to the group and returns its identity.
    pub fn register_owner(&self, owner: Weak<dyn BlockOwner>) -> OwnerId {
        let mut state = self.state.borrow_mut();
        let id = state.next_owner;
        state.next_owner += 1;
        state.owners.insert(id, owner);
        id
    }

    pub fn unregister_owner(&self, owner: OwnerId) {
        self.state.borrow_mut().owners.remove(&owner);
    }

    /// Marks `(owner, block)` as most recently used, inserting it if absent.
    pub fn touch(&self, owner: OwnerId, block: BlockId) {
        let mut state = self.state.borrow_mut();
        state.lru.touch((owner, block));
        state.schedule_prune();
    }

    pub fn insert(&self, owner: OwnerId, block: BlockId) {
        let mut state = self.state.borrow_mut();
        state.lru.insert((owner, block));
        state.schedule_prune();
    }

    pub fn remove(&self, owner: OwnerId, block: BlockId) {
        self.state.borrow_mut().lru.remove(&(owner, block));
    }

    pub fn contains(&self, owner: OwnerId, block: BlockId) -> bool {
        self.state.borrow().lru.contains(&(owner, block))
    }

    /// Adjusts the number of resident blocks across the group.
    pub fn increment_data_size(&self, delta: isize) {
        let mut state = self.state.borrow_mut();
        let next = state.data_size.checked_add_signed(delta);
        debug_assert!(next.is_some(), "group data size went negative");
        state.data_size = next.unwrap_or(0);
        state.schedule_prune();
    }

    /// Adjusts the group's block budget.
    pub fn increment_max_size(&self, delta: isize) {
        let mut state = self.state.borrow_mut();
        let next = state.max_size.checked_add_signed(delta);
        debug_assert!(next.is_some(), "group max size went negative");
        state.max_size = next.unwrap_or(0);
        state.schedule_prune();
    }

    pub fn data_size(&self) -> usize {
        self.state.borrow().data_size
    }

    pub fn max_size(&self) -> usize {
        self.state.borrow().max_size
    }

    /// Number of evictable blocks in the shared LRU.
    pub fn size(&self) -> usize {
        self.state.borrow().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().lru.is_empty()
    }

    /// Whether the group is over budget and has something to evict.
    pub fn pruneable(&self) -> bool {
        self.state.borrow().pruneable()
    }

    /// Whether a mutation has left the group over budget since the last
    /// [`background_prune`](Self::background_prune).
    pub fn prune_scheduled(&self) -> bool {
        self.state.borrow().prune_scheduled
    }

    /// Evicts least recently used blocks until the group is within budget,
    /// freeing at most `max_to_free`. Returns the number of blocks freed.
    pub fn prune(&self, max_to_free: usize) -> usize {
        self.free(max_to_free, true)
    }

    /// Evicts up to `max_to_free` unpinned blocks regardless of budget.
    pub fn try_free(&self, max_to_free: usize) -> usize {
        self.free(max_to_free, false)
    }

    /// Evicts every unpinned block in the group.
    pub fn try_free_all(&self) -> usize {
        self.free(usize::MAX, false)
    }

    /// One bounded maintenance pass, for embedders that prune on a timer.
    pub fn background_prune(&self) -> usize {
        let batch = {
            let mut state = self.state.borrow_mut();
            state.prune_scheduled = false;
            state.background_prune_batch
        };
        let freed = self.prune(batch);
        self.state.borrow_mut().schedule_prune();
        freed
    }

    pub fn stats(&self) -> GlobalLruStats {
        let state = self.state.borrow();
        GlobalLruStats {
            data_size: state.data_size,
            max_size: state.max_size,
            lru_len: state.lru.len(),
            owners: state.owners.len(),
            evicted_total: state.evicted_total,
        }
    }

    fn free(&self, max_to_free: usize, within_budget: bool) -> usize {
        let (freed, batches) = {
            let mut state = self.state.borrow_mut();
            let mut batches: BTreeMap<OwnerId, Vec<BlockId>> = BTreeMap::new();
            let mut freed = 0usize;
            while freed < max_to_free
                && (!within_budget || state.data_size.saturating_sub(freed) > state.max_size)
            {
                let Some((owner, block)) = state.lru.pop() else {
                    break;
                };
                batches.entry(owner).or_default().push(block);
                freed += 1;
            }
            if freed == 0 {
                return 0;
            }

            state.evicted_total += freed as u64;

            // Each owner withdraws its own batch; only orphans are settled here.
            let mut live: Vec<(Rc<dyn BlockOwner>, Vec<BlockId>)> =
                Vec::with_capacity(batches.len());
            let mut orphaned = 0usize;
            for (owner, blocks) in batches {
                let handle = state.owners.get(&owner).and_then(Weak::upgrade);
                debug_assert!(handle.is_some(), "evicted block of unknown owner {owner}");
                match handle {
                    Some(handle) => live.push((handle, blocks)),
                    None => orphaned += blocks.len(),
                }
            }
            debug_assert!(state.data_size >= orphaned);
            state.data_size = state.data_size.saturating_sub(orphaned);
            (freed, live)
        };

        debug!(freed, owners = batches.len(), within_budget, "Pruned shared LRU");

        // The group borrow is released: owners may call back into it.
        for (owner, blocks) in batches {
            owner.release_blocks(&blocks);
        }
        freed
    }
}

impl Default for GlobalLru {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GlobalLru {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("GlobalLru")
            .field("data_size", &stats.data_size)
            .field("max_size", &stats.max_size)
            .field("lru_len", &stats.lru_len)
            .field("owners", &stats.owners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingOwner {
        lru: GlobalLru,
        released: RefCell<Vec<Vec<BlockId>>>,
        seen_data_size: RefCell<Vec<usize>>,
    }

    impl BlockOwner for RecordingOwner {
        fn release_blocks(&self, blocks: &[BlockId]) {
            self.seen_data_size.borrow_mut().push(self.lru.data_size());
            self.lru.increment_data_size(-(blocks.len() as isize));
            self.released.borrow_mut().push(blocks.to_vec());
        }
    }

    fn register(lru: &GlobalLru) -> (Rc<RecordingOwner>, OwnerId) {
        let owner = Rc::new(RecordingOwner {
            lru: lru.clone(),
            released: RefCell::new(Vec::new()),
            seen_data_size: RefCell::new(Vec::new()),
        });
        let weak = Rc::downgrade(&owner) as Weak<dyn BlockOwner>;
        let id = lru.register_owner(weak);
        (owner, id)
    }

    fn drain(lru: &GlobalLru, max: isize) {
        lru.increment_max_size(-max);
        lru.try_free_all();
    }

    #[test]
    fn test_prune_batches_per_owner() {
        let lru = GlobalLru::new();
        let (a, a_id) = register(&lru);
        let (b, b_id) = register(&lru);

        lru.insert(a_id, 0);
        lru.insert(b_id, 0);
        lru.insert(a_id, 1);
        lru.insert(b_id, 1);
        lru.insert(a_id, 2);
        lru.increment_data_size(5);
        lru.increment_max_size(2);
        assert!(lru.pruneable());

        assert_eq!(lru.prune(100), 3);
        assert_eq!(*a.released.borrow(), vec![vec![0, 1]]);
        assert_eq!(*b.released.borrow(), vec![vec![0]]);
        // Owners are called in id order; b's batch is still counted while a runs.
        assert_eq!(*a.seen_data_size.borrow(), vec![5]);
        assert_eq!(*b.seen_data_size.borrow(), vec![3]);
        assert_eq!(lru.data_size(), 2);
        assert!(!lru.pruneable());

        drain(&lru, 2);
        assert_eq!(lru.data_size(), 0);
    }

    #[test]
    fn test_prune_respects_max_to_free() {
        let lru = GlobalLru::new();
        let (owner, id) = register(&lru);
        for block in 0..10 {
            lru.insert(id, block);
        }
        lru.increment_data_size(10);

        assert_eq!(lru.prune(3), 3);
        assert_eq!(*owner.released.borrow(), vec![vec![0, 1, 2]]);
        assert_eq!(lru.data_size(), 7);

        drain(&lru, 0);
    }

    #[test]
    fn test_no_prune_within_budget() {
        let lru = GlobalLru::new();
        let (owner, id) = register(&lru);
        lru.insert(id, 4);
        lru.increment_data_size(1);
        lru.increment_max_size(1);

        assert_eq!(lru.prune(10), 0);
        assert!(owner.released.borrow().is_empty());

        // Memory pressure ignores the budget.
        assert_eq!(lru.try_free(10), 1);
        assert_eq!(lru.data_size(), 0);
        lru.increment_max_size(-1);
    }

    #[test]
    fn test_touch_protects_recent_blocks() {
        let lru = GlobalLru::new();
        let (owner, id) = register(&lru);
        lru.insert(id, 0);
        lru.insert(id, 1);
        lru.touch(id, 0);
        lru.increment_data_size(2);
        lru.increment_max_size(1);

        lru.prune(1);
        assert_eq!(*owner.released.borrow(), vec![vec![1]]);
        assert!(lru.contains(id, 0));

        drain(&lru, 1);
    }

    #[test]
    fn test_background_prune_clears_schedule() {
        let lru = GlobalLru::with_config(&LruConfig {
            background_prune_batch: 2,
        });
        let (_owner, id) = register(&lru);
        for block in 0..5 {
            lru.insert(id, block);
        }
        lru.increment_data_size(5);
        assert!(lru.prune_scheduled());

        assert_eq!(lru.background_prune(), 2);
        // Still over budget, so another pass is wanted.
        assert!(lru.prune_scheduled());
        assert_eq!(lru.background_prune(), 2);
        assert_eq!(lru.background_prune(), 1);
        assert!(!lru.prune_scheduled());
        assert_eq!(lru.stats().evicted_total, 5);
    }
}
