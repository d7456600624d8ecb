//! Block cache for one streamed resource.
//!
//! A [`MultiBuffer`] caches a resource as fixed-size blocks while any number of
//! readers wait on positions and any number of producers fill it in. It keeps
//! three views of every block in step:
//!
//! - `data`: the cached payload,
//! - `present`: 1 exactly where `data` has a block,
//! - `pinned`: a pin count; pinned blocks are kept out of the shared LRU.
//!
//! Producers are created on demand through a [`WriterFactory`] and retired by a
//! small state machine ([`ProducerState`]) that looks at where readers sit
//! relative to each producer. Eviction is decided by the group's [`GlobalLru`],
//! which calls back into [`BlockOwner::release_blocks`].
//!
//! All bookkeeping for an operation is finished, and the cache's internal
//! borrow released, before any reader is notified. Readers may therefore call
//! back into the cache from `notify_available_range`. A producer callback that
//! fires while the cache is busy is queued and run as soon as it is not.

use std::cell::RefCell;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::cache::block::{Block, BlockId};
use crate::cache::global_lru::{BlockOwner, GlobalLru, OwnerId};
use crate::cache::interval_map::{Interval, IntervalMap};
use crate::cache::producer::{AvailableCallback, Producer, Reader, WriterFactory};
use crate::config::BufferConfig;

/// What a producer should do next, judged from the readers around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    /// Nobody needs it any more; drop it.
    Dead,
    /// A reader behind it may still catch up; pause.
    Defer,
    /// A reader is waiting just ahead; keep loading.
    Load,
}

/// Snapshot of one cache's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    pub resident_blocks: usize,
    pub writers: usize,
    pub reader_positions: usize,
    pub pinned_runs: usize,
    pub memory_bytes: usize,
}

type WriterId = u64;

type Notification = (Weak<dyn Reader>, Interval<BlockId>);

struct Writer {
    id: WriterId,
    producer: Box<dyn Producer>,
}

#[derive(Default)]
struct BufferState {
    data: BTreeMap<BlockId, Block>,
    present: IntervalMap<BlockId, i32>,
    pinned: IntervalMap<BlockId, i32>,
    writers: BTreeMap<BlockId, Writer>,
    /// Where each writer currently sits, for callbacks that only know its id.
    writer_index: FxHashMap<WriterId, BlockId>,
    readers: BTreeMap<BlockId, Vec<Weak<dyn Reader>>>,
    max_size: usize,
    next_writer_id: WriterId,
}

/// Closest key at or before `pos`, or `BlockId::MIN`.
fn closest_previous_entry<T>(index: &BTreeMap<BlockId, T>, pos: BlockId) -> BlockId {
    index
        .range(..=pos)
        .next_back()
        .map_or(BlockId::MIN, |(key, _)| *key)
}

/// Closest key at or after `pos`, or `BlockId::MAX`.
fn closest_next_entry<T>(index: &BTreeMap<BlockId, T>, pos: BlockId) -> BlockId {
    index
        .range(pos..)
        .next()
        .map_or(BlockId::MAX, |(key, _)| *key)
}

/// A reader dropped without being removed no longer counts.
fn is_live(reader: &Weak<dyn Reader>) -> bool {
    reader.strong_count() > 0
}

impl BufferState {
    /// Closest position at or after `pos` with a live reader, or `BlockId::MAX`.
    fn next_reader(&self, pos: BlockId) -> BlockId {
        self.readers
            .range(pos..)
            .find(|(_, waiting)| waiting.iter().any(is_live))
            .map_or(BlockId::MAX, |(key, _)| *key)
    }

    /// Closest position at or before `pos` with a live reader, or `BlockId::MIN`.
    fn previous_reader(&self, pos: BlockId) -> BlockId {
        self.readers
            .range(..=pos)
            .rev()
            .find(|(_, waiting)| waiting.iter().any(is_live))
            .map_or(BlockId::MIN, |(key, _)| *key)
    }

    fn contains(&self, pos: BlockId) -> bool {
        let present = *self.present.get(pos);
        debug_assert!(present == 0 || present == 1, "present[{pos}] = {present}");
        debug_assert_eq!(present == 1, self.data.contains_key(&pos));
        present != 0
    }

    fn writer_position(&self, id: WriterId) -> Option<BlockId> {
        self.writer_index.get(&id).copied()
    }

    /// Registers `writer` at `pos`, returning any writer it displaces.
    fn insert_writer(&mut self, pos: BlockId, writer: Writer) -> Option<Writer> {
        self.writer_index.insert(writer.id, pos);
        let stale = self.writers.insert(pos, writer);
        if let Some(stale) = &stale {
            self.writer_index.remove(&stale.id);
        }
        stale
    }

    fn remove_writer(&mut self, pos: BlockId) -> Option<Writer> {
        let writer = self.writers.remove(&pos)?;
        self.writer_index.remove(&writer.id);
        Some(writer)
    }

    /// Another producer owns `pos`, or (when seeking works) the block is
    /// already cached.
    fn collision(&self, pos: BlockId, range_supported: bool) -> bool {
        self.writers.contains_key(&pos) || (range_supported && self.contains(pos))
    }

    fn suggest_state(
        &self,
        pos: BlockId,
        config: &BufferConfig,
        range_supported: bool,
    ) -> ProducerState {
        let next_reader = self.next_reader(pos);
        if next_reader != BlockId::MAX
            && (next_reader - pos <= config.max_wait_for_writer_offset || !range_supported)
        {
            // Another producer in between will serve that reader first.
            let next_writer = closest_next_entry(&self.writers, pos.saturating_add(1));
            if next_writer > next_reader {
                return ProducerState::Load;
            }
        }

        let previous_reader = self.previous_reader(pos.saturating_sub(1));
        if previous_reader != BlockId::MIN
            && (pos - previous_reader <= config.max_wait_for_reader_offset || !range_supported)
        {
            let previous_writer = closest_previous_entry(&self.writers, pos.saturating_sub(1));
            if previous_writer < previous_reader {
                return ProducerState::Defer;
            }
        }

        ProducerState::Dead
    }

    /// Queues `new_range` for every reader registered inside `observer`.
    fn notify_range(
        &self,
        observer: Interval<BlockId>,
        new_range: Interval<BlockId>,
        out: &mut Vec<Notification>,
    ) {
        if observer.is_empty() {
            return;
        }
        let start = out.len();
        for readers in self.readers.range(observer.begin..observer.end).map(|(_, r)| r) {
            for reader in readers {
                if !out[start..].iter().any(|(seen, _)| seen.ptr_eq(reader)) {
                    out.push((reader.clone(), new_range));
                }
            }
        }
    }
}

fn deliver(notifications: Vec<Notification>) {
    for (reader, range) in notifications {
        if let Some(reader) = reader.upgrade() {
            reader.notify_available_range(range);
        }
    }
}

/// Cache for one resource. Always held behind an `Rc`.
pub struct MultiBuffer {
    owner: OwnerId,
    config: BufferConfig,
    lru: GlobalLru,
    factory: Box<dyn WriterFactory>,
    state: RefCell<BufferState>,
    wakeups: RefCell<VecDeque<WriterId>>,
    this: Weak<MultiBuffer>,
}

impl MultiBuffer {
    /// Creates a cache with default windows and joins it to `lru`'s group.
    pub fn new(
        block_size_shift: u32,
        lru: GlobalLru,
        factory: Box<dyn WriterFactory>,
    ) -> Rc<Self> {
        Self::with_config(BufferConfig::with_block_size_shift(block_size_shift), lru, factory)
    }

    pub fn with_config(
        config: BufferConfig,
        lru: GlobalLru,
        factory: Box<dyn WriterFactory>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<MultiBuffer>| {
            let owner = lru.register_owner(this.clone());
            debug!(owner, block_size_shift = config.block_size_shift, "Created cache");
            Self {
                owner,
                config,
                lru,
                factory,
                state: RefCell::new(BufferState::default()),
                wakeups: RefCell::new(VecDeque::new()),
                this: this.clone(),
            }
        })
    }

    /// Registers `reader`'s interest in `pos`, starting or reusing a producer
    /// when nothing else already covers the position.
    pub fn add_reader<R: Reader + 'static>(&self, pos: BlockId, reader: &Rc<R>) {
        let weak = Rc::downgrade(reader) as Weak<dyn Reader>;
        let reuse = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let waiting = state.readers.entry(pos).or_default();
            waiting.retain(is_live);
            let already_waited_for = !waiting.is_empty();
            if !waiting.iter().any(|r| r.ptr_eq(&weak)) {
                waiting.push(weak);
            }
            if already_waited_for || state.contains(pos) {
                return;
            }

            let range_supported = self.factory.range_supported();
            let closest_writer = closest_previous_entry(&state.writers, pos);
            let mut reuse = None;
            if closest_writer != BlockId::MIN
                && (closest_writer > pos - self.config.max_wait_for_writer_offset
                    || !range_supported)
            {
                // A cached block between the producer and `pos` would stop the
                // producer before it gets here.
                let (gap, _) = state.present.find(pos);
                let closest_block = gap.begin.saturating_sub(1);
                if closest_writer > closest_block {
                    reuse = Some(closest_writer);
                }
            }
            if let Some(at) = reuse {
                if let Some(writer) = state.writers.get_mut(&at) {
                    writer.producer.set_deferred(false);
                }
            }
            reuse
        };

        if reuse.is_none() {
            debug_assert!(!self.has_writer(pos));
            debug!(owner = self.owner, pos, "Creating writer");
            let producer = self.factory.create_writer(pos);
            self.install_writer(producer);
            if let Some(writer) = self.state.borrow_mut().writers.get_mut(&pos) {
                writer.producer.set_deferred(false);
            }
        }
        self.drain_wakeups();
    }

    /// Drops `reader`'s interest in `pos`. Removing an unknown reader is a no-op.
    pub fn remove_reader<R: Reader + 'static>(&self, pos: BlockId, reader: &Rc<R>) {
        let weak = Rc::downgrade(reader) as Weak<dyn Reader>;
        let mut state = self.state.borrow_mut();
        if let Entry::Occupied(mut waiting) = state.readers.entry(pos) {
            waiting.get_mut().retain(|r| is_live(r) && !r.ptr_eq(&weak));
            if waiting.get().is_empty() {
                waiting.remove();
            }
        }
    }

    /// Re-runs the state machine for producers near `pos`, retiring those no
    /// reader needs any more.
    pub fn cleanup_writers(&self, pos: BlockId) {
        let horizon = pos.saturating_add(self.config.max_wait_for_reader_offset);
        let floor = pos.saturating_sub(self.config.max_wait_for_writer_offset);
        let mut closest = closest_previous_entry(&self.state.borrow().writers, horizon);
        while closest != BlockId::MIN && closest > floor {
            let id = self.state.borrow().writers.get(&closest).map(|w| w.id);
            if let Some(id) = id {
                self.on_data_available(id);
            }
            closest = closest_previous_entry(&self.state.borrow().writers, closest - 1);
        }
        self.drain_wakeups();
    }

    pub fn contains(&self, pos: BlockId) -> bool {
        self.state.borrow().contains(pos)
    }

    /// `pos` if it is not cached, else the end of the cached run starting there.
    pub fn find_next_unavailable(&self, pos: BlockId) -> BlockId {
        let state = self.state.borrow();
        let (run, present) = state.present.find(pos);
        if *present != 0 {
            run.end
        } else {
            pos
        }
    }

    /// Adds `delta` pins to `[from, to)`, moving blocks that enter or leave
    /// the pinned state out of or into the shared LRU.
    pub fn pin_range(&self, from: BlockId, to: BlockId, delta: i32) {
        debug_assert_ne!(delta, 0);
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.pinned.increment(from, to, delta);
        if state.data.is_empty() {
            return;
        }

        let modified = Interval::new(from, to);
        // Backwards, so a shrinking tail is handed to the LRU oldest-last.
        for (pinned_run, count) in state.pinned.runs_before(to - 1) {
            if pinned_run.end <= from {
                break;
            }
            debug_assert!(*count >= 0, "negative pin count on {pinned_run}");
            if *count != 0 && *count != delta {
                continue;
            }
            let pin = *count == delta;
            let transition = modified.intersect(&pinned_run);
            if transition.is_empty() {
                continue;
            }

            // Pinning blocks that are not cached yet is fine; only resident
            // blocks move.
            for (present_run, present) in state.present.runs_before(transition.end - 1) {
                if present_run.end <= transition.begin {
                    break;
                }
                if *present == 0 {
                    continue;
                }
                let resident = transition.intersect(&present_run);
                trace!(owner = self.owner, range = %resident, pin, "Pin transition");
                for block in (resident.begin..resident.end).rev() {
                    debug_assert!(state.data.contains_key(&block));
                    if pin {
                        self.lru.remove(self.owner, block);
                    } else {
                        self.lru.insert(self.owner, block);
                    }
                }
            }
        }
    }

    /// Applies [`pin_range`](Self::pin_range) for every non-zero run of `ranges`.
    pub fn pin_ranges(&self, ranges: &IntervalMap<BlockId, i32>) {
        for (run, delta) in ranges.iter() {
            if *delta != 0 {
                self.pin_range(run.begin, run.end, *delta);
            }
        }
    }

    /// Takes ownership of `producer`, keyed by its position. A producer already
    /// at that position is dropped.
    pub fn add_provider(&self, producer: Box<dyn Producer>) {
        debug_assert!(!producer.available());
        self.install_writer(producer);
        self.drain_wakeups();
    }

    /// Gives back the producer at `pos`, if any.
    pub fn remove_provider(&self, pos: BlockId) -> Option<Box<dyn Producer>> {
        let writer = self.state.borrow_mut().remove_writer(pos)?;
        let mut producer = writer.producer;
        producer.set_available_callback(Box::new(|| {}));
        Some(producer)
    }

    /// Adopts every block of `other` that this cache lacks.
    pub fn merge_from(&self, other: &MultiBuffer) {
        if std::ptr::eq(self, other) {
            return;
        }
        let mut notifications = Vec::new();
        let added = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let source = other.state.borrow();

            let before = state.data.len();
            for (pos, block) in &source.data {
                if let Entry::Vacant(slot) = state.data.entry(*pos) {
                    slot.insert(block.clone());
                    if *state.pinned.get(*pos) == 0 {
                        self.lru.insert(self.owner, *pos);
                    }
                }
            }
            let added = state.data.len() - before;

            let mut grown = Vec::new();
            for (run, present) in source.present.iter() {
                if *present == 0 {
                    continue;
                }
                let covered = state
                    .present
                    .iter_from(run.begin)
                    .take_while(|(have, _)| have.begin < run.end)
                    .all(|(_, value)| *value != 0);
                state.present.set(run.begin, run.end, 1);
                if !covered {
                    grown.push(run.begin);
                }
            }

            let mut last_notified = None;
            for begin in grown {
                let (run, _) = state.present.find(begin);
                if last_notified != Some(run) {
                    state.notify_range(run, run, &mut notifications);
                    last_notified = Some(run);
                }
            }
            debug!(owner = self.owner, from = other.owner, added, "Merged cache");
            added
        };

        if added > 0 {
            self.lru.increment_data_size(added as isize);
        }
        deliver(notifications);
        self.drain_wakeups();
    }

    /// Adjusts this cache's share of the group budget. Never evicts by itself;
    /// eviction only runs when new data arrives.
    pub fn increment_max_size(&self, delta: isize) {
        let mut state = self.state.borrow_mut();
        let next = state.max_size.checked_add_signed(delta);
        debug_assert!(next.is_some(), "cache max size went negative");
        state.max_size = next.unwrap_or(0);
        self.lru.increment_max_size(delta);
    }

    /// What the producer at `pos` should do next.
    pub fn suggest_state(&self, pos: BlockId) -> ProducerState {
        self.state
            .borrow()
            .suggest_state(pos, &self.config, self.factory.range_supported())
    }

    /// The cached block at `pos`.
    pub fn block(&self, pos: BlockId) -> Option<Block> {
        self.state.borrow().data.get(&pos).cloned()
    }

    /// Current pin count at `pos`.
    pub fn pin_count(&self, pos: BlockId) -> i32 {
        *self.state.borrow().pinned.get(pos)
    }

    pub fn has_writer(&self, pos: BlockId) -> bool {
        self.state.borrow().writers.contains_key(&pos)
    }

    pub fn writer_positions(&self) -> Vec<BlockId> {
        self.state.borrow().writers.keys().copied().collect()
    }

    pub fn reader_count(&self, pos: BlockId) -> usize {
        self.state
            .borrow()
            .readers
            .get(&pos)
            .map_or(0, |waiting| waiting.iter().filter(|r| is_live(r)).count())
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.state.borrow().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().data.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.len() << self.config.block_size_shift
    }

    pub fn max_size(&self) -> usize {
        self.state.borrow().max_size
    }

    pub fn block_size_shift(&self) -> u32 {
        self.config.block_size_shift
    }

    pub fn block_size(&self) -> usize {
        1usize << self.config.block_size_shift
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner
    }

    pub fn global_lru(&self) -> &GlobalLru {
        &self.lru
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.state.borrow();
        BufferStats {
            resident_blocks: state.data.len(),
            writers: state.writers.len(),
            reader_positions: state
                .readers
                .values()
                .filter(|waiting| waiting.iter().any(is_live))
                .count(),
            pinned_runs: state.pinned.iter().filter(|(_, count)| **count != 0).count(),
            memory_bytes: state.data.len() << self.config.block_size_shift,
        }
    }

    fn install_writer(&self, mut producer: Box<dyn Producer>) {
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_writer_id += 1;
            state.next_writer_id
        };
        producer.set_available_callback(self.available_callback(id));
        let pos = producer.position();
        let stale = self
            .state
            .borrow_mut()
            .insert_writer(pos, Writer { id, producer });
        if stale.is_some() {
            debug!(owner = self.owner, pos, "Replaced stale writer");
        }
    }

    fn available_callback(&self, id: WriterId) -> AvailableCallback {
        let this = self.this.clone();
        Box::new(move || {
            if let Some(buffer) = this.upgrade() {
                buffer.wake(id);
            }
        })
    }

    fn wake(&self, id: WriterId) {
        if self.state.try_borrow_mut().is_err() {
            self.wakeups.borrow_mut().push_back(id);
            return;
        }
        self.on_data_available(id);
        self.drain_wakeups();
    }

    fn drain_wakeups(&self) {
        loop {
            // Whoever holds the borrow drains when it is done.
            if self.state.try_borrow_mut().is_err() {
                return;
            }
            let next = self.wakeups.borrow_mut().pop_front();
            match next {
                Some(id) => self.on_data_available(id),
                None => return,
            }
        }
    }

    /// Pulls everything producer `id` has ready, then decides its fate.
    fn on_data_available(&self, id: WriterId) {
        let range_supported = self.factory.range_supported();
        let mut notifications = Vec::new();

        let (start, pos, added, retired) = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let Some(start) = state.writer_position(id) else {
                return;
            };
            let Some(mut writer) = state.remove_writer(start) else {
                return;
            };

            let mut pos = start;
            let mut added = 0usize;
            let mut end_of_stream = false;
            let mut parked = false;
            while !state.collision(pos, range_supported) && !end_of_stream {
                if !writer.producer.available() {
                    parked = true;
                    break;
                }
                let block = writer.producer.read();
                end_of_stream = block.is_end_of_stream();
                if state.data.insert(pos, block).is_none() {
                    added += 1;
                }
                if *state.pinned.get(pos) == 0 {
                    self.lru.touch(self.owner, pos);
                }
                pos += 1;
            }

            let retired = if parked {
                debug_assert_eq!(writer.producer.position(), pos);
                state.insert_writer(pos, writer);
                None
            } else {
                Some(writer)
            };

            if pos > start {
                state.present.set(start, pos, 1);
                let (expanded, _) = state.present.find(start);
                state.notify_range(expanded, expanded, &mut notifications);
                trace!(owner = self.owner, start, pos, added, "Ingested blocks");
            } else {
                // Progress report even when nothing new arrived.
                state.notify_range(
                    Interval::new(start, start + 1),
                    Interval::new(start, start),
                    &mut notifications,
                );
            }
            (start, pos, added, retired)
        };

        if let Some(writer) = retired {
            debug!(owner = self.owner, start, pos, "Writer finished");
            drop(writer);
        }
        if added > 0 {
            self.lru.increment_data_size(added as isize);
        }
        deliver(notifications);
        if pos > start {
            self.lru.prune(added * self.config.max_frees_per_add + 1);
        }

        // Readers may have moved, and eviction may have reshaped the cache.
        let dead = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let still_ours = state.writers.get(&pos).is_some_and(|w| w.id == id);
            if !still_ours {
                return;
            }
            let next = state.suggest_state(pos, &self.config, range_supported);
            match next {
                ProducerState::Load => None,
                ProducerState::Defer => {
                    debug!(owner = self.owner, pos, "Deferring writer");
                    if let Some(writer) = state.writers.get_mut(&pos) {
                        writer.producer.set_deferred(true);
                    }
                    None
                }
                ProducerState::Dead => {
                    debug!(owner = self.owner, pos, "Removing idle writer");
                    state.remove_writer(pos)
                }
            }
        };
        drop(dead);
    }
}

impl BlockOwner for MultiBuffer {
    /// Drops evicted blocks and tells readers whose available range shrank.
    fn release_blocks(&self, blocks: &[BlockId]) {
        let mut notifications = Vec::new();
        let now_empty = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let mut freed: IntervalMap<BlockId, i32> = IntervalMap::new();
            for &block in blocks {
                debug_assert_eq!(*state.pinned.get(block), 0, "evicting pinned block {block}");
                debug_assert_eq!(*state.present.get(block), 1, "evicting absent block {block}");
                let removed = state.data.remove(&block);
                debug_assert!(removed.is_some());
                freed.increment(block, block + 1, 1);
                state.present.increment(block, block + 1, -1);
            }
            self.lru.increment_data_size(-(blocks.len() as isize));

            for (run, count) in freed.iter() {
                if *count == 0 {
                    continue;
                }
                state.notify_range(run, Interval::new(run.begin, run.begin), &mut notifications);

                // Neighbouring runs lost their tail or head.
                if run.begin != BlockId::MIN {
                    let (left, present) = state.present.find(run.begin - 1);
                    if *present != 0 {
                        state.notify_range(left, left, &mut notifications);
                    }
                }
                let (right, present) = state.present.find(run.end);
                if *present != 0 {
                    state.notify_range(right, right, &mut notifications);
                }
            }
            debug!(owner = self.owner, released = blocks.len(), "Released blocks");
            state.data.is_empty()
        };

        deliver(notifications);
        if now_empty {
            self.factory.on_empty();
        }
        self.drain_wakeups();
    }
}

impl Drop for MultiBuffer {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !std::thread::panicking() {
            debug_assert!(state.pinned.is_default(), "cache dropped with pinned blocks");
        }
        for pos in state.data.keys() {
            if self.lru.contains(self.owner, *pos) {
                self.lru.remove(self.owner, *pos);
            }
        }
        self.lru.increment_data_size(-(state.data.len() as isize));
        self.lru.increment_max_size(-(state.max_size as isize));
        self.lru.unregister_owner(self.owner);
        debug!(owner = self.owner, "Dropped cache");
    }
}

impl fmt::Debug for MultiBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiBuffer")
            .field("owner", &self.owner)
            .field("block_size_shift", &self.config.block_size_shift)
            .field("stats", &self.stats())
            .finish()
    }
}
