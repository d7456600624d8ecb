//! Integration tests for eviction across caches sharing one group.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use stream_block_cache::cache::block::BlockId;
use stream_block_cache::cache::global_lru::GlobalLru;
use stream_block_cache::cache::interval_map::Interval;
use stream_block_cache::cache::multibuffer::MultiBuffer;
use stream_block_cache::cache::producer::Reader;
use stream_block_cache::config::LruConfig;
use stream_block_cache::sim::{MemorySource, RecordingReader};

const SHIFT: u32 = 12;

struct Resource {
    source: MemorySource,
    cache: Rc<MultiBuffer>,
    reader: Rc<RecordingReader>,
}

impl Resource {
    fn new(lru: &GlobalLru, max_blocks: isize) -> Self {
        let source = MemorySource::new(100, 1 << SHIFT, true);
        let cache = MultiBuffer::new(SHIFT, lru.clone(), source.factory());
        cache.increment_max_size(max_blocks);
        let reader = RecordingReader::new();
        cache.add_reader(0, &reader);
        Self {
            source,
            cache,
            reader,
        }
    }

    fn feed(&self, blocks: usize) {
        if let Some(feed) = self.source.live_feeds().first() {
            feed.grant(blocks);
        }
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        self.cache.remove_reader(0, &self.reader);
    }
}

fn resident(resources: &[&Resource]) -> usize {
    resources.iter().map(|r| r.cache.len()).sum()
}

#[test]
fn test_oldest_cache_pays_for_newest() {
    let lru = GlobalLru::new();
    let a = Resource::new(&lru, 4);
    let b = Resource::new(&lru, 4);

    a.feed(6);
    assert_eq!(lru.data_size(), 6);
    assert_eq!(lru.stats().evicted_total, 0);

    b.feed(6);
    assert_eq!(a.cache.len(), 2);
    assert_eq!(b.cache.len(), 6);
    assert!(!a.cache.contains(3));
    assert!(a.cache.contains(4));
    assert_eq!(lru.data_size(), 8);
    assert_eq!(resident(&[&a, &b]), lru.data_size());
    assert_eq!(a.reader.last(), Some(Interval::new(0, 0)));
}

#[test]
fn test_recently_touched_cache_survives() {
    let lru = GlobalLru::new();
    let a = Resource::new(&lru, 3);
    let b = Resource::new(&lru, 3);

    a.feed(3);
    b.feed(3);
    // Unpinning re-inserts a's blocks as most recently used.
    a.cache.pin_range(0, 3, 1);
    a.cache.pin_range(0, 3, -1);

    lru.increment_max_size(-3);
    assert_eq!(lru.prune(10), 3);
    assert_eq!(a.cache.len(), 3);
    assert!(b.cache.is_empty());
    assert_eq!(b.source.empties(), 1);
    lru.increment_max_size(3);
}

#[test]
fn test_prune_respects_batch_limit() {
    let lru = GlobalLru::new();
    let a = Resource::new(&lru, 20);
    a.feed(10);
    a.cache.increment_max_size(-18);

    assert!(lru.pruneable());
    assert_eq!(lru.prune(3), 3);
    assert_eq!(lru.data_size(), 7);
    assert_eq!(lru.prune(100), 5);
    assert_eq!(lru.data_size(), 2);
    assert!(!lru.pruneable());
    assert_eq!(lru.prune(100), 0);
}

#[test]
fn test_background_prune_runs_in_batches() {
    let lru = GlobalLru::with_config(&LruConfig {
        background_prune_batch: 2,
    });
    let a = Resource::new(&lru, 10);
    a.feed(8);
    assert!(!lru.prune_scheduled());

    a.cache.increment_max_size(-6);
    assert!(lru.prune_scheduled());
    assert_eq!(lru.background_prune(), 2);
    assert!(lru.prune_scheduled());
    assert_eq!(lru.background_prune(), 2);
    assert!(!lru.prune_scheduled());
    assert_eq!(a.cache.len(), 4);
}

#[test]
fn test_try_free_ignores_budget() {
    let lru = GlobalLru::new();
    let a = Resource::new(&lru, 50);
    let b = Resource::new(&lru, 50);
    a.feed(4);
    b.feed(4);

    assert_eq!(lru.try_free(5), 5);
    assert!(a.cache.is_empty());
    assert_eq!(b.cache.len(), 3);
    assert_eq!(resident(&[&a, &b]), lru.data_size());
    assert_eq!(lru.try_free_all(), 3);
    assert_eq!(lru.data_size(), 0);
}

#[test]
fn test_group_accounting_after_cache_drop() {
    let lru = GlobalLru::new();
    let a = Resource::new(&lru, 5);
    {
        let b = Resource::new(&lru, 5);
        a.feed(4);
        b.feed(4);
        assert_eq!(lru.stats().owners, 2);
        assert_eq!(lru.data_size(), 8);
    }
    assert_eq!(lru.stats().owners, 1);
    assert_eq!(lru.data_size(), 4);
    assert_eq!(lru.max_size(), 5);
    assert_eq!(lru.size(), 4);
}

/// Compares the group's count with what the caches actually hold, from inside
/// a notification.
struct AuditingReader {
    lru: GlobalLru,
    caches: RefCell<Vec<Weak<MultiBuffer>>>,
    seen: RefCell<Vec<(usize, usize)>>,
}

impl Reader for AuditingReader {
    fn notify_available_range(&self, _range: Interval<BlockId>) {
        let resident = self
            .caches
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|cache| cache.len())
            .sum();
        self.seen.borrow_mut().push((self.lru.data_size(), resident));
    }
}

#[test]
fn test_data_size_matches_residents_during_release() {
    let lru = GlobalLru::new();
    let a = Resource::new(&lru, 2);
    let b = Resource::new(&lru, 2);
    let auditor = Rc::new(AuditingReader {
        lru: lru.clone(),
        caches: RefCell::new(vec![Rc::downgrade(&a.cache), Rc::downgrade(&b.cache)]),
        seen: RefCell::new(Vec::new()),
    });
    a.cache.add_reader(0, &auditor);

    a.feed(2);
    b.feed(2);
    assert_eq!(*auditor.seen.borrow(), vec![(2, 2)]);

    // a's two blocks and b's first go; a is told while b's are still resident.
    lru.increment_max_size(-3);
    assert_eq!(lru.prune(100), 3);
    assert_eq!(*auditor.seen.borrow(), vec![(2, 2), (2, 2)]);
    assert_eq!(lru.data_size(), 1);
    assert_eq!(resident(&[&a, &b]), 1);

    lru.increment_max_size(3);
    a.cache.remove_reader(0, &auditor);
}
