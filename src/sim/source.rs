//! In-memory producers and readers.
//!
//! A [`MemorySource`] stands in for a fetch layer: it hands out producers that
//! deliver deterministic block contents, but only as fast as the driver grants
//! them blocks. Granting fires the producer's available-callback, which is how
//! a real network or disk fetcher would report progress.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bytes::Bytes;

use crate::cache::block::{Block, BlockId};
use crate::cache::interval_map::Interval;
use crate::cache::producer::{AvailableCallback, Producer, Reader, WriterFactory};

struct Feed {
    start: BlockId,
    position: BlockId,
    granted: usize,
    deferred: bool,
    dropped: bool,
    callback: Option<AvailableCallback>,
}

/// Driver-side view of one producer.
#[derive(Clone)]
pub struct FeedHandle {
    feed: Rc<RefCell<Feed>>,
}

impl FeedHandle {
    pub fn start(&self) -> BlockId {
        self.feed.borrow().start
    }

    pub fn position(&self) -> BlockId {
        self.feed.borrow().position
    }

    pub fn is_deferred(&self) -> bool {
        self.feed.borrow().deferred
    }

    /// The cache has dropped the producer.
    pub fn is_dropped(&self) -> bool {
        self.feed.borrow().dropped
    }

    /// Blocks granted but not yet read.
    pub fn pending(&self) -> usize {
        self.feed.borrow().granted
    }

    /// Lets the producer deliver `blocks` more blocks and reports availability.
    pub fn grant(&self, blocks: usize) {
        let callback = {
            let mut feed = self.feed.borrow_mut();
            if feed.dropped {
                return;
            }
            feed.granted += blocks;
            feed.callback.take()
        };
        let Some(mut callback) = callback else {
            return;
        };
        callback();
        let mut feed = self.feed.borrow_mut();
        if !feed.dropped && feed.callback.is_none() {
            feed.callback = Some(callback);
        }
    }
}

struct SourceShared {
    total_blocks: BlockId,
    block_size: usize,
    range_supported: bool,
    feeds: RefCell<Vec<FeedHandle>>,
    empties: Cell<usize>,
}

/// A resource of `total_blocks` blocks held in memory.
#[derive(Clone)]
pub struct MemorySource {
    shared: Rc<SourceShared>,
}

impl MemorySource {
    pub fn new(total_blocks: usize, block_size: usize, range_supported: bool) -> Self {
        Self {
            shared: Rc::new(SourceShared {
                total_blocks: total_blocks as BlockId,
                block_size,
                range_supported,
                feeds: RefCell::new(Vec::new()),
                empties: Cell::new(0),
            }),
        }
    }

    /// Factory to hand to a `MultiBuffer`.
    pub fn factory(&self) -> Box<dyn WriterFactory> {
        Box::new(MemoryFactory {
            source: self.clone(),
        })
    }

    pub fn total_blocks(&self) -> BlockId {
        self.shared.total_blocks
    }

    /// Contents of block `pos`.
    pub fn block_data(&self, pos: BlockId) -> Bytes {
        Bytes::from(vec![(pos % 251) as u8; self.shared.block_size])
    }

    /// A producer starting at `pos`, plus the handle that drives it.
    pub fn producer_at(&self, pos: BlockId) -> (MemoryProducer, FeedHandle) {
        let handle = FeedHandle {
            feed: Rc::new(RefCell::new(Feed {
                start: pos,
                position: pos,
                granted: 0,
                deferred: false,
                dropped: false,
                callback: None,
            })),
        };
        self.shared.feeds.borrow_mut().push(handle.clone());
        let producer = MemoryProducer {
            source: self.clone(),
            feed: handle.feed.clone(),
        };
        (producer, handle)
    }

    /// Number of producers ever created.
    pub fn writers_created(&self) -> usize {
        self.shared.feeds.borrow().len()
    }

    /// Producers the cache still owns.
    pub fn live_feeds(&self) -> Vec<FeedHandle> {
        self.shared
            .feeds
            .borrow()
            .iter()
            .filter(|feed| !feed.is_dropped())
            .cloned()
            .collect()
    }

    /// The live producer currently positioned at `pos`.
    pub fn feed_at(&self, pos: BlockId) -> Option<FeedHandle> {
        self.live_feeds()
            .into_iter()
            .find(|feed| feed.position() == pos)
    }

    /// Grants `blocks` to every live, non-deferred producer. Returns how many
    /// producers were granted.
    pub fn pump(&self, blocks: usize) -> usize {
        let active: Vec<FeedHandle> = self
            .live_feeds()
            .into_iter()
            .filter(|feed| !feed.is_deferred())
            .collect();
        for feed in &active {
            feed.grant(blocks);
        }
        active.len()
    }

    /// Times the cache reported itself empty after eviction.
    pub fn empties(&self) -> usize {
        self.shared.empties.get()
    }
}

/// Producer reading from a [`MemorySource`].
pub struct MemoryProducer {
    source: MemorySource,
    feed: Rc<RefCell<Feed>>,
}

impl Producer for MemoryProducer {
    fn position(&self) -> BlockId {
        self.feed.borrow().position
    }

    fn available(&self) -> bool {
        let feed = self.feed.borrow();
        feed.granted > 0 && feed.position <= self.source.total_blocks()
    }

    fn read(&mut self) -> Block {
        debug_assert!(self.available());
        let pos = {
            let mut feed = self.feed.borrow_mut();
            let pos = feed.position;
            feed.position += 1;
            feed.granted = feed.granted.saturating_sub(1);
            pos
        };
        if pos < self.source.total_blocks() {
            Block::new(self.source.block_data(pos))
        } else {
            Block::end_of_stream()
        }
    }

    fn set_available_callback(&mut self, callback: AvailableCallback) {
        self.feed.borrow_mut().callback = Some(callback);
    }

    fn set_deferred(&mut self, deferred: bool) {
        self.feed.borrow_mut().deferred = deferred;
    }
}

impl Drop for MemoryProducer {
    fn drop(&mut self) {
        let callback = {
            let mut feed = self.feed.borrow_mut();
            feed.dropped = true;
            feed.callback.take()
        };
        drop(callback);
    }
}

struct MemoryFactory {
    source: MemorySource,
}

impl WriterFactory for MemoryFactory {
    fn create_writer(&self, pos: BlockId) -> Box<dyn Producer> {
        Box::new(self.source.producer_at(pos).0)
    }

    fn range_supported(&self) -> bool {
        self.source.shared.range_supported
    }

    fn on_empty(&self) {
        let empties = &self.source.shared.empties;
        empties.set(empties.get() + 1);
    }
}

/// Reader that records every range it is told about.
#[derive(Debug, Default)]
pub struct RecordingReader {
    ranges: RefCell<Vec<Interval<BlockId>>>,
}

impl RecordingReader {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn ranges(&self) -> Vec<Interval<BlockId>> {
        self.ranges.borrow().clone()
    }

    pub fn last(&self) -> Option<Interval<BlockId>> {
        self.ranges.borrow().last().copied()
    }

    pub fn count(&self) -> usize {
        self.ranges.borrow().len()
    }

    pub fn clear(&self) {
        self.ranges.borrow_mut().clear();
    }
}

impl Reader for RecordingReader {
    fn notify_available_range(&self, range: Interval<BlockId>) {
        self.ranges.borrow_mut().push(range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_delivers_granted_blocks_then_eos() {
        let source = MemorySource::new(2, 8, true);
        let (mut producer, feed) = source.producer_at(0);
        assert!(!producer.available());

        feed.grant(3);
        assert_eq!(producer.read().data(), &source.block_data(0));
        assert_eq!(producer.read().data(), &source.block_data(1));
        assert!(producer.read().is_end_of_stream());
        assert!(!producer.available());
        assert_eq!(producer.position(), 3);
    }

    #[test]
    fn test_grant_fires_callback() {
        let source = MemorySource::new(4, 8, true);
        let (mut producer, feed) = source.producer_at(1);
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        producer.set_available_callback(Box::new(move || counter.set(counter.get() + 1)));

        feed.grant(1);
        feed.grant(1);
        assert_eq!(fired.get(), 2);
        assert_eq!(feed.pending(), 2);

        drop(producer);
        assert!(feed.is_dropped());
        feed.grant(1);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn test_pump_skips_deferred() {
        let source = MemorySource::new(10, 8, true);
        let (_a, _) = source.producer_at(0);
        let (mut b, _) = source.producer_at(5);
        b.set_deferred(true);
        assert_eq!(source.pump(2), 1);
        assert_eq!(source.writers_created(), 2);
        assert_eq!(source.feed_at(5).map(|f| f.is_deferred()), Some(true));
    }
}
