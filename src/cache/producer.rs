//! Interfaces to the collaborators outside the cache.
//!
//! Producers (network or disk fetchers) push blocks in, readers (media
//! pipelines) are told when the data around their position changes, and a
//! [`WriterFactory`] decides how producers are created for one resource.

use crate::cache::block::{Block, BlockId};
use crate::cache::interval_map::Interval;

/// Callback a producer invokes when it has more data to hand over.
pub type AvailableCallback = Box<dyn FnMut()>;

/// A source of consecutive blocks starting at [`Producer::position`].
pub trait Producer {
    /// Block the next [`read`](Producer::read) returns.
    fn position(&self) -> BlockId;

    /// Whether a block (or the end-of-stream marker) can be read right now.
    fn available(&self) -> bool;

    /// Returns the block at [`position`](Producer::position) and advances.
    /// Only valid while [`available`](Producer::available) is true.
    fn read(&mut self) -> Block;

    /// Installs the callback to invoke when data becomes available.
    fn set_available_callback(&mut self, callback: AvailableCallback);

    /// Advisory: stop pushing data. Need not take effect immediately.
    fn set_deferred(&mut self, deferred: bool);
}

/// A consumer interested in the data around a registered position.
pub trait Reader {
    /// Called with the maximal contiguous available run around a position the
    /// reader registered. An empty range means the block is no longer available.
    fn notify_available_range(&self, range: Interval<BlockId>);
}

/// Per-resource policy hooks.
pub trait WriterFactory {
    /// Creates a producer starting at `pos`.
    fn create_writer(&self, pos: BlockId) -> Box<dyn Producer>;

    /// Whether the underlying resource supports seeking.
    fn range_supported(&self) -> bool;

    /// Called after eviction leaves the cache without any data.
    fn on_empty(&self) {}
}
