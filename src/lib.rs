//! stream-block-cache: block caching for streamed resources.
//!
//! Each resource gets a [`MultiBuffer`] that stores fixed-size blocks, wakes
//! readers as ranges become available and starts, reuses, pauses or retires
//! producers depending on where readers sit. All caches in a group share one
//! [`GlobalLru`] that evicts the least recently used unpinned blocks once the
//! group's combined budget is exceeded.

pub mod cache;
pub mod config;
pub mod sim;

pub use cache::block::{Block, BlockId};
pub use cache::global_lru::{BlockOwner, GlobalLru};
pub use cache::interval_map::{Interval, IntervalMap};
pub use cache::lru::Lru;
pub use cache::multibuffer::{MultiBuffer, ProducerState};
pub use cache::producer::{Producer, Reader, WriterFactory};
