//! Shared block caching for streamed resources.
//!
//! - [`interval_map`]: run-length map from block ranges to values
//! - [`lru`]: O(1) recency list
//! - [`block`]: block ids and payloads
//! - [`producer`]: producer, reader and factory seams
//! - [`global_lru`]: eviction group shared by many caches
//! - [`multibuffer`]: per-resource cache coordinating readers and producers

pub mod block;
pub mod global_lru;
pub mod interval_map;
pub mod lru;
pub mod multibuffer;
pub mod producer;
