//! In-memory workload driver.
//!
//! - [`source`]: producers backed by a memory resource, and a recording reader
//! - [`runner`]: tick loop that streams readers through several caches sharing one LRU

pub mod runner;
pub mod source;

pub use runner::{run_simulation, SimulationReport};
pub use source::{FeedHandle, MemoryProducer, MemorySource, RecordingReader};
