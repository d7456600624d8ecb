//! Simulation loop: several resources share one eviction group while readers
//! stream through them.

use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::block::BlockId;
use crate::cache::global_lru::{GlobalLru, GlobalLruStats};
use crate::cache::interval_map::Interval;
use crate::cache::multibuffer::{BufferStats, MultiBuffer};
use crate::config::Config;
use crate::sim::source::{MemorySource, RecordingReader};

/// Ticks a reader may wait without progress before it re-registers.
const STALL_TICKS: usize = 2;

/// Outcome of [`run_simulation`].
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub ticks: usize,
    pub blocks_consumed: usize,
    pub writers_created: usize,
    pub readers_finished: usize,
    pub readers_total: usize,
    pub cache_empties: usize,
    pub caches: Vec<BufferStats>,
    pub group: GlobalLruStats,
}

struct SimReader {
    pos: BlockId,
    end: BlockId,
    reader: Rc<RecordingReader>,
    pinned: Option<Interval<BlockId>>,
    stalled: usize,
}

impl SimReader {
    fn new(pos: BlockId, end: BlockId) -> Self {
        Self {
            pos,
            end,
            reader: RecordingReader::new(),
            pinned: None,
            stalled: 0,
        }
    }

    fn finished(&self) -> bool {
        self.pos >= self.end
    }

    fn attach(&mut self, cache: &MultiBuffer, pin_window: usize) {
        self.repin(cache, pin_window);
        if !self.finished() {
            cache.add_reader(self.pos, &self.reader);
        }
    }

    fn detach(&mut self, cache: &MultiBuffer) {
        if let Some(old) = self.pinned.take() {
            cache.pin_range(old.begin, old.end, -1);
        }
        cache.remove_reader(self.pos, &self.reader);
    }

    // Pin the new window before unpinning the old one so overlapping blocks
    // never pass through the LRU.
    fn repin(&mut self, cache: &MultiBuffer, pin_window: usize) {
        let window = if pin_window == 0 || self.finished() {
            None
        } else {
            Some(Interval::new(self.pos, self.pos + pin_window as BlockId))
        };
        if let Some(window) = window {
            cache.pin_range(window.begin, window.end, 1);
        }
        if let Some(old) = self.pinned.take() {
            cache.pin_range(old.begin, old.end, -1);
        }
        self.pinned = window;
    }

    /// Consumes whatever is cached at the reader's position.
    fn advance(&mut self, cache: &MultiBuffer, pin_window: usize) -> usize {
        if self.finished() {
            return 0;
        }
        let next = cache.find_next_unavailable(self.pos).min(self.end);
        if next == self.pos {
            self.stalled += 1;
            if self.stalled > STALL_TICKS {
                cache.remove_reader(self.pos, &self.reader);
                cache.add_reader(self.pos, &self.reader);
                self.stalled = 0;
            }
            return 0;
        }

        self.stalled = 0;
        let consumed = Interval::new(self.pos, next).len() as usize;
        cache.remove_reader(self.pos, &self.reader);
        self.pos = next;
        self.repin(cache, pin_window);
        if !self.finished() {
            cache.add_reader(self.pos, &self.reader);
        }
        consumed
    }
}

struct Resource {
    source: MemorySource,
    cache: Rc<MultiBuffer>,
    readers: Vec<SimReader>,
}

/// Runs the configured workload to completion (or until the tick limit) and
/// reports the final state of every cache and the group.
pub fn run_simulation(config: &Config) -> SimulationReport {
    let sim = &config.simulation;
    let lru = GlobalLru::with_config(&config.lru);
    let total = sim.blocks_per_resource as BlockId;

    let mut resources: Vec<Resource> = (0..sim.resources)
        .map(|_| {
            let source =
                MemorySource::new(sim.blocks_per_resource, config.block_bytes(), sim.range_supported);
            let cache = MultiBuffer::with_config(config.buffer, lru.clone(), source.factory());
            cache.increment_max_size(sim.max_blocks_per_resource as isize);
            let spread = sim.readers_per_resource.max(1) as BlockId;
            let mut readers: Vec<SimReader> = (0..sim.readers_per_resource)
                .map(|i| SimReader::new(total * i as BlockId / spread, total))
                .collect();
            for reader in &mut readers {
                reader.attach(&cache, sim.pin_window);
            }
            Resource {
                source,
                cache,
                readers,
            }
        })
        .collect();

    let max_ticks = sim.blocks_per_resource * 4 + 16;
    let mut ticks = 0;
    let mut consumed = 0;
    while ticks < max_ticks {
        ticks += 1;
        for resource in &mut resources {
            resource.source.pump(sim.blocks_per_tick);
            for reader in &mut resource.readers {
                consumed += reader.advance(&resource.cache, sim.pin_window);
            }
        }
        if lru.prune_scheduled() {
            let freed = lru.background_prune();
            debug!(tick = ticks, freed, "Background prune");
        }
        let done = resources
            .iter()
            .all(|resource| resource.readers.iter().all(SimReader::finished));
        if done {
            break;
        }
    }

    let readers_total: usize = resources.iter().map(|r| r.readers.len()).sum();
    let readers_finished = resources
        .iter()
        .flat_map(|r| r.readers.iter())
        .filter(|reader| reader.finished())
        .count();
    for resource in &mut resources {
        for reader in &mut resource.readers {
            reader.detach(&resource.cache);
        }
    }

    let report = SimulationReport {
        ticks,
        blocks_consumed: consumed,
        writers_created: resources.iter().map(|r| r.source.writers_created()).sum(),
        readers_finished,
        readers_total,
        cache_empties: resources.iter().map(|r| r.source.empties()).sum(),
        caches: resources.iter().map(|r| r.cache.stats()).collect(),
        group: lru.stats(),
    };
    info!(
        ticks = report.ticks,
        consumed = report.blocks_consumed,
        resident = report.group.data_size,
        evicted = report.group.evicted_total,
        "Simulation finished"
    );
    report
}
