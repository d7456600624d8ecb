//! Runtime configuration for stream-block-cache.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Cache windows, eviction pacing and simulator sizing all live here.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command-line arguments for the simulator.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "stream-cache-sim",
    about = "Drive shared block caches with in-memory producers and readers"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "cache-sim.json")]
    pub config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the number of simulated resources.
    #[arg(long)]
    pub resources: Option<usize>,

    /// Override the number of blocks per resource.
    #[arg(long)]
    pub blocks: Option<usize>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("block_size_shift must be in 1..=30, got {0}")]
    BlockSizeShift(u32),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-resource cache settings.
    pub buffer: BufferConfig,

    /// Shared LRU settings.
    pub lru: LruConfig,

    /// Simulator sizing.
    pub simulation: SimulationConfig,
}

/// Settings for one `MultiBuffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// log2 of the block size in bytes.
    pub block_size_shift: u32,

    /// How far ahead of a producer a reader may sit for the producer to keep
    /// loading, and how far behind a reader an existing producer may be reused.
    pub max_wait_for_writer_offset: i64,

    /// How far behind a producer a reader may sit before the producer dies.
    pub max_wait_for_reader_offset: i64,

    /// Eviction budget per ingested block.
    pub max_frees_per_add: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            block_size_shift: 15, // 32 KiB
            max_wait_for_writer_offset: 5,
            max_wait_for_reader_offset: 50,
            max_frees_per_add: 10,
        }
    }
}

impl BufferConfig {
    pub fn with_block_size_shift(block_size_shift: u32) -> Self {
        Self {
            block_size_shift,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=30).contains(&self.block_size_shift) {
            return Err(ConfigError::BlockSizeShift(self.block_size_shift));
        }
        if self.max_wait_for_writer_offset <= 0 {
            return Err(ConfigError::Zero("max_wait_for_writer_offset"));
        }
        if self.max_wait_for_reader_offset <= 0 {
            return Err(ConfigError::Zero("max_wait_for_reader_offset"));
        }
        if self.max_frees_per_add == 0 {
            return Err(ConfigError::Zero("max_frees_per_add"));
        }
        Ok(())
    }
}

/// Settings for the shared LRU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LruConfig {
    /// Blocks freed by one background prune pass.
    pub background_prune_batch: usize,
}

impl Default for LruConfig {
    fn default() -> Self {
        Self {
            background_prune_batch: 100,
        }
    }
}

/// Simulator sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of resources (caches) sharing one LRU.
    pub resources: usize,

    /// Length of every resource in blocks.
    pub blocks_per_resource: usize,

    /// Readers per resource, spread evenly over the resource.
    pub readers_per_resource: usize,

    /// Budget each cache contributes to the shared LRU, in blocks.
    pub max_blocks_per_resource: usize,

    /// Blocks each reader keeps pinned ahead of its position.
    pub pin_window: usize,

    /// Blocks granted to every active producer per tick.
    pub blocks_per_tick: usize,

    /// Whether the simulated resources support seeking.
    pub range_supported: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            resources: 3,
            blocks_per_resource: 256,
            readers_per_resource: 2,
            max_blocks_per_resource: 64,
            pin_window: 2,
            blocks_per_tick: 4,
            range_supported: true,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.buffer.validate()?;
        if self.lru.background_prune_batch == 0 {
            return Err(ConfigError::Zero("background_prune_batch"));
        }
        if self.simulation.blocks_per_tick == 0 {
            return Err(ConfigError::Zero("blocks_per_tick"));
        }
        Ok(())
    }

    /// Block size in bytes.
    pub fn block_bytes(&self) -> usize {
        1usize << self.buffer.block_size_shift
    }

    /// Combined budget of all simulated caches, in bytes.
    pub fn total_budget_bytes(&self) -> usize {
        self.simulation.resources * self.simulation.max_blocks_per_resource * self.block_bytes()
    }
}
