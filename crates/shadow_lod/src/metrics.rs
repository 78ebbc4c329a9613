//! Engine-agnostic statistics for shadow tile management.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use shadow_lod::metrics::{ShadowMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! // After each frame:
//! metrics.update_from_cache(&cache);
//! metrics.record_batch(stats.total());
//! ```

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

use crate::cache::{CacheStats, TileCache};
use crate::constants::MAX_REFINEMENT;

const DEPTHS: usize = MAX_REFINEMENT as usize + 1;

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
    #[cfg(feature = "metrics")]
    {
        COLLECT_METRICS.load(Ordering::Relaxed)
    }
    #[cfg(not(feature = "metrics"))]
    {
        false
    }
}

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    /// Create a new rolling window with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new value, evicting the oldest if at capacity.
    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Iterate over values (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    /// Get the most recent value.
    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

impl RollingWindow<u64> {
    pub fn sum(&self) -> u64 {
        self.buffer.iter().sum()
    }

    /// Compute the average of all values.
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.sum() as f64 / self.buffer.len() as f64
        }
    }

    /// Get min and max values.
    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = *self.buffer.iter().min()?;
        let max = *self.buffer.iter().max()?;
        Some((min, max))
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(128) // ~2 seconds at 60fps
    }
}

/// Tile statistics updated once per frame.
#[derive(Debug, Clone, Default)]
pub struct ShadowMetrics {
    /// Allocated primary tiles per refinement depth.
    pub tiles_per_depth: [u32; DEPTHS],
    /// Allocated layer tiles per refinement depth.
    pub layer_tiles_per_depth: [u32; DEPTHS],
    /// Ready tiles still blending in.
    pub fading_tiles: u32,
    /// Free slots.
    pub free_tiles: u32,

    /// Snapshot of the cache's running counters.
    pub cache: CacheStats,

    /// Rolling window of tiles rendered per frame.
    pub batch_sizes: RollingWindow<u64>,
    /// Rolling window of `create_tiles` times in microseconds.
    pub create_tiles_timings: RollingWindow<u64>,
    /// Last `create_tiles` time in microseconds.
    pub last_create_tiles_us: u64,

    /// Pre-render frustums swapped in this session.
    pub swaps: u64,
}

impl ShadowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset everything except the cumulative swap count.
    pub fn reset(&mut self) {
        self.tiles_per_depth.fill(0);
        self.layer_tiles_per_depth.fill(0);
        self.fading_tiles = 0;
        self.free_tiles = 0;
        self.cache = CacheStats::default();
        self.batch_sizes.clear();
        self.create_tiles_timings.clear();
        self.last_create_tiles_us = 0;
    }

    /// Recount per-depth allocation and fade state from `cache`.
    pub fn update_from_cache(&mut self, cache: &TileCache) {
        if !is_enabled() {
            return;
        }

        self.tiles_per_depth.fill(0);
        self.layer_tiles_per_depth.fill(0);
        for entry in cache.entries().iter().filter(|e| e.is_allocated()) {
            let depth = (entry.depth() as usize).min(DEPTHS - 1);
            if entry.is_layer() {
                self.layer_tiles_per_depth[depth] += 1;
            } else {
                self.tiles_per_depth[depth] += 1;
            }
        }
        self.fading_tiles = cache
            .ready_tiles()
            .iter()
            .filter(|&id| cache.entry(id).is_some_and(|e| e.fade_in() > 0.0))
            .count() as u32;
        self.free_tiles = cache.free_count() as u32;
        self.cache = cache.stats();
    }

    /// Record how many tiles one frame rendered.
    pub fn record_batch(&mut self, tiles: usize) {
        if is_enabled() {
            self.batch_sizes.push(tiles as u64);
        }
    }

    /// Record a `create_tiles` timing.
    pub fn record_create_tiles_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.create_tiles_timings.push(timing_us);
            self.last_create_tiles_us = timing_us;
        }
    }

    pub fn record_swap(&mut self) {
        if is_enabled() {
            self.swaps += 1;
        }
    }

    /// Allocated tiles of both kinds.
    pub fn total_tiles(&self) -> u32 {
        self.tiles_per_depth.iter().sum::<u32>() + self.layer_tiles_per_depth.iter().sum::<u32>()
    }

    /// Fraction of allocations served from retained content.
    pub fn hit_rate(&self) -> f64 {
        if self.cache.allocations == 0 {
            0.0
        } else {
            self.cache.cache_hits as f64 / self.cache.allocations as f64
        }
    }

    pub fn avg_create_tiles_us(&self) -> f64 {
        self.create_tiles_timings.average()
    }
}
