//! TileCache - allocation, eviction and release of atlas slots.

use glam::Vec2;
use smallvec::SmallVec;

use super::{IndexSet, TileCacheEntry, TileId, TileOwner, Viewport};
use crate::config::ShadowConfig;
use crate::error::ConfigError;
use crate::frame::{FrameClock, FrustumId};
use crate::geometry::{AABBox, LightBasis};
use crate::quadtree::refinement_distance_sq;

/// What the cache needs to know about a live frustum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrustumRecord {
  pub id: FrustumId,
  /// Refinement anchor in light space.
  pub anchor: Vec2,
  pub basis: LightBasis,
  /// Deepest depth that gets a detail map, indexed by `is_layer`.
  pub detail_map_max_depth: [Option<u8>; 2],
}

/// A node slot asking for a tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileRequest {
  pub owner: TileOwner,
  pub bbox: AABBox,
  pub depth: u8,
}

impl TileRequest {
  #[inline]
  pub fn is_layer(&self) -> bool {
    self.owner.slot.is_layer()
  }
}

/// Running counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
  /// Allocations that found their exact content in the free set.
  pub cache_hits: u64,
  /// Successful allocations, hits included.
  pub allocations: u64,
  /// Allocated tiles taken away from their owner.
  pub evictions: u64,
  /// Requests that got no tile.
  pub failed_allocations: u64,
  pub tiles_rendered: u64,
  pub detail_maps_built: u64,
}

/// Fixed pool of atlas slots.
///
/// Slots are laid out row-major over the atlas at construction and never
/// move. Membership sets hold slot indices; see the module docs for the
/// lifecycle.
#[derive(Debug)]
pub struct TileCache {
  pub(crate) entries: Vec<TileCacheEntry>,
  pub(crate) all: IndexSet,
  pub(crate) free: IndexSet,
  pub(crate) render_queue: IndexSet,
  pub(crate) render_batch: IndexSet,
  pub(crate) ready: IndexSet,
  pub(crate) detail_map_queue: IndexSet,
  pub(crate) frustums: SmallVec<[FrustumRecord; 2]>,
  pub(crate) config: ShadowConfig,
  pub(crate) stats: CacheStats,
}

impl TileCache {
  pub fn new(config: &ShadowConfig, clock: &FrameClock) -> Result<Self, ConfigError> {
    config.validate()?;

    let (cols, rows) = config.slot_grid();
    let slots = config.slot_count();
    let border = config.tile_border_texels;
    let inner = config.borderless_tile_size();

    let mut cache = Self {
      entries: Vec::with_capacity(slots),
      all: IndexSet::with_slots(slots),
      free: IndexSet::with_slots(slots),
      render_queue: IndexSet::with_slots(slots),
      render_batch: IndexSet::with_slots(slots),
      ready: IndexSet::with_slots(slots),
      detail_map_queue: IndexSet::with_slots(slots),
      frustums: SmallVec::new(),
      config: config.clone(),
      stats: CacheStats::default(),
    };

    for row in 0..rows {
      for col in 0..cols {
        let viewport = Viewport {
          x: col * config.tile_size + border,
          y: row * config.tile_size + border,
          w: inner,
          h: inner,
        };
        let id = TileId::new(cache.entries.len());
        cache.entries.push(TileCacheEntry::new(viewport, clock.frame()));
        cache.all.insert(id);
        cache.free.insert(id);
      }
    }

    tracing::debug!(slots, cols, rows, "tile cache created");
    Ok(cache)
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  #[inline]
  pub fn config(&self) -> &ShadowConfig {
    &self.config
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.all.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.all.is_empty()
  }

  #[inline]
  pub fn entry(&self, id: TileId) -> Option<&TileCacheEntry> {
    self.entries.get(id.index())
  }

  #[inline]
  pub fn entries(&self) -> &[TileCacheEntry] {
    &self.entries
  }

  #[inline]
  pub fn stats(&self) -> CacheStats {
    self.stats
  }

  #[inline]
  pub fn free_count(&self) -> usize {
    self.free.len()
  }

  #[inline]
  pub fn allocated_count(&self) -> usize {
    self.entries.iter().filter(|e| e.is_allocated()).count()
  }

  #[inline]
  pub fn render_queue(&self) -> &IndexSet {
    &self.render_queue
  }

  #[inline]
  pub fn render_batch(&self) -> &IndexSet {
    &self.render_batch
  }

  #[inline]
  pub fn ready_tiles(&self) -> &IndexSet {
    &self.ready
  }

  #[inline]
  pub fn detail_map_queue(&self) -> &IndexSet {
    &self.detail_map_queue
  }

  #[inline]
  pub fn is_ready(&self, id: TileId) -> bool {
    self.ready.contains(id)
  }

  /// True if `id` is currently bound to exactly `owner`.
  #[inline]
  pub fn owns(&self, id: TileId, owner: &TileOwner) -> bool {
    self.entry(id).is_some_and(|e| e.owner.as_ref() == Some(owner))
  }

  // ===========================================================================
  // Frustum registry
  // ===========================================================================

  /// Insert or refresh a frustum's record.
  pub fn update_frustum(&mut self, record: FrustumRecord) {
    match self.frustums.iter_mut().find(|r| r.id == record.id) {
      Some(existing) => *existing = record,
      None => self.frustums.push(record),
    }
  }

  pub fn forget_frustum(&mut self, id: FrustumId) {
    self.frustums.retain(|r| r.id != id);
  }

  #[inline]
  pub fn frustum(&self, id: FrustumId) -> Option<&FrustumRecord> {
    self.frustums.iter().find(|r| r.id == id)
  }

  /// Squared distance of a region to its frustum's anchor; unknown
  /// frustums are infinitely far.
  pub(crate) fn distance_sq(&self, frustum: FrustumId, bbox: &AABBox) -> f32 {
    self
      .frustum(frustum)
      .map_or(f32::INFINITY, |r| refinement_distance_sq(bbox, r.anchor))
  }

  // ===========================================================================
  // Allocation
  // ===========================================================================

  /// Bind a slot to `request`.
  ///
  /// Returns `None` when the pool is exhausted and nothing allocated ranks
  /// below the request. The caller simply goes without a tile.
  #[cfg_attr(feature = "tracing-spans", tracing::instrument(skip_all, name = "cache::allocate"))]
  pub fn allocate(&mut self, request: &TileRequest, clock: &FrameClock) -> Option<TileId> {
    if self.free.is_empty() {
      let Some(victim) = self.find_eviction_candidate(request) else {
        self.stats.failed_allocations += 1;
        tracing::trace!(depth = request.depth, "tile pool exhausted");
        return None;
      };
      tracing::trace!(tile = victim.index(), "evicting tile");
      self.free(victim, clock);
      self.stats.evictions += 1;
    }

    let frustum = request.owner.frustum;
    let is_layer = request.is_layer();

    let hit = self
      .free
      .iter()
      .find(|&id| self.entries[id.index()].holds(frustum, &request.bbox, is_layer));

    let id = match hit {
      Some(id) => {
        self.stats.cache_hits += 1;
        id
      }
      None => {
        let id = self.least_recently_used(clock)?;
        self.entries[id.index()].invalidate(clock.frame());
        id
      }
    };

    self.bind(id, request);
    self.stats.allocations += 1;
    Some(id)
  }

  /// Free slot unused the longest; shallower content breaks ties.
  fn least_recently_used(&self, clock: &FrameClock) -> Option<TileId> {
    self.free.iter().max_by(|&a, &b| {
      let (ea, eb) = (&self.entries[a.index()], &self.entries[b.index()]);
      clock
        .frames_since(ea.last_used)
        .cmp(&clock.frames_since(eb.last_used))
        .then(eb.depth.cmp(&ea.depth))
    })
  }

  /// Allocated slot least worth keeping, provided it ranks below `request`.
  ///
  /// Rank: shallower first, then nearer its anchor, then primary over
  /// layer. A slot ranks below the request if it is deeper, or at equal
  /// depth farther away, or at equal depth and distance a layer tile facing
  /// a primary request. Among those, the shallowest, farthest, layer-first
  /// slot is evicted.
  fn find_eviction_candidate(&self, request: &TileRequest) -> Option<TileId> {
    let request_dist = self.distance_sq(request.owner.frustum, &request.bbox);
    let request_layer = request.is_layer();

    let mut best: Option<(TileId, u8, f32, bool)> = None;
    for id in self.all.iter() {
      let entry = &self.entries[id.index()];
      let Some(owner) = entry.owner else {
        continue;
      };
      let dist = self.distance_sq(owner.frustum, &entry.bbox);
      let layer = entry.is_layer;

      let below = entry.depth > request.depth
        || (entry.depth == request.depth
          && (dist > request_dist || (dist == request_dist && layer && !request_layer)));
      if !below {
        continue;
      }

      let better = match best {
        None => true,
        Some((_, b_depth, b_dist, b_layer)) => {
          entry.depth < b_depth
            || (entry.depth == b_depth && (dist > b_dist || (dist == b_dist && layer && !b_layer)))
        }
      };
      if better {
        best = Some((id, entry.depth, dist, layer));
      }
    }
    best.map(|(id, ..)| id)
  }

  fn bind(&mut self, id: TileId, request: &TileRequest) {
    self.free.remove(id);
    let fade = self.config.fade_in_seconds;
    let entry = &mut self.entries[id.index()];
    entry.owner = Some(request.owner);
    entry.depth = request.depth;
    entry.fade_in = fade;

    let is_layer = request.is_layer();
    if entry.holds(request.owner.frustum, &request.bbox, is_layer) {
      self.ready.insert(id);
    } else {
      entry.frustum_id = request.owner.frustum;
      entry.bbox = request.bbox;
      entry.is_layer = is_layer;
      entry.camera = None;
      self.render_queue.insert(id);
    }
  }

  /// Unbind `id` and return it to the free set.
  ///
  /// Work in flight is abandoned and the content forgotten; finished
  /// content stays for a later exact hit.
  pub fn free(&mut self, id: TileId, clock: &FrameClock) {
    let Some(entry) = self.entries.get_mut(id.index()) else {
      debug_assert!(false, "free of unknown tile {}", id.index());
      return;
    };
    debug_assert!(entry.owner.is_some(), "double free of tile {}", id.index());
    entry.owner = None;

    let in_flight = self.render_queue.remove(id)
      | self.render_batch.remove(id)
      | self.detail_map_queue.remove(id);
    if in_flight {
      self.ready.remove(id);
      entry.invalidate(clock.frame());
    } else {
      self.ready.remove(id);
      entry.last_used = clock.frame();
    }
    self.free.insert(id);
  }

  /// Free every slot owned by `frustum`.
  pub fn free_frustum(&mut self, frustum: FrustumId, clock: &FrameClock) -> usize {
    let owned: SmallVec<[TileId; 64]> = self
      .all
      .iter()
      .filter(|id| {
        self.entries[id.index()]
          .owner
          .is_some_and(|o| o.frustum == frustum)
      })
      .collect();
    for &id in &owned {
      self.free(id, clock);
    }
    owned.len()
  }

  /// Advance fade-in of every ready tile by `dt` seconds.
  pub fn tick(&mut self, dt: f32) {
    for id in self.ready.iter() {
      let entry = &mut self.entries[id.index()];
      entry.fade_in = (entry.fade_in - dt).max(0.0);
    }
  }

  /// True once no ready tile of `frustum` is still blending in.
  pub fn is_fade_in_finished(&self, frustum: FrustumId) -> bool {
    self.ready.iter().all(|id| {
      let e = &self.entries[id.index()];
      e.frustum_id != frustum || e.fade_in <= 0.0
    })
  }

  pub(crate) fn mark_ready(&mut self, id: TileId) {
    self.ready.insert(id);
    self.entries[id.index()].fade_in = self.config.fade_in_seconds;
  }
}

#[cfg(test)]
#[path = "tile_cache_test.rs"]
mod tile_cache_test;
