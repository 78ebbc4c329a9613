//! Per-frame work scheduling: render queue → render batch → ready, with a
//! detour through the detail-map queue for shallow tiles.
//!
//! The batch is filled one tile at a time so the orchestrator can cap how
//! much work a single frame takes on, however many tiles went stale at once.

use glam::Vec3;
use smallvec::SmallVec;

use super::{TileCache, TileId, TileOwner};
use crate::frame::FrustumId;
use crate::geometry::TileCamera;
use crate::quadtree::{refinement_distance_sq, TileSlot};
use crate::renderer::{TileRenderRequest, TileRenderer};

impl TileCache {
  /// Move the most urgent queued tile of `(frustum, is_layer)` into the
  /// render batch and return its depth.
  ///
  /// Shallowest first, nearest the anchor among equals. Layer tiles wait
  /// until their node's primary tile is ready. Returns `None` when nothing
  /// qualifies or the best candidate is deeper than `max_depth`.
  pub fn add_tile_from_render_queue_to_render_batch(
    &mut self,
    frustum: FrustumId,
    max_depth: u8,
    is_layer: bool,
  ) -> Option<u8> {
    if !frustum.is_valid() {
      return None;
    }
    let anchor = self.frustum(frustum).map(|r| r.anchor);

    let mut best: Option<(TileId, u8, f32)> = None;
    for id in self.render_queue.iter() {
      let entry = &self.entries[id.index()];
      let Some(owner) = entry.owner else {
        continue;
      };
      if owner.frustum != frustum || entry.is_layer != is_layer {
        continue;
      }
      if is_layer && !self.primary_ready(&owner) {
        continue;
      }
      let dist = anchor.map_or(0.0, |a| refinement_distance_sq(&entry.bbox, a));
      let better = match best {
        None => true,
        Some((_, depth, best_dist)) => entry.depth < depth || (entry.depth == depth && dist < best_dist),
      };
      if better {
        best = Some((id, entry.depth, dist));
      }
    }

    let (id, depth, _) = best?;
    if depth > max_depth {
      return None;
    }
    self.render_queue.remove(id);
    self.render_batch.insert(id);
    Some(depth)
  }

  /// True if the primary tile of `owner`'s node is bound and ready.
  pub fn primary_ready(&self, owner: &TileOwner) -> bool {
    let primary = TileOwner {
      slot: TileSlot::Primary,
      ..*owner
    };
    self
      .ready
      .iter()
      .any(|id| self.entries[id.index()].owner == Some(primary))
  }

  /// True if `frustum` still has work at `max_depth` or shallower in any
  /// queue.
  pub fn has_pending_work(&self, frustum: FrustumId, max_depth: u8) -> bool {
    [&self.render_queue, &self.render_batch, &self.detail_map_queue]
      .into_iter()
      .flat_map(|set| set.iter())
      .any(|id| {
        let e = &self.entries[id.index()];
        e.frustum_id == frustum && e.depth <= max_depth
      })
  }

  /// Compute render cameras for the batch and describe it to a renderer.
  ///
  /// `world_center` anchors the scene bounds that tile cameras are placed
  /// against.
  pub fn prepare_render_batch(&mut self, world_center: Vec3) -> Vec<TileRenderRequest> {
    let scene = self.config.scene_bounds(world_center);
    let scale = self.config.viewport_scale();
    let far = self.config.tile_far_plane;
    let tile_size = self.config.tile_size;

    let mut requests = Vec::with_capacity(self.render_batch.len());
    let mut orphans: SmallVec<[TileId; 4]> = SmallVec::new();
    for id in self.render_batch.iter() {
      let entry = &self.entries[id.index()];
      let Some(record) = self.frustum(entry.frustum_id) else {
        tracing::warn!(tile = id.index(), "batched tile has no live frustum");
        orphans.push(id);
        continue;
      };
      let camera = TileCamera::for_region(&entry.bbox, &record.basis, &scene, scale, far);
      requests.push(TileRenderRequest {
        tile: id,
        frustum: entry.frustum_id,
        bbox: entry.bbox,
        depth: entry.depth,
        is_layer: entry.is_layer,
        viewport: entry.viewport,
        camera,
        depth_bias: camera.depth_bias(tile_size, tile_size),
      });
    }
    for request in &requests {
      self.entries[request.tile.index()].camera = Some(request.camera);
    }
    for id in orphans {
      self.release_orphan(id);
    }
    requests
  }

  /// Drop a batched tile whose frustum is gone: nothing will render it, so
  /// it returns to the free set with its content forgotten.
  fn release_orphan(&mut self, id: TileId) {
    self.render_batch.remove(id);
    let entry = &mut self.entries[id.index()];
    let frame = entry.last_used;
    entry.owner = None;
    entry.invalidate(frame);
    self.free.insert(id);
  }

  /// Render the batch and move each rendered tile on: to the detail-map
  /// queue when shallow enough for its kind, otherwise straight to ready.
  /// Tiles whose frustum is gone are freed unrendered.
  #[cfg_attr(feature = "tracing-spans", tracing::instrument(skip_all, name = "cache::render_tiles_batch"))]
  pub fn render_tiles_batch<R>(&mut self, renderer: &mut R, world_center: Vec3) -> usize
  where
    R: TileRenderer + ?Sized,
  {
    let requests = self.prepare_render_batch(world_center);
    if !requests.is_empty() {
      renderer.render_batch(&requests);
    }

    let batch: SmallVec<[TileId; 32]> = requests.iter().map(|r| r.tile).collect();
    for &id in &batch {
      self.render_batch.remove(id);
      let entry = &self.entries[id.index()];
      let threshold = self
        .frustum(entry.frustum_id)
        .and_then(|r| r.detail_map_max_depth[entry.is_layer as usize]);
      if threshold.is_some_and(|max| entry.depth <= max) {
        self.detail_map_queue.insert(id);
      } else {
        self.mark_ready(id);
      }
    }

    self.stats.tiles_rendered += batch.len() as u64;
    if !batch.is_empty() {
      tracing::debug!(tiles = batch.len(), detail_maps = self.detail_map_queue.len(), "rendered tile batch");
    }
    batch.len()
  }

  /// Build detail maps for every queued tile and mark them ready.
  pub fn build_detail_maps<R>(&mut self, renderer: &mut R) -> usize
  where
    R: TileRenderer + ?Sized,
  {
    if self.detail_map_queue.is_empty() {
      return 0;
    }

    let tile_size = self.config.tile_size;
    let requests: Vec<TileRenderRequest> = self
      .detail_map_queue
      .iter()
      .filter_map(|id| {
        let entry = &self.entries[id.index()];
        let camera = entry.camera?;
        Some(TileRenderRequest {
          tile: id,
          frustum: entry.frustum_id,
          bbox: entry.bbox,
          depth: entry.depth,
          is_layer: entry.is_layer,
          viewport: entry.viewport,
          camera,
          depth_bias: camera.depth_bias(tile_size, tile_size),
        })
      })
      .collect();
    renderer.build_detail_map(&requests);

    let queued: SmallVec<[TileId; 32]> = self.detail_map_queue.iter().collect();
    for &id in &queued {
      self.detail_map_queue.remove(id);
      self.mark_ready(id);
    }
    self.stats.detail_maps_built += queued.len() as u64;
    queued.len()
  }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
