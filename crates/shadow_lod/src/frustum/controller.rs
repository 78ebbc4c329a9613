//! FrustumController - one light direction's quadtree, tiles and indirection.

use glam::{UVec2, Vec2, Vec3};
use smallvec::SmallVec;

use super::indirection::{IndexProjection, IndexRect, IndirectionData, IndirectionQuad, LodClampQuad};
use crate::cache::{FrustumRecord, TileCache, TileId, TileOwner, TileRequest};
use crate::config::ShadowConfig;
use crate::constants::MAX_REFINEMENT;
use crate::error::ConfigError;
use crate::frame::{FrameClock, FrustumId};
use crate::geometry::{AABBox, ConvexHull2D, LightBasis, ViewCamera};
use crate::quadtree::{
  refine_node, refinement_distance_sq, FrustumRefinement, NodeHandle, QuadTree, RefinementPolicy, TileSlot,
};

/// What one `create_tiles` pass changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileUpdate {
  pub nodes_created: usize,
  pub nodes_removed: usize,
  /// Node slots that asked the cache for a tile.
  pub tiles_requested: usize,
  /// Requests the cache could not serve.
  pub tiles_missing: usize,
}

/// A shadow frustum for one light direction.
///
/// Invalid until [`FrustumController::set`] gives it a direction and a
/// fresh [`FrustumId`]. Every tile it acquires is owned under that id, so
/// [`FrustumController::reset`] can release them all at once.
#[derive(Debug)]
pub struct FrustumController {
  config: ShadowConfig,
  id: FrustumId,
  basis: LightBasis,
  tree: QuadTree,
  hull: ConvexHull2D,
  anchor: Vec2,

  indexed_nodes: Vec<NodeHandle>,
  index_bbox: AABBox,
  index_camera_pos: Vec3,
  /// Primary pass, then layer pass.
  indirection: [IndirectionData; 2],
  lod_clamp: Vec<LodClampQuad>,
}

impl FrustumController {
  pub fn new(config: &ShadowConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    let mut frustum = Self {
      config: config.clone(),
      id: FrustumId::INVALID,
      basis: LightBasis::default(),
      tree: QuadTree::new(),
      hull: ConvexHull2D::default(),
      anchor: Vec2::ZERO,
      indexed_nodes: Vec::new(),
      index_bbox: AABBox::EMPTY,
      index_camera_pos: Vec3::ZERO,
      indirection: Default::default(),
      lod_clamp: Vec::new(),
    };
    frustum.reset_indirection();
    Ok(frustum)
  }

  // ===========================================================================
  // Identity
  // ===========================================================================

  #[inline]
  pub fn id(&self) -> FrustumId {
    self.id
  }

  #[inline]
  pub fn is_valid(&self) -> bool {
    self.id.is_valid()
  }

  #[inline]
  pub fn basis(&self) -> &LightBasis {
    &self.basis
  }

  #[inline]
  pub fn light_dir(&self) -> Vec3 {
    self.basis.dir()
  }

  #[inline]
  pub fn tree(&self) -> &QuadTree {
    &self.tree
  }

  #[inline]
  pub fn hull(&self) -> &ConvexHull2D {
    &self.hull
  }

  /// Refinement anchor in light space.
  #[inline]
  pub fn anchor(&self) -> Vec2 {
    self.anchor
  }

  /// True if `dir` is far enough from this frustum's light to need a new
  /// one. An invalid frustum differs from everything.
  pub fn is_light_dir_different(&self, dir: Vec3) -> bool {
    !self.is_valid() || self.basis.is_different(dir, self.config.light_dir_update_threshold)
  }

  /// What the cache needs to rank and render this frustum's tiles.
  pub fn record(&self) -> FrustumRecord {
    FrustumRecord {
      id: self.id,
      anchor: self.anchor,
      basis: self.basis,
      detail_map_max_depth: [
        self.config.detail_map_max_depth(false),
        self.config.detail_map_max_depth(true),
      ],
    }
  }

  /// Drop everything and start over for `light_dir` under a new id.
  pub fn set(&mut self, light_dir: Vec3, cache: &mut TileCache, clock: &mut FrameClock) {
    self.reset(cache, clock);
    self.basis = LightBasis::new(light_dir);
    self.id = clock.next_frustum_id();
    cache.update_frustum(self.record());
    tracing::debug!(id = self.id.raw(), dir = ?self.basis.dir(), "frustum set");
  }

  /// Release every tile and node and become invalid.
  pub fn reset(&mut self, cache: &mut TileCache, clock: &FrameClock) {
    self.tree.clear(&mut |_, _, _| {});
    if self.id.is_valid() {
      let freed = cache.free_frustum(self.id, clock);
      cache.forget_frustum(self.id);
      tracing::debug!(id = self.id.raw(), freed, "frustum reset");
    }
    self.id = FrustumId::INVALID;
    self.basis = LightBasis::default();
    self.hull = ConvexHull2D::default();
    self.anchor = Vec2::ZERO;
    self.indexed_nodes.clear();
    self.index_bbox = AABBox::EMPTY;
    self.index_camera_pos = Vec3::ZERO;
    self.reset_indirection();
  }

  // ===========================================================================
  // Refinement and tile allocation
  // ===========================================================================

  /// Refit the quadtree to `camera` and make sure every node has tiles.
  ///
  /// Prunes first, then grows a root for every grid cell the hull (and a
  /// small square around the anchor) touches, then requests tiles shallowest
  /// and nearest first, primary before layer. Under
  /// pool pressure the first call already settles on the tiles a repeat
  /// call keeps.
  #[cfg_attr(feature = "tracing-spans", tracing::instrument(skip_all, name = "frustum::create_tiles"))]
  pub fn create_tiles(&mut self, camera: &ViewCamera, cache: &mut TileCache, clock: &FrameClock) -> TileUpdate {
    let mut update = TileUpdate::default();
    if !self.is_valid() {
      return update;
    }

    let (hull, anchor) = ConvexHull2D::from_frustum(camera, self.config.shadow_distance, &self.basis);
    if hull.is_empty() {
      tracing::warn!(id = self.id.raw(), "degenerate frustum hull, only unculled depths refine");
    }
    self.hull = hull;
    self.anchor = anchor;
    cache.update_frustum(self.record());

    let id = self.id;
    let cell = self.config.largest_tile_world_size;
    let max_refinement = self.config.max_refinement;
    let policy = FrustumRefinement {
      anchor,
      thresholds: &self.config.refinement_distance_sq,
      hull: &self.hull,
    };

    let mut released: SmallVec<[(TileOwner, TileId); 16]> = SmallVec::new();
    update.nodes_removed = self.tree.prune_all(clock.frame(), &policy, &mut |node, slot, tile| {
      released.push((TileOwner { frustum: id, node, slot }, tile));
    });
    for (owner, tile) in released {
      if cache.owns(tile, &owner) {
        cache.free(tile, clock);
      }
    }

    let mut bounds = self.hull.bounds();
    let extent = Vec3::new(self.config.min_extent_ls, self.config.min_extent_ls, 0.0);
    bounds.expand(anchor.extend(0.0) + extent);
    bounds.expand(anchor.extend(0.0) - extent);
    bounds.align_to(cell);

    let mut min_y = bounds.min.y;
    while min_y < bounds.max.y {
      let mut min_x = bounds.min.x;
      while min_x < bounds.max.x {
        let cell_bbox = AABBox::square(min_x, min_y, cell);
        if policy.should_exist(&cell_bbox, 0) {
          let root = match self.tree.find_root(&cell_bbox) {
            Some(root) => root,
            None => {
              update.nodes_created += 1;
              self.tree.add_root(cell_bbox)
            }
          };
          update.nodes_created += refine_node(&mut self.tree, root, max_refinement, &policy);
        }
        min_x += cell;
      }
      min_y += cell;
    }

    // Request in the cache's keep order so a request only ever evicts
    // tiles ranked below everything already placed this pass.
    let min_layer = self
      .config
      .min_refinement_for_layer
      .filter(|_| self.config.uses_layers());
    let mut order: Vec<(u8, f32, TileSlot, NodeHandle)> = Vec::with_capacity(self.tree.len() * 2);
    for (handle, node) in self.tree.iter() {
      let dist = refinement_distance_sq(&node.bbox, anchor);
      order.push((node.depth, dist, TileSlot::Primary, handle));
      if min_layer.is_some_and(|min| node.depth >= min) {
        order.push((node.depth, dist, TileSlot::Layer, handle));
      }
    }
    order.sort_by(|a, b| {
      a.0
        .cmp(&b.0)
        .then(a.1.total_cmp(&b.1))
        .then(a.2.is_layer().cmp(&b.2.is_layer()))
    });

    for (_, _, slot, node) in order {
      if slot.is_layer() {
        let has_primary = self
          .tree
          .get(node)
          .is_some_and(|n| self.holds_tile(n.tile, node, TileSlot::Primary, cache));
        if !has_primary {
          continue;
        }
      }
      self.ensure_tile(node, slot, cache, clock, &mut update);
    }

    tracing::debug!(
      id = id.raw(),
      nodes = self.tree.len(),
      created = update.nodes_created,
      removed = update.nodes_removed,
      requested = update.tiles_requested,
      missing = update.tiles_missing,
      "tiles created"
    );
    update
  }

  /// Keep `node`'s tile in `slot` if the cache still binds it here,
  /// otherwise ask for a new one.
  fn ensure_tile(
    &mut self,
    node: NodeHandle,
    slot: TileSlot,
    cache: &mut TileCache,
    clock: &FrameClock,
    update: &mut TileUpdate,
  ) {
    let Some(current) = self.tree.get(node) else {
      return;
    };
    if self.holds_tile(current.tile_in(slot), node, slot, cache) {
      return;
    }

    let request = TileRequest {
      owner: self.owner(node, slot),
      bbox: current.bbox,
      depth: current.depth,
    };
    update.tiles_requested += 1;
    let tile = cache.allocate(&request, clock);
    if tile.is_none() {
      update.tiles_missing += 1;
    }
    if let Some(current) = self.tree.get_mut(node) {
      *current.tile_in_mut(slot) = tile;
    }
  }

  #[inline]
  fn owner(&self, node: NodeHandle, slot: TileSlot) -> TileOwner {
    TileOwner {
      frustum: self.id,
      node,
      slot,
    }
  }

  /// True if `tile` is still bound to `node`'s `slot`.
  #[inline]
  fn holds_tile(&self, tile: Option<TileId>, node: NodeHandle, slot: TileSlot, cache: &TileCache) -> bool {
    tile.is_some_and(|t| cache.owns(t, &self.owner(node, slot)))
  }

  /// The node's tile in `slot`, if bound here and fully rendered.
  pub fn ready_tile(&self, node: NodeHandle, slot: TileSlot, cache: &TileCache) -> Option<TileId> {
    let tile = self.tree.get(node)?.tile_in(slot)?;
    (cache.owns(tile, &self.owner(node, slot)) && cache.is_ready(tile)).then_some(tile)
  }

  /// True if the tree is non-empty and every node down to `max_depth` has a
  /// ready primary tile.
  pub fn is_ready_to_depth(&self, max_depth: u8, cache: &TileCache) -> bool {
    !self.tree.is_empty()
      && self
        .tree
        .iter()
        .filter(|(_, node)| node.depth <= max_depth)
        .all(|(handle, _)| self.ready_tile(handle, TileSlot::Primary, cache).is_some())
  }

  // ===========================================================================
  // Indexing
  // ===========================================================================

  #[inline]
  pub fn indexed_nodes(&self) -> &[NodeHandle] {
    &self.indexed_nodes
  }

  /// Light-space square covered by the indirection texture.
  #[inline]
  pub fn index_bbox(&self) -> &AABBox {
    &self.index_bbox
  }

  #[inline]
  pub fn index_camera_pos(&self) -> Vec3 {
    self.index_camera_pos
  }

  /// Choose the roots the indirection texture covers this frame.
  ///
  /// Ready roots near the anchor are sorted by their farthest edge and
  /// merged greedily while the union still fits the indexed square. The
  /// index camera is then placed over that square, as high along the light
  /// as the highest tile camera.
  #[cfg_attr(feature = "tracing-spans", tracing::instrument(skip_all, name = "frustum::find_indexed_nodes"))]
  pub fn find_indexed_nodes(&mut self, cache: &TileCache) {
    self.indexed_nodes.clear();
    if !self.is_valid() {
      return;
    }

    let region = self.config.index_region_size();
    let cell = self.config.largest_tile_world_size;
    let dist_max = Vec2::splat(region + cell);
    let dist_max_sq = dist_max.length_squared();
    let anchor = self.anchor;

    let mut candidates: Vec<(f32, NodeHandle)> = self
      .tree
      .roots()
      .iter()
      .copied()
      .filter(|&root| self.ready_tile(root, TileSlot::Primary, cache).is_some())
      .filter_map(|root| {
        let bbox = self.tree.get(root)?.bbox;
        let half = bbox.size().truncate() * 0.5;
        let gap = ((anchor - bbox.center().truncate()).abs() - half).max(Vec2::ZERO);
        if gap.length_squared() >= dist_max_sq {
          return None;
        }
        let key = (bbox.min.truncate() - anchor)
          .abs()
          .max((bbox.max.truncate() - anchor).abs())
          .max_element();
        Some((key, root))
      })
      .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    let point = anchor.extend(0.0);
    let mut sorted = AABBox::new(point, point).aligned(cell);
    for (key, root) in candidates {
      let Some(bbox) = self.tree.get(root).map(|n| n.bbox) else {
        continue;
      };
      let test_min = sorted.min.min(bbox.min).with_z(0.0);
      let test_max = sorted.max.max(bbox.max).with_z(0.0);
      let size = test_max - test_min;
      if size.x > region || size.y > region {
        if key > dist_max.x {
          break;
        }
      } else {
        sorted = AABBox::new(test_min, test_max);
        self.indexed_nodes.push(root);
      }
    }

    self.index_bbox = AABBox::new(sorted.min, sorted.min + Vec3::new(region, region, 0.0));

    let dir = self.basis.dir();
    let height = self
      .indexed_nodes
      .iter()
      .filter_map(|&node| {
        let tile = self.tree.get(node)?.tile?;
        cache.entry(tile)?.camera().map(|c| dir.dot(c.position))
      })
      .fold(f32::NEG_INFINITY, f32::max);
    let height = if height.is_finite() { height } else { 0.0 };
    self.index_camera_pos = self.basis.to_world(self.index_bbox.center()) + height * dir;
  }

  /// The index camera and sizes, or `None` before anything is indexed.
  pub fn index_projection(&self, cache: &TileCache) -> Option<IndexProjection> {
    if !self.is_valid() || self.index_bbox.is_empty() {
      return None;
    }
    let config = cache.config();
    Some(IndexProjection {
      bbox: self.index_bbox,
      camera_pos: self.index_camera_pos,
      basis: self.basis,
      far_plane: self.config.tile_far_plane,
      texture_size: self.config.indirection_texture_size(),
      atlas_size: UVec2::new(config.atlas_width, config.atlas_height),
      borderless_tile_size: self.config.borderless_tile_size(),
      index_size: self.config.index_size,
    })
  }

  // ===========================================================================
  // Indirection
  // ===========================================================================

  /// Records of the primary (`layers == false`) or layer pass.
  #[inline]
  pub fn indirection(&self, layers: bool) -> &IndirectionData {
    &self.indirection[layers as usize]
  }

  #[inline]
  pub fn lod_clamp(&self) -> &[LodClampQuad] {
    &self.lod_clamp
  }

  fn reset_indirection(&mut self) {
    for data in &mut self.indirection {
      data.clear();
    }
    self.lod_clamp.clear();
    let size = self.config.indirection_texture_size() as i32;
    self.lod_clamp.push(LodClampQuad {
      rect: IndexRect {
        x: 0,
        y: 0,
        w: size,
        h: size,
      },
      value: 1.0,
    });
  }

  /// Breadth-first walk from the indexed roots, one level per mip from
  /// coarsest down. `accept` decides which children join the next level.
  fn walk_levels<A, V>(&self, mut accept: A, mut visit: V)
  where
    A: FnMut(NodeHandle) -> bool,
    V: FnMut(NodeHandle, u8),
  {
    let mut level: Vec<NodeHandle> = self.indexed_nodes.clone();
    for mip in (0..=self.config.max_refinement).rev() {
      let mut next = Vec::new();
      for &node in &level {
        visit(node, mip);
        let Some(current) = self.tree.get(node) else {
          continue;
        };
        next.extend(current.children.into_iter().flatten().filter(|&c| accept(c)));
      }
      if next.is_empty() {
        break;
      }
      level = next;
    }
  }

  /// Produce indirection records for every indexed tile and its ready
  /// descendants.
  ///
  /// With `layers` set, ready layer tiles stand in for primaries; nodes
  /// without one keep their primary and get a negated scale factor.
  #[cfg_attr(feature = "tracing-spans", tracing::instrument(skip_all, name = "frustum::fill_indirection"))]
  pub fn fill_indirection(&mut self, cache: &TileCache, layers: bool) {
    let mut data = std::mem::take(&mut self.indirection[layers as usize]);
    data.clear();

    if let Some(projection) = self.index_projection(cache).filter(|_| !self.indexed_nodes.is_empty()) {
      self.walk_levels(
        |child| self.ready_tile(child, TileSlot::Primary, cache).is_some(),
        |node, mip| {
          let Some(primary) = self.ready_tile(node, TileSlot::Primary, cache) else {
            return;
          };
          let (tile, fallback) = if layers {
            match self.ready_tile(node, TileSlot::Layer, cache) {
              Some(layer) => (layer, false),
              None => (primary, true),
            }
          } else {
            (primary, false)
          };
          let Some(entry) = cache.entry(tile) else {
            return;
          };
          let Some(camera) = entry.camera() else {
            debug_assert!(false, "ready tile {} was never rendered", tile.index());
            return;
          };
          let mapping = projection.map_tile(entry.bbox(), entry.depth(), entry.viewport(), camera.position);
          let mut scale_factor = mapping.scale_factor + entry.fade_in();
          if fallback {
            scale_factor = -scale_factor;
          }
          data.push(IndirectionQuad {
            mip,
            rect: mapping.rect,
            offset: mapping.offset,
            scale_factor,
          });
        },
      );
    }

    self.indirection[layers as usize] = data;
  }

  /// Produce the LOD clamp records: the whole texture at 1.0, then every
  /// indexed node below the root level at `mip / MAX_REFINEMENT`.
  pub fn fill_lod_clamp(&mut self, cache: &TileCache) {
    let mut quads = std::mem::take(&mut self.lod_clamp);
    quads.truncate(1);

    if let Some(projection) = self.index_projection(cache).filter(|_| !self.indexed_nodes.is_empty()) {
      let max_refinement = self.config.max_refinement;
      self.walk_levels(
        |child| {
          self
            .tree
            .get(child)
            .is_some_and(|n| self.holds_tile(n.tile, child, TileSlot::Primary, cache))
        },
        |node, mip| {
          if mip >= max_refinement {
            return;
          }
          let Some(current) = self.tree.get(node) else {
            return;
          };
          quads.push(LodClampQuad {
            rect: projection.dest_rect(&current.bbox),
            value: mip as f32 / MAX_REFINEMENT as f32,
          });
        },
      );
    }

    self.lod_clamp = quads;
  }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;
