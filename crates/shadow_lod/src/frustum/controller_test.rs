use glam::{Vec2, Vec3};

use super::*;
use crate::renderer::RecordingRenderer;

fn setup(config: ShadowConfig) -> (TileCache, FrameClock, FrustumController) {
  let mut clock = FrameClock::new();
  let mut cache = TileCache::new(&config, &clock).unwrap();
  let mut frustum = FrustumController::new(&config).unwrap();
  frustum.set(Vec3::Y, &mut cache, &mut clock);
  (cache, clock, frustum)
}

/// Viewer whose light-space anchor is `(x, y)` under a `+Y` light,
/// looking along light-space `+y`.
fn camera_at(x: f32, y: f32) -> ViewCamera {
  ViewCamera::new(Vec3::new(-x, 10.0, y), Vec3::Z, 60f32.to_radians(), 1.0)
}

fn render_everything(frustum: &FrustumController, cache: &mut TileCache) {
  let mut renderer = RecordingRenderer::new();
  loop {
    let mut any = false;
    for is_layer in [false, true] {
      while cache
        .add_tile_from_render_queue_to_render_batch(frustum.id(), u8::MAX, is_layer)
        .is_some()
      {
        any = true;
      }
      cache.render_tiles_batch(&mut renderer, Vec3::ZERO);
      cache.build_detail_maps(&mut renderer);
    }
    if !any {
      break;
    }
  }
}

fn snapshot(frustum: &FrustumController) -> Vec<(AABBox, u8, Option<TileId>, Option<TileId>)> {
  let mut nodes: Vec<_> = frustum
    .tree()
    .iter()
    .map(|(_, n)| (n.bbox, n.depth, n.tile, n.layer_tile))
    .collect();
  nodes.sort_by(|a, b| {
    (a.0.min.x, a.0.min.y, a.1)
      .partial_cmp(&(b.0.min.x, b.0.min.y, b.1))
      .unwrap()
  });
  nodes
}

fn layer_nodes(frustum: &FrustumController) -> usize {
  frustum.tree().iter().filter(|(_, n)| n.depth >= 2).count()
}

// ===== Batch 1: Identity =====

#[test]
fn test_new_is_invalid() {
  let config = ShadowConfig::default();
  let frustum = FrustumController::new(&config).unwrap();
  assert!(!frustum.is_valid());
  assert!(frustum.is_light_dir_different(Vec3::Y));
  assert_eq!(frustum.lod_clamp().len(), 1);
  assert_eq!(frustum.lod_clamp()[0].value, 1.0);
  assert_eq!(frustum.lod_clamp()[0].rect.w, 128);
}

#[test]
fn test_new_rejects_bad_config() {
  let config = ShadowConfig {
    max_refinement: 7,
    ..Default::default()
  };
  assert!(FrustumController::new(&config).is_err());
}

#[test]
fn test_set_registers_with_cache() {
  let (cache, _, frustum) = setup(ShadowConfig::default());
  assert!(frustum.is_valid());
  assert!(frustum.id().raw() % 2 == 1);
  let record = cache.frustum(frustum.id()).unwrap();
  assert_eq!(record.basis.dir(), Vec3::Y);
  assert_eq!(record.detail_map_max_depth, [Some(1), Some(2)]);
}

#[test]
fn test_light_dir_hysteresis() {
  let (_, _, frustum) = setup(ShadowConfig::default());
  assert!(!frustum.is_light_dir_different(Vec3::Y));
  assert!(!frustum.is_light_dir_different(Vec3::new(0.01, 1.0, 0.0)));
  assert!(frustum.is_light_dir_different(Vec3::new(1.0, 1.0, 0.0)));
}

#[test]
fn test_set_again_issues_new_id() {
  let (mut cache, mut clock, mut frustum) = setup(ShadowConfig::default());
  let first = frustum.id();
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  assert!(cache.allocated_count() > 0);

  frustum.set(Vec3::new(0.3, 1.0, 0.0), &mut cache, &mut clock);
  assert_ne!(frustum.id(), first);
  assert!(frustum.tree().is_empty());
  assert_eq!(cache.allocated_count(), 0);
  assert!(cache.frustum(first).is_none());
}

// ===== Batch 2: create_tiles =====

#[test]
fn test_invalid_frustum_creates_nothing() {
  let config = ShadowConfig::default();
  let clock = FrameClock::new();
  let mut cache = TileCache::new(&config, &clock).unwrap();
  let mut frustum = FrustumController::new(&config).unwrap();
  let update = frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  assert_eq!(update, TileUpdate::default());
  assert!(frustum.tree().is_empty());
}

#[test]
fn test_create_tiles_covers_view() {
  let (mut cache, clock, mut frustum) = setup(ShadowConfig::default());
  let update = frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);

  assert!((frustum.anchor() - Vec2::new(60.0, 60.0)).length() < 1e-3);
  assert!(!frustum.hull().is_empty());
  assert_eq!(update.nodes_created, frustum.tree().len());
  assert_eq!(update.nodes_removed, 0);
  assert_eq!(update.tiles_missing, 0);
  assert_eq!(update.tiles_requested, frustum.tree().len() + layer_nodes(&frustum));
  assert_eq!(cache.allocated_count(), update.tiles_requested);
  assert_eq!(frustum.tree().max_depth(), Some(4));

  let thresholds = &ShadowConfig::default().refinement_distance_sq;
  for (handle, node) in frustum.tree().iter() {
    let dist = crate::quadtree::refinement_distance_sq(&node.bbox, frustum.anchor());
    assert!(dist < thresholds[node.depth as usize]);
    assert!(frustum.hull().intersects_box(&node.bbox));
    assert!(node.tile.is_some_and(|t| cache.owns(
      t,
      &TileOwner {
        frustum: frustum.id(),
        node: handle,
        slot: TileSlot::Primary
      }
    )));
    assert_eq!(node.layer_tile.is_some(), node.depth >= 2);
  }

  let anchor_root = frustum
    .tree()
    .find_root(&AABBox::square(0.0, 0.0, 120.0))
    .expect("root under the viewer");
  assert!(frustum.tree().get(anchor_root).is_some());
}

#[test]
fn test_create_tiles_single_root_scenario() {
  let thresholds = vec![50.0 * 50.0, 45.0 * 45.0, 25.0 * 25.0, 12.0 * 12.0, 6.0 * 6.0];
  let config = ShadowConfig {
    largest_tile_world_size: 120.0,
    max_refinement: 4,
    refinement_distance_sq: thresholds.clone(),
    ..Default::default()
  };
  let (mut cache, clock, mut frustum) = setup(config);
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);

  assert_eq!(frustum.tree().roots().len(), 1);
  assert!(frustum.tree().find_root(&AABBox::square(0.0, 0.0, 120.0)).is_some());

  let mut per_depth = [0usize; 5];
  for (_, node) in frustum.tree().iter() {
    per_depth[node.depth as usize] += 1;
    let dist = crate::quadtree::refinement_distance_sq(&node.bbox, frustum.anchor());
    assert!(dist < thresholds[0]);
    assert!(dist < thresholds[node.depth as usize]);
  }
  assert_eq!(per_depth, [1, 4, 4, 4, 4]);
}

#[test]
fn test_create_tiles_is_idempotent() {
  let (mut cache, mut clock, mut frustum) = setup(ShadowConfig::default());
  let camera = camera_at(60.0, 60.0);
  frustum.create_tiles(&camera, &mut cache, &clock);
  let before = snapshot(&frustum);
  let stats = cache.stats();

  clock.advance();
  let update = frustum.create_tiles(&camera, &mut cache, &clock);
  assert_eq!(update, TileUpdate::default());
  assert_eq!(snapshot(&frustum), before);
  assert_eq!(cache.stats().allocations, stats.allocations);
  assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_moving_away_releases_tiles() {
  let (mut cache, mut clock, mut frustum) = setup(ShadowConfig::default());
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  let old_nodes = frustum.tree().len();

  clock.advance();
  let update = frustum.create_tiles(&camera_at(2060.0, 60.0), &mut cache, &clock);
  assert_eq!(update.nodes_removed, old_nodes);
  assert!(frustum.tree().find_root(&AABBox::square(0.0, 0.0, 120.0)).is_none());

  for entry in cache.entries().iter().filter(|e| e.is_allocated()) {
    let owner = entry.owner().unwrap();
    assert!(frustum.tree().contains(owner.node));
  }
  assert_eq!(cache.allocated_count(), frustum.tree().len() + layer_nodes(&frustum));
}

#[test]
fn test_small_pool_degrades_gracefully() {
  let config = ShadowConfig {
    atlas_width: 512,
    atlas_height: 512,
    ..Default::default()
  };
  let (mut cache, clock, mut frustum) = setup(config);
  let update = frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);

  assert!(update.tiles_missing > 0);
  assert_eq!(cache.allocated_count(), 4);
  let mut holders = 0;
  for (handle, node) in frustum.tree().iter() {
    for (slot, tile) in node.tiles() {
      let owner = TileOwner {
        frustum: frustum.id(),
        node: handle,
        slot,
      };
      if cache.owns(tile, &owner) {
        holders += 1;
      }
    }
  }
  assert_eq!(holders, 4);
}

#[test]
fn test_create_tiles_is_idempotent_under_pressure() {
  for atlas_width in [768, 1024, 1280] {
    let config = ShadowConfig {
      atlas_width,
      atlas_height: 512,
      ..Default::default()
    };
    let (mut cache, mut clock, mut frustum) = setup(config);
    let camera = camera_at(60.0, 60.0);
    let first = frustum.create_tiles(&camera, &mut cache, &clock);
    assert!(first.tiles_missing > 0);
    let before = snapshot(&frustum);
    let stats = cache.stats();

    clock.advance();
    let update = frustum.create_tiles(&camera, &mut cache, &clock);
    assert_eq!(update.nodes_created, 0);
    assert_eq!(update.nodes_removed, 0);
    assert_eq!(snapshot(&frustum), before, "atlas width {atlas_width}");
    assert_eq!(cache.stats().evictions, stats.evictions, "atlas width {atlas_width}");
    assert_eq!(cache.stats().allocations, stats.allocations);
  }
}

#[test]
fn test_pressure_keeps_shallowest_tiles() {
  let config = ShadowConfig {
    atlas_width: 1024,
    atlas_height: 512,
    ..Default::default()
  };
  let (mut cache, clock, mut frustum) = setup(config);
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);

  let mut held = Vec::new();
  let mut missing = Vec::new();
  for (handle, node) in frustum.tree().iter() {
    let owner = TileOwner {
      frustum: frustum.id(),
      node: handle,
      slot: TileSlot::Primary,
    };
    match node.tile {
      Some(tile) if cache.owns(tile, &owner) => held.push(node.depth),
      _ => missing.push(node.depth),
    }
  }
  assert!(!missing.is_empty());
  let deepest_held = held.iter().copied().max().unwrap();
  let shallowest_missing = missing.iter().copied().min().unwrap();
  assert!(deepest_held <= shallowest_missing);
}

#[test]
fn test_degenerate_hull_blocks_refinement() {
  let (mut cache, clock, mut frustum) = setup(ShadowConfig::default());
  let camera = ViewCamera::new(Vec3::new(-60.0, 10.0, 60.0), Vec3::NEG_Y, 0.0, 1.0);
  let update = frustum.create_tiles(&camera, &mut cache, &clock);
  assert!(frustum.hull().is_empty());
  assert_eq!(update.nodes_created, 0);
  assert!(frustum.tree().is_empty());
}

#[test]
fn test_layers_disabled() {
  let config = ShadowConfig {
    min_refinement_for_layer: None,
    ..Default::default()
  };
  let (mut cache, clock, mut frustum) = setup(config);
  let update = frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  assert_eq!(update.tiles_requested, frustum.tree().len());
  assert!(frustum.tree().iter().all(|(_, n)| n.layer_tile.is_none()));
}

#[test]
fn test_reset_frees_everything() {
  let (mut cache, clock, mut frustum) = setup(ShadowConfig::default());
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  let id = frustum.id();
  frustum.reset(&mut cache, &clock);

  assert!(!frustum.is_valid());
  assert!(frustum.tree().is_empty());
  assert_eq!(cache.allocated_count(), 0);
  assert!(cache.frustum(id).is_none());
}

// ===== Batch 3: Indexing =====

#[test]
fn test_nothing_indexed_before_render() {
  let (mut cache, clock, mut frustum) = setup(ShadowConfig::default());
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  frustum.find_indexed_nodes(&cache);
  assert!(frustum.indexed_nodes().is_empty());

  frustum.fill_indirection(&cache, false);
  frustum.fill_lod_clamp(&cache);
  assert!(frustum.indirection(false).is_empty());
  assert_eq!(frustum.lod_clamp().len(), 1);
}

#[test]
fn test_indexes_ready_roots() {
  let (mut cache, clock, mut frustum) = setup(ShadowConfig::default());
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  render_everything(&frustum, &mut cache);
  frustum.find_indexed_nodes(&cache);

  let roots = frustum.tree().roots();
  assert_eq!(frustum.indexed_nodes().len(), roots.len());
  let anchor_root = frustum.tree().find_root(&AABBox::square(0.0, 0.0, 120.0)).unwrap();
  assert_eq!(frustum.indexed_nodes()[0], anchor_root);

  let index = frustum.index_bbox();
  assert_eq!(index.size().truncate(), Vec2::splat(960.0));
  for &node in frustum.indexed_nodes() {
    let bbox = frustum.tree().get(node).unwrap().bbox;
    assert!(index.contains_point(bbox.min) && index.contains_point(bbox.max));
  }

  // Index camera sits over the square, no lower than any tile camera.
  let cam = frustum.index_camera_pos();
  let center = frustum.basis().to_world(index.center());
  assert!((cam - center).cross(Vec3::Y).length() < 1e-3);
  assert!(cam.y >= 499.0);
}

#[test]
fn test_primary_indirection_records() {
  let (mut cache, clock, mut frustum) = setup(ShadowConfig::default());
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  render_everything(&frustum, &mut cache);
  frustum.find_indexed_nodes(&cache);
  frustum.fill_indirection(&cache, false);

  let data = frustum.indirection(false);
  assert_eq!(data.len(), frustum.tree().len());
  assert_eq!(data.count_for_mip(4), frustum.indexed_nodes().len());
  for quad in data.quads() {
    // Freshly rendered: fractional part is the whole fade-in.
    assert!(quad.scale_factor > 0.0);
    assert_eq!((quad.scale_factor - 0.5).rem_euclid(1920.0), 0.0);
    let depth = 4 - quad.mip;
    assert_eq!(quad.rect.w, 16 >> depth);
  }
  // Coarse mips come first.
  assert!(data.quads().windows(2).all(|w| w[0].mip >= w[1].mip));
}

#[test]
fn test_layer_indirection_falls_back_to_primary() {
  let (mut cache, clock, mut frustum) = setup(ShadowConfig::default());
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  render_everything(&frustum, &mut cache);
  frustum.find_indexed_nodes(&cache);
  frustum.fill_indirection(&cache, true);

  let data = frustum.indirection(true);
  assert_eq!(data.len(), frustum.tree().len());
  let negated = data.quads().iter().filter(|q| q.scale_factor < 0.0).count();
  let shallow = frustum.tree().iter().filter(|(_, n)| n.depth < 2).count();
  assert_eq!(negated, shallow);
  assert!(data.quads().iter().all(|q| (q.scale_factor < 0.0) == (q.mip > 2)));
}

#[test]
fn test_fade_in_shows_in_records() {
  let (mut cache, clock, mut frustum) = setup(ShadowConfig::default());
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  render_everything(&frustum, &mut cache);
  cache.tick(1.0);
  frustum.find_indexed_nodes(&cache);
  frustum.fill_indirection(&cache, false);
  assert!(frustum
    .indirection(false)
    .quads()
    .iter()
    .all(|q| q.scale_factor.fract() == 0.0));
}

#[test]
fn test_lod_clamp_records() {
  let (mut cache, clock, mut frustum) = setup(ShadowConfig::default());
  frustum.create_tiles(&camera_at(60.0, 60.0), &mut cache, &clock);
  render_everything(&frustum, &mut cache);
  frustum.find_indexed_nodes(&cache);
  frustum.fill_lod_clamp(&cache);

  let quads = frustum.lod_clamp();
  let below_roots = frustum.tree().iter().filter(|(_, n)| n.depth > 0).count();
  assert_eq!(quads.len(), 1 + below_roots);
  assert_eq!(quads[0].value, 1.0);
  assert!(quads[1..].iter().all(|q| q.value < 1.0 && q.value >= 0.0));
  assert!(quads.iter().any(|q| q.value == 0.0), "deepest level clamps to 0");
  assert!(quads.iter().any(|q| q.value == 0.75));

  // Refilling replaces rather than appends.
  frustum.fill_lod_clamp(&cache);
  assert_eq!(frustum.lod_clamp().len(), 1 + below_roots);
}
