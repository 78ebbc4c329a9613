//! Quadtree refinement benchmarks.
//!
//! - **hull**: frustum footprint construction and box clipping
//! - **refine**: growing a forest from scratch around the anchor
//! - **prune**: re-verifying an unchanged forest (steady state)
//! - **create_tiles**: the full per-frame refit including tile requests

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Vec2, Vec3};
use shadow_lod::{
  quadtree::{refine_node, FrustumRefinement},
  AABBox, ConvexHull2D, FrameClock, FrustumController, LightBasis, QuadTree, ShadowConfig,
  TileCache, ViewCamera,
};

// =============================================================================
// Scenarios
// =============================================================================

fn viewer(x: f32, z: f32) -> ViewCamera {
  ViewCamera::new(Vec3::new(x, 10.0, z), Vec3::new(0.3, -0.1, 1.0), 60f32.to_radians(), 16.0 / 9.0)
}

fn light() -> Vec3 {
  Vec3::new(0.4, 1.0, 0.3)
}

/// Forest grown for `camera` under `config`, as one frame would leave it.
fn grown_forest(config: &ShadowConfig, camera: &ViewCamera) -> (QuadTree, ConvexHull2D, Vec2) {
  let basis = LightBasis::new(light());
  let (hull, anchor) = ConvexHull2D::from_frustum(camera, config.shadow_distance, &basis);
  let mut tree = QuadTree::new();
  let policy = FrustumRefinement {
    anchor,
    thresholds: &config.refinement_distance_sq,
    hull: &hull,
  };

  let cell = config.largest_tile_world_size;
  let mut bounds = hull.bounds();
  bounds.align_to(cell);
  let mut y = bounds.min.y;
  while y < bounds.max.y {
    let mut x = bounds.min.x;
    while x < bounds.max.x {
      let root = tree.add_root(AABBox::square(x, y, cell));
      refine_node(&mut tree, root, config.max_refinement, &policy);
      x += cell;
    }
    y += cell;
  }
  (tree, hull, anchor)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_hull(c: &mut Criterion) {
  let mut group = c.benchmark_group("refinement/hull");
  let basis = LightBasis::new(light());
  let camera = viewer(0.0, 0.0);

  group.bench_function("from_frustum", |b| {
    b.iter(|| ConvexHull2D::from_frustum(black_box(&camera), black_box(90.0), &basis))
  });

  let (hull, _) = ConvexHull2D::from_frustum(&camera, 90.0, &basis);
  let boxes: Vec<AABBox> = (0..64)
    .map(|i| AABBox::square((i % 8) as f32 * 15.0 - 60.0, (i / 8) as f32 * 15.0 - 60.0, 15.0))
    .collect();
  group.bench_function("intersects_box/64", |b| {
    b.iter(|| boxes.iter().filter(|bbox| hull.intersects_box(black_box(bbox))).count())
  });

  group.finish();
}

fn bench_refine(c: &mut Criterion) {
  let mut group = c.benchmark_group("refinement/refine");
  let camera = viewer(0.0, 0.0);

  for max_refinement in [2u8, 3, 4] {
    let config = ShadowConfig {
      max_refinement,
      refinement_distance_sq: ShadowConfig::default().refinement_distance_sq[..=max_refinement as usize].to_vec(),
      ..Default::default()
    };
    group.bench_with_input(
      BenchmarkId::new("from_scratch", max_refinement),
      &config,
      |b, config| b.iter(|| black_box(grown_forest(config, &camera)).0.len()),
    );
  }

  group.finish();
}

fn bench_prune(c: &mut Criterion) {
  let mut group = c.benchmark_group("refinement/prune");
  let config = ShadowConfig::default();
  let camera = viewer(0.0, 0.0);
  let (mut tree, hull, anchor) = grown_forest(&config, &camera);
  let policy = FrustumRefinement {
    anchor,
    thresholds: &config.refinement_distance_sq,
    hull: &hull,
  };

  let mut frame = 0u32;
  group.bench_function("steady_state", |b| {
    b.iter(|| {
      frame = frame.wrapping_add(1);
      tree.prune_all(frame, &policy, &mut |_, _, _| {})
    })
  });

  group.finish();
}

fn bench_create_tiles(c: &mut Criterion) {
  let mut group = c.benchmark_group("refinement/create_tiles");
  let config = ShadowConfig::default();

  group.bench_function("steady_state", |b| {
    let mut clock = FrameClock::new();
    let mut cache = TileCache::new(&config, &clock).unwrap();
    let mut frustum = FrustumController::new(&config).unwrap();
    frustum.set(light(), &mut cache, &mut clock);
    let camera = viewer(0.0, 0.0);
    frustum.create_tiles(&camera, &mut cache, &clock);

    b.iter(|| {
      clock.advance();
      frustum.create_tiles(black_box(&camera), &mut cache, &clock)
    })
  });

  group.bench_function("moving_viewer", |b| {
    let mut clock = FrameClock::new();
    let mut cache = TileCache::new(&config, &clock).unwrap();
    let mut frustum = FrustumController::new(&config).unwrap();
    frustum.set(light(), &mut cache, &mut clock);
    let mut x = 0.0f32;

    b.iter(|| {
      clock.advance();
      x += 4.0;
      frustum.create_tiles(&viewer(x, 0.0), &mut cache, &clock)
    })
  });

  group.finish();
}

criterion_group!(geometry, bench_hull);
criterion_group!(refinement, bench_refine, bench_prune, bench_create_tiles);

criterion_main!(geometry, refinement);
