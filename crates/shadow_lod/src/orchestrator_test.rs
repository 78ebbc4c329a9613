use glam::Vec3;

use super::*;
use crate::renderer::RecordingRenderer;

const ROTATED: Vec3 = Vec3::new(0.5, 1.0, 0.0);

fn camera() -> ViewCamera {
  ViewCamera::new(Vec3::new(-60.0, 10.0, 60.0), Vec3::Z, 60f32.to_radians(), 1.0)
}

fn orchestrator(budget: RenderBudget) -> ShadowOrchestrator {
  ShadowOrchestrator::with_budget(ShadowConfig::default(), budget).unwrap()
}

/// Unlimited tiles per frame, pre-render complete at depth 1.
fn fast_budget() -> RenderBudget {
  RenderBudget {
    max_tiles_per_frame: 0,
    prerender_max_depth: 1,
  }
}

fn settle(orch: &mut ShadowOrchestrator, light: Vec3, renderer: &mut RecordingRenderer) {
  for _ in 0..4 {
    orch.run_frame(light, &camera(), 1.0, renderer);
  }
}

// ===== Batch 1: Frustum lifecycle =====

#[test]
fn test_new_rejects_bad_config() {
  let config = ShadowConfig {
    tile_size: 0,
    ..Default::default()
  };
  assert!(ShadowOrchestrator::new(config).is_err());
}

#[test]
fn test_first_frame_sets_current() {
  let mut orch = orchestrator(RenderBudget::default());
  assert!(!orch.current().is_valid());

  let (current, prerender) = orch.begin_frame(Vec3::Y, &camera());
  assert!(orch.current().is_valid());
  assert!(!orch.is_prerendering());
  assert!(current.nodes_created > 0);
  assert!(current.tiles_requested > 0);
  assert_eq!(prerender, TileUpdate::default());
  assert!(orch.cache().frustum(orch.current().id()).is_some());
  assert_eq!(orch.clock().frame(), 1);
}

#[test]
fn test_small_turn_keeps_frustum() {
  let mut orch = orchestrator(RenderBudget::default());
  orch.begin_frame(Vec3::Y, &camera());
  let id = orch.current().id();

  orch.begin_frame(Vec3::new(0.01, 1.0, 0.0), &camera());
  assert_eq!(orch.current().id(), id);
  assert!(!orch.is_prerendering());
}

#[test]
fn test_light_change_starts_prerender() {
  let mut orch = orchestrator(RenderBudget::default());
  orch.begin_frame(Vec3::Y, &camera());
  let current = orch.current().id();

  let (_, prerender) = orch.begin_frame(ROTATED, &camera());
  assert!(orch.is_prerendering());
  assert_ne!(orch.prerender().id(), current);
  assert_eq!(orch.current().id(), current);
  assert!(prerender.tiles_requested > 0);
  assert!(orch.prerender().light_dir().dot(ROTATED.normalize()) > 0.9999);
}

#[test]
fn test_prerender_in_flight_is_not_restarted() {
  let mut orch = orchestrator(RenderBudget::default());
  orch.begin_frame(Vec3::Y, &camera());
  orch.begin_frame(ROTATED, &camera());
  let prerender = orch.prerender().id();

  orch.begin_frame(Vec3::new(-0.5, 1.0, 0.0), &camera());
  assert_eq!(orch.prerender().id(), prerender);
}

// ===== Batch 2: Budget =====

#[test]
fn test_budget_caps_batch() {
  let mut orch = orchestrator(RenderBudget::default());
  orch.begin_frame(Vec3::Y, &camera());
  let stats = orch.prepare_render();
  assert_eq!(stats.total(), 4);
  assert_eq!(stats.primary_tiles, 4);
  assert_eq!(orch.cache().render_batch().len(), 4);
}

#[test]
fn test_prerender_yields_to_current() {
  let mut orch = orchestrator(RenderBudget::default());
  let mut renderer = RecordingRenderer::new();
  orch.run_frame(Vec3::Y, &camera(), 0.1, &mut renderer);

  let report = orch.run_frame(ROTATED, &camera(), 0.1, &mut renderer);
  assert!(orch.is_prerendering());
  assert_eq!(report.batched.total(), 4);
  assert_eq!(report.batched.prerender_tiles, 0);
  assert!(!report.swapped);
}

#[test]
fn test_layers_follow_their_primaries() {
  let mut orch = orchestrator(RenderBudget::UNLIMITED);
  let mut renderer = RecordingRenderer::new();

  let first = orch.run_frame(Vec3::Y, &camera(), 0.1, &mut renderer);
  assert!(first.batched.primary_tiles > 0);
  assert_eq!(first.batched.layer_tiles, 0);
  assert_eq!(first.tiles_rendered, first.batched.total());

  let second = orch.run_frame(Vec3::Y, &camera(), 0.1, &mut renderer);
  assert!(second.batched.layer_tiles > 0);
  assert_eq!(second.batched.primary_tiles, 0);
}

// ===== Batch 3: Steady state =====

#[test]
fn test_steady_state_is_idle() {
  let mut orch = orchestrator(RenderBudget::UNLIMITED);
  let mut renderer = RecordingRenderer::new();
  settle(&mut orch, Vec3::Y, &mut renderer);

  let report = orch.run_frame(Vec3::Y, &camera(), 1.0, &mut renderer);
  assert_eq!(report.current.tiles_requested, 0);
  assert_eq!(report.current.nodes_created, 0);
  assert_eq!(report.batched.total(), 0);
  assert_eq!(report.tiles_rendered, 0);
  assert!(!report.swapped);
  assert!(orch.cache().render_queue().is_empty());
  assert!(orch.cache().is_fade_in_finished(orch.current().id()));
}

#[test]
fn test_render_fills_indirection() {
  let mut orch = orchestrator(RenderBudget::UNLIMITED);
  let mut renderer = RecordingRenderer::new();
  settle(&mut orch, Vec3::Y, &mut renderer);

  let current = orch.current();
  assert!(!current.indexed_nodes().is_empty());
  assert!(!current.indirection(false).is_empty());
  assert!(!current.indirection(true).is_empty());
  assert!(current.lod_clamp().len() > 1);
}

#[test]
fn test_tile_cameras_follow_viewer() {
  let mut orch = orchestrator(RenderBudget::UNLIMITED);
  let mut renderer = RecordingRenderer::new();
  orch.run_frame(Vec3::Y, &camera(), 0.1, &mut renderer);

  // Tile cameras sit above the scene top, which tracks the viewer height.
  let top = camera().position.y + orch.config().scene_max_offset.y;
  for request in renderer.batches.iter().flatten() {
    assert!(request.camera.position.y >= top - 1e-3);
  }
}

// ===== Batch 4: Pre-render swap =====

#[test]
fn test_prerender_swaps_in() {
  let mut orch = orchestrator(fast_budget());
  let mut renderer = RecordingRenderer::new();
  settle(&mut orch, Vec3::Y, &mut renderer);
  let old = orch.current().id();

  let mut swapped_at = None;
  for frame in 0..5 {
    let report = orch.run_frame(ROTATED, &camera(), 1.0, &mut renderer);
    if report.swapped {
      swapped_at = Some(frame);
      break;
    }
  }

  assert!(swapped_at.is_some());
  assert_eq!(orch.swaps(), 1);
  assert!(orch.current().is_valid());
  assert_ne!(orch.current().id(), old);
  assert!(orch.current().light_dir().dot(ROTATED.normalize()) > 0.9999);
  assert!(!orch.is_prerendering());
}

#[test]
fn test_swap_releases_old_frustum() {
  let mut orch = orchestrator(fast_budget());
  let mut renderer = RecordingRenderer::new();
  settle(&mut orch, Vec3::Y, &mut renderer);
  let old = orch.current().id();

  for _ in 0..5 {
    if orch.run_frame(ROTATED, &camera(), 1.0, &mut renderer).swapped {
      break;
    }
  }

  assert!(orch.cache().frustum(old).is_none());
  assert!(
    orch
      .cache()
      .entries()
      .iter()
      .filter(|e| e.is_allocated())
      .all(|e| e.frustum_id() == orch.current().id())
  );
}

#[test]
fn test_swapped_frustum_finishes_deep_tiles() {
  let mut orch = orchestrator(fast_budget());
  let mut renderer = RecordingRenderer::new();
  settle(&mut orch, Vec3::Y, &mut renderer);
  settle(&mut orch, ROTATED, &mut renderer);
  assert_eq!(orch.swaps(), 1);

  settle(&mut orch, ROTATED, &mut renderer);
  assert_eq!(orch.swaps(), 1);
  assert!(orch.cache().render_queue().is_empty());
  assert_eq!(orch.current().tree().max_depth(), Some(orch.config().max_refinement));
  assert!(orch.current().is_ready_to_depth(orch.config().max_refinement, orch.cache()));
}

#[test]
fn test_no_swap_before_fade_in() {
  let mut orch = orchestrator(fast_budget());
  let mut renderer = RecordingRenderer::new();
  settle(&mut orch, Vec3::Y, &mut renderer);

  // Shallow pre-render tiles render in the first frame but stay mid-fade.
  let report = orch.run_frame(ROTATED, &camera(), 0.1, &mut renderer);
  assert!(report.batched.prerender_tiles > 0);
  assert!(!report.swapped);
  assert!(orch.is_prerendering());
  assert!(orch.prerender().is_ready_to_depth(1, orch.cache()));
}
