//! ShadowOrchestrator - the per-frame driver.
//!
//! Holds two frustums over one shared tile cache:
//!
//! - **current**: the light direction being displayed.
//! - **pre-render**: started when the light has turned far enough, filled
//!   in the background with whatever budget the current frustum leaves, and
//!   swapped in once its coarse tiles are rendered and faded in.
//!
//! # Frame sequence
//!
//! ```text
//! begin_frame(light_dir, camera)   clock tick, frustum (re)start, create_tiles
//! prepare_render()                 fill the render batch within the budget
//! render(renderer)                 draw batch, build detail maps, indirection
//! end_frame(dt)                    fade-in, pre-render swap
//! ```
//!
//! [`ShadowOrchestrator::run_frame`] performs all four in order.

use glam::Vec3;
use web_time::Instant;

use crate::budget::{RenderBudget, RenderStats};
use crate::cache::TileCache;
use crate::config::ShadowConfig;
use crate::error::ConfigError;
use crate::frame::FrameClock;
use crate::frustum::{FrustumController, TileUpdate};
use crate::geometry::ViewCamera;
use crate::metrics::ShadowMetrics;
use crate::renderer::TileRenderer;

/// What one full frame did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
  pub current: TileUpdate,
  pub prerender: TileUpdate,
  pub batched: RenderStats,
  pub tiles_rendered: usize,
  pub detail_maps_built: usize,
  /// The pre-render frustum became current at the end of the frame.
  pub swapped: bool,
}

/// Drives both frustums and the shared cache through each frame.
#[derive(Debug)]
pub struct ShadowOrchestrator {
  config: ShadowConfig,
  budget: RenderBudget,
  clock: FrameClock,
  cache: TileCache,
  current: FrustumController,
  prerender: FrustumController,
  camera: Option<ViewCamera>,
  swaps: u64,
  metrics: ShadowMetrics,
}

impl ShadowOrchestrator {
  pub fn new(config: ShadowConfig) -> Result<Self, ConfigError> {
    Self::with_budget(config, RenderBudget::default())
  }

  pub fn with_budget(config: ShadowConfig, budget: RenderBudget) -> Result<Self, ConfigError> {
    let clock = FrameClock::new();
    let cache = TileCache::new(&config, &clock)?;
    let current = FrustumController::new(&config)?;
    let prerender = FrustumController::new(&config)?;
    tracing::debug!(slots = cache.len(), ?budget, "shadow orchestrator created");
    Ok(Self {
      config,
      budget,
      clock,
      cache,
      current,
      prerender,
      camera: None,
      swaps: 0,
      metrics: ShadowMetrics::new(),
    })
  }

  #[inline]
  pub fn config(&self) -> &ShadowConfig {
    &self.config
  }

  #[inline]
  pub fn budget(&self) -> RenderBudget {
    self.budget
  }

  pub fn set_budget(&mut self, budget: RenderBudget) {
    self.budget = budget;
  }

  #[inline]
  pub fn clock(&self) -> &FrameClock {
    &self.clock
  }

  #[inline]
  pub fn cache(&self) -> &TileCache {
    &self.cache
  }

  #[inline]
  pub fn current(&self) -> &FrustumController {
    &self.current
  }

  #[inline]
  pub fn prerender(&self) -> &FrustumController {
    &self.prerender
  }

  #[inline]
  pub fn metrics(&self) -> &ShadowMetrics {
    &self.metrics
  }

  /// Pre-render frustums swapped in so far.
  #[inline]
  pub fn swaps(&self) -> u64 {
    self.swaps
  }

  /// True while a pre-render frustum is being filled.
  #[inline]
  pub fn is_prerendering(&self) -> bool {
    self.prerender.is_valid()
  }

  /// Advance the clock, react to the light direction and refit both
  /// frustums to `camera`.
  ///
  /// The first frame sets the current frustum. Later, a light direction
  /// beyond the update threshold starts a pre-render frustum unless one is
  /// already in flight.
  #[cfg_attr(feature = "tracing-spans", tracing::instrument(skip_all, name = "shadow::begin_frame"))]
  pub fn begin_frame(&mut self, light_dir: Vec3, camera: &ViewCamera) -> (TileUpdate, TileUpdate) {
    self.clock.advance();
    self.camera = Some(*camera);

    if !self.current.is_valid() {
      self.current.set(light_dir, &mut self.cache, &mut self.clock);
    } else if self.current.is_light_dir_different(light_dir) && !self.prerender.is_valid() {
      self.prerender.set(light_dir, &mut self.cache, &mut self.clock);
      tracing::debug!(id = self.prerender.id().raw(), "pre-render started");
    }

    let start = Instant::now();
    let current = self.current.create_tiles(camera, &mut self.cache, &self.clock);
    let prerender = self.prerender.create_tiles(camera, &mut self.cache, &self.clock);
    self
      .metrics
      .record_create_tiles_timing(start.elapsed().as_micros() as u64);

    (current, prerender)
  }

  /// Move this frame's work into the render batch: current primary tiles,
  /// then current layer tiles, then shallow pre-render tiles, all sharing
  /// one budget.
  #[cfg_attr(feature = "tracing-spans", tracing::instrument(skip_all, name = "shadow::prepare_render"))]
  pub fn prepare_render(&mut self) -> RenderStats {
    let mut stats = RenderStats::default();
    let budget = self.budget;
    let max_refinement = self.config.max_refinement;

    let current = self.current.id();
    while budget.can_render(stats.total())
      && self
        .cache
        .add_tile_from_render_queue_to_render_batch(current, max_refinement, false)
        .is_some()
    {
      stats.primary_tiles += 1;
    }
    while budget.can_render(stats.total())
      && self
        .cache
        .add_tile_from_render_queue_to_render_batch(current, max_refinement, true)
        .is_some()
    {
      stats.layer_tiles += 1;
    }

    if self.prerender.is_valid() {
      let prerender = self.prerender.id();
      while budget.can_render(stats.total())
        && self
          .cache
          .add_tile_from_render_queue_to_render_batch(prerender, budget.prerender_max_depth, false)
          .is_some()
      {
        stats.prerender_tiles += 1;
      }
    }

    if stats.total() > 0 {
      tracing::trace!(
        primary = stats.primary_tiles,
        layer = stats.layer_tiles,
        prerender = stats.prerender_tiles,
        "render batch prepared"
      );
    }
    stats
  }

  /// Hand the batch and detail-map queue to `renderer`, then rebuild the
  /// indirection data of both frustums. Returns `(tiles, detail_maps)`.
  #[cfg_attr(feature = "tracing-spans", tracing::instrument(skip_all, name = "shadow::render"))]
  pub fn render<R>(&mut self, renderer: &mut R) -> (usize, usize)
  where
    R: TileRenderer + ?Sized,
  {
    let world_center = self.camera.map_or(Vec3::ZERO, |c| c.position);
    let tiles = self.cache.render_tiles_batch(renderer, world_center);
    let detail_maps = self.cache.build_detail_maps(renderer);
    self.metrics.record_batch(tiles);

    let layers = self.config.uses_layers();
    for frustum in [&mut self.current, &mut self.prerender] {
      if !frustum.is_valid() {
        continue;
      }
      frustum.find_indexed_nodes(&self.cache);
      frustum.fill_indirection(&self.cache, false);
      if layers {
        frustum.fill_indirection(&self.cache, true);
      }
      frustum.fill_lod_clamp(&self.cache);
    }
    (tiles, detail_maps)
  }

  /// Advance fade-in by `dt` seconds and swap in the pre-render frustum once
  /// it is complete. Returns whether a swap happened.
  pub fn end_frame(&mut self, dt: f32) -> bool {
    self.cache.tick(dt);

    let swapped = self.prerender.is_valid() && self.is_prerender_complete();
    if swapped {
      std::mem::swap(&mut self.current, &mut self.prerender);
      self.prerender.reset(&mut self.cache, &self.clock);
      self.swaps += 1;
      self.metrics.record_swap();
      tracing::debug!(
        id = self.current.id().raw(),
        frame = self.clock.frame(),
        "pre-render frustum swapped in"
      );
    }

    self.metrics.update_from_cache(&self.cache);
    swapped
  }

  /// Shallow levels rendered, nothing shallow still queued, fade-in done.
  fn is_prerender_complete(&self) -> bool {
    let id = self.prerender.id();
    let depth = self.budget.prerender_max_depth;
    self.prerender.is_ready_to_depth(depth, &self.cache)
      && !self.cache.has_pending_work(id, depth)
      && self.cache.is_fade_in_finished(id)
  }

  /// One full frame: begin, prepare, render, end.
  pub fn run_frame<R>(&mut self, light_dir: Vec3, camera: &ViewCamera, dt: f32, renderer: &mut R) -> FrameReport
  where
    R: TileRenderer + ?Sized,
  {
    let (current, prerender) = self.begin_frame(light_dir, camera);
    let batched = self.prepare_render();
    let (tiles_rendered, detail_maps_built) = self.render(renderer);
    let swapped = self.end_frame(dt);
    FrameReport {
      current,
      prerender,
      batched,
      tiles_rendered,
      detail_maps_built,
      swapped,
    }
  }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod orchestrator_test;
