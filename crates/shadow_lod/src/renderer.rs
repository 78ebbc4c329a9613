//! TileRenderer - the boundary to whatever rasterizes tiles.
//!
//! The core never touches a GPU. It hands over batches of
//! [`TileRenderRequest`]s and assumes the work is done (or at least queued)
//! when the call returns.

use crate::cache::{TileId, Viewport};
use crate::constants::DETAIL_MAP_DOWNSAMPLE_LEVEL;
use crate::frame::FrustumId;
use crate::geometry::{AABBox, TileCamera};

/// Everything a renderer needs to produce one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileRenderRequest {
  pub tile: TileId,
  pub frustum: FrustumId,
  /// Light-space region.
  pub bbox: AABBox,
  pub depth: u8,
  pub is_layer: bool,
  /// Destination rectangle in the depth atlas, border excluded.
  pub viewport: Viewport,
  pub camera: TileCamera,
  /// Reverse-Z depth offset to apply when copying into the atlas.
  pub depth_bias: f32,
}

impl TileRenderRequest {
  /// Destination of this tile's detail map in the detail-map atlas.
  pub fn detail_map_viewport(&self, tile_size: u32, border: u32) -> Viewport {
    let size = tile_size >> DETAIL_MAP_DOWNSAMPLE_LEVEL;
    Viewport {
      x: (self.viewport.x - border) >> DETAIL_MAP_DOWNSAMPLE_LEVEL,
      y: (self.viewport.y - border) >> DETAIL_MAP_DOWNSAMPLE_LEVEL,
      w: size,
      h: size,
    }
  }
}

/// Rasterization capability the core drives.
pub trait TileRenderer {
  /// Render depth for every request into its atlas viewport.
  fn render_batch(&mut self, requests: &[TileRenderRequest]);

  /// Build the downsampled detail map for every request.
  fn build_detail_map(&mut self, requests: &[TileRenderRequest]);
}

impl<R: TileRenderer + ?Sized> TileRenderer for &mut R {
  fn render_batch(&mut self, requests: &[TileRenderRequest]) {
    (**self).render_batch(requests)
  }

  fn build_detail_map(&mut self, requests: &[TileRenderRequest]) {
    (**self).build_detail_map(requests)
  }
}

/// Renderer that draws nothing and remembers what it was asked to do.
///
/// Useful headless and in tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
  pub batches: Vec<Vec<TileRenderRequest>>,
  pub detail_map_batches: Vec<Vec<TileRenderRequest>>,
}

impl RecordingRenderer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Total tiles rendered across all batches.
  pub fn tiles_rendered(&self) -> usize {
    self.batches.iter().map(Vec::len).sum()
  }

  pub fn detail_maps_built(&self) -> usize {
    self.detail_map_batches.iter().map(Vec::len).sum()
  }

  pub fn clear(&mut self) {
    self.batches.clear();
    self.detail_map_batches.clear();
  }
}

impl TileRenderer for RecordingRenderer {
  fn render_batch(&mut self, requests: &[TileRenderRequest]) {
    self.batches.push(requests.to_vec());
  }

  fn build_detail_map(&mut self, requests: &[TileRenderRequest]) {
    self.detail_map_batches.push(requests.to_vec());
  }
}
