//! TileCacheEntry - one fixed slot of the shadow atlas.

use glam::UVec4;

use crate::frame::FrustumId;
use crate::geometry::{AABBox, TileCamera};
use crate::quadtree::{NodeHandle, TileSlot};

/// Index of a slot in the cache's fixed pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(u32);

impl TileId {
  #[inline]
  pub fn new(index: usize) -> Self {
    Self(index as u32)
  }

  #[inline]
  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

/// Texel rectangle of a slot inside the atlas, border excluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
  pub x: u32,
  pub y: u32,
  pub w: u32,
  pub h: u32,
}

impl Viewport {
  /// Rectangle grown by `border` texels on each side, as
  /// `(x0, y0, x1, y1)` with exclusive max.
  pub fn rect_with_border(&self, border: u32) -> UVec4 {
    UVec4::new(
      self.x - border,
      self.y - border,
      self.x + self.w + border,
      self.y + self.h + border,
    )
  }
}

/// The node slot a tile is currently bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileOwner {
  pub frustum: FrustumId,
  pub node: NodeHandle,
  pub slot: TileSlot,
}

/// One slot of the pool.
///
/// The viewport never changes. Everything else describes the content
/// currently held in the slot, which outlives the binding: a freed slot
/// keeps its identity until reused, so an identical request can pick the
/// content up again without re-rendering.
#[derive(Clone, Debug)]
pub struct TileCacheEntry {
  pub(crate) viewport: Viewport,
  pub(crate) owner: Option<TileOwner>,
  pub(crate) frustum_id: FrustumId,
  pub(crate) bbox: AABBox,
  pub(crate) depth: u8,
  pub(crate) last_used: u32,
  pub(crate) is_layer: bool,
  pub(crate) fade_in: f32,
  pub(crate) camera: Option<TileCamera>,
}

impl TileCacheEntry {
  pub(crate) fn new(viewport: Viewport, frame: u32) -> Self {
    let mut entry = Self {
      viewport,
      owner: None,
      frustum_id: FrustumId::INVALID,
      bbox: AABBox::EMPTY,
      depth: 0,
      last_used: 0,
      is_layer: false,
      fade_in: 0.0,
      camera: None,
    };
    entry.invalidate(frame);
    entry
  }

  #[inline]
  pub fn viewport(&self) -> Viewport {
    self.viewport
  }

  #[inline]
  pub fn owner(&self) -> Option<TileOwner> {
    self.owner
  }

  #[inline]
  pub fn is_allocated(&self) -> bool {
    self.owner.is_some()
  }

  /// Frustum the content was rendered for.
  #[inline]
  pub fn frustum_id(&self) -> FrustumId {
    self.frustum_id
  }

  /// Light-space region the content covers.
  #[inline]
  pub fn bbox(&self) -> &AABBox {
    &self.bbox
  }

  #[inline]
  pub fn depth(&self) -> u8 {
    self.depth
  }

  #[inline]
  pub fn last_used(&self) -> u32 {
    self.last_used
  }

  #[inline]
  pub fn is_layer(&self) -> bool {
    self.is_layer
  }

  /// Remaining fade-in seconds; 0 once fully blended in.
  #[inline]
  pub fn fade_in(&self) -> f32 {
    self.fade_in
  }

  /// Camera the content was last rendered from.
  #[inline]
  pub fn camera(&self) -> Option<&TileCamera> {
    self.camera.as_ref()
  }

  /// True if the held content is exactly what the request describes.
  #[inline]
  pub fn holds(&self, frustum: FrustumId, bbox: &AABBox, is_layer: bool) -> bool {
    self.frustum_id == frustum && self.bbox == *bbox && self.is_layer == is_layer
  }

  /// Forget the content. Invalid slots sort as least recently used.
  pub(crate) fn invalidate(&mut self, frame: u32) {
    self.bbox = AABBox::EMPTY;
    self.depth = crate::constants::MAX_REFINEMENT;
    self.last_used = frame.wrapping_sub(crate::constants::INVALID_LAST_USED_OFFSET);
    self.frustum_id = FrustumId::INVALID;
    self.camera = None;
  }
}
