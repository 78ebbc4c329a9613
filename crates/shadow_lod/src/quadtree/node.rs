//! QuadTreeNode - one square region of the light-space forest.

use crate::cache::TileId;
use crate::geometry::AABBox;

/// Generational reference to a node in a [`QuadTree`](super::QuadTree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle {
  key: u32,
  serial: u32,
}

impl NodeHandle {
  #[inline]
  pub(crate) fn new(key: usize, serial: u32) -> Self {
    Self {
      key: key as u32,
      serial,
    }
  }

  /// Arena slot. Reused once the node is removed.
  #[inline]
  pub fn key(&self) -> usize {
    self.key as usize
  }

  #[inline]
  pub fn serial(&self) -> u32 {
    self.serial
  }
}

/// Which of a node's two tile references an operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileSlot {
  /// The node's shadow tile.
  Primary,
  /// Secondary tile used to cross-fade between refinement levels.
  Layer,
}

impl TileSlot {
  #[inline]
  pub fn is_layer(self) -> bool {
    matches!(self, TileSlot::Layer)
  }
}

/// A square region of light space.
///
/// Tile references are weak: the cache may evict a tile out from under its
/// node, so holders revalidate them against the cache before use.
#[derive(Clone, Debug)]
pub struct QuadTreeNode {
  pub(crate) serial: u32,
  pub bbox: AABBox,
  pub parent: Option<NodeHandle>,
  pub children: [Option<NodeHandle>; 4],
  /// 0 at the root.
  pub depth: u8,
  /// Frame in which pruning last confirmed this node is needed.
  pub last_verified: u32,
  pub tile: Option<TileId>,
  pub layer_tile: Option<TileId>,
}

impl QuadTreeNode {
  pub(crate) fn new(serial: u32, bbox: AABBox, parent: Option<NodeHandle>, depth: u8) -> Self {
    Self {
      serial,
      bbox,
      parent,
      children: [None; 4],
      depth,
      last_verified: 0,
      tile: None,
      layer_tile: None,
    }
  }

  /// Quadrant `index` (bit 0 = upper x half, bit 1 = upper y half).
  pub fn child_bbox(&self, index: usize) -> AABBox {
    debug_assert!(index < 4);
    let half = self.bbox.size() * 0.5;
    let mut min = self.bbox.min;
    if index & 1 != 0 {
      min.x += half.x;
    }
    if index & 2 != 0 {
      min.y += half.y;
    }
    let mut max = min + half;
    max.z = self.bbox.max.z;
    AABBox::new(min, max)
  }

  #[inline]
  pub fn num_children(&self) -> usize {
    self.children.iter().flatten().count()
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.iter().all(Option::is_none)
  }

  #[inline]
  pub fn tile_in(&self, slot: TileSlot) -> Option<TileId> {
    match slot {
      TileSlot::Primary => self.tile,
      TileSlot::Layer => self.layer_tile,
    }
  }

  #[inline]
  pub fn tile_in_mut(&mut self, slot: TileSlot) -> &mut Option<TileId> {
    match slot {
      TileSlot::Primary => &mut self.tile,
      TileSlot::Layer => &mut self.layer_tile,
    }
  }

  /// Both tile references, primary first.
  pub fn tiles(&self) -> impl Iterator<Item = (TileSlot, TileId)> + '_ {
    [(TileSlot::Primary, self.tile), (TileSlot::Layer, self.layer_tile)]
      .into_iter()
      .filter_map(|(slot, tile)| tile.map(|t| (slot, t)))
  }
}
