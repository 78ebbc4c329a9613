//! QuadTree - slab arena owning every node of the forest.

use slab::Slab;

use super::node::{NodeHandle, QuadTreeNode, TileSlot};
use crate::cache::TileId;
use crate::geometry::AABBox;

/// Forest of 4-ary trees over the light-space plane.
///
/// The arena exclusively owns all nodes. Parent and child links are handles
/// into the same arena; roots are kept in an unordered list.
#[derive(Debug, Default)]
pub struct QuadTree {
  nodes: Slab<QuadTreeNode>,
  roots: Vec<NodeHandle>,
  next_serial: u32,
}

impl QuadTree {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of live nodes across all trees.
  #[inline]
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  #[inline]
  pub fn roots(&self) -> &[NodeHandle] {
    &self.roots
  }

  #[inline]
  pub fn get(&self, handle: NodeHandle) -> Option<&QuadTreeNode> {
    self
      .nodes
      .get(handle.key())
      .filter(|node| node.serial == handle.serial())
  }

  #[inline]
  pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut QuadTreeNode> {
    self
      .nodes
      .get_mut(handle.key())
      .filter(|node| node.serial == handle.serial())
  }

  #[inline]
  pub fn contains(&self, handle: NodeHandle) -> bool {
    self.get(handle).is_some()
  }

  /// Every live node, in arena order.
  pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &QuadTreeNode)> {
    self
      .nodes
      .iter()
      .map(|(key, node)| (NodeHandle::new(key, node.serial), node))
  }

  /// Root whose box equals `bbox`. Linear: there are only tens of roots.
  pub fn find_root(&self, bbox: &AABBox) -> Option<NodeHandle> {
    self
      .roots
      .iter()
      .copied()
      .find(|&h| self.get(h).is_some_and(|node| node.bbox == *bbox))
  }

  /// Insert a new root covering `bbox`.
  pub fn add_root(&mut self, bbox: AABBox) -> NodeHandle {
    let handle = self.insert(QuadTreeNode::new(0, bbox, None, 0));
    self.roots.push(handle);
    handle
  }

  /// Child `index` of `parent`, created on first request.
  ///
  /// Returns `None` only if `parent` is stale.
  pub fn add_child(&mut self, parent: NodeHandle, index: usize) -> Option<NodeHandle> {
    let node = self.get(parent)?;
    if let Some(existing) = node.children[index] {
      return Some(existing);
    }
    let child = QuadTreeNode::new(0, node.child_bbox(index), Some(parent), node.depth + 1);
    let handle = self.insert(child);
    if let Some(node) = self.get_mut(parent) {
      node.children[index] = Some(handle);
    }
    Some(handle)
  }

  /// Remove `handle` and its whole subtree, children first.
  ///
  /// `release` sees every tile reference the removed nodes held, so the
  /// caller can hand them back to the cache.
  pub fn remove<F>(&mut self, handle: NodeHandle, release: &mut F)
  where
    F: FnMut(NodeHandle, TileSlot, TileId),
  {
    let Some(node) = self.get(handle) else {
      return;
    };
    let children = node.children;
    for child in children.into_iter().flatten() {
      self.remove(child, release);
    }

    let node = self.nodes.remove(handle.key());
    for (slot, tile) in node.tiles() {
      release(handle, slot, tile);
    }

    match node.parent {
      Some(parent) => {
        if let Some(parent) = self.get_mut(parent) {
          for child in parent.children.iter_mut() {
            if *child == Some(handle) {
              *child = None;
            }
          }
        }
      }
      None => {
        if let Some(pos) = self.roots.iter().position(|&r| r == handle) {
          self.roots.swap_remove(pos);
        }
      }
    }
  }

  /// Remove every node.
  pub fn clear<F>(&mut self, release: &mut F)
  where
    F: FnMut(NodeHandle, TileSlot, TileId),
  {
    while let Some(&root) = self.roots.last() {
      self.remove(root, release);
    }
    debug_assert!(self.nodes.is_empty());
  }

  /// Handles of `root`'s subtree, children before parents.
  pub fn post_order(&self, root: NodeHandle) -> Vec<NodeHandle> {
    let mut out = Vec::new();
    self.collect_post_order(root, &mut out);
    out
  }

  fn collect_post_order(&self, handle: NodeHandle, out: &mut Vec<NodeHandle>) {
    let Some(node) = self.get(handle) else {
      return;
    };
    for child in node.children.into_iter().flatten() {
      self.collect_post_order(child, out);
    }
    out.push(handle);
  }

  /// Deepest node depth, or `None` when empty.
  pub fn max_depth(&self) -> Option<u8> {
    self.nodes.iter().map(|(_, node)| node.depth).max()
  }

  fn insert(&mut self, mut node: QuadTreeNode) -> NodeHandle {
    let serial = self.next_serial;
    self.next_serial = self.next_serial.wrapping_add(1);
    node.serial = serial;
    let key = self.nodes.insert(node);
    NodeHandle::new(key, serial)
  }
}

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
