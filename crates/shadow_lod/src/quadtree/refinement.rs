//! Refinement - grow the forest toward the viewer, prune what it left.
//!
//! A node exists while its [`RefinementPolicy`] says it should. Growth is
//! top-down ([`refine_node`]); pruning is bottom-up ([`QuadTree::prune`]) so
//! a child that is still needed can vouch for its parent in the same pass.

use glam::Vec2;

use super::{NodeHandle, QuadTree, TileSlot};
use crate::cache::TileId;
use crate::geometry::{AABBox, ConvexHull2D};

/// Decides whether a region at a given depth deserves a node.
pub trait RefinementPolicy {
  fn should_exist(&self, bbox: &AABBox, depth: u8) -> bool;
}

impl<F> RefinementPolicy for F
where
  F: Fn(&AABBox, u8) -> bool,
{
  #[inline]
  fn should_exist(&self, bbox: &AABBox, depth: u8) -> bool {
    self(bbox, depth)
  }
}

/// Squared distance from the box center to `point` on the light-space plane.
#[inline]
pub fn refinement_distance_sq(bbox: &AABBox, point: Vec2) -> f32 {
  bbox.center().truncate().distance_squared(point)
}

/// Distance-and-visibility policy driving a frustum's quadtree.
///
/// `thresholds[depth]` is a squared radius around the anchor. A negative
/// entry compares by magnitude and skips the hull test.
#[derive(Clone, Copy, Debug)]
pub struct FrustumRefinement<'a> {
  pub anchor: Vec2,
  pub thresholds: &'a [f32],
  pub hull: &'a ConvexHull2D,
}

impl RefinementPolicy for FrustumRefinement<'_> {
  fn should_exist(&self, bbox: &AABBox, depth: u8) -> bool {
    let Some(&threshold) = self.thresholds.get(depth as usize) else {
      return false;
    };
    refinement_distance_sq(bbox, self.anchor) < threshold.abs()
      && (threshold < 0.0 || self.hull.intersects_box(bbox))
  }
}

/// Grow `node`'s subtree down to `max_refinement`.
///
/// Missing children are created when the policy accepts them; existing
/// children are always descended into. Returns the number of nodes created.
pub fn refine_node<P>(tree: &mut QuadTree, node: NodeHandle, max_refinement: u8, policy: &P) -> usize
where
  P: RefinementPolicy + ?Sized,
{
  let Some(parent) = tree.get(node) else {
    return 0;
  };
  if parent.depth >= max_refinement {
    return 0;
  }

  let depth = parent.depth + 1;
  let mut created = 0;
  for index in 0..4 {
    let Some(parent) = tree.get(node) else {
      break;
    };
    let existing = parent.children[index];
    let child_bbox = parent.child_bbox(index);
    let child = match existing {
      Some(child) => child,
      None => {
        if !policy.should_exist(&child_bbox, depth) {
          continue;
        }
        created += 1;
        match tree.add_child(node, index) {
          Some(child) => child,
          None => continue,
        }
      }
    };
    created += refine_node(tree, child, max_refinement, policy);
  }
  created
}

impl QuadTree {
  /// Verify `node`'s subtree for `frame`, removing nodes the policy rejects.
  ///
  /// Children are visited first; a surviving node stamps its parent as
  /// verified so the parent is kept without re-evaluation. Released tile
  /// references are reported through `release`.
  pub fn prune<P, F>(&mut self, node: NodeHandle, frame: u32, policy: &P, release: &mut F) -> usize
  where
    P: RefinementPolicy + ?Sized,
    F: FnMut(NodeHandle, TileSlot, TileId),
  {
    let Some(current) = self.get(node) else {
      return 0;
    };
    let mut removed = 0;
    for child in current.children.into_iter().flatten() {
      removed += self.prune(child, frame, policy, release);
    }

    let Some(current) = self.get_mut(node) else {
      return removed;
    };
    if current.last_verified == frame {
      return removed;
    }
    current.last_verified = frame;

    if policy.should_exist(&current.bbox, current.depth) {
      let parent = current.parent;
      if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
        parent.last_verified = frame;
      }
      return removed;
    }

    let subtree = self.post_order(node).len();
    self.remove(node, release);
    removed + subtree
  }

  /// Prune every root, last root first.
  pub fn prune_all<P, F>(&mut self, frame: u32, policy: &P, release: &mut F) -> usize
  where
    P: RefinementPolicy + ?Sized,
    F: FnMut(NodeHandle, TileSlot, TileId),
  {
    let mut removed = 0;
    for i in (0..self.roots().len()).rev() {
      if let Some(&root) = self.roots().get(i) {
        removed += self.prune(root, frame, policy, release);
      }
    }
    removed
  }
}

#[cfg(test)]
#[path = "refinement_test.rs"]
mod refinement_test;
