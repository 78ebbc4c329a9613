//! IndexSet - dense membership set over tile slots.
//!
//! Members are stored densely for iteration; each slot remembers its
//! position, so insert, remove and lookup are O(1). Removal swaps the last
//! member into the hole, so iteration order is not insertion order.

use super::TileId;

const ABSENT: u32 = u32::MAX;

#[derive(Clone, Debug, Default)]
pub struct IndexSet {
  members: Vec<TileId>,
  positions: Vec<u32>,
}

impl IndexSet {
  /// Empty set able to hold slots `0..slots`.
  pub fn with_slots(slots: usize) -> Self {
    Self {
      members: Vec::with_capacity(slots),
      positions: vec![ABSENT; slots],
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.members.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }

  #[inline]
  pub fn contains(&self, id: TileId) -> bool {
    self.positions.get(id.index()).is_some_and(|&p| p != ABSENT)
  }

  /// Position of `id` in iteration order.
  #[inline]
  pub fn position(&self, id: TileId) -> Option<usize> {
    match self.positions.get(id.index()) {
      Some(&p) if p != ABSENT => Some(p as usize),
      _ => None,
    }
  }

  /// Add `id`. Returns false if it was already a member.
  pub fn insert(&mut self, id: TileId) -> bool {
    let index = id.index();
    if index >= self.positions.len() {
      self.positions.resize(index + 1, ABSENT);
    }
    if self.positions[index] != ABSENT {
      return false;
    }
    self.positions[index] = self.members.len() as u32;
    self.members.push(id);
    true
  }

  /// Remove `id`. Returns false if it was not a member.
  pub fn remove(&mut self, id: TileId) -> bool {
    let Some(pos) = self.position(id) else {
      return false;
    };
    self.members.swap_remove(pos);
    if let Some(&moved) = self.members.get(pos) {
      self.positions[moved.index()] = pos as u32;
    }
    self.positions[id.index()] = ABSENT;
    true
  }

  #[inline]
  pub fn get(&self, pos: usize) -> Option<TileId> {
    self.members.get(pos).copied()
  }

  #[inline]
  pub fn as_slice(&self) -> &[TileId] {
    &self.members
  }

  #[inline]
  pub fn iter(&self) -> impl DoubleEndedIterator<Item = TileId> + '_ {
    self.members.iter().copied()
  }

  pub fn clear(&mut self) {
    for id in self.members.drain(..) {
      self.positions[id.index()] = ABSENT;
    }
  }
}
