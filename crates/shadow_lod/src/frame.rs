//! FrameClock - frame counter and frustum generation ids.
//!
//! Both used to be process-wide counters. Here they belong to whoever drives
//! the frame loop (normally the orchestrator) and are passed by reference.

/// Identity of one frustum incarnation.
///
/// Ids are odd and strictly increasing; `0` means "no frustum". A tile
/// remembers the id it was rendered for, so a tile from an earlier
/// incarnation never matches a newer one even if the boxes coincide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct FrustumId(u32);

impl FrustumId {
  pub const INVALID: Self = Self(0);

  #[inline]
  pub fn is_valid(&self) -> bool {
    self.0 != 0
  }

  /// Get the raw id value.
  #[inline]
  pub fn raw(&self) -> u32 {
    self.0
  }
}

/// Monotonic frame stamp plus the frustum id generator.
#[derive(Clone, Debug)]
pub struct FrameClock {
  frame: u32,
  next_frustum_id: u32,
}

impl FrameClock {
  pub fn new() -> Self {
    Self {
      frame: 0,
      next_frustum_id: 1,
    }
  }

  /// Current frame stamp.
  #[inline]
  pub fn frame(&self) -> u32 {
    self.frame
  }

  /// Advance to the next frame and return its stamp. Wraps on overflow;
  /// stamps are only ever compared by wrapping difference.
  #[inline]
  pub fn advance(&mut self) -> u32 {
    self.frame = self.frame.wrapping_add(1);
    self.frame
  }

  /// Issue a fresh frustum id.
  pub fn next_frustum_id(&mut self) -> FrustumId {
    let id = FrustumId(self.next_frustum_id);
    self.next_frustum_id = self.next_frustum_id.wrapping_add(2);
    if self.next_frustum_id == 0 {
      self.next_frustum_id = 1;
    }
    id
  }

  /// Frames elapsed since `stamp`.
  #[inline]
  pub fn frames_since(&self, stamp: u32) -> u32 {
    self.frame.wrapping_sub(stamp)
  }
}

impl Default for FrameClock {
  fn default() -> Self {
    Self::new()
  }
}
