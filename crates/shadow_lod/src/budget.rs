//! Per-frame render throttle.
//!
//! However many tiles go stale at once, a frame only renders a bounded
//! batch. The rest stay queued and are picked up shallowest first on later
//! frames.

use crate::constants::MAX_REFINEMENT;

/// Rate limiting for tile rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderBudget {
	/// Maximum tiles rendered per frame across all bands (0 = unlimited).
	pub max_tiles_per_frame: usize,
	/// Deepest tiles the pre-render frustum renders. It may be swapped in
	/// once every node this shallow is rendered and faded in.
	pub prerender_max_depth: u8,
}

impl RenderBudget {
	/// Default budget with reasonable limits.
	pub const DEFAULT: Self = Self {
		max_tiles_per_frame: 4,
		prerender_max_depth: 1,
	};

	/// Unlimited budget for testing or offline use.
	pub const UNLIMITED: Self = Self {
		max_tiles_per_frame: 0,
		prerender_max_depth: MAX_REFINEMENT,
	};

	/// Check if another tile fits in this frame.
	#[inline]
	pub fn can_render(&self, rendered: usize) -> bool {
		self.max_tiles_per_frame == 0 || rendered < self.max_tiles_per_frame
	}
}

impl Default for RenderBudget {
	fn default() -> Self {
		Self::DEFAULT
	}
}

/// Tiles moved into one frame's render batch, per band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
	/// Primary tiles of the current frustum.
	pub primary_tiles: usize,
	/// Layer tiles of the current frustum.
	pub layer_tiles: usize,
	/// Primary tiles of the pre-render frustum.
	pub prerender_tiles: usize,
}

impl RenderStats {
	/// Total tiles batched.
	#[inline]
	pub fn total(&self) -> usize {
		self.primary_tiles + self.layer_tiles + self.prerender_tiles
	}
}
