//! Axis-aligned bounding box used for tile regions and culling.

use glam::Vec3;

/// Single-precision axis-aligned bounding box.
///
/// Quadtree regions live in light space with `z == 0`; the same type is used
/// for world-space scene bounds. An empty box uses `+inf`/`-inf` sentinels so
/// that the first `expand` call snaps it onto the added point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABBox {
	/// Minimum corner (inclusive).
	pub min: Vec3,
	/// Maximum corner (inclusive).
	pub max: Vec3,
}

impl AABBox {
	/// The empty box: `min = +inf`, `max = -inf`.
	pub const EMPTY: Self = Self {
		min: Vec3::splat(f32::INFINITY),
		max: Vec3::splat(f32::NEG_INFINITY),
	};

	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: Vec3, max: Vec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Create a new AABB from center and half-extents.
	pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
		Self {
			min: center - half_extents,
			max: center + half_extents,
		}
	}

	/// Square light-space region `[min, min + size]` on the `z == 0` plane.
	pub fn square(min_x: f32, min_y: f32, size: f32) -> Self {
		Self::new(
			Vec3::new(min_x, min_y, 0.0),
			Vec3::new(min_x + size, min_y + size, 0.0),
		)
	}

	/// True if no point has been added yet.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
	}

	/// Grow to include `point`.
	#[inline]
	pub fn expand(&mut self, point: Vec3) {
		self.min = self.min.min(point);
		self.max = self.max.max(point);
	}

	/// Grow to include `other`. Empty boxes are ignored.
	#[inline]
	pub fn expand_box(&mut self, other: &AABBox) {
		if other.is_empty() {
			return;
		}
		self.min = self.min.min(other.min);
		self.max = self.max.max(other.max);
	}

	/// Check if this AABB overlaps with another.
	///
	/// Two AABBs overlap if they share any interior or boundary points.
	#[inline]
	pub fn intersects(&self, other: &AABBox) -> bool {
		self.min.x <= other.max.x
			&& self.max.x >= other.min.x
			&& self.min.y <= other.max.y
			&& self.max.y >= other.min.y
			&& self.min.z <= other.max.z
			&& self.max.z >= other.min.z
	}

	/// Check if this AABB contains a point.
	#[inline]
	pub fn contains_point(&self, point: Vec3) -> bool {
		point.x >= self.min.x
			&& point.x <= self.max.x
			&& point.y >= self.min.y
			&& point.y <= self.max.y
			&& point.z >= self.min.z
			&& point.z <= self.max.z
	}

	/// Get the size of the AABB (max - min).
	#[inline]
	pub fn size(&self) -> Vec3 {
		self.max - self.min
	}

	/// Get the center of the AABB.
	#[inline]
	pub fn center(&self) -> Vec3 {
		(self.min + self.max) * 0.5
	}

	/// Half of `size()`.
	#[inline]
	pub fn extent(&self) -> Vec3 {
		self.size() * 0.5
	}

	/// Snap `min` down and `max` up to multiples of `alignment` on x and y.
	///
	/// Regions aligned this way line up with the root grid across frames.
	/// `z` is left untouched (light-space regions are flat).
	pub fn align_to(&mut self, alignment: f32) {
		debug_assert!(alignment > 0.0, "alignment must be positive");
		self.min.x = (self.min.x / alignment).floor() * alignment;
		self.min.y = (self.min.y / alignment).floor() * alignment;
		self.max.x = (self.max.x / alignment).ceil() * alignment;
		self.max.y = (self.max.y / alignment).ceil() * alignment;
	}

	/// Copy of `self` aligned with [`AABBox::align_to`].
	pub fn aligned(mut self, alignment: f32) -> Self {
		self.align_to(alignment);
		self
	}

	/// The eight corners, bit `i` of the index selecting max on axis `i`.
	pub fn corners(&self) -> [Vec3; 8] {
		std::array::from_fn(|i| {
			Vec3::new(
				if i & 1 != 0 { self.max.x } else { self.min.x },
				if i & 2 != 0 { self.max.y } else { self.min.y },
				if i & 4 != 0 { self.max.z } else { self.min.z },
			)
		})
	}
}

impl Default for AABBox {
	fn default() -> Self {
		Self::EMPTY
	}
}
