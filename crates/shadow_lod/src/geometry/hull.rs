//! ConvexHull2D - visible frustum footprint in light space.
//!
//! The viewer frustum (apex plus the far-plane corners at the shadow
//! distance) is projected onto the light-space xy plane and wrapped into a
//! counter-clockwise convex polygon. Refinement asks the hull whether a
//! candidate tile box can be seen at all.
//!
//! A hull with no vertices is *degenerate* (collinear or coincident input).
//! It never intersects anything, so a degenerate frustum blocks refinement.

use glam::Vec2;
use smallvec::SmallVec;

use super::{AABBox, LightBasis, ViewCamera};

/// Hull vertices never exceed the five frustum points; the inline capacity
/// also covers clipped polygons.
type Polygon = SmallVec<[Vec2; 12]>;

/// Convex polygon on the light-space xy plane, counter-clockwise.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvexHull2D {
	vertices: SmallVec<[Vec2; 8]>,
}

impl ConvexHull2D {
	/// Gift-wrap `points`. Returns an empty hull when fewer than three
	/// non-collinear points remain.
	pub fn from_points(points: &[Vec2]) -> Self {
		let mut hull = Self::default();
		if points.len() < 3 {
			return hull;
		}

		let start = (0..points.len())
			.min_by(|&a, &b| {
				let (pa, pb) = (points[a], points[b]);
				pa.x.total_cmp(&pb.x).then(pa.y.total_cmp(&pb.y))
			})
			.unwrap_or(0);

		let mut current = start;
		for _ in 0..=points.len() {
			hull.vertices.push(points[current]);
			let origin = points[current];

			let mut next = if current == 0 { 1 } else { 0 };
			for (i, &candidate) in points.iter().enumerate() {
				if i == current {
					continue;
				}
				let edge = points[next] - origin;
				let to_candidate = candidate - origin;
				let turn = edge.perp_dot(to_candidate);
				// Clockwise of the current edge, or collinear but farther.
				if turn < 0.0 || (turn == 0.0 && to_candidate.length_squared() > edge.length_squared()) {
					next = i;
				}
			}

			current = next;
			if current == start || points[current] == points[start] {
				break;
			}
		}

		if hull.vertices.len() < 3 || hull.area() <= f32::EPSILON {
			hull.vertices.clear();
		}
		hull
	}

	/// Footprint of `camera`'s frustum cut at `max_distance`, plus the
	/// refinement anchor (the camera position in light space).
	pub fn from_frustum(camera: &ViewCamera, max_distance: f32, basis: &LightBasis) -> (Self, Vec2) {
		let anchor = basis.project(camera.position);
		let mut points = [Vec2::ZERO; 5];
		points[0] = anchor;
		for (dst, corner) in points[1..].iter_mut().zip(camera.far_corners(max_distance)) {
			*dst = basis.project(corner);
		}
		(Self::from_points(&points), anchor)
	}

	#[inline]
	pub fn size(&self) -> usize {
		self.vertices.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.vertices.is_empty()
	}

	#[inline]
	pub fn vertices(&self) -> &[Vec2] {
		&self.vertices
	}

	/// Signed area, positive for counter-clockwise winding.
	pub fn area(&self) -> f32 {
		let n = self.vertices.len();
		(0..n)
			.map(|i| self.vertices[i].perp_dot(self.vertices[(i + 1) % n]))
			.sum::<f32>()
			* 0.5
	}

	/// Light-space bounds of the hull (`z == 0`).
	pub fn bounds(&self) -> AABBox {
		let mut bbox = AABBox::EMPTY;
		for v in &self.vertices {
			bbox.expand(v.extend(0.0));
		}
		bbox
	}

	/// Clip the hull against the four half-planes of `bbox`'s xy extent and
	/// report whether anything survives. Touching counts as intersecting.
	pub fn intersects_box(&self, bbox: &AABBox) -> bool {
		if self.vertices.is_empty() {
			return false;
		}

		let planes = [
			(Vec2::X, bbox.max.x),
			(Vec2::Y, bbox.max.y),
			(Vec2::NEG_X, -bbox.min.x),
			(Vec2::NEG_Y, -bbox.min.y),
		];

		let mut polygon: Polygon = self.vertices.iter().copied().collect();
		let mut clipped = Polygon::new();
		for (normal, d) in planes {
			clipped.clear();
			let inside = |p: Vec2| normal.dot(p) <= d;
			let n = polygon.len();
			for i in 0..n {
				let s = polygon[(i + n - 1) % n];
				let e = polygon[i];
				match (inside(s), inside(e)) {
					(true, true) => clipped.push(e),
					(true, false) => clipped.push(Self::crossing(s, e, normal, d)),
					(false, true) => {
						clipped.push(Self::crossing(s, e, normal, d));
						clipped.push(e);
					}
					(false, false) => {}
				}
			}
			if clipped.is_empty() {
				return false;
			}
			std::mem::swap(&mut polygon, &mut clipped);
		}
		true
	}

	#[inline]
	fn crossing(s: Vec2, e: Vec2, normal: Vec2, d: f32) -> Vec2 {
		let denom = normal.dot(e - s);
		if denom == 0.0 {
			return e;
		}
		let t = (d - normal.dot(s)) / denom;
		s + (e - s) * t
	}
}

#[cfg(test)]
#[path = "hull_test.rs"]
mod hull_test;
