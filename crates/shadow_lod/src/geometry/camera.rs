//! Cameras: the perspective viewer whose frustum drives refinement, and the
//! orthographic cameras tiles are rendered from.

use glam::{Mat4, Vec3};

use super::{AABBox, LightBasis};
use crate::constants::{DEPTH_BIAS_KERNEL, DEPTH_BITS};

/// Perspective viewer description. Only what refinement needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewCamera {
  pub position: Vec3,
  /// Unit view direction.
  pub forward: Vec3,
  pub up: Vec3,
  /// Vertical field of view in radians.
  pub fov_y: f32,
  /// Width / height.
  pub aspect: f32,
}

impl ViewCamera {
  pub fn new(position: Vec3, forward: Vec3, fov_y: f32, aspect: f32) -> Self {
    Self {
      position,
      forward: forward.normalize_or_zero(),
      up: Vec3::Y,
      fov_y,
      aspect,
    }
  }

  pub fn looking_at(position: Vec3, target: Vec3, fov_y: f32, aspect: f32) -> Self {
    Self::new(position, target - position, fov_y, aspect)
  }

  pub fn with_up(mut self, up: Vec3) -> Self {
    self.up = up;
    self
  }

  /// The four corners of the view frustum cut at `distance` along `forward`.
  pub fn far_corners(&self, distance: f32) -> [Vec3; 4] {
    let right = self.forward.cross(self.up).normalize_or_zero();
    let right = if right == Vec3::ZERO {
      self.forward.any_orthonormal_vector()
    } else {
      right
    };
    let up = right.cross(self.forward);

    let half_h = distance * (0.5 * self.fov_y).tan();
    let half_w = half_h * self.aspect;
    let center = self.position + self.forward * distance;

    [
      center - right * half_w - up * half_h,
      center + right * half_w - up * half_h,
      center + right * half_w + up * half_h,
      center - right * half_w + up * half_h,
    ]
  }
}

/// Orthographic camera rendering one light-space region.
///
/// Projection is reverse-Z: the near plane maps to depth 1 and `far_plane`
/// to depth 0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileCamera {
  pub position: Vec3,
  pub view: Mat4,
  pub projection: Mat4,
}

impl TileCamera {
  /// Camera at `position` looking along `-light_dir`, covering `region`
  /// (light space) scaled by `viewport_scale`.
  pub fn at(
    position: Vec3,
    region: &AABBox,
    basis: &LightBasis,
    viewport_scale: f32,
    far_plane: f32,
  ) -> Self {
    let view = Mat4::look_to_rh(position, -basis.dir(), basis.up());
    let size = region.size();
    let hw = 0.5 * size.x * viewport_scale;
    let hh = 0.5 * size.y * viewport_scale;
    let projection = Mat4::orthographic_rh(-hw, hw, -hh, hh, far_plane, 0.0);
    Self {
      position,
      view,
      projection,
    }
  }

  /// Camera for a tile region, placed on the light side of the scene bounds
  /// and pulled back inside them.
  pub fn for_region(
    region: &AABBox,
    basis: &LightBasis,
    scene_bounds: &AABBox,
    viewport_scale: f32,
    far_plane: f32,
  ) -> Self {
    let dir = basis.dir();
    let height = scene_bounds
      .corners()
      .iter()
      .map(|c| c.dot(dir))
      .fold(f32::MIN, f32::max);

    let center = region.center();
    let position = basis.to_world(Vec3::new(center.x, center.y, 0.0)) + height * dir;

    // Slide back along the light direction until inside each slab the
    // camera has left in the direction of travel.
    let mut pull_back = 0.0f32;
    for axis in 0..3 {
      for (sign, bound) in [(-1.0f32, scene_bounds.max[axis]), (1.0, -scene_bounds.min[axis])] {
        let outside = sign * position[axis] + bound;
        let along = sign * dir[axis];
        if outside <= 0.0 && along < 0.0 {
          pull_back = pull_back.max(outside / along);
        }
      }
    }

    Self::at(position - pull_back * dir, region, basis, viewport_scale, far_plane)
  }

  #[inline]
  pub fn view_projection(&self) -> Mat4 {
    self.projection * self.view
  }

  /// Depth offset (reverse-Z, so negative) that hides self-shadowing
  /// within the filter kernel for a `width × height` render target.
  pub fn depth_bias(&self, width: u32, height: u32) -> f32 {
    let p = &self.projection;
    let texel = Vec3::new(
      (2.0 / (p.x_axis.x * width as f32)).abs(),
      (2.0 / (p.y_axis.y * height as f32)).abs(),
      (1.0 / (p.z_axis.z * (1u32 << DEPTH_BITS) as f32)).abs(),
    );
    let kernel = texel * Vec3::from_array(DEPTH_BIAS_KERNEL);
    -kernel.max_element() * p.z_axis.z.abs()
  }
}
