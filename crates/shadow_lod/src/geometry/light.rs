//! LightBasis - rotation between world space and light space.

use glam::{Mat4, Vec2, Vec3};

use crate::constants::LIGHT_DIR_UPDATE_THRESHOLD;

/// World ↔ light-space rotation for one light direction.
///
/// `dir` points from the scene toward the light. Light-space `z` of a world
/// point is `dot(point, dir)`; x and y span the plane perpendicular to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightBasis {
  dir: Vec3,
  up: Vec3,
  world_to_light: Mat4,
  light_to_world: Mat4,
}

impl LightBasis {
  /// Build the basis for a light direction. A zero vector falls back to `+Y`.
  pub fn new(dir: Vec3) -> Self {
    let dir = dir.normalize_or_zero();
    let dir = if dir == Vec3::ZERO { Vec3::Y } else { dir };
    let up = Self::up_for(dir);
    let world_to_light = Mat4::look_to_rh(Vec3::ZERO, -dir, up);
    Self {
      dir,
      up,
      world_to_light,
      light_to_world: world_to_light.inverse(),
    }
  }

  /// Up vector used for every view looking along this light.
  #[inline]
  pub fn up_for(dir: Vec3) -> Vec3 {
    if dir.y.abs() > 0.99 {
      Vec3::Z
    } else {
      Vec3::Y
    }
  }

  /// Unit direction toward the light.
  #[inline]
  pub fn dir(&self) -> Vec3 {
    self.dir
  }

  /// Up vector of light-space views.
  #[inline]
  pub fn up(&self) -> Vec3 {
    self.up
  }

  #[inline]
  pub fn world_to_light(&self) -> Mat4 {
    self.world_to_light
  }

  #[inline]
  pub fn light_to_world(&self) -> Mat4 {
    self.light_to_world
  }

  /// Transform a world point into light space.
  #[inline]
  pub fn to_light(&self, world: Vec3) -> Vec3 {
    self.world_to_light.transform_point3(world)
  }

  /// Transform a light-space point back into world space.
  #[inline]
  pub fn to_world(&self, light: Vec3) -> Vec3 {
    self.light_to_world.transform_point3(light)
  }

  /// Project a world point onto the light-space xy plane.
  #[inline]
  pub fn project(&self, world: Vec3) -> Vec2 {
    self.to_light(world).truncate()
  }

  /// True when `dir` deviates enough from this basis to warrant a new one.
  #[inline]
  pub fn is_different(&self, dir: Vec3, threshold: f32) -> bool {
    self.dir.dot(dir.normalize_or_zero()) < threshold
  }

  /// [`LightBasis::is_different`] with the default threshold.
  #[inline]
  pub fn is_different_default(&self, dir: Vec3) -> bool {
    self.is_different(dir, LIGHT_DIR_UPDATE_THRESHOLD)
  }
}

impl Default for LightBasis {
  fn default() -> Self {
    Self::new(Vec3::Y)
  }
}
