//! Indirection records - how a shader finds the atlas texels for a point.
//!
//! The indexed region is a square of light space viewed by one orthographic
//! "index" camera. The indirection texture covers that square at
//! `(1 << max_refinement) * index_size` texels per edge; each record fills
//! the texel rectangle of one tile with an affine map from index-camera
//! coordinates to the tile's atlas viewport.

use glam::{Mat4, UVec2, Vec3};

use crate::cache::Viewport;
use crate::constants::MAX_REFINEMENT;
use crate::geometry::{AABBox, LightBasis, TileCamera};

/// Texel rectangle inside the indirection texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexRect {
  pub x: i32,
  pub y: i32,
  pub w: i32,
  pub h: i32,
}

/// One tile's entry in the indirection texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndirectionQuad {
  /// Mip of the indirection texture the record belongs to
  /// (`max_refinement - depth`).
  pub mip: u8,
  pub rect: IndexRect,
  /// Index space → atlas offset; the scale follows from `scale_factor`.
  pub offset: Vec3,
  /// Integer part: texel density of the tile's depth. Fractional part:
  /// remaining fade-in. Negative when a primary tile stands in for a
  /// missing layer tile.
  pub scale_factor: f32,
}

/// Highest usable detail over a region, normalized by [`MAX_REFINEMENT`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodClampQuad {
  pub rect: IndexRect,
  pub value: f32,
}

/// Records produced by one indirection pass.
#[derive(Clone, Debug, Default)]
pub struct IndirectionData {
  quads: Vec<IndirectionQuad>,
  quads_per_mip: [usize; MAX_REFINEMENT as usize + 1],
}

impl IndirectionData {
  pub fn clear(&mut self) {
    self.quads.clear();
    self.quads_per_mip = Default::default();
  }

  pub(crate) fn push(&mut self, quad: IndirectionQuad) {
    self.quads_per_mip[quad.mip as usize] += 1;
    self.quads.push(quad);
  }

  #[inline]
  pub fn quads(&self) -> &[IndirectionQuad] {
    &self.quads
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.quads.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.quads.is_empty()
  }

  #[inline]
  pub fn count_for_mip(&self, mip: u8) -> usize {
    self.quads_per_mip.get(mip as usize).copied().unwrap_or(0)
  }

  /// Records of one mip. Passes emit coarse mips first, so each mip is a
  /// contiguous run.
  pub fn quads_for_mip(&self, mip: u8) -> &[IndirectionQuad] {
    let Some(&count) = self.quads_per_mip.get(mip as usize) else {
      return &[];
    };
    let start: usize = self.quads_per_mip[mip as usize + 1..].iter().sum();
    &self.quads[start..start + count]
  }
}

/// Where an indexed tile lands and how to reach its texels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileMapping {
  pub rect: IndexRect,
  pub offset: Vec3,
  pub scale: Vec3,
  pub scale_factor: f32,
}

/// The index camera and the fixed sizes needed to map tiles under it.
#[derive(Clone, Copy, Debug)]
pub struct IndexProjection {
  /// Light-space square covered by the indirection texture.
  pub bbox: AABBox,
  /// World position of the index camera.
  pub camera_pos: Vec3,
  pub basis: LightBasis,
  pub far_plane: f32,
  /// Indirection texture edge in texels.
  pub texture_size: u32,
  pub atlas_size: UVec2,
  pub borderless_tile_size: u32,
  pub index_size: u32,
}

impl IndexProjection {
  /// Light-space point to index texture coordinates; `z` is depth along the
  /// light relative to the far plane.
  pub fn project(&self, point: Vec3, camera_offset: Vec3) -> Vec3 {
    let size = self.bbox.size();
    Vec3::new(
      (point.x - self.bbox.min.x) / size.x,
      1.0 - (point.y - self.bbox.min.y) / size.y,
      -self.basis.dir().dot(self.basis.to_world(point) + camera_offset) / self.far_plane,
    )
  }

  /// Texel rectangle covered by a light-space box. Edges shrink by a
  /// quarter texel before truncation so neighbours never overlap.
  pub fn dest_rect(&self, bbox: &AABBox) -> IndexRect {
    let min = self.project(bbox.min, Vec3::ZERO);
    let max = self.project(bbox.max, Vec3::ZERO);
    self.rect_between(min, max)
  }

  fn rect_between(&self, index_min: Vec3, index_max: Vec3) -> IndexRect {
    let s = self.texture_size as f32;
    let x0 = (index_min.x * s + 0.25) as i32;
    let y0 = (index_max.y * s + 0.25) as i32;
    let x1 = (index_max.x * s - 0.25) as i32;
    let y1 = (index_min.y * s - 0.25) as i32;
    IndexRect {
      x: x0,
      y: y0,
      w: x1 - x0 + 1,
      h: y1 - y0 + 1,
    }
  }

  /// Affine map from index space to a tile's atlas viewport.
  pub fn map_tile(&self, bbox: &AABBox, depth: u8, viewport: Viewport, tile_camera_pos: Vec3) -> TileMapping {
    let camera_offset = tile_camera_pos - self.camera_pos;
    let index_min = self.project(bbox.min, camera_offset);
    let index_max = self.project(bbox.max, camera_offset);

    // Tile space runs (0, 1) → (1, 0): v is flipped against index space.
    let tile_min = Vec3::new(0.0, 1.0, 0.0);
    let tile_max = Vec3::new(1.0, 0.0, 0.0);
    let scale1 = Vec3::new(
      (tile_max.x - tile_min.x) / (index_max.x - index_min.x),
      (tile_max.y - tile_min.y) / (index_max.y - index_min.y),
      1.0,
    );
    let offset1 = tile_min - index_min * scale1;

    let inv_atlas = Vec3::new(1.0 / self.atlas_size.x as f32, 1.0 / self.atlas_size.y as f32, 1.0);
    let scale2 = Vec3::new(viewport.w as f32, viewport.h as f32, 1.0) * inv_atlas;
    let offset2 = Vec3::new(viewport.x as f32 + 0.5, viewport.y as f32 + 0.5, 0.0) * inv_atlas.with_z(0.0);

    TileMapping {
      rect: self.rect_between(index_min, index_max),
      offset: offset1 * scale2 + offset2,
      scale: scale1 * scale2,
      scale_factor: ((1u32 << depth) * self.borderless_tile_size * self.index_size) as f32,
    }
  }

  /// Orthographic camera over the indexed square.
  pub fn camera(&self) -> TileCamera {
    TileCamera::at(self.camera_pos, &self.bbox, &self.basis, 1.0, self.far_plane)
  }

  /// World → indirection texture coordinates.
  pub fn texture_matrix(&self) -> Mat4 {
    let screen_to_tex =
      Mat4::from_translation(Vec3::new(0.5, 0.5, 0.0)) * Mat4::from_scale(Vec3::new(0.5, -0.5, 1.0));
    screen_to_tex * self.camera().view_projection()
  }
}
