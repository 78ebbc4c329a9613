//! ShadowConfig - atlas layout and refinement policy.
//!
//! Supplied once at construction and treated as immutable afterwards.
//!
//! ```toml
//! largest_tile_world_size = 120.0
//! max_refinement = 4
//! refinement_distance_sq = [62500.0, 14400.0, 3600.0, 900.0, 225.0]
//! min_refinement_for_layer = 2
//! ```

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::{
  DEFAULT_ATLAS_HEIGHT, DEFAULT_ATLAS_WIDTH, DEFAULT_FADE_IN_SECONDS, DEFAULT_TILE_BORDER_TEXELS,
  DEFAULT_TILE_SIZE, LIGHT_DIR_UPDATE_THRESHOLD, MAX_REFINEMENT,
};
use crate::error::ConfigError;
use crate::geometry::AABBox;

/// Configuration shared by the tile cache and both frustums.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
  /// Atlas width in texels.
  pub atlas_width: u32,
  /// Atlas height in texels.
  pub atlas_height: u32,
  /// Full tile edge in texels, border included.
  pub tile_size: u32,
  /// Border texels on each side of a tile.
  pub tile_border_texels: u32,

  /// Edge of a root cell in light-space world units.
  pub largest_tile_world_size: f32,
  /// Viewer frustum depth projected into light space.
  pub shadow_distance: f32,
  /// Deepest refinement, at most [`MAX_REFINEMENT`].
  pub max_refinement: u8,
  /// Squared refinement radius per depth, `max_refinement + 1` entries,
  /// strictly decreasing in magnitude. A negative entry skips the hull test.
  pub refinement_distance_sq: Vec<f32>,
  /// Half-extent of light space always covered around the anchor.
  pub min_extent_ls: f32,
  /// Indexed region edge, in root cells.
  pub index_size: u32,

  /// Shallowest depth that gets a layer tile. `None` disables layers.
  pub min_refinement_for_layer: Option<u8>,
  /// Generate detail maps for shallow tiles.
  pub detail_maps: bool,
  /// Seconds a newly ready tile blends in over.
  pub fade_in_seconds: f32,
  /// Cosine below which a light direction counts as changed.
  pub light_dir_update_threshold: f32,

  /// Far plane of tile render cameras.
  pub tile_far_plane: f32,
  /// Scene bounds relative to the world center, used to place tile cameras.
  pub scene_min_offset: Vec3,
  pub scene_max_offset: Vec3,
}

impl Default for ShadowConfig {
  fn default() -> Self {
    Self {
      atlas_width: DEFAULT_ATLAS_WIDTH,
      atlas_height: DEFAULT_ATLAS_HEIGHT,
      tile_size: DEFAULT_TILE_SIZE,
      tile_border_texels: DEFAULT_TILE_BORDER_TEXELS,
      largest_tile_world_size: 120.0,
      shadow_distance: 90.0,
      max_refinement: MAX_REFINEMENT,
      refinement_distance_sq: vec![250.0 * 250.0, 120.0 * 120.0, 60.0 * 60.0, 30.0 * 30.0, 15.0 * 15.0],
      min_extent_ls: 1.0,
      index_size: 8,
      min_refinement_for_layer: Some(2),
      detail_maps: true,
      fade_in_seconds: DEFAULT_FADE_IN_SECONDS,
      light_dir_update_threshold: LIGHT_DIR_UPDATE_THRESHOLD,
      tile_far_plane: 3000.0,
      scene_min_offset: Vec3::new(-800.0, -200.0, -800.0),
      scene_max_offset: Vec3::new(800.0, 500.0, 800.0),
    }
  }
}

impl ShadowConfig {
  /// Parse and validate a TOML document. Missing keys take defaults.
  pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
    let config: ShadowConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  /// Read, parse and validate a TOML file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_toml_str(&text)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self
      .tile_border_texels
      .checked_mul(2)
      .map_or(true, |border| self.tile_size <= border)
    {
      return Err(ConfigError::TileTooSmall {
        tile_size: self.tile_size,
        border: self.tile_border_texels,
      });
    }
    if self.atlas_width < self.tile_size || self.atlas_height < self.tile_size {
      return Err(ConfigError::AtlasTooSmall {
        width: self.atlas_width,
        height: self.atlas_height,
        tile_size: self.tile_size,
      });
    }
    let (cols, rows) = self.slot_grid();
    if cols.checked_mul(rows).is_none() {
      return Err(ConfigError::TooManySlots { cols, rows });
    }
    if self.max_refinement > MAX_REFINEMENT {
      return Err(ConfigError::RefinementTooDeep(self.max_refinement));
    }
    // Indirection rects are i32 texels and scale factors are u32.
    let texture = (1u32 << self.max_refinement).checked_mul(self.index_size);
    let scale = texture.and_then(|t| t.checked_mul(self.borderless_tile_size()));
    if texture.map_or(true, |t| t > i32::MAX as u32) || scale.is_none() {
      return Err(ConfigError::IndexTooLarge {
        index_size: self.index_size,
        max_refinement: self.max_refinement,
      });
    }

    let expected = self.max_refinement as usize + 1;
    if self.refinement_distance_sq.len() != expected {
      return Err(ConfigError::ThresholdCount {
        expected,
        actual: self.refinement_distance_sq.len(),
      });
    }
    for (depth, pair) in self.refinement_distance_sq.windows(2).enumerate() {
      if pair[1].abs() >= pair[0].abs() {
        return Err(ConfigError::ThresholdNotDecreasing {
          depth: depth + 1,
          value: pair[1],
        });
      }
    }

    if let Some(layer) = self.min_refinement_for_layer {
      if layer > self.max_refinement {
        return Err(ConfigError::LayerTooDeep {
          layer,
          max: self.max_refinement,
        });
      }
    }

    for (name, value) in [
      ("largest_tile_world_size", self.largest_tile_world_size),
      ("shadow_distance", self.shadow_distance),
      ("tile_far_plane", self.tile_far_plane),
      ("index_size", self.index_size as f32),
    ] {
      if !(value > 0.0) {
        return Err(ConfigError::NonPositive { name, value });
      }
    }
    if !(self.fade_in_seconds >= 0.0) {
      return Err(ConfigError::NonPositive {
        name: "fade_in_seconds",
        value: self.fade_in_seconds,
      });
    }
    if !(self.light_dir_update_threshold > -1.0 && self.light_dir_update_threshold <= 1.0) {
      return Err(ConfigError::BadLightThreshold(self.light_dir_update_threshold));
    }
    Ok(())
  }

  /// Slot columns and rows in the atlas.
  #[inline]
  pub fn slot_grid(&self) -> (u32, u32) {
    (self.atlas_width / self.tile_size, self.atlas_height / self.tile_size)
  }

  #[inline]
  pub fn slot_count(&self) -> usize {
    let (cols, rows) = self.slot_grid();
    (cols * rows) as usize
  }

  /// Tile edge without its border.
  #[inline]
  pub fn borderless_tile_size(&self) -> u32 {
    self.tile_size - 2 * self.tile_border_texels
  }

  /// Ratio by which a tile camera widens its region so the border is
  /// rendered too.
  #[inline]
  pub fn viewport_scale(&self) -> f32 {
    self.tile_size as f32 / self.borderless_tile_size() as f32
  }

  /// Indirection texture edge in texels.
  #[inline]
  pub fn indirection_texture_size(&self) -> u32 {
    (1u32 << self.max_refinement) * self.index_size
  }

  /// Light-space edge of the indexed region.
  #[inline]
  pub fn index_region_size(&self) -> f32 {
    self.index_size as f32 * self.largest_tile_world_size
  }

  /// World edge of a tile at `depth`.
  #[inline]
  pub fn tile_world_size(&self, depth: u8) -> f32 {
    self.largest_tile_world_size / (1u32 << depth) as f32
  }

  #[inline]
  pub fn uses_layers(&self) -> bool {
    self
      .min_refinement_for_layer
      .is_some_and(|layer| layer <= self.max_refinement)
  }

  /// Deepest depth that still gets a detail map, per tile kind.
  pub fn detail_map_max_depth(&self, is_layer: bool) -> Option<u8> {
    if !self.detail_maps {
      return None;
    }
    if is_layer {
      self.min_refinement_for_layer
    } else if self.uses_layers() {
      Some(1)
    } else {
      Some(0)
    }
  }

  /// World-space scene bounds around `center`.
  #[inline]
  pub fn scene_bounds(&self, center: Vec3) -> AABBox {
    AABBox::new(center + self.scene_min_offset, center + self.scene_max_offset)
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
