//! Configuration errors.
//!
//! Running out of tiles or meeting a stale tile are ordinary outcomes
//! (`Option`), not errors. Only a configuration can be wrong.

use crate::constants::MAX_REFINEMENT;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
  #[error("tile size {tile_size} leaves no texels inside a {border}-texel border")]
  TileTooSmall { tile_size: u32, border: u32 },

  #[error("atlas {width}x{height} cannot hold a single {tile_size}-texel tile")]
  AtlasTooSmall { width: u32, height: u32, tile_size: u32 },

  #[error("atlas slot grid {cols}x{rows} is too large")]
  TooManySlots { cols: u32, rows: u32 },

  #[error("index_size {index_size} at max_refinement {max_refinement} overflows the indirection texture")]
  IndexTooLarge { index_size: u32, max_refinement: u8 },

  #[error("max_refinement {0} exceeds the supported maximum {max}", max = MAX_REFINEMENT)]
  RefinementTooDeep(u8),

  #[error("expected {expected} refinement distances (max_refinement + 1), got {actual}")]
  ThresholdCount { expected: usize, actual: usize },

  #[error("refinement distance at depth {depth} ({value}) must be smaller in magnitude than the one above it")]
  ThresholdNotDecreasing { depth: usize, value: f32 },

  #[error("min_refinement_for_layer {layer} is deeper than max_refinement {max}")]
  LayerTooDeep { layer: u8, max: u8 },

  #[error("{name} must be positive, got {value}")]
  NonPositive { name: &'static str, value: f32 },

  #[error("light_dir_update_threshold must be a cosine in (-1, 1], got {0}")]
  BadLightThreshold(f32),

  #[error("failed to parse config TOML: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("failed to read config file: {0}")]
  Io(#[from] std::io::Error),
}
