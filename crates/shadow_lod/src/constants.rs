//! Atlas, refinement and timing constants for shadow tiles.
//!
//! # Tile Layout
//!
//! ```text
//! ┌──────────────────────────────── TILE_SIZE (256) ───────────────────────┐
//! │ border (8)                                                             │
//! │   ┌──────────────── BORDERLESS_TILE_SIZE (240) ─────────────────┐      │
//! │   │                                                             │      │
//! │   │   viewport: the region a shader samples from                │      │
//! │   │                                                             │      │
//! │   └─────────────────────────────────────────────────────────────┘      │
//! │                                                                        │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The border is rendered but never indexed: it keeps filtering kernels from
//! reading a neighbouring tile's depth.
//!
//! # Refinement Convention
//!
//! Refinement 0 = coarsest (a root cell of `largest_tile_world_size`),
//! higher refinement = finer. Each level halves the world footprint:
//!
//! ```text
//! tile world size = largest_tile_world_size / 2^refinement
//! ```

/// Deepest refinement any configuration may request.
///
/// Indirection mips and LOD clamp values are normalized against this.
pub const MAX_REFINEMENT: u8 = 4;

/// Default full tile edge in texels, border included.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default border texels on each side of a tile.
pub const DEFAULT_TILE_BORDER_TEXELS: u32 = 8;

/// Default atlas width in texels.
pub const DEFAULT_ATLAS_WIDTH: u32 = 4096;

/// Default atlas height in texels.
pub const DEFAULT_ATLAS_HEIGHT: u32 = 4096;

/// Detail maps are downsampled by `1 << DETAIL_MAP_DOWNSAMPLE_LEVEL`.
pub const DETAIL_MAP_DOWNSAMPLE_LEVEL: u32 = 4;

/// Seconds a freshly readied tile takes to blend in.
pub const DEFAULT_FADE_IN_SECONDS: f32 = 0.5;

/// Cosine below which a new light direction counts as "different".
pub const LIGHT_DIR_UPDATE_THRESHOLD: f32 = 0.999;

/// Kernel size (texels) used when deriving a tile's depth bias.
pub const DEPTH_BIAS_KERNEL: [f32; 3] = [3.5, 3.5, 1.0];

/// Depth buffer precision assumed when deriving a tile's depth bias.
pub const DEPTH_BITS: u32 = 16;

/// Frame-stamp offset given to invalidated tiles so they always look least
/// recently used.
pub const INVALID_LAST_USED_OFFSET: u32 = 0x7fff_ffff;

/// Size in texels of a detail map tile produced from a full tile.
#[inline]
pub const fn detail_map_tile_size(tile_size: u32) -> u32 {
  tile_size >> DETAIL_MAP_DOWNSAMPLE_LEVEL
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
