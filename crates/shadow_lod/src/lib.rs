//! shadow_lod - Engine independent adaptive shadow-map level of detail
//!
//! This crate decides *which* shadow tiles exist, *where* they live in a
//! fixed depth atlas and *when* they get rendered. Rasterization is left to
//! the host through the [`TileRenderer`] trait.
//!
//! # Features
//!
//! - **Light-space quadtree**: per light direction, refined toward the viewer
//!   by distance thresholds and the visible frustum footprint
//! - **Tile cache**: fixed pool of atlas slots with LRU reuse, exact-hit
//!   reuse of retained content and priority eviction
//! - **Frame budget**: bounded renders per frame, shallowest and nearest
//!   first, with a pre-render frustum filled in the background while the
//!   light turns
//! - **Indirection data**: per-mip quads mapping index texels to atlas tiles
//!   plus a LOD clamp map
//!
//! # Example
//!
//! ```ignore
//! use glam::Vec3;
//! use shadow_lod::{RecordingRenderer, ShadowConfig, ShadowOrchestrator, ViewCamera};
//!
//! let mut shadows = ShadowOrchestrator::new(ShadowConfig::default())?;
//! let mut renderer = RecordingRenderer::new();
//! let camera = ViewCamera::new(Vec3::new(0.0, 10.0, 0.0), Vec3::Z, 1.0, 16.0 / 9.0);
//!
//! let report = shadows.run_frame(Vec3::new(0.3, 1.0, 0.2), &camera, 1.0 / 60.0, &mut renderer);
//! println!("rendered {} tiles", report.tiles_rendered);
//! ```

pub mod budget;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod quadtree;
pub mod renderer;

// Re-export commonly used items
pub use budget::{RenderBudget, RenderStats};
pub use cache::{CacheStats, TileCache, TileId, TileOwner, TileRequest, Viewport};
pub use config::ShadowConfig;
pub use constants::MAX_REFINEMENT;
pub use error::ConfigError;
pub use frame::{FrameClock, FrustumId};
pub use geometry::{AABBox, ConvexHull2D, LightBasis, TileCamera, ViewCamera};
pub use quadtree::{NodeHandle, QuadTree, QuadTreeNode, TileSlot};
pub use renderer::{RecordingRenderer, TileRenderRequest, TileRenderer};

// Per light direction quadtree and indirection
pub mod frustum;
pub use frustum::{FrustumController, IndirectionData, LodClampQuad, TileUpdate};

// Per-frame driver over current and pre-render frustums
pub mod orchestrator;
pub use orchestrator::{FrameReport, ShadowOrchestrator};

// Cache statistics (feature-gated collection)
pub mod metrics;
pub use metrics::ShadowMetrics;
