//! Shadow frustums: one quadtree per light direction plus the indirection
//! data that lets a shader find its tiles.

pub mod controller;
pub mod indirection;

pub use controller::{FrustumController, TileUpdate};
pub use indirection::{
  IndexProjection, IndexRect, IndirectionData, IndirectionQuad, LodClampQuad, TileMapping,
};
