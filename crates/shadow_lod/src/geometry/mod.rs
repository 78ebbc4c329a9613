//! Geometry primitives: boxes, 2-D hulls, cameras and the light basis.
//!
//! Everything here is pure math with no knowledge of tiles or nodes.
//!
//! # Spaces
//!
//! - **World space**: the scene's coordinate frame.
//! - **Light space**: world rotated so that `+z` points toward the light.
//!   Quadtree regions are flat boxes (`z == 0`) on the light-space xy plane.

pub mod aabb;
pub mod camera;
pub mod hull;
pub mod light;

// Re-exports
pub use aabb::AABBox;
pub use camera::{TileCamera, ViewCamera};
pub use hull::ConvexHull2D;
pub use light::LightBasis;
