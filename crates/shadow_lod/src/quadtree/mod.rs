//! Light-space quadtree forest.
//!
//! One root per occupied grid cell of `largest_tile_world_size`; each node
//! splits its square into four quadrants:
//!
//! ```text
//!   y
//!   ^
//!   ┌─────┬─────┐
//!   │  2  │  3  │
//!   ├─────┼─────┤
//!   │  0  │  1  │
//!   └─────┴─────┘─> x
//! ```
//!
//! Nodes live in a slab arena and are addressed by generational
//! [`NodeHandle`]s, so a handle held past its node's removal resolves to
//! nothing instead of aliasing a newer node.

pub mod node;
pub mod refinement;
pub mod tree;

pub use node::{NodeHandle, QuadTreeNode, TileSlot};
pub use refinement::{refine_node, refinement_distance_sq, FrustumRefinement, RefinementPolicy};
pub use tree::QuadTree;
