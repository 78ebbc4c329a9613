//! Tile cache: a fixed pool of atlas slots shared by every frustum.
//!
//! # Slot lifecycle
//!
//! ```text
//!            allocate (miss)              batch done
//!   free ─────────────────> render queue ──> render batch ──┬──> ready
//!    ^  \                                                   └──> detail-map queue ──> ready
//!    │   \ allocate (exact hit) ──────────────────────────────────────────────────> ready
//!    └──────────────────────────── free / evict ─────────────────────────────────────┘
//! ```
//!
//! Every slot is in exactly one of free, render queue, render batch,
//! detail-map queue or ready at any time.

pub mod entry;
pub mod index_set;
pub mod scheduler;
pub mod tile_cache;

pub use entry::{TileCacheEntry, TileId, TileOwner, Viewport};
pub use index_set::IndexSet;
pub use tile_cache::{CacheStats, FrustumRecord, TileCache, TileRequest};
