//! Surface-anchored foliage: placement, variant tables, and the grass scan.
//!
//! Foliage runs its own octree (driven by the world layer) with the same
//! subdivision policy as terrain but its own range and leaf floor. This
//! crate holds the per-leaf machinery: candidate points jittered on a
//! tangent-plane grid, projected onto the surface by bisection on the
//! noise-free density field, filtered by slope and ocean constraints, and
//! oriented to the local surface. A secondary time-gated scan turns nearby
//! terrain triangles into dense instanced grass.

mod grass;
mod placement;
mod variants;

pub use grass::{GrassParams, scan_grass};
pub use placement::{
    FoliageChunk, FoliageDecodeError, InstanceTransform, PlacementParams, derive_node_seed,
    node_rng, place_foliage, project_to_surface,
};
pub use variants::{VariantTable, ZoneVariants};
