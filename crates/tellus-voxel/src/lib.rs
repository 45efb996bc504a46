//! Per-chunk voxel grids: density sampling and the on-disk wire format.
//!
//! A terrain chunk owns a flat `(n+1)^3` scalar grid (one voxel of seam
//! padding shared with the neighbouring chunk) plus a parallel climate-zone
//! grid for material tagging. Sampling is spread across worker threads by
//! z-slab, with chunk emptiness accumulated atomically; a chunk whose
//! samples all share one sign produces no mesh at all.

mod grid;
mod sample;

pub use grid::{ChunkDecodeError, VoxelChunk, grid_index};
pub use sample::{sample_chunk, sample_zones};
