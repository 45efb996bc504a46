//! Marching-cubes mesh extraction from sampled density grids.
//!
//! Walks every unit cube of a chunk's `(n+1)^3` grid, classifies it by the
//! sign pattern of its 8 corners, and emits triangles along the isosurface
//! with interpolated positions, gradient-derived normals, and a climate-zone
//! color channel. A grid with no sign change emits nothing.

mod extract;
mod tables;

pub use extract::{MeshBuffers, extract_mesh};
