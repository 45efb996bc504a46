//! Camera-driven sphere-bounding octree with chunk lifecycle.
//!
//! Space around the planet is subdivided into an octree whose leaves carry
//! generated content (a terrain mesh or a foliage instance list). Nodes live
//! in an index arena rather than a pointer graph: parent/child links are
//! plain indices, subtree ownership is "owned by arena slot", and collapsing
//! a subtree returns its slots to a free list after every descendant chunk
//! has been released.
//!
//! One rebuild pass walks the tree top-down, subdividing wherever the node
//! might still straddle the surface and the camera is close enough to care,
//! and collapsing everywhere else. The pass reports which chunks were torn
//! down and which leaves now await content; it never builds content itself.

mod arena;
mod build;

pub use arena::{Node, NodeId, Octree};
pub use build::{LodPolicy, RebuildOutcome};

/// Half the square root of three: the circumscribed-sphere radius of a unit
/// cube, used to pad distance and density bounds to cover a whole node.
pub const HALF_SQRT3: f32 = 0.866_025_4;
