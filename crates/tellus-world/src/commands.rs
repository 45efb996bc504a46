//! The scene command buffer between workers and the host.

use glam::Vec3;
use tellus_foliage::{FoliageChunk, InstanceTransform};
use tellus_mesh::MeshBuffers;

/// One scene mutation published by a worker.
///
/// Workers never touch the host scene directly: every completed chunk, every
/// teardown and every grass refresh crosses the thread boundary as a command
/// the host drains once per frame. A command always carries finished
/// content; no partially built chunk is ever published.
#[derive(Clone, Debug)]
pub enum SceneCommand {
    /// Attach a terrain mesh for the node at `path`.
    AttachTerrain {
        /// Octree path of the owning node.
        path: String,
        /// Minimum corner of the node, world space.
        origin: Vec3,
        /// Chunk-local triangle buffers.
        mesh: MeshBuffers,
    },
    /// Remove the terrain mesh previously attached for `path`.
    DetachTerrain {
        /// Octree path of the owning node.
        path: String,
    },
    /// Attach foliage instances for the node at `path`.
    AttachFoliage {
        /// Octree path of the owning node.
        path: String,
        /// Placed transforms and their mesh variant ids.
        chunk: FoliageChunk,
    },
    /// Remove the foliage previously attached for `path`.
    DetachFoliage {
        /// Octree path of the owning node.
        path: String,
    },
    /// Replace the whole grass instance set.
    SetGrass {
        /// World-space grass transforms.
        instances: Vec<InstanceTransform>,
    },
}
