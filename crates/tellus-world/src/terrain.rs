//! The terrain chunk build pipeline: cache, sample, mesh.

use glam::Vec3;
use tellus_cache::ChunkStore;
use tellus_cells::{CellGraph, CellGraphError, CellId};
use tellus_field::DensityField;
use tellus_mesh::{MeshBuffers, extract_mesh};
use tellus_voxel::{VoxelChunk, sample_chunk, sample_zones};
use tracing::warn;

/// The terrain content of one octree leaf, kept on the worker so the grass
/// scan can walk nearby meshes without another channel hop.
pub struct TerrainChunk {
    /// Minimum corner of the owning node, world space.
    pub origin: Vec3,
    /// Extracted mesh; `None` for chunks the surface does not cross.
    pub mesh: Option<MeshBuffers>,
}

/// Largest climate-zone id in the graph, as the color normalizer.
pub fn max_climate_zone(graph: &CellGraph) -> f32 {
    (0..graph.cell_count() as CellId)
        .map(|cell| graph.climate_zone(cell))
        .max()
        .unwrap_or(0)
        .max(1) as f32
}

/// Build one terrain chunk, preferring the cache.
///
/// A cached payload restores the density grid (or just the empty flag) and
/// re-derives the climate-zone grid, which is never persisted. A miss or a
/// corrupt payload falls back to a full sampling pass whose result is
/// written back. Either way the surface mesh is extracted fresh; meshes are
/// cheaper to rebuild than to version on disk.
///
/// Density-field errors abort the build; the caller decides how the node
/// degrades.
#[allow(clippy::too_many_arguments)]
pub fn build_terrain_chunk(
    field: &DensityField,
    store: &dyn ChunkStore,
    path: &str,
    origin: Vec3,
    side_length: f32,
    resolution: usize,
    cell: CellId,
    max_zone: f32,
) -> Result<TerrainChunk, CellGraphError> {
    let points = resolution + 1;
    let voxel_edge = side_length / resolution as f32;

    let cached = store
        .load(path)
        .and_then(|bytes| match VoxelChunk::decode(&bytes, points) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                warn!(path, error = %e, "corrupt cached chunk, resampling");
                None
            }
        });

    let chunk = match cached {
        Some(mut chunk) => {
            if !chunk.empty {
                chunk.zones = sample_zones(field, origin, resolution, voxel_edge, cell)?;
            }
            chunk
        }
        None => {
            let chunk = sample_chunk(field, origin, resolution, voxel_edge, cell)?;
            store.store(path, &chunk.encode());
            chunk
        }
    };

    let mesh = (!chunk.empty).then(|| extract_mesh(&chunk, 0.0, voxel_edge, max_zone));
    Ok(TerrainChunk { origin, mesh })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tellus_cache::MemoryStore;
    use tellus_field::FieldParams;

    fn octahedron_field() -> DensityField {
        let positions = vec![Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        let neighbours = vec![
            vec![2, 4, 3, 5],
            vec![2, 5, 3, 4],
            vec![0, 5, 1, 4],
            vec![0, 4, 1, 5],
            vec![0, 2, 1, 3],
            vec![0, 3, 1, 2],
        ];
        let graph = CellGraph::new(
            positions,
            neighbours,
            vec![0.2; 6],
            vec![0.0; 6],
            vec![Vec3::ZERO; 6],
            vec![0, 1, 2, 3, 4, 5],
        )
        .unwrap();
        DensityField::new(
            Arc::new(graph),
            FieldParams {
                planet_radius: 12_000.0,
                terrain_height: 1_000.0,
                noise_scale: 0.0,
                seed: 0,
            },
        )
    }

    #[test]
    fn test_surface_chunk_builds_a_mesh_and_caches() {
        let field = octahedron_field();
        let store = MemoryStore::new();
        // Surface above +X sits at radius 12200; center this 32-cube on it.
        let origin = Vec3::new(12_184.0, -16.0, -16.0);

        let chunk =
            build_terrain_chunk(&field, &store, "401", origin, 32.0, 32, 0, 5.0).unwrap();
        let mesh = chunk.mesh.expect("surface chunk must mesh");
        assert!(mesh.triangle_count() > 0);
        assert!(store.load("401").is_some(), "sampled grid must be cached");
    }

    #[test]
    fn test_cache_hit_reproduces_the_mesh() {
        let field = octahedron_field();
        let store = MemoryStore::new();
        let origin = Vec3::new(12_184.0, -16.0, -16.0);

        let first =
            build_terrain_chunk(&field, &store, "401", origin, 32.0, 32, 0, 5.0).unwrap();
        let second =
            build_terrain_chunk(&field, &store, "401", origin, 32.0, 32, 0, 5.0).unwrap();

        let a = first.mesh.unwrap();
        let b = second.mesh.unwrap();
        assert_eq!(a.triangle_count(), b.triangle_count());
        assert_eq!(a.vertices, b.vertices);
        assert_eq!(a.colors, b.colors);
    }

    #[test]
    fn test_deep_chunk_is_empty_flag_only() {
        let field = octahedron_field();
        let store = MemoryStore::new();
        let origin = Vec3::new(6_000.0, -16.0, -16.0);

        let chunk =
            build_terrain_chunk(&field, &store, "22", origin, 32.0, 32, 0, 5.0).unwrap();
        assert!(chunk.mesh.is_none(), "fully solid chunk must not mesh");
        assert_eq!(store.load("22"), Some(vec![1]), "empty persists one byte");
    }

    #[test]
    fn test_corrupt_cache_entry_is_resampled() {
        let field = octahedron_field();
        let store = MemoryStore::new();
        let origin = Vec3::new(12_184.0, -16.0, -16.0);

        store.store("401", &[0, 1, 2]); // flag says full grid, body truncated
        let chunk =
            build_terrain_chunk(&field, &store, "401", origin, 32.0, 32, 0, 5.0).unwrap();
        assert!(chunk.mesh.is_some());

        // The bad payload was replaced by a valid one.
        let bytes = store.load("401").unwrap();
        assert_eq!(bytes.len(), 1 + 33 * 33 * 33 * 4);
    }

    #[test]
    fn test_max_climate_zone_never_below_one() {
        let field = octahedron_field();
        assert_eq!(max_climate_zone(field.graph()), 5.0);
    }
}
