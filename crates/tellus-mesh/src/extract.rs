//! The marching-cubes walk over one chunk grid.

use glam::{Vec3, Vec4};
use tellus_voxel::VoxelChunk;

use crate::tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, EDGE_TABLE, TRI_TABLE};

/// Triangle-list buffers handed to the mesh sink. Three entries per
/// triangle, unindexed, positions in chunk-local space.
#[derive(Clone, Debug, Default)]
pub struct MeshBuffers {
    /// Vertex positions, chunk-local.
    pub vertices: Vec<Vec3>,
    /// Per-vertex normals (unit length away from the solid).
    pub normals: Vec<Vec3>,
    /// Per-vertex material channel: climate zone encoded in `x` as
    /// `zone / max_zone`.
    pub colors: Vec<Vec4>,
}

impl MeshBuffers {
    /// Number of triangles in the buffers.
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }
}

const INTERP_EPSILON: f32 = 1e-5;

/// Interpolate along an edge to the isovalue crossing.
///
/// Degenerate handling: an endpoint already at the isovalue (within epsilon)
/// is returned as-is, and two equal endpoint values default to the first
/// endpoint instead of dividing by zero.
fn interpolate(p1: Vec3, p2: Vec3, v1: f32, v2: f32, iso: f32) -> Vec3 {
    if (iso - v1).abs() < INTERP_EPSILON {
        return p1;
    }
    if (iso - v2).abs() < INTERP_EPSILON {
        return p2;
    }
    if (v1 - v2).abs() < INTERP_EPSILON {
        return p1;
    }
    let t = (iso - v1) / (v2 - v1);
    p1 + t * (p2 - p1)
}

/// Sample the grid with an out-of-bounds fallback of -1 (air), so gradient
/// taps just past the seam padding behave as open sky.
fn sample(densities: &[f32], x: i32, y: i32, z: i32, points: usize) -> f32 {
    let p = points as i32;
    if x < 0 || y < 0 || z < 0 || x >= p || y >= p || z >= p {
        return -1.0;
    }
    densities[(x + y * p + z * p * p) as usize]
}

/// Central-difference density gradient at a grid point, negated so the
/// normal points out of the solid (density increases inward).
fn gradient(densities: &[f32], x: i32, y: i32, z: i32, points: usize) -> Vec3 {
    let dx = sample(densities, x + 1, y, z, points) - sample(densities, x - 1, y, z, points);
    let dy = sample(densities, x, y + 1, z, points) - sample(densities, x, y - 1, z, points);
    let dz = sample(densities, x, y, z + 1, points) - sample(densities, x, y, z - 1, points);
    -Vec3::new(dx, dy, dz).normalize_or(Vec3::Y)
}

/// Run marching cubes over a sampled chunk at the given isovalue.
///
/// `voxel_edge` scales grid indices into chunk-local positions (the LOD
/// voxel multiplier). `max_zone` normalizes the climate-zone color channel.
/// Each cube's triangles take the zone of the cube's minimum corner; the
/// dominant zone across a cube's span never differs at the cell scale the
/// graph provides.
///
/// Empty chunks (no sign crossing) return empty buffers without walking the
/// grid.
pub fn extract_mesh(chunk: &VoxelChunk, iso: f32, voxel_edge: f32, max_zone: f32) -> MeshBuffers {
    let mut mesh = MeshBuffers::default();
    if chunk.empty {
        return mesh;
    }

    let points = chunk.points;
    for x in 0..points - 1 {
        for y in 0..points - 1 {
            for z in 0..points - 1 {
                march_cube(chunk, x, y, z, iso, voxel_edge, max_zone, &mut mesh);
            }
        }
    }

    debug_assert_eq!(mesh.vertices.len(), mesh.normals.len());
    debug_assert_eq!(mesh.vertices.len(), mesh.colors.len());
    mesh
}

#[allow(clippy::too_many_arguments)]
fn march_cube(
    chunk: &VoxelChunk,
    x: usize,
    y: usize,
    z: usize,
    iso: f32,
    voxel_edge: f32,
    max_zone: f32,
    mesh: &mut MeshBuffers,
) {
    let points = chunk.points;
    let densities = &chunk.densities;

    let mut positions = [Vec3::ZERO; 8];
    let mut values = [0.0_f32; 8];
    let mut normals = [Vec3::ZERO; 8];

    let mut cube_index = 0_usize;
    for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
        let cx = x + offset[0];
        let cy = y + offset[1];
        let cz = z + offset[2];
        positions[i] = Vec3::new(cx as f32, cy as f32, cz as f32) * voxel_edge;
        values[i] = sample(densities, cx as i32, cy as i32, cz as i32, points);
        normals[i] = gradient(densities, cx as i32, cy as i32, cz as i32, points);
        if values[i] < iso {
            cube_index |= 1 << i;
        }
    }

    let edge_mask = EDGE_TABLE[cube_index];
    if edge_mask == 0 {
        return;
    }

    let mut edge_vert = [Vec3::ZERO; 12];
    let mut edge_norm = [Vec3::ZERO; 12];
    for (e, conn) in EDGE_CONNECTIONS.iter().enumerate() {
        if edge_mask & (1 << e) != 0 {
            let [a, b] = *conn;
            edge_vert[e] = interpolate(positions[a], positions[b], values[a], values[b], iso);
            edge_norm[e] = interpolate(normals[a], normals[b], values[a], values[b], iso);
        }
    }

    // Color from the cube's minimum-corner climate zone.
    let zone = chunk.zones.get(x + y * points + z * points * points);
    let channel = zone.map_or(0.0, |&z| z as f32 / max_zone.max(1.0));
    let color = Vec4::new(channel, 0.0, 0.0, 1.0);

    let tri_list = &TRI_TABLE[cube_index];
    let mut i = 0;
    while tri_list[i] != -1 {
        for k in 0..3 {
            let edge = tri_list[i + k] as usize;
            mesh.vertices.push(edge_vert[edge]);
            mesh.normals.push(edge_norm[edge]);
            mesh.colors.push(color);
        }
        i += 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tellus_voxel::grid_index;

    fn grid_from_fn(points: usize, f: impl Fn(usize, usize, usize) -> f32) -> VoxelChunk {
        let mut densities = vec![0.0; points * points * points];
        let mut has_solid = false;
        let mut has_air = false;
        for z in 0..points {
            for y in 0..points {
                for x in 0..points {
                    let d = f(x, y, z);
                    densities[grid_index(x, y, z, points)] = d;
                    has_solid |= d > 0.0;
                    has_air |= d < 0.0;
                }
            }
        }
        VoxelChunk {
            points,
            empty: !(has_solid && has_air),
            densities,
            zones: vec![2; points * points * points],
        }
    }

    #[test]
    fn test_uniform_positive_grid_emits_nothing() {
        let chunk = grid_from_fn(8, |_, _, _| 1.0);
        let mesh = extract_mesh(&chunk, 0.0, 1.0, 8.0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_uniform_negative_grid_emits_nothing() {
        let chunk = grid_from_fn(8, |_, _, _| -1.0);
        let mesh = extract_mesh(&chunk, 0.0, 1.0, 8.0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_planar_interface_vertices_near_plane() {
        // Solid below y = 4.5, air above: every emitted vertex must lie
        // within one voxel of the analytic plane.
        let chunk = grid_from_fn(9, |_, y, _| 4.5 - y as f32);
        let mesh = extract_mesh(&chunk, 0.0, 1.0, 8.0);
        assert!(mesh.triangle_count() > 0);
        for v in &mesh.vertices {
            assert!(
                (v.y - 4.5).abs() <= 1.0,
                "vertex {v:?} strays from the interface"
            );
        }
    }

    #[test]
    fn test_planar_interface_normals_point_into_air() {
        let chunk = grid_from_fn(9, |_, y, _| 4.5 - y as f32);
        let mesh = extract_mesh(&chunk, 0.0, 1.0, 8.0);
        // Gradients on the outermost ring lean on the out-of-bounds air
        // fallback and tilt; only interior vertices are exactly radial.
        for (v, n) in mesh.vertices.iter().zip(&mesh.normals) {
            assert!(n.y > 0.5, "normal {n:?} should point up out of the solid");
            let interior = (1.0..=7.0).contains(&v.x) && (1.0..=7.0).contains(&v.z);
            if interior {
                assert!(n.y > 0.99, "interior normal {n:?} at {v:?} should be +Y");
            }
        }
    }

    #[test]
    fn test_voxel_edge_scales_positions() {
        let chunk = grid_from_fn(5, |_, y, _| 2.5 - y as f32);
        let unit = extract_mesh(&chunk, 0.0, 1.0, 8.0);
        let scaled = extract_mesh(&chunk, 0.0, 4.0, 8.0);
        assert_eq!(unit.triangle_count(), scaled.triangle_count());
        for (a, b) in unit.vertices.iter().zip(&scaled.vertices) {
            assert!((*a * 4.0 - *b).length() < 1e-4);
        }
    }

    #[test]
    fn test_color_channel_encodes_zone() {
        let chunk = grid_from_fn(5, |_, y, _| 2.5 - y as f32);
        let mesh = extract_mesh(&chunk, 0.0, 1.0, 8.0);
        for c in &mesh.colors {
            assert!((c.x - 2.0 / 8.0).abs() < 1e-6);
            assert_eq!(c.w, 1.0);
        }
    }

    #[test]
    fn test_interpolation_snaps_to_iso_endpoints() {
        let p1 = Vec3::ZERO;
        let p2 = Vec3::X;
        assert_eq!(interpolate(p1, p2, 0.0, 1.0, 0.0), p1);
        assert_eq!(interpolate(p1, p2, 1.0, 0.0, 0.0), p2);
        // Equal values default to the first endpoint.
        assert_eq!(interpolate(p1, p2, 0.5, 0.5, 0.0), p1);
        // Regular case: midpoint crossing.
        let mid = interpolate(p1, p2, -1.0, 1.0, 0.0);
        assert!((mid - Vec3::X * 0.5).length() < 1e-6);
    }
}
