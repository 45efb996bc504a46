//! The time-gated grass scan over nearby terrain meshes.
//!
//! Grass is not placed like trees: it is far too dense to store. Instead,
//! every refresh walks the terrain leaves near the camera and derives one
//! instance per sufficiently upward-facing triangle, with a deterministic
//! spatial-hash jitter so the field is stable from frame to frame without
//! storing a single transform.

use glam::{IVec3, Vec3};
use tellus_mesh::MeshBuffers;

use crate::placement::InstanceTransform;

/// Tuning of the grass refresh.
#[derive(Clone, Copy, Debug)]
pub struct GrassParams {
    /// Half-extent of the camera-centered box filter, per axis.
    pub grass_distance: f32,
    /// Global instance budget; the scan saturates and stops writing once
    /// it is reached.
    pub max_instances: usize,
    /// Minimum dot product between a triangle normal and the radial
    /// direction; steeper triangles grow nothing.
    pub up_threshold: f32,
    /// Maximum jitter radius around the triangle centroid.
    pub jitter_radius: f32,
    /// Positions are quantized by this factor before hashing, tying the
    /// jitter to the spot on the planet rather than the triangle index.
    pub quantize: f32,
}

impl Default for GrassParams {
    fn default() -> Self {
        Self {
            grass_distance: 50.0,
            max_instances: 10_000,
            up_threshold: 0.9,
            jitter_radius: 0.5,
            quantize: 3.0,
        }
    }
}

/// Deterministic spatial hash of a quantized position (three large primes,
/// xor-folded).
fn hash_position(p: IVec3) -> u32 {
    let x = (p.x as u32).wrapping_mul(73_856_093);
    let y = (p.y as u32).wrapping_mul(19_349_663);
    let z = (p.z as u32).wrapping_mul(83_492_791);
    x ^ y ^ z
}

/// Scan terrain meshes for grass anchor points.
///
/// `chunks` yields `(chunk_origin, mesh)` for every terrain leaf the caller
/// pre-filtered to the grass range (the octree walk belongs to the tree's
/// owner). Every triangle centroid within the camera box whose normal is
/// sufficiently radial produces one instance, jittered on the local tangent
/// plane by a hash of its quantized position. Output saturates at
/// `max_instances`.
pub fn scan_grass<'a>(
    chunks: impl IntoIterator<Item = (Vec3, &'a MeshBuffers)>,
    camera: Vec3,
    params: &GrassParams,
) -> Vec<InstanceTransform> {
    let mut instances = Vec::new();

    'chunks: for (origin, mesh) in chunks {
        for tri in 0..mesh.triangle_count() {
            if instances.len() >= params.max_instances {
                break 'chunks;
            }

            let i = tri * 3;
            let centroid =
                origin + (mesh.vertices[i] + mesh.vertices[i + 1] + mesh.vertices[i + 2]) / 3.0;

            let diff = (camera - centroid).abs();
            if diff.x > params.grass_distance
                || diff.y > params.grass_distance
                || diff.z > params.grass_distance
            {
                continue;
            }

            let radial = centroid.normalize_or(Vec3::Y);
            if mesh.normals[i].dot(radial) <= params.up_threshold {
                continue;
            }

            let h = hash_position((centroid * params.quantize).as_ivec3());
            let angle = (h & 0xffff) as f32 / 65_535.0 * std::f32::consts::TAU;
            let radius = ((h >> 16) & 0xffff) as f32 / 65_535.0 * params.jitter_radius;

            let reference = if radial.y.abs() < 0.99 { Vec3::Y } else { Vec3::X };
            let tangent = radial.cross(reference).normalize();
            let bitangent = radial.cross(tangent);

            let offset = (angle.cos() * tangent + angle.sin() * bitangent) * radius;
            let position = centroid + offset;
            let forward = angle.cos() * tangent + angle.sin() * bitangent;
            let up = position.normalize_or(Vec3::Y);
            let right = forward.cross(up).normalize_or(tangent);

            instances.push(InstanceTransform {
                position,
                rotation: glam::Mat3::from_cols(right, up, forward),
            });
        }
    }

    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    /// A one-triangle mesh lying flat on the sphere at +Y, radius 1000.
    fn flat_triangle() -> MeshBuffers {
        MeshBuffers {
            vertices: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            normals: vec![Vec3::Y; 3],
            colors: vec![Vec4::ONE; 3],
        }
    }

    #[test]
    fn test_upward_triangle_near_camera_grows_grass() {
        let origin = Vec3::new(0.0, 1_000.0, 0.0);
        let mesh = flat_triangle();
        let camera = Vec3::new(0.0, 1_005.0, 0.0);
        let grass = scan_grass([(origin, &mesh)], camera, &GrassParams::default());
        assert_eq!(grass.len(), 1);
        let t = &grass[0];
        assert!((t.position - origin).length() < 2.0);
        assert!(t.rotation.col(1).dot(Vec3::Y) > 0.99);
    }

    #[test]
    fn test_far_triangle_is_filtered_by_camera_box() {
        let origin = Vec3::new(0.0, 1_000.0, 0.0);
        let mesh = flat_triangle();
        let camera = Vec3::new(500.0, 1_000.0, 0.0);
        let grass = scan_grass([(origin, &mesh)], camera, &GrassParams::default());
        assert!(grass.is_empty());
    }

    #[test]
    fn test_steep_triangle_grows_nothing() {
        let origin = Vec3::new(0.0, 1_000.0, 0.0);
        let mut mesh = flat_triangle();
        mesh.normals = vec![Vec3::X; 3]; // cliff face
        let camera = Vec3::new(0.0, 1_005.0, 0.0);
        let grass = scan_grass([(origin, &mesh)], camera, &GrassParams::default());
        assert!(grass.is_empty());
    }

    #[test]
    fn test_instance_cap_saturates() {
        let origin = Vec3::new(0.0, 1_000.0, 0.0);
        // Many copies of the same chunk; the scan must stop at the cap.
        let mesh = flat_triangle();
        let chunks: Vec<_> = (0..100).map(|_| (origin, &mesh)).collect();
        let params = GrassParams {
            max_instances: 10,
            ..GrassParams::default()
        };
        let camera = Vec3::new(0.0, 1_005.0, 0.0);
        let grass = scan_grass(chunks, camera, &params);
        assert_eq!(grass.len(), 10);
    }

    #[test]
    fn test_jitter_is_deterministic() {
        let origin = Vec3::new(0.0, 1_000.0, 0.0);
        let mesh = flat_triangle();
        let camera = Vec3::new(0.0, 1_005.0, 0.0);
        let a = scan_grass([(origin, &mesh)], camera, &GrassParams::default());
        let b = scan_grass([(origin, &mesh)], camera, &GrassParams::default());
        assert_eq!(a, b);
    }
}
