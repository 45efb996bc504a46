//! Per-leaf foliage placement: candidate grids, bisection projection,
//! filters, orientation, and the instance cache format.

use std::hash::{DefaultHasher, Hash, Hasher};

use glam::{Mat3, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tellus_cells::{CellGraphError, CellId};
use tellus_field::DensityField;
use tracing::trace;

use crate::variants::VariantTable;

/// Bisection iteration count: halving the ±2×terrain-height bracket sixteen
/// times lands within sub-centimeter of the surface at planetary scale.
const BISECTION_STEPS: u32 = 16;

/// Baseline for the finite-difference slope probe, in world units.
const SLOPE_PROBE: f32 = 1.0;

/// A placed instance: world position plus an orthonormal orientation basis
/// (columns: right, up, forward; up is the local surface normal).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceTransform {
    /// World-space position on the surface.
    pub position: Vec3,
    /// Orientation basis.
    pub rotation: Mat3,
}

impl InstanceTransform {
    /// Build an orientation from a surface normal: forward is an arbitrary
    /// horizontal tangent (`up × world-right`, or `up × world-forward` when
    /// up is nearly parallel to world-right).
    pub fn upright(position: Vec3, up: Vec3) -> Self {
        let mut forward = up.cross(Vec3::X);
        if forward.length_squared() < 1e-4 {
            forward = up.cross(Vec3::Z);
        }
        let forward = forward.normalize();
        let right = forward.cross(up).normalize();
        Self {
            position,
            rotation: Mat3::from_cols(right, up, forward),
        }
    }
}

/// Tuning of the candidate grid and acceptance filters.
#[derive(Clone, Copy, Debug)]
pub struct PlacementParams {
    /// Planar interval of the candidate grid on the tangent plane.
    pub spacing: f32,
    /// Maximum surface slope (degrees from the radial direction) an
    /// instance tolerates.
    pub max_slope_deg: f32,
    /// Minimum surface height above the base planet radius; anything lower
    /// is ocean floor and stays bare.
    pub min_ocean_height: f32,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            spacing: 16.0,
            max_slope_deg: 45.0,
            min_ocean_height: 50.0,
        }
    }
}

/// The foliage content of one octree leaf.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FoliageChunk {
    /// Accepted instance transforms.
    pub transforms: Vec<InstanceTransform>,
    /// Mesh variant id per transform, drawn from the climate-zone table.
    /// Not part of the cache payload; re-drawn when a chunk is revived from
    /// cache.
    pub variants: Vec<u32>,
}

/// Errors raised while decoding a cached foliage payload.
#[derive(Debug, thiserror::Error)]
pub enum FoliageDecodeError {
    /// The payload is shorter than its count header.
    #[error("foliage payload truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected byte count from the header.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
}

impl FoliageChunk {
    /// Canonical cache payload:
    /// `[u32 count][count × (3 f32 position + 9 f32 rotation)]`, all
    /// little-endian.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.transforms.len() * 12 * 4);
        buf.extend_from_slice(&(self.transforms.len() as u32).to_le_bytes());
        for t in &self.transforms {
            for v in t.position.to_array() {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            for v in t.rotation.to_cols_array() {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        buf
    }

    /// Decode a cache payload. Variant ids are not stored; the caller
    /// re-draws them against the current variant table.
    pub fn decode(bytes: &[u8]) -> Result<Self, FoliageDecodeError> {
        let truncated = |expected| FoliageDecodeError::Truncated {
            expected,
            actual: bytes.len(),
        };

        if bytes.len() < 4 {
            return Err(truncated(4));
        }
        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let expected = 4 + count * 12 * 4;
        if bytes.len() != expected {
            return Err(truncated(expected));
        }

        let mut floats = bytes[4..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        let mut next = || floats.next().unwrap_or(0.0);

        let mut transforms = Vec::with_capacity(count);
        for _ in 0..count {
            let position = Vec3::new(next(), next(), next());
            let cols: [f32; 9] = std::array::from_fn(|_| next());
            transforms.push(InstanceTransform {
                position,
                rotation: Mat3::from_cols_array(&cols),
            });
        }
        Ok(Self {
            transforms,
            variants: Vec::new(),
        })
    }
}

/// Derive a deterministic seed for a node from the world seed and its path.
///
/// SipHash via std's `DefaultHasher` spreads the digits well; identical
/// `(world_seed, path)` pairs always place identical foliage.
pub fn derive_node_seed(world_seed: u64, path: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    path.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic RNG for one node's placement pass.
pub fn node_rng(world_seed: u64, path: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_node_seed(world_seed, path))
}

/// Project a radial direction onto the surface by bisection on the
/// noise-free density field.
///
/// Brackets the surface between `planet_radius ± 2 × terrain_height` and
/// halves the interval [`BISECTION_STEPS`] times. Returns `None` when the
/// bracket does not straddle the surface (no root on the ray). The
/// noise-free variant keeps foliage on the same base surface the terrain
/// mesher reproduces.
pub fn project_to_surface(
    field: &DensityField,
    direction: Vec3,
    hint: CellId,
) -> Result<Option<(Vec3, CellId)>, CellGraphError> {
    let params = field.params();
    let mut lo = params.planet_radius - 2.0 * params.terrain_height;
    let mut hi = params.planet_radius + 2.0 * params.terrain_height;

    // Density decreases with radius: solid at the bottom of the bracket,
    // air at the top, or there is nothing to find.
    let mut cell = field.sample_base(direction * lo, hint)?.cell;
    let bottom = field.sample_base(direction * lo, cell)?.density;
    let top = field.sample_base(direction * hi, cell)?.density;
    if bottom <= 0.0 || top >= 0.0 {
        return Ok(None);
    }

    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        let sample = field.sample_base(direction * mid, cell)?;
        cell = sample.cell;
        if sample.density > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Ok(Some((direction * (0.5 * (lo + hi)), cell)))
}

/// Build a tangent basis for a surface direction, swapping the reference
/// axis when the primary one is nearly parallel to the normal.
fn tangent_basis(normal: Vec3) -> (Vec3, Vec3) {
    let reference = if normal.x.abs() < 0.99 { Vec3::X } else { Vec3::Z };
    let tangent = normal.cross(reference).normalize();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

/// Estimate the surface normal at a projected point by finite differences:
/// two extra bisection probes a short step along the tangent plane span the
/// local surface patch.
fn estimate_surface_normal(
    field: &DensityField,
    point: Vec3,
    cell: CellId,
) -> Result<Option<Vec3>, CellGraphError> {
    let radial = point.normalize();
    let (tangent, bitangent) = tangent_basis(radial);

    let Some((pt, _)) = project_to_surface(field, (point + tangent * SLOPE_PROBE).normalize(), cell)?
    else {
        return Ok(None);
    };
    let Some((pb, _)) =
        project_to_surface(field, (point + bitangent * SLOPE_PROBE).normalize(), cell)?
    else {
        return Ok(None);
    };

    let mut normal = (pt - point).cross(pb - point).normalize_or(radial);
    if normal.dot(radial) < 0.0 {
        normal = -normal;
    }
    Ok(Some(normal))
}

/// Place foliage for one octree leaf.
///
/// Candidates sit on a regular grid across the node's tangent plane, padded
/// one spacing beyond the footprint so canopies can straddle node borders,
/// and jittered within half a spacing by the node's deterministic RNG. Each
/// candidate is projected onto the surface and kept only when it lands
/// inside this node's axis-aligned footprint (neighbouring nodes own the
/// rest), sits above the ocean height, and the local slope is within
/// bounds. Accepted instances are oriented to the estimated surface normal
/// and assigned a mesh variant from the climate-zone table.
pub fn place_foliage(
    field: &DensityField,
    origin: Vec3,
    side_length: f32,
    cell: CellId,
    params: &PlacementParams,
    table: &VariantTable,
    rng: &mut ChaCha8Rng,
) -> Result<FoliageChunk, CellGraphError> {
    let mut chunk = FoliageChunk::default();

    let center = origin + Vec3::splat(side_length * 0.5);
    let center_dir = center.normalize_or(Vec3::Y);
    let anchor = center_dir * field.params().planet_radius;
    let (tangent, bitangent) = tangent_basis(center_dir);

    let max_slope_cos = params.max_slope_deg.to_radians().cos();
    let half = side_length * 0.5 + params.spacing;
    let steps = (2.0 * half / params.spacing).floor() as i32;

    for iu in 0..=steps {
        for iv in 0..=steps {
            let u = -half + iu as f32 * params.spacing
                + rng.random_range(-0.5..0.5) * params.spacing;
            let v = -half + iv as f32 * params.spacing
                + rng.random_range(-0.5..0.5) * params.spacing;

            let direction = (anchor + tangent * u + bitangent * v).normalize_or(center_dir);
            let Some((point, point_cell)) = project_to_surface(field, direction, cell)? else {
                continue;
            };

            // Ownership: only the node whose footprint contains the landing
            // point places it, so overlapping candidate grids never double
            // up.
            let local = point - origin;
            if local.min_element() < 0.0 || local.max_element() > side_length {
                continue;
            }

            if point.length() - field.params().planet_radius < params.min_ocean_height {
                continue;
            }

            let Some(normal) = estimate_surface_normal(field, point, point_cell)? else {
                continue;
            };
            if normal.dot(point.normalize()) < max_slope_cos {
                continue;
            }

            let zone = field.graph().climate_zone(point_cell);
            let Some(variant) = table.select(zone, rng) else {
                continue;
            };

            chunk.transforms.push(InstanceTransform::upright(point, normal));
            chunk.variants.push(variant);
        }
    }

    trace!(
        placed = chunk.transforms.len(),
        side = side_length,
        "foliage placement pass"
    );
    Ok(chunk)
}
