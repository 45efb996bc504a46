//! The signed density field defining the planet's implicit surface.
//!
//! Positive inside the solid, negative in air, zero at the surface. Derived
//! on demand from the coarse cell graph: interpolated simulation height plus
//! a high-frequency noise detail term, scaled to terrain height and offset
//! from the fixed planet radius. Never persisted; every consumer recomputes.

use std::sync::Arc;

use glam::Vec3;
use noise::{NoiseFn, Perlin};
use tellus_cells::{CellGraph, CellGraphError, CellId};

/// Shape parameters of the planet surface.
#[derive(Clone, Copy, Debug)]
pub struct FieldParams {
    /// Base sphere radius in world units.
    pub planet_radius: f32,
    /// Full-scale height of the terrain relief above the base sphere.
    pub terrain_height: f32,
    /// Amplitude of the noise detail term, in simulation-height units.
    pub noise_scale: f32,
    /// Seed for the noise detail term.
    pub seed: u32,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            planet_radius: 12_000.0,
            terrain_height: 1_000.0,
            noise_scale: 0.05,
            seed: 0,
        }
    }
}

/// A density sample paired with the cell it resolved to, so callers can
/// chain spatially coherent locator hints and tag materials.
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    /// Signed density: positive is solid, negative is air.
    pub density: f32,
    /// The nearest cell to the sampled point.
    pub cell: CellId,
}

/// Continuous signed density over the planet volume.
///
/// Cheap to clone across workers; the cell graph is shared behind an [`Arc`].
#[derive(Clone)]
pub struct DensityField {
    graph: Arc<CellGraph>,
    params: FieldParams,
    noise: Perlin,
}

impl DensityField {
    /// Build a field over the given cell graph.
    pub fn new(graph: Arc<CellGraph>, params: FieldParams) -> Self {
        let noise = Perlin::new(params.seed);
        Self {
            graph,
            params,
            noise,
        }
    }

    /// The shape parameters this field was built with.
    pub fn params(&self) -> &FieldParams {
        &self.params
    }

    /// The underlying cell graph.
    pub fn graph(&self) -> &Arc<CellGraph> {
        &self.graph
    }

    /// Noise detail term in `[0, 1]` at a world position.
    fn noise3(&self, point: Vec3) -> f32 {
        // Perlin yields [-1, 1]; remap to the [0, 1] contract.
        let n = self
            .noise
            .get([point.x as f64, point.y as f64, point.z as f64]);
        (n as f32) * 0.5 + 0.5
    }

    /// Sample the full density (with noise detail) at a world position.
    ///
    /// `hint` seeds the nearest-cell walk; pass the enclosing octree node's
    /// cached cell. Locator failure is propagated, never masked: it signals
    /// corrupted simulation input and aborts the chunk build.
    pub fn sample(&self, point: Vec3, hint: CellId) -> Result<Sample, CellGraphError> {
        self.sample_inner(point, hint, true)
    }

    /// Sample the density without the noise detail term.
    ///
    /// Foliage surface projection bisects on this variant; it must agree
    /// with the meshed surface's base shape so instances neither float nor
    /// sink, while staying monotonic along the radial direction.
    pub fn sample_base(&self, point: Vec3, hint: CellId) -> Result<Sample, CellGraphError> {
        self.sample_inner(point, hint, false)
    }

    fn sample_inner(
        &self,
        point: Vec3,
        hint: CellId,
        with_noise: bool,
    ) -> Result<Sample, CellGraphError> {
        let direction = point.normalize_or(Vec3::Y);
        let cell = self.graph.locate(direction, hint)?;
        let sim_height = self.graph.interpolate_height(direction, cell);

        let detail = if with_noise {
            (self.noise3(point) - 0.5) * self.params.noise_scale
        } else {
            0.0
        };

        let surface_radius =
            self.params.planet_radius + (sim_height + detail) * self.params.terrain_height;
        Ok(Sample {
            density: surface_radius - point.length(),
            cell,
        })
    }

    /// Nearest cell to a world position, for material tagging.
    pub fn cell_of(&self, point: Vec3, hint: CellId) -> Result<CellId, CellGraphError> {
        self.graph.locate(point.normalize_or(Vec3::Y), hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn octahedron_graph() -> Arc<CellGraph> {
        let positions = vec![Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        let neighbours = vec![
            vec![2, 4, 3, 5],
            vec![2, 5, 3, 4],
            vec![0, 5, 1, 4],
            vec![0, 4, 1, 5],
            vec![0, 2, 1, 3],
            vec![0, 3, 1, 2],
        ];
        Arc::new(
            CellGraph::new(
                positions,
                neighbours,
                vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
                vec![0.0; 6],
                vec![Vec3::ZERO; 6],
                vec![0, 1, 2, 3, 4, 5],
            )
            .unwrap(),
        )
    }

    fn field() -> DensityField {
        DensityField::new(
            octahedron_graph(),
            FieldParams {
                planet_radius: 12_000.0,
                terrain_height: 1_000.0,
                noise_scale: 0.05,
                seed: 7,
            },
        )
    }

    #[test]
    fn test_sign_convention_solid_inside_air_outside() {
        let f = field();
        let deep = f.sample(Vec3::X * 6_000.0, 0).unwrap();
        assert!(deep.density > 0.0, "deep interior should be solid");

        let space = f.sample(Vec3::X * 20_000.0, 0).unwrap();
        assert!(space.density < 0.0, "far outside should be air");
    }

    #[test]
    fn test_base_surface_at_expected_radius() {
        let f = field();
        // Above +X the simulated height is 0.1, so the noise-free surface
        // sits at 12000 + 0.1 * 1000 = 12100.
        let at_surface = f.sample_base(Vec3::X * 12_100.0, 0).unwrap();
        assert!(
            at_surface.density.abs() < 1e-2,
            "expected ~0 at surface, got {}",
            at_surface.density
        );
        assert_eq!(at_surface.cell, 0);
    }

    #[test]
    fn test_noise_term_is_bounded() {
        let f = field();
        // The noise detail can move the surface by at most
        // noise_scale/2 * terrain_height = 25 world units.
        let p = Vec3::new(0.4, 0.8, 0.3).normalize() * 12_000.0;
        let with = f.sample(p, 0).unwrap().density;
        let without = f.sample_base(p, 0).unwrap().density;
        assert!(
            (with - without).abs() <= 0.5 * f.params().noise_scale * f.params().terrain_height
                + 1e-3,
            "noise moved surface by {}",
            (with - without).abs()
        );
    }

    #[test]
    fn test_base_field_monotonic_along_radial() {
        let f = field();
        let dir = Vec3::new(0.2, 0.9, 0.4).normalize();
        let mut prev = f.sample_base(dir * 11_000.0, 0).unwrap().density;
        for step in 1..=20 {
            let r = 11_000.0 + step as f32 * 100.0;
            let d = f.sample_base(dir * r, 0).unwrap().density;
            assert!(d < prev, "density must strictly decrease outward");
            prev = d;
        }
    }

    #[test]
    fn test_planet_center_is_finite_solid() {
        // The degenerate grid point with no direction: chunks spanning the
        // center sample it like any other voxel.
        let f = field();
        let s = f.sample(Vec3::ZERO, 0).unwrap();
        assert!(s.density.is_finite(), "density at center must be finite");
        assert!(s.density > 0.0, "the planet center is deep inside the solid");

        let base = f.sample_base(Vec3::ZERO, 0).unwrap();
        assert!(base.density.is_finite());
        assert!(base.density > 0.0);
    }

    #[test]
    fn test_sample_is_deterministic() {
        let f = field();
        let p = Vec3::new(3000.0, 8000.0, -4000.0);
        let a = f.sample(p, 0).unwrap();
        let b = f.sample(p, 3).unwrap();
        assert_eq!(a.density, b.density);
        assert_eq!(a.cell, b.cell);
    }
}
