//! Spherical barycentric interpolation over the cell graph.
//!
//! Generalizes planar barycentric interpolation to the sphere: the query
//! direction is located inside a spherical Delaunay triangle formed by the
//! nearest cell and two consecutive ring neighbours, and the three vertex
//! values are blended by signed spherical-excess area ratios. Exact at the
//! triangle vertices.

use glam::Vec3;

use crate::graph::{CellGraph, CellId};

/// Signed area of the spherical triangle `(a, b, c)` on the unit sphere,
/// via the spherical excess formula
/// `atan2(a · (b × c), 1 + a·b + b·c + c·a)`.
pub fn spherical_area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (a.dot(b.cross(c))).atan2(1.0 + a.dot(b) + b.dot(c) + c.dot(a))
}

/// Membership test for a direction in the spherical triangle `(a, b, c)`:
/// the signs of `p` against the three great-circle normals must agree.
/// Boundary points (any zero) pass.
fn in_spherical_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let s1 = a.cross(b).dot(p);
    let s2 = b.cross(c).dot(p);
    let s3 = c.cross(a).dot(p);
    (s1 >= 0.0 && s2 >= 0.0 && s3 >= 0.0) || (s1 <= 0.0 && s2 <= 0.0 && s3 <= 0.0)
}

/// Guard against division by a vanishing triangle area.
const MIN_TOTAL_AREA: f32 = 1e-12;

impl CellGraph {
    /// Find the spherical Delaunay triangle around `closest` containing the
    /// direction `p`: the first consecutive neighbour pair `(b, c)` whose
    /// triangle with `closest` passes the membership test wins. Degenerate
    /// and boundary cases fall back to the first two ring neighbours.
    ///
    /// Returns `None` when the ring has fewer than two entries.
    pub fn find_delaunay_triangle(&self, closest: CellId, p: Vec3) -> Option<[CellId; 3]> {
        let ring = self.neighbours(closest);
        if ring.len() < 2 {
            return None;
        }

        let center = self.position(closest);
        for i in 0..ring.len() {
            let b_id = ring[i];
            let c_id = ring[(i + 1) % ring.len()];
            let b = self.position(b_id);
            let c = self.position(c_id);
            if in_spherical_triangle(p, center, b, c) {
                return Some([closest, b_id, c_id]);
            }
        }

        Some([closest, ring[0], ring[1]])
    }

    /// Barycentric weights of `position` within the resolved triangle, as
    /// `(triangle, weights)`. Weight `i` is the area ratio of the
    /// sub-triangle opposite vertex `i`; the three sum to one. A vanishing
    /// total area collapses all weight onto the nearest vertex.
    pub fn barycentric_weights(
        &self,
        position: Vec3,
        closest: CellId,
    ) -> Option<([CellId; 3], [f32; 3])> {
        let tri = self.find_delaunay_triangle(closest, position)?;
        let a = self.position(tri[0]);
        let b = self.position(tri[1]);
        let c = self.position(tri[2]);
        // A zero-length query has no direction; collapse onto the nearest
        // vertex instead of emitting NaN weights.
        let p = position.normalize_or(a);

        let total = spherical_area(a, b, c);
        if total.abs() < MIN_TOTAL_AREA {
            return Some((tri, [1.0, 0.0, 0.0]));
        }

        let wa = spherical_area(p, b, c) / total;
        let wb = spherical_area(a, p, c) / total;
        let wc = spherical_area(a, b, p) / total;
        Some((tri, [wa, wb, wc]))
    }

    /// Interpolate the simulated height field at an arbitrary direction.
    ///
    /// `closest` must be the nearest cell to `position` (from
    /// [`CellGraph::locate`]); a ring too small to form a triangle degrades
    /// to the nearest cell's own height.
    pub fn interpolate_height(&self, position: Vec3, closest: CellId) -> f32 {
        match self.barycentric_weights(position, closest) {
            Some((tri, w)) => {
                self.height(tri[0]) * w[0] + self.height(tri[1]) * w[1] + self.height(tri[2]) * w[2]
            }
            None => self.height(closest),
        }
    }
}
