//! Nearest-cell lookup by greedy hill-climb over the adjacency graph.

use glam::Vec3;

use crate::graph::{CellGraph, CellGraphError, CellId};

impl CellGraph {
    /// Find the cell whose center direction is closest to `direction`.
    ///
    /// Greedy first-improvement walk: starting at `hint`, scan the current
    /// cell's neighbour ring and move to the first neighbour whose dot
    /// product with `direction` strictly exceeds the current best. Ties are
    /// not adopted. Terminates when no neighbour improves.
    ///
    /// Correct whenever the cell regions are locally convex enough that the
    /// climb from a reasonably close hint reaches the global arg-max, which
    /// holds for the Voronoi-like tessellations the planet simulation emits.
    /// Callers should pass spatially coherent hints (e.g. the parent octree
    /// node's cached cell) for amortized near-constant cost.
    ///
    /// A strictly improving walk visits each cell at most once, so the walk
    /// is capped at `cell_count` moves; exceeding the cap means the
    /// adjacency graph is malformed and is reported as
    /// [`CellGraphError::LocatorDiverged`].
    pub fn locate(&self, direction: Vec3, hint: CellId) -> Result<CellId, CellGraphError> {
        self.check_cell(hint)?;

        let mut id = hint;
        let mut best = direction.dot(self.position(id));
        let budget = self.cell_count();

        for _ in 0..budget {
            let mut improved = false;
            for &n in self.neighbours(id) {
                let d = direction.dot(self.position(n));
                if d > best {
                    best = d;
                    id = n;
                    improved = true;
                    break;
                }
            }
            if !improved {
                return Ok(id);
            }
        }

        Err(CellGraphError::LocatorDiverged(budget))
    }
}
