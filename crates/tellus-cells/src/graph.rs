//! The immutable spherical cell dataset.

use glam::Vec3;

/// Index of a cell in the graph. Ids are dense, `0..cell_count`.
pub type CellId = u32;

/// Errors raised while ingesting or querying the cell graph.
#[derive(Debug, thiserror::Error)]
pub enum CellGraphError {
    /// A parallel array does not match the length of `positions`.
    #[error("parallel array `{field}` has {actual} entries, expected {expected}")]
    LengthMismatch {
        /// Name of the offending array.
        field: &'static str,
        /// Length of `positions`.
        expected: usize,
        /// Actual length supplied.
        actual: usize,
    },

    /// The dataset contains no cells at all.
    #[error("cell graph is empty")]
    Empty,

    /// An adjacency entry references a cell id outside `0..cell_count`.
    #[error("cell {cell} lists neighbour {neighbour}, but only {count} cells exist")]
    NeighbourOutOfRange {
        /// Cell whose adjacency list is malformed.
        cell: CellId,
        /// The out-of-range neighbour id.
        neighbour: CellId,
        /// Total number of cells.
        count: usize,
    },

    /// A query was issued with a cell id outside `0..cell_count`.
    #[error("cell id {0} is out of range")]
    CellOutOfRange(CellId),

    /// The nearest-cell walk exceeded its move budget. A strictly improving
    /// walk can never revisit a cell, so this only trips on a malformed
    /// adjacency graph and is fatal for the caller.
    #[error("cell locator failed to converge within {0} moves; adjacency graph is malformed")]
    LocatorDiverged(usize),
}

/// The read-only spherical cell partition produced by the planet simulation.
///
/// Five parallel arrays indexed by [`CellId`]: unit direction of each cell
/// center, an unordered-in-general (but ring-ordered where the simulation
/// provides it) adjacency list, and the per-cell scalar samples. The graph is
/// validated once on construction and never mutated afterwards.
pub struct CellGraph {
    positions: Vec<Vec3>,
    neighbours: Vec<Vec<CellId>>,
    heights: Vec<f32>,
    precipitation: Vec<f32>,
    wind: Vec<Vec3>,
    climate_zones: Vec<i32>,
}

impl CellGraph {
    /// Ingest the simulation's parallel arrays.
    ///
    /// Cell positions are re-normalized on the way in. Fails if the arrays
    /// disagree on length, the dataset is empty, or any adjacency entry is
    /// out of range. Asymmetric adjacency (B lists A but not vice versa) is
    /// tolerated; the locator copes with it.
    pub fn new(
        positions: Vec<Vec3>,
        neighbours: Vec<Vec<CellId>>,
        heights: Vec<f32>,
        precipitation: Vec<f32>,
        wind: Vec<Vec3>,
        climate_zones: Vec<i32>,
    ) -> Result<Self, CellGraphError> {
        let count = positions.len();
        if count == 0 {
            return Err(CellGraphError::Empty);
        }

        let check = |field: &'static str, actual: usize| {
            if actual == count {
                Ok(())
            } else {
                Err(CellGraphError::LengthMismatch {
                    field,
                    expected: count,
                    actual,
                })
            }
        };
        check("neighbours", neighbours.len())?;
        check("heights", heights.len())?;
        check("precipitation", precipitation.len())?;
        check("wind", wind.len())?;
        check("climate_zones", climate_zones.len())?;

        for (cell, ring) in neighbours.iter().enumerate() {
            for &n in ring {
                if n as usize >= count {
                    return Err(CellGraphError::NeighbourOutOfRange {
                        cell: cell as CellId,
                        neighbour: n,
                        count,
                    });
                }
            }
        }

        let positions = positions.into_iter().map(|p| p.normalize()).collect();

        Ok(Self {
            positions,
            neighbours,
            heights,
            precipitation,
            wind,
            climate_zones,
        })
    }

    /// Number of cells in the graph.
    pub fn cell_count(&self) -> usize {
        self.positions.len()
    }

    /// Unit direction of a cell's center.
    pub fn position(&self, cell: CellId) -> Vec3 {
        self.positions[cell as usize]
    }

    /// Ordered neighbour ring of a cell.
    pub fn neighbours(&self, cell: CellId) -> &[CellId] {
        &self.neighbours[cell as usize]
    }

    /// Simulated height of a cell, in terrain-height units.
    pub fn height(&self, cell: CellId) -> f32 {
        self.heights[cell as usize]
    }

    /// Annual precipitation sample of a cell.
    pub fn precipitation(&self, cell: CellId) -> f32 {
        self.precipitation[cell as usize]
    }

    /// Prevailing wind direction of a cell.
    pub fn wind(&self, cell: CellId) -> Vec3 {
        self.wind[cell as usize]
    }

    /// Climate zone id of a cell.
    pub fn climate_zone(&self, cell: CellId) -> i32 {
        self.climate_zones[cell as usize]
    }

    pub(crate) fn check_cell(&self, cell: CellId) -> Result<(), CellGraphError> {
        if (cell as usize) < self.cell_count() {
            Ok(())
        } else {
            Err(CellGraphError::CellOutOfRange(cell))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::test_fixtures::octahedron_graph;

    #[test]
    fn test_valid_graph_construction() {
        let graph = octahedron_graph();
        assert_eq!(graph.cell_count(), 6);
        assert_eq!(graph.neighbours(0).len(), 4);
    }

    #[test]
    fn test_accessors_return_per_cell_data() {
        let graph = CellGraph::new(
            vec![Vec3::X, Vec3::Y],
            vec![vec![1], vec![0]],
            vec![0.5, 0.7],
            vec![120.0, 450.0],
            vec![Vec3::Z, Vec3::NEG_Z],
            vec![2, 3],
        )
        .unwrap();
        assert_eq!(graph.height(0), 0.5);
        assert_eq!(graph.precipitation(0), 120.0);
        assert_eq!(graph.precipitation(1), 450.0);
        assert_eq!(graph.wind(0), Vec3::Z);
        assert_eq!(graph.wind(1), Vec3::NEG_Z);
        assert_eq!(graph.climate_zone(1), 3);
    }

    #[test]
    fn test_positions_are_normalized_on_ingest() {
        let graph = CellGraph::new(
            vec![Vec3::new(0.0, 3.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
            vec![vec![1], vec![0]],
            vec![0.5, 0.7],
            vec![0.0, 0.0],
            vec![Vec3::ZERO, Vec3::ZERO],
            vec![0, 1],
        )
        .unwrap();
        assert!((graph.position(0).length() - 1.0).abs() < 1e-6);
        assert!((graph.position(1).length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_graph_rejected() {
        let err = CellGraph::new(vec![], vec![], vec![], vec![], vec![], vec![]);
        assert!(matches!(err, Err(CellGraphError::Empty)));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = CellGraph::new(
            vec![Vec3::X, Vec3::Y],
            vec![vec![1], vec![0]],
            vec![0.5], // one short
            vec![0.0, 0.0],
            vec![Vec3::ZERO, Vec3::ZERO],
            vec![0, 1],
        );
        assert!(matches!(
            err,
            Err(CellGraphError::LengthMismatch {
                field: "heights",
                ..
            })
        ));
    }

    #[test]
    fn test_out_of_range_neighbour_rejected() {
        let err = CellGraph::new(
            vec![Vec3::X, Vec3::Y],
            vec![vec![1], vec![7]],
            vec![0.5, 0.7],
            vec![0.0, 0.0],
            vec![Vec3::ZERO, Vec3::ZERO],
            vec![0, 1],
        );
        assert!(matches!(
            err,
            Err(CellGraphError::NeighbourOutOfRange {
                cell: 1,
                neighbour: 7,
                ..
            })
        ));
    }
}
