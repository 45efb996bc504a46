//! The top-down rebuild pass: subdivision, collapse, and the pending queue.

use glam::Vec3;
use tellus_cells::CellGraphError;
use tellus_field::DensityField;
use tracing::trace;

use crate::HALF_SQRT3;
use crate::arena::{Node, NodeId, OCTANT_OFFSETS, Octree};

/// Tuning of the subdivision predicate.
#[derive(Clone, Copy, Debug)]
pub struct LodPolicy {
    /// Camera distance within which nodes keep subdividing.
    pub render_distance: f32,
    /// Hard depth cap; nodes at this depth never subdivide.
    pub max_depth: i32,
    /// Leaves acquire content only when `size <= leaf_size_floor`. Terrain
    /// uses `i32::MAX` (every leaf gets a chunk); foliage stops earlier and
    /// covers the remainder with larger placement footprints.
    pub leaf_size_floor: i32,
}

/// What one rebuild pass changed.
///
/// The pass itself never builds content: it reports leaves that now need a
/// chunk (`pending`) and hands back every chunk it tore down (`released`)
/// so the caller can emit detach commands before the content is dropped.
pub struct RebuildOutcome<C> {
    /// Leaves awaiting content, in visit order.
    pub pending: Vec<NodeId>,
    /// Chunks released by subdivision or collapse, keyed by node path.
    pub released: Vec<(String, C)>,
}

impl<C> Default for RebuildOutcome<C> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            released: Vec::new(),
        }
    }
}

impl<C> Octree<C> {
    /// Re-evaluate the whole tree against a camera position.
    ///
    /// A node subdivides iff it has levels remaining, its depth is under the
    /// cap, the camera is within `render_distance` of its bounding sphere,
    /// and (except at the root, which always bootstraps) the density at its
    /// center is small enough that the surface might pass through it. A node
    /// failing the predicate collapses its subtree depth-first and joins the
    /// pending queue unless it already holds content.
    ///
    /// Locator or density failures abort the pass; the tree is left
    /// structurally valid (children-xor-chunk holds at every node).
    pub fn rebuild(
        &mut self,
        camera: Vec3,
        field: &DensityField,
        policy: &LodPolicy,
    ) -> Result<RebuildOutcome<C>, CellGraphError> {
        let mut outcome = RebuildOutcome::default();
        self.rebuild_node(self.root(), camera, field, policy, &mut outcome)?;
        trace!(
            pending = outcome.pending.len(),
            released = outcome.released.len(),
            nodes = self.node_count(),
            "octree rebuild pass"
        );
        Ok(outcome)
    }

    fn rebuild_node(
        &mut self,
        id: NodeId,
        camera: Vec3,
        field: &DensityField,
        policy: &LodPolicy,
        outcome: &mut RebuildOutcome<C>,
    ) -> Result<(), CellGraphError> {
        let (center, side, depth, size, hint) = {
            let node = self.node(id);
            (
                node.center(),
                node.side_length,
                node.depth,
                node.size,
                node.cell,
            )
        };

        // Refine the cached nearest cell from the inherited hint; children
        // start their own walks from here.
        let cell = field.cell_of(center, hint)?;
        self.node_mut(id).cell = cell;

        let bound = side * HALF_SQRT3;
        let should_subdivide = size > 0
            && depth < policy.max_depth
            && camera.distance(center) <= policy.render_distance + bound
            && (depth == 0 || field.sample(center, cell)?.density.abs() <= bound);

        if should_subdivide {
            // Subdividing a built leaf collapses it one level: release the
            // chunk before the children exist.
            if let Some(chunk) = self.node_mut(id).chunk.take() {
                let path = self.node(id).path.clone();
                outcome.released.push((path, chunk));
            }

            let children = match self.node(id).children {
                Some(children) => children,
                None => self.subdivide(id, cell),
            };
            for child in children {
                self.rebuild_node(child, camera, field, policy, outcome)?;
            }
        } else {
            if self.node(id).children.is_some() {
                self.collapse_children(id, &mut outcome.released);
            }
            let node = self.node(id);
            if node.chunk.is_none() && node.size <= policy.leaf_size_floor {
                outcome.pending.push(id);
            }
        }

        Ok(())
    }

    /// Create the eight equal-octant children of a leaf. Each inherits the
    /// parent's cached cell as its locator hint and extends the parent's
    /// path by its octant digit.
    fn subdivide(&mut self, id: NodeId, cell: tellus_cells::CellId) -> [NodeId; 8] {
        let (origin, side, depth, size, path) = {
            let node = self.node(id);
            debug_assert!(node.chunk.is_none(), "subdividing a node holding a chunk");
            (
                node.origin,
                node.side_length,
                node.depth,
                node.size,
                node.path.clone(),
            )
        };

        let half = side * 0.5;
        let mut children = [0 as NodeId; 8];
        for (octant, offset) in OCTANT_OFFSETS.iter().enumerate() {
            let mut child_path = path.clone();
            child_path.push(char::from_digit(octant as u32, 8).unwrap_or('0'));
            children[octant] = self.alloc(Node {
                origin: origin + *offset * half,
                side_length: half,
                depth: depth + 1,
                size: size - 1,
                cell,
                path: child_path,
                parent: Some(id),
                children: None,
                chunk: None,
            });
        }
        self.node_mut(id).children = Some(children);
        children
    }

    /// Collapse a node's subtree, releasing every descendant chunk
    /// innermost-first before the slots return to the free list.
    fn collapse_children(&mut self, id: NodeId, released: &mut Vec<(String, C)>) {
        let Some(children) = self.node_mut(id).children.take() else {
            return;
        };
        for child in children {
            self.collapse_children(child, released);
            let mut node = self.dealloc(child);
            if let Some(chunk) = node.chunk.take() {
                released.push((node.path, chunk));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tellus_cells::CellGraph;
    use tellus_field::{DensityField, FieldParams};

    fn octahedron_field(radius: f32, height: f32) -> DensityField {
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
            vec![0; 6],
        )
        .unwrap();
        DensityField::new(
            Arc::new(graph),
            FieldParams {
                planet_radius: radius,
                terrain_height: height,
                noise_scale: 0.0,
                seed: 0,
            },
        )
    }

    fn policy(max_depth: i32) -> LodPolicy {
        LodPolicy {
            render_distance: 300.0,
            max_depth,
            leaf_size_floor: i32::MAX,
        }
    }

    #[test]
    fn test_rebuild_bootstraps_root_and_respects_depth_cap() {
        let field = octahedron_field(12_000.0, 1_000.0);
        let mut tree: Octree<()> = Octree::new(12_000.0, 1_000.0, 32.0);
        let camera = Vec3::X * 12_200.0;

        tree.rebuild(camera, &field, &policy(4)).unwrap();

        assert!(tree.check_invariant());
        // Root always subdivides, so at least 9 nodes exist; the depth-4 cap
        // bounds the full tree well under 8^4 interior expansion.
        let count = tree.node_count();
        assert!(count > 8, "root must subdivide, got {count} nodes");
        let mut max_depth = 0;
        tree.for_each_leaf(|_, node| max_depth = max_depth.max(node.depth));
        assert!(max_depth <= 4);
    }

    #[test]
    fn test_pending_leaves_are_chunkless() {
        let field = octahedron_field(12_000.0, 1_000.0);
        let mut tree: Octree<u32> = Octree::new(12_000.0, 1_000.0, 32.0);
        let camera = Vec3::X * 12_200.0;

        let outcome = tree.rebuild(camera, &field, &policy(3)).unwrap();
        for &id in &outcome.pending {
            let node = tree.node(id);
            assert!(node.is_leaf());
            assert!(node.chunk.is_none());
        }
    }

    #[test]
    fn test_built_leaf_not_reenqueued() {
        let field = octahedron_field(12_000.0, 1_000.0);
        let mut tree: Octree<u32> = Octree::new(12_000.0, 1_000.0, 32.0);
        let camera = Vec3::X * 12_200.0;

        let outcome = tree.rebuild(camera, &field, &policy(3)).unwrap();
        for &id in &outcome.pending {
            tree.attach_chunk(id, 7);
        }

        // Same camera: the tree is stable, nothing pending, nothing torn down.
        let again = tree.rebuild(camera, &field, &policy(3)).unwrap();
        assert!(again.pending.is_empty());
        assert!(again.released.is_empty());
        assert!(tree.check_invariant());
    }

    #[test]
    fn test_camera_leaving_collapses_and_releases_all_chunks() {
        let field = octahedron_field(12_000.0, 1_000.0);
        let mut tree: Octree<u32> = Octree::new(12_000.0, 1_000.0, 32.0);
        let near = Vec3::X * 12_200.0;

        let outcome = tree.rebuild(near, &field, &policy(3)).unwrap();
        let built = outcome.pending.len();
        assert!(built > 0);
        for &id in &outcome.pending {
            tree.attach_chunk(id, 1);
        }

        // Move the camera to the far side of the planet: the near-side
        // subtree must collapse and hand back every chunk it held.
        let far = Vec3::NEG_X * 12_200.0;
        let moved = tree.rebuild(far, &field, &policy(3)).unwrap();

        assert!(tree.check_invariant());
        let released_near: Vec<_> = moved
            .released
            .iter()
            .filter(|(path, _)| !path.is_empty())
            .collect();
        assert!(
            !released_near.is_empty(),
            "moving away must release previously built chunks"
        );

        // No live node still holds a chunk that was reported released.
        let mut live_paths = Vec::new();
        tree.for_each_leaf(|_, node| {
            if node.chunk.is_some() {
                live_paths.push(node.path.clone());
            }
        });
        for (path, _) in &moved.released {
            assert!(
                !live_paths.contains(path),
                "path {path:?} both released and live"
            );
        }
    }

    #[test]
    fn test_scenario_root_sizing_and_node_bound() {
        // Planet-scale defaults: radius 12000, terrain height 1000, chunk
        // edge 32, depth limit 4.
        let field = octahedron_field(12_000.0, 1_000.0);
        let mut tree: Octree<()> = Octree::new(12_000.0, 1_000.0, 32.0);

        let root = tree.node(tree.root());
        assert_eq!(root.side_length, 32_768.0);

        tree.rebuild(Vec3::X * 12_100.0, &field, &policy(4)).unwrap();
        // Interior nodes + leaves can never exceed the full 4-level tree.
        let full: usize = (0..=4).map(|d| 8_usize.pow(d)).sum();
        assert!(tree.node_count() <= full);
        assert!(tree.check_invariant());
    }

    #[test]
    fn test_leaf_size_floor_gates_pending() {
        let field = octahedron_field(12_000.0, 1_000.0);
        let mut tree: Octree<()> = Octree::new(12_000.0, 1_000.0, 32.0);
        let pol = LodPolicy {
            render_distance: 300.0,
            max_depth: 3,
            leaf_size_floor: 2,
        };

        let outcome = tree.rebuild(Vec3::X * 12_200.0, &field, &pol).unwrap();
        for &id in &outcome.pending {
            assert!(tree.node(id).size <= 2);
        }
    }
}
