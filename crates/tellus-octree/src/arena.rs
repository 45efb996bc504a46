//! Index-arena storage for octree nodes.

use glam::Vec3;
use tellus_cells::CellId;

/// Arena index of a node. Stable for the node's lifetime; slots are recycled
/// through a free list after collapse.
pub type NodeId = u32;

/// One octree node.
///
/// Invariant: a node has either `children` or a `chunk`, never both. The
/// rebuild pass releases the chunk before subdividing and collapses the
/// children (releasing every descendant chunk first) before the node can
/// hold content again.
pub struct Node<C> {
    /// Minimum corner of the node's cube.
    pub origin: Vec3,
    /// Edge length of the cube.
    pub side_length: f32,
    /// Levels below the root (root = 0).
    pub depth: i32,
    /// Log2 of subdivision levels remaining; 0 means leaf-eligible at full
    /// resolution.
    pub size: i32,
    /// Cached nearest cell to the node center, refined incrementally from
    /// the parent's cache and used as the locator hint for all sampling
    /// inside the node.
    pub cell: CellId,
    /// Stable identity: the child-index digits (0-7) from the root. Keys the
    /// disk cache and names the node in logs.
    pub path: String,
    /// Parent slot; `None` for the root.
    pub parent: Option<NodeId>,
    /// Child slots, in octant order (zyx bit order: +x is bit 2).
    pub children: Option<[NodeId; 8]>,
    /// Attached content, when the node is a built leaf.
    pub chunk: Option<C>,
}

impl<C> Node<C> {
    /// Center of the node's cube.
    pub fn center(&self) -> Vec3 {
        self.origin + Vec3::splat(self.side_length * 0.5)
    }

    /// True when the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Octant corner offsets in units of the child side length.
pub(crate) const OCTANT_OFFSETS: [Vec3; 8] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(0.0, 1.0, 1.0),
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(1.0, 0.0, 1.0),
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(1.0, 1.0, 1.0),
];

/// Sphere-bounding octree over generic leaf content `C`.
pub struct Octree<C> {
    slots: Vec<Option<Node<C>>>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl<C> Octree<C> {
    /// Create a tree whose root bounds the whole planet.
    ///
    /// The root side is the smallest power-of-two multiple of
    /// `base_chunk_edge` that exceeds the planet diameter plus a safety
    /// margin of 1.2 × terrain height on each side; the cube is centered on
    /// the planet origin. The root's `size` is the number of doublings
    /// applied, i.e. how many subdivision levels reach base chunk
    /// resolution.
    pub fn new(planet_radius: f32, terrain_height: f32, base_chunk_edge: f32) -> Self {
        let margin = 1.2 * terrain_height;
        let diameter = 2.0 * planet_radius + 2.0 * margin;

        let mut side = base_chunk_edge;
        let mut size = 0;
        while side < diameter {
            side *= 2.0;
            size += 1;
        }

        let root_node = Node {
            origin: Vec3::splat(-side * 0.5),
            side_length: side,
            depth: 0,
            size,
            cell: 0,
            path: String::new(),
            parent: None,
            children: None,
            chunk: None,
        };

        Self {
            slots: vec![Some(root_node)],
            free: Vec::new(),
            root: 0,
        }
    }

    /// The root node's id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node.
    ///
    /// # Panics
    /// If the id does not refer to a live node; ids handed out by this tree
    /// stay valid until the node collapses.
    pub fn node(&self, id: NodeId) -> &Node<C> {
        self.slots[id as usize].as_ref().expect("live octree node")
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<C> {
        self.slots[id as usize].as_mut().expect("live octree node")
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Allocate a slot, reusing the free list when possible.
    pub(crate) fn alloc(&mut self, node: Node<C>) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(node);
            id
        } else {
            self.slots.push(Some(node));
            (self.slots.len() - 1) as NodeId
        }
    }

    /// Release a slot back to the free list, returning the node.
    pub(crate) fn dealloc(&mut self, id: NodeId) -> Node<C> {
        let node = self.slots[id as usize].take().expect("live octree node");
        self.free.push(id);
        node
    }

    /// Attach content to a leaf.
    ///
    /// # Panics
    /// If the node currently has children; that would violate the
    /// children-xor-chunk invariant.
    pub fn attach_chunk(&mut self, id: NodeId, chunk: C) {
        let node = self.node_mut(id);
        assert!(
            node.children.is_none(),
            "cannot attach a chunk to a subdivided node (path {:?})",
            node.path
        );
        node.chunk = Some(chunk);
    }

    /// Visit every live leaf id, depth-first from the root.
    pub fn for_each_leaf(&self, mut visit: impl FnMut(NodeId, &Node<C>)) {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            match node.children {
                Some(children) => stack.extend(children),
                None => visit(id, node),
            }
        }
    }

    /// Verify the children-xor-chunk invariant over the whole tree.
    /// Test support; walks every live node.
    pub fn check_invariant(&self) -> bool {
        let mut ok = true;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if node.children.is_some() && node.chunk.is_some() {
                ok = false;
            }
            if let Some(children) = node.children {
                stack.extend(children);
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_side_is_power_of_two_multiple_of_chunk_edge() {
        let tree: Octree<()> = Octree::new(12_000.0, 1_000.0, 32.0);
        let root = tree.node(tree.root());

        // Smallest power-of-two multiple of 32 covering
        // 2 * 12000 + 2 * 1200 = 26400 is 32768.
        assert_eq!(root.side_length, 32_768.0);
        assert_eq!(root.size, 10);
        assert_eq!(root.origin, Vec3::splat(-16_384.0));
        assert_eq!(root.depth, 0);
    }

    #[test]
    fn test_root_is_centered_on_origin() {
        let tree: Octree<()> = Octree::new(6_000.0, 500.0, 32.0);
        let root = tree.node(tree.root());
        assert_eq!(root.center(), Vec3::ZERO);
    }

    #[test]
    fn test_alloc_reuses_freed_slots() {
        let mut tree: Octree<u8> = Octree::new(100.0, 10.0, 32.0);
        let node = Node {
            origin: Vec3::ZERO,
            side_length: 1.0,
            depth: 1,
            size: 0,
            cell: 0,
            path: "0".into(),
            parent: Some(tree.root()),
            children: None,
            chunk: None,
        };
        let id = tree.alloc(node);
        assert_eq!(tree.node_count(), 2);
        tree.dealloc(id);
        assert_eq!(tree.node_count(), 1);

        let node2 = Node {
            origin: Vec3::ONE,
            side_length: 1.0,
            depth: 1,
            size: 0,
            cell: 0,
            path: "1".into(),
            parent: Some(tree.root()),
            children: None,
            chunk: None,
        };
        let id2 = tree.alloc(node2);
        assert_eq!(id2, id, "free list should recycle the slot");
    }
}
