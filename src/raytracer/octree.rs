// raytracer/octree.rs — spatial index over the scene's objects
//
// Nodes live in one arena addressed by `NodeId`; the root is node 0. A
// branch splits its box at the midpoint into eight octants, and a leaf lists
// every object whose bounding box touches it, so one object may appear in
// several leaves.
//
// Containment is half-open, `[min, max)` per axis, except on faces that lie
// on the root's max faces, which are closed. A point on a face shared by two
// siblings therefore resolves to exactly one of them.
//
// Ray traversal walks leaves front to back by opening only children whose
// closed box the ray touches, nearest entry first. Child faces are
// copied from the parent's midpoint, so a ray lying exactly in a split plane
// reaches the leaves on both sides of it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::trace;

use crate::config::OctreeConfig;
use crate::math::Vec3;

use super::bounds::BoundingBox;
use super::object::RTObject;
use super::ray::Ray;

/// Index of a node in its octree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Branch { mid: Vec3, children: [NodeId; 8] },
    Leaf { objects: Vec<usize> },
}

#[derive(Debug, Clone)]
pub struct OctreeNode {
    bounds: BoundingBox,
    depth: u32,
    kind: NodeKind,
}

impl OctreeNode {
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Root is depth 0.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Object indices for a leaf, `None` for a branch.
    pub fn objects(&self) -> Option<&[usize]> {
        match &self.kind {
            NodeKind::Leaf { objects } => Some(objects),
            NodeKind::Branch { .. } => None,
        }
    }

    /// Children in octant order, `None` for a leaf.
    pub fn children(&self) -> Option<&[NodeId; 8]> {
        match &self.kind {
            NodeKind::Branch { children, .. } => Some(children),
            NodeKind::Leaf { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    leaves: Vec<NodeId>,
}

struct Builder<'a> {
    object_bounds: &'a [BoundingBox],
    config: &'a OctreeConfig,
    nodes: Vec<OctreeNode>,
    leaves: Vec<NodeId>,
}

impl Builder<'_> {
    fn push(&mut self, bounds: BoundingBox, depth: u32, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        if matches!(kind, NodeKind::Leaf { .. }) {
            self.leaves.push(id);
        }
        self.nodes.push(OctreeNode { bounds, depth, kind });
        id
    }

    /// `parent_len` is the object count of the parent. A split that left this
    /// node with all of its parent's objects made no progress, and splitting
    /// again would not either.
    fn node(&mut self, bounds: BoundingBox, objects: Vec<usize>, depth: u32, parent_len: Option<usize>) -> NodeId {
        let size = bounds.size();
        let min_edge = size.x.min(size.y).min(size.z);
        let stalled = parent_len == Some(objects.len());
        if objects.len() <= self.config.max_leaf_objects
            || depth >= self.config.max_depth
            || min_edge < self.config.min_node_size
            || stalled
        {
            return self.push(bounds, depth, NodeKind::Leaf { objects });
        }

        let mid = bounds.center();
        let id = self.push(
            bounds,
            depth,
            NodeKind::Branch {
                mid,
                children: [NodeId::ROOT; 8],
            },
        );
        let mut children = [id; 8];
        for (i, child) in children.iter_mut().enumerate() {
            let child_bounds = bounds.octant(mid, i);
            let subset: Vec<usize> = objects
                .iter()
                .copied()
                .filter(|&o| self.object_bounds[o].intersects(&child_bounds))
                .collect();
            *child = self.node(child_bounds, subset, depth + 1, Some(objects.len()));
        }
        if let NodeKind::Branch { children: slot, .. } = &mut self.nodes[id.index()].kind {
            *slot = children;
        }
        id
    }
}

impl Octree {
    /// Index `objects`. The root box is the union of their bounds.
    pub fn build(objects: &[Box<dyn RTObject>], config: &OctreeConfig) -> Octree {
        let bounds: Vec<BoundingBox> = objects.iter().map(|o| o.bounds()).collect();
        let root = bounds.iter().fold(BoundingBox::empty(), |acc, b| acc.union(b));
        let root = if root.is_empty() {
            BoundingBox::new(Vec3::ZERO, Vec3::ZERO)
        } else {
            root
        };
        Self::from_bounds(root, &bounds, config)
    }

    /// Index objects given only their bounding boxes, inside `root`.
    pub fn from_bounds(root: BoundingBox, object_bounds: &[BoundingBox], config: &OctreeConfig) -> Octree {
        let mut builder = Builder {
            object_bounds,
            config,
            nodes: Vec::new(),
            leaves: Vec::new(),
        };
        let all: Vec<usize> = (0..object_bounds.len())
            .filter(|&o| object_bounds[o].intersects(&root))
            .collect();
        builder.node(root, all, 0, None);
        let tree = Octree {
            nodes: builder.nodes,
            leaves: builder.leaves,
        };
        trace!(
            "octree: {} objects, {} nodes, {} leaves, depth {}",
            object_bounds.len(),
            tree.nodes.len(),
            tree.leaves.len(),
            tree.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
        );
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.nodes[0].bounds
    }

    /// Panics on an id from another tree that is out of range.
    pub fn node(&self, id: NodeId) -> &OctreeNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    /// Whether `p` lies in node `id` under the half-open convention.
    pub fn contains(&self, id: NodeId, p: Vec3) -> bool {
        let b = &self.node(id).bounds;
        let root = self.bounds();
        (0..3).all(|a| {
            p[a] >= b.min[a] && (p[a] < b.max[a] || (p[a] == b.max[a] && b.max[a] == root.max[a]))
        })
    }

    /// The leaf containing `p`, or `None` outside the root.
    pub fn find_node(&self, p: Vec3) -> Option<NodeId> {
        if !self.contains(NodeId::ROOT, p) {
            return None;
        }
        Some(self.descend(p))
    }

    /// Descend to the leaf holding `p` under the half-open convention.
    fn descend(&self, p: Vec3) -> NodeId {
        let mut id = NodeId::ROOT;
        while let NodeKind::Branch { mid, children } = &self.nodes[id.index()].kind {
            let mut octant = 0;
            for a in 0..3 {
                if p[a] >= mid[a] {
                    octant |= 1 << a;
                }
            }
            id = children[octant];
        }
        id
    }

    /// The first leaf the ray touches, or `None` if it misses the root.
    pub fn find_first_node(&self, ray: &Ray) -> Option<NodeId> {
        self.traverse(ray).next()
    }

    /// The leaf after `current` along the ray, or `None` once the ray leaves
    /// the root. Never returns `current`. Walks the traversal from the
    /// start, so stepping a whole ray through this is quadratic; use
    /// [`Octree::traverse`] for that.
    pub fn find_next_node(&self, ray: &Ray, current: NodeId) -> Option<NodeId> {
        let mut leaves = self.traverse(ray);
        leaves.find(|&leaf| leaf == current)?;
        leaves.next()
    }

    /// Leaves whose closed box the ray touches, ordered by entry distance.
    /// A ray lying in a split plane touches the leaves on both sides of it;
    /// equal entry distances are broken deterministically.
    pub fn traverse<'a>(&'a self, ray: &'a Ray) -> Traversal<'a> {
        let mut pending = BinaryHeap::new();
        if let Some((t, _)) = self.nodes.first().and_then(|root| ray.slab_interval(&root.bounds)) {
            pending.push(Pending { t, id: NodeId::ROOT });
        }
        Traversal {
            tree: self,
            ray,
            pending,
        }
    }
}

/// A node waiting to be opened, keyed by where the ray enters it.
#[derive(Debug, Clone, Copy)]
struct Pending {
    t: f64,
    id: NodeId,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Reversed so the max-heap pops the nearest node first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.t.total_cmp(&self.t).then_with(|| other.id.cmp(&self.id))
    }
}

/// Iterator returned by [`Octree::traverse`]. A child is never entered
/// before its parent, so opening nodes nearest-first yields the leaves in
/// order of entry distance.
pub struct Traversal<'a> {
    tree: &'a Octree,
    ray: &'a Ray,
    pending: BinaryHeap<Pending>,
}

impl Iterator for Traversal<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(Pending { id, .. }) = self.pending.pop() {
            let NodeKind::Branch { children, .. } = &self.tree.nodes[id.index()].kind else {
                return Some(id);
            };
            for &child in children {
                if let Some((t, _)) = self.ray.slab_interval(&self.tree.nodes[child.index()].bounds) {
                    self.pending.push(Pending { t, id: child });
                }
            }
        }
        None
    }
}
