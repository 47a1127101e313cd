//! Bounding volume hierarchy over a mesh snapshot.
//!
//! [`MeshAabbTree`] copies the geometry of every live triangle when it is
//! built and never looks at the source mesh again, so it stays valid while
//! the mesh is edited. The tree is built top-down by splitting at the median
//! centroid along the longest axis of the centroid bounds.
//!
//! # Example
//!
//! ```
//! use tessera::mesh::{build_from_triangles, DynamicMesh};
//! use tessera::spatial::MeshAabbTree;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh: DynamicMesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
//! let tree = MeshAabbTree::build(&mesh);
//!
//! let hit = tree.nearest_point(&Point3::new(0.2, 0.2, 1.0)).unwrap();
//! assert!((hit.distance - 1.0).abs() < 1e-12);
//! assert!(tree.test_coverage().is_ok());
//! ```

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::debug;

use super::aabb::Aabb;
use super::query::{closest_point_on_triangle, ray_triangle_intersect};
use crate::mesh::{DynamicMesh, MeshIndex, TriangleId};

/// Options for building a [`MeshAabbTree`].
#[derive(Debug, Clone)]
pub struct TreeOptions {
    /// Maximum number of triangles per leaf.
    pub max_leaf_size: usize,

    /// Snapshot the triangles in parallel.
    pub parallel: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_leaf_size: 8,
            parallel: true,
        }
    }
}

impl TreeOptions {
    /// Set the maximum leaf size (at least 1).
    pub fn with_max_leaf_size(mut self, size: usize) -> Self {
        self.max_leaf_size = size.max(1);
        self
    }

    /// Enable or disable the parallel snapshot.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Tree node containing either leaf triangles or child nodes.
#[derive(Debug)]
enum TreeNode {
    Leaf {
        bbox: Aabb,
        /// Indices into the tree's triangle snapshot.
        triangles: SmallVec<[usize; 8]>,
    },
    Internal {
        bbox: Aabb,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Closest point on the snapshotted surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHit<I: MeshIndex = u32> {
    /// The closest surface point.
    pub point: Point3<f64>,
    /// The triangle containing it, as an id of the source mesh.
    pub triangle: TriangleId<I>,
    /// Distance from the query point.
    pub distance: f64,
}

/// First intersection of a ray with the snapshotted surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit<I: MeshIndex = u32> {
    /// The hit point.
    pub point: Point3<f64>,
    /// The triangle hit, as an id of the source mesh.
    pub triangle: TriangleId<I>,
    /// Ray parameter of the hit (distance for a unit direction).
    pub t: f64,
}

/// Result of [`MeshAabbTree::test_coverage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageReport<I: MeshIndex = u32> {
    /// Snapshotted triangles no leaf references.
    pub missing: Vec<TriangleId<I>>,
    /// Snapshotted triangles referenced by more than one leaf.
    pub duplicated: Vec<TriangleId<I>>,
    /// Triangles not enclosed by the boxes of every node above them.
    pub uncontained: Vec<TriangleId<I>>,
}

impl<I: MeshIndex> Default for CoverageReport<I> {
    fn default() -> Self {
        Self {
            missing: Vec::new(),
            duplicated: Vec::new(),
            uncontained: Vec::new(),
        }
    }
}

impl<I: MeshIndex> CoverageReport<I> {
    /// Whether every triangle appears in exactly one leaf, inside its ancestors' boxes.
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.duplicated.is_empty() && self.uncontained.is_empty()
    }
}

/// Immutable bounding volume hierarchy over a triangle snapshot.
#[derive(Debug)]
pub struct MeshAabbTree<I: MeshIndex = u32> {
    root: Option<TreeNode>,
    ids: Vec<TriangleId<I>>,
    triangles: Vec<[Point3<f64>; 3]>,
    boxes: Vec<Aabb>,
}

impl<I: MeshIndex> MeshAabbTree<I> {
    /// Build a tree over the live triangles of a mesh with default options.
    pub fn build(mesh: &DynamicMesh<I>) -> Self {
        Self::build_with_options(mesh, &TreeOptions::default())
    }

    /// Build a tree over the live triangles of a mesh.
    pub fn build_with_options(mesh: &DynamicMesh<I>, options: &TreeOptions) -> Self {
        let ids: Vec<TriangleId<I>> = mesh.triangle_ids().collect();
        let triangles: Vec<[Point3<f64>; 3]> = if options.parallel {
            ids.par_iter().map(|&t| mesh.triangle_positions(t)).collect()
        } else {
            ids.iter().map(|&t| mesh.triangle_positions(t)).collect()
        };
        let boxes: Vec<Aabb> = triangles
            .iter()
            .map(|[a, b, c]| Aabb::from_triangle(a, b, c))
            .collect();

        let root = if triangles.is_empty() {
            None
        } else {
            let centroids: Vec<Point3<f64>> = triangles
                .iter()
                .map(|[a, b, c]| Point3::from((a.coords + b.coords + c.coords) / 3.0))
                .collect();
            let indices: Vec<usize> = (0..triangles.len()).collect();
            Some(Self::build_recursive(
                &boxes,
                &centroids,
                indices,
                options.max_leaf_size.max(1),
            ))
        };

        debug!(triangles = ids.len(), "built mesh AABB tree");

        Self {
            root,
            ids,
            triangles,
            boxes,
        }
    }

    fn build_recursive(
        boxes: &[Aabb],
        centroids: &[Point3<f64>],
        mut indices: Vec<usize>,
        max_leaf: usize,
    ) -> TreeNode {
        let mut bbox = Aabb::empty();
        for &i in &indices {
            bbox.expand(&boxes[i]);
        }

        if indices.len() <= max_leaf {
            return TreeNode::Leaf {
                bbox,
                triangles: indices.into_iter().collect(),
            };
        }

        let mut centroid_bounds = Aabb::empty();
        for &i in &indices {
            centroid_bounds.expand_point(&centroids[i]);
        }
        let axis = centroid_bounds.longest_axis();

        let mid = indices.len() / 2;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            centroids[a][axis].total_cmp(&centroids[b][axis])
        });
        let right_indices = indices.split_off(mid);

        let left = Self::build_recursive(boxes, centroids, indices, max_leaf);
        let right = Self::build_recursive(boxes, centroids, right_indices, max_leaf);

        TreeNode::Internal {
            bbox,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Number of snapshotted triangles.
    pub fn triangle_count(&self) -> usize {
        self.ids.len()
    }

    /// Whether the tree holds no triangles.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Bounding box of the whole snapshot, if any.
    pub fn bounds(&self) -> Option<Aabb> {
        self.root.as_ref().map(|n| *n.bbox())
    }

    /// Find the closest point on the snapshotted surface.
    ///
    /// Exact: subtrees are only skipped when their box is no closer than the
    /// best point found so far. Returns `None` for an empty tree, and for a
    /// query whose distance to every triangle is not finite (NaN coordinates,
    /// or coordinates so large the squared distance overflows).
    pub fn nearest_point(&self, p: &Point3<f64>) -> Option<NearestHit<I>> {
        let root = self.root.as_ref()?;
        let mut best = (f64::INFINITY, usize::MAX, *p);
        self.nearest_recursive(root, p, &mut best);

        let (dist_sq, index, point) = best;
        (index != usize::MAX).then(|| NearestHit {
            point,
            triangle: self.ids[index],
            distance: dist_sq.sqrt(),
        })
    }

    fn nearest_recursive(
        &self,
        node: &TreeNode,
        p: &Point3<f64>,
        best: &mut (f64, usize, Point3<f64>),
    ) {
        match node {
            TreeNode::Leaf { triangles, .. } => {
                for &i in triangles {
                    let [a, b, c] = &self.triangles[i];
                    let q = closest_point_on_triangle(p, a, b, c);
                    let d = (q - p).norm_squared();
                    if d < best.0 {
                        *best = (d, i, q);
                    }
                }
            }
            TreeNode::Internal { left, right, .. } => {
                let dl = left.bbox().distance_squared(p);
                let dr = right.bbox().distance_squared(p);
                let (near, d_near, far, d_far) = if dl <= dr {
                    (left, dl, right, dr)
                } else {
                    (right, dr, left, dl)
                };
                if d_near < best.0 {
                    self.nearest_recursive(near, p, best);
                }
                if d_far < best.0 {
                    self.nearest_recursive(far, p, best);
                }
            }
        }
    }

    /// Find the first triangle hit by a ray.
    pub fn find_nearest_hit(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<RayHit<I>> {
        let root = self.root.as_ref()?;
        let mut best = (f64::INFINITY, usize::MAX);
        self.ray_recursive(root, origin, direction, &mut best);

        let (t, index) = best;
        (index != usize::MAX).then(|| RayHit {
            point: origin + direction * t,
            triangle: self.ids[index],
            t,
        })
    }

    fn ray_recursive(
        &self,
        node: &TreeNode,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        best: &mut (f64, usize),
    ) {
        match node.bbox().ray_entry(origin, direction) {
            Some(t) if t < best.0 => {}
            _ => return,
        }
        match node {
            TreeNode::Leaf { triangles, .. } => {
                for &i in triangles {
                    let [a, b, c] = &self.triangles[i];
                    if let Some(t) = ray_triangle_intersect(origin, direction, a, b, c) {
                        if t < best.0 {
                            *best = (t, i);
                        }
                    }
                }
            }
            TreeNode::Internal { left, right, .. } => {
                self.ray_recursive(left, origin, direction, best);
                self.ray_recursive(right, origin, direction, best);
            }
        }
    }

    /// Count every triangle crossing of a ray.
    pub fn count_ray_hits(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> usize {
        let mut count = 0;
        if let Some(root) = self.root.as_ref() {
            self.count_recursive(root, origin, direction, &mut count);
        }
        count
    }

    fn count_recursive(
        &self,
        node: &TreeNode,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        count: &mut usize,
    ) {
        if node.bbox().ray_entry(origin, direction).is_none() {
            return;
        }
        match node {
            TreeNode::Leaf { triangles, .. } => {
                for &i in triangles {
                    let [a, b, c] = &self.triangles[i];
                    if ray_triangle_intersect(origin, direction, a, b, c).is_some() {
                        *count += 1;
                    }
                }
            }
            TreeNode::Internal { left, right, .. } => {
                self.count_recursive(left, origin, direction, count);
                self.count_recursive(right, origin, direction, count);
            }
        }
    }

    /// Test whether a point lies inside a closed surface by ray parity.
    ///
    /// The result is meaningless for open meshes.
    pub fn is_inside(&self, p: &Point3<f64>) -> bool {
        // Tilted off the axes so rays rarely graze the shared edges of
        // axis-aligned faces.
        let direction = Vector3::new(0.8, 0.36, 0.48);
        self.count_ray_hits(p, &direction) % 2 == 1
    }

    /// Check that every snapshotted triangle sits in exactly one leaf and
    /// inside the boxes of all nodes above it.
    pub fn test_coverage(&self) -> CoverageReport<I> {
        let mut counts = vec![0usize; self.ids.len()];
        let mut uncontained = vec![false; self.ids.len()];
        if let Some(root) = self.root.as_ref() {
            let mut ancestors = Vec::new();
            self.coverage_recursive(root, &mut ancestors, &mut counts, &mut uncontained);
        }

        let mut report = CoverageReport::default();
        for (i, &c) in counts.iter().enumerate() {
            if c == 0 {
                report.missing.push(self.ids[i]);
            } else if c > 1 {
                report.duplicated.push(self.ids[i]);
            }
            if uncontained[i] {
                report.uncontained.push(self.ids[i]);
            }
        }
        report
    }

    fn coverage_recursive<'n>(
        &self,
        node: &'n TreeNode,
        ancestors: &mut Vec<&'n Aabb>,
        counts: &mut [usize],
        uncontained: &mut [bool],
    ) {
        ancestors.push(node.bbox());
        match node {
            TreeNode::Leaf { triangles, .. } => {
                for &i in triangles {
                    counts[i] += 1;
                    if !ancestors.iter().all(|b| b.contains(&self.boxes[i])) {
                        uncontained[i] = true;
                    }
                }
            }
            TreeNode::Internal { left, right, .. } => {
                self.coverage_recursive(left, ancestors, counts, uncontained);
                self.coverage_recursive(right, ancestors, counts, uncontained);
            }
        }
        ancestors.pop();
    }
}
