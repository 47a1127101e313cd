//! Projection targets: surfaces and curves that vertices are pulled back onto.
//!
//! The remesher moves vertices while smoothing and then projects them onto a
//! [`ProjectionTarget`] so the surface does not drift away from the input.
//! Targets are shared through `Arc` between the remesher and every vertex or
//! edge constraint that refers to them.

use std::fmt::Debug;
use std::sync::Arc;

use nalgebra::Point3;

use crate::mesh::{BoundaryLoop, DynamicMesh, MeshIndex};
use crate::spatial::{closest_point_on_segment, MeshAabbTree};

/// A geometric object that points can be projected onto.
pub trait ProjectionTarget: Debug + Send + Sync {
    /// Map a point to the closest point on the target.
    fn project(&self, point: &Point3<f64>) -> Point3<f64>;
}

/// A projection target shared between the remesher and constraints.
pub type SharedTarget = Arc<dyn ProjectionTarget>;

/// Whether two shared targets are the same object.
pub fn same_target(a: &SharedTarget, b: &SharedTarget) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Projection onto a triangle surface through an AABB tree.
#[derive(Debug)]
pub struct MeshProjectionTarget<I: MeshIndex = u32> {
    tree: MeshAabbTree<I>,
}

impl<I: MeshIndex> MeshProjectionTarget<I> {
    /// Wrap an existing tree.
    pub fn new(tree: MeshAabbTree<I>) -> Self {
        Self { tree }
    }

    /// Snapshot the current triangles of a mesh.
    ///
    /// Later edits of `mesh` do not affect the target.
    pub fn from_mesh(mesh: &DynamicMesh<I>) -> Self {
        Self::new(MeshAabbTree::build(mesh))
    }

    /// The underlying tree.
    pub fn tree(&self) -> &MeshAabbTree<I> {
        &self.tree
    }
}

impl<I: MeshIndex> ProjectionTarget for MeshProjectionTarget<I> {
    fn project(&self, point: &Point3<f64>) -> Point3<f64> {
        self.tree
            .nearest_point(point)
            .map_or(*point, |hit| hit.point)
    }
}

/// A piecewise-linear curve, open or closed.
#[derive(Debug, Clone, PartialEq)]
pub struct PolylineCurve {
    points: Vec<Point3<f64>>,
    closed: bool,
}

impl PolylineCurve {
    /// Create a curve through `points`. A closed curve also joins the last
    /// point back to the first.
    pub fn new(points: Vec<Point3<f64>>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// The curve traced by a mesh boundary loop.
    pub fn from_boundary_loop<I: MeshIndex>(mesh: &DynamicMesh<I>, lp: &BoundaryLoop<I>) -> Self {
        Self::new(lp.positions(mesh), lp.closed)
    }

    /// Curve vertices.
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Whether the curve is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        match self.points.len() {
            0 | 1 => 0,
            n if self.closed => n,
            n => n - 1,
        }
    }

    /// Total length of all segments.
    pub fn length(&self) -> f64 {
        (0..self.segment_count())
            .map(|i| {
                let (a, b) = self.segment(i);
                (b - a).norm()
            })
            .sum()
    }

    fn segment(&self, i: usize) -> (&Point3<f64>, &Point3<f64>) {
        (&self.points[i], &self.points[(i + 1) % self.points.len()])
    }

    /// Closest point on the curve, or `None` for a curve without points.
    pub fn nearest_point(&self, p: &Point3<f64>) -> Option<Point3<f64>> {
        if self.points.len() == 1 {
            return Some(self.points[0]);
        }
        let mut best: Option<(f64, Point3<f64>)> = None;
        for i in 0..self.segment_count() {
            let (a, b) = self.segment(i);
            let q = closest_point_on_segment(p, a, b);
            let d = (q - p).norm_squared();
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, q));
            }
        }
        best.map(|(_, q)| q)
    }
}

/// Projection onto a polyline curve.
#[derive(Debug, Clone)]
pub struct CurveProjectionTarget {
    curve: PolylineCurve,
}

impl CurveProjectionTarget {
    /// Create a target for `curve`.
    pub fn new(curve: PolylineCurve) -> Self {
        Self { curve }
    }

    /// The target curve.
    pub fn curve(&self) -> &PolylineCurve {
        &self.curve
    }
}

impl ProjectionTarget for CurveProjectionTarget {
    fn project(&self, point: &Point3<f64>) -> Point3<f64> {
        self.curve.nearest_point(point).unwrap_or(*point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::remesh::tests::create_grid_mesh;

    #[test]
    fn test_mesh_target_projects_onto_plane() {
        let mesh = create_grid_mesh(4);
        let target = MeshProjectionTarget::from_mesh(&mesh);
        let p = target.project(&Point3::new(1.5, 2.25, 3.0));
        assert!((p - Point3::new(1.5, 2.25, 0.0)).norm() < 1e-12);

        // Outside the grid the nearest point is on the border.
        let q = target.project(&Point3::new(-1.0, 2.0, 0.0));
        assert!((q - Point3::new(0.0, 2.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_empty_mesh_target_is_identity() {
        let mesh = DynamicMesh::<u32>::new();
        let target = MeshProjectionTarget::from_mesh(&mesh);
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(target.project(&p), p);
    }

    #[test]
    fn test_open_and_closed_curves() {
        let square = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let open = PolylineCurve::new(square.clone(), false);
        let closed = PolylineCurve::new(square, true);
        assert_eq!(open.segment_count(), 3);
        assert_eq!(closed.segment_count(), 4);
        assert!((closed.length() - 4.0).abs() < 1e-12);

        // Near the closing segment only the closed curve reaches it.
        let p = Point3::new(-0.2, 0.4, 0.0);
        let on_closed = CurveProjectionTarget::new(closed).project(&p);
        assert!((on_closed - Point3::new(0.0, 0.4, 0.0)).norm() < 1e-12);
        let on_open = CurveProjectionTarget::new(open).project(&p);
        assert_eq!(on_open, Point3::origin());
    }

    #[test]
    fn test_degenerate_curves() {
        let p = Point3::new(3.0, 4.0, 0.0);
        let empty = CurveProjectionTarget::new(PolylineCurve::new(Vec::new(), true));
        assert_eq!(empty.project(&p), p);

        let single = CurveProjectionTarget::new(PolylineCurve::new(vec![Point3::origin()], false));
        assert_eq!(single.project(&p), Point3::origin());
    }

    #[test]
    fn test_same_target() {
        let a: SharedTarget = Arc::new(CurveProjectionTarget::new(PolylineCurve::new(Vec::new(), false)));
        let b: SharedTarget = Arc::new(CurveProjectionTarget::new(PolylineCurve::new(Vec::new(), false)));
        assert!(same_target(&a, &a.clone()));
        assert!(!same_target(&a, &b));
    }
}
