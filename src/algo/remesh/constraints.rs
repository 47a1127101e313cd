//! Vertex and edge constraints for constrained remeshing.
//!
//! A constraint restricts which local edits the remesher may apply:
//!
//! | Constraint | Split | Collapse | Flip | Moves while smoothing |
//! |---|---|---|---|---|
//! | [`EdgeConstraint::Free`] | yes | yes | yes | |
//! | [`EdgeConstraint::Constrained`] | yes | yes | no | |
//! | [`EdgeConstraint::FullyConstrained`] | no | no | no | |
//! | [`VertexConstraint::Free`] | | | | yes, then onto the global target |
//! | [`VertexConstraint::Constrained`] | | | | yes, then onto its own target |
//! | [`VertexConstraint::Pinned`] | | | | no |
//!
//! Unset ids read as `Free`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::projection::{same_target, CurveProjectionTarget, PolylineCurve, SharedTarget};
use crate::mesh::{
    boundary_loops, DynamicMesh, EdgeCollapseInfo, EdgeId, EdgeSplitInfo, MeshIndex, VertexId,
};

/// Restriction on how a vertex may move.
#[derive(Debug, Clone, Default)]
pub enum VertexConstraint {
    /// Moves freely.
    #[default]
    Free,
    /// Never moves and is never removed.
    Pinned,
    /// Moves only along its target.
    Constrained(SharedTarget),
}

impl VertexConstraint {
    /// Whether this is [`VertexConstraint::Free`].
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// Whether this is [`VertexConstraint::Pinned`].
    pub fn is_pinned(&self) -> bool {
        matches!(self, Self::Pinned)
    }

    /// The target of a constrained vertex.
    pub fn target(&self) -> Option<&SharedTarget> {
        match self {
            Self::Constrained(target) => Some(target),
            Self::Free | Self::Pinned => None,
        }
    }

    /// Restrictiveness order: Free < Constrained < Pinned.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Constrained(_) => 1,
            Self::Pinned => 2,
        }
    }
}

impl PartialEq for VertexConstraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Free, Self::Free) | (Self::Pinned, Self::Pinned) => true,
            (Self::Constrained(a), Self::Constrained(b)) => same_target(a, b),
            _ => false,
        }
    }
}

/// Restriction on which edits may touch an edge.
#[derive(Debug, Clone, Default)]
pub enum EdgeConstraint {
    /// Any edit is allowed.
    #[default]
    Free,
    /// May be split and collapsed along its target but never flipped.
    Constrained(SharedTarget),
    /// Never split, collapsed or flipped.
    FullyConstrained,
}

impl EdgeConstraint {
    /// Whether this is [`EdgeConstraint::Free`].
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// Whether the edge may be split.
    pub fn can_split(&self) -> bool {
        !matches!(self, Self::FullyConstrained)
    }

    /// Whether the edge may be collapsed.
    pub fn can_collapse(&self) -> bool {
        !matches!(self, Self::FullyConstrained)
    }

    /// Whether the edge may be flipped.
    pub fn can_flip(&self) -> bool {
        self.is_free()
    }

    /// The target of a constrained edge.
    pub fn target(&self) -> Option<&SharedTarget> {
        match self {
            Self::Constrained(target) => Some(target),
            Self::Free | Self::FullyConstrained => None,
        }
    }
}

impl PartialEq for EdgeConstraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Free, Self::Free) | (Self::FullyConstrained, Self::FullyConstrained) => true,
            (Self::Constrained(a), Self::Constrained(b)) => same_target(a, b),
            _ => false,
        }
    }
}

static FREE_VERTEX: VertexConstraint = VertexConstraint::Free;
static FREE_EDGE: EdgeConstraint = EdgeConstraint::Free;

/// Sparse per-vertex and per-edge constraint records.
#[derive(Debug, Clone)]
pub struct MeshConstraints<I: MeshIndex = u32> {
    vertices: HashMap<VertexId<I>, VertexConstraint>,
    edges: HashMap<EdgeId<I>, EdgeConstraint>,
}

impl<I: MeshIndex> Default for MeshConstraints<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> MeshConstraints<I> {
    /// Create an empty constraint set.
    pub fn new() -> Self {
        Self {
            vertices: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    /// Set or overwrite the constraint of a vertex. Setting `Free` clears it.
    pub fn set_or_update_vertex_constraint(&mut self, v: VertexId<I>, constraint: VertexConstraint) {
        if constraint.is_free() {
            self.vertices.remove(&v);
        } else {
            self.vertices.insert(v, constraint);
        }
    }

    /// Set or overwrite the constraint of an edge. Setting `Free` clears it.
    pub fn set_or_update_edge_constraint(&mut self, e: EdgeId<I>, constraint: EdgeConstraint) {
        if constraint.is_free() {
            self.edges.remove(&e);
        } else {
            self.edges.insert(e, constraint);
        }
    }

    /// The constraint of a vertex, `Free` if none was set.
    pub fn vertex_constraint(&self, v: VertexId<I>) -> &VertexConstraint {
        self.vertices.get(&v).unwrap_or(&FREE_VERTEX)
    }

    /// The constraint of an edge, `Free` if none was set.
    pub fn edge_constraint(&self, e: EdgeId<I>) -> &EdgeConstraint {
        self.edges.get(&e).unwrap_or(&FREE_EDGE)
    }

    /// Remove the constraint of a vertex.
    pub fn clear_vertex(&mut self, v: VertexId<I>) {
        self.vertices.remove(&v);
    }

    /// Remove the constraint of an edge.
    pub fn clear_edge(&mut self, e: EdgeId<I>) {
        self.edges.remove(&e);
    }

    /// Remove every constraint.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
    }

    /// Whether any vertex or edge is constrained.
    pub fn has_constraints(&self) -> bool {
        !self.vertices.is_empty() || !self.edges.is_empty()
    }

    /// Number of constrained vertices.
    pub fn vertex_constraint_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of constrained edges.
    pub fn edge_constraint_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterate over constrained vertices.
    pub fn constrained_vertices(&self) -> impl Iterator<Item = (VertexId<I>, &VertexConstraint)> {
        self.vertices.iter().map(|(&v, c)| (v, c))
    }

    /// Iterate over constrained edges.
    pub fn constrained_edges(&self) -> impl Iterator<Item = (EdgeId<I>, &EdgeConstraint)> {
        self.edges.iter().map(|(&e, c)| (e, c))
    }

    /// Fully constrained edges that are dead or have a `Free` endpoint.
    ///
    /// Empty for a consistent constraint set.
    pub fn check_invariants(&self, mesh: &DynamicMesh<I>) -> Vec<EdgeId<I>> {
        let mut bad: Vec<EdgeId<I>> = self
            .edges
            .iter()
            .filter(|(_, c)| matches!(c, EdgeConstraint::FullyConstrained))
            .map(|(&e, _)| e)
            .filter(|&e| {
                !mesh.is_edge(e)
                    || mesh
                        .edge_vertices(e)
                        .iter()
                        .any(|&v| self.vertex_constraint(v).is_free())
            })
            .collect();
        bad.sort_unstable();
        bad
    }

    /// Update constraints after an edge split.
    ///
    /// Both halves of a constrained edge keep its constraint. The new vertex
    /// is pinned on a fully constrained edge and constrained to the target of
    /// a constrained edge. Everything else created by the split is free.
    pub fn on_edge_split(&mut self, info: &EdgeSplitInfo<I>) {
        let constraint = self.edge_constraint(info.edge).clone();

        for spoke in info.new_spoke_edges {
            if spoke.is_valid() {
                self.clear_edge(spoke);
            }
        }

        let vertex = match &constraint {
            EdgeConstraint::Free => VertexConstraint::Free,
            EdgeConstraint::FullyConstrained => VertexConstraint::Pinned,
            EdgeConstraint::Constrained(target) => VertexConstraint::Constrained(Arc::clone(target)),
        };
        self.set_or_update_vertex_constraint(info.new_vertex, vertex);
        self.set_or_update_edge_constraint(info.new_half_edge, constraint);
    }

    /// Drop the constraints of everything an edge collapse removed.
    pub fn on_edge_collapse(&mut self, info: &EdgeCollapseInfo<I>) {
        self.clear_vertex(info.removed_vertex);
        for &e in &info.removed_edges {
            self.clear_edge(e);
        }
    }
}

/// Pin every boundary vertex and fully constrain every boundary edge.
///
/// Does nothing for meshes with at most one edge.
pub fn preserve_all_boundary_edges<I: MeshIndex>(
    constraints: &mut MeshConstraints<I>,
    mesh: &DynamicMesh<I>,
) {
    if mesh.edge_count() <= 1 {
        return;
    }

    let mut count = 0usize;
    for e in mesh.boundary_edge_ids() {
        constraints.set_or_update_edge_constraint(e, EdgeConstraint::FullyConstrained);
        let [a, b] = mesh.edge_vertices(e);
        constraints.set_or_update_vertex_constraint(a, VertexConstraint::Pinned);
        constraints.set_or_update_vertex_constraint(b, VertexConstraint::Pinned);
        count += 1;
    }
    debug!(boundary_edges = count, "pinned boundary edges");
}

/// Constrain every boundary loop to slide along its own polyline.
///
/// Returns the number of loops. Loop edges may be split and collapsed; new
/// vertices stay on the loop's curve.
pub fn preserve_boundary_loops<I: MeshIndex>(
    constraints: &mut MeshConstraints<I>,
    mesh: &DynamicMesh<I>,
) -> usize {
    let loops = boundary_loops(mesh);
    for lp in &loops {
        let curve = PolylineCurve::from_boundary_loop(mesh, lp);
        let target: SharedTarget = Arc::new(CurveProjectionTarget::new(curve));
        for &v in &lp.vertices {
            constraints
                .set_or_update_vertex_constraint(v, VertexConstraint::Constrained(Arc::clone(&target)));
        }
        for &e in &lp.edges {
            constraints
                .set_or_update_edge_constraint(e, EdgeConstraint::Constrained(Arc::clone(&target)));
        }
    }
    debug!(loops = loops.len(), "constrained boundary loops");
    loops.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::remesh::tests::{create_grid_mesh, create_tetrahedron};
    use nalgebra::Point3;

    #[test]
    fn test_unset_is_free() {
        let cons = MeshConstraints::<u32>::new();
        assert!(cons.vertex_constraint(VertexId::new(3)).is_free());
        assert!(cons.edge_constraint(EdgeId::new(7)).is_free());
        assert!(!cons.has_constraints());
    }

    #[test]
    fn test_set_overwrites_and_free_clears() {
        let mut cons = MeshConstraints::<u32>::new();
        let v = VertexId::new(0);
        cons.set_or_update_vertex_constraint(v, VertexConstraint::Pinned);
        assert_eq!(*cons.vertex_constraint(v), VertexConstraint::Pinned);
        assert_eq!(cons.vertex_constraint_count(), 1);

        let target: SharedTarget = Arc::new(CurveProjectionTarget::new(PolylineCurve::new(
            vec![Point3::origin()],
            false,
        )));
        cons.set_or_update_vertex_constraint(v, VertexConstraint::Constrained(target.clone()));
        assert!(cons.vertex_constraint(v).target().is_some());
        assert_eq!(
            *cons.vertex_constraint(v),
            VertexConstraint::Constrained(target)
        );

        cons.set_or_update_vertex_constraint(v, VertexConstraint::Free);
        assert_eq!(cons.vertex_constraint_count(), 0);
    }

    #[test]
    fn test_edge_permissions() {
        assert!(EdgeConstraint::Free.can_flip());
        assert!(!EdgeConstraint::FullyConstrained.can_split());
        assert!(!EdgeConstraint::FullyConstrained.can_collapse());
        let target: SharedTarget = Arc::new(CurveProjectionTarget::new(PolylineCurve::new(
            Vec::new(),
            false,
        )));
        let c = EdgeConstraint::Constrained(target);
        assert!(c.can_split() && c.can_collapse() && !c.can_flip());
    }

    #[test]
    fn test_preserve_all_boundary_edges() {
        let mesh = create_grid_mesh(3);
        let mut cons = MeshConstraints::new();
        preserve_all_boundary_edges(&mut cons, &mesh);

        assert_eq!(cons.edge_constraint_count(), 12);
        assert_eq!(cons.vertex_constraint_count(), 12);
        for v in mesh.vertex_ids() {
            assert_eq!(cons.vertex_constraint(v).is_pinned(), mesh.is_boundary_vertex(v));
        }
        assert!(cons.check_invariants(&mesh).is_empty());

        // A closed mesh gets no constraints.
        let tet = create_tetrahedron();
        let mut cons = MeshConstraints::new();
        preserve_all_boundary_edges(&mut cons, &tet);
        assert!(!cons.has_constraints());
    }

    #[test]
    fn test_check_invariants_reports_free_endpoints() {
        let mesh = create_grid_mesh(2);
        let mut cons = MeshConstraints::new();
        let e = mesh.boundary_edge_ids().next().unwrap();
        cons.set_or_update_edge_constraint(e, EdgeConstraint::FullyConstrained);
        assert_eq!(cons.check_invariants(&mesh), vec![e]);

        let [a, b] = mesh.edge_vertices(e);
        cons.set_or_update_vertex_constraint(a, VertexConstraint::Pinned);
        cons.set_or_update_vertex_constraint(b, VertexConstraint::Pinned);
        assert!(cons.check_invariants(&mesh).is_empty());
    }

    #[test]
    fn test_split_inherits_full_constraint() {
        let mut mesh = create_grid_mesh(2);
        let mut cons = MeshConstraints::new();
        preserve_all_boundary_edges(&mut cons, &mesh);

        let e = mesh.boundary_edge_ids().next().unwrap();
        let info = mesh.split_edge(e).unwrap();
        cons.on_edge_split(&info);

        assert!(cons.vertex_constraint(info.new_vertex).is_pinned());
        assert_eq!(*cons.edge_constraint(info.edge), EdgeConstraint::FullyConstrained);
        assert_eq!(
            *cons.edge_constraint(info.new_half_edge),
            EdgeConstraint::FullyConstrained
        );
        assert!(cons.edge_constraint(info.new_spoke_edges[0]).is_free());
        assert!(cons.check_invariants(&mesh).is_empty());
    }

    #[test]
    fn test_split_inherits_curve_constraint() {
        let mut mesh = create_grid_mesh(2);
        let mut cons = MeshConstraints::new();
        assert_eq!(preserve_boundary_loops(&mut cons, &mesh), 1);

        let e = mesh.boundary_edge_ids().next().unwrap();
        let target = cons.edge_constraint(e).target().cloned().unwrap();
        let info = mesh.split_edge(e).unwrap();
        cons.on_edge_split(&info);

        assert_eq!(
            *cons.vertex_constraint(info.new_vertex),
            VertexConstraint::Constrained(target.clone())
        );
        assert_eq!(
            *cons.edge_constraint(info.new_half_edge),
            EdgeConstraint::Constrained(target)
        );
    }

    #[test]
    fn test_split_of_free_edge_is_free() {
        let mut mesh = create_grid_mesh(2);
        let mut cons = MeshConstraints::new();
        preserve_all_boundary_edges(&mut cons, &mesh);

        let e = mesh.edge_ids().find(|&e| !mesh.is_boundary_edge(e)).unwrap();
        let info = mesh.split_edge(e).unwrap();
        cons.on_edge_split(&info);
        assert!(cons.vertex_constraint(info.new_vertex).is_free());
        assert!(cons.edge_constraint(info.new_half_edge).is_free());
    }

    #[test]
    fn test_collapse_drops_stale_records() {
        let mut mesh = create_grid_mesh(2);
        let mut cons = MeshConstraints::new();
        // Center vertex 4, right neighbour 5.
        let (keep, remove) = (VertexId::new(4), VertexId::new(5));
        let e = mesh.find_edge(keep, remove).unwrap();
        cons.set_or_update_vertex_constraint(remove, VertexConstraint::Pinned);
        cons.set_or_update_edge_constraint(e, EdgeConstraint::FullyConstrained);

        let pos = *mesh.position(keep);
        let info = mesh.collapse_edge(keep, remove, pos).unwrap();
        cons.on_edge_collapse(&info);
        assert!(cons.vertex_constraint(remove).is_free());
        assert!(cons.edge_constraint(e).is_free());
    }
}
