//! Boundary loop extraction.

use nalgebra::Point3;

use super::dynamic::DynamicMesh;
use super::index::{EdgeId, MeshIndex, VertexId};

/// A chain of boundary edges, ordered along the winding of their triangles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop<I: MeshIndex = u32> {
    /// Loop vertices; edge `i` runs from `vertices[i]` to `vertices[i + 1]`.
    pub vertices: Vec<VertexId<I>>,

    /// Loop edges, same length as `vertices`.
    pub edges: Vec<EdgeId<I>>,

    /// Whether the last edge returns to the first vertex.
    pub closed: bool,
}

impl<I: MeshIndex> BoundaryLoop<I> {
    /// Number of edges in the loop.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the loop has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Positions of the loop vertices.
    pub fn positions(&self, mesh: &DynamicMesh<I>) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|&v| *mesh.position(v)).collect()
    }
}

/// Endpoints of a boundary edge in the order its triangle traverses them.
fn oriented_boundary_edge<I: MeshIndex>(mesh: &DynamicMesh<I>, e: EdgeId<I>) -> [VertexId<I>; 2] {
    let [a, b] = mesh.edge_vertices(e);
    let t = mesh.edge_triangles(e)[0];
    if mesh.triangle_has_sequential(t, a, b) {
        [a, b]
    } else {
        [b, a]
    }
}

/// Extract all boundary loops of a mesh.
///
/// At bow-tie vertices (more than two boundary edges) the walk continues
/// along the first unused outgoing edge, so every boundary edge ends up in
/// exactly one loop. A closed mesh has no loops.
pub fn boundary_loops<I: MeshIndex>(mesh: &DynamicMesh<I>) -> Vec<BoundaryLoop<I>> {
    let mut used = vec![false; mesh.max_edge_id()];
    let mut loops = Vec::new();

    for start in mesh.boundary_edge_ids() {
        if used[start.index()] {
            continue;
        }

        let mut vertices = Vec::new();
        let mut edges = Vec::new();
        let mut e = start;
        let mut end;
        loop {
            used[e.index()] = true;
            let [a, b] = oriented_boundary_edge(mesh, e);
            vertices.push(a);
            edges.push(e);
            end = b;

            let next = mesh.vertex_edges(b).iter().copied().find(|&n| {
                !used[n.index()]
                    && mesh.is_boundary_edge(n)
                    && oriented_boundary_edge(mesh, n)[0] == b
            });
            match next {
                Some(n) => e = n,
                None => break,
            }
        }

        let closed = end == vertices[0];
        loops.push(BoundaryLoop {
            vertices,
            edges,
            closed,
        });
    }

    loops
}
