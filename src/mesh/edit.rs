//! Local topological edits: edge split, edge collapse and edge flip.
//!
//! Each edit either succeeds and reports the elements it touched, or is
//! rejected with an [`EditRejection`] and leaves the mesh unchanged.

use nalgebra::{Point3, Vector3};

use super::dynamic::{DynamicMesh, VertexInfo};
use super::index::{EdgeId, MeshIndex, TriangleId, VertexId};
use crate::error::EditRejection;

/// Result of [`DynamicMesh::split_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeSplitInfo<I: MeshIndex = u32> {
    /// The split edge. It keeps its id and now joins `vertices[0]` and `new_vertex`.
    pub edge: EdgeId<I>,
    /// The original endpoints of the split edge.
    pub vertices: [VertexId<I>; 2],
    /// Vertices opposite the edge; the second is invalid for a boundary edge.
    pub opposite_vertices: [VertexId<I>; 2],
    /// The vertex inserted at the midpoint.
    pub new_vertex: VertexId<I>,
    /// The other half of the split edge, joining `new_vertex` and `vertices[1]`.
    pub new_half_edge: EdgeId<I>,
    /// The edges from `new_vertex` to each opposite vertex (second invalid on the boundary).
    pub new_spoke_edges: [EdgeId<I>; 2],
    /// The triangles added by the split (second invalid on the boundary).
    pub new_triangles: [TriangleId<I>; 2],
}

/// Result of [`DynamicMesh::collapse_edge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeCollapseInfo<I: MeshIndex = u32> {
    /// The surviving vertex.
    pub kept_vertex: VertexId<I>,
    /// The removed vertex.
    pub removed_vertex: VertexId<I>,
    /// The collapsed edge (now removed).
    pub collapsed_edge: EdgeId<I>,
    /// Vertices opposite the collapsed edge (second invalid on the boundary).
    pub opposite_vertices: [VertexId<I>; 2],
    /// The removed triangles (second invalid on the boundary).
    pub removed_triangles: [TriangleId<I>; 2],
    /// Every edge that no longer exists, the collapsed one included.
    pub removed_edges: Vec<EdgeId<I>>,
    /// Pairs `(removed, kept)` where an edge of the removed vertex was merged
    /// into a coincident edge of the kept vertex.
    pub merged_edges: Vec<(EdgeId<I>, EdgeId<I>)>,
}

/// Result of [`DynamicMesh::flip_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeFlipInfo<I: MeshIndex = u32> {
    /// The flipped edge, same id.
    pub edge: EdgeId<I>,
    /// Endpoints before the flip.
    pub original_vertices: [VertexId<I>; 2],
    /// Endpoints after the flip.
    pub new_vertices: [VertexId<I>; 2],
    /// The two triangles, rewritten in place.
    pub triangles: [TriangleId<I>; 2],
}

impl<I: MeshIndex> DynamicMesh<I> {
    /// Split an edge at its midpoint.
    ///
    /// Each incident triangle `(a, b, c)` becomes `(a, m, c)` and `(m, b, c)`.
    /// Vertex normals are averaged and uvs interpolated if present.
    pub fn split_edge(&mut self, e: EdgeId<I>) -> Result<EdgeSplitInfo<I>, EditRejection> {
        if !self.is_edge(e) {
            return Err(EditRejection::NotAnEdge);
        }
        let [a, b] = self.edge_vertices(e);
        let tris = self.edge_triangles(e);
        let opposite = self.edge_opposite_vertices(e);

        let m = self.add_vertex_with(self.interpolated_vertex(a, b));

        // The edge keeps its id and shrinks to (a, m).
        self.replace_edge_vertex(e, b, m);

        let mut new_tris = [TriangleId::invalid(); 2];
        let mut spokes = [EdgeId::invalid(); 2];
        for slot in 0..2 {
            let t = tris[slot];
            if !t.is_valid() {
                continue;
            }
            let c = opposite[slot];
            let e_bc = self.edge_between_in(t, b, c);

            // Same winding for both halves: b -> m in the old slot, a -> m in the new one.
            let tv = self.triangle(t);
            let mut kept = tv;
            let mut added = tv;
            for j in 0..3 {
                if tv[j] == b {
                    kept[j] = m;
                }
                if tv[j] == a {
                    added[j] = m;
                }
            }
            self.set_triangle_vertices(t, kept);
            let t_new = self.alloc_triangle(added);

            self.replace_edge_triangle(e_bc, t, t_new);
            spokes[slot] = self.add_edge(m, c, t, t_new);
            new_tris[slot] = t_new;
        }

        let half = self.add_edge(m, b, new_tris[0], new_tris[1]);

        for slot in 0..2 {
            if tris[slot].is_valid() {
                self.relink_triangle_edges(tris[slot]);
                self.relink_triangle_edges(new_tris[slot]);
            }
        }

        Ok(EdgeSplitInfo {
            edge: e,
            vertices: [a, b],
            opposite_vertices: opposite,
            new_vertex: m,
            new_half_edge: half,
            new_spoke_edges: spokes,
            new_triangles: new_tris,
        })
    }

    /// Collapse the edge between `keep` and `remove`, moving `keep` to `position`.
    ///
    /// Rejected if the edge does not exist, if the result would be non-manifold
    /// (an interior edge joining two boundary vertices, a shared neighbour
    /// outside the edge's two triangles, or an existing edge between the two
    /// opposite vertices), or if an incident triangle has both other edges on
    /// the boundary.
    pub fn collapse_edge(
        &mut self,
        keep: VertexId<I>,
        remove: VertexId<I>,
        position: Point3<f64>,
    ) -> Result<EdgeCollapseInfo<I>, EditRejection> {
        if !self.is_vertex(keep) || !self.is_vertex(remove) || keep == remove {
            return Err(EditRejection::NotAVertex);
        }
        let e = self.find_edge(keep, remove).ok_or(EditRejection::NotAnEdge)?;
        let (a, b) = (keep, remove);
        let [t0, t1] = self.edge_triangles(e);
        let [c, d] = self.edge_opposite_vertices(e);
        let is_boundary = !t1.is_valid();

        if !is_boundary && self.is_boundary_vertex(a) && self.is_boundary_vertex(b) {
            return Err(EditRejection::NonManifold);
        }

        // Link condition: the only shared neighbours are the opposite vertices.
        for n in self.vertex_neighbours(b) {
            if n != a && n != c && n != d && self.find_edge(a, n).is_some() {
                return Err(EditRejection::NonManifold);
            }
        }
        if !is_boundary && self.find_edge(c, d).is_some() {
            return Err(EditRejection::NonManifold);
        }

        for (t, x) in [(t0, c), (t1, d)] {
            if !t.is_valid() {
                continue;
            }
            let e_ax = self.edge_between_in(t, a, x);
            let e_bx = self.edge_between_in(t, b, x);
            if self.is_boundary_edge(e_ax) && self.is_boundary_edge(e_bx) {
                return Err(EditRejection::DegenerateComponent);
            }
        }

        let mut removed_edges = Vec::new();
        for t in [t0, t1] {
            if t.is_valid() {
                removed_edges.extend(self.unlink_triangle(t));
            }
        }
        let b_tris = self.vertex_triangles(b);

        // Move the remaining edges of b over to a, merging where a already
        // has an edge to the same neighbour.
        let mut merged_edges = Vec::new();
        let b_edges: Vec<EdgeId<I>> = self.vertex_edges(b).to_vec();
        for eb in b_edges {
            let x = self.edge(eb).other_vertex(b);
            match self.find_edge(a, x) {
                Some(ea) => {
                    let tb = self.edge(eb).triangles[0];
                    debug_assert!(self.is_boundary_edge(ea) && self.is_boundary_edge(eb));
                    self.edges[ea.index()].triangles[1] = tb;
                    for slot in self.triangle_edges[tb.index()].iter_mut() {
                        if *slot == eb {
                            *slot = ea;
                        }
                    }
                    self.free_edge(eb);
                    removed_edges.push(eb);
                    merged_edges.push((eb, ea));
                }
                None => self.replace_edge_vertex(eb, b, a),
            }
        }

        for t in b_tris {
            let mut tv = self.triangle(t);
            for v in tv.iter_mut() {
                if *v == b {
                    *v = a;
                }
            }
            self.set_triangle_vertices(t, tv);
        }

        self.set_position(a, position);
        self.free_vertex(b);

        Ok(EdgeCollapseInfo {
            kept_vertex: a,
            removed_vertex: b,
            collapsed_edge: e,
            opposite_vertices: [c, d],
            removed_triangles: [t0, t1],
            removed_edges,
            merged_edges,
        })
    }

    /// Flip an interior edge to join the two vertices opposite it.
    ///
    /// Triangles `(a, b, c)` and `(b, a, d)` become `(c, d, b)` and `(d, c, a)`.
    pub fn flip_edge(&mut self, e: EdgeId<I>) -> Result<EdgeFlipInfo<I>, EditRejection> {
        if !self.is_edge(e) {
            return Err(EditRejection::NotAnEdge);
        }
        if self.is_boundary_edge(e) {
            return Err(EditRejection::BoundaryEdge);
        }
        let [t0, t1] = self.edge_triangles(e);
        let [mut a, mut b] = self.edge_vertices(e);
        if !self.triangle_has_sequential(t0, a, b) {
            std::mem::swap(&mut a, &mut b);
        }
        if !self.triangle_has_sequential(t1, b, a) {
            // Inconsistent winding across the edge.
            return Err(EditRejection::NonManifold);
        }
        let c = self.triangle_other_vertex(t0, a, b);
        let d = self.triangle_other_vertex(t1, a, b);
        if c == d || self.find_edge(c, d).is_some() {
            return Err(EditRejection::NonManifold);
        }

        let e_ca = self.edge_between_in(t0, c, a);
        let e_db = self.edge_between_in(t1, d, b);

        self.set_triangle_vertices(t0, [c, d, b]);
        self.set_triangle_vertices(t1, [d, c, a]);

        self.replace_edge_vertex(e, a, c);
        self.replace_edge_vertex(e, b, d);
        self.replace_edge_triangle(e_db, t1, t0);
        self.replace_edge_triangle(e_ca, t0, t1);

        self.relink_triangle_edges(t0);
        self.relink_triangle_edges(t1);

        Ok(EdgeFlipInfo {
            edge: e,
            original_vertices: [a, b],
            new_vertices: self.edge_vertices(e),
            triangles: [t0, t1],
        })
    }

    /// The edge of triangle `t` joining `u` and `v`.
    fn edge_between_in(&self, t: TriangleId<I>, u: VertexId<I>, v: VertexId<I>) -> EdgeId<I> {
        let te = self.triangle_edges(t);
        te.into_iter()
            .find(|&e| {
                let ev = self.edge_vertices(e);
                (ev[0] == u && ev[1] == v) || (ev[0] == v && ev[1] == u)
            })
            .unwrap_or_else(EdgeId::invalid)
    }

    /// Midpoint data of two vertices, including any normal or uv channel.
    fn interpolated_vertex(&self, a: VertexId<I>, b: VertexId<I>) -> VertexInfo {
        let pa = self.position(a);
        let pb = self.position(b);
        let normal = match (self.vertex_normal(a), self.vertex_normal(b)) {
            (Some(na), Some(nb)) => {
                let sum: Vector3<f64> = na + nb;
                Some(sum.try_normalize(1e-12).unwrap_or(sum))
            }
            _ => None,
        };
        let uv = match (self.vertex_uv(a), self.vertex_uv(b)) {
            (Some(ua), Some(ub)) => Some((ua + ub) * 0.5),
            _ => None,
        };
        VertexInfo {
            position: Point3::from((pa.coords + pb.coords) * 0.5),
            normal,
            uv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use nalgebra::Vector2;

    fn quad() -> DynamicMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    fn tetrahedron() -> DynamicMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 0.866, 0.0),
            Point3::new(0.5, 0.289, 0.816),
        ];
        build_from_triangles(&vertices, &[[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]]).unwrap()
    }

    /// A 3x3-vertex grid in the xy plane with the center vertex at index 4.
    fn grid() -> DynamicMesh {
        let mut vertices = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for j in 0..2 {
            for i in 0..2 {
                let v0 = j * 3 + i;
                faces.push([v0, v0 + 1, v0 + 4]);
                faces.push([v0, v0 + 4, v0 + 3]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    fn all_normals_up(mesh: &DynamicMesh) -> bool {
        mesh.triangle_ids().all(|t| mesh.triangle_normal(t).z > 0.5)
    }

    #[test]
    fn test_split_interior_edge() {
        let mut mesh = quad();
        let e = mesh.find_edge(VertexId::new(0), VertexId::new(2)).unwrap();
        let info = mesh.split_edge(e).unwrap();

        assert!(mesh.is_valid());
        assert_eq!(mesh.vertex_count(), 5);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.edge_count(), 8);
        assert_eq!(*mesh.position(info.new_vertex), Point3::new(0.5, 0.5, 0.0));
        assert_eq!(mesh.valence(info.new_vertex), 4);
        assert!(!mesh.is_boundary_vertex(info.new_vertex));
        assert!(info.new_triangles.iter().all(|t| t.is_valid()));
        assert!(all_normals_up(&mesh));

        let mut kept = mesh.edge_vertices(info.edge).to_vec();
        kept.sort();
        let mut expected = vec![info.vertices[0], info.new_vertex];
        expected.sort();
        assert_eq!(kept, expected);
        assert_eq!(
            mesh.find_edge(info.new_vertex, info.vertices[1]),
            Some(info.new_half_edge)
        );
    }

    #[test]
    fn test_split_boundary_edge() {
        let mut mesh = quad();
        let e = mesh.find_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        let info = mesh.split_edge(e).unwrap();

        assert!(mesh.is_valid());
        assert_eq!(mesh.triangle_count(), 3);
        assert_eq!(mesh.edge_count(), 7);
        assert!(mesh.is_boundary_edge(info.edge));
        assert!(mesh.is_boundary_edge(info.new_half_edge));
        assert!(mesh.is_boundary_vertex(info.new_vertex));
        assert!(!info.new_triangles[1].is_valid());
        assert!(!info.new_spoke_edges[1].is_valid());
        assert!(all_normals_up(&mesh));
    }

    #[test]
    fn test_split_interpolates_channels() {
        let mut mesh = quad();
        mesh.enable_vertex_uvs();
        mesh.set_vertex_uv(VertexId::new(0), Vector2::new(0.0, 0.0));
        mesh.set_vertex_uv(VertexId::new(1), Vector2::new(1.0, 0.0));
        let e = mesh.find_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        let info = mesh.split_edge(e).unwrap();
        assert_eq!(mesh.vertex_uv(info.new_vertex), Some(Vector2::new(0.5, 0.0)));
        assert!(!mesh.has_vertex_normals());
    }

    #[test]
    fn test_flip_edge() {
        let mut mesh = quad();
        let e = mesh.find_edge(VertexId::new(0), VertexId::new(2)).unwrap();
        let info = mesh.flip_edge(e).unwrap();

        assert!(mesh.is_valid());
        assert_eq!(info.new_vertices, [VertexId::new(1), VertexId::new(3)]);
        assert!(mesh.find_edge(VertexId::new(0), VertexId::new(2)).is_none());
        assert_eq!(mesh.find_edge(VertexId::new(1), VertexId::new(3)), Some(e));
        assert_eq!(mesh.edge_count(), 5);
        assert!(all_normals_up(&mesh));

        // Flipping back restores the original diagonal.
        mesh.flip_edge(e).unwrap();
        assert_eq!(mesh.edge_vertices(e), [VertexId::new(0), VertexId::new(2)]);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_flip_rejects_boundary_and_existing_edge() {
        let mut mesh = quad();
        let side = mesh.find_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        assert_eq!(mesh.flip_edge(side), Err(EditRejection::BoundaryEdge));

        let mut tet = tetrahedron();
        let e = tet.find_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        assert_eq!(tet.flip_edge(e), Err(EditRejection::NonManifold));
        assert!(tet.is_valid());
    }

    #[test]
    fn test_collapse_interior_edge() {
        let mut mesh = grid();
        let center = VertexId::new(4);
        let right = VertexId::new(5);
        let target = *mesh.position(center);
        let info = mesh.collapse_edge(center, right, target).unwrap();

        assert!(mesh.is_valid());
        assert!(!mesh.is_vertex(right));
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 6);
        assert_eq!(info.removed_vertex, right);
        assert!(info.removed_edges.contains(&info.collapsed_edge));
        assert!(!mesh.is_edge(info.collapsed_edge));
        assert_eq!(*mesh.position(center), target);
        assert!(all_normals_up(&mesh));
        // The center now reaches the boundary where the removed vertex was.
        assert!(mesh.is_boundary_vertex(center));
    }

    #[test]
    fn test_collapse_boundary_edge() {
        let mut mesh = grid();
        let (v0, v1) = (VertexId::new(1), VertexId::new(0));
        let info = mesh
            .collapse_edge(v0, v1, Point3::new(0.5, 0.0, 0.0))
            .unwrap();
        assert!(mesh.is_valid());
        assert_eq!(mesh.triangle_count(), 7);
        assert!(!info.removed_triangles[1].is_valid());
        assert!(all_normals_up(&mesh));
    }

    #[test]
    fn test_collapse_rejections_leave_mesh_untouched() {
        let mut mesh = grid();
        let before = mesh.info();

        // Interior edge joining two boundary vertices.
        let e = mesh.find_edge(VertexId::new(1), VertexId::new(5)).unwrap();
        assert!(!mesh.is_boundary_edge(e));
        let r = mesh.collapse_edge(VertexId::new(1), VertexId::new(5), Point3::origin());
        assert_eq!(r.unwrap_err(), EditRejection::NonManifold);

        // Not adjacent.
        let r = mesh.collapse_edge(VertexId::new(0), VertexId::new(8), Point3::origin());
        assert_eq!(r.unwrap_err(), EditRejection::NotAnEdge);

        assert_eq!(mesh.info(), before);
        assert!(mesh.is_valid());

        // The tetrahedron is the smallest closed surface.
        let mut tet = tetrahedron();
        let r = tet.collapse_edge(VertexId::new(0), VertexId::new(1), Point3::origin());
        assert_eq!(r.unwrap_err(), EditRejection::NonManifold);
        assert_eq!(tet.triangle_count(), 4);

        // A lone triangle would vanish.
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut single: DynamicMesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
        let r = single.collapse_edge(VertexId::new(0), VertexId::new(1), Point3::origin());
        assert_eq!(r.unwrap_err(), EditRejection::DegenerateComponent);
        assert_eq!(single.triangle_count(), 1);
    }

    #[test]
    fn test_edit_sequence_stays_valid() {
        let mut mesh = grid();
        let edges: Vec<EdgeId> = mesh.edge_ids().collect();
        for e in edges {
            if mesh.is_edge(e) {
                mesh.split_edge(e).unwrap();
                assert!(mesh.is_valid());
            }
        }
        assert_eq!(mesh.triangle_count(), 32);

        let interior: Vec<EdgeId> = mesh
            .edge_ids()
            .filter(|&e| !mesh.is_boundary_edge(e))
            .collect();
        for e in interior {
            let _ = mesh.flip_edge(e);
            assert!(mesh.is_valid());
        }

        let mut collapsed = 0;
        for e in 0..mesh.max_edge_id() {
            let e = EdgeId::new(e);
            if !mesh.is_edge(e) {
                continue;
            }
            let [a, b] = mesh.edge_vertices(e);
            let pos = *mesh.position(a);
            if mesh.collapse_edge(a, b, pos).is_ok() {
                collapsed += 1;
            }
            assert!(mesh.is_valid());
        }
        assert!(collapsed > 0);
    }
}
