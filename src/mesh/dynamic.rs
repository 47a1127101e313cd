//! Dynamic indexed triangle mesh.
//!
//! [`DynamicMesh`] stores vertices, edges, and triangles in flat arrays indexed
//! by stable handles. Each element kind is backed by a [`RefCountPool`]: a dead
//! slot keeps its array entry until the pool hands the slot out again, so
//! removing an element never renumbers the others.
//!
//! # Connectivity
//!
//! - Each **triangle** stores its three vertices and its three edges; edge `j`
//!   joins vertex `j` and vertex `(j + 1) % 3`
//! - Each **edge** stores its two vertices (smaller id first) and one or two
//!   incident triangles; an edge with a single triangle is a boundary edge
//! - Each **vertex** stores the list of its incident edges
//!
//! Vertex reference counts are `1 + number of incident triangles`, so a vertex
//! with count 1 is isolated.
//!
//! # Enumeration
//!
//! Ids run from `0` to `max_*_id()` with holes where elements were removed.
//! Use the `*_ids()` iterators, or check `is_vertex` / `is_edge` /
//! `is_triangle` when walking the raw range.

use std::fmt;

use nalgebra::{Point3, Vector2, Vector3};
use smallvec::SmallVec;

use super::index::{EdgeId, MeshIndex, TriangleId, VertexId};
use super::pool::{insert_at, RefCountPool};
use crate::error::{MeshError, Result};

/// Incident edge list of a vertex. Most vertices have valence ≤ 8.
pub(crate) type EdgeList<I> = SmallVec<[EdgeId<I>; 8]>;

/// An edge of the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge<I: MeshIndex = u32> {
    /// The two endpoints, smaller id first.
    pub vertices: [VertexId<I>; 2],

    /// The incident triangles. The second one is invalid for boundary edges.
    pub triangles: [TriangleId<I>; 2],
}

impl<I: MeshIndex> Edge<I> {
    /// Check if this edge has a single incident triangle.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        !self.triangles[1].is_valid()
    }

    /// The endpoint that is not `v`.
    #[inline]
    pub fn other_vertex(&self, v: VertexId<I>) -> VertexId<I> {
        if self.vertices[0] == v {
            self.vertices[1]
        } else {
            self.vertices[0]
        }
    }

    /// The incident triangle that is not `t` (invalid if there is none).
    #[inline]
    pub fn other_triangle(&self, t: TriangleId<I>) -> TriangleId<I> {
        if self.triangles[0] == t {
            self.triangles[1]
        } else {
            self.triangles[0]
        }
    }
}

/// Per-vertex data accepted by [`DynamicMesh::add_vertex_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexInfo {
    /// Vertex position.
    pub position: Point3<f64>,

    /// Optional vertex normal. Stored only if the mesh has a normal channel.
    pub normal: Option<Vector3<f64>>,

    /// Optional texture coordinate. Stored only if the mesh has a uv channel.
    pub uv: Option<Vector2<f64>>,
}

impl VertexInfo {
    /// Vertex data with a position only.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
            uv: None,
        }
    }
}

/// A triangle mesh with O(1) amortized element insertion and removal.
#[derive(Debug, Clone)]
pub struct DynamicMesh<I: MeshIndex = u32> {
    pub(crate) positions: Vec<Point3<f64>>,
    pub(crate) normals: Option<Vec<Vector3<f64>>>,
    pub(crate) uvs: Option<Vec<Vector2<f64>>>,
    pub(crate) vertex_refs: RefCountPool,
    pub(crate) vertex_edges: Vec<EdgeList<I>>,

    pub(crate) triangles: Vec<[VertexId<I>; 3]>,
    pub(crate) triangle_edges: Vec<[EdgeId<I>; 3]>,
    pub(crate) triangle_refs: RefCountPool,

    pub(crate) edges: Vec<Edge<I>>,
    pub(crate) edge_refs: RefCountPool,
}

impl<I: MeshIndex> Default for DynamicMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> DynamicMesh<I> {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_triangles: usize) -> Self {
        // For a closed mesh E = 3T/2; leave some room for boundaries.
        let num_edges = num_triangles * 3 / 2 + num_triangles / 4;

        Self {
            positions: Vec::with_capacity(num_vertices),
            normals: None,
            uvs: None,
            vertex_refs: RefCountPool::with_capacity(num_vertices),
            vertex_edges: Vec::with_capacity(num_vertices),
            triangles: Vec::with_capacity(num_triangles),
            triangle_edges: Vec::with_capacity(num_triangles),
            triangle_refs: RefCountPool::with_capacity(num_triangles),
            edges: Vec::with_capacity(num_edges),
            edge_refs: RefCountPool::with_capacity(num_edges),
        }
    }

    /// Add a per-vertex normal channel, initialised to zero for existing vertices.
    pub fn enable_vertex_normals(&mut self) {
        if self.normals.is_none() {
            self.normals = Some(vec![Vector3::zeros(); self.positions.len()]);
        }
    }

    /// Add a per-vertex uv channel, initialised to zero for existing vertices.
    pub fn enable_vertex_uvs(&mut self) {
        if self.uvs.is_none() {
            self.uvs = Some(vec![Vector2::zeros(); self.positions.len()]);
        }
    }

    /// Whether the mesh carries vertex normals.
    #[inline]
    pub fn has_vertex_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Whether the mesh carries vertex uvs.
    #[inline]
    pub fn has_vertex_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    // ==================== Counts and Liveness ====================

    /// Number of live vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_refs.count()
    }

    /// Number of live edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_refs.count()
    }

    /// Number of live triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangle_refs.count()
    }

    /// Exclusive upper bound of vertex ids ever allocated.
    #[inline]
    pub fn max_vertex_id(&self) -> usize {
        self.vertex_refs.max_index()
    }

    /// Exclusive upper bound of edge ids ever allocated.
    #[inline]
    pub fn max_edge_id(&self) -> usize {
        self.edge_refs.max_index()
    }

    /// Exclusive upper bound of triangle ids ever allocated.
    #[inline]
    pub fn max_triangle_id(&self) -> usize {
        self.triangle_refs.max_index()
    }

    /// Check if a vertex id refers to a live vertex.
    #[inline]
    pub fn is_vertex(&self, v: VertexId<I>) -> bool {
        v.is_valid() && self.vertex_refs.is_valid(v.index())
    }

    /// Check if an edge id refers to a live edge.
    #[inline]
    pub fn is_edge(&self, e: EdgeId<I>) -> bool {
        e.is_valid() && self.edge_refs.is_valid(e.index())
    }

    /// Check if a triangle id refers to a live triangle.
    #[inline]
    pub fn is_triangle(&self, t: TriangleId<I>) -> bool {
        t.is_valid() && self.triangle_refs.is_valid(t.index())
    }

    /// Whether ids are dense (nothing was ever removed).
    pub fn is_compact(&self) -> bool {
        self.vertex_refs.is_dense() && self.edge_refs.is_dense() && self.triangle_refs.is_dense()
    }

    // ==================== Iteration ====================

    /// Iterate over live vertex ids.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertex_refs.indices().map(VertexId::new)
    }

    /// Iterate over live edge ids.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId<I>> + '_ {
        self.edge_refs.indices().map(EdgeId::new)
    }

    /// Iterate over live triangle ids.
    pub fn triangle_ids(&self) -> impl Iterator<Item = TriangleId<I>> + '_ {
        self.triangle_refs.indices().map(TriangleId::new)
    }

    /// Iterate over live boundary edge ids.
    pub fn boundary_edge_ids(&self) -> impl Iterator<Item = EdgeId<I>> + '_ {
        self.edge_ids().filter(move |&e| self.is_boundary_edge(e))
    }

    // ==================== Vertex Accessors ====================

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.positions[v.index()]
    }

    /// Set the position of a vertex.
    #[inline]
    pub fn set_position(&mut self, v: VertexId<I>, pos: Point3<f64>) {
        self.positions[v.index()] = pos;
    }

    /// Get the stored normal of a vertex, if the mesh has normals.
    pub fn vertex_normal(&self, v: VertexId<I>) -> Option<Vector3<f64>> {
        self.normals.as_ref().map(|n| n[v.index()])
    }

    /// Set the stored normal of a vertex. Ignored without a normal channel.
    pub fn set_vertex_normal(&mut self, v: VertexId<I>, normal: Vector3<f64>) {
        if let Some(normals) = self.normals.as_mut() {
            normals[v.index()] = normal;
        }
    }

    /// Get the stored uv of a vertex, if the mesh has uvs.
    pub fn vertex_uv(&self, v: VertexId<I>) -> Option<Vector2<f64>> {
        self.uvs.as_ref().map(|uv| uv[v.index()])
    }

    /// Set the stored uv of a vertex. Ignored without a uv channel.
    pub fn set_vertex_uv(&mut self, v: VertexId<I>, uv: Vector2<f64>) {
        if let Some(uvs) = self.uvs.as_mut() {
            uvs[v.index()] = uv;
        }
    }

    /// All stored data of a vertex.
    pub fn vertex_info(&self, v: VertexId<I>) -> VertexInfo {
        VertexInfo {
            position: *self.position(v),
            normal: self.vertex_normal(v),
            uv: self.vertex_uv(v),
        }
    }

    /// Edges incident to a vertex.
    #[inline]
    pub fn vertex_edges(&self, v: VertexId<I>) -> &[EdgeId<I>] {
        &self.vertex_edges[v.index()]
    }

    /// Number of edges incident to a vertex.
    #[inline]
    pub fn valence(&self, v: VertexId<I>) -> usize {
        self.vertex_edges[v.index()].len()
    }

    /// Number of triangles incident to a vertex.
    #[inline]
    pub fn vertex_triangle_count(&self, v: VertexId<I>) -> usize {
        self.vertex_refs.ref_count(v.index()).saturating_sub(1) as usize
    }

    /// Iterate over the vertices adjacent to a vertex.
    pub fn vertex_neighbours(&self, v: VertexId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertex_edges[v.index()]
            .iter()
            .map(move |&e| self.edges[e.index()].other_vertex(v))
    }

    /// Triangles incident to a vertex, in increasing id order.
    pub fn vertex_triangles(&self, v: VertexId<I>) -> Vec<TriangleId<I>> {
        let mut tris: Vec<TriangleId<I>> = Vec::with_capacity(self.valence(v));
        for &e in self.vertex_edges(v) {
            for t in self.edges[e.index()].triangles {
                if t.is_valid() {
                    tris.push(t);
                }
            }
        }
        tris.sort_unstable();
        tris.dedup();
        tris
    }

    /// Check if a vertex touches a boundary edge.
    pub fn is_boundary_vertex(&self, v: VertexId<I>) -> bool {
        self.vertex_edges(v)
            .iter()
            .any(|&e| self.is_boundary_edge(e))
    }

    // ==================== Edge Accessors ====================

    /// Get an edge by id.
    #[inline]
    pub fn edge(&self, e: EdgeId<I>) -> &Edge<I> {
        &self.edges[e.index()]
    }

    /// The two endpoints of an edge, smaller id first.
    #[inline]
    pub fn edge_vertices(&self, e: EdgeId<I>) -> [VertexId<I>; 2] {
        self.edges[e.index()].vertices
    }

    /// The incident triangles of an edge; the second is invalid on the boundary.
    #[inline]
    pub fn edge_triangles(&self, e: EdgeId<I>) -> [TriangleId<I>; 2] {
        self.edges[e.index()].triangles
    }

    /// Check if an edge has exactly one incident triangle.
    #[inline]
    pub fn is_boundary_edge(&self, e: EdgeId<I>) -> bool {
        self.edges[e.index()].is_boundary()
    }

    /// The vertices opposite an edge in each of its triangles.
    ///
    /// The second entry is invalid for boundary edges.
    pub fn edge_opposite_vertices(&self, e: EdgeId<I>) -> [VertexId<I>; 2] {
        let edge = &self.edges[e.index()];
        let [a, b] = edge.vertices;
        let mut out = [VertexId::invalid(); 2];
        for (slot, t) in edge.triangles.into_iter().enumerate() {
            if t.is_valid() {
                out[slot] = self.triangle_other_vertex(t, a, b);
            }
        }
        out
    }

    /// Find the edge joining two vertices.
    pub fn find_edge(&self, a: VertexId<I>, b: VertexId<I>) -> Option<EdgeId<I>> {
        if !self.is_vertex(a) || !self.is_vertex(b) {
            return None;
        }
        // Scan the shorter incident list.
        let (from, to) = if self.valence(a) <= self.valence(b) {
            (a, b)
        } else {
            (b, a)
        };
        self.vertex_edges(from)
            .iter()
            .copied()
            .find(|&e| self.edges[e.index()].other_vertex(from) == to)
    }

    /// Length of an edge.
    pub fn edge_length(&self, e: EdgeId<I>) -> f64 {
        let [a, b] = self.edge_vertices(e);
        (self.position(b) - self.position(a)).norm()
    }

    /// Squared length of an edge.
    pub fn edge_length_squared(&self, e: EdgeId<I>) -> f64 {
        let [a, b] = self.edge_vertices(e);
        (self.position(b) - self.position(a)).norm_squared()
    }

    /// Midpoint of an edge.
    pub fn edge_midpoint(&self, e: EdgeId<I>) -> Point3<f64> {
        let [a, b] = self.edge_vertices(e);
        Point3::from((self.position(a).coords + self.position(b).coords) * 0.5)
    }

    // ==================== Triangle Accessors ====================

    /// The three vertices of a triangle.
    #[inline]
    pub fn triangle(&self, t: TriangleId<I>) -> [VertexId<I>; 3] {
        self.triangles[t.index()]
    }

    /// The three edges of a triangle; edge `j` joins vertex `j` and `j + 1`.
    #[inline]
    pub fn triangle_edges(&self, t: TriangleId<I>) -> [EdgeId<I>; 3] {
        self.triangle_edges[t.index()]
    }

    /// The triangles across each edge of a triangle (invalid where there is none).
    pub fn triangle_neighbours(&self, t: TriangleId<I>) -> [TriangleId<I>; 3] {
        let te = self.triangle_edges(t);
        [
            self.edges[te[0].index()].other_triangle(t),
            self.edges[te[1].index()].other_triangle(t),
            self.edges[te[2].index()].other_triangle(t),
        ]
    }

    /// Positions of the three vertices of a triangle.
    pub fn triangle_positions(&self, t: TriangleId<I>) -> [Point3<f64>; 3] {
        let [v0, v1, v2] = self.triangle(t);
        [*self.position(v0), *self.position(v1), *self.position(v2)]
    }

    /// Unit normal of a triangle (zero for degenerate triangles).
    pub fn triangle_normal(&self, t: TriangleId<I>) -> Vector3<f64> {
        let [p0, p1, p2] = self.triangle_positions(t);
        (p1 - p0).cross(&(p2 - p0)).try_normalize(1e-300).unwrap_or_else(Vector3::zeros)
    }

    /// Area of a triangle.
    pub fn triangle_area(&self, t: TriangleId<I>) -> f64 {
        let [p0, p1, p2] = self.triangle_positions(t);
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Centroid of a triangle.
    pub fn triangle_centroid(&self, t: TriangleId<I>) -> Point3<f64> {
        let [p0, p1, p2] = self.triangle_positions(t);
        Point3::from((p0.coords + p1.coords + p2.coords) / 3.0)
    }

    /// The vertex of `t` that is neither `a` nor `b`.
    pub fn triangle_other_vertex(
        &self,
        t: TriangleId<I>,
        a: VertexId<I>,
        b: VertexId<I>,
    ) -> VertexId<I> {
        self.triangle(t)
            .into_iter()
            .find(|&v| v != a && v != b)
            .unwrap_or_else(VertexId::invalid)
    }

    /// Whether `t` traverses `a` then `b` in its winding order.
    pub fn triangle_has_sequential(&self, t: TriangleId<I>, a: VertexId<I>, b: VertexId<I>) -> bool {
        let tv = self.triangle(t);
        (0..3).any(|j| tv[j] == a && tv[(j + 1) % 3] == b)
    }

    // ==================== Geometry ====================

    /// Compute the axis-aligned bounding box of the live vertices.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut ids = self.vertex_ids();
        let first = ids.next()?;
        let mut min = *self.position(first);
        let mut max = min;

        for v in ids {
            let p = self.position(v);
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        Some((min, max))
    }

    /// Total surface area of the live triangles.
    pub fn surface_area(&self) -> f64 {
        self.triangle_ids().map(|t| self.triangle_area(t)).sum()
    }

    /// Arithmetic mean of all live edge lengths (0 for a mesh without edges).
    pub fn average_edge_length(&self) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for e in self.edge_ids() {
            total += self.edge_length(e);
            count += 1;
        }
        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }

    // ==================== Construction ====================

    /// Add a new vertex and return its id.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        self.add_vertex_with(VertexInfo::new(position))
    }

    /// Add a new vertex with optional normal and uv and return its id.
    pub fn add_vertex_with(&mut self, info: VertexInfo) -> VertexId<I> {
        let index = self.vertex_refs.allocate();
        insert_at(&mut self.positions, index, info.position);
        insert_at(&mut self.vertex_edges, index, EdgeList::new());
        if let Some(normals) = self.normals.as_mut() {
            insert_at(normals, index, info.normal.unwrap_or_else(Vector3::zeros));
        }
        if let Some(uvs) = self.uvs.as_mut() {
            insert_at(uvs, index, info.uv.unwrap_or_else(Vector2::zeros));
        }
        VertexId::new(index)
    }

    /// Add a triangle over three live vertices.
    ///
    /// Fails if a vertex is dead, the triangle is degenerate, or one of its
    /// edges already has two incident triangles.
    pub fn add_triangle(
        &mut self,
        a: VertexId<I>,
        b: VertexId<I>,
        c: VertexId<I>,
    ) -> Result<TriangleId<I>> {
        let tv = [a, b, c];
        for v in tv {
            if !self.is_vertex(v) {
                return Err(MeshError::InvalidVertexIndex {
                    triangle: self.max_triangle_id(),
                    vertex: v.index(),
                });
            }
        }
        if a == b || b == c || c == a {
            return Err(MeshError::DegenerateTriangle {
                triangle: self.max_triangle_id(),
            });
        }

        let mut existing = [None; 3];
        for j in 0..3 {
            let (v0, v1) = (tv[j], tv[(j + 1) % 3]);
            if let Some(e) = self.find_edge(v0, v1) {
                if !self.is_boundary_edge(e) {
                    return Err(MeshError::NonManifoldEdge {
                        v0: v0.index(),
                        v1: v1.index(),
                    });
                }
                existing[j] = Some(e);
            }
        }

        let t = self.alloc_triangle(tv);
        let mut te = [EdgeId::invalid(); 3];
        for j in 0..3 {
            te[j] = match existing[j] {
                Some(e) => {
                    self.edges[e.index()].triangles[1] = t;
                    e
                }
                None => self.add_edge(tv[j], tv[(j + 1) % 3], t, TriangleId::invalid()),
            };
        }
        self.triangle_edges[t.index()] = te;
        Ok(t)
    }

    /// Remove a triangle.
    ///
    /// Edges left without triangles are removed. With `remove_isolated_vertices`
    /// the triangle's vertices are removed too once no triangle uses them.
    /// With `preserve_manifold` the removal is refused if it would turn a
    /// boundary vertex into a bow-tie (a triangle vertex that is already on the
    /// boundary while both of its edges in this triangle are interior).
    ///
    /// Returns `false` if nothing was removed.
    pub fn remove_triangle(
        &mut self,
        t: TriangleId<I>,
        remove_isolated_vertices: bool,
        preserve_manifold: bool,
    ) -> bool {
        if !self.is_triangle(t) {
            return false;
        }
        let tv = self.triangle(t);
        let te = self.triangle_edges(t);

        if preserve_manifold {
            for j in 0..3 {
                if self.is_boundary_vertex(tv[j])
                    && !self.is_boundary_edge(te[j])
                    && !self.is_boundary_edge(te[(j + 2) % 3])
                {
                    return false;
                }
            }
        }

        self.unlink_triangle(t);

        if remove_isolated_vertices {
            for v in tv {
                if self.vertex_refs.ref_count(v.index()) == 1 {
                    self.free_vertex(v);
                }
            }
        }
        true
    }

    /// Remove a vertex that has no incident triangles.
    ///
    /// Returns `false` if the vertex is dead or still in use.
    pub fn remove_isolated_vertex(&mut self, v: VertexId<I>) -> bool {
        if !self.is_vertex(v) || self.vertex_refs.ref_count(v.index()) != 1 {
            return false;
        }
        self.free_vertex(v);
        true
    }

    // ==================== Internal Connectivity Edits ====================

    /// Allocate a triangle slot and take references on its vertices.
    ///
    /// The edge slots are left invalid for the caller to fill.
    pub(crate) fn alloc_triangle(&mut self, tv: [VertexId<I>; 3]) -> TriangleId<I> {
        let index = self.triangle_refs.allocate();
        insert_at(&mut self.triangles, index, tv);
        insert_at(&mut self.triangle_edges, index, [EdgeId::invalid(); 3]);
        for v in tv {
            self.vertex_refs.increment(v.index());
        }
        TriangleId::new(index)
    }

    /// Allocate an edge between `a` and `b` and register it with both vertices.
    pub(crate) fn add_edge(
        &mut self,
        a: VertexId<I>,
        b: VertexId<I>,
        t0: TriangleId<I>,
        t1: TriangleId<I>,
    ) -> EdgeId<I> {
        let index = self.edge_refs.allocate();
        let vertices = if a < b { [a, b] } else { [b, a] };
        insert_at(
            &mut self.edges,
            index,
            Edge {
                vertices,
                triangles: [t0, t1],
            },
        );
        let e = EdgeId::new(index);
        self.vertex_edges[a.index()].push(e);
        self.vertex_edges[b.index()].push(e);
        e
    }

    /// Remove an edge from its vertices' lists and free its slot.
    pub(crate) fn free_edge(&mut self, e: EdgeId<I>) {
        let [a, b] = self.edges[e.index()].vertices;
        self.vertex_edges[a.index()].retain(|x| *x != e);
        self.vertex_edges[b.index()].retain(|x| *x != e);
        self.edge_refs.release(e.index());
    }

    /// Free a vertex slot.
    pub(crate) fn free_vertex(&mut self, v: VertexId<I>) {
        self.vertex_edges[v.index()].clear();
        self.vertex_refs.release(v.index());
    }

    /// Replace `old` by `new` in an edge's triangle pair, keeping slot 0 filled.
    pub(crate) fn replace_edge_triangle(
        &mut self,
        e: EdgeId<I>,
        old: TriangleId<I>,
        new: TriangleId<I>,
    ) {
        let tris = &mut self.edges[e.index()].triangles;
        if tris[0] == old {
            tris[0] = new;
        } else if tris[1] == old {
            tris[1] = new;
        }
        if !tris[0].is_valid() && tris[1].is_valid() {
            tris.swap(0, 1);
        }
    }

    /// Move an edge endpoint from `old` to `new`, updating the vertex lists.
    pub(crate) fn replace_edge_vertex(&mut self, e: EdgeId<I>, old: VertexId<I>, new: VertexId<I>) {
        let other = self.edges[e.index()].other_vertex(old);
        self.edges[e.index()].vertices = if other < new { [other, new] } else { [new, other] };
        self.vertex_edges[old.index()].retain(|x| *x != e);
        self.vertex_edges[new.index()].push(e);
    }

    /// Overwrite the vertices of a triangle, moving vertex references along.
    pub(crate) fn set_triangle_vertices(&mut self, t: TriangleId<I>, tv: [VertexId<I>; 3]) {
        let old = self.triangles[t.index()];
        for v in tv {
            self.vertex_refs.increment(v.index());
        }
        for v in old {
            self.vertex_refs.decrement(v.index());
        }
        self.triangles[t.index()] = tv;
    }

    /// Recompute the edge slots of a triangle from its vertices.
    ///
    /// Every edge of the triangle must already exist.
    pub(crate) fn relink_triangle_edges(&mut self, t: TriangleId<I>) {
        let tv = self.triangle(t);
        let mut te = [EdgeId::invalid(); 3];
        for j in 0..3 {
            let found = self.find_edge(tv[j], tv[(j + 1) % 3]);
            debug_assert!(found.is_some(), "missing edge {:?}-{:?}", tv[j], tv[(j + 1) % 3]);
            te[j] = found.unwrap_or_else(EdgeId::invalid);
        }
        self.triangle_edges[t.index()] = te;
    }

    /// Detach a triangle from its edges and vertices and free it.
    ///
    /// Edges left without triangles are freed and returned.
    pub(crate) fn unlink_triangle(&mut self, t: TriangleId<I>) -> SmallVec<[EdgeId<I>; 3]> {
        let tv = self.triangle(t);
        let te = self.triangle_edges(t);
        let mut freed = SmallVec::new();

        for e in te {
            self.replace_edge_triangle(e, t, TriangleId::invalid());
            if !self.edges[e.index()].triangles[0].is_valid() {
                self.free_edge(e);
                freed.push(e);
            }
        }

        self.triangle_refs.release(t.index());
        for v in tv {
            self.vertex_refs.decrement(v.index());
        }
        freed
    }

    // ==================== Validation ====================

    /// Check every connectivity invariant of the mesh.
    pub fn check_validity(&self) -> Result<()> {
        let fail = |msg: String| Err(MeshError::InvalidState(msg));
        let mut triangle_uses = vec![0u32; self.max_vertex_id()];

        for t in self.triangle_ids() {
            let tv = self.triangle(t);
            let te = self.triangle_edges(t);
            for v in tv {
                if !self.is_vertex(v) {
                    return fail(format!("{:?} references dead {:?}", t, v));
                }
                triangle_uses[v.index()] += 1;
            }
            if tv[0] == tv[1] || tv[1] == tv[2] || tv[2] == tv[0] {
                return fail(format!("{:?} is degenerate", t));
            }
            for j in 0..3 {
                let e = te[j];
                if !self.is_edge(e) {
                    return fail(format!("{:?} references dead {:?}", t, e));
                }
                let (a, b) = (tv[j], tv[(j + 1) % 3]);
                let expected = if a < b { [a, b] } else { [b, a] };
                if self.edge_vertices(e) != expected {
                    return fail(format!("{:?} slot {} does not match {:?}", t, j, e));
                }
                if !self.edge_triangles(e).contains(&t) {
                    return fail(format!("{:?} does not list {:?}", e, t));
                }
            }
        }

        for e in self.edge_ids() {
            let edge = self.edge(e);
            let [a, b] = edge.vertices;
            if a == b || !self.is_vertex(a) || !self.is_vertex(b) {
                return fail(format!("{:?} has invalid endpoints", e));
            }
            let [t0, t1] = edge.triangles;
            if !self.is_triangle(t0) {
                return fail(format!("{:?} has no live first triangle", e));
            }
            if t1.is_valid() && (!self.is_triangle(t1) || t1 == t0) {
                return fail(format!("{:?} has an invalid second triangle", e));
            }
            for t in [t0, t1] {
                if t.is_valid() && !self.triangle_edges(t).contains(&e) {
                    return fail(format!("{:?} is not an edge of {:?}", e, t));
                }
            }
            if !self.vertex_edges(a).contains(&e) || !self.vertex_edges(b).contains(&e) {
                return fail(format!("{:?} is missing from a vertex edge list", e));
            }
        }

        for v in self.vertex_ids() {
            let expected = triangle_uses[v.index()] + 1;
            if self.vertex_refs.ref_count(v.index()) != expected {
                return fail(format!("{:?} has a stale reference count", v));
            }
            let mut neighbours: Vec<VertexId<I>> = Vec::with_capacity(self.valence(v));
            for &e in self.vertex_edges(v) {
                if !self.is_edge(e) || !self.edge_vertices(e).contains(&v) {
                    return fail(format!("{:?} lists unrelated {:?}", v, e));
                }
                neighbours.push(self.edge(e).other_vertex(v));
            }
            neighbours.sort_unstable();
            if neighbours.windows(2).any(|w| w[0] == w[1]) {
                return fail(format!("{:?} has duplicate edges", v));
            }
        }

        Ok(())
    }

    /// Check if the mesh is valid (all connectivity is consistent).
    pub fn is_valid(&self) -> bool {
        self.check_validity().is_ok()
    }

    /// Summary of element counts.
    pub fn info(&self) -> MeshInfo {
        MeshInfo {
            vertices: self.vertex_count(),
            max_vertex_id: self.max_vertex_id(),
            edges: self.edge_count(),
            max_edge_id: self.max_edge_id(),
            boundary_edges: self.boundary_edge_ids().count(),
            triangles: self.triangle_count(),
            max_triangle_id: self.max_triangle_id(),
        }
    }
}

/// Element counts of a mesh, printable as a one-line summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshInfo {
    /// Live vertices.
    pub vertices: usize,
    /// Exclusive upper bound of vertex ids.
    pub max_vertex_id: usize,
    /// Live edges.
    pub edges: usize,
    /// Exclusive upper bound of edge ids.
    pub max_edge_id: usize,
    /// Live boundary edges.
    pub boundary_edges: usize,
    /// Live triangles.
    pub triangles: usize,
    /// Exclusive upper bound of triangle ids.
    pub max_triangle_id: usize,
}

impl MeshInfo {
    /// Whether the mesh has no boundary edges.
    pub fn is_closed(&self) -> bool {
        self.boundary_edges == 0
    }
}

impl fmt::Display for MeshInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vertices {}/{} edges {}/{} (boundary {}) triangles {}/{}",
            self.vertices,
            self.max_vertex_id,
            self.edges,
            self.max_edge_id,
            self.boundary_edges,
            self.triangles,
            self.max_triangle_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> (DynamicMesh, [VertexId; 4], [TriangleId; 2]) {
        let mut mesh = DynamicMesh::new();
        let v0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = mesh.add_vertex(Point3::new(1.0, 1.0, 0.0));
        let v3 = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        let t0 = mesh.add_triangle(v0, v1, v2).unwrap();
        let t1 = mesh.add_triangle(v0, v2, v3).unwrap();
        (mesh, [v0, v1, v2, v3], [t0, t1])
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = DynamicMesh::<u32>::new();
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.edge_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
        assert!(mesh.is_valid());
        assert!(mesh.bounding_box().is_none());
        assert_eq!(mesh.average_edge_length(), 0.0);
    }

    #[test]
    fn test_quad_connectivity() {
        let (mesh, [v0, v1, v2, v3], [t0, t1]) = quad();
        assert!(mesh.is_valid());
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.edge_count(), 5);
        assert_eq!(mesh.triangle_count(), 2);

        let diagonal = mesh.find_edge(v0, v2).unwrap();
        assert!(!mesh.is_boundary_edge(diagonal));
        assert_eq!(mesh.edge_triangles(diagonal), [t0, t1]);
        assert_eq!(mesh.edge_vertices(diagonal), [v0, v2]);

        let mut opposite = mesh.edge_opposite_vertices(diagonal);
        opposite.sort();
        assert_eq!(opposite, [v1, v3]);

        let side = mesh.find_edge(v1, v0).unwrap();
        assert!(mesh.is_boundary_edge(side));
        assert_eq!(mesh.boundary_edge_ids().count(), 4);

        assert_eq!(mesh.valence(v0), 3);
        assert_eq!(mesh.valence(v1), 2);
        assert_eq!(mesh.vertex_triangle_count(v0), 2);
        assert_eq!(mesh.vertex_triangles(v2), vec![t0, t1]);
        assert!(mesh.is_boundary_vertex(v3));
        assert!(mesh.triangle_has_sequential(t0, v1, v2));
        assert!(!mesh.triangle_has_sequential(t0, v2, v1));
    }

    #[test]
    fn test_triangle_neighbours() {
        let (mesh, _, [t0, t1]) = quad();
        let n0 = mesh.triangle_neighbours(t0);
        assert_eq!(n0.iter().filter(|t| t.is_valid()).count(), 1);
        assert!(n0.contains(&t1));
        assert!(n0.contains(&TriangleId::invalid()));
    }

    #[test]
    fn test_triangle_geometry() {
        let (mesh, _, [t0, _]) = quad();
        assert!((mesh.triangle_area(t0) - 0.5).abs() < 1e-12);
        assert!((mesh.triangle_normal(t0) - Vector3::z()).norm() < 1e-12);
        assert!((mesh.surface_area() - 1.0).abs() < 1e-12);
        let expected = (4.0 + 2.0_f64.sqrt()) / 5.0;
        assert!((mesh.average_edge_length() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_add_triangle_rejects_bad_input() {
        let (mut mesh, [v0, v1, v2, _], _) = quad();
        assert!(matches!(
            mesh.add_triangle(v0, v0, v1),
            Err(MeshError::DegenerateTriangle { .. })
        ));
        assert!(matches!(
            mesh.add_triangle(v0, v1, VertexId::new(99)),
            Err(MeshError::InvalidVertexIndex { vertex: 99, .. })
        ));

        // The diagonal already has two triangles.
        let v4 = mesh.add_vertex(Point3::new(0.5, 0.5, 1.0));
        assert!(matches!(
            mesh.add_triangle(v2, v0, v4),
            Err(MeshError::NonManifoldEdge { .. })
        ));
        assert!(mesh.is_valid());
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_remove_triangle_keeps_ids_stable() {
        let (mut mesh, [v0, _, v2, v3], [t0, t1]) = quad();
        assert!(mesh.remove_triangle(t0, false, false));
        assert!(!mesh.is_triangle(t0));
        assert!(mesh.is_triangle(t1));
        assert_eq!(mesh.max_triangle_id(), 2);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.edge_count(), 3);
        // Vertex 1 is now isolated but was kept.
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle(t1), [v0, v2, v3]);
        assert!(mesh.is_valid());

        // Removing again is a no-op.
        assert!(!mesh.remove_triangle(t0, false, false));

        // The freed slot is handed out again.
        let v1 = VertexId::new(1);
        let t = mesh.add_triangle(v0, v1, v2).unwrap();
        assert_eq!(t, t0);
        assert_eq!(mesh.edge_count(), 5);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_remove_triangle_isolated_vertices() {
        let (mut mesh, [v0, v1, _, _], [t0, t1]) = quad();
        assert!(mesh.remove_triangle(t0, true, false));
        assert!(!mesh.is_vertex(v1));
        assert!(mesh.is_vertex(v0));
        assert!(mesh.remove_triangle(t1, true, false));
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.edge_count(), 0);
        assert!(mesh.is_valid());

        // Freed vertex slots are reused.
        let v = mesh.add_vertex(Point3::origin());
        assert!(v.index() < 4);
    }

    #[test]
    fn test_remove_triangle_preserve_manifold() {
        // Fan of three triangles around v0; removing the middle one would
        // leave v0 with four boundary edges.
        let mut mesh: DynamicMesh = DynamicMesh::new();
        let v0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = mesh.add_vertex(Point3::new(1.0, 1.0, 0.0));
        let v3 = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        let v4 = mesh.add_vertex(Point3::new(-1.0, 1.0, 0.0));
        mesh.add_triangle(v0, v1, v2).unwrap();
        let middle = mesh.add_triangle(v0, v2, v3).unwrap();
        mesh.add_triangle(v0, v3, v4).unwrap();

        assert!(!mesh.remove_triangle(middle, false, true));
        assert!(mesh.is_triangle(middle));
        assert!(mesh.remove_triangle(middle, false, false));
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_vertex_channels() {
        let mut mesh: DynamicMesh = DynamicMesh::new();
        let v0 = mesh.add_vertex(Point3::origin());
        mesh.enable_vertex_normals();
        mesh.enable_vertex_uvs();
        assert_eq!(mesh.vertex_normal(v0), Some(Vector3::zeros()));

        let v1 = mesh.add_vertex_with(VertexInfo {
            position: Point3::new(1.0, 0.0, 0.0),
            normal: Some(Vector3::z()),
            uv: Some(Vector2::new(0.25, 0.5)),
        });
        assert_eq!(mesh.vertex_normal(v1), Some(Vector3::z()));
        assert_eq!(mesh.vertex_uv(v1), Some(Vector2::new(0.25, 0.5)));
        assert_eq!(mesh.vertex_info(v1).position, Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_info_display() {
        let (mesh, _, _) = quad();
        let info = mesh.info();
        assert_eq!(info.boundary_edges, 4);
        assert!(!info.is_closed());
        assert_eq!(
            info.to_string(),
            "vertices 4/4 edges 5/5 (boundary 4) triangles 2/2"
        );
    }
}
