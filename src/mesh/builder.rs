//! Mesh construction utilities.
//!
//! This module provides functions for building dynamic meshes from
//! face-vertex lists, as produced by mesh file readers, and for turning a
//! mesh back into that representation.

use nalgebra::Point3;

use super::dynamic::DynamicMesh;
use super::index::{MeshIndex, VertexId};
use crate::error::{MeshError, Result};

/// Build a dynamic mesh from vertices and triangle faces.
///
/// # Arguments
/// * `vertices` - List of vertex positions
/// * `faces` - List of triangle faces, each as [v0, v1, v2] indices
///
/// # Returns
/// A dynamic mesh whose vertex and triangle ids match the input order, or an
/// error if the input is invalid or non-manifold.
///
/// # Example
/// ```
/// use tessera::mesh::{build_from_triangles, DynamicMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: DynamicMesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.edge_count(), 3);
/// assert_eq!(mesh.triangle_count(), 1);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<DynamicMesh<I>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    // Validate vertex indices
    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(MeshError::InvalidVertexIndex {
                    triangle: fi,
                    vertex: vi,
                });
            }
        }
        // Check for degenerate faces
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MeshError::DegenerateTriangle { triangle: fi });
        }
    }

    let mut mesh = DynamicMesh::with_capacity(vertices.len(), faces.len());

    let vertex_ids: Vec<VertexId<I>> = vertices
        .iter()
        .map(|&pos| mesh.add_vertex(pos))
        .collect();

    for face in faces {
        mesh.add_triangle(
            vertex_ids[face[0]],
            vertex_ids[face[1]],
            vertex_ids[face[2]],
        )?;
    }

    Ok(mesh)
}

/// Convert a dynamic mesh back to a face-vertex representation.
///
/// Live vertices are renumbered densely in id order, so the output is valid
/// even after edits left holes in the id ranges.
///
/// Returns (vertices, faces) tuple.
pub fn to_face_vertex<I: MeshIndex>(mesh: &DynamicMesh<I>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut remap = vec![usize::MAX; mesh.max_vertex_id()];
    let mut vertices = Vec::with_capacity(mesh.vertex_count());
    for v in mesh.vertex_ids() {
        remap[v.index()] = vertices.len();
        vertices.push(*mesh.position(v));
    }

    let faces: Vec<[usize; 3]> = mesh
        .triangle_ids()
        .map(|t| {
            let [v0, v1, v2] = mesh.triangle(t);
            [remap[v0.index()], remap[v1.index()], remap[v2.index()]]
        })
        .collect();

    (vertices, faces)
}

impl<I: MeshIndex> DynamicMesh<I> {
    /// Copy of this mesh with dense ids.
    ///
    /// Vertices keep their relative order, and normal and uv channels are
    /// carried over. Isolated vertices are kept. Fails only if `self` is not
    /// a valid mesh.
    pub fn compacted(&self) -> Result<Self> {
        let mut out = Self::with_capacity(self.vertex_count(), self.triangle_count());
        if self.has_vertex_normals() {
            out.enable_vertex_normals();
        }
        if self.has_vertex_uvs() {
            out.enable_vertex_uvs();
        }

        let mut remap = vec![VertexId::invalid(); self.max_vertex_id()];
        for v in self.vertex_ids() {
            remap[v.index()] = out.add_vertex_with(self.vertex_info(v));
        }
        for t in self.triangle_ids() {
            let [a, b, c] = self.triangle(t);
            out.add_triangle(remap[a.index()], remap[b.index()], remap[c.index()])?;
        }
        Ok(out)
    }
}
