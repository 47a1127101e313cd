//! # Tessera
//!
//! Constrained isotropic remeshing of triangle surfaces.
//!
//! Tessera stores meshes in a [`DynamicMesh`](mesh::DynamicMesh): an indexed
//! triangle mesh with explicit edges and stable, reusable element ids that
//! supports in-place edge splits, collapses and flips. On top of it sit an
//! AABB tree for nearest-point queries and a remesher that drives a mesh
//! toward a uniform target edge length while honouring vertex and edge
//! constraints.
//!
//! ## Features
//!
//! - **Dynamic mesh**: O(1) edge lookups per vertex, stable ids, validity checks
//! - **Flexible indexing**: Support for 16-bit, 32-bit, and 64-bit indices
//! - **Spatial queries**: Nearest point, ray hits and containment through an AABB tree
//! - **Constraints**: Pinned vertices, fixed edges, and vertices sliding on curves
//! - **Parallel smoothing**: Rayon-based relaxation with normal-flip repair
//!
//! ## Quick Start
//!
//! ```
//! use tessera::prelude::*;
//! use tessera::algo::remesh::{isotropic_remesh, BoundaryMode, RemeshOptions};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2], [0, 2, 3]];
//! let mut mesh: DynamicMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! let options = RemeshOptions::with_target_length(0.2)
//!     .with_boundary(BoundaryMode::ConstrainLoops);
//! let report = isotropic_remesh(&mut mesh, &options).unwrap();
//!
//! println!("{} -> {}", report.initial, report.final_info);
//! assert!(mesh.is_valid());
//! ```
//!
//! ## Local Edits
//!
//! ```
//! use tessera::prelude::*;
//! use nalgebra::Point3;
//!
//! # let vertices = vec![
//! #     Point3::new(0.0, 0.0, 0.0),
//! #     Point3::new(1.0, 0.0, 0.0),
//! #     Point3::new(1.0, 1.0, 0.0),
//! #     Point3::new(0.0, 1.0, 0.0),
//! # ];
//! # let faces = vec![[0, 1, 2], [0, 2, 3]];
//! let mut mesh: DynamicMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! let diagonal = mesh.find_edge(VertexId::new(0), VertexId::new(2)).unwrap();
//! let split = mesh.split_edge(diagonal).unwrap();
//! assert_eq!(mesh.valence(split.new_vertex), 4);
//!
//! for t in mesh.vertex_triangles(split.new_vertex) {
//!     println!("Adjacent triangle: {:?}", mesh.triangle(t));
//! }
//! ```
//!
//! ## Logging
//!
//! Tessera reports through [`tracing`](https://docs.rs/tracing). Install any
//! subscriber to see pass summaries (`debug`) and rejected edits (`trace`).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;
pub mod spatial;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::remesh::{
        EdgeConstraint, MeshConstraints, Remesher, RemesherOptions, VertexConstraint,
    };
    pub use crate::error::{EditRejection, MeshError, Result};
    pub use crate::mesh::{
        build_from_triangles, to_face_vertex, DynamicMesh, EdgeId, MeshIndex, TriangleId,
        VertexId,
    };
    pub use crate::spatial::MeshAabbTree;
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];

        let faces = vec![
            [0, 2, 1], // bottom
            [0, 1, 3], // front
            [1, 2, 3], // right
            [2, 0, 3], // left
        ];

        let mesh: DynamicMesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.edge_count(), 6);
        assert!(mesh.is_valid());

        for v in mesh.vertex_ids() {
            assert!(!mesh.is_boundary_vertex(v), "vertex {:?} should not be on boundary", v);
        }
    }

    #[test]
    fn test_small_index_type() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh: DynamicMesh<u16> =
            build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();

        let mut remesher = Remesher::new(&mut mesh);
        remesher.set_target_edge_length(0.4).unwrap();
        remesher.precompute();
        remesher.basic_remesh_pass();
        assert!(mesh.is_valid());
        assert!(mesh.triangle_count() > 2);
    }
}
