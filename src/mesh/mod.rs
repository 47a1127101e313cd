//! Core mesh data structures.
//!
//! This module provides the dynamic indexed triangle mesh and related types
//! for representing and editing triangle meshes.
//!
//! # Overview
//!
//! The primary type is [`DynamicMesh`], which stores vertices, edges and
//! triangles in reference-counted pools. Element ids stay stable while the
//! mesh is edited, which lets remeshing algorithms split, collapse and flip
//! edges in place without renumbering.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`EdgeId`] - Identifies an edge
//! - [`TriangleId`] - Identifies a triangle
//!
//! These indices are generic over the underlying integer type ([`MeshIndex`] trait),
//! allowing you to choose `u16`, `u32`, or `u64` based on mesh size.
//!
//! # Construction
//!
//! Meshes are typically constructed from face-vertex lists:
//!
//! ```
//! use tessera::mesh::{DynamicMesh, build_from_triangles};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh: DynamicMesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert!(mesh.is_valid());
//! ```

mod boundary;
mod builder;
mod dynamic;
mod edit;
mod index;
mod pool;

pub use boundary::{boundary_loops, BoundaryLoop};
pub use builder::{build_from_triangles, to_face_vertex};
pub use dynamic::{DynamicMesh, Edge, MeshInfo, VertexInfo};
pub use edit::{EdgeCollapseInfo, EdgeFlipInfo, EdgeSplitInfo};
pub use index::{EdgeId, MeshIndex, TriangleId, VertexId};
pub use pool::RefCountPool;
