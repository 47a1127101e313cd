//! Constrained isotropic remeshing.
//!
//! The [`Remesher`] drives the Botsch & Kobbelt loop on a [`DynamicMesh`]
//! in place. Each pass:
//!
//! 1. **Split** edges longer than 4/3 × target length
//! 2. **Collapse** edges shorter than 4/5 × target length
//! 3. **Flip** edges to improve vertex valence
//! 4. **Smooth** vertices toward their one-ring centroid and project them
//!    back onto a [`ProjectionTarget`]
//!
//! [`MeshConstraints`] restrict which vertices may move and which edges may
//! be edited. Constraints follow the mesh through splits and collapses.
//!
//! # Example
//!
//! ```
//! use tessera::prelude::*;
//! use tessera::algo::remesh::{isotropic_remesh, RemeshOptions};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mut mesh: DynamicMesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//!
//! let options = RemeshOptions::with_target_length(0.25).with_iterations(5);
//! let report = isotropic_remesh(&mut mesh, &options).unwrap();
//! assert!(report.final_info.triangles > 2);
//! ```
//!
//! # References
//!
//! - Botsch, M., & Kobbelt, L. (2004). "A remeshing approach to multiresolution modeling."
//!   Symposium on Geometry Processing.
//!
//! [`DynamicMesh`]: crate::mesh::DynamicMesh

mod constraints;
mod isotropic;
mod projection;
mod remesher;
mod smooth;

pub use constraints::{
    preserve_all_boundary_edges, preserve_boundary_loops, EdgeConstraint, MeshConstraints,
    VertexConstraint,
};
pub use isotropic::{
    isotropic_remesh, isotropic_remesh_with_progress, BoundaryMode, RemeshOptions, RemeshReport,
};
pub use projection::{
    same_target, CurveProjectionTarget, MeshProjectionTarget, PolylineCurve, ProjectionTarget,
    SharedTarget,
};
pub use remesher::{PassStats, Remesher, RemesherOptions, SmoothingKind};
