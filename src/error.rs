//! Error types for tessera.
//!
//! [`MeshError`] covers construction, parameter and validity failures that a
//! caller has to act on. [`EditRejection`] explains why a local edit (split,
//! collapse, flip) was refused; the remesher treats those as no-ops.

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// The mesh has no triangles.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// A triangle references a vertex that does not exist.
    #[error("triangle {triangle} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The triangle index in the input list.
        triangle: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A triangle has duplicate vertex indices.
    #[error("triangle {triangle} is degenerate (has duplicate vertices)")]
    DegenerateTriangle {
        /// The triangle index in the input list.
        triangle: usize,
    },

    /// An edge would receive a third incident triangle.
    #[error("edge ({v0}, {v1}) already has two incident triangles")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// The mesh violates one of its connectivity invariants.
    #[error("invalid mesh state: {0}")]
    InvalidState(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

/// Reasons a local topological edit was refused.
///
/// A rejected edit leaves the mesh exactly as it was.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRejection {
    /// The edge id is not alive.
    #[error("not an edge")]
    NotAnEdge,

    /// A vertex id is not alive.
    #[error("not a vertex")]
    NotAVertex,

    /// The operation is undefined on a boundary edge.
    #[error("edge is on the boundary")]
    BoundaryEdge,

    /// The result would contain an edge shared by more than two triangles,
    /// a bow-tie vertex or a duplicated triangle.
    #[error("edit would create non-manifold topology")]
    NonManifold,

    /// The result would collapse a whole isolated triangle or tetrahedron.
    #[error("edit would collapse a closed component")]
    DegenerateComponent,

    /// A constraint forbids the edit.
    #[error("edit is forbidden by a constraint")]
    Constrained,

    /// The edit would invert the orientation of a triangle.
    #[error("edit would flip a triangle normal")]
    NormalFlip,

    /// The edit would create an edge longer than the split threshold.
    #[error("edit would create an overly long edge")]
    EdgeTooLong,
}
