//! Spatial acceleration for nearest-surface and ray queries.
//!
//! - [`Aabb`] - Axis-aligned bounding box with point distance and ray slab tests
//! - [`MeshAabbTree`] - Immutable bounding volume hierarchy over a mesh snapshot
//! - [`closest_point_on_triangle`], [`closest_point_on_segment`],
//!   [`ray_triangle_intersect`] - Exact proximity primitives

mod aabb;
mod query;
mod tree;

pub use aabb::Aabb;
pub use query::{closest_point_on_segment, closest_point_on_triangle, ray_triangle_intersect};
pub use tree::{CoverageReport, MeshAabbTree, NearestHit, RayHit, TreeOptions};
