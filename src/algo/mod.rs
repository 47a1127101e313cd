//! Mesh processing algorithms.
//!
//! - **Remeshing**: constrained isotropic remeshing with projection
//! - **Cleanup**: fin-triangle removal
//! - **Progress**: callbacks for long-running drivers

pub mod cleanup;
pub mod progress;
pub mod remesh;

pub use progress::Progress;
