//! One-call isotropic remeshing driver.

use std::sync::Arc;

use tracing::{info, warn};

use super::constraints::{preserve_all_boundary_edges, preserve_boundary_loops, MeshConstraints};
use super::projection::{MeshProjectionTarget, SharedTarget};
use super::remesher::{PassStats, Remesher, RemesherOptions};
use crate::algo::cleanup::remove_fin_triangles;
use crate::algo::Progress;
use crate::error::{MeshError, Result};
use crate::mesh::{DynamicMesh, MeshIndex, MeshInfo};

/// What happens to the mesh boundary while remeshing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoundaryMode {
    /// Boundary vertices and edges are treated like interior ones.
    Free,
    /// Boundary vertices are pinned and boundary edges never change.
    #[default]
    PinEdges,
    /// Boundary vertices slide along their boundary loop; boundary edges may
    /// be split and collapsed.
    ConstrainLoops,
}

/// Options for [`isotropic_remesh`].
#[derive(Debug, Clone)]
pub struct RemeshOptions {
    /// Target edge length. Derived from the mean edge length if `None`.
    pub target_edge_length: Option<f64>,

    /// Lower clamp for a derived target edge length.
    pub min_edge_length: f64,

    /// Upper clamp for a derived target edge length.
    pub max_edge_length: f64,

    /// Number of remeshing passes.
    pub iterations: usize,

    /// Boundary handling.
    pub boundary: BoundaryMode,

    /// Project free vertices back onto a snapshot of the input surface.
    pub project_to_input: bool,

    /// Remove fin triangles after the last pass.
    pub remove_fins: bool,

    /// Per-pass remesher options. The smoothing speed is spread over
    /// `iterations` passes.
    pub remesher: RemesherOptions,
}

impl Default for RemeshOptions {
    fn default() -> Self {
        Self {
            target_edge_length: None,
            min_edge_length: 0.008,
            max_edge_length: 1.0,
            iterations: 5,
            boundary: BoundaryMode::PinEdges,
            project_to_input: true,
            remove_fins: true,
            remesher: RemesherOptions::default().with_prevent_normal_flips(true),
        }
    }
}

impl RemeshOptions {
    /// Create options with the specified target edge length.
    pub fn with_target_length(target_length: f64) -> Self {
        Self {
            target_edge_length: Some(target_length),
            ..Self::default()
        }
    }

    /// Set the clamp range for a derived target edge length.
    pub fn with_length_range(mut self, min: f64, max: f64) -> Self {
        self.min_edge_length = min;
        self.max_edge_length = max;
        self
    }

    /// Set the number of remeshing passes.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the boundary handling.
    pub fn with_boundary(mut self, boundary: BoundaryMode) -> Self {
        self.boundary = boundary;
        self
    }

    /// Set whether free vertices are projected onto the input surface.
    pub fn with_projection(mut self, project: bool) -> Self {
        self.project_to_input = project;
        self
    }

    /// Set whether fins are removed at the end.
    pub fn with_fin_removal(mut self, remove: bool) -> Self {
        self.remove_fins = remove;
        self
    }

    /// Set the per-pass remesher options.
    pub fn with_remesher_options(mut self, remesher: RemesherOptions) -> Self {
        self.remesher = remesher;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.remesher = self.remesher.sequential();
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(length) = self.target_edge_length {
            if !length.is_finite() || length <= 0.0 {
                return Err(MeshError::invalid_param(
                    "target_edge_length",
                    length,
                    "must be positive and finite",
                ));
            }
        }
        if !self.min_edge_length.is_finite() || self.min_edge_length <= 0.0 {
            return Err(MeshError::invalid_param(
                "min_edge_length",
                self.min_edge_length,
                "must be positive and finite",
            ));
        }
        if !self.max_edge_length.is_finite() || self.max_edge_length < self.min_edge_length {
            return Err(MeshError::invalid_param(
                "max_edge_length",
                self.max_edge_length,
                "must be finite and at least min_edge_length",
            ));
        }
        if !self.remesher.smooth_speed.is_finite() || self.remesher.smooth_speed < 0.0 {
            return Err(MeshError::invalid_param(
                "smooth_speed",
                self.remesher.smooth_speed,
                "must be non-negative and finite",
            ));
        }
        Ok(())
    }
}

/// Summary of an [`isotropic_remesh`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct RemeshReport {
    /// The target edge length used.
    pub target_edge_length: f64,
    /// Passes run.
    pub passes: usize,
    /// Mesh statistics before remeshing.
    pub initial: MeshInfo,
    /// Mesh statistics after remeshing and fin removal.
    pub final_info: MeshInfo,
    /// Edit counts summed over all passes.
    pub totals: PassStats,
    /// Fin triangles removed at the end.
    pub fins_removed: usize,
}

/// Performs isotropic remeshing on a triangle mesh.
///
/// The input surface is snapshotted into an AABB tree that free vertices are
/// projected back onto, boundaries are handled according to
/// [`RemeshOptions::boundary`], and fin triangles are removed at the end.
///
/// # Algorithm Steps (per pass)
///
/// 1. **Edge splitting**: Split edges longer than 4/3 × target length
/// 2. **Edge collapsing**: Collapse edges shorter than 4/5 × target length
/// 3. **Edge flipping**: Flip edges to equalize vertex valence
/// 4. **Smoothing**: Relax vertices and project them onto the input surface
///
/// # Errors
///
/// [`MeshError::EmptyMesh`] if the mesh has no triangles and
/// [`MeshError::InvalidParameter`] for invalid options.
pub fn isotropic_remesh<I: MeshIndex>(
    mesh: &mut DynamicMesh<I>,
    options: &RemeshOptions,
) -> Result<RemeshReport> {
    isotropic_remesh_internal(mesh, options, None)
}

/// Performs isotropic remeshing with progress reporting.
///
/// See [`isotropic_remesh`] for algorithm details.
pub fn isotropic_remesh_with_progress<I: MeshIndex>(
    mesh: &mut DynamicMesh<I>,
    options: &RemeshOptions,
    progress: &Progress,
) -> Result<RemeshReport> {
    isotropic_remesh_internal(mesh, options, Some(progress))
}

fn isotropic_remesh_internal<I: MeshIndex>(
    mesh: &mut DynamicMesh<I>,
    options: &RemeshOptions,
    progress: Option<&Progress>,
) -> Result<RemeshReport> {
    if mesh.triangle_count() == 0 {
        return Err(MeshError::EmptyMesh);
    }
    options.validate()?;

    let initial = mesh.info();
    let length = options.target_edge_length.unwrap_or_else(|| {
        mesh.average_edge_length()
            .clamp(options.min_edge_length, options.max_edge_length)
    });

    let target: Option<SharedTarget> = options.project_to_input.then(|| {
        let snapshot = MeshProjectionTarget::from_mesh(mesh);
        let coverage = snapshot.tree().test_coverage();
        if !coverage.is_ok() {
            warn!(?coverage, "projection tree does not cover the input mesh");
        }
        Arc::new(snapshot) as SharedTarget
    });

    let mut constraints = MeshConstraints::new();
    match options.boundary {
        BoundaryMode::Free => {}
        BoundaryMode::PinEdges => preserve_all_boundary_edges(&mut constraints, mesh),
        BoundaryMode::ConstrainLoops => {
            preserve_boundary_loops(&mut constraints, mesh);
        }
    }

    let passes = options.iterations;
    // One progress step per pass plus one for fin removal.
    let total_steps = passes + 1;

    let mut totals = PassStats::default();
    {
        let remesher_options = options.remesher.clone().with_planned_passes(passes);
        let mut remesher = Remesher::with_options(mesh, remesher_options);
        remesher.set_target_edge_length(length)?;
        remesher.set_external_constraints(constraints);
        if let Some(target) = target {
            remesher.set_projection_target(target);
        }
        remesher.precompute();

        for pass in 0..passes {
            if let Some(p) = progress {
                p.report(pass, total_steps, "Remeshing");
            }
            totals += remesher.basic_remesh_pass();
        }
    }

    if let Some(p) = progress {
        p.report(passes, total_steps, "Removing fins");
    }
    let fins_removed = if options.remove_fins {
        remove_fin_triangles(mesh, true)
    } else {
        0
    };
    if let Some(p) = progress {
        p.report(total_steps, total_steps, "Done");
    }

    let final_info = mesh.info();
    info!(
        target_edge_length = length,
        passes,
        splits = totals.splits,
        collapses = totals.collapses,
        flips = totals.flips,
        fins_removed,
        before = %initial,
        after = %final_info,
        "isotropic remesh finished"
    );

    Ok(RemeshReport {
        target_edge_length: length,
        passes,
        initial,
        final_info,
        totals,
        fins_removed,
    })
}
