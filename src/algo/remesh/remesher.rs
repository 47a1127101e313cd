//! The split / collapse / flip / smooth remesher.

use std::ops::AddAssign;

use nalgebra::{Point3, Vector3};
use tracing::{debug, trace, warn};

use super::constraints::{EdgeConstraint, MeshConstraints, VertexConstraint};
use super::projection::{same_target, SharedTarget};
use super::smooth::smooth_vertices;
use crate::error::{EditRejection, MeshError, Result};
use crate::mesh::{DynamicMesh, EdgeId, MeshIndex, TriangleId, VertexId};

/// How the one-ring centroid is computed while smoothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmoothingKind {
    /// Plain mean of the neighbour positions.
    #[default]
    Uniform,
    /// Mean of incident triangle centroids weighted by triangle area.
    AreaWeighted,
}

/// Options for [`Remesher`].
#[derive(Debug, Clone)]
pub struct RemesherOptions {
    /// Fraction of the way toward the centroid a vertex moves per pass.
    pub smooth_speed: f64,

    /// Compute smoothed positions in parallel from a snapshot (default: true).
    pub enable_parallel_smooth: bool,

    /// Reject edits and revert moves that would invert a triangle.
    pub prevent_normal_flips: bool,

    /// Centroid used by smoothing.
    pub smoothing: SmoothingKind,

    /// Run the split stage.
    pub enable_splits: bool,

    /// Run the collapse stage.
    pub enable_collapses: bool,

    /// Run the flip stage.
    pub enable_flips: bool,

    /// Run the smoothing stage.
    pub enable_smoothing: bool,
}

impl Default for RemesherOptions {
    fn default() -> Self {
        Self {
            smooth_speed: 0.5,
            enable_parallel_smooth: true,
            prevent_normal_flips: false,
            smoothing: SmoothingKind::Uniform,
            enable_splits: true,
            enable_collapses: true,
            enable_flips: true,
            enable_smoothing: true,
        }
    }
}

impl RemesherOptions {
    /// Set the smoothing speed.
    pub fn with_smooth_speed(mut self, speed: f64) -> Self {
        self.smooth_speed = speed;
        self
    }

    /// Spread the smoothing speed over `passes` planned passes.
    pub fn with_planned_passes(mut self, passes: usize) -> Self {
        self.smooth_speed /= passes.max(1) as f64;
        self
    }

    /// Set whether smoothing runs in parallel.
    pub fn with_parallel_smooth(mut self, parallel: bool) -> Self {
        self.enable_parallel_smooth = parallel;
        self
    }

    /// Set whether normal flips are prevented.
    pub fn with_prevent_normal_flips(mut self, prevent: bool) -> Self {
        self.prevent_normal_flips = prevent;
        self
    }

    /// Set the smoothing centroid.
    pub fn with_smoothing(mut self, smoothing: SmoothingKind) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Enable or disable the split stage.
    pub fn with_splits(mut self, enable: bool) -> Self {
        self.enable_splits = enable;
        self
    }

    /// Enable or disable the collapse stage.
    pub fn with_collapses(mut self, enable: bool) -> Self {
        self.enable_collapses = enable;
        self
    }

    /// Enable or disable the flip stage.
    pub fn with_flips(mut self, enable: bool) -> Self {
        self.enable_flips = enable;
        self
    }

    /// Enable or disable the smoothing stage.
    pub fn with_smoothing_stage(mut self, enable: bool) -> Self {
        self.enable_smoothing = enable;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.enable_parallel_smooth = false;
        self
    }
}

/// Edit counts of one or more passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Edges split.
    pub splits: usize,
    /// Edges collapsed.
    pub collapses: usize,
    /// Edges flipped.
    pub flips: usize,
    /// Vertices moved by smoothing.
    pub smoothed: usize,
    /// Smoothing moves undone to avoid inverted triangles.
    pub reverted: usize,
}

impl PassStats {
    /// Whether the pass changed the connectivity.
    pub fn changed_topology(&self) -> bool {
        self.splits + self.collapses + self.flips > 0
    }
}

impl AddAssign for PassStats {
    fn add_assign(&mut self, rhs: Self) {
        self.splits += rhs.splits;
        self.collapses += rhs.collapses;
        self.flips += rhs.flips;
        self.smoothed += rhs.smoothed;
        self.reverted += rhs.reverted;
    }
}

/// A planned collapse: which endpoint survives and where it goes.
struct CollapsePlan<I: MeshIndex> {
    keep: VertexId<I>,
    remove: VertexId<I>,
    position: Point3<f64>,
    transfers: Vec<(EdgeId<I>, EdgeConstraint)>,
}

/// Isotropic remesher operating in place on a [`DynamicMesh`].
///
/// Each [`basic_remesh_pass`](Self::basic_remesh_pass) splits edges longer
/// than `4/3·L`, collapses edges shorter than `4/5·L`, flips edges toward
/// valence 6 (4 on the boundary) and relaxes vertices, where `L` is the
/// target edge length. Vertex and edge constraints restrict every stage.
///
/// # Example
///
/// ```
/// use tessera::prelude::*;
/// use tessera::algo::remesh::Remesher;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let mut mesh: DynamicMesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
///
/// let mut remesher = Remesher::new(&mut mesh);
/// remesher.set_target_edge_length(0.25).unwrap();
/// remesher.precompute();
/// let stats = remesher.basic_remesh_pass();
/// assert!(stats.splits > 0);
/// ```
#[derive(Debug)]
pub struct Remesher<'a, I: MeshIndex = u32> {
    mesh: &'a mut DynamicMesh<I>,
    constraints: MeshConstraints<I>,
    target: Option<SharedTarget>,
    options: RemesherOptions,
    target_edge_length: f64,
    mesh_is_closed: bool,
    ready: bool,
}

impl<'a, I: MeshIndex> Remesher<'a, I> {
    /// Create a remesher with default options and target length 1.
    pub fn new(mesh: &'a mut DynamicMesh<I>) -> Self {
        Self::with_options(mesh, RemesherOptions::default())
    }

    /// Create a remesher with the given options.
    pub fn with_options(mesh: &'a mut DynamicMesh<I>, options: RemesherOptions) -> Self {
        Self {
            mesh,
            constraints: MeshConstraints::new(),
            target: None,
            options,
            target_edge_length: 1.0,
            mesh_is_closed: false,
            ready: false,
        }
    }

    /// The mesh being remeshed.
    pub fn mesh(&self) -> &DynamicMesh<I> {
        &*self.mesh
    }

    /// Current options.
    pub fn options(&self) -> &RemesherOptions {
        &self.options
    }

    /// Replace the options.
    pub fn set_options(&mut self, options: RemesherOptions) {
        self.options = options;
    }

    /// Target edge length.
    pub fn target_edge_length(&self) -> f64 {
        self.target_edge_length
    }

    /// Set the target edge length.
    pub fn set_target_edge_length(&mut self, length: f64) -> Result<()> {
        if !length.is_finite() || length <= 0.0 {
            return Err(MeshError::invalid_param(
                "target_edge_length",
                length,
                "must be positive and finite",
            ));
        }
        self.target_edge_length = length;
        Ok(())
    }

    /// Replace the constraint set.
    pub fn set_external_constraints(&mut self, constraints: MeshConstraints<I>) {
        self.constraints = constraints;
    }

    /// Current constraints, including those inherited by new elements.
    pub fn constraints(&self) -> &MeshConstraints<I> {
        &self.constraints
    }

    /// Take the constraint set out, leaving an empty one.
    pub fn take_constraints(&mut self) -> MeshConstraints<I> {
        std::mem::take(&mut self.constraints)
    }

    /// Set the surface free vertices are projected onto after smoothing.
    pub fn set_projection_target(&mut self, target: SharedTarget) {
        self.target = Some(target);
    }

    /// Remove the projection target.
    pub fn clear_projection_target(&mut self) {
        self.target = None;
    }

    /// Whether the mesh had no boundary at [`precompute`](Self::precompute).
    pub fn mesh_is_closed(&self) -> bool {
        self.mesh_is_closed
    }

    /// Prepare for remeshing. Must be called before the first pass.
    pub fn precompute(&mut self) {
        self.mesh_is_closed = self.mesh.boundary_edge_ids().next().is_none();

        let bad = self.constraints.check_invariants(self.mesh);
        if !bad.is_empty() {
            warn!(
                edges = bad.len(),
                "fully constrained edges without constrained endpoints"
            );
        }
        debug!(
            closed = self.mesh_is_closed,
            constrained_vertices = self.constraints.vertex_constraint_count(),
            constrained_edges = self.constraints.edge_constraint_count(),
            target_edge_length = self.target_edge_length,
            "remesher ready"
        );
        self.ready = true;
    }

    /// Run one split / collapse / flip / smooth pass.
    ///
    /// A no-op before [`precompute`](Self::precompute) or on a mesh without
    /// triangles.
    pub fn basic_remesh_pass(&mut self) -> PassStats {
        let mut stats = PassStats::default();
        if !self.ready {
            warn!("remesh pass skipped: precompute() was not called");
            return stats;
        }
        if self.mesh.triangle_count() == 0 {
            debug!("remesh pass skipped: mesh has no triangles");
            return stats;
        }

        if self.options.enable_splits {
            stats.splits = self.split_long_edges();
        }
        if self.options.enable_collapses {
            stats.collapses = self.collapse_short_edges();
        }
        if self.options.enable_flips {
            stats.flips = self.flip_edges();
        }
        if self.options.enable_smoothing {
            let smooth = smooth_vertices(
                self.mesh,
                &self.constraints,
                self.target.as_ref(),
                &self.options,
            );
            stats.smoothed = smooth.moved;
            stats.reverted = smooth.reverted;
        }

        debug!(
            splits = stats.splits,
            collapses = stats.collapses,
            flips = stats.flips,
            smoothed = stats.smoothed,
            reverted = stats.reverted,
            triangles = self.mesh.triangle_count(),
            "remesh pass"
        );
        stats
    }

    fn high_length(&self) -> f64 {
        self.target_edge_length * 4.0 / 3.0
    }

    fn low_length(&self) -> f64 {
        self.target_edge_length * 4.0 / 5.0
    }

    // ==================== Split ====================

    fn split_long_edges(&mut self) -> usize {
        let high_sq = self.high_length().powi(2);

        // Only edges that exist when the stage starts are candidates; spokes
        // created by a split wait for the next pass.
        let mut long_edges: Vec<(EdgeId<I>, f64)> = self
            .mesh
            .edge_ids()
            .filter(|&e| self.constraints.edge_constraint(e).can_split())
            .map(|e| (e, self.mesh.edge_length_squared(e)))
            .filter(|&(_, len_sq)| len_sq > high_sq)
            .collect();
        long_edges.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut count = 0;
        for (e, _) in long_edges {
            // Earlier splits may have shortened this edge.
            if !self.mesh.is_edge(e) || self.mesh.edge_length_squared(e) <= high_sq {
                continue;
            }
            match self.mesh.split_edge(e) {
                Ok(info) => {
                    self.constraints.on_edge_split(&info);
                    if let Some(target) = self.constraints.vertex_constraint(info.new_vertex).target() {
                        let p = target.project(self.mesh.position(info.new_vertex));
                        self.mesh.set_position(info.new_vertex, p);
                    }
                    count += 1;
                }
                Err(reason) => trace!(edge = e.index(), ?reason, "split rejected"),
            }
        }
        count
    }

    // ==================== Collapse ====================

    fn collapse_short_edges(&mut self) -> usize {
        let low_sq = self.low_length().powi(2);
        let mut count = 0;
        let mut eid = 0;
        while eid < self.mesh.max_edge_id() {
            let e = EdgeId::new(eid);
            eid += 1;
            if !self.mesh.is_edge(e) || self.mesh.edge_length_squared(e) >= low_sq {
                continue;
            }
            let plan = match self.plan_collapse(e) {
                Ok(plan) => plan,
                Err(reason) => {
                    trace!(edge = eid - 1, ?reason, "collapse rejected");
                    continue;
                }
            };
            match self.mesh.collapse_edge(plan.keep, plan.remove, plan.position) {
                Ok(info) => {
                    self.constraints.on_edge_collapse(&info);
                    for (edge, constraint) in plan.transfers {
                        self.constraints.set_or_update_edge_constraint(edge, constraint);
                    }
                    count += 1;
                }
                Err(reason) => trace!(edge = eid - 1, ?reason, "collapse rejected"),
            }
        }
        count
    }

    /// Decide how an edge would collapse, or why it must not.
    fn plan_collapse(&self, e: EdgeId<I>) -> std::result::Result<CollapsePlan<I>, EditRejection> {
        if !self.constraints.edge_constraint(e).can_collapse() {
            return Err(EditRejection::Constrained);
        }
        let [a, b] = self.mesh.edge_vertices(e);
        let ca = self.constraints.vertex_constraint(a);
        let cb = self.constraints.vertex_constraint(b);

        // The more restrictive endpoint survives and stays where it is.
        let (keep, remove, position) = match (ca, cb) {
            (VertexConstraint::Pinned, VertexConstraint::Pinned) => {
                return Err(EditRejection::Constrained)
            }
            (VertexConstraint::Constrained(ta), VertexConstraint::Constrained(tb)) => {
                if !same_target(ta, tb) {
                    return Err(EditRejection::Constrained);
                }
                (a, b, ta.project(&self.mesh.edge_midpoint(e)))
            }
            (VertexConstraint::Free, VertexConstraint::Free) => (a, b, self.mesh.edge_midpoint(e)),
            _ if ca.rank() > cb.rank() => (a, b, *self.mesh.position(a)),
            _ => (b, a, *self.mesh.position(b)),
        };

        let transfers = self.collapse_transfers(e, keep, remove)?;

        let high_sq = self.high_length().powi(2);
        for v in [keep, remove] {
            for n in self.mesh.vertex_neighbours(v) {
                if n != keep && n != remove && (self.mesh.position(n) - position).norm_squared() > high_sq {
                    return Err(EditRejection::EdgeTooLong);
                }
            }
        }

        if self.options.prevent_normal_flips
            && self.collapse_flips_normals(keep, remove, &position, self.mesh.edge_triangles(e))
        {
            return Err(EditRejection::NormalFlip);
        }

        Ok(CollapsePlan {
            keep,
            remove,
            position,
            transfers,
        })
    }

    /// Constraints that must move to a surviving edge when the collapse
    /// merges the two side edges of each removed triangle.
    fn collapse_transfers(
        &self,
        e: EdgeId<I>,
        keep: VertexId<I>,
        remove: VertexId<I>,
    ) -> std::result::Result<Vec<(EdgeId<I>, EdgeConstraint)>, EditRejection> {
        let mut transfers = Vec::new();
        let tris = self.mesh.edge_triangles(e);
        let opposite = self.mesh.edge_opposite_vertices(e);
        for (t, x) in tris.into_iter().zip(opposite) {
            if !t.is_valid() {
                continue;
            }
            let (Some(e_keep), Some(e_rem)) =
                (self.mesh.find_edge(keep, x), self.mesh.find_edge(remove, x))
            else {
                return Err(EditRejection::NonManifold);
            };
            let c_keep = self.constraints.edge_constraint(e_keep);
            let c_rem = self.constraints.edge_constraint(e_rem);

            if self.mesh.is_boundary_edge(e_keep) {
                // e_keep disappears with the triangle and e_rem takes its place.
                if c_keep.is_free() || c_keep == c_rem {
                    continue;
                }
                if !c_rem.is_free() {
                    return Err(EditRejection::Constrained);
                }
                transfers.push((e_rem, c_keep.clone()));
            } else if !c_rem.is_free() && c_rem != c_keep {
                return Err(EditRejection::Constrained);
            }
        }
        Ok(transfers)
    }

    fn collapse_flips_normals(
        &self,
        keep: VertexId<I>,
        remove: VertexId<I>,
        position: &Point3<f64>,
        removed: [TriangleId<I>; 2],
    ) -> bool {
        for v in [keep, remove] {
            for t in self.mesh.vertex_triangles(v) {
                if removed.contains(&t) {
                    continue;
                }
                let old = self.mesh.triangle_normal(t);
                if old == Vector3::zeros() {
                    continue;
                }
                let p = self.mesh.triangle(t).map(|u| {
                    if u == keep || u == remove {
                        *position
                    } else {
                        *self.mesh.position(u)
                    }
                });
                let new = (p[1] - p[0]).cross(&(p[2] - p[0]));
                if new.dot(&old) <= 0.0 {
                    return true;
                }
            }
        }
        false
    }

    // ==================== Flip ====================

    fn flip_edges(&mut self) -> usize {
        let mut count = 0;
        let mut eid = 0;
        while eid < self.mesh.max_edge_id() {
            let e = EdgeId::new(eid);
            eid += 1;
            if !self.mesh.is_edge(e) || self.mesh.is_boundary_edge(e) {
                continue;
            }
            if !self.constraints.edge_constraint(e).can_flip() || !self.flip_improves(e) {
                continue;
            }
            match self.mesh.flip_edge(e) {
                Ok(_) => count += 1,
                Err(reason) => trace!(edge = eid - 1, ?reason, "flip rejected"),
            }
        }
        count
    }

    fn target_valence(&self, v: VertexId<I>) -> i32 {
        if self.mesh.is_boundary_vertex(v) {
            4
        } else {
            6
        }
    }

    /// Whether flipping `e` lowers the valence deviation of the four vertices
    /// involved without inverting either new triangle.
    fn flip_improves(&self, e: EdgeId<I>) -> bool {
        let [t0, t1] = self.mesh.edge_triangles(e);
        let [mut a, mut b] = self.mesh.edge_vertices(e);
        if !self.mesh.triangle_has_sequential(t0, a, b) {
            std::mem::swap(&mut a, &mut b);
        }
        let c = self.mesh.triangle_other_vertex(t0, a, b);
        let d = self.mesh.triangle_other_vertex(t1, a, b);
        if c == d || self.mesh.find_edge(c, d).is_some() {
            return false;
        }

        let deviation = |v: VertexId<I>, delta: i32| {
            (self.mesh.valence(v) as i32 + delta - self.target_valence(v)).abs()
        };
        let dev_before = deviation(a, 0) + deviation(b, 0) + deviation(c, 0) + deviation(d, 0);
        // a and b lose one neighbour, c and d gain one
        let dev_after = deviation(a, -1) + deviation(b, -1) + deviation(c, 1) + deviation(d, 1);
        if dev_after >= dev_before {
            return false;
        }

        let [pa, pb, pc, pd] = [a, b, c, d].map(|v| *self.mesh.position(v));
        let reference = self.mesh.triangle_normal(t0) + self.mesh.triangle_normal(t1);
        let n0 = (pd - pc).cross(&(pb - pc));
        let n1 = (pc - pd).cross(&(pa - pd));
        n0.dot(&reference) > 0.0 && n1.dot(&reference) > 0.0
    }
}
