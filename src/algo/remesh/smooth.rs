//! Tangential relaxation with reprojection.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use super::constraints::{MeshConstraints, VertexConstraint};
use super::projection::SharedTarget;
use super::remesher::{RemesherOptions, SmoothingKind};
use crate::mesh::{DynamicMesh, MeshIndex, TriangleId, VertexId};

/// Outcome of one smoothing sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SmoothStats {
    pub moved: usize,
    pub reverted: usize,
}

/// Move every non-pinned vertex toward its one-ring centroid and project it.
///
/// Constrained vertices are projected onto their own target, free vertices
/// onto `target` if one is given.
pub(crate) fn smooth_vertices<I: MeshIndex>(
    mesh: &mut DynamicMesh<I>,
    constraints: &MeshConstraints<I>,
    target: Option<&SharedTarget>,
    options: &RemesherOptions,
) -> SmoothStats {
    if options.enable_parallel_smooth {
        smooth_parallel(mesh, constraints, target, options)
    } else {
        smooth_sequential(mesh, constraints, target, options)
    }
}

fn smooth_parallel<I: MeshIndex>(
    mesh: &mut DynamicMesh<I>,
    constraints: &MeshConstraints<I>,
    target: Option<&SharedTarget>,
    options: &RemesherOptions,
) -> SmoothStats {
    let ids: Vec<VertexId<I>> = mesh.vertex_ids().collect();

    let moves: Vec<(VertexId<I>, Point3<f64>)> = {
        let snapshot = &*mesh;
        ids.par_iter()
            .filter_map(|&v| {
                relaxed_position(snapshot, constraints, target, options, v).map(|p| (v, p))
            })
            .collect()
    };

    let old_normals: Vec<Vector3<f64>> = if options.prevent_normal_flips {
        triangle_normals(mesh)
    } else {
        Vec::new()
    };

    let mut old_positions: HashMap<VertexId<I>, Point3<f64>> = HashMap::with_capacity(moves.len());
    for &(v, p) in &moves {
        old_positions.insert(v, *mesh.position(v));
        mesh.set_position(v, p);
    }

    let mut stats = SmoothStats {
        moved: moves.len(),
        reverted: 0,
    };
    if !options.prevent_normal_flips {
        return stats;
    }

    // Each round restores every moved vertex of an inverted triangle. A
    // triangle whose vertices are all back in place has its old normal, so
    // this terminates.
    loop {
        let mut culprits = Vec::new();
        for t in mesh.triangle_ids() {
            if !is_inverted(mesh, t, &old_normals) {
                continue;
            }
            culprits.extend(
                mesh.triangle(t)
                    .into_iter()
                    .filter(|v| old_positions.contains_key(v)),
            );
        }
        if culprits.is_empty() {
            break;
        }
        for v in culprits {
            if let Some(p) = old_positions.remove(&v) {
                mesh.set_position(v, p);
                stats.reverted += 1;
            }
        }
    }
    stats.moved -= stats.reverted;
    stats
}

fn smooth_sequential<I: MeshIndex>(
    mesh: &mut DynamicMesh<I>,
    constraints: &MeshConstraints<I>,
    target: Option<&SharedTarget>,
    options: &RemesherOptions,
) -> SmoothStats {
    let mut stats = SmoothStats::default();
    let ids: Vec<VertexId<I>> = mesh.vertex_ids().collect();

    for v in ids {
        let Some(p) = relaxed_position(mesh, constraints, target, options, v) else {
            continue;
        };

        if options.prevent_normal_flips {
            let tris = mesh.vertex_triangles(v);
            let before: Vec<Vector3<f64>> = tris.iter().map(|&t| mesh.triangle_normal(t)).collect();
            let old = *mesh.position(v);
            mesh.set_position(v, p);
            let flipped = tris.iter().zip(&before).any(|(&t, n_old)| {
                *n_old != Vector3::zeros() && mesh.triangle_normal(t).dot(n_old) <= 0.0
            });
            if flipped {
                mesh.set_position(v, old);
                stats.reverted += 1;
                continue;
            }
        } else {
            mesh.set_position(v, p);
        }
        stats.moved += 1;
    }
    stats
}

/// The relaxed and projected position of `v`, or `None` if it stays put.
fn relaxed_position<I: MeshIndex>(
    mesh: &DynamicMesh<I>,
    constraints: &MeshConstraints<I>,
    target: Option<&SharedTarget>,
    options: &RemesherOptions,
    v: VertexId<I>,
) -> Option<Point3<f64>> {
    let constraint = constraints.vertex_constraint(v);
    if constraint.is_pinned() || mesh.valence(v) == 0 {
        return None;
    }

    let centroid = match options.smoothing {
        SmoothingKind::Uniform => uniform_centroid(mesh, v),
        SmoothingKind::AreaWeighted => {
            area_weighted_centroid(mesh, v).unwrap_or_else(|| uniform_centroid(mesh, v))
        }
    };
    let pos = mesh.position(v);
    let moved = pos + (centroid - pos) * options.smooth_speed;

    let projected = match constraint {
        VertexConstraint::Constrained(own) => own.project(&moved),
        VertexConstraint::Free => target.map_or(moved, |t| t.project(&moved)),
        VertexConstraint::Pinned => return None,
    };
    Some(projected)
}

fn uniform_centroid<I: MeshIndex>(mesh: &DynamicMesh<I>, v: VertexId<I>) -> Point3<f64> {
    let mut sum = Vector3::zeros();
    let mut count = 0usize;
    for n in mesh.vertex_neighbours(v) {
        sum += mesh.position(n).coords;
        count += 1;
    }
    Point3::from(sum / count.max(1) as f64)
}

/// Area-weighted mean of the incident triangle centroids.
fn area_weighted_centroid<I: MeshIndex>(mesh: &DynamicMesh<I>, v: VertexId<I>) -> Option<Point3<f64>> {
    let mut sum = Vector3::zeros();
    let mut total = 0.0;
    for t in mesh.vertex_triangles(v) {
        let area = mesh.triangle_area(t);
        sum += mesh.triangle_centroid(t).coords * area;
        total += area;
    }
    (total > 1e-300).then(|| Point3::from(sum / total))
}

/// Unit normals indexed by triangle id; zero for dead or degenerate slots.
fn triangle_normals<I: MeshIndex>(mesh: &DynamicMesh<I>) -> Vec<Vector3<f64>> {
    let mut normals = vec![Vector3::zeros(); mesh.max_triangle_id()];
    for t in mesh.triangle_ids() {
        normals[t.index()] = mesh.triangle_normal(t);
    }
    normals
}

fn is_inverted<I: MeshIndex>(mesh: &DynamicMesh<I>, t: TriangleId<I>, old_normals: &[Vector3<f64>]) -> bool {
    let old = old_normals[t.index()];
    old != Vector3::zeros() && mesh.triangle_normal(t).dot(&old) <= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::remesh::constraints::preserve_all_boundary_edges;
    use crate::algo::remesh::projection::MeshProjectionTarget;
    use crate::algo::remesh::tests::create_grid_mesh;
    use std::sync::Arc;

    const CENTER: usize = 4;

    fn perturbed_grid(x: f64, y: f64) -> (DynamicMesh, MeshConstraints) {
        let mut mesh = create_grid_mesh(2);
        mesh.set_position(VertexId::new(CENTER), Point3::new(x, y, 0.0));
        let mut cons = MeshConstraints::new();
        preserve_all_boundary_edges(&mut cons, &mesh);
        (mesh, cons)
    }

    fn options(speed: f64, parallel: bool, prevent: bool) -> RemesherOptions {
        RemesherOptions::default()
            .with_smooth_speed(speed)
            .with_parallel_smooth(parallel)
            .with_prevent_normal_flips(prevent)
    }

    #[test]
    fn test_relax_to_centroid() {
        for parallel in [true, false] {
            let (mut mesh, cons) = perturbed_grid(1.4, 1.2);
            let before: Vec<Point3<f64>> = mesh.vertex_ids().map(|v| *mesh.position(v)).collect();

            let stats = smooth_vertices(&mut mesh, &cons, None, &options(1.0, parallel, false));
            assert_eq!(stats, SmoothStats { moved: 1, reverted: 0 });

            let center = *mesh.position(VertexId::new(CENTER));
            assert!((center - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
            for v in mesh.vertex_ids().filter(|v| v.index() != CENTER) {
                assert_eq!(*mesh.position(v), before[v.index()]);
            }
        }
    }

    #[test]
    fn test_partial_speed() {
        let (mut mesh, cons) = perturbed_grid(1.4, 1.0);
        smooth_vertices(&mut mesh, &cons, None, &options(0.5, true, false));
        let center = *mesh.position(VertexId::new(CENTER));
        assert!((center - Point3::new(1.2, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_area_weighted_keeps_symmetric_vertex() {
        let (mut mesh, cons) = perturbed_grid(1.0, 1.0);
        let opts = options(1.0, true, false).with_smoothing(SmoothingKind::AreaWeighted);
        smooth_vertices(&mut mesh, &cons, None, &opts);
        let center = *mesh.position(VertexId::new(CENTER));
        assert!((center - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_free_vertices_follow_target() {
        let (mut mesh, cons) = perturbed_grid(1.0, 1.0);
        let target: SharedTarget = Arc::new(MeshProjectionTarget::from_mesh(&create_grid_mesh(2)));
        mesh.set_position(VertexId::new(CENTER), Point3::new(1.0, 1.0, 0.3));
        smooth_vertices(&mut mesh, &cons, Some(&target), &options(0.5, false, false));
        assert!(mesh.position(VertexId::new(CENTER)).z.abs() < 1e-12);
    }

    #[test]
    fn test_inverting_moves_are_reverted() {
        for parallel in [true, false] {
            // Overshooting the centroid pushes the vertex out of its ring.
            let (mut mesh, cons) = perturbed_grid(1.3, 1.3);
            let stats = smooth_vertices(&mut mesh, &cons, None, &options(5.0, parallel, true));
            assert_eq!(stats, SmoothStats { moved: 0, reverted: 1 });
            assert_eq!(*mesh.position(VertexId::new(CENTER)), Point3::new(1.3, 1.3, 0.0));
            assert!(mesh.triangle_ids().all(|t| mesh.triangle_normal(t).z > 0.0));

            let (mut mesh, cons) = perturbed_grid(1.3, 1.3);
            smooth_vertices(&mut mesh, &cons, None, &options(5.0, parallel, false));
            assert!(mesh.triangle_ids().any(|t| mesh.triangle_normal(t).z < 0.0));
        }
    }
}
