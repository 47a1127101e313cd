//! Post-remeshing cleanup.

use tracing::debug;

use crate::mesh::{DynamicMesh, MeshIndex, TriangleId};

/// Remove fin triangles: triangles with at most one neighbouring triangle.
///
/// Vertices left without triangles are kept. A removal that would make a
/// boundary vertex non-manifold is skipped. With `repeat_to_convergence` the
/// search is repeated until a round removes nothing, so chains of fins are
/// peeled off one layer per round.
///
/// Returns the number of triangles removed.
pub fn remove_fin_triangles<I: MeshIndex>(
    mesh: &mut DynamicMesh<I>,
    repeat_to_convergence: bool,
) -> usize {
    let mut total = 0;
    let mut rounds = 0;
    loop {
        let fins: Vec<TriangleId<I>> = mesh
            .triangle_ids()
            .filter(|&t| {
                mesh.triangle_neighbours(t)
                    .iter()
                    .filter(|n| n.is_valid())
                    .count()
                    <= 1
            })
            .collect();

        let removed = fins
            .into_iter()
            .filter(|&t| mesh.remove_triangle(t, false, true))
            .count();
        total += removed;
        rounds += 1;

        if removed == 0 || !repeat_to_convergence {
            break;
        }
    }
    debug!(removed = total, rounds, "removed fin triangles");
    total
}
