//! Benchmarks for mesh operations.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use nalgebra::Point3;
use tessera::algo::remesh::{
    preserve_all_boundary_edges, MeshConstraints, MeshProjectionTarget, Remesher,
    RemesherOptions,
};
use tessera::prelude::*;

fn grid_data(n: usize) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    // Create grid vertices
    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }

    // Create triangles
    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    (vertices, faces)
}

fn create_grid_mesh(n: usize) -> DynamicMesh {
    let (vertices, faces) = grid_data(n);
    build_from_triangles(&vertices, &faces).unwrap()
}

fn bench_mesh_construction(c: &mut Criterion) {
    let (vertices, faces) = grid_data(50);
    c.bench_function("build_grid_50x50", |b| {
        b.iter(|| {
            let mesh: DynamicMesh = build_from_triangles(&vertices, &faces).unwrap();
            mesh
        });
    });
}

fn bench_mesh_traversal(c: &mut Criterion) {
    let mesh = create_grid_mesh(50);

    c.bench_function("vertex_neighbours_all", |b| {
        b.iter(|| {
            let mut count = 0;
            for v in mesh.vertex_ids() {
                count += mesh.vertex_neighbours(v).count();
            }
            count
        });
    });

    c.bench_function("triangle_normals_all", |b| {
        b.iter(|| {
            let mut sum = nalgebra::Vector3::zeros();
            for t in mesh.triangle_ids() {
                sum += mesh.triangle_normal(t);
            }
            sum
        });
    });
}

fn bench_spatial(c: &mut Criterion) {
    let mesh = create_grid_mesh(50);

    c.bench_function("aabb_tree_build_50x50", |b| {
        b.iter(|| MeshAabbTree::build(&mesh));
    });

    let tree = MeshAabbTree::build(&mesh);
    let queries: Vec<Point3<f64>> = (0..1000)
        .map(|i| {
            let f = i as f64 * 0.05;
            Point3::new(f % 50.0, (f * 0.7) % 50.0, 1.0)
        })
        .collect();
    c.bench_function("nearest_point_1000", |b| {
        b.iter(|| {
            queries
                .iter()
                .filter_map(|q| tree.nearest_point(q))
                .map(|hit| hit.distance)
                .sum::<f64>()
        });
    });
}

fn bench_remesh_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("remesh_pass");
    for (name, parallel) in [("parallel", true), ("sequential", false)] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || create_grid_mesh(30),
                |mut mesh| {
                    let target = std::sync::Arc::new(MeshProjectionTarget::from_mesh(&mesh));
                    let mut constraints = MeshConstraints::new();
                    preserve_all_boundary_edges(&mut constraints, &mesh);

                    let options = RemesherOptions::default()
                        .with_parallel_smooth(parallel)
                        .with_prevent_normal_flips(true);
                    let mut remesher = Remesher::with_options(&mut mesh, options);
                    remesher.set_target_edge_length(0.5).unwrap();
                    remesher.set_external_constraints(constraints);
                    remesher.set_projection_target(target);
                    remesher.precompute();
                    remesher.basic_remesh_pass()
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_mesh_construction,
    bench_mesh_traversal,
    bench_spatial,
    bench_remesh_pass
);
criterion_main!(benches);
