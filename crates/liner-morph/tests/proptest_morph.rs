//! Property-based tests for rim handling and RBF morphing.
//!
//! Run with: cargo test -p liner-morph --test proptest_morph

use liner_morph::{
    Mesh, ParallelEvaluator, RbfKernel, Units, Vertex, evaluate, extract_boundary, fit,
    resample, restart_and_orient,
};
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// Fan-triangulated disk with `segments` rim vertices and a wobbly radius.
fn disk(radii: &[f64], height: f64) -> Mesh {
    let n = radii.len();
    let mut mesh = Mesh::new("disk", Units::Millimeter);
    mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
    for (i, r) in radii.iter().enumerate() {
        let angle = std::f64::consts::TAU * i as f64 / n as f64;
        let z = height * (3.0 * angle).sin();
        mesh.vertices
            .push(Vertex::from_coords(r * angle.cos(), r * angle.sin(), z));
    }
    for i in 0..n as u32 {
        mesh.faces.push([0, 1 + i, 1 + (i + 1) % n as u32]);
    }
    mesh
}

fn arb_disk() -> impl Strategy<Value = Mesh> {
    (
        prop::collection::vec(5.0..15.0f64, 6..48),
        -2.0..2.0f64,
    )
        .prop_map(|(radii, height)| disk(&radii, height))
}

/// Points on a jittered grid: distinct, with a minimum spacing.
fn arb_sources() -> impl Strategy<Value = Vec<Point3<f64>>> {
    (2usize..6, 2usize..6, prop::collection::vec(-0.3..0.3f64, 3 * 36)).prop_map(
        |(nx, ny, jitter)| {
            let mut points = Vec::new();
            for i in 0..nx {
                for j in 0..ny {
                    let k = 3 * (i * ny + j);
                    points.push(Point3::new(
                        i as f64 * 2.0 + jitter[k],
                        j as f64 * 2.0 + jitter[k + 1],
                        jitter[k + 2],
                    ));
                }
            }
            points
        },
    )
}

fn arb_displacement() -> impl Strategy<Value = Vector3<f64>> {
    prop::array::uniform3(-1.0..1.0f64).prop_map(|[x, y, z]| Vector3::new(x, y, z))
}

fn arb_queries() -> impl Strategy<Value = Vec<Point3<f64>>> {
    prop::collection::vec(
        prop::array::uniform3(-5.0..15.0f64).prop_map(|[x, y, z]| Point3::new(x, y, z)),
        0..60,
    )
}

// =============================================================================
// Property Tests: Rims
// =============================================================================

proptest! {
    /// The rim of a fan disk is every outer vertex, each once.
    #[test]
    fn proptest_disk_rim_visits_every_outer_vertex(mesh in arb_disk()) {
        let rim = extract_boundary(&mesh).unwrap();
        let n = mesh.vertex_count() as u32 - 1;

        let mut nodes = rim.nodes().to_vec();
        nodes.sort_unstable();
        prop_assert_eq!(nodes, (1..=n).collect::<Vec<_>>());
        prop_assert_eq!(rim.edges().len(), n as usize);
    }

    /// Reordering a rim only rotates or reverses it.
    #[test]
    fn proptest_restart_is_a_cyclic_permutation(mesh in arb_disk(), ccw in any::<bool>()) {
        let rim = extract_boundary(&mesh).unwrap();
        let nodes = rim.nodes();
        let ordered = restart_and_orient(
            &rim,
            liner_morph::default_reference_point(rim.coords()),
            Vector3::z(),
            ccw,
        )
        .unwrap();

        prop_assert_eq!(ordered.len(), nodes.len());
        let k = nodes.len();
        let start = nodes.iter().position(|&n| n == ordered[0]).unwrap();
        let forward = (0..k).all(|i| ordered[i] == nodes[(start + i) % k]);
        let backward = (0..k).all(|i| ordered[i] == nodes[(start + k - i) % k]);
        prop_assert!(forward || backward);
    }

    /// Resampling keeps the rim's starting node and never lengthens it.
    #[test]
    fn proptest_resample_starts_at_seam(mesh in arb_disk(), count in 3usize..120) {
        let rim = extract_boundary(&mesh).unwrap();
        let ordered = restart_and_orient(
            &rim,
            liner_morph::default_reference_point(rim.coords()),
            Vector3::z(),
            true,
        )
        .unwrap();
        let samples = resample(&rim, count, true).unwrap();

        prop_assert_eq!(samples.len(), count);
        let seam = mesh.vertices[ordered[0] as usize].position;
        prop_assert!((samples[0] - seam).norm() < 1e-9);

        let chord_sum: f64 = (0..count)
            .map(|i| (samples[(i + 1) % count] - samples[i]).norm())
            .sum();
        prop_assert!(chord_sum <= rim.perimeter() + 1e-9);
    }

    /// Resampled length approaches the perimeter as the count grows.
    #[test]
    fn proptest_resample_preserves_arc_length(mesh in arb_disk(), count in 3usize..400) {
        let rim = extract_boundary(&mesh).unwrap();
        let perimeter = rim.perimeter();
        let k = rim.nodes().len() as f64;

        let length = |samples: &[Point3<f64>]| -> f64 {
            (0..samples.len())
                .map(|i| (samples[(i + 1) % samples.len()] - samples[i]).norm())
                .sum()
        };

        let coarse = perimeter - length(&resample(&rim, count, true).unwrap());
        prop_assert!(coarse >= -1e-9);
        prop_assert!(coarse <= k * perimeter / count as f64 + 1e-9);

        let fine_count = count * 20;
        let fine = perimeter - length(&resample(&rim, fine_count, true).unwrap());
        prop_assert!(fine >= -1e-9);
        prop_assert!(fine <= k * perimeter / fine_count as f64 + 1e-9);
    }

    /// Resampling an already ordered rim twice gives the same samples.
    #[test]
    fn proptest_resample_is_deterministic(mesh in arb_disk(), count in 3usize..64, ccw in any::<bool>()) {
        let rim = extract_boundary(&mesh).unwrap();
        let a = resample(&rim, count, ccw).unwrap();
        let b = resample(&rim, count, ccw).unwrap();
        prop_assert_eq!(a, b);
    }
}

// =============================================================================
// Property Tests: Interpolation
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A fitted field reproduces the known displacement at every source.
    #[test]
    fn proptest_fit_interpolates_sources(
        sources in arb_sources(),
        shift in arb_displacement(),
        twist in -0.1..0.1f64,
    ) {
        let displaced: Vec<_> = sources
            .iter()
            .map(|p| p + shift + Vector3::new(-twist * p.y, twist * p.x, 0.0))
            .collect();
        let field = fit(&sources, &displaced, RbfKernel::Linear).unwrap();

        let moved = liner_morph::rbf::morph(&field, &sources);
        for (m, d) in moved.iter().zip(&displaced) {
            prop_assert!((m - d).norm() < 1e-6);
        }
    }

    /// Parallel evaluation agrees with serial for any worker and chunk count.
    #[test]
    fn proptest_parallel_matches_serial(
        sources in arb_sources(),
        shift in arb_displacement(),
        queries in arb_queries(),
        workers in 1usize..6,
        chunk in 1usize..12,
    ) {
        let displaced: Vec<_> = sources.iter().map(|p| p + shift * (1.0 + p.x * 0.1)).collect();
        let field = fit(&sources, &displaced, RbfKernel::Linear).unwrap();

        let serial = evaluate(&field, &queries);
        let parallel = ParallelEvaluator::new(workers)
            .unwrap()
            .with_chunk_size(chunk)
            .unwrap()
            .evaluate(&field, &queries)
            .unwrap();

        prop_assert_eq!(parallel.len(), serial.len());
        for (p, s) in parallel.iter().zip(&serial) {
            prop_assert!((p - s).norm() <= 1e-9 * s.norm().max(1.0));
        }
    }
}
