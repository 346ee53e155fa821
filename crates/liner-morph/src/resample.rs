//! Seam placement, winding and arc-length resampling of a boundary loop.
//!
//! Two rims only correspond point-for-point once they start at the same
//! place, run in the same direction and have the same number of evenly
//! spaced samples. [`restart_and_orient`] fixes the first two;
//! [`resample`] does the third.
//!
//! # Winding convention
//!
//! A loop is counter-clockwise about `axis` when it turns positively about
//! `axis` by the right-hand rule, i.e. when viewed from the tip of `axis`
//! looking back at the loop it runs counter-clockwise. The rotation axis is
//! always explicit; no up-axis is assumed beyond the documented default.

use crate::boundary::{BoundaryState, centroid};
use crate::{MorphError, MorphResult};
use nalgebra::{Point3, Vector3};
use tracing::{debug, trace};

/// Where the resampled loop starts and which way it turns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeamOptions {
    /// Point the seam is placed nearest to. `None` uses
    /// [`default_reference_point`].
    pub reference_point: Option<Point3<f64>>,

    /// Axis the winding is measured about. Defaults to +Z.
    pub rotation_axis: Vector3<f64>,
}

impl Default for SeamOptions {
    fn default() -> Self {
        Self {
            reference_point: None,
            rotation_axis: Vector3::z(),
        }
    }
}

impl SeamOptions {
    /// Place the seam nearest to `point`.
    pub fn with_reference_point(mut self, point: Point3<f64>) -> Self {
        self.reference_point = Some(point);
        self
    }

    /// Measure winding about `axis`.
    pub fn with_rotation_axis(mut self, axis: Vector3<f64>) -> Self {
        self.rotation_axis = axis;
        self
    }

    /// Y-up convention: winding about +Y.
    pub fn y_up() -> Self {
        Self::default().with_rotation_axis(Vector3::y())
    }
}

/// Default seam reference: the loop's maximum X at its mean Y and Z.
///
/// This lands on the +X extreme of the rim.
pub fn default_reference_point(coords: &[Point3<f64>]) -> Point3<f64> {
    let c = centroid(coords);
    let max_x = coords.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    Point3::new(if max_x.is_finite() { max_x } else { c.x }, c.y, c.z)
}

/// Rotate the rim so the node nearest `reference_point` comes first, then
/// reverse it if needed so it winds the requested way about `rotation_axis`.
///
/// Returns the reordered vertex indices. Reversal keeps the seam node at
/// index 0, so calling this again on its own output changes nothing.
///
/// # Errors
///
/// - `InvalidArgument` if `rotation_axis` is zero or not finite
/// - `Numerical` if the loop's winding about the axis is undefined (the loop
///   is collinear or lies in a plane containing the axis)
pub fn restart_and_orient(
    boundary: &BoundaryState,
    reference_point: Point3<f64>,
    rotation_axis: Vector3<f64>,
    counter_clockwise: bool,
) -> MorphResult<Vec<u32>> {
    let order = seam_order(boundary, reference_point, rotation_axis, counter_clockwise)?;
    Ok(order.into_iter().map(|i| boundary.nodes()[i]).collect())
}

/// Resample the rim to `count` evenly spaced points using the default seam.
///
/// # Errors
///
/// See [`resample_with`].
pub fn resample(
    boundary: &BoundaryState,
    count: usize,
    counter_clockwise: bool,
) -> MorphResult<Vec<Point3<f64>>> {
    resample_with(boundary, count, counter_clockwise, &SeamOptions::default())
}

/// Reseat and orient the rim per `seam`, then resample it to `count` points
/// evenly spaced in arc length.
///
/// # Errors
///
/// - `InvalidArgument` if `count < 3` or the rotation axis is invalid
/// - `Numerical` if the rim has zero length or its winding is undefined
pub fn resample_with(
    boundary: &BoundaryState,
    count: usize,
    counter_clockwise: bool,
    seam: &SeamOptions,
) -> MorphResult<Vec<Point3<f64>>> {
    check_count(count)?;

    let reference = seam
        .reference_point
        .unwrap_or_else(|| default_reference_point(boundary.coords()));
    let order = seam_order(boundary, reference, seam.rotation_axis, counter_clockwise)?;
    let coords: Vec<Point3<f64>> = order.iter().map(|&i| boundary.coords()[i]).collect();

    let samples = resample_polyline(&coords, count)?;
    debug!(
        target: "liner_morph::boundary",
        input_nodes = coords.len(),
        count,
        seam_node = boundary.nodes()[order[0]],
        counter_clockwise,
        "Resampled boundary"
    );
    Ok(samples)
}

/// Resample a closed polyline to `count` points evenly spaced in arc length.
///
/// The polyline is closed by returning to `coords[0]`. `count + 1` samples
/// are spaced from 0 to the total length and the final one (a duplicate of
/// the first) is dropped. The first sample is always `coords[0]`.
///
/// # Errors
///
/// - `InvalidArgument` if `count < 3`
/// - `Numerical` if the polyline has fewer than two points, zero length, or
///   non-finite coordinates
pub fn resample_polyline(coords: &[Point3<f64>], count: usize) -> MorphResult<Vec<Point3<f64>>> {
    check_count(count)?;
    if coords.len() < 2 {
        return Err(MorphError::numerical(format!(
            "cannot resample a loop of {} point(s)",
            coords.len()
        )));
    }

    // Cumulative chord length along the closed polyline
    let closed: Vec<Point3<f64>> = coords.iter().chain(coords.first()).copied().collect();
    let mut d = Vec::with_capacity(closed.len());
    d.push(0.0);
    for w in closed.windows(2) {
        let last = d[d.len() - 1];
        d.push(last + (w[1] - w[0]).norm());
    }

    let total = d[d.len() - 1];
    if !total.is_finite() {
        return Err(MorphError::numerical("boundary length is not finite"));
    }
    if total <= f64::EPSILON {
        return Err(MorphError::numerical("boundary has zero total length"));
    }

    let mut out = Vec::with_capacity(count);
    let mut seg = 0;
    for j in 0..count {
        let t = total * j as f64 / count as f64;
        while seg + 2 < d.len() && d[seg + 1] < t {
            seg += 1;
        }
        let span = d[seg + 1] - d[seg];
        let alpha = if span > 0.0 {
            ((t - d[seg]) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let p = closed[seg].coords.lerp(&closed[seg + 1].coords, alpha);
        out.push(Point3::from(p));
    }

    trace!(target: "liner_morph::boundary", total_length = total, count, "Resampled polyline");
    Ok(out)
}

fn check_count(count: usize) -> MorphResult<()> {
    if count < 3 {
        return Err(MorphError::invalid_argument(format!(
            "resample count must be at least 3, got {}",
            count
        )));
    }
    Ok(())
}

/// Positions into `boundary.nodes()` giving the reseated, oriented walk.
fn seam_order(
    boundary: &BoundaryState,
    reference: Point3<f64>,
    axis: Vector3<f64>,
    counter_clockwise: bool,
) -> MorphResult<Vec<usize>> {
    let axis_len = axis.norm();
    if !axis_len.is_finite() || axis_len <= f64::EPSILON {
        return Err(MorphError::invalid_argument(format!(
            "rotation axis must be a non-zero finite vector, got ({}, {}, {})",
            axis.x, axis.y, axis.z
        )));
    }
    let axis = axis / axis_len;

    let nodes = boundary.nodes();
    let coords = boundary.coords();
    let k = coords.len();

    // Nearest node; ties go to the lowest vertex index so the choice does not
    // depend on the current rotation of the walk.
    let mut seam = 0;
    let mut best = f64::INFINITY;
    for i in 0..k {
        let dist = (coords[i] - reference).norm_squared();
        if dist < best || (dist == best && nodes[i] < nodes[seam]) {
            best = dist;
            seam = i;
        }
    }

    let mut order: Vec<usize> = (0..k).map(|i| (seam + i) % k).collect();

    let winding = winding_sign(&order, coords, &axis)?;
    let wants = if counter_clockwise { 1.0 } else { -1.0 };
    if winding != wants {
        order[1..].reverse();
    }

    Ok(order)
}

/// +1.0 if the walk turns counter-clockwise about `axis`, -1.0 otherwise.
///
/// Uses the sign of `axis . ((c0 - m) x (c1 - m))` about the centroid `m`.
/// When that local test is inconclusive (it disagrees with the sign from the
/// node before the seam, or vanishes) the loop's area normal decides. Both
/// tests flip exactly when the tail of the walk is reversed.
fn winding_sign(order: &[usize], coords: &[Point3<f64>], axis: &Vector3<f64>) -> MorphResult<f64> {
    let k = order.len();
    let ordered: Vec<Point3<f64>> = order.iter().map(|&i| coords[i]).collect();
    let m = centroid(&ordered);
    let rel = |i: usize| ordered[i] - m;

    let scale = ordered
        .iter()
        .map(|p| (p - m).norm_squared())
        .fold(0.0, f64::max);
    let tol = scale * 1e-12;

    let forward = axis.dot(&rel(0).cross(&rel(1)));
    let backward = axis.dot(&rel(0).cross(&rel(k - 1)));
    if forward.abs() > tol && backward.abs() > tol && forward.signum() != backward.signum() {
        return Ok(forward.signum());
    }

    // Newell area normal
    let normal: Vector3<f64> = (0..k).map(|i| rel(i).cross(&rel((i + 1) % k))).sum();
    let area = axis.dot(&normal);
    if area.abs() <= tol || !area.is_finite() {
        return Err(MorphError::numerical(
            "boundary winding is undefined about the rotation axis",
        ));
    }
    Ok(area.signum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::extract_boundary;
    use crate::boundary::tests::{open_box, unit_square};

    fn spacing(points: &[Point3<f64>]) -> Vec<f64> {
        (0..points.len())
            .map(|i| (points[(i + 1) % points.len()] - points[i]).norm())
            .collect()
    }

    #[test]
    fn test_unit_square_to_eight_points() {
        let boundary = extract_boundary(&unit_square()).unwrap();
        let points = resample(&boundary, 8, true).unwrap();

        assert_eq!(points.len(), 8);
        for gap in spacing(&points) {
            assert!((gap - 0.5).abs() < 1e-12, "gap was {}", gap);
        }

        // Default seam is at the +X extreme; lowest index wins the tie.
        assert_eq!(points[0], Point3::new(1.0, 0.0, 0.0));
        // Counter-clockwise about +Z runs towards +Y first
        assert!((points[1] - Point3::new(1.0, 0.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_clockwise_reverses_tail() {
        let boundary = extract_boundary(&unit_square()).unwrap();
        let ccw = resample(&boundary, 8, true).unwrap();
        let cw = resample(&boundary, 8, false).unwrap();

        assert_eq!(ccw[0], cw[0]);
        for i in 1..8 {
            assert!((ccw[i] - cw[8 - i]).norm() < 1e-12);
        }
    }

    #[test]
    fn test_restart_and_orient_is_idempotent() {
        let boundary = extract_boundary(&open_box()).unwrap();
        let reference = Point3::new(0.0, 0.0, 10.0);

        for ccw in [true, false] {
            let first = restart_and_orient(&boundary, reference, Vector3::z(), ccw).unwrap();
            assert_eq!(first[0], 4);

            // Re-run on a boundary reordered to the first result
            let again = restart_and_orient(&boundary, reference, Vector3::z(), ccw).unwrap();
            assert_eq!(first, again);

            let mut sorted = first.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, vec![4, 5, 6, 7]);
        }
    }

    #[test]
    fn test_orientation_matches_axis() {
        let boundary = extract_boundary(&open_box()).unwrap();
        let reference = Point3::new(0.0, 0.0, 10.0);

        let ccw = restart_and_orient(&boundary, reference, Vector3::z(), true).unwrap();
        // 4 (0,0) -> 5 (10,0) turns positively about +Z
        assert_eq!(ccw, vec![4, 5, 6, 7]);

        let flipped = restart_and_orient(&boundary, reference, -Vector3::z(), true).unwrap();
        assert_eq!(flipped, vec![4, 7, 6, 5]);
    }

    #[test]
    fn test_axis_in_loop_plane_is_undefined() {
        let boundary = extract_boundary(&unit_square()).unwrap();
        let err = restart_and_orient(&boundary, Point3::origin(), Vector3::x(), true).unwrap_err();
        assert!(matches!(err, MorphError::Numerical { .. }));

        let err = restart_and_orient(&boundary, Point3::origin(), Vector3::zeros(), true).unwrap_err();
        assert!(matches!(err, MorphError::InvalidArgument { .. }));
    }

    #[test]
    fn test_count_below_three_rejected() {
        let boundary = extract_boundary(&unit_square()).unwrap();
        for count in [0, 1, 2] {
            assert!(matches!(
                resample(&boundary, count, true),
                Err(MorphError::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn test_zero_length_polyline_rejected() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let err = resample_polyline(&[p, p, p], 4).unwrap_err();
        assert!(matches!(err, MorphError::Numerical { .. }));
    }

    #[test]
    fn test_downsample_preserves_start() {
        let coords: Vec<Point3<f64>> = (0..64)
            .map(|i| {
                let a = i as f64 / 64.0 * std::f64::consts::TAU;
                Point3::new(a.cos(), a.sin(), 0.0)
            })
            .collect();

        let out = resample_polyline(&coords, 16).unwrap();
        assert_eq!(out.len(), 16);
        assert_eq!(out[0], coords[0]);
        for p in &out {
            // Samples lie on chords of the unit circle
            assert!(p.coords.norm() <= 1.0 + 1e-12);
            assert!(p.coords.norm() > 0.99);
        }
    }

    #[test]
    fn test_resample_is_stable_on_even_loop() {
        let boundary = extract_boundary(&unit_square()).unwrap();
        let once = resample(&boundary, 4, true).unwrap();
        let twice = resample_polyline(&once, 4).unwrap();
        for (a, b) in once.iter().zip(&twice) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_default_reference_point() {
        let boundary = extract_boundary(&open_box()).unwrap();
        let r = default_reference_point(boundary.coords());
        assert_eq!(r, Point3::new(10.0, 5.0, 10.0));
    }

    #[test]
    fn test_arc_length_converges_with_count() {
        let pentagon = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(5.0, 3.0, 0.0),
            Point3::new(2.0, 5.0, 1.0),
            Point3::new(-1.0, 2.0, 0.0),
        ];
        let perimeter: f64 = spacing(&pentagon).iter().sum();

        // Each sample interval that spans a corner loses at most one spacing
        let mut errors = Vec::new();
        for count in [10, 100, 1000, 10_000] {
            let samples = resample_polyline(&pentagon, count).unwrap();
            let length: f64 = spacing(&samples).iter().sum();
            let error = perimeter - length;
            let bound = pentagon.len() as f64 * perimeter / count as f64;
            assert!(error >= -1e-9, "count {}: resampled loop is longer", count);
            assert!(error <= bound, "count {}: error {} above {}", count, error, bound);
            errors.push(error);
        }

        assert!(errors[3] < errors[0]);
        assert!(errors[3] < 1e-3 * perimeter);
    }
}
