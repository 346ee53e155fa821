//! Radial basis function interpolation of a sparse displacement field.
//!
//! Given source points `P` and their displaced positions, [`fit`] builds the
//! interpolation matrix `M[i][j] = phi(|P[i] - P[j]|)`, takes the known
//! displacements `D = displaced - P`, and solves `M * C = D` for the
//! coefficients `C` with an LU factorization (never an explicit inverse).
//! [`evaluate`] then sums `C[i] * phi(|q - P[i]|)` over all sources for each
//! query point `q`.
//!
//! # Kernels
//!
//! Any `Fn(f64) -> f64 + Send + Sync` can be used as the basis function. The
//! built-in [`RbfKernel`] covers the usual choices; the default is the linear
//! kernel `phi(r) = r`.
//!
//! # Example
//!
//! ```
//! use liner_morph::rbf::{RbfKernel, fit, morph};
//! use nalgebra::Point3;
//!
//! let original = [
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let displaced = [
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 1.0),
//! ];
//!
//! let field = fit(&original, &displaced, RbfKernel::Linear).unwrap();
//! let moved = morph(&field, &original);
//! assert!((moved[1] - displaced[1]).norm() < 1e-9);
//!
//! // Closures work too
//! let field = fit(&original, &displaced, |r: f64| r * r * r).unwrap();
//! assert_eq!(field.len(), 3);
//! ```

use crate::tracing_ext::{OperationTimer, log_fit_stats};
use crate::{MorphError, MorphResult};
use nalgebra::{DMatrix, Point3, Vector3};
use std::ops::Range;
use tracing::{debug, warn};

/// A scalar radial basis function `phi(r)`.
pub trait RadialBasis: Send + Sync {
    /// Evaluate the basis at distance `r >= 0`.
    fn evaluate(&self, r: f64) -> f64;
}

impl<F> RadialBasis for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    #[inline]
    fn evaluate(&self, r: f64) -> f64 {
        self(r)
    }
}

/// Built-in kernel functions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(tag = "kind", rename_all = "snake_case"))]
pub enum RbfKernel {
    /// Linear: r
    /// Global, biharmonic-like deformation. Used for liner morphing.
    #[default]
    Linear,

    /// Cubic: r³
    Cubic,

    /// Thin-plate spline: r² log(r)
    /// Good for smooth, natural deformations.
    ThinPlateSpline,

    /// Gaussian: exp(-r²/σ²)
    /// Local deformation with controllable support.
    Gaussian { sigma: f64 },

    /// Multiquadric: sqrt(r² + c²)
    Multiquadric { c: f64 },

    /// Inverse multiquadric: 1/sqrt(r² + c²)
    /// Strong local effect, diminishes quickly with distance.
    InverseMultiquadric { c: f64 },
}

impl RadialBasis for RbfKernel {
    fn evaluate(&self, r: f64) -> f64 {
        match *self {
            RbfKernel::Linear => r,
            RbfKernel::Cubic => r * r * r,
            RbfKernel::ThinPlateSpline => {
                if r < 1e-10 {
                    0.0
                } else {
                    r * r * r.ln()
                }
            }
            RbfKernel::Gaussian { sigma } => (-r * r / (sigma * sigma)).exp(),
            RbfKernel::Multiquadric { c } => (r * r + c * c).sqrt(),
            RbfKernel::InverseMultiquadric { c } => 1.0 / (r * r + c * c).sqrt(),
        }
    }
}

/// A fitted displacement field. Read-only once built.
#[derive(Debug, Clone)]
pub struct RbfFit<K: RadialBasis = RbfKernel> {
    sources: Vec<Point3<f64>>,
    displacements: Vec<Vector3<f64>>,
    matrix: DMatrix<f64>,
    coefficients: Vec<Vector3<f64>>,
    rcond_estimate: f64,
    kernel: K,
}

impl<K: RadialBasis> RbfFit<K> {
    /// Source points the field was fitted on.
    pub fn sources(&self) -> &[Point3<f64>] {
        &self.sources
    }

    /// Known displacement of each source point.
    pub fn displacements(&self) -> &[Vector3<f64>] {
        &self.displacements
    }

    /// The n x n interpolation matrix.
    pub fn interpolation_matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Solved coefficients, one row per source point.
    pub fn coefficients(&self) -> &[Vector3<f64>] {
        &self.coefficients
    }

    /// Coefficients as an n x 3 matrix.
    pub fn coefficient_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.coefficients.len(), 3, |i, j| self.coefficients[i][j])
    }

    /// Ratio of smallest to largest LU pivot magnitude.
    pub fn rcond_estimate(&self) -> f64 {
        self.rcond_estimate
    }

    /// The basis function.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Number of source points.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the fit has no source points. Never true for a fit built by
    /// [`fit`].
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Largest absolute entry of `M * C - D`.
    pub fn residual(&self) -> f64 {
        let c = self.coefficient_matrix();
        let d = displacement_matrix(&self.displacements);
        (&self.matrix * c - d).amax()
    }

    /// Add the contribution of sources `range` to every query's displacement.
    pub(crate) fn accumulate(
        &self,
        range: Range<usize>,
        queries: &[Point3<f64>],
        out: &mut [Vector3<f64>],
    ) {
        for i in range {
            let source = &self.sources[i];
            let coeff = &self.coefficients[i];
            for (q, o) in queries.iter().zip(out.iter_mut()) {
                let r = (q - source).norm();
                *o += coeff * self.kernel.evaluate(r);
            }
        }
    }
}

/// Build the symmetric interpolation matrix `M[i][j] = phi(|P[i] - P[j]|)`.
pub fn interpolation_matrix<K: RadialBasis>(points: &[Point3<f64>], kernel: &K) -> DMatrix<f64> {
    let n = points.len();
    let phi0 = kernel.evaluate(0.0);
    let mut m = DMatrix::zeros(n, n);
    for i in 0..n {
        m[(i, i)] = phi0;
        for j in (i + 1)..n {
            let v = kernel.evaluate((points[i] - points[j]).norm());
            m[(i, j)] = v;
            m[(j, i)] = v;
        }
    }
    m
}

/// Fit a displacement field mapping `original[i]` to `displaced[i]`.
///
/// # Errors
///
/// - `InvalidArgument` if the point sets are empty or differ in length
/// - `Numerical` if an input coordinate or the solution is not finite
/// - `SingularMatrix` if the interpolation matrix cannot be solved, e.g.
///   because two source points coincide
pub fn fit<K: RadialBasis>(
    original: &[Point3<f64>],
    displaced: &[Point3<f64>],
    kernel: K,
) -> MorphResult<RbfFit<K>> {
    check_inputs(original, displaced)?;

    let _timer = OperationTimer::new("rbf_fit");
    let matrix = interpolation_matrix(original, &kernel);
    debug!(target: "liner_morph::rbf", n = original.len(), "Built interpolation matrix");

    solve(original, displaced, matrix, kernel)
}

/// Fit a displacement field reusing a previously built interpolation matrix.
///
/// The matrix must be the one [`interpolation_matrix`] produces for
/// `original` and `kernel`; only its shape is checked.
///
/// # Errors
///
/// As [`fit`], plus `InvalidArgument` if `matrix` is not n x n.
pub fn fit_with_matrix<K: RadialBasis>(
    original: &[Point3<f64>],
    displaced: &[Point3<f64>],
    matrix: DMatrix<f64>,
    kernel: K,
) -> MorphResult<RbfFit<K>> {
    check_inputs(original, displaced)?;
    let n = original.len();
    if matrix.nrows() != n || matrix.ncols() != n {
        return Err(MorphError::invalid_argument(format!(
            "interpolation matrix is {}x{}, expected {}x{}",
            matrix.nrows(),
            matrix.ncols(),
            n,
            n
        )));
    }

    let _timer = OperationTimer::new("rbf_fit");
    solve(original, displaced, matrix, kernel)
}

/// Displacement at each query point. Empty queries give an empty result.
pub fn evaluate<K: RadialBasis>(fit: &RbfFit<K>, queries: &[Point3<f64>]) -> Vec<Vector3<f64>> {
    let mut out = vec![Vector3::zeros(); queries.len()];
    if queries.is_empty() {
        return out;
    }
    fit.accumulate(0..fit.len(), queries, &mut out);
    out
}

/// New positions `q + evaluate(fit, q)` for each query point.
pub fn morph<K: RadialBasis>(fit: &RbfFit<K>, queries: &[Point3<f64>]) -> Vec<Point3<f64>> {
    evaluate(fit, queries)
        .into_iter()
        .zip(queries)
        .map(|(d, q)| q + d)
        .collect()
}

fn check_inputs(original: &[Point3<f64>], displaced: &[Point3<f64>]) -> MorphResult<()> {
    if original.is_empty() {
        return Err(MorphError::invalid_argument(
            "at least one source point is required to fit",
        ));
    }
    if original.len() != displaced.len() {
        return Err(MorphError::invalid_argument(format!(
            "original has {} points but displaced has {}",
            original.len(),
            displaced.len()
        )));
    }
    let bad = original
        .iter()
        .chain(displaced)
        .position(|p| !p.coords.iter().all(|c| c.is_finite()));
    if let Some(i) = bad {
        return Err(MorphError::numerical(format!(
            "non-finite coordinate in fit input at point {}",
            i % original.len()
        )));
    }
    Ok(())
}

fn displacement_matrix(displacements: &[Vector3<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(displacements.len(), 3, |i, j| displacements[i][j])
}

fn solve<K: RadialBasis>(
    original: &[Point3<f64>],
    displaced: &[Point3<f64>],
    matrix: DMatrix<f64>,
    kernel: K,
) -> MorphResult<RbfFit<K>> {
    let n = original.len();
    let displacements: Vec<Vector3<f64>> = original
        .iter()
        .zip(displaced)
        .map(|(p, q)| q - p)
        .collect();
    let d = displacement_matrix(&displacements);

    if !matrix.iter().all(|v| v.is_finite()) {
        return Err(MorphError::numerical(
            "interpolation matrix contains non-finite values",
        ));
    }

    let lu = matrix.clone().lu();

    // Pivot ratio of U as a cheap conditioning estimate
    let u = lu.u();
    let (min_pivot, max_pivot) = u
        .diagonal()
        .iter()
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), p| (lo.min(p.abs()), hi.max(p.abs())));
    let rcond = if max_pivot > 0.0 { min_pivot / max_pivot } else { 0.0 };

    let singular = if n == 1 {
        max_pivot == 0.0
    } else {
        rcond <= n as f64 * f64::EPSILON
    };
    if singular {
        warn!(target: "liner_morph::rbf", n, rcond, "Interpolation matrix is singular");
        return Err(MorphError::singular_matrix(n, rcond));
    }

    let c = lu
        .solve(&d)
        .ok_or_else(|| MorphError::singular_matrix(n, rcond))?;
    if !c.iter().all(|v| v.is_finite()) {
        return Err(MorphError::numerical("coefficient solve produced non-finite values"));
    }

    let coefficients = (0..n)
        .map(|i| Vector3::new(c[(i, 0)], c[(i, 1)], c[(i, 2)]))
        .collect();

    let fit = RbfFit {
        sources: original.to_vec(),
        displacements,
        matrix,
        coefficients,
        rcond_estimate: rcond,
        kernel,
    };
    log_fit_stats(&fit);

    Ok(fit)
}
