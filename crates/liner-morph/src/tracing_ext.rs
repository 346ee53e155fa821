//! Tracing extensions for morphing operations.
//!
//! Structured logging and timing for the pipeline stages. Nothing here
//! installs a subscriber; the embedding application decides where events go.
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // RUST_LOG=liner_morph=debug for per-stage detail
//! ```
//!
//! # Targets
//!
//! - `liner_morph::timing`: operation start and duration
//! - `liner_morph::mesh_state`: mesh dimensions at stage boundaries
//! - `liner_morph::boundary`: rim extraction summaries
//! - `liner_morph::rbf`: fit conditioning and residual
//! - `liner_morph::parallel`: worker scheduling
//! - `liner_morph::registration`: backend calls
//! - `liner_morph::progress`: pipeline stage progress

use crate::boundary::BoundaryState;
use crate::rbf::{RadialBasis, RbfFit};
use std::time::Instant;
use tracing::span::EnteredSpan;
use tracing::{Span, debug, info, warn};

/// Enters a `morph_operation` span for a stage and logs its duration when
/// dropped.
///
/// Events emitted while the timer is alive, including the closing duration
/// event, are recorded inside the span. Timers must be dropped in reverse
/// order of creation, which plain `let _timer` bindings guarantee.
///
/// ```rust,ignore
/// fn fit_field() {
///     let _timer = OperationTimer::new("rbf_fit");
///     // ...
/// } // duration logged here
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    _span: EnteredSpan,
}

impl OperationTimer {
    /// Start timing `name`.
    pub fn new(name: &'static str) -> Self {
        debug!(target: "liner_morph::timing", operation = name, "Starting operation");
        Self::enter(name, tracing::info_span!("morph_operation", operation = name))
    }

    /// Start timing `name` on a mesh of the given size.
    pub fn with_context(name: &'static str, face_count: usize, vertex_count: usize) -> Self {
        debug!(
            target: "liner_morph::timing",
            operation = name,
            faces = face_count,
            vertices = vertex_count,
            "Starting operation"
        );
        let span = tracing::info_span!(
            "morph_operation",
            operation = name,
            faces = face_count,
            vertices = vertex_count
        );
        Self::enter(name, span)
    }

    fn enter(name: &'static str, span: Span) -> Self {
        Self {
            name,
            start: Instant::now(),
            _span: span.entered(),
        }
    }

    /// Milliseconds since the timer started.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        info!(
            target: "liner_morph::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "Operation completed"
        );
    }
}

/// Log mesh size and extent at debug level.
pub fn log_mesh_stats(mesh: &crate::Mesh, context: &str) {
    let (min_bounds, max_bounds) = mesh.bounds().unwrap_or_default();
    let dims = max_bounds - min_bounds;

    debug!(
        target: "liner_morph::mesh_state",
        context = context,
        mesh = mesh.name(),
        units = mesh.units().as_str(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.2} x {:.2} x {:.2}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
}

/// Log an extracted rim.
pub fn log_boundary_stats(state: &BoundaryState, context: &str) {
    info!(
        target: "liner_morph::boundary",
        context = context,
        nodes = state.nodes().len(),
        boundary_faces = state.boundary_faces().len(),
        corners = state.corner_count(),
        threshold_deg = state.corner_threshold_deg(),
        perimeter = format!("{:.3}", state.perimeter()),
        "Boundary extracted"
    );
}

/// Log conditioning and residual of a fitted field.
///
/// Warns when the pivot ratio suggests the solve lost most of its precision.
pub fn log_fit_stats<K: RadialBasis>(fit: &RbfFit<K>) {
    let residual = fit.residual();
    if fit.rcond_estimate() < 1e-10 {
        warn!(
            target: "liner_morph::rbf",
            sources = fit.len(),
            rcond = fit.rcond_estimate(),
            residual,
            "Interpolation matrix is poorly conditioned"
        );
    } else {
        debug!(
            target: "liner_morph::rbf",
            sources = fit.len(),
            rcond = fit.rcond_estimate(),
            residual,
            "Fit solved"
        );
    }
}

/// Log progress for a long-running operation.
pub fn log_progress(operation: &str, current: usize, total: usize, stage: Option<&str>) {
    let percent = if total > 0 {
        (current as f64 / total as f64 * 100.0) as u32
    } else {
        0
    };

    debug!(
        target: "liner_morph::progress",
        operation = operation,
        current = current,
        total = total,
        percent = percent,
        stage = stage.unwrap_or("processing"),
        "Progress update"
    );
}
