//! Applying a fitted field to whole meshes, and the end-to-end liner pipeline.
//!
//! [`morph_mesh`] moves every vertex of a mesh through a fitted
//! [`RbfFit`] and reports how much the mesh was distorted.
//! [`LinerMorphPipeline`] chains every stage:
//!
//! 1. Extract the rim of the liner surface and of the target surface
//! 2. Order the liner rim and resample the target rim to the same node count,
//!    both starting at the seam and turning the same way
//! 3. Pair them up as landmarks
//! 4. Register the liner surface onto the target surface
//! 5. Fit a field from the liner surface's original to registered positions
//! 6. Morph the dense liner mesh through that field

use crate::boundary::{BoundaryOptions, BoundaryState, ResampledBoundary, extract_boundary_with};
use crate::correspondence::{
    CorrespondenceOrchestrator, LandmarkPair, NonRigidRegistration, RegistrationParams,
    StepSchedule, assemble_landmarks,
};
use crate::parallel::ParallelEvaluator;
use crate::rbf::{RadialBasis, RbfFit, RbfKernel, fit, morph};
use crate::resample::{SeamOptions, default_reference_point, resample_with, restart_and_orient};
use crate::tracing_ext::{OperationTimer, log_mesh_stats, log_progress};
use crate::{Mesh, MorphError, MorphResult};
use nalgebra::Point3;
use tracing::{info, warn};

/// How a fitted field is evaluated over many points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Evaluation {
    /// On the calling thread.
    #[default]
    Serial,
    /// On a worker pool.
    Parallel(ParallelEvaluator),
}

impl Evaluation {
    /// Parallel evaluation on `workers` workers with the default chunk size.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `workers` is zero.
    pub fn parallel(workers: usize) -> MorphResult<Self> {
        Ok(Self::Parallel(ParallelEvaluator::new(workers)?))
    }

    /// New positions for `queries` under `fit`.
    ///
    /// # Errors
    ///
    /// Returns `WorkerPool` if parallel evaluation fails.
    pub fn morph_points<K: RadialBasis>(
        &self,
        fit: &RbfFit<K>,
        queries: &[Point3<f64>],
    ) -> MorphResult<Vec<Point3<f64>>> {
        match self {
            Evaluation::Serial => Ok(morph(fit, queries)),
            Evaluation::Parallel(evaluator) => evaluator.morph(fit, queries),
        }
    }
}

/// A morphed mesh and how far it moved.
#[derive(Debug, Clone)]
pub struct MorphOutcome {
    /// The morphed mesh, with the input's connectivity.
    pub mesh: Mesh,

    /// Largest vertex displacement.
    pub max_displacement: f64,

    /// Mean vertex displacement.
    pub average_displacement: f64,

    /// Largest edge length ratio deformed / original (1.0 = none).
    pub max_stretch: f64,

    /// Largest edge length ratio original / deformed (1.0 = none).
    pub max_compression: f64,
}

impl MorphOutcome {
    /// Whether stretch or compression exceeds `1 + threshold`.
    pub fn has_significant_distortion(&self, threshold: f64) -> bool {
        self.max_stretch > 1.0 + threshold || self.max_compression > 1.0 + threshold
    }
}

/// Move every vertex of `mesh` through `fit`.
///
/// The input mesh is left untouched and nothing is returned on failure.
///
/// # Errors
///
/// - `InvalidVertexIndex` if a face references a missing vertex
/// - `WorkerPool` if parallel evaluation fails
pub fn morph_mesh<K: RadialBasis>(
    fit: &RbfFit<K>,
    mesh: &Mesh,
    evaluation: Evaluation,
) -> MorphResult<MorphOutcome> {
    let _timer = OperationTimer::with_context("morph_mesh", mesh.face_count(), mesh.vertex_count());
    mesh.validate_faces()?;

    let original = mesh.positions();
    let moved = evaluation.morph_points(fit, &original)?;
    let morphed = mesh.with_vertex_positions(&moved)?;

    let (max_displacement, average_displacement) = displacement_stats(&original, &moved);
    let (max_stretch, max_compression) = distortion_metrics(mesh, &morphed);

    info!(
        target: "liner_morph::rbf",
        mesh = mesh.name(),
        vertices = mesh.vertex_count(),
        max_displacement = format!("{:.4}", max_displacement),
        average_displacement = format!("{:.4}", average_displacement),
        max_stretch = format!("{:.3}", max_stretch),
        max_compression = format!("{:.3}", max_compression),
        "Mesh morphed"
    );

    Ok(MorphOutcome {
        mesh: morphed,
        max_displacement,
        average_displacement,
        max_stretch,
        max_compression,
    })
}

fn displacement_stats(original: &[Point3<f64>], moved: &[Point3<f64>]) -> (f64, f64) {
    if original.is_empty() {
        return (0.0, 0.0);
    }
    let (max, sum) = original
        .iter()
        .zip(moved)
        .map(|(a, b)| (b - a).norm())
        .fold((0.0f64, 0.0), |(max, sum), d| (max.max(d), sum + d));
    (max, sum / original.len() as f64)
}

/// Extreme edge length ratios between two meshes with shared faces.
fn distortion_metrics(original: &Mesh, deformed: &Mesh) -> (f64, f64) {
    let mut max_stretch = 1.0f64;
    let mut max_compression = 1.0f64;

    for face in &original.faces {
        for i in 0..3 {
            let (a, b) = (face[i] as usize, face[(i + 1) % 3] as usize);
            let orig_len = (original.vertices[b].position - original.vertices[a].position).norm();
            let def_len = (deformed.vertices[b].position - deformed.vertices[a].position).norm();

            if orig_len > 1e-10 {
                let ratio = def_len / orig_len;
                if ratio > 1.0 {
                    max_stretch = max_stretch.max(ratio);
                } else if ratio > 1e-10 {
                    max_compression = max_compression.max(1.0 / ratio);
                }
            }
        }
    }

    (max_stretch, max_compression)
}

/// Everything [`LinerMorphPipeline::run`] produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Liner surface rim.
    pub source_boundary: BoundaryState,
    /// Target surface rim, with its resampled coordinates attached.
    pub target_boundary: BoundaryState,
    /// Rim correspondences handed to registration.
    pub landmarks: Vec<LandmarkPair>,
    /// Liner surface after registration onto the target.
    pub registered_surface: Mesh,
    /// Field from the liner surface's original to registered positions.
    pub fit: RbfFit,
    /// The morphed dense liner mesh.
    pub morphed: MorphOutcome,
}

/// Boundary extraction, resampling, registration and morphing, end to end.
///
/// ```
/// use liner_morph::morph::LinerMorphPipeline;
/// use liner_morph::correspondence::RegistrationRequest;
/// use liner_morph::BackendError;
/// use nalgebra::Point3;
///
/// let identity = |req: &RegistrationRequest<'_>| -> Result<Vec<Point3<f64>>, BackendError> {
///     Ok(req.source.positions())
/// };
/// let pipeline = LinerMorphPipeline::new(identity);
/// assert!(pipeline.counter_clockwise());
/// ```
#[derive(Debug, Clone)]
pub struct LinerMorphPipeline<R> {
    orchestrator: CorrespondenceOrchestrator<R>,
    boundary: BoundaryOptions,
    seam: SeamOptions,
    counter_clockwise: bool,
    kernel: RbfKernel,
    evaluation: Evaluation,
    params: RegistrationParams,
    steps: StepSchedule,
    extra_landmarks: Vec<LandmarkPair>,
}

impl<R: NonRigidRegistration> LinerMorphPipeline<R> {
    /// A pipeline with default options over a registration backend.
    ///
    /// Landmarks are enabled and the steps default to
    /// [`StepSchedule::landmarks_ramp_soft`].
    pub fn new(backend: R) -> Self {
        Self {
            orchestrator: CorrespondenceOrchestrator::new(backend),
            boundary: BoundaryOptions::default(),
            seam: SeamOptions::default(),
            counter_clockwise: true,
            kernel: RbfKernel::default(),
            evaluation: Evaluation::default(),
            params: RegistrationParams::default().with_landmarks(true),
            steps: StepSchedule::landmarks_ramp_soft(),
            extra_landmarks: Vec::new(),
        }
    }

    /// Set rim extraction options.
    pub fn with_boundary_options(mut self, options: BoundaryOptions) -> Self {
        self.boundary = options;
        self
    }

    /// Set where rims start and the axis their winding is measured about.
    pub fn with_seam(mut self, seam: SeamOptions) -> Self {
        self.seam = seam;
        self
    }

    /// Set rim winding.
    pub fn with_counter_clockwise(mut self, counter_clockwise: bool) -> Self {
        self.counter_clockwise = counter_clockwise;
        self
    }

    /// Set the basis function of the morph field.
    pub fn with_kernel(mut self, kernel: RbfKernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Set how the morph field is evaluated over the dense mesh.
    pub fn with_evaluation(mut self, evaluation: Evaluation) -> Self {
        self.evaluation = evaluation;
        self
    }

    /// Set registration parameters.
    pub fn with_params(mut self, params: RegistrationParams) -> Self {
        self.params = params;
        self
    }

    /// Set the registration step schedule.
    pub fn with_steps(mut self, steps: StepSchedule) -> Self {
        self.steps = steps;
        self
    }

    /// Add hand-picked landmarks on top of the rim correspondences.
    pub fn with_extra_landmarks(mut self, landmarks: Vec<LandmarkPair>) -> Self {
        self.extra_landmarks = landmarks;
        self
    }

    /// Whether rims are ordered counter-clockwise about the seam axis.
    pub fn counter_clockwise(&self) -> bool {
        self.counter_clockwise
    }

    /// Registration parameters in use.
    pub fn params(&self) -> &RegistrationParams {
        &self.params
    }

    /// Morph `dense` so that `liner_surface` lands on `target_surface`.
    ///
    /// `liner_surface` is the open surface of the liner and `dense` is the
    /// full liner mesh whose vertices are moved. Both must share units with
    /// `target_surface`.
    ///
    /// # Errors
    ///
    /// Any error from the stages, unchanged: `Topology`/`NonManifoldEdge`
    /// from rim extraction, `Numerical` from resampling, `Registration` from
    /// the backend, `SingularMatrix` from the fit and `WorkerPool` from
    /// parallel evaluation.
    pub fn run(
        &self,
        liner_surface: &Mesh,
        target_surface: &Mesh,
        dense: &Mesh,
    ) -> MorphResult<PipelineOutput> {
        let _timer = OperationTimer::with_context(
            "liner_morph_pipeline",
            dense.face_count(),
            dense.vertex_count(),
        );
        const STAGES: usize = 4;

        if dense.units() != liner_surface.units() {
            return Err(MorphError::UnitMismatch {
                left: liner_surface.name().to_string(),
                left_units: liner_surface.units().as_str(),
                right: dense.name().to_string(),
                right_units: dense.units().as_str(),
            });
        }
        log_mesh_stats(liner_surface, "liner surface");
        log_mesh_stats(target_surface, "target surface");

        log_progress("liner_morph_pipeline", 0, STAGES, Some("boundary"));
        let source_boundary = extract_boundary_with(liner_surface, &self.boundary)?;
        let target_boundary = extract_boundary_with(target_surface, &self.boundary)?;

        let source_reference = self
            .seam
            .reference_point
            .unwrap_or_else(|| default_reference_point(source_boundary.coords()));
        let source_nodes = restart_and_orient(
            &source_boundary,
            source_reference,
            self.seam.rotation_axis,
            self.counter_clockwise,
        )?;
        let target_rim = resample_with(
            &target_boundary,
            source_nodes.len(),
            self.counter_clockwise,
            &self.seam,
        )?;

        log_progress("liner_morph_pipeline", 1, STAGES, Some("registration"));
        let mut landmarks = assemble_landmarks(&source_nodes, &target_rim)?;
        let target_boundary = target_boundary.with_resampled(ResampledBoundary::new(target_rim));
        landmarks.extend_from_slice(&self.extra_landmarks);
        if !self.params.use_landmarks() {
            warn!(
                target: "liner_morph::registration",
                "Landmarks disabled; rims will not be matched exactly"
            );
        }

        let registered = self.orchestrator.run(
            liner_surface,
            target_surface,
            &landmarks,
            Some(&self.steps),
            &self.params,
        )?;
        let registered_surface = liner_surface.with_vertex_positions(&registered)?;

        log_progress("liner_morph_pipeline", 2, STAGES, Some("fit"));
        let field = fit(&liner_surface.positions(), &registered, self.kernel)?;

        log_progress("liner_morph_pipeline", 3, STAGES, Some("morph"));
        let morphed = morph_mesh(&field, dense, self.evaluation)?;
        log_progress("liner_morph_pipeline", STAGES, STAGES, None);

        Ok(PipelineOutput {
            source_boundary,
            target_boundary,
            landmarks,
            registered_surface,
            fit: field,
            morphed,
        })
    }
}
