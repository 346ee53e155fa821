//! Landmark assembly and the call into external non-rigid registration.
//!
//! The registration algorithm itself lives outside this crate behind the
//! [`NonRigidRegistration`] trait. This module owns what surrounds it:
//!
//! - Pairing the source rim's ordered nodes with the target rim's resampled
//!   coordinates as [`LandmarkPair`]s
//! - The [`StepSchedule`] and [`RegistrationParams`], with their defaults and
//!   validation
//! - Checking the backend's output before anyone uses it
//!
//! # Example
//!
//! ```
//! use liner_morph::correspondence::{
//!     CorrespondenceOrchestrator, PartialRegistrationParams, RegistrationRequest,
//! };
//! use liner_morph::{BackendError, Mesh, Units, Vertex};
//! use nalgebra::Point3;
//!
//! let mut source = Mesh::new("liner", Units::Millimeter);
//! source.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
//! source.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
//! source.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
//! source.faces.push([0, 1, 2]);
//! let target = source.renamed("skin");
//!
//! // A stand-in backend that returns the source unchanged
//! let backend = |req: &RegistrationRequest<'_>| -> Result<Vec<Point3<f64>>, BackendError> {
//!     Ok(req.source.positions())
//! };
//!
//! let params = PartialRegistrationParams::default().neighbor_count(3).resolve().unwrap();
//! let orchestrator = CorrespondenceOrchestrator::new(backend);
//! let moved = orchestrator.run(&source, &target, &[], None, &params).unwrap();
//! assert_eq!(moved.len(), 3);
//! ```

use crate::tracing_ext::OperationTimer;
use crate::{BackendError, Mesh, MorphError, MorphResult};
use nalgebra::Point3;
use tracing::{debug, info, warn};

/// Default stiffness scale.
pub const DEFAULT_GAMMA: f64 = 1.0;
/// Default convergence epsilon.
pub const DEFAULT_EPSILON: f64 = 0.001;
/// Default number of nearest neighbors for correspondence search.
pub const DEFAULT_NEIGHBOR_COUNT: usize = 8;
/// Default correspondence distance threshold.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.1;

/// A correspondence constraint: move source vertex `source_index` to `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct LandmarkPair {
    /// Index into the source mesh's vertices.
    pub source_index: u32,
    /// Target position.
    pub target: Point3<f64>,
}

impl LandmarkPair {
    /// Create a landmark pair.
    pub fn new(source_index: u32, target: Point3<f64>) -> Self {
        Self {
            source_index,
            target,
        }
    }
}

/// Pair each source rim node with the target rim sample at the same position.
///
/// Both sequences must already share a seam and winding (see
/// [`restart_and_orient`](crate::resample::restart_and_orient)).
///
/// # Errors
///
/// Returns `InvalidArgument` if the lengths differ or are zero. The usual fix
/// is resampling the target rim to the source rim's node count.
pub fn assemble_landmarks(
    source_nodes: &[u32],
    target_points: &[Point3<f64>],
) -> MorphResult<Vec<LandmarkPair>> {
    if source_nodes.is_empty() {
        return Err(MorphError::invalid_argument("no source rim nodes to pair"));
    }
    if source_nodes.len() != target_points.len() {
        return Err(MorphError::invalid_argument(format!(
            "source rim has {} nodes but target rim has {} samples; resample the target to {} points",
            source_nodes.len(),
            target_points.len(),
            source_nodes.len()
        )));
    }

    Ok(source_nodes
        .iter()
        .zip(target_points)
        .map(|(&source_index, &target)| LandmarkPair::new(source_index, target))
        .collect())
}

/// One outer-loop step of the registration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistrationStep {
    /// Stiffness weight.
    pub stiffness: f64,
    /// Landmark weight.
    pub landmark_weight: f64,
    /// Rigid displacement weight.
    pub displacement_weight: f64,
    /// Iteration cap for this step.
    pub max_iterations: u32,
}

impl RegistrationStep {
    /// Create a step.
    pub fn new(
        stiffness: f64,
        landmark_weight: f64,
        displacement_weight: f64,
        max_iterations: u32,
    ) -> Self {
        Self {
            stiffness,
            landmark_weight,
            displacement_weight,
            max_iterations,
        }
    }

    /// The step as a `(stiffness, landmark, displacement, iterations)` tuple.
    pub fn as_tuple(&self) -> (f64, f64, f64, u32) {
        (
            self.stiffness,
            self.landmark_weight,
            self.displacement_weight,
            self.max_iterations,
        )
    }

    fn validate(&self, index: usize) -> MorphResult<()> {
        let weights = [
            ("stiffness", self.stiffness),
            ("landmark_weight", self.landmark_weight),
            ("displacement_weight", self.displacement_weight),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(MorphError::invalid_argument(format!(
                    "step {}: {} must be finite and non-negative, got {}",
                    index, name, value
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(MorphError::invalid_argument(format!(
                "step {}: max_iterations must be at least 1",
                index
            )));
        }
        Ok(())
    }
}

/// Ordered list of registration steps. Never empty.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "config",
    serde(try_from = "Vec<RegistrationStep>", into = "Vec<RegistrationStep>")
)]
pub struct StepSchedule {
    steps: Vec<RegistrationStep>,
}

impl Default for StepSchedule {
    /// Four steps stiffening from landmark-driven to free fitting:
    ///
    /// | stiffness | landmark | displacement | iterations |
    /// |-----------|----------|--------------|------------|
    /// | 0.01      | 10       | 0.5          | 10         |
    /// | 0.02      | 5        | 0.5          | 10         |
    /// | 0.03      | 2.5      | 0.5          | 10         |
    /// | 0.01      | 0        | 0.0          | 10         |
    fn default() -> Self {
        Self {
            steps: vec![
                RegistrationStep::new(0.01, 10.0, 0.5, 10),
                RegistrationStep::new(0.02, 5.0, 0.5, 10),
                RegistrationStep::new(0.03, 2.5, 0.5, 10),
                RegistrationStep::new(0.01, 0.0, 0.0, 10),
            ],
        }
    }
}

impl StepSchedule {
    /// The default schedule with the landmark weight held at 10 throughout.
    pub fn landmarks() -> Self {
        Self {
            steps: vec![
                RegistrationStep::new(0.01, 10.0, 0.5, 10),
                RegistrationStep::new(0.02, 10.0, 0.5, 10),
                RegistrationStep::new(0.03, 10.0, 0.5, 10),
                RegistrationStep::new(0.01, 10.0, 0.5, 10),
            ],
        }
    }

    /// Strict landmarks with a softer morph: low stiffness throughout and a
    /// heavier displacement weight in the last step.
    pub fn landmarks_soft() -> Self {
        Self {
            steps: vec![
                RegistrationStep::new(0.01, 10.0, 0.5, 10),
                RegistrationStep::new(0.01, 10.0, 0.5, 10),
                RegistrationStep::new(0.01, 10.0, 0.5, 10),
                RegistrationStep::new(0.008, 10.0, 1.5, 10),
            ],
        }
    }

    /// Five steps ramping the landmark weight from 0 to 10 under a soft morph.
    ///
    /// | stiffness | landmark | displacement | iterations |
    /// |-----------|----------|--------------|------------|
    /// | 0.01      | 0        | 0.5          | 10         |
    /// | 0.02      | 2        | 0.5          | 10         |
    /// | 0.03      | 5        | 0.5          | 10         |
    /// | 0.01      | 8        | 0.5          | 10         |
    /// | 0.005     | 10       | 0.5          | 10         |
    ///
    /// This is what [`LinerMorphPipeline`](crate::LinerMorphPipeline) uses
    /// unless given other steps.
    pub fn landmarks_ramp_soft() -> Self {
        Self {
            steps: vec![
                RegistrationStep::new(0.01, 0.0, 0.5, 10),
                RegistrationStep::new(0.02, 2.0, 0.5, 10),
                RegistrationStep::new(0.03, 5.0, 0.5, 10),
                RegistrationStep::new(0.01, 8.0, 0.5, 10),
                RegistrationStep::new(0.005, 10.0, 0.5, 10),
            ],
        }
    }

    /// Create a schedule from explicit steps.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `steps` is empty or a step has a negative
    /// or non-finite weight or a zero iteration cap.
    pub fn new(steps: Vec<RegistrationStep>) -> MorphResult<Self> {
        if steps.is_empty() {
            return Err(MorphError::invalid_argument(
                "a step schedule needs at least one step",
            ));
        }
        for (i, step) in steps.iter().enumerate() {
            step.validate(i)?;
        }
        Ok(Self { steps })
    }

    /// Create a schedule from `(stiffness, landmark, displacement, iterations)`
    /// tuples.
    ///
    /// # Errors
    ///
    /// As [`StepSchedule::new`].
    pub fn from_tuples(steps: &[(f64, f64, f64, u32)]) -> MorphResult<Self> {
        Self::new(
            steps
                .iter()
                .map(|&(s, l, d, n)| RegistrationStep::new(s, l, d, n))
                .collect(),
        )
    }

    /// The steps in order.
    pub fn steps(&self) -> &[RegistrationStep] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the schedule has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total iterations across all steps.
    pub fn total_iterations(&self) -> u64 {
        self.steps.iter().map(|s| s.max_iterations as u64).sum()
    }
}

impl TryFrom<Vec<RegistrationStep>> for StepSchedule {
    type Error = MorphError;

    fn try_from(steps: Vec<RegistrationStep>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<StepSchedule> for Vec<RegistrationStep> {
    fn from(schedule: StepSchedule) -> Self {
        schedule.steps
    }
}

/// Validated registration parameters.
///
/// Build one with [`PartialRegistrationParams::resolve`]; anything left unset
/// takes its documented default. [`Default`] gives all defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationParams {
    gamma: f64,
    epsilon: f64,
    neighbor_count: usize,
    distance_threshold: f64,
    use_faces: bool,
    use_landmarks: bool,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            epsilon: DEFAULT_EPSILON,
            neighbor_count: DEFAULT_NEIGHBOR_COUNT,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            use_faces: false,
            use_landmarks: false,
        }
    }
}

impl RegistrationParams {
    /// Stiffness weight scale (default 1).
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Convergence epsilon (default 0.001).
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Nearest neighbors considered per vertex (default 8).
    pub fn neighbor_count(&self) -> usize {
        self.neighbor_count
    }

    /// Correspondence distance threshold (default 0.1).
    pub fn distance_threshold(&self) -> f64 {
        self.distance_threshold
    }

    /// Whether correspondences are searched on faces rather than vertices
    /// (default false).
    pub fn use_faces(&self) -> bool {
        self.use_faces
    }

    /// Whether landmark pairs constrain the registration (default false).
    pub fn use_landmarks(&self) -> bool {
        self.use_landmarks
    }

    /// Copy with landmark usage switched on or off.
    pub fn with_landmarks(mut self, use_landmarks: bool) -> Self {
        self.use_landmarks = use_landmarks;
        self
    }

    /// Copy with face usage switched on or off.
    pub fn with_faces(mut self, use_faces: bool) -> Self {
        self.use_faces = use_faces;
        self
    }
}

/// Caller-supplied registration parameters; unset fields take defaults.
///
/// Deserializable from TOML or JSON with the `config` feature:
///
/// ```toml
/// gamma = 2.0
/// neighbors = 3
/// use_landmarks = true
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct PartialRegistrationParams {
    /// Stiffness weight scale.
    #[cfg_attr(feature = "config", serde(skip_serializing_if = "Option::is_none"))]
    pub gamma: Option<f64>,
    /// Convergence epsilon.
    #[cfg_attr(
        feature = "config",
        serde(alias = "eps", skip_serializing_if = "Option::is_none")
    )]
    pub epsilon: Option<f64>,
    /// Nearest neighbors considered per vertex.
    #[cfg_attr(
        feature = "config",
        serde(
            alias = "neighbors",
            alias = "neighbors_count",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub neighbor_count: Option<usize>,
    /// Correspondence distance threshold.
    #[cfg_attr(feature = "config", serde(skip_serializing_if = "Option::is_none"))]
    pub distance_threshold: Option<f64>,
    /// Search correspondences on faces.
    #[cfg_attr(feature = "config", serde(skip_serializing_if = "Option::is_none"))]
    pub use_faces: Option<bool>,
    /// Constrain with landmark pairs.
    #[cfg_attr(feature = "config", serde(skip_serializing_if = "Option::is_none"))]
    pub use_landmarks: Option<bool>,
}

impl PartialRegistrationParams {
    /// Set gamma.
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    /// Set epsilon.
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    /// Set the neighbor count.
    pub fn neighbor_count(mut self, count: usize) -> Self {
        self.neighbor_count = Some(count);
        self
    }

    /// Set the distance threshold.
    pub fn distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = Some(threshold);
        self
    }

    /// Set face usage.
    pub fn use_faces(mut self, use_faces: bool) -> Self {
        self.use_faces = Some(use_faces);
        self
    }

    /// Set landmark usage.
    pub fn use_landmarks(mut self, use_landmarks: bool) -> Self {
        self.use_landmarks = Some(use_landmarks);
        self
    }

    /// Overlay `other` on top of `self`: fields set in `other` win.
    pub fn merge(self, other: PartialRegistrationParams) -> Self {
        Self {
            gamma: other.gamma.or(self.gamma),
            epsilon: other.epsilon.or(self.epsilon),
            neighbor_count: other.neighbor_count.or(self.neighbor_count),
            distance_threshold: other.distance_threshold.or(self.distance_threshold),
            use_faces: other.use_faces.or(self.use_faces),
            use_landmarks: other.use_landmarks.or(self.use_landmarks),
        }
    }

    /// Merge over the defaults and validate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a supplied value is out of range: gamma,
    /// epsilon and distance threshold must be finite and positive; the
    /// neighbor count must be at least 1.
    pub fn resolve(&self) -> MorphResult<RegistrationParams> {
        let defaults = RegistrationParams::default();
        let params = RegistrationParams {
            gamma: self.gamma.unwrap_or(defaults.gamma),
            epsilon: self.epsilon.unwrap_or(defaults.epsilon),
            neighbor_count: self.neighbor_count.unwrap_or(defaults.neighbor_count),
            distance_threshold: self.distance_threshold.unwrap_or(defaults.distance_threshold),
            use_faces: self.use_faces.unwrap_or(defaults.use_faces),
            use_landmarks: self.use_landmarks.unwrap_or(defaults.use_landmarks),
        };

        for (name, value) in [
            ("gamma", params.gamma),
            ("epsilon", params.epsilon),
            ("distance_threshold", params.distance_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MorphError::invalid_argument(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )));
            }
        }
        if params.neighbor_count == 0 {
            return Err(MorphError::invalid_argument(
                "neighbor_count must be at least 1",
            ));
        }

        Ok(params)
    }
}

impl From<RegistrationParams> for PartialRegistrationParams {
    fn from(params: RegistrationParams) -> Self {
        Self {
            gamma: Some(params.gamma),
            epsilon: Some(params.epsilon),
            neighbor_count: Some(params.neighbor_count),
            distance_threshold: Some(params.distance_threshold),
            use_faces: Some(params.use_faces),
            use_landmarks: Some(params.use_landmarks),
        }
    }
}

/// Registration settings as loaded from a configuration file.
#[cfg(feature = "config")]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Parameter overrides.
    pub params: PartialRegistrationParams,
    /// Step schedule; the default schedule is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<StepSchedule>,
}

#[cfg(feature = "config")]
impl RegistrationConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or doesn't match the schema.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Resolve parameters over defaults and pick the schedule.
    ///
    /// # Errors
    ///
    /// As [`PartialRegistrationParams::resolve`].
    pub fn resolve(&self) -> MorphResult<(RegistrationParams, StepSchedule)> {
        Ok((
            self.params.resolve()?,
            self.steps.clone().unwrap_or_default(),
        ))
    }
}

/// Everything the external registration primitive receives.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationRequest<'a> {
    /// Surface being deformed.
    pub source: &'a Mesh,
    /// Surface being fitted to.
    pub target: &'a Mesh,
    /// Landmark constraints, present only when landmarks are enabled.
    pub landmarks: Option<&'a [LandmarkPair]>,
    /// Outer-loop schedule.
    pub steps: &'a StepSchedule,
    /// Validated parameters.
    pub params: &'a RegistrationParams,
}

impl RegistrationRequest<'_> {
    /// Source vertex indices of the landmarks, if any.
    pub fn landmark_source_indices(&self) -> Option<Vec<u32>> {
        self.landmarks
            .map(|pairs| pairs.iter().map(|p| p.source_index).collect())
    }

    /// Target positions of the landmarks, if any.
    pub fn landmark_target_positions(&self) -> Option<Vec<Point3<f64>>> {
        self.landmarks
            .map(|pairs| pairs.iter().map(|p| p.target).collect())
    }
}

/// An external non-rigid surface registration algorithm.
///
/// Implementations return the new position of every source vertex, in
/// vertex order. Connectivity is unchanged.
pub trait NonRigidRegistration {
    /// Register `request.source` onto `request.target`.
    fn register(&self, request: &RegistrationRequest<'_>) -> Result<Vec<Point3<f64>>, BackendError>;
}

impl<F> NonRigidRegistration for F
where
    F: Fn(&RegistrationRequest<'_>) -> Result<Vec<Point3<f64>>, BackendError>,
{
    fn register(
        &self,
        request: &RegistrationRequest<'_>,
    ) -> Result<Vec<Point3<f64>>, BackendError> {
        self(request)
    }
}

/// Drives a [`NonRigidRegistration`] backend with validated inputs.
#[derive(Debug, Clone)]
pub struct CorrespondenceOrchestrator<R> {
    backend: R,
}

impl<R: NonRigidRegistration> CorrespondenceOrchestrator<R> {
    /// Wrap a registration backend.
    pub fn new(backend: R) -> Self {
        Self { backend }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &R {
        &self.backend
    }

    /// Register `source` onto `target`, returning new source vertex positions.
    ///
    /// `landmarks` are passed to the backend only when
    /// `params.use_landmarks()` is set. `steps` falls back to
    /// [`StepSchedule::default`].
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if a mesh is empty, or landmarks are enabled but
    ///   none were given
    /// - `UnitMismatch` if the meshes use different units
    /// - `InvalidVertexIndex` if a face or landmark references a missing vertex
    /// - `Numerical` if a landmark target is not finite
    /// - `Registration` if the backend fails or returns a wrong-sized or
    ///   non-finite result; there is no retry
    pub fn run(
        &self,
        source: &Mesh,
        target: &Mesh,
        landmarks: &[LandmarkPair],
        steps: Option<&StepSchedule>,
        params: &RegistrationParams,
    ) -> MorphResult<Vec<Point3<f64>>> {
        let _timer = OperationTimer::with_context(
            "registration",
            source.face_count(),
            source.vertex_count(),
        );

        for mesh in [source, target] {
            if mesh.is_empty() {
                return Err(MorphError::invalid_argument(format!(
                    "mesh '{}' has no geometry",
                    mesh.name()
                )));
            }
            mesh.validate_faces()?;
        }
        if source.units() != target.units() {
            return Err(MorphError::UnitMismatch {
                left: source.name().to_string(),
                left_units: source.units().as_str(),
                right: target.name().to_string(),
                right_units: target.units().as_str(),
            });
        }

        let landmarks = if params.use_landmarks() {
            check_landmarks(source, landmarks)?;
            Some(landmarks)
        } else {
            if !landmarks.is_empty() {
                debug!(
                    target: "liner_morph::registration",
                    count = landmarks.len(),
                    "Landmarks supplied but disabled; ignoring"
                );
            }
            None
        };

        let default_steps;
        let steps = match steps {
            Some(s) => s,
            None => {
                default_steps = StepSchedule::default();
                &default_steps
            }
        };

        let request = RegistrationRequest {
            source,
            target,
            landmarks,
            steps,
            params,
        };
        info!(
            target: "liner_morph::registration",
            source = source.name(),
            target = target.name(),
            steps = steps.len(),
            landmarks = landmarks.map_or(0, <[LandmarkPair]>::len),
            "Running non-rigid registration"
        );

        let positions = self.backend.register(&request).map_err(|e| {
            warn!(target: "liner_morph::registration", error = %e, "Registration backend failed");
            MorphError::registration_backend(e)
        })?;

        if positions.len() != source.vertex_count() {
            return Err(MorphError::registration(format!(
                "backend returned {} positions for {} source vertices",
                positions.len(),
                source.vertex_count()
            )));
        }
        if let Some(i) = positions
            .iter()
            .position(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(MorphError::registration(format!(
                "backend returned a non-finite position for vertex {}",
                i
            )));
        }

        Ok(positions)
    }

    /// As [`run`](Self::run), but returns the registered source as a new mesh
    /// with the source's connectivity.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run).
    pub fn register_mesh(
        &self,
        source: &Mesh,
        target: &Mesh,
        landmarks: &[LandmarkPair],
        steps: Option<&StepSchedule>,
        params: &RegistrationParams,
    ) -> MorphResult<Mesh> {
        let positions = self.run(source, target, landmarks, steps, params)?;
        source.with_vertex_positions(&positions)
    }
}

fn check_landmarks(source: &Mesh, landmarks: &[LandmarkPair]) -> MorphResult<()> {
    if landmarks.is_empty() {
        return Err(MorphError::invalid_argument(
            "use_landmarks is set but no landmark pairs were given",
        ));
    }
    let count = source.vertex_count();
    for (i, pair) in landmarks.iter().enumerate() {
        if pair.source_index as usize >= count {
            return Err(MorphError::invalid_vertex_index(
                format!("landmark {}", i),
                pair.source_index,
                count,
            ));
        }
        if !pair.target.coords.iter().all(|c| c.is_finite()) {
            return Err(MorphError::numerical(format!(
                "landmark {} has a non-finite target",
                i
            )));
        }
    }
    Ok(())
}
