//! Morphing prosthetic liner meshes onto residual limb surfaces.
//!
//! A liner is fitted to a limb in two moves. Its open inner surface is first
//! registered non-rigidly onto the scanned skin surface, with the two rims
//! tied together by landmark correspondences. The displacement of that
//! surface is then spread to every vertex of the full liner mesh with a
//! radial basis function field.
//!
//! # Features
//!
//! - **Rim extraction**: Ordered free-edge loop of an open surface, with
//!   topology checks and corner detection ([`boundary`])
//! - **Resampling**: Seam placement, winding and arc-length resampling of a
//!   rim ([`resample`])
//! - **Correspondence**: Landmark pairs and a validated call into an external
//!   registration algorithm ([`correspondence`])
//! - **Interpolation**: RBF fit and evaluation of a sparse displacement field
//!   ([`rbf`]), serially or on a worker pool ([`parallel`])
//! - **Pipeline**: Everything above end to end ([`morph`])
//!
//! # Units and Scale
//!
//! **Meshes default to millimeters.** [`Mesh::set_units`] rescales between
//! millimeters and meters. Operations that combine two meshes refuse to mix
//! units.
//!
//! # Coordinate System
//!
//! Right-handed, **Z up**. Rim winding is measured about +Z by default; use
//! [`resample::SeamOptions::y_up`] for Y-up scans.
//!
//! # Quick Start
//!
//! ```
//! use liner_morph::{Mesh, Units, Vertex, extract_boundary};
//! use liner_morph::resample::resample;
//!
//! let mut mesh = Mesh::new("square", Units::Millimeter);
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 1.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
//! mesh.faces.push([0, 1, 2]);
//! mesh.faces.push([0, 2, 3]);
//!
//! let rim = extract_boundary(&mesh).unwrap();
//! assert_eq!(rim.nodes().len(), 4);
//!
//! let samples = resample(&rim, 8, true).unwrap();
//! assert_eq!(samples.len(), 8);
//! ```
//!
//! # Logging
//!
//! All stages emit [`tracing`] events under the `liner_morph::*` targets. See
//! [`tracing_ext`].

mod error;
mod types;

pub mod adjacency;
pub mod boundary;
pub mod correspondence;
pub mod morph;
pub mod parallel;
pub mod rbf;
pub mod resample;
pub mod tracing_ext;
pub mod transform;

// Core types
pub use error::{BackendError, ErrorCode, MorphError, MorphResult, RecoverySuggestion};
pub use types::{Mesh, Units, Vertex};

// Topology
pub use adjacency::MeshAdjacency;
pub use boundary::{
    BoundaryOptions, BoundaryState, DEFAULT_CORNER_THRESHOLD_DEG, ResampledBoundary,
    extract_boundary, extract_boundary_with,
};

// Resampling
pub use resample::{
    SeamOptions, default_reference_point, resample, resample_polyline, resample_with,
    restart_and_orient,
};

// Correspondence
#[cfg(feature = "config")]
pub use correspondence::RegistrationConfig;
pub use correspondence::{
    CorrespondenceOrchestrator, LandmarkPair, NonRigidRegistration, PartialRegistrationParams,
    RegistrationParams, RegistrationRequest, RegistrationStep, StepSchedule, assemble_landmarks,
};

// Interpolation
pub use parallel::{DEFAULT_CHUNK_SIZE, ParallelEvaluator, evaluate_parallel};
pub use rbf::{
    RadialBasis, RbfFit, RbfKernel, evaluate, fit, fit_with_matrix, interpolation_matrix,
};

// Pipeline
pub use morph::{Evaluation, LinerMorphPipeline, MorphOutcome, PipelineOutput, morph_mesh};
pub use transform::RigidTransform;
