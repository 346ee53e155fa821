//! Error types for boundary extraction, interpolation and registration.
//!
//! Every failure in this crate is raised to the immediate caller. Nothing here
//! retries or silently recovers; the orchestrating layer decides what to tell
//! the user.
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `MORPH-XXXX`:
//! - `MORPH-1xxx`: Topology errors (missing, ambiguous or malformed boundary)
//! - `MORPH-2xxx`: Numerical errors (degenerate geometry, singular systems)
//! - `MORPH-3xxx`: Argument errors (bad counts, bad indices, unit mismatch)
//! - `MORPH-4xxx`: Registration errors (external backend failures)
//! - `MORPH-5xxx`: Execution errors (worker pool failures)
//!
//! # Example
//!
//! ```
//! use liner_morph::{ErrorCode, MorphError};
//!
//! let err = MorphError::invalid_argument("count must be at least 3, got 2");
//! assert_eq!(err.code(), ErrorCode::InvalidArgument);
//! assert_eq!(err.code().as_str(), "MORPH-3001");
//! ```

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for morphing operations.
pub type MorphResult<T> = Result<T, MorphError>;

/// Boxed error returned by an external registration backend.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Topology errors (1xxx)
    /// MORPH-1001: Mesh does not have exactly one boundary loop
    BoundaryCount = 1001,
    /// MORPH-1002: Free edges do not chain into a single simple cycle
    BoundaryOrder = 1002,
    /// MORPH-1003: Edge shared by more than two faces
    NonManifold = 1003,

    // Numerical errors (2xxx)
    /// MORPH-2001: Degenerate geometry or non-finite values
    Degenerate = 2001,
    /// MORPH-2002: Interpolation matrix is singular
    SingularMatrix = 2002,

    // Argument errors (3xxx)
    /// MORPH-3001: Invalid argument
    InvalidArgument = 3001,
    /// MORPH-3002: Face or landmark references a missing vertex
    InvalidVertexIndex = 3002,
    /// MORPH-3003: Meshes are expressed in different units
    UnitMismatch = 3003,

    // Registration errors (4xxx)
    /// MORPH-4001: External registration backend failed
    RegistrationFailed = 4001,

    // Execution errors (5xxx)
    /// MORPH-5001: Worker pool could not be started or lost work
    WorkerPool = 5001,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `MORPH-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BoundaryCount => "MORPH-1001",
            ErrorCode::BoundaryOrder => "MORPH-1002",
            ErrorCode::NonManifold => "MORPH-1003",
            ErrorCode::Degenerate => "MORPH-2001",
            ErrorCode::SingularMatrix => "MORPH-2002",
            ErrorCode::InvalidArgument => "MORPH-3001",
            ErrorCode::InvalidVertexIndex => "MORPH-3002",
            ErrorCode::UnitMismatch => "MORPH-3003",
            ErrorCode::RegistrationFailed => "MORPH-4001",
            ErrorCode::WorkerPool => "MORPH-5001",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions surfaced alongside an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Cut or trim the mesh so that a single opening remains.
    CutMesh { detail: String },
    /// Check the source geometry for the listed problems.
    CheckSourceMesh { checks: Vec<String> },
    /// Adjust parameters for the operation.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Manual intervention may be required.
    ManualIntervention { description: String },
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::CutMesh { detail } => {
                write!(f, "Cut the mesh so exactly one opening remains: {}", detail)
            }
            RecoverySuggestion::CheckSourceMesh { checks } => {
                write!(f, "Check the source mesh for: {}", checks.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::ManualIntervention { description } => {
                write!(f, "{}", description)
            }
            RecoverySuggestion::None => {
                write!(f, "No automatic recovery available")
            }
        }
    }
}

/// Errors raised by the morphing core.
#[derive(Debug, Error, Diagnostic)]
pub enum MorphError {
    /// The mesh does not have exactly one boundary loop, or its free edges
    /// cannot be ordered into one.
    #[error("invalid boundary topology: {details}")]
    #[diagnostic(
        code(morph::topology::boundary),
        help(
            "The mesh must be open with exactly one rim. Cut the mesh with a plane or remove extra openings before extracting the boundary."
        )
    )]
    Topology {
        details: String,
        /// Number of boundary loops found, when known.
        hole_count: Option<i64>,
    },

    /// An edge is shared by more than two faces.
    #[error("non-manifold edge between vertices {vertex_a} and {vertex_b} ({face_count} faces)")]
    #[diagnostic(
        code(morph::topology::non_manifold),
        help("Boundary extraction requires a manifold surface. Remove duplicated or fan faces first.")
    )]
    NonManifoldEdge {
        vertex_a: u32,
        vertex_b: u32,
        face_count: usize,
    },

    /// Degenerate geometry or a non-finite intermediate value.
    #[error("numerical error: {details}")]
    #[diagnostic(
        code(morph::numerical::degenerate),
        help("Check for coincident vertices, zero-length edges, or NaN/Infinity coordinates.")
    )]
    Numerical { details: String },

    /// The interpolation matrix could not be solved.
    #[error("interpolation matrix ({size}x{size}) is singular (rcond ~ {rcond_estimate:.3e})")]
    #[diagnostic(
        code(morph::numerical::singular),
        help(
            "Source points must be distinct. Remove duplicate or coincident correspondence points, or choose a different kernel."
        )
    )]
    SingularMatrix {
        size: usize,
        /// Ratio of smallest to largest pivot magnitude, 0.0 when exactly singular.
        rcond_estimate: f64,
    },

    /// An argument was out of its valid range.
    #[error("invalid argument: {details}")]
    #[diagnostic(code(morph::argument::invalid))]
    InvalidArgument { details: String },

    /// A face or landmark references a vertex that does not exist.
    #[error("invalid vertex index: {context} references vertex {vertex_index}, but mesh only has {vertex_count} vertices")]
    #[diagnostic(
        code(morph::argument::vertex_index),
        help("Check that faces and landmark pairs refer to the mesh they are used with.")
    )]
    InvalidVertexIndex {
        context: String,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// Two meshes that must share units do not.
    #[error("unit mismatch: {left} is in {left_units}, {right} is in {right_units}")]
    #[diagnostic(
        code(morph::argument::units),
        help("Convert both meshes to the same units with `Mesh::set_units` first.")
    )]
    UnitMismatch {
        left: String,
        left_units: &'static str,
        right: String,
        right_units: &'static str,
    },

    /// The external registration backend failed.
    #[error("registration failed: {details}")]
    #[diagnostic(
        code(morph::registration::failed),
        help("Registration is not retried. Adjust the step schedule or parameters and run again.")
    )]
    Registration {
        details: String,
        #[source]
        source: Option<BackendError>,
    },

    /// The parallel evaluator's worker pool failed.
    #[error("worker pool failed: {details}")]
    #[diagnostic(
        code(morph::parallel::pool),
        help("Partial sums are discarded. Retry with fewer workers or use serial evaluation.")
    )]
    WorkerPool { details: String },
}

impl MorphError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MorphError::Topology { hole_count, .. } => match hole_count {
                Some(_) => ErrorCode::BoundaryCount,
                None => ErrorCode::BoundaryOrder,
            },
            MorphError::NonManifoldEdge { .. } => ErrorCode::NonManifold,
            MorphError::Numerical { .. } => ErrorCode::Degenerate,
            MorphError::SingularMatrix { .. } => ErrorCode::SingularMatrix,
            MorphError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            MorphError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            MorphError::UnitMismatch { .. } => ErrorCode::UnitMismatch,
            MorphError::Registration { .. } => ErrorCode::RegistrationFailed,
            MorphError::WorkerPool { .. } => ErrorCode::WorkerPool,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            MorphError::Topology {
                hole_count: Some(0),
                ..
            } => RecoverySuggestion::CutMesh {
                detail: "the mesh is closed and has no rim".into(),
            },
            MorphError::Topology {
                hole_count: Some(n),
                ..
            } => RecoverySuggestion::CutMesh {
                detail: format!("the mesh has {} openings", n),
            },
            MorphError::Topology {
                hole_count: None, ..
            } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["bowtie vertices on the rim".into(), "disconnected pieces".into()],
            },
            MorphError::NonManifoldEdge { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["duplicated faces".into(), "non-manifold edges".into()],
            },
            MorphError::Numerical { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["coincident vertices".into(), "NaN or infinite coordinates".into()],
            },
            MorphError::SingularMatrix { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["duplicate source points".into()],
            },
            MorphError::InvalidArgument { .. } => RecoverySuggestion::None,
            MorphError::InvalidVertexIndex { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["face indices".into(), "landmark indices".into()],
            },
            MorphError::UnitMismatch { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("units".into(), "convert both meshes to the same units".into())],
            },
            MorphError::Registration { .. } => RecoverySuggestion::ManualIntervention {
                description: "Adjust the step schedule or registration parameters and run again"
                    .into(),
            },
            MorphError::WorkerPool { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("worker_count".into(), "try fewer workers".into())],
            },
        }
    }

    // Constructor helpers for common error patterns

    /// Create a Topology error with a known hole count.
    pub fn boundary_count(hole_count: i64, details: impl Into<String>) -> Self {
        MorphError::Topology {
            details: details.into(),
            hole_count: Some(hole_count),
        }
    }

    /// Create a Topology error for a rim that cannot be ordered.
    pub fn boundary_order(details: impl Into<String>) -> Self {
        MorphError::Topology {
            details: details.into(),
            hole_count: None,
        }
    }

    /// Create a Numerical error.
    pub fn numerical(details: impl Into<String>) -> Self {
        MorphError::Numerical {
            details: details.into(),
        }
    }

    /// Create a SingularMatrix error.
    pub fn singular_matrix(size: usize, rcond_estimate: f64) -> Self {
        MorphError::SingularMatrix {
            size,
            rcond_estimate,
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(details: impl Into<String>) -> Self {
        MorphError::InvalidArgument {
            details: details.into(),
        }
    }

    /// Create an InvalidVertexIndex error.
    pub fn invalid_vertex_index(
        context: impl Into<String>,
        vertex_index: u32,
        vertex_count: usize,
    ) -> Self {
        MorphError::InvalidVertexIndex {
            context: context.into(),
            vertex_index,
            vertex_count,
        }
    }

    /// Create a Registration error without an underlying source.
    pub fn registration(details: impl Into<String>) -> Self {
        MorphError::Registration {
            details: details.into(),
            source: None,
        }
    }

    /// Create a WorkerPool error.
    pub fn worker_pool(details: impl Into<String>) -> Self {
        MorphError::WorkerPool {
            details: details.into(),
        }
    }

    /// Wrap an error returned by a registration backend.
    pub fn registration_backend(source: BackendError) -> Self {
        MorphError::Registration {
            details: source.to_string(),
            source: Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::BoundaryCount.as_str(), "MORPH-1001");
        assert_eq!(ErrorCode::SingularMatrix.as_str(), "MORPH-2002");
        assert_eq!(ErrorCode::InvalidArgument.as_str(), "MORPH-3001");
        assert_eq!(ErrorCode::RegistrationFailed.as_str(), "MORPH-4001");
        assert_eq!(format!("{}", ErrorCode::UnitMismatch), "MORPH-3003");
    }

    #[test]
    fn test_topology_code_depends_on_hole_count() {
        let counted = MorphError::boundary_count(2, "two openings");
        assert_eq!(counted.code(), ErrorCode::BoundaryCount);

        let unordered = MorphError::boundary_order("dead end at vertex 4");
        assert_eq!(unordered.code(), ErrorCode::BoundaryOrder);
    }

    #[test]
    fn test_recovery_suggestions() {
        let closed = MorphError::boundary_count(0, "closed");
        assert!(matches!(
            closed.recovery_suggestion(),
            RecoverySuggestion::CutMesh { .. }
        ));

        let singular = MorphError::singular_matrix(3, 0.0);
        assert!(matches!(
            singular.recovery_suggestion(),
            RecoverySuggestion::CheckSourceMesh { .. }
        ));
    }

    #[test]
    fn test_error_display() {
        let err = MorphError::singular_matrix(4, 0.0);
        let msg = format!("{}", err);
        assert!(msg.contains("4x4"));
        assert!(msg.contains("singular"));

        let err = MorphError::invalid_vertex_index("landmark 3", 12, 10);
        let msg = format!("{}", err);
        assert!(msg.contains("vertex 12"));
        assert!(msg.contains("10 vertices"));
    }

    #[test]
    fn test_registration_keeps_source() {
        use std::error::Error as _;

        let backend: BackendError = "solver diverged".into();
        let err = MorphError::registration_backend(backend);
        assert!(err.to_string().contains("solver diverged"));
        assert!(err.source().is_some());
    }
}
