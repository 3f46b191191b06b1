//! Error types shared by the workflows and the service adapters.

use thiserror::Error;

use crate::processing::curate::DeleteReport;

/// Boxed source error carried by failed service requests.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A result type using `IdolError`.
pub type Result<T> = std::result::Result<T, IdolError>;

/// Errors that can occur while managing or querying the idol collection.
#[derive(Debug, Error)]
pub enum IdolError {
    /// A call to the recognition service or the object store failed.
    #[error("{operation} request failed: {source}")]
    ServiceRequest {
        /// The remote operation that failed, e.g. `index_faces`.
        operation: &'static str,
        /// The underlying SDK or transport error.
        #[source]
        source: BoxError,
    },

    /// Indexing found a number of faces other than exactly one.
    #[error("expected exactly one face in the reference image, found {found}")]
    Index {
        /// Number of faces the service detected.
        found: usize,
    },

    /// A roster entry's external image id could not be decoded.
    #[error("malformed face record {external_image_id:?}: {reason}")]
    MalformedRecord {
        /// The raw external image id stored by the service.
        external_image_id: String,
        /// Why decoding failed.
        reason: String,
    },

    /// An idol could not be built from the given id and location.
    #[error("invalid idol {idol_id:?}: {reason}")]
    InvalidIdol {
        /// The rejected idol id.
        idol_id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No roster entry matched the face id pattern.
    #[error("no idol matched {pattern}")]
    NotFound {
        /// The pattern that matched nothing.
        pattern: String,
    },

    /// More than one roster entry matched the face id pattern.
    #[error("multiple idols matched {pattern}: {face_ids:?}")]
    Ambiguous {
        /// The pattern that matched too much.
        pattern: String,
        /// Face ids of every matching entry.
        face_ids: Vec<String>,
    },

    /// The matched face belongs to a different idol than the caller named.
    #[error("face {face_id} belongs to {actual:?}, not {expected:?}")]
    IdentityMismatch {
        /// The matched face id.
        face_id: String,
        /// The idol id supplied by the caller.
        expected: String,
        /// The idol id stored with the face.
        actual: String,
    },

    /// The operator declined the confirmation prompt.
    #[error("cancelled by user")]
    Cancelled,

    /// One half of a face + image deletion failed.
    #[error("partial cleanup of {}: {}", .0.idol, .0)]
    PartialCleanup(Box<DeleteReport>),

    /// Both halves of a face + image deletion failed.
    #[error("cleanup of {} failed: {}", .0.idol, .0)]
    CleanupFailed(Box<DeleteReport>),

    /// An enrollment failed and undoing its writes failed too.
    #[error("{cause}; rollback also failed: {}", join(.rollback))]
    RollbackFailed {
        /// The error that triggered the rollback.
        cause: Box<IdolError>,
        /// Every error raised while rolling back, faces first.
        rollback: Vec<IdolError>,
    },

    /// The service accepted a delete request but did not delete the face.
    #[error("face {face_id} was not deleted")]
    FaceNotDeleted {
        /// The face that is still indexed.
        face_id: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A user supplied pattern is not a valid regular expression.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Local filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The probe image could not be decoded or re-encoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl IdolError {
    /// Wraps an SDK error as a failed service request.
    pub fn service<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ServiceRequest {
            operation,
            source: Box::new(source),
        }
    }

    /// Returns the HTTP status code a front end should render this error with.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Index { .. }
            | Self::InvalidIdol { .. }
            | Self::InvalidPattern(_)
            | Self::Image(_) => 400,
            Self::Ambiguous { .. } | Self::IdentityMismatch { .. } | Self::Cancelled => 409,
            Self::ServiceRequest { .. } => 502,
            Self::MalformedRecord { .. }
            | Self::PartialCleanup(_)
            | Self::CleanupFailed(_)
            | Self::RollbackFailed { .. }
            | Self::FaceNotDeleted { .. }
            | Self::InvalidConfig(_)
            | Self::Io(_) => 500,
        }
    }
}

fn join(errors: &[IdolError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
