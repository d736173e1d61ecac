use skymod_cbor::{DecodeError, ShapeError};
use skymod_repo::RepoError;
use thiserror::Error;

/// Failure reported by one of the remote services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ServiceError {
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ServiceError::Transport(err.into())
    }
}

/// Errors surfaced by the synchronization engine. Each variant names the
/// handle, identifier or record it concerns and keeps the original cause.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("resolve {subject}: {source}")]
    ResolutionFailure {
        subject: String,
        #[source]
        source: ServiceError,
    },
    #[error("{operation}: {source}")]
    TransportFailure {
        operation: String,
        #[source]
        source: ServiceError,
    },
    #[error("export repository of {did}: {source}")]
    ExportFailure {
        did: String,
        #[source]
        source: ServiceError,
    },
    #[error("read repository of {did}: {source}")]
    ArchiveParseFailure {
        did: String,
        #[source]
        source: RepoError,
    },
    #[error("decode record {key} of {did}: {source}")]
    RecordDecodeFailure {
        did: String,
        key: String,
        #[source]
        source: DecodeError,
    },
    #[error("unexpected record {key} of {did}: {source}")]
    ShapeMismatch {
        did: String,
        key: String,
        #[source]
        source: ShapeError,
    },
    #[error("failed to mute {did} after {applied} successful mute(s): {source}")]
    MutationFailure {
        did: String,
        applied: usize,
        #[source]
        source: ServiceError,
    },
    #[error("{collection}: stopped after {pages} pages without reaching the end")]
    PageLimitExceeded { collection: String, pages: usize },
}

impl ModerationError {
    /// True for failures confined to one source repository; callers
    /// scanning several sources may carry on with the others.
    pub fn is_scoped_to_source(&self) -> bool {
        matches!(
            self,
            ModerationError::ExportFailure { .. }
                | ModerationError::ArchiveParseFailure { .. }
                | ModerationError::RecordDecodeFailure { .. }
                | ModerationError::ShapeMismatch { .. }
        )
    }
}
