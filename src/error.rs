//! Error types shared by the transport core and the engine adapters.
//!
//! # Design Decisions
//! - One error enum for everything a handler can observe
//! - Decode and form failures keep the underlying error as their source
//! - `Status` lets business code pick the HTTP status of a failure

use http::StatusCode;

use crate::reply::EncodeError;

/// Boxed error used at every dynamic boundary (bodies, codecs, native services).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the transport core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request body could not be decoded into the requested type.
    #[error("{0}")]
    Decode(#[source] BoxError),

    /// The request body stream failed while being read.
    #[error("failed to read request body: {0}")]
    Body(#[source] BoxError),

    /// The request body is larger than the transport's body limit.
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// A multipart or url-encoded form could not be parsed.
    #[error("{0}")]
    Form(#[source] BoxError),

    /// The requested multipart file field is absent.
    #[error("no such file")]
    MissingFile,

    /// A result value could not be serialized.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A foreign middleware was bridged into the wrong transport.
    #[error("{0}")]
    Bridge(String),

    /// The route table could not be built.
    #[error("route {path}: {reason}")]
    Route { path: String, reason: String },

    /// A failure carrying its own HTTP status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// Any other failure.
    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Failure answered with `status` instead of 500.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Error::Status {
            status,
            message: message.into(),
        }
    }

    pub fn decode(err: impl Into<BoxError>) -> Self {
        Error::Decode(err.into())
    }

    pub fn other(err: impl Into<BoxError>) -> Self {
        Error::Other(err.into())
    }

    /// HTTP status this error is rendered with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Status { status, .. } => *status,
            Error::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
