//! Common error types used throughout seekgate.
//!
//! Every failure a video request can hit maps onto one of these variants, and
//! each variant carries a fixed HTTP status (see [`Error::http_status`]).

/// Common error type for seekgate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No valid credential was presented.
    #[error("Unauthorized")]
    Unauthorized,

    /// The requested resource does not exist or resolves outside the root.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The Range header is malformed or out of bounds for the resource.
    #[error("Range not satisfiable (resource size {size})")]
    RangeNotSatisfiable {
        /// Total size of the resource, disclosed in `Content-Range: bytes */size`.
        size: u64,
    },

    /// The client exceeded its request quota.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Streaming failed after the transfer started.
    #[error("Stream failure: {0}")]
    Stream(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new RangeNotSatisfiable error for a resource of `size` bytes.
    pub fn range_not_satisfiable(size: u64) -> Self {
        Self::RangeNotSatisfiable { size }
    }

    /// Create a new Stream error.
    pub fn stream<S: Into<String>>(msg: S) -> Self {
        Self::Stream(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status code this error is reported with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::NotFound(_) => 404,
            Self::RangeNotSatisfiable { .. } => 416,
            Self::RateLimited => 429,
            Self::Stream(_) | Self::Internal(_) => 500,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
