//! Error types for the effect engine.

use thiserror::Error;

use crate::backend::BackendError;
use crate::vfs::VfsError;

/// Result code returned by every fallible engine operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FxError {
    /// A null, malformed, mistyped or out-of-range argument.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// The operation was invoked outside of its required state.
    #[error("invalid call: {0}")]
    InvalidCall(String),
    /// The native graphics collaborator rejected the operation.
    #[error("graphics API error: {0}")]
    ApiError(String),
    /// A name lookup missed.
    #[error("not found: {0}")]
    NotFound(String),
}

pub type FxResult<T> = Result<T, FxError>;

impl From<BackendError> for FxError {
    fn from(err: BackendError) -> Self {
        FxError::ApiError(err.to_string())
    }
}

impl From<VfsError> for FxError {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::NotFound(path) => FxError::NotFound(path),
            VfsError::InvalidPath(reason) => FxError::InvalidParams(reason),
            other => FxError::ApiError(other.to_string()),
        }
    }
}
