use thiserror::Error;

/// Errors raised while resolving effect and texture files.
#[derive(Debug, Error)]
pub enum VfsError {
    /// No mounted source has the path.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    /// Empty paths and paths escaping their root with `..`.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl From<std::io::Error> for VfsError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            VfsError::NotFound(err.to_string())
        } else {
            VfsError::Io(err)
        }
    }
}
