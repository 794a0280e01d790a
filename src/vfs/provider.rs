use super::VfsError;

/// Trait for file storage backends.
///
/// Paths passed to provider methods are already normalized by the
/// [`Vfs`](super::Vfs): forward slashes, no leading/trailing slashes, no `..`
/// or `.` segments.
pub trait FileProvider: Send + Sync + 'static {
    /// Read the entire contents of a file at the given path.
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError>;

    /// Check whether a file exists at the given path.
    fn exists(&self, path: &str) -> bool;

    /// Human readable location, used to build resolved paths.
    fn describe(&self, path: &str) -> String {
        path.to_string()
    }
}
