use std::path::PathBuf;

use super::{FileProvider, VfsError};

/// File provider reading from a directory on disk.
///
/// The root path is joined with the logical path to form the actual
/// filesystem path. Path traversal is prevented by the normalization in
/// [`Vfs`](super::Vfs), which rejects `..` segments before they reach the
/// provider.
pub struct FileSystemProvider {
    root: PathBuf,
}

impl FileSystemProvider {
    /// Create a provider rooted at the given directory.
    ///
    /// The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl FileProvider for FileSystemProvider {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        Ok(std::fs::read(self.resolve(path))?)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn describe(&self, path: &str) -> String {
        self.resolve(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fxinject_vfs_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn read_from_disk() {
        let root = temp_root("read");
        std::fs::write(root.join("a.fx"), b"technique t { }").unwrap();

        let provider = FileSystemProvider::new(&root);
        assert!(provider.exists("a.fx"));
        assert_eq!(provider.read("a.fx").unwrap(), b"technique t { }");
        assert!(matches!(provider.read("b.fx"), Err(VfsError::NotFound(_))));

        std::fs::remove_dir_all(root).unwrap();
    }
}
