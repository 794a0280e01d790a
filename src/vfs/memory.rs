use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{FileProvider, VfsError};

/// In-memory file provider for tests and embedded effects.
///
/// Thread-safe and mutable even after being mounted in a [`Vfs`](super::Vfs).
///
/// # Example
///
/// ```ignore
/// let mem = MemoryProvider::new();
/// mem.insert("shaders/bloom.fx", source.as_bytes().to_vec());
///
/// let mut vfs = Vfs::new();
/// vfs.mount("builtin", mem);
/// ```
#[derive(Clone, Default)]
pub struct MemoryProvider {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryProvider {
    /// Create an empty in-memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file at the given path, overwriting any existing file.
    ///
    /// The path should use forward slashes and have no leading slash.
    pub fn insert(&self, path: impl Into<String>, data: Vec<u8>) {
        self.files.write().insert(path.into(), data);
    }

    /// Remove a file at the given path, returning its data if it existed.
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files.write().remove(path)
    }
}

impl FileProvider for MemoryProvider {
    fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    fn describe(&self, path: &str) -> String {
        format!("memory:{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_existing_file() {
        let mem = MemoryProvider::new();
        mem.insert("effect.fx", b"float a;".to_vec());
        assert_eq!(mem.read("effect.fx").unwrap(), b"float a;");
        assert!(mem.exists("effect.fx"));
    }

    #[test]
    fn read_missing_file() {
        let mem = MemoryProvider::new();
        assert!(matches!(mem.read("nope.fx"), Err(VfsError::NotFound(_))));
        assert!(!mem.exists("nope.fx"));
    }

    #[test]
    fn clones_share_storage() {
        let mem = MemoryProvider::new();
        let other = mem.clone();
        other.insert("late.fx", vec![1, 2, 3]);
        assert_eq!(mem.remove("late.fx"), Some(vec![1, 2, 3]));
        assert!(mem.remove("late.fx").is_none());
    }
}
