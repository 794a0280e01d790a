//! File resolution for effect sources and texture images.
//!
//! A [`Vfs`] holds an ordered list of named [`FileProvider`]s. A logical file
//! name is resolved either explicitly (`"builtin/bloom.fx"` selects the
//! provider mounted as `builtin`) or by searching every provider in mount
//! order.

mod error;
mod filesystem;
mod memory;
pub mod path;
mod provider;

pub use error::VfsError;
pub use filesystem::FileSystemProvider;
pub use memory::MemoryProvider;
pub use provider::FileProvider;

/// A resolved file: where it was found and its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsFile {
    /// Location the file was read from.
    pub path: String,
    pub data: Vec<u8>,
}

/// Ordered set of file providers.
#[derive(Default)]
pub struct Vfs {
    sources: Vec<(String, Box<dyn FileProvider>)>,
}

impl Vfs {
    /// Create an empty VFS with no mounted sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a provider under the given source name.
    ///
    /// Replaces a provider previously mounted under the same name, keeping
    /// its search position.
    pub fn mount(&mut self, name: impl Into<String>, provider: impl FileProvider) {
        let name = name.into();
        let provider: Box<dyn FileProvider> = Box::new(provider);
        match self.sources.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = provider,
            None => self.sources.push((name, provider)),
        }
    }

    /// Names of mounted sources in search order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|(name, _)| name.as_str())
    }

    /// Resolve a logical file name and read it.
    pub fn get_file(&self, name: &str) -> Result<VfsFile, VfsError> {
        let normalized = path::normalize(name)?;

        let (first, rest) = path::split_first(&normalized);
        if !rest.is_empty() {
            if let Some((_, provider)) = self.sources.iter().find(|(n, _)| n == first) {
                if provider.exists(rest) {
                    return Self::read_from(provider.as_ref(), rest);
                }
            }
        }

        for (_, provider) in &self.sources {
            if provider.exists(&normalized) {
                return Self::read_from(provider.as_ref(), &normalized);
            }
        }

        Err(VfsError::NotFound(normalized))
    }

    /// Whether a logical file name resolves.
    pub fn exists(&self, name: &str) -> bool {
        self.get_file(name).is_ok()
    }

    fn read_from(provider: &dyn FileProvider, path: &str) -> Result<VfsFile, VfsError> {
        let data = provider.read(path)?;
        log::trace!("Vfs: read {} ({} bytes)", provider.describe(path), data.len());
        Ok(VfsFile {
            path: provider.describe(path),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_order() {
        let first = MemoryProvider::new();
        first.insert("shared.fx", b"first".to_vec());
        let second = MemoryProvider::new();
        second.insert("shared.fx", b"second".to_vec());
        second.insert("only_second.fx", b"2".to_vec());

        let mut vfs = Vfs::new();
        vfs.mount("a", first);
        vfs.mount("b", second);

        assert_eq!(vfs.get_file("shared.fx").unwrap().data, b"first");
        assert_eq!(vfs.get_file("only_second.fx").unwrap().data, b"2");
        assert_eq!(vfs.sources().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn explicit_source_prefix() {
        let first = MemoryProvider::new();
        first.insert("shared.fx", b"first".to_vec());
        let second = MemoryProvider::new();
        second.insert("shared.fx", b"second".to_vec());

        let mut vfs = Vfs::new();
        vfs.mount("a", first);
        vfs.mount("b", second);

        let file = vfs.get_file("b/shared.fx").unwrap();
        assert_eq!(file.data, b"second");
        assert_eq!(file.path, "memory:shared.fx");
    }

    #[test]
    fn missing_and_invalid() {
        let vfs = Vfs::new();
        assert!(matches!(vfs.get_file("x.fx"), Err(VfsError::NotFound(_))));
        assert!(matches!(
            vfs.get_file("../x.fx"),
            Err(VfsError::InvalidPath(_))
        ));
        assert!(!vfs.exists("x.fx"));
    }

    #[test]
    fn remount_replaces_in_place() {
        let mut vfs = Vfs::new();
        vfs.mount("a", MemoryProvider::new());
        vfs.mount("b", MemoryProvider::new());
        let replacement = MemoryProvider::new();
        replacement.insert("x.fx", vec![]);
        vfs.mount("a", replacement);

        assert_eq!(vfs.sources().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(vfs.exists("x.fx"));
    }
}
