//! Framework configuration.

use std::path::PathBuf;

use crate::backend::CompileFlags;

/// Default prefix of pass annotations naming render targets (`target0`..`target3`).
pub const DEFAULT_TARGET_ANNOTATION_PREFIX: &str = "target";

/// Configuration for a [`Core`](crate::Core) instance.
///
/// # Example
///
/// ```ignore
/// let config = CoreConfig::default()
///     .with_compile_flags(CompileFlags::DEBUG)
///     .with_search_path("./effects");
/// let core = Core::new(config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Flags passed to the effect compiler for every effect.
    pub compile_flags: CompileFlags,
    /// Prefix of the pass annotations that name render targets.
    pub target_annotation_prefix: String,
    /// Size of synthesized textures when neither a `size` annotation nor the
    /// back buffer size is available.
    pub fallback_texture_size: (u32, u32),
    /// Directories mounted into the file system, searched in order.
    pub search_paths: Vec<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            compile_flags: CompileFlags::empty(),
            target_annotation_prefix: DEFAULT_TARGET_ANNOTATION_PREFIX.to_string(),
            fallback_texture_size: (1024, 1024),
            search_paths: Vec::new(),
        }
    }
}

impl CoreConfig {
    pub fn with_compile_flags(mut self, flags: CompileFlags) -> Self {
        self.compile_flags = flags;
        self
    }

    pub fn with_target_annotation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_annotation_prefix = prefix.into();
        self
    }

    pub fn with_fallback_texture_size(mut self, width: u32, height: u32) -> Self {
        self.fallback_texture_size = (width, height);
        self
    }

    /// Append a directory to the file search path.
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Name of the annotation holding the render target for `slot`.
    pub fn target_annotation(&self, slot: usize) -> String {
        format!("{}{}", self.target_annotation_prefix, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.compile_flags, CompileFlags::empty());
        assert_eq!(config.target_annotation(2), "target2");
        assert!(config.search_paths.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = CoreConfig::default()
            .with_compile_flags(CompileFlags::DEBUG | CompileFlags::SKIP_OPTIMIZATION)
            .with_target_annotation_prefix("vs_target")
            .with_fallback_texture_size(256, 128)
            .with_search_path("effects")
            .with_search_path("textures");

        assert!(config.compile_flags.contains(CompileFlags::DEBUG));
        assert_eq!(config.target_annotation(0), "vs_target0");
        assert_eq!(config.fallback_texture_size, (256, 128));
        assert_eq!(config.search_paths.len(), 2);
    }
}
