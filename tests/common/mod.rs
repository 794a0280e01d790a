//! Common utilities for effect integration tests.
//!
//! Builds a [`Core`] over the dummy backend and an in-memory file system so
//! tests can compile effects, link parameters and drive activation without a
//! GPU.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use fxinject::backend::DummyBackend;
use fxinject::vfs::{MemoryProvider, Vfs};
use fxinject::{Binding, BindingArgument, Core, CoreConfig, Effect};

/// Effect with one technique that validates and one that needs shader model 5.
pub const TWO_TECHNIQUES: &str = r#"
    float4 tint = { 1, 1, 1, 1 };

    technique fancy < int shader_model = 5; >
    {
        pass p0 { AlphaBlendEnable = true; }
    }

    technique basic
    {
        pass p0 { CullMode = 2; ZEnable = false; }
        pass p1 { AlphaBlendEnable = true; }
    }
"#;

/// Install a test logger. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shared test setup: a core, its current binding and the attached backend.
pub struct TestContext {
    pub core: Core,
    pub binding: Arc<Binding>,
    pub backend: Arc<DummyBackend>,
    pub files: MemoryProvider,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_backend(DummyBackend::new(), CoreConfig::default())
    }

    pub fn with_backend(backend: DummyBackend, config: CoreConfig) -> Self {
        init_logging();

        let files = MemoryProvider::new();
        let mut vfs = Vfs::new();
        vfs.mount("memory", files.clone());

        let core = Core::with_files(config, vfs);
        let backend = Arc::new(backend);
        let binding = core.create_binding();
        binding
            .init(&[BindingArgument::Device(backend.clone())])
            .expect("dummy backend attaches");

        Self {
            core,
            binding,
            backend,
            files,
        }
    }

    /// Add a file to the in-memory file system.
    pub fn add_file(&self, path: &str, data: impl Into<Vec<u8>>) {
        self.files.insert(path, data.into());
    }

    pub fn compile(&self, source: &str) -> Arc<Effect> {
        self.binding
            .create_effect(source)
            .expect("effect compiles")
    }
}

/// Encode a solid-color RGBA image as PNG.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageOutputFormat::Png)
        .expect("png encodes");
    bytes.into_inner()
}
