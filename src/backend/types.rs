//! Common types shared between the engine and native backends

use std::collections::BTreeMap;

use bitflags::bitflags;
use glam::Vec4;

use crate::backend::traits::{NativeHandle, TextureHandle};

/// Number of render target slots a pass can write.
pub const MAX_RENDER_TARGETS: usize = 4;

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    R8Unorm,
    R16Float,
    R32Float,
    Rg16Float,
    Rg32Float,
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth24PlusStencil8,
    Depth32Float,
}

impl TextureFormat {
    /// Parse a format name as written in effect annotations.
    ///
    /// Accepts the legacy effect-file spellings (`A8R8G8B8`, `A16B16G16R16F`,
    /// ...) as well as this crate's own canonical names, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let format = match upper.as_str() {
            "L8" | "R8" | "R8UNORM" => Self::R8Unorm,
            "R16F" | "R16FLOAT" => Self::R16Float,
            "R32F" | "R32FLOAT" => Self::R32Float,
            "G16R16F" | "RG16FLOAT" => Self::Rg16Float,
            "G32R32F" | "RG32FLOAT" => Self::Rg32Float,
            "A8B8G8R8" | "X8B8G8R8" | "RGBA8UNORM" => Self::Rgba8Unorm,
            "RGBA8UNORMSRGB" => Self::Rgba8UnormSrgb,
            "A8R8G8B8" | "X8R8G8B8" | "BGRA8UNORM" => Self::Bgra8Unorm,
            "A16B16G16R16F" | "RGBA16FLOAT" => Self::Rgba16Float,
            "A32B32G32R32F" | "RGBA32FLOAT" => Self::Rgba32Float,
            "D24S8" | "DEPTH24PLUSSTENCIL8" => Self::Depth24PlusStencil8,
            "D32F" | "D32F_LOCKABLE" | "DEPTH32FLOAT" => Self::Depth32Float,
            _ => return None,
        };
        Some(format)
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32Float)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float => 2,
            Self::R32Float
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rg32Float | Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    #[default]
    D2,
    Cube,
    Volume,
}

/// Size of a texture in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3d {
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Number of levels in a full mip chain down to 1x1x1.
    pub fn full_mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        32 - largest.leading_zeros()
    }
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_DST = 1 << 0;
        const TEXTURE_BINDING = 1 << 1;
        const RENDER_ATTACHMENT = 1 << 2;
        /// Driver generates the lower mip levels.
        const AUTOGEN_MIPMAPS = 1 << 3;
    }
}

/// Texture descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub kind: TextureKind,
    pub size: Extent3d,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Sampled 2D texture with a single mip level.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            kind: TextureKind::D2,
            size: Extent3d::new_2d(width, height),
            mip_levels: 1,
            format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        }
    }

    /// Cube texture with square faces of `edge` texels.
    pub fn new_cube(edge: u32, format: TextureFormat) -> Self {
        Self {
            kind: TextureKind::Cube,
            size: Extent3d::new_2d(edge, edge),
            ..Self::new_2d(edge, edge, format)
        }
    }

    /// Volume texture.
    pub fn new_volume(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            kind: TextureKind::Volume,
            size: Extent3d::new_3d(width, height, depth),
            ..Self::new_2d(width, height, format)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_levels(mut self, levels: u32) -> Self {
        self.mip_levels = levels;
        self
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn is_render_target(&self) -> bool {
        self.usage.contains(TextureUsage::RENDER_ATTACHMENT)
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::new_2d(1, 1, TextureFormat::default())
    }
}

/// Value kind of an effect parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Bool,
    /// Float vector with up to four components.
    Float,
    Int,
    String,
    /// Texture or sampler reference.
    Texture,
}

impl ParameterKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Int => "int",
            Self::String => "string",
            Self::Texture => "texture",
        }
    }
}

/// Type and shape of an effect parameter. Immutable once a parameter exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterDesc {
    pub kind: ParameterKind,
    pub rows: u32,
    pub columns: u32,
    /// Array length, zero for non-arrays.
    pub elements: u32,
}

impl ParameterDesc {
    pub fn new(kind: ParameterKind) -> Self {
        Self {
            kind,
            rows: 1,
            columns: 1,
            elements: 0,
        }
    }

    pub fn bool() -> Self {
        Self::new(ParameterKind::Bool)
    }

    pub fn int() -> Self {
        Self::new(ParameterKind::Int)
    }

    pub fn string() -> Self {
        Self::new(ParameterKind::String)
    }

    pub fn texture() -> Self {
        Self::new(ParameterKind::Texture)
    }

    /// Float vector with `columns` components (1..=4).
    pub fn float(columns: u32) -> Self {
        Self {
            columns,
            ..Self::new(ParameterKind::Float)
        }
    }

    pub fn with_elements(mut self, elements: u32) -> Self {
        self.elements = elements;
        self
    }
}

/// Value stored in a native effect slot.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Bool(bool),
    Float(Vec4),
    Int(i32),
    String(String),
    Texture(Option<TextureHandle>),
}

impl NativeValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Bool(_) => ParameterKind::Bool,
            Self::Float(_) => ParameterKind::Float,
            Self::Int(_) => ParameterKind::Int,
            Self::String(_) => ParameterKind::String,
            Self::Texture(_) => ParameterKind::Texture,
        }
    }

    /// Zeroed value of the given kind.
    pub fn zeroed(kind: ParameterKind) -> Self {
        match kind {
            ParameterKind::Bool => Self::Bool(false),
            ParameterKind::Float => Self::Float(Vec4::ZERO),
            ParameterKind::Int => Self::Int(0),
            ParameterKind::String => Self::String(String::new()),
            ParameterKind::Texture => Self::Texture(None),
        }
    }
}

/// Metadata attached to a parameter, technique or pass.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i32),
    Vector(Vec<f32>),
    String(String),
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vec<f32>> {
        match self {
            Self::Vector(v) => Some(v.clone()),
            Self::Int(i) => Some(vec![*i as f32]),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Vector(v) if v.len() == 1 => Some(v[0] as i32),
            _ => None,
        }
    }
}

bitflags! {
    /// Flags passed to the effect compiler.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompileFlags: u32 {
        const DEBUG = 1 << 0;
        const SKIP_VALIDATION = 1 << 1;
        const SKIP_OPTIMIZATION = 1 << 2;
        const PARTIAL_PRECISION = 1 << 3;
    }
}

/// Snapshot of the device render state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderState {
    /// Named fixed-function states.
    pub states: BTreeMap<String, u32>,
    /// Bound render targets; `None` selects the back buffer.
    pub targets: [Option<TextureHandle>; MAX_RENDER_TARGETS],
}

/// Top-level counts reflected from a compiled effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectDesc {
    pub parameters: u32,
    pub techniques: u32,
}

/// Reflected description of one effect parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeParameterDesc {
    pub name: String,
    pub desc: ParameterDesc,
}

/// Reflected description of one technique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueDesc {
    pub name: String,
    pub passes: u32,
}

/// Reflected description of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDesc {
    pub name: String,
    pub vertex_shader: Option<NativeHandle>,
    pub pixel_shader: Option<NativeHandle>,
}
