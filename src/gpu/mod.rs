//! Graphics-context boundary and its two backends
//!
//! Passes, buffers and effects only talk to the GPU through
//! [`GraphicsContext`]. [`WgpuContext`] drives a real device through wgpu;
//! [`SoftwareContext`] evaluates the same programs on the CPU and is what
//! the test suite renders with.

pub mod context;
pub mod kernels;
pub mod pipelines;
pub mod shaders;
pub mod software;

use std::borrow::Cow;

use crate::color::RGBA;
use crate::error::VfxResult;
use crate::uniforms::{ParamDecl, UniformValue};

pub use context::WgpuContext;
pub use software::{ContextStats, SoftwareContext};

/// Number of texture units a program can sample from
pub const MAX_TEXTURE_UNITS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub(crate) u32);

impl TargetHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Slot index of a uniform inside a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    Rgba16Float,
}

impl TextureFormat {
    /// Whether stored values are clamped to [0, 1]
    pub fn is_normalized(self) -> bool {
        matches!(self, TextureFormat::Rgba8Unorm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

impl BlendFactor {
    /// Per-channel factor for a source/destination pair
    pub fn weights(self, src: RGBA, dst: RGBA) -> RGBA {
        match self {
            BlendFactor::Zero => RGBA::transparent(),
            BlendFactor::One => RGBA::new(1.0, 1.0, 1.0, 1.0),
            BlendFactor::SrcColor => src,
            BlendFactor::OneMinusSrcColor => RGBA::new(1.0 - src.r, 1.0 - src.g, 1.0 - src.b, 1.0 - src.a),
            BlendFactor::SrcAlpha => RGBA::new(src.a, src.a, src.a, src.a),
            BlendFactor::OneMinusSrcAlpha => {
                let f = 1.0 - src.a;
                RGBA::new(f, f, f, f)
            }
            BlendFactor::DstColor => dst,
            BlendFactor::OneMinusDstColor => RGBA::new(1.0 - dst.r, 1.0 - dst.g, 1.0 - dst.b, 1.0 - dst.a),
            BlendFactor::DstAlpha => RGBA::new(dst.a, dst.a, dst.a, dst.a),
            BlendFactor::OneMinusDstAlpha => {
                let f = 1.0 - dst.a;
                RGBA::new(f, f, f, f)
            }
        }
    }
}

/// Additive blend equation `src * src_factor + dst * dst_factor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    pub const ALPHA: BlendFunc = BlendFunc {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };

    pub const ADDITIVE: BlendFunc = BlendFunc {
        src: BlendFactor::One,
        dst: BlendFactor::One,
    };

    pub fn apply(self, src: RGBA, dst: RGBA) -> RGBA {
        src.modulate(self.src.weights(src, dst)) + dst.modulate(self.dst.weights(src, dst))
    }
}

/// Compile-time constant injected ahead of the fragment stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDefine {
    pub name: String,
    pub value: String,
}

/// Source text of one program: a vertex and a fragment stage.
///
/// `name` identifies the program to backends that cannot compile text (the
/// software backend resolves it to a registered kernel).
#[derive(Debug, Clone)]
pub struct ProgramSource {
    pub name: String,
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
    pub defines: Vec<ShaderDefine>,
}

impl ProgramSource {
    pub fn new(
        name: impl Into<String>,
        vertex: impl Into<Cow<'static, str>>,
        fragment: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            defines: Vec::new(),
        }
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push(ShaderDefine {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn define(&self, name: &str) -> Option<&str> {
        self.defines
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }
}

/// Everything the effect engine needs from the graphics layer.
///
/// Implementations are single-threaded: every call happens on the thread
/// owning the device.
pub trait GraphicsContext {
    /// Compiles and links a program whose uniforms are `params`
    fn compile_program(&mut self, source: &ProgramSource, params: &[ParamDecl]) -> VfxResult<ProgramHandle>;
    fn destroy_program(&mut self, program: ProgramHandle);
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn set_uniform(&mut self, program: ProgramHandle, location: UniformLocation, value: &UniformValue) -> VfxResult<()>;

    /// Allocates an offscreen color target
    fn create_target(&mut self, width: u32, height: u32, format: TextureFormat) -> VfxResult<TargetHandle>;
    fn destroy_target(&mut self, target: TargetHandle);
    fn target_size(&self, target: TargetHandle) -> Option<(u32, u32)>;

    /// Makes `target` the destination of subsequent draws (`None` unbinds)
    fn bind_target(&mut self, target: Option<TargetHandle>);
    fn bound_target(&self) -> Option<TargetHandle>;
    fn bind_texture(&mut self, unit: u32, target: TargetHandle) -> VfxResult<()>;
    fn unbind_texture(&mut self, unit: u32);

    fn set_blending(&mut self, blend: Option<BlendFunc>);
    fn blending(&self) -> Option<BlendFunc>;

    /// Draws a full-viewport quad with `program` into the bound target
    fn draw_quad(&mut self, program: ProgramHandle) -> VfxResult<()>;

    fn write_pixels(&mut self, target: TargetHandle, pixels: &[RGBA]) -> VfxResult<()>;
    fn read_pixels(&mut self, target: TargetHandle) -> VfxResult<Vec<RGBA>>;
}

/// Runs `f` with `target` bound, then restores the previous binding
pub fn with_target<R>(
    ctx: &mut dyn GraphicsContext,
    target: TargetHandle,
    f: impl FnOnce(&mut dyn GraphicsContext) -> VfxResult<R>,
) -> VfxResult<R> {
    let previous = ctx.bound_target();
    ctx.bind_target(Some(target));
    let result = f(&mut *ctx);
    ctx.bind_target(previous);
    result
}
