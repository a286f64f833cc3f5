//! Post-processing effect chains over a pluggable graphics context
//!
//! Filters wrap a single [`ShaderPass`]; effects compose filters through a
//! [`DoubleBuffer`] and render one target into another. Everything talks to
//! the GPU through [`GraphicsContext`], implemented by [`WgpuContext`] for
//! real devices and by [`SoftwareContext`] on the CPU.

pub mod color;
pub mod effect;
pub mod effects;
pub mod error;
pub mod filters;
pub mod gpu;
pub mod pass;
pub mod ping_pong;
pub mod render;
pub mod uniforms;

pub use color::RGBA;
pub use effect::{ChainEffect, Effect, EffectState, Stage};
pub use effects::{
    FilterEffect, FisheyeEffect, GrayscaleEffect, LensFlareEffect, LightScatteringEffect, LightScatteringSettings,
    MotionBlurEffect, NfaaEffect,
};
pub use error::{VfxError, VfxResult};
pub use filters::{
    BiasFilter, BlurFilter, BlurFunction, BlurType, CombineFilter, ConvolveFilter, CopyFilter, Filter,
    FilterInput, FisheyeDistortionFilter, GrayscaleFilter, LensFlareFilter, MotionBlurFilter, MultipassFilter,
    NfaaFilter, ScatteringFilter,
};
pub use gpu::{
    BlendFactor, BlendFunc, GraphicsContext, ProgramSource, SoftwareContext, TargetHandle, TextureFormat,
    WgpuContext,
};
pub use pass::{ShaderPass, TextureInput};
pub use ping_pong::DoubleBuffer;
pub use render::{NormalizationMode, normalize, save_ppm};
pub use uniforms::{ParamDecl, UniformParameterSet, UniformValue};

#[cfg(test)]
mod tests;
