//! Screen-space filters
//!
//! A [`Filter`] is one [`ShaderPass`] plus typed state. It renders into
//! whatever target is bound. A [`MultipassFilter`] renders through a
//! [`DoubleBuffer`] the caller has begun and leaves its output in the
//! buffer's source target.

pub mod bias;
pub mod blur;
pub mod combine;
pub mod convolve;
pub mod copy;
pub mod fisheye;
pub mod grayscale;
pub mod lens_flare;
pub mod motion_blur;
pub mod nfaa;
pub mod scattering;

pub use bias::BiasFilter;
pub use blur::{BlurFilter, BlurType};
pub use combine::CombineFilter;
pub use convolve::{ConvolveFilter, MAX_CONVOLVE_TAPS};
pub use copy::CopyFilter;
pub use fisheye::FisheyeDistortionFilter;
pub use grayscale::GrayscaleFilter;
pub use lens_flare::LensFlareFilter;
pub use motion_blur::{BlurFunction, MotionBlurFilter};
pub use nfaa::NfaaFilter;
pub use scattering::{MAX_LIGHTS, ScatteringFilter};

use crate::error::VfxResult;
use crate::gpu::{GraphicsContext, TargetHandle};
use crate::pass::ShaderPass;
use crate::ping_pong::DoubleBuffer;

/// Textures available to a filter while it renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterInput {
    /// Output of the previous stage (the effect input for the first stage)
    pub source: TargetHandle,
    /// The effect's own input, for filters compositing over the scene
    pub original: TargetHandle,
}

impl FilterInput {
    /// Input for a filter rendered on its own
    pub fn single(source: TargetHandle) -> Self {
        Self {
            source,
            original: source,
        }
    }
}

pub trait Filter {
    fn pass(&self) -> &ShaderPass;
    fn pass_mut(&mut self) -> &mut ShaderPass;

    fn name(&self) -> &str {
        self.pass().name()
    }

    /// Records the viewport; filters with resolution uniforms restage them
    fn resize(&mut self, width: u32, height: u32) -> VfxResult<()> {
        self.pass_mut().resize(width, height)
    }

    fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.pass_mut().rebind(ctx).map(|_| ())
    }

    /// Binds `input.source` on unit 0 and draws into the bound target
    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: &FilterInput) -> VfxResult<()> {
        let pass = self.pass_mut();
        pass.bind(ctx, &[input.source])?;
        pass.render(ctx)
    }

    fn dispose(&mut self, ctx: &mut dyn GraphicsContext) {
        self.pass_mut().dispose(ctx);
    }
}

pub trait MultipassFilter {
    fn name(&self) -> &str;
    fn resize(&mut self, width: u32, height: u32) -> VfxResult<()>;
    fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()>;

    /// Renders `input.source` through the active `buffer`. On return the
    /// output is in `buffer.source()` and `buffer.result()` is bound.
    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: &FilterInput, buffer: &mut DoubleBuffer) -> VfxResult<()>;

    fn dispose(&mut self, ctx: &mut dyn GraphicsContext);
}

/// Viewport size as a `vec2` uniform value
pub(crate) fn viewport(width: u32, height: u32) -> [f32; 2] {
    [width as f32, height as f32]
}
