use super::{Filter, FilterInput};
use crate::error::VfxResult;
use crate::gpu::{GraphicsContext, ProgramSource, TargetHandle, shaders};
use crate::pass::{PRIMARY_INPUT, SECONDARY_INPUT, ShaderPass};
use crate::uniforms::ParamDecl;

const PARAMS: &[ParamDecl] = &[ParamDecl::value("u_blurOpacity")];

pub const DEFAULT_BLUR_OPACITY: f32 = 0.5;

/// How the previous frame is folded into the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlurFunction {
    /// Per-channel maximum of the current frame and the faded last frame
    Max,
    /// Linear mix towards the last frame
    #[default]
    Mix,
}

impl BlurFunction {
    fn program(self) -> ProgramSource {
        match self {
            BlurFunction::Max => shaders::motion_blur_max(),
            BlurFunction::Mix => shaders::motion_blur_mix(),
        }
    }
}

#[derive(Debug)]
pub struct MotionBlurFilter {
    pass: ShaderPass,
    function: BlurFunction,
    opacity: f32,
    last_frame: Option<TargetHandle>,
}

impl MotionBlurFilter {
    pub fn new(ctx: &mut dyn GraphicsContext, function: BlurFunction) -> VfxResult<Self> {
        let mut filter = Self {
            pass: ShaderPass::new(ctx, &function.program(), PARAMS, &[PRIMARY_INPUT, SECONDARY_INPUT])?,
            function,
            opacity: DEFAULT_BLUR_OPACITY,
            last_frame: None,
        };
        filter.set_blur_opacity(DEFAULT_BLUR_OPACITY)?;
        Ok(filter)
    }

    pub fn set_blur_opacity(&mut self, opacity: f32) -> VfxResult<()> {
        self.opacity = opacity;
        self.pass.set_param("u_blurOpacity", opacity)
    }

    /// Frame blended into the input; `None` blends the input with itself
    pub fn set_last_frame(&mut self, frame: Option<TargetHandle>) {
        self.last_frame = frame;
    }

    pub fn blur_opacity(&self) -> f32 {
        self.opacity
    }

    pub fn function(&self) -> BlurFunction {
        self.function
    }

    pub fn last_frame(&self) -> Option<TargetHandle> {
        self.last_frame
    }
}

impl Filter for MotionBlurFilter {
    fn pass(&self) -> &ShaderPass {
        &self.pass
    }

    fn pass_mut(&mut self) -> &mut ShaderPass {
        &mut self.pass
    }

    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: &FilterInput) -> VfxResult<()> {
        let last = self.last_frame.unwrap_or(input.source);
        self.pass.bind(ctx, &[input.source, last])?;
        self.pass.render(ctx)
    }
}
