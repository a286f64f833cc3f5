use super::{Filter, viewport};
use crate::error::VfxResult;
use crate::gpu::{GraphicsContext, shaders};
use crate::pass::{PRIMARY_INPUT, ShaderPass};
use crate::uniforms::ParamDecl;

const PARAMS: &[ParamDecl] = &[ParamDecl::value("u_viewport"), ParamDecl::value("u_amount")];

/// Largest distortion magnitude before the mapping folds over itself
pub const MAX_DISTORTION: f32 = 0.49;

/// Barrel (positive amount) or pincushion (negative) distortion around the
/// screen center
#[derive(Debug)]
pub struct FisheyeDistortionFilter {
    pass: ShaderPass,
    amount: f32,
}

impl FisheyeDistortionFilter {
    pub fn new(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        let mut filter = Self {
            pass: ShaderPass::new(ctx, &shaders::fisheye(), PARAMS, &[PRIMARY_INPUT])?,
            amount: 0.0,
        };
        filter.set_amount(0.2)?;
        Ok(filter)
    }

    /// Clamped to `±MAX_DISTORTION`
    pub fn set_amount(&mut self, amount: f32) -> VfxResult<()> {
        self.amount = amount.clamp(-MAX_DISTORTION, MAX_DISTORTION);
        self.pass.set_param("u_amount", self.amount)
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }
}

impl Filter for FisheyeDistortionFilter {
    fn pass(&self) -> &ShaderPass {
        &self.pass
    }

    fn pass_mut(&mut self) -> &mut ShaderPass {
        &mut self.pass
    }

    fn resize(&mut self, width: u32, height: u32) -> VfxResult<()> {
        self.pass.resize(width, height)?;
        self.pass.set_param("u_viewport", viewport(width, height))
    }
}
