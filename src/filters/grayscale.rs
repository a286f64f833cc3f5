use super::Filter;
use crate::error::VfxResult;
use crate::gpu::{GraphicsContext, shaders};
use crate::pass::{PRIMARY_INPUT, ShaderPass};
use crate::uniforms::ParamDecl;

const PARAMS: &[ParamDecl] = &[ParamDecl::value("u_amount")];

/// Mixes the luma of each pixel over its color
#[derive(Debug)]
pub struct GrayscaleFilter {
    pass: ShaderPass,
    amount: f32,
}

impl GrayscaleFilter {
    pub fn new(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        let mut filter = Self {
            pass: ShaderPass::new(ctx, &shaders::grayscale(), PARAMS, &[PRIMARY_INPUT])?,
            amount: 1.0,
        };
        filter.set_amount(1.0)?;
        Ok(filter)
    }

    /// 0 keeps the color, 1 is fully gray
    pub fn set_amount(&mut self, amount: f32) -> VfxResult<()> {
        self.amount = amount;
        self.pass.set_param("u_amount", amount)
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }
}

impl Filter for GrayscaleFilter {
    fn pass(&self) -> &ShaderPass {
        &self.pass
    }

    fn pass_mut(&mut self) -> &mut ShaderPass {
        &mut self.pass
    }
}
