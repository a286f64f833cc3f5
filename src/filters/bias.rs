//! Brightness threshold feeding the light-scattering chain

use super::Filter;
use crate::error::VfxResult;
use crate::gpu::{GraphicsContext, shaders};
use crate::pass::{PRIMARY_INPUT, ShaderPass};
use crate::uniforms::ParamDecl;

const PARAMS: &[ParamDecl] = &[ParamDecl::value("u_bias")];

/// Outputs `max(0, avg(rgb) + bias) * 50` on every channel
#[derive(Debug)]
pub struct BiasFilter {
    pass: ShaderPass,
    bias: f32,
}

impl BiasFilter {
    pub fn new(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        let mut filter = Self {
            pass: ShaderPass::new(ctx, &shaders::bias(), PARAMS, &[PRIMARY_INPUT])?,
            bias: 0.0,
        };
        filter.set_bias(0.0)?;
        Ok(filter)
    }

    pub fn set_bias(&mut self, bias: f32) -> VfxResult<()> {
        self.bias = bias;
        self.pass.set_param("u_bias", bias)
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }
}

impl Filter for BiasFilter {
    fn pass(&self) -> &ShaderPass {
        &self.pass
    }

    fn pass_mut(&mut self) -> &mut ShaderPass {
        &mut self.pass
    }
}
