//! Normal-filter anti-aliasing

use super::Filter;
use crate::error::VfxResult;
use crate::gpu::{GraphicsContext, shaders};
use crate::pass::{PRIMARY_INPUT, ShaderPass};
use crate::uniforms::ParamDecl;

const PARAMS: &[ParamDecl] = &[ParamDecl::value("u_viewportInverse")];

/// Smooths edges along the luma gradient. Without alpha support the output
/// is opaque.
#[derive(Debug)]
pub struct NfaaFilter {
    pass: ShaderPass,
    support_alpha: bool,
}

impl NfaaFilter {
    pub fn new(ctx: &mut dyn GraphicsContext, support_alpha: bool) -> VfxResult<Self> {
        Ok(Self {
            pass: ShaderPass::new(ctx, &shaders::nfaa(support_alpha), PARAMS, &[PRIMARY_INPUT])?,
            support_alpha,
        })
    }

    pub fn supports_alpha(&self) -> bool {
        self.support_alpha
    }
}

impl Filter for NfaaFilter {
    fn pass(&self) -> &ShaderPass {
        &self.pass
    }

    fn pass_mut(&mut self) -> &mut ShaderPass {
        &mut self.pass
    }

    fn resize(&mut self, width: u32, height: u32) -> VfxResult<()> {
        self.pass.resize(width, height)?;
        self.pass
            .set_param("u_viewportInverse", [1.0 / width as f32, 1.0 / height as f32])
    }
}
