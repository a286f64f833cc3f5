//! Passthrough filter

use super::Filter;
use crate::error::VfxResult;
use crate::gpu::{GraphicsContext, shaders};
use crate::pass::{PRIMARY_INPUT, ShaderPass};

/// Copies its input into the bound target. Lands multipass results in an
/// effect's output.
#[derive(Debug)]
pub struct CopyFilter {
    pass: ShaderPass,
}

impl CopyFilter {
    pub fn new(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        Ok(Self {
            pass: ShaderPass::new(ctx, &shaders::copy(), &[], &[PRIMARY_INPUT])?,
        })
    }
}

impl Filter for CopyFilter {
    fn pass(&self) -> &ShaderPass {
        &self.pass
    }

    fn pass_mut(&mut self) -> &mut ShaderPass {
        &mut self.pass
    }
}
