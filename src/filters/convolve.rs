//! Separable 1D convolution

use super::Filter;
use crate::error::{VfxError, VfxResult};
use crate::gpu::{GraphicsContext, shaders};
use crate::pass::{PRIMARY_INPUT, ShaderPass};
use crate::uniforms::ParamDecl;

/// Most taps a single convolution pass can sample
pub const MAX_CONVOLVE_TAPS: usize = 5;

const PARAMS: &[ParamDecl] = &[
    ParamDecl::value("u_length"),
    ParamDecl::array("u_sampleWeights", 1, MAX_CONVOLVE_TAPS),
    ParamDecl::array("u_sampleOffsets", 2, MAX_CONVOLVE_TAPS),
];

/// Weighted sum of taps at fixed offsets from each pixel
#[derive(Debug)]
pub struct ConvolveFilter {
    pass: ShaderPass,
    weights: Vec<f32>,
    offsets: Vec<f32>,
}

impl ConvolveFilter {
    pub fn new(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        Ok(Self {
            pass: ShaderPass::new(ctx, &shaders::convolve_1d(), PARAMS, &[PRIMARY_INPUT])?,
            weights: Vec::new(),
            offsets: Vec::new(),
        })
    }

    /// Sets the taps: one weight and one `(dx, dy)` offset in texture
    /// coordinates per tap
    pub fn set_kernel(&mut self, weights: &[f32], offsets: &[f32]) -> VfxResult<()> {
        if offsets.len() != weights.len() * 2 {
            return Err(VfxError::invalid(format!(
                "{} weight(s) need {} offset components, got {}",
                weights.len(),
                weights.len() * 2,
                offsets.len()
            )));
        }
        if weights.len() > MAX_CONVOLVE_TAPS {
            return Err(VfxError::invalid(format!(
                "{} taps exceed the limit of {}",
                weights.len(),
                MAX_CONVOLVE_TAPS
            )));
        }
        self.pass.set_param("u_length", weights.len() as i32)?;
        self.pass.set_param("u_sampleWeights", weights)?;
        self.pass.set_param("u_sampleOffsets", offsets)?;
        self.weights = weights.to_vec();
        self.offsets = offsets.to_vec();
        Ok(())
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn offsets(&self) -> &[f32] {
        &self.offsets
    }
}

impl Filter for ConvolveFilter {
    fn pass(&self) -> &ShaderPass {
        &self.pass
    }

    fn pass_mut(&mut self) -> &mut ShaderPass {
        &mut self.pass
    }
}
