//! Two-source composite: the scene plus an overlay

use super::{Filter, FilterInput};
use crate::error::VfxResult;
use crate::gpu::{GraphicsContext, shaders};
use crate::pass::{PRIMARY_INPUT, SECONDARY_INPUT, ShaderPass};
use crate::uniforms::ParamDecl;

const PARAMS: &[ParamDecl] = &[
    ParamDecl::value("u_src1Intensity"),
    ParamDecl::value("u_src2Intensity"),
    ParamDecl::value("u_src1Saturation"),
    ParamDecl::value("u_src2Saturation"),
];

/// Scales and re-saturates both sources, then lays the second over the
/// first. Source 1 is the effect's original input on unit 0; source 2 is
/// the previous stage's output on unit 1.
#[derive(Debug)]
pub struct CombineFilter {
    pass: ShaderPass,
    intensity: [f32; 2],
    saturation: [f32; 2],
}

impl CombineFilter {
    pub fn new(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        let mut filter = Self {
            pass: ShaderPass::new(ctx, &shaders::combine(), PARAMS, &[PRIMARY_INPUT, SECONDARY_INPUT])?,
            intensity: [1.0, 1.0],
            saturation: [1.0, 1.0],
        };
        filter.set_source1_intensity(1.0)?;
        filter.set_source2_intensity(1.0)?;
        filter.set_source1_saturation(1.0)?;
        filter.set_source2_saturation(1.0)?;
        Ok(filter)
    }

    pub fn set_source1_intensity(&mut self, intensity: f32) -> VfxResult<()> {
        self.intensity[0] = intensity;
        self.pass.set_param("u_src1Intensity", intensity)
    }

    pub fn set_source2_intensity(&mut self, intensity: f32) -> VfxResult<()> {
        self.intensity[1] = intensity;
        self.pass.set_param("u_src2Intensity", intensity)
    }

    pub fn set_source1_saturation(&mut self, saturation: f32) -> VfxResult<()> {
        self.saturation[0] = saturation;
        self.pass.set_param("u_src1Saturation", saturation)
    }

    pub fn set_source2_saturation(&mut self, saturation: f32) -> VfxResult<()> {
        self.saturation[1] = saturation;
        self.pass.set_param("u_src2Saturation", saturation)
    }

    pub fn source1_intensity(&self) -> f32 {
        self.intensity[0]
    }

    pub fn source2_intensity(&self) -> f32 {
        self.intensity[1]
    }

    pub fn source1_saturation(&self) -> f32 {
        self.saturation[0]
    }

    pub fn source2_saturation(&self) -> f32 {
        self.saturation[1]
    }
}

impl Filter for CombineFilter {
    fn pass(&self) -> &ShaderPass {
        &self.pass
    }

    fn pass_mut(&mut self) -> &mut ShaderPass {
        &mut self.pass
    }

    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: &FilterInput) -> VfxResult<()> {
        self.pass.bind(ctx, &[input.original, input.source])?;
        self.pass.render(ctx)
    }
}
