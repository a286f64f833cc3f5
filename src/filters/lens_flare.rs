use super::{Filter, viewport};
use crate::error::VfxResult;
use crate::gpu::{GraphicsContext, shaders};
use crate::pass::{PRIMARY_INPUT, ShaderPass};
use crate::uniforms::ParamDecl;

const PARAMS: &[ParamDecl] = &[
    ParamDecl::value("u_lightPosition"),
    ParamDecl::value("u_intensity"),
    ParamDecl::value("u_color"),
    ParamDecl::value("u_viewport"),
];

/// Glow around a light source plus ghosts mirrored through the screen center
#[derive(Debug)]
pub struct LensFlareFilter {
    pass: ShaderPass,
    light_position: [f32; 2],
    intensity: f32,
    color: [f32; 3],
}

impl LensFlareFilter {
    pub fn new(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        let mut filter = Self {
            pass: ShaderPass::new(ctx, &shaders::lens_flare(), PARAMS, &[PRIMARY_INPUT])?,
            light_position: [0.5, 0.5],
            intensity: 5.0,
            color: [1.0, 0.8, 0.2],
        };
        filter.set_light_position(0.5, 0.5)?;
        filter.set_intensity(5.0)?;
        filter.set_color(1.0, 0.8, 0.2)?;
        Ok(filter)
    }

    /// Light position in texture coordinates
    pub fn set_light_position(&mut self, x: f32, y: f32) -> VfxResult<()> {
        self.light_position = [x, y];
        self.pass.set_param("u_lightPosition", [x, y])
    }

    pub fn set_intensity(&mut self, intensity: f32) -> VfxResult<()> {
        self.intensity = intensity;
        self.pass.set_param("u_intensity", intensity)
    }

    pub fn set_color(&mut self, r: f32, g: f32, b: f32) -> VfxResult<()> {
        self.color = [r, g, b];
        self.pass.set_param("u_color", [r, g, b])
    }

    pub fn light_position(&self) -> [f32; 2] {
        self.light_position
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn color(&self) -> [f32; 3] {
        self.color
    }
}

impl Filter for LensFlareFilter {
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
