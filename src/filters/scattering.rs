//! Screen-space light scattering ("god rays")

use super::{Filter, viewport};
use crate::error::{VfxError, VfxResult};
use crate::gpu::{GraphicsContext, shaders};
use crate::pass::{PRIMARY_INPUT, ShaderPass};
use crate::uniforms::ParamDecl;

/// Lights a single scattering pass can march towards
pub const MAX_LIGHTS: usize = 10;

pub const DEFAULT_DECAY: f32 = 0.96815;
pub const DEFAULT_DENSITY: f32 = 0.926;
pub const DEFAULT_WEIGHT: f32 = 0.58767;
pub const DEFAULT_NUM_SAMPLES: i32 = 100;

const PARAMS: &[ParamDecl] = &[
    ParamDecl::array("u_lightPositions", 2, MAX_LIGHTS),
    ParamDecl::array("u_lightViewAngles", 1, MAX_LIGHTS),
    ParamDecl::value("u_viewport"),
    ParamDecl::value("u_nLights"),
    ParamDecl::value("u_decay"),
    ParamDecl::value("u_density"),
    ParamDecl::value("u_weight"),
    ParamDecl::value("u_numSamples"),
];

#[derive(Debug)]
pub struct ScatteringFilter {
    pass: ShaderPass,
    positions: Vec<f32>,
    angles: Vec<f32>,
    decay: f32,
    density: f32,
    weight: f32,
    num_samples: i32,
}

impl ScatteringFilter {
    /// `positions` packs one `(x, y)` pair in [0, 1] per light; `angles`
    /// holds one view angle per light
    pub fn new(ctx: &mut dyn GraphicsContext, positions: &[f32], angles: &[f32]) -> VfxResult<Self> {
        let mut filter = Self {
            pass: ShaderPass::new(ctx, &shaders::light_scattering(), PARAMS, &[PRIMARY_INPUT])?,
            positions: Vec::new(),
            angles: Vec::new(),
            decay: DEFAULT_DECAY,
            density: DEFAULT_DENSITY,
            weight: DEFAULT_WEIGHT,
            num_samples: DEFAULT_NUM_SAMPLES,
        };
        filter.set_lights(positions, angles)?;
        filter.set_decay(DEFAULT_DECAY)?;
        filter.set_density(DEFAULT_DENSITY)?;
        filter.set_weight(DEFAULT_WEIGHT)?;
        filter.set_num_samples(DEFAULT_NUM_SAMPLES)?;
        Ok(filter)
    }

    pub fn set_lights(&mut self, positions: &[f32], angles: &[f32]) -> VfxResult<()> {
        if positions.len() != angles.len() * 2 {
            return Err(VfxError::invalid(format!(
                "{} light position component(s) for {} angle(s); expected {}",
                positions.len(),
                angles.len(),
                angles.len() * 2
            )));
        }
        if angles.len() > MAX_LIGHTS {
            return Err(VfxError::invalid(format!(
                "{} lights exceed the limit of {}",
                angles.len(),
                MAX_LIGHTS
            )));
        }
        self.pass.set_param("u_nLights", angles.len() as i32)?;
        self.pass.set_param("u_lightPositions", positions)?;
        self.pass.set_param("u_lightViewAngles", angles)?;
        self.positions = positions.to_vec();
        self.angles = angles.to_vec();
        Ok(())
    }

    pub fn set_decay(&mut self, decay: f32) -> VfxResult<()> {
        self.decay = decay;
        self.pass.set_param("u_decay", decay)
    }

    pub fn set_density(&mut self, density: f32) -> VfxResult<()> {
        self.density = density;
        self.pass.set_param("u_density", density)
    }

    pub fn set_weight(&mut self, weight: f32) -> VfxResult<()> {
        self.weight = weight;
        self.pass.set_param("u_weight", weight)
    }

    pub fn set_num_samples(&mut self, samples: i32) -> VfxResult<()> {
        self.num_samples = samples;
        self.pass.set_param("u_numSamples", samples)
    }

    pub fn light_count(&self) -> usize {
        self.angles.len()
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn angles(&self) -> &[f32] {
        &self.angles
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn num_samples(&self) -> i32 {
        self.num_samples
    }
}

impl Filter for ScatteringFilter {
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
