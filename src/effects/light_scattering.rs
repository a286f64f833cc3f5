//! Light scattering: bias, radial scattering, blur, composite over the scene

use crate::effect::{Effect, EffectState, Lifecycle, StageMut, render_stages, resize_buffer};
use crate::error::VfxResult;
use crate::filters::{BiasFilter, BlurFilter, BlurType, CombineFilter, Filter, MultipassFilter, ScatteringFilter};
use crate::gpu::{BlendFunc, GraphicsContext, TargetHandle, TextureFormat};
use crate::ping_pong::DoubleBuffer;

/// Tuning for [`LightScatteringEffect`]
#[derive(Debug, Clone, PartialEq)]
pub struct LightScatteringSettings {
    pub name: String,
    pub blur_type: BlurType,
    pub blur_passes: u32,
    pub blur_amount: f32,
    pub bias: f32,
    pub base_intensity: f32,
    pub base_saturation: f32,
    pub scattering_intensity: f32,
    pub scattering_saturation: f32,
}

impl LightScatteringSettings {
    /// Settings using the default bilinear 5x5 blur at one texel spread
    pub fn simple(
        name: impl Into<String>,
        blur_passes: u32,
        bias: f32,
        base_intensity: f32,
        base_saturation: f32,
        scattering_intensity: f32,
        scattering_saturation: f32,
    ) -> Self {
        Self {
            name: name.into(),
            blur_type: BlurType::Gaussian5x5b,
            blur_passes,
            blur_amount: 0.0,
            bias,
            base_intensity,
            base_saturation,
            scattering_intensity,
            scattering_saturation,
        }
    }
}

impl Default for LightScatteringSettings {
    fn default() -> Self {
        Self::simple("default", 2, -0.9, 1.0, 1.0, 0.7, 1.0)
    }
}

pub struct LightScatteringEffect {
    lifecycle: Lifecycle,
    buffer: Option<DoubleBuffer>,
    format: TextureFormat,
    bias: BiasFilter,
    scattering: ScatteringFilter,
    blur: BlurFilter,
    combine: CombineFilter,
    settings: LightScatteringSettings,
    blend: Option<BlendFunc>,
}

impl LightScatteringEffect {
    /// `positions` packs one `(x, y)` pair per light, `angles` one view angle
    pub fn new(ctx: &mut dyn GraphicsContext, positions: &[f32], angles: &[f32]) -> VfxResult<Self> {
        let mut effect = Self {
            lifecycle: Lifecycle::new("light-scattering"),
            buffer: None,
            format: TextureFormat::default(),
            bias: BiasFilter::new(ctx)?,
            scattering: ScatteringFilter::new(ctx, positions, angles)?,
            blur: BlurFilter::new(ctx)?,
            combine: CombineFilter::new(ctx)?,
            settings: LightScatteringSettings::default(),
            blend: None,
        };
        effect.set_settings(LightScatteringSettings::default())?;
        Ok(effect)
    }

    /// Format of the intermediate targets; takes effect on the next allocation
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn set_settings(&mut self, settings: LightScatteringSettings) -> VfxResult<()> {
        self.bias.set_bias(settings.bias)?;
        self.combine.set_source1_intensity(settings.base_intensity)?;
        self.combine.set_source1_saturation(settings.base_saturation)?;
        self.combine.set_source2_intensity(settings.scattering_intensity)?;
        self.combine.set_source2_saturation(settings.scattering_saturation)?;
        self.blur.set_passes(settings.blur_passes)?;
        self.blur.set_amount(settings.blur_amount)?;
        self.blur.set_type(settings.blur_type)?;
        self.settings = settings;
        Ok(())
    }

    /// Settings last applied with [`set_settings`](Self::set_settings);
    /// individual setters do not update them
    pub fn settings(&self) -> &LightScatteringSettings {
        &self.settings
    }

    pub fn set_lights(&mut self, positions: &[f32], angles: &[f32]) -> VfxResult<()> {
        self.scattering.set_lights(positions, angles)
    }

    pub fn set_bias(&mut self, bias: f32) -> VfxResult<()> {
        self.bias.set_bias(bias)
    }

    pub fn set_base_intensity(&mut self, intensity: f32) -> VfxResult<()> {
        self.combine.set_source1_intensity(intensity)
    }

    pub fn set_base_saturation(&mut self, saturation: f32) -> VfxResult<()> {
        self.combine.set_source1_saturation(saturation)
    }

    pub fn set_scattering_intensity(&mut self, intensity: f32) -> VfxResult<()> {
        self.combine.set_source2_intensity(intensity)
    }

    pub fn set_scattering_saturation(&mut self, saturation: f32) -> VfxResult<()> {
        self.combine.set_source2_saturation(saturation)
    }

    pub fn set_blur_type(&mut self, blur_type: BlurType) -> VfxResult<()> {
        self.blur.set_type(blur_type)
    }

    pub fn set_blur_passes(&mut self, passes: u32) -> VfxResult<()> {
        self.blur.set_passes(passes)
    }

    pub fn set_blur_amount(&mut self, amount: f32) -> VfxResult<()> {
        self.blur.set_amount(amount)
    }

    pub fn set_decay(&mut self, decay: f32) -> VfxResult<()> {
        self.scattering.set_decay(decay)
    }

    pub fn set_density(&mut self, density: f32) -> VfxResult<()> {
        self.scattering.set_density(density)
    }

    pub fn set_weight(&mut self, weight: f32) -> VfxResult<()> {
        self.scattering.set_weight(weight)
    }

    pub fn set_num_samples(&mut self, samples: i32) -> VfxResult<()> {
        self.scattering.set_num_samples(samples)
    }

    /// Blends the final composite into the output with `func`
    pub fn enable_blending(&mut self, func: BlendFunc) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        self.blend = Some(func);
        Ok(())
    }

    pub fn disable_blending(&mut self) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        self.blend = None;
        Ok(())
    }

    pub fn blending(&self) -> Option<BlendFunc> {
        self.blend
    }

    pub fn bias(&self) -> f32 {
        self.bias.bias()
    }

    pub fn base_intensity(&self) -> f32 {
        self.combine.source1_intensity()
    }

    pub fn base_saturation(&self) -> f32 {
        self.combine.source1_saturation()
    }

    pub fn scattering_intensity(&self) -> f32 {
        self.combine.source2_intensity()
    }

    pub fn scattering_saturation(&self) -> f32 {
        self.combine.source2_saturation()
    }

    pub fn blur(&self) -> &BlurFilter {
        &self.blur
    }

    pub fn scattering(&self) -> &ScatteringFilter {
        &self.scattering
    }

    pub fn buffer(&self) -> Option<&DoubleBuffer> {
        self.buffer.as_ref()
    }
}

impl Effect for LightScatteringEffect {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn state(&self) -> EffectState {
        self.lifecycle.state()
    }

    fn resize(&mut self, ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        resize_buffer(ctx, &mut self.buffer, &mut self.lifecycle, width, height, self.format)?;
        self.bias.resize(width, height)?;
        self.scattering.resize(width, height)?;
        self.blur.resize(width, height)?;
        self.combine.resize(width, height)?;
        self.lifecycle.mark_ready();
        Ok(())
    }

    fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.rebind()?;
        }
        self.bias.rebind(ctx)?;
        self.scattering.rebind(ctx)?;
        self.blur.rebind(ctx)?;
        self.combine.rebind(ctx)
    }

    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: TargetHandle, output: TargetHandle) -> VfxResult<()> {
        self.lifecycle.check_ready()?;
        let mut stages = [
            StageMut::Filter(&mut self.bias),
            StageMut::Filter(&mut self.scattering),
            StageMut::Multipass(&mut self.blur),
            StageMut::Filter(&mut self.combine),
        ];
        render_stages(ctx, &mut stages, self.buffer.as_mut(), None, input, output, self.blend)
    }

    fn dispose(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        if let Some(mut buffer) = self.buffer.take() {
            buffer.dispose(ctx);
        }
        self.bias.dispose(ctx);
        self.scattering.dispose(ctx);
        self.blur.dispose(ctx);
        self.combine.dispose(ctx);
        self.lifecycle.mark_disposed();
        Ok(())
    }
}
