//! Effects made of a single filter

use crate::effect::{Effect, EffectState, Lifecycle, StageMut, render_stages};
use crate::error::VfxResult;
use crate::filters::{FisheyeDistortionFilter, Filter, GrayscaleFilter, LensFlareFilter, NfaaFilter};
use crate::gpu::{BlendFunc, GraphicsContext, TargetHandle};

/// Wraps one filter; it draws straight from input to output with no
/// intermediate targets
pub struct FilterEffect<F> {
    lifecycle: Lifecycle,
    filter: F,
    blend: Option<BlendFunc>,
}

pub type GrayscaleEffect = FilterEffect<GrayscaleFilter>;
pub type FisheyeEffect = FilterEffect<FisheyeDistortionFilter>;
pub type NfaaEffect = FilterEffect<NfaaFilter>;
pub type LensFlareEffect = FilterEffect<LensFlareFilter>;

impl<F: Filter> FilterEffect<F> {
    pub fn new(filter: F) -> Self {
        Self {
            lifecycle: Lifecycle::new(filter.name().to_string()),
            filter,
            blend: None,
        }
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Typed access for setters; values apply on the next render
    pub fn filter_mut(&mut self) -> &mut F {
        &mut self.filter
    }

    pub fn set_blend(&mut self, blend: Option<BlendFunc>) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        self.blend = blend;
        Ok(())
    }
}

impl GrayscaleEffect {
    pub fn grayscale(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        Ok(Self::new(GrayscaleFilter::new(ctx)?))
    }
}

impl FisheyeEffect {
    pub fn fisheye(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        Ok(Self::new(FisheyeDistortionFilter::new(ctx)?))
    }
}

impl NfaaEffect {
    pub fn nfaa(ctx: &mut dyn GraphicsContext, support_alpha: bool) -> VfxResult<Self> {
        Ok(Self::new(NfaaFilter::new(ctx, support_alpha)?))
    }
}

impl LensFlareEffect {
    pub fn lens_flare(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        Ok(Self::new(LensFlareFilter::new(ctx)?))
    }
}

impl<F: Filter> Effect for FilterEffect<F> {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn state(&self) -> EffectState {
        self.lifecycle.state()
    }

    fn resize(&mut self, _ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        self.filter.resize(width, height)?;
        self.lifecycle.mark_ready();
        Ok(())
    }

    fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        self.filter.rebind(ctx)
    }

    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: TargetHandle, output: TargetHandle) -> VfxResult<()> {
        self.lifecycle.check_ready()?;
        let mut stages = [StageMut::Filter(&mut self.filter)];
        render_stages(ctx, &mut stages, None, None, input, output, self.blend)
    }

    fn dispose(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        self.filter.dispose(ctx);
        self.lifecycle.mark_disposed();
        Ok(())
    }
}
