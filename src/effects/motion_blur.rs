//! Motion blur: each frame is blended with the previous output

use crate::effect::{Effect, EffectState, Lifecycle, resize_buffer};
use crate::error::{VfxError, VfxResult};
use crate::filters::{BlurFunction, CopyFilter, Filter, FilterInput, MotionBlurFilter};
use crate::gpu::{BlendFunc, GraphicsContext, TargetHandle, TextureFormat, with_target};
use crate::ping_pong::DoubleBuffer;

/// Keeps the last blended frame in its double buffer's source target.
///
/// The first frame after construction, resize or rebind has no history and
/// is blended with itself.
pub struct MotionBlurEffect {
    lifecycle: Lifecycle,
    buffer: Option<DoubleBuffer>,
    format: TextureFormat,
    motion: MotionBlurFilter,
    copy: CopyFilter,
    has_history: bool,
}

impl MotionBlurEffect {
    pub fn new(ctx: &mut dyn GraphicsContext, function: BlurFunction) -> VfxResult<Self> {
        Ok(Self {
            lifecycle: Lifecycle::new("motion-blur"),
            buffer: None,
            format: TextureFormat::default(),
            motion: MotionBlurFilter::new(ctx, function)?,
            copy: CopyFilter::new(ctx)?,
            has_history: false,
        })
    }

    /// Format of the history targets; takes effect on the next allocation
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn set_blur_opacity(&mut self, opacity: f32) -> VfxResult<()> {
        self.motion.set_blur_opacity(opacity)
    }

    pub fn blur_opacity(&self) -> f32 {
        self.motion.blur_opacity()
    }

    pub fn has_history(&self) -> bool {
        self.has_history
    }

    pub fn buffer(&self) -> Option<&DoubleBuffer> {
        self.buffer.as_ref()
    }

    fn blend_frame(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        input: TargetHandle,
        output: TargetHandle,
        final_blend: Option<BlendFunc>,
    ) -> VfxResult<()> {
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| VfxError::uninitialized(format!("effect '{}'", self.lifecycle.name())))?;

        let last = if self.has_history { Some(buffer.source()?) } else { None };
        self.motion.set_last_frame(last);

        buffer.begin(ctx)?;
        let drawn = self
            .motion
            .render(ctx, &FilterInput::single(input))
            .and_then(|_| buffer.capture(ctx));
        buffer.end(ctx);
        drawn?;

        let blended = buffer.source()?;
        ctx.set_blending(final_blend);
        with_target(ctx, output, |ctx| self.copy.render(ctx, &FilterInput::single(blended)))
    }
}

impl Effect for MotionBlurEffect {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn state(&self) -> EffectState {
        self.lifecycle.state()
    }

    fn resize(&mut self, ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        let unchanged = self
            .buffer
            .as_ref()
            .is_some_and(|b| b.is_valid() && b.size() == (width, height));
        if !unchanged {
            self.has_history = false;
        }
        resize_buffer(ctx, &mut self.buffer, &mut self.lifecycle, width, height, self.format)?;
        self.motion.resize(width, height)?;
        self.copy.resize(width, height)?;
        self.lifecycle.mark_ready();
        Ok(())
    }

    fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        self.has_history = false;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.rebind()?;
        }
        self.motion.rebind(ctx)?;
        self.copy.rebind(ctx)
    }

    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: TargetHandle, output: TargetHandle) -> VfxResult<()> {
        self.lifecycle.check_ready()?;
        if input == output {
            return Err(VfxError::invalid(format!(
                "input and output are the same target ({})",
                input.id()
            )));
        }
        if self.buffer.as_ref().is_some_and(|b| b.owns(input) || b.owns(output)) {
            return Err(VfxError::invalid("input or output aliases the history buffer"));
        }

        let saved_blend = ctx.blending();
        ctx.set_blending(None);
        let result = self.blend_frame(ctx, input, output, saved_blend);
        ctx.set_blending(saved_blend);
        self.has_history = result.is_ok();
        result
    }

    fn dispose(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        if let Some(mut buffer) = self.buffer.take() {
            buffer.dispose(ctx);
        }
        self.motion.dispose(ctx);
        self.copy.dispose(ctx);
        self.lifecycle.mark_disposed();
        Ok(())
    }
}
