//! Effects: ordered compositions of filters routed through a double buffer
//!
//! Every effect follows the same lifecycle. It starts `Uninitialized`, the
//! first `resize` makes it `Ready`, and `dispose` makes it `Disposed`, after
//! which every call fails without touching the graphics context.

use crate::error::{VfxError, VfxResult};
use crate::filters::{CopyFilter, Filter, FilterInput, MultipassFilter};
use crate::gpu::{BlendFunc, GraphicsContext, TargetHandle, TextureFormat, with_target};
use crate::ping_pong::DoubleBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    Uninitialized,
    Ready,
    Disposed,
}

/// State machine shared by every effect implementation
#[derive(Debug, Clone)]
pub struct Lifecycle {
    name: String,
    state: EffectState,
}

impl Lifecycle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: EffectState::Uninitialized,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> EffectState {
        self.state
    }

    /// Fails once disposed
    pub fn check_live(&self) -> VfxResult<()> {
        match self.state {
            EffectState::Disposed => Err(VfxError::disposed(format!("effect '{}'", self.name))),
            _ => Ok(()),
        }
    }

    /// Fails unless resized at least once and not disposed
    pub fn check_ready(&self) -> VfxResult<()> {
        match self.state {
            EffectState::Ready => Ok(()),
            EffectState::Uninitialized => Err(VfxError::uninitialized(format!("effect '{}'", self.name))),
            EffectState::Disposed => Err(VfxError::disposed(format!("effect '{}'", self.name))),
        }
    }

    pub fn mark_ready(&mut self) {
        if self.state == EffectState::Uninitialized {
            log::debug!("effect '{}' ready", self.name);
            self.state = EffectState::Ready;
        }
    }

    /// Back to `Uninitialized`, after the effect lost its buffers
    pub fn reset(&mut self) {
        if self.state == EffectState::Ready {
            self.state = EffectState::Uninitialized;
        }
    }

    pub fn mark_disposed(&mut self) {
        self.state = EffectState::Disposed;
    }
}

pub trait Effect {
    fn name(&self) -> &str;
    fn state(&self) -> EffectState;

    /// Sizes owned buffers and passes; the first call makes the effect ready
    fn resize(&mut self, ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> VfxResult<()>;

    /// Restores GPU state after a context loss
    fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()>;

    /// Renders `input` into `output`. Neither is modified other than
    /// `output`, and the caller's bound target and blend state are restored.
    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: TargetHandle, output: TargetHandle) -> VfxResult<()>;

    fn dispose(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()>;

    fn is_disposed(&self) -> bool {
        self.state() == EffectState::Disposed
    }
}

/// One step of an effect
pub enum Stage {
    Filter(Box<dyn Filter>),
    Multipass(Box<dyn MultipassFilter>),
    Effect(Box<dyn Effect>),
}

impl Stage {
    pub fn as_stage_mut(&mut self) -> StageMut<'_> {
        match self {
            Stage::Filter(f) => StageMut::Filter(&mut **f),
            Stage::Multipass(m) => StageMut::Multipass(&mut **m),
            Stage::Effect(e) => StageMut::Effect(&mut **e),
        }
    }
}

/// Borrowed stage, so effects holding concrete filter types share the runner
pub enum StageMut<'a> {
    Filter(&'a mut dyn Filter),
    Multipass(&'a mut dyn MultipassFilter),
    Effect(&'a mut dyn Effect),
}

impl StageMut<'_> {
    pub fn name(&self) -> &str {
        match self {
            StageMut::Filter(f) => f.name(),
            StageMut::Multipass(m) => m.name(),
            StageMut::Effect(e) => e.name(),
        }
    }

    pub fn resize(&mut self, ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> VfxResult<()> {
        match self {
            StageMut::Filter(f) => f.resize(width, height),
            StageMut::Multipass(m) => m.resize(width, height),
            StageMut::Effect(e) => e.resize(ctx, width, height),
        }
    }

    pub fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        match self {
            StageMut::Filter(f) => f.rebind(ctx),
            StageMut::Multipass(m) => m.rebind(ctx),
            StageMut::Effect(e) => e.rebind(ctx),
        }
    }

    pub fn dispose(&mut self, ctx: &mut dyn GraphicsContext) {
        match self {
            StageMut::Filter(f) => f.dispose(ctx),
            StageMut::Multipass(m) => m.dispose(ctx),
            StageMut::Effect(e) => {
                if let Err(err) = e.dispose(ctx) {
                    log::warn!("nested effect '{}': {}", e.name(), err);
                }
            }
        }
    }
}

/// Whether a run of stages has to route intermediates through a buffer
pub fn needs_buffer(stages: &[StageMut<'_>]) -> bool {
    stages.len() > 1 || stages.iter().any(|s| matches!(s, StageMut::Multipass(_)))
}

/// Allocates or resizes an effect's buffer.
///
/// When the buffer ends up without targets it is dropped and the effect
/// falls back to `Uninitialized`.
pub fn resize_buffer(
    ctx: &mut dyn GraphicsContext,
    slot: &mut Option<DoubleBuffer>,
    lifecycle: &mut Lifecycle,
    width: u32,
    height: u32,
    format: TextureFormat,
) -> VfxResult<()> {
    let result = if let Some(buffer) = slot.as_mut() {
        buffer.resize(ctx, width, height).map(|_| ())
    } else {
        DoubleBuffer::new(ctx, width, height, format).map(|buffer| {
            *slot = Some(buffer);
        })
    };
    if result.is_err() && !slot.as_ref().is_some_and(DoubleBuffer::is_valid) {
        if let Some(mut lost) = slot.take() {
            lost.dispose(ctx);
        }
        lifecycle.reset();
    }
    result
}

fn check_targets(buffer: Option<&DoubleBuffer>, input: TargetHandle, output: TargetHandle) -> VfxResult<()> {
    if input == output {
        return Err(VfxError::invalid(format!(
            "input and output are the same target ({})",
            input.id()
        )));
    }
    if let Some(buffer) = buffer {
        if buffer.owns(input) || buffer.owns(output) {
            return Err(VfxError::invalid("input or output aliases an intermediate buffer"));
        }
    }
    Ok(())
}

/// Runs `stages` in order from `input` to `output`.
///
/// A lone filter draws straight into `output`. Otherwise each stage but the
/// last writes the buffer's result target and captures it; the last stage
/// writes `output`, through `copy` when it is a multipass filter.
/// Intermediates are drawn with blending off; the last draw uses
/// `final_blend`, falling back to the caller's blend state.
pub fn render_stages(
    ctx: &mut dyn GraphicsContext,
    stages: &mut [StageMut<'_>],
    buffer: Option<&mut DoubleBuffer>,
    copy: Option<&mut CopyFilter>,
    input: TargetHandle,
    output: TargetHandle,
    final_blend: Option<BlendFunc>,
) -> VfxResult<()> {
    check_targets(buffer.as_deref(), input, output)?;

    let saved_blend = ctx.blending();
    ctx.set_blending(None);
    let result = route(ctx, stages, buffer, copy, input, output, final_blend.or(saved_blend));
    ctx.set_blending(saved_blend);
    result
}

fn route(
    ctx: &mut dyn GraphicsContext,
    stages: &mut [StageMut<'_>],
    buffer: Option<&mut DoubleBuffer>,
    copy: Option<&mut CopyFilter>,
    input: TargetHandle,
    output: TargetHandle,
    final_blend: Option<BlendFunc>,
) -> VfxResult<()> {
    match stages {
        [] => {
            let copy = copy.ok_or_else(|| VfxError::invalid("effect has no stages"))?;
            ctx.set_blending(final_blend);
            return with_target(ctx, output, |ctx| copy.render(ctx, &FilterInput::single(input)));
        }
        [StageMut::Filter(filter)] => {
            ctx.set_blending(final_blend);
            return with_target(ctx, output, |ctx| filter.render(ctx, &FilterInput::single(input)));
        }
        [StageMut::Effect(effect)] => {
            ctx.set_blending(final_blend);
            return effect.render(ctx, input, output);
        }
        _ => {}
    }

    let buffer = buffer.ok_or_else(|| VfxError::invalid("multi-stage effect has no double buffer"))?;
    buffer.begin(ctx)?;
    let result = route_buffered(ctx, stages, buffer, copy, input, output, final_blend);
    buffer.end(ctx);
    result
}

fn route_buffered(
    ctx: &mut dyn GraphicsContext,
    stages: &mut [StageMut<'_>],
    buffer: &mut DoubleBuffer,
    copy: Option<&mut CopyFilter>,
    input: TargetHandle,
    output: TargetHandle,
    final_blend: Option<BlendFunc>,
) -> VfxResult<()> {
    let last = stages.len() - 1;
    let mut reading = input;
    for (i, stage) in stages.iter_mut().enumerate() {
        let frame = FilterInput {
            source: reading,
            original: input,
        };
        match stage {
            StageMut::Filter(filter) if i == last => {
                buffer.end(ctx);
                ctx.set_blending(final_blend);
                return with_target(ctx, output, |ctx| filter.render(ctx, &frame));
            }
            StageMut::Filter(filter) => {
                filter.render(ctx, &frame)?;
                buffer.capture(ctx)?;
            }
            StageMut::Multipass(filter) => {
                filter.render(ctx, &frame, buffer)?;
                if i == last {
                    buffer.end(ctx);
                    let copy = copy.ok_or_else(|| VfxError::invalid("multipass result has no copy pass"))?;
                    let result = buffer.source()?;
                    ctx.set_blending(final_blend);
                    return with_target(ctx, output, |ctx| copy.render(ctx, &FilterInput::single(result)));
                }
            }
            StageMut::Effect(effect) if i == last => {
                buffer.end(ctx);
                ctx.set_blending(final_blend);
                return effect.render(ctx, reading, output);
            }
            StageMut::Effect(effect) => {
                effect.render(ctx, reading, buffer.result()?)?;
                buffer.capture(ctx)?;
            }
        }
        reading = buffer.source()?;
    }
    Ok(())
}

/// Generic ordered chain of filters, multipass filters and nested effects
pub struct ChainEffect {
    lifecycle: Lifecycle,
    stages: Vec<Stage>,
    buffer: Option<DoubleBuffer>,
    copy: CopyFilter,
    format: TextureFormat,
    blend: Option<BlendFunc>,
    // Last size every stage accepted
    size: Option<(u32, u32)>,
}

impl ChainEffect {
    pub fn new(ctx: &mut dyn GraphicsContext, name: impl Into<String>) -> VfxResult<Self> {
        Ok(Self {
            lifecycle: Lifecycle::new(name),
            stages: Vec::new(),
            buffer: None,
            copy: CopyFilter::new(ctx)?,
            format: TextureFormat::default(),
            blend: None,
            size: None,
        })
    }

    /// Format of the intermediate targets; takes effect on the next allocation
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.stages.push(Stage::Filter(Box::new(filter)));
        self
    }

    pub fn with_multipass(mut self, filter: impl MultipassFilter + 'static) -> Self {
        self.stages.push(Stage::Multipass(Box::new(filter)));
        self
    }

    pub fn with_effect(mut self, effect: impl Effect + 'static) -> Self {
        self.stages.push(Stage::Effect(Box::new(effect)));
        self
    }

    /// Appends a stage. The chain must be resized again before it renders.
    pub fn push(&mut self, stage: Stage) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        self.stages.push(stage);
        self.lifecycle.reset();
        Ok(())
    }

    /// Blend function for the final draw into the output
    pub fn set_blend(&mut self, blend: Option<BlendFunc>) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        self.blend = blend;
        Ok(())
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn buffer(&self) -> Option<&DoubleBuffer> {
        self.buffer.as_ref()
    }
}

impl Effect for ChainEffect {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn state(&self) -> EffectState {
        self.lifecycle.state()
    }

    /// Resizes the buffer, then every stage. When a stage fails, the buffer
    /// and the stages before it go back to the last committed size.
    fn resize(&mut self, ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        let mut stages: Vec<StageMut<'_>> = self.stages.iter_mut().map(Stage::as_stage_mut).collect();
        let buffered = needs_buffer(&stages);
        if buffered {
            resize_buffer(ctx, &mut self.buffer, &mut self.lifecycle, width, height, self.format)?;
        }
        for i in 0..stages.len() {
            let Err(err) = stages[i].resize(ctx, width, height) else {
                continue;
            };
            log::warn!(
                "chain '{}': stage '{}' failed to resize to {}x{}: {}",
                self.lifecycle.name(),
                stages[i].name(),
                width,
                height,
                err
            );
            if let Some((w, h)) = self.size {
                for done in stages[..i].iter_mut() {
                    if let Err(e) = done.resize(ctx, w, h) {
                        log::warn!("stage '{}' could not return to {}x{}: {}", done.name(), w, h, e);
                    }
                }
                if buffered {
                    // A buffer that cannot be restored resets the chain
                    let _ = resize_buffer(ctx, &mut self.buffer, &mut self.lifecycle, w, h, self.format);
                }
            }
            return Err(err);
        }
        self.copy.resize(width, height)?;
        self.size = Some((width, height));
        self.lifecycle.mark_ready();
        Ok(())
    }

    fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.rebind()?;
        }
        for stage in self.stages.iter_mut() {
            stage.as_stage_mut().rebind(ctx)?;
        }
        self.copy.rebind(ctx)
    }

    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: TargetHandle, output: TargetHandle) -> VfxResult<()> {
        self.lifecycle.check_ready()?;
        let mut stages: Vec<StageMut<'_>> = self.stages.iter_mut().map(Stage::as_stage_mut).collect();
        render_stages(
            ctx,
            &mut stages,
            self.buffer.as_mut(),
            Some(&mut self.copy),
            input,
            output,
            self.blend,
        )
    }

    fn dispose(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.lifecycle.check_live()?;
        if let Some(mut buffer) = self.buffer.take() {
            buffer.dispose(ctx);
        }
        for stage in self.stages.iter_mut() {
            stage.as_stage_mut().dispose(ctx);
        }
        self.copy.dispose(ctx);
        self.lifecycle.mark_disposed();
        Ok(())
    }
}
