//! Tests for passes, buffers and effects, rendered on the software context

use crate::effect::{ChainEffect, Effect, EffectState};
use crate::effects::{FisheyeEffect, GrayscaleEffect, LensFlareEffect, LightScatteringEffect, MotionBlurEffect, NfaaEffect};
use crate::error::{VfxError, VfxResult};
use crate::filters::{
    BiasFilter, BlurFilter, BlurFunction, BlurType, CombineFilter, CopyFilter, Filter, FisheyeDistortionFilter,
    GrayscaleFilter, MultipassFilter, ScatteringFilter,
};
use crate::gpu::{BlendFunc, GraphicsContext, ProgramSource, SoftwareContext, TargetHandle, TextureFormat, kernels, shaders};
use crate::pass::{ShaderPass, TextureInput};
use crate::ping_pong::DoubleBuffer;
use crate::render::{NormalizationMode, normalize, write_ppm};
use crate::uniforms::UniformValue;
use crate::RGBA;

const EPS: f32 = 1.0 / 255.0;

fn red() -> RGBA {
    RGBA::new(1.0, 0.0, 0.0, 1.0)
}

fn blue() -> RGBA {
    RGBA::new(0.0, 0.0, 1.0, 1.0)
}

/// Input filled with `color` plus an empty output of the same size
fn io_pair(ctx: &mut SoftwareContext, width: u32, height: u32, color: RGBA) -> (TargetHandle, TargetHandle) {
    let input = ctx.create_filled_target(width, height, color).unwrap();
    let output = ctx.create_target(width, height, TextureFormat::Rgba8Unorm).unwrap();
    (input, output)
}

fn assert_all_near(pixels: &[RGBA], expected: RGBA, tolerance: f32) {
    for (i, px) in pixels.iter().enumerate() {
        assert!(
            px.max_abs_diff(expected) <= tolerance,
            "pixel {} is {:?}, expected {:?}",
            i,
            px,
            expected
        );
    }
}

/// Vertical gradient with a bright band, so blurs and biases have work to do
fn gradient(width: u32, height: u32) -> Vec<RGBA> {
    (0..width * height)
        .map(|i| {
            let y = (i / width) as f32 / height as f32;
            if (0.4..0.6).contains(&y) {
                RGBA::new(1.0, 1.0, 0.9, 1.0)
            } else {
                RGBA::new(0.2 * y, 0.3, 0.4 * (1.0 - y), 1.0)
            }
        })
        .collect()
}

fn bloom_chain(ctx: &mut SoftwareContext) -> ChainEffect {
    let mut bias = BiasFilter::new(ctx).unwrap();
    bias.set_bias(-0.5).unwrap();
    ChainEffect::new(ctx, "bloom")
        .unwrap()
        .with_multipass(BlurFilter::new(ctx).unwrap())
        .with_filter(bias)
        .with_filter(CombineFilter::new(ctx).unwrap())
}

/// Grayscale effect that runs out of memory when resized wider than `max_width`
struct CappedEffect {
    inner: GrayscaleEffect,
    max_width: u32,
}

impl Effect for CappedEffect {
    fn name(&self) -> &str {
        "capped"
    }

    fn state(&self) -> EffectState {
        self.inner.state()
    }

    fn resize(&mut self, ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> VfxResult<()> {
        if width > self.max_width {
            return Err(VfxError::allocation(format!("no room for {}x{}", width, height)));
        }
        self.inner.resize(ctx, width, height)
    }

    fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.inner.rebind(ctx)
    }

    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: TargetHandle, output: TargetHandle) -> VfxResult<()> {
        self.inner.render(ctx, input, output)
    }

    fn dispose(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.inner.dispose(ctx)
    }
}

// ---------------------------------------------------------------------------
// Parameters and passes
// ---------------------------------------------------------------------------

#[test]
fn test_flush_without_changes_issues_no_uploads() {
    let mut ctx = SoftwareContext::new();
    let mut filter = GrayscaleFilter::new(&mut ctx).unwrap();

    // u_amount is staged by the constructor
    assert_eq!(filter.pass_mut().flush(&mut ctx).unwrap(), 1);

    let before = ctx.stats();
    assert_eq!(filter.pass_mut().flush(&mut ctx).unwrap(), 0);
    assert_eq!(ctx.stats(), before);
}

#[test]
fn test_setters_batch_until_render() {
    let mut ctx = SoftwareContext::new();
    let mut effect = GrayscaleEffect::grayscale(&mut ctx).unwrap();
    let (input, output) = io_pair(&mut ctx, 4, 4, red());
    effect.resize(&mut ctx, 4, 4).unwrap();
    effect.render(&mut ctx, input, output).unwrap();

    ctx.clear_upload_trace();
    effect.filter_mut().set_amount(0.1).unwrap();
    effect.filter_mut().set_amount(0.2).unwrap();
    effect.filter_mut().set_amount(0.3).unwrap();
    assert!(ctx.upload_trace().is_empty());

    effect.render(&mut ctx, input, output).unwrap();
    assert_eq!(ctx.upload_trace(), ["u_amount"]);

    let program = effect.filter().pass().program().unwrap();
    assert_eq!(ctx.uniform_value(program, "u_amount"), Some(&UniformValue::Float(0.3)));

    ctx.clear_upload_trace();
    effect.render(&mut ctx, input, output).unwrap();
    assert!(ctx.upload_trace().is_empty());
}

#[test]
fn test_unknown_parameter_is_rejected() {
    let mut ctx = SoftwareContext::new();
    let mut filter = GrayscaleFilter::new(&mut ctx).unwrap();
    let err = filter.pass_mut().set_param("u_missing", 1.0).unwrap_err();
    assert!(matches!(err, VfxError::UnknownParameter { ref key, .. } if key == "u_missing"));
    assert!(err.is_usage_error());
}

#[test]
fn test_parameter_shape_mismatch() {
    let mut ctx = SoftwareContext::new();
    let mut scattering = ScatteringFilter::new(&mut ctx, &[0.5, 0.5], &[0.0]).unwrap();
    let err = scattering
        .pass_mut()
        .set_param("u_lightPositions", vec![0.5, 0.5, 0.5])
        .unwrap_err();
    assert!(matches!(err, VfxError::ShapeMismatch { stride: 2, len: 3, .. }));

    let mut gray = GrayscaleFilter::new(&mut ctx).unwrap();
    let err = gray.pass_mut().set_param("u_amount", vec![1.0, 0.0]).unwrap_err();
    assert!(matches!(err, VfxError::ShapeMismatch { .. }));
}

#[test]
fn test_texture_unit_collision() {
    let mut ctx = SoftwareContext::new();
    let inputs = [TextureInput::new("u_base", 0), TextureInput::new("u_overlay", 0)];
    let err = ShaderPass::new(&mut ctx, &shaders::combine(), &[], &inputs).unwrap_err();
    assert!(matches!(err, VfxError::TextureUnitCollision { unit: 0, .. }));
    // Nothing was compiled
    assert_eq!(ctx.live_programs(), 0);
}

#[test]
fn test_unknown_program_fails_to_compile() {
    let mut ctx = SoftwareContext::new();
    let source = ProgramSource::new("no-such-program", shaders::SCREENSPACE_VERT, "");
    let err = ShaderPass::new(&mut ctx, &source, &[], &[]).unwrap_err();
    assert!(matches!(err, VfxError::ShaderCompile { ref program, .. } if program == "no-such-program"));
    assert!(!err.is_usage_error());
}

#[test]
fn test_pass_render_before_resize() {
    let mut ctx = SoftwareContext::new();
    let mut copy = CopyFilter::new(&mut ctx).unwrap();
    let (input, output) = io_pair(&mut ctx, 2, 2, red());
    ctx.bind_target(Some(output));
    let err = copy.render(&mut ctx, &crate::filters::FilterInput::single(input)).unwrap_err();
    assert!(matches!(err, VfxError::Uninitialized { .. }));
}

#[test]
fn test_pass_bind_rejects_extra_textures() {
    let mut ctx = SoftwareContext::new();
    let mut copy = CopyFilter::new(&mut ctx).unwrap();
    let (a, b) = io_pair(&mut ctx, 2, 2, red());
    let err = copy.pass_mut().bind(&mut ctx, &[a, b]).unwrap_err();
    assert!(matches!(err, VfxError::InvalidArgument(_)));
}

#[test]
fn test_disposed_pass() {
    let mut ctx = SoftwareContext::new();
    let mut copy = CopyFilter::new(&mut ctx).unwrap();
    copy.dispose(&mut ctx);
    copy.dispose(&mut ctx);
    assert_eq!(ctx.stats().programs_destroyed, 1);
    assert!(matches!(copy.pass_mut().rebind(&mut ctx), Err(VfxError::Disposed { .. })));
}

// ---------------------------------------------------------------------------
// Double buffer
// ---------------------------------------------------------------------------

#[test]
fn test_double_buffer_capture_swaps() {
    let mut ctx = SoftwareContext::new();
    let mut buffer = DoubleBuffer::new(&mut ctx, 8, 8, TextureFormat::Rgba8Unorm).unwrap();

    let source = buffer.source().unwrap();
    let result = buffer.result().unwrap();
    assert_ne!(source, result);

    buffer.capture(&mut ctx).unwrap();
    assert_eq!(buffer.source().unwrap(), result);
    assert_eq!(buffer.result().unwrap(), source);

    buffer.capture(&mut ctx).unwrap();
    assert_eq!(buffer.source().unwrap(), source);
}

#[test]
fn test_double_buffer_begin_end_restores_binding() {
    let mut ctx = SoftwareContext::new();
    let screen = ctx.create_target(4, 4, TextureFormat::Rgba8Unorm).unwrap();
    let mut buffer = DoubleBuffer::new(&mut ctx, 4, 4, TextureFormat::Rgba8Unorm).unwrap();
    ctx.bind_target(Some(screen));

    buffer.begin(&mut ctx).unwrap();
    assert_eq!(ctx.bound_target(), Some(buffer.result().unwrap()));
    assert!(matches!(buffer.begin(&mut ctx), Err(VfxError::InvalidArgument(_))));

    buffer.capture(&mut ctx).unwrap();
    assert_eq!(ctx.bound_target(), Some(buffer.result().unwrap()));

    buffer.end(&mut ctx);
    assert_eq!(ctx.bound_target(), Some(screen));
    // Ending twice leaves the binding alone
    buffer.end(&mut ctx);
    assert_eq!(ctx.bound_target(), Some(screen));
}

#[test]
fn test_double_buffer_same_size_resize_is_free() {
    let mut ctx = SoftwareContext::new();
    let mut buffer = DoubleBuffer::new(&mut ctx, 16, 16, TextureFormat::Rgba8Unorm).unwrap();
    ctx.reset_stats();

    assert!(!buffer.resize(&mut ctx, 16, 16).unwrap());
    assert_eq!(ctx.stats().targets_created, 0);
    assert_eq!(ctx.stats().targets_destroyed, 0);

    assert!(buffer.resize(&mut ctx, 32, 8).unwrap());
    assert_eq!(buffer.size(), (32, 8));
    assert_eq!(ctx.target_size(buffer.source().unwrap()), Some((32, 8)));
    assert_eq!(ctx.live_targets(), 2);
}

#[test]
fn test_double_buffer_failed_resize_keeps_old_size() {
    let mut ctx = SoftwareContext::new();
    let mut buffer = DoubleBuffer::new(&mut ctx, 16, 16, TextureFormat::Rgba8Unorm).unwrap();

    let err = buffer.resize(&mut ctx, 0, 16).unwrap_err();
    assert!(matches!(err, VfxError::ResourceAllocation(_)));
    assert!(buffer.is_valid());
    assert_eq!(buffer.size(), (16, 16));
    assert_eq!(ctx.target_size(buffer.source().unwrap()), Some((16, 16)));
}

#[test]
fn test_double_buffer_dispose() {
    let mut ctx = SoftwareContext::new();
    let mut buffer = DoubleBuffer::new(&mut ctx, 4, 4, TextureFormat::Rgba16Float).unwrap();
    buffer.dispose(&mut ctx);
    assert_eq!(ctx.live_targets(), 0);
    assert!(matches!(buffer.source(), Err(VfxError::Disposed { .. })));
    assert!(matches!(buffer.resize(&mut ctx, 8, 8), Err(VfxError::Disposed { .. })));
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

#[test]
fn test_grayscale_of_red() {
    let mut ctx = SoftwareContext::new();
    let mut effect = GrayscaleEffect::grayscale(&mut ctx).unwrap();
    let (input, output) = io_pair(&mut ctx, 100, 100, red());

    effect.resize(&mut ctx, 100, 100).unwrap();
    effect.render(&mut ctx, input, output).unwrap();

    let pixels = ctx.read_pixels(output).unwrap();
    assert_eq!(pixels.len(), 100 * 100);
    assert_all_near(&pixels, RGBA::new(0.299, 0.299, 0.299, 1.0), EPS);
}

#[test]
fn test_partial_grayscale() {
    let mut ctx = SoftwareContext::new();
    let mut effect = GrayscaleEffect::grayscale(&mut ctx).unwrap();
    effect.filter_mut().set_amount(0.5).unwrap();
    let (input, output) = io_pair(&mut ctx, 8, 8, red());

    effect.resize(&mut ctx, 8, 8).unwrap();
    effect.render(&mut ctx, input, output).unwrap();

    let expected = RGBA::new(1.0 - 0.701 * 0.5, 0.299 * 0.5, 0.299 * 0.5, 1.0);
    assert_all_near(ctx.pixels(output).unwrap(), expected, EPS);
}

#[test]
fn test_render_before_resize() {
    let mut ctx = SoftwareContext::new();
    let mut effect = GrayscaleEffect::grayscale(&mut ctx).unwrap();
    let (input, output) = io_pair(&mut ctx, 4, 4, red());

    assert_eq!(effect.state(), EffectState::Uninitialized);
    let err = effect.render(&mut ctx, input, output).unwrap_err();
    assert!(matches!(err, VfxError::Uninitialized { .. }));
    assert_eq!(ctx.stats().draws, 0);
}

#[test]
fn test_render_into_own_input() {
    let mut ctx = SoftwareContext::new();
    let mut chain = bloom_chain(&mut ctx);
    let (input, _) = io_pair(&mut ctx, 8, 8, red());
    chain.resize(&mut ctx, 8, 8).unwrap();

    let err = chain.render(&mut ctx, input, input).unwrap_err();
    assert!(matches!(err, VfxError::InvalidArgument(_)));

    // The chain's own intermediates are off limits too
    let intermediate = chain.buffer().unwrap().source().unwrap();
    let err = chain.render(&mut ctx, input, intermediate).unwrap_err();
    assert!(matches!(err, VfxError::InvalidArgument(_)));
}

#[test]
fn test_chain_resize_then_render() {
    let mut ctx = SoftwareContext::new();
    let mut chain = bloom_chain(&mut ctx);

    chain.resize(&mut ctx, 800, 600).unwrap();
    assert_eq!(chain.buffer().unwrap().size(), (800, 600));
    chain.resize(&mut ctx, 1920, 1080).unwrap();
    assert_eq!(chain.buffer().unwrap().size(), (1920, 1080));
    assert_eq!(chain.state(), EffectState::Ready);

    let input = ctx.create_target(1920, 1080, TextureFormat::Rgba8Unorm).unwrap();
    let output = ctx.create_target(1920, 1080, TextureFormat::Rgba8Unorm).unwrap();
    let scene = gradient(1920, 1080);
    ctx.write_pixels(input, &scene).unwrap();

    chain.render(&mut ctx, input, output).unwrap();

    assert_eq!(ctx.pixels(input).unwrap(), scene.as_slice());
    let pixels = ctx.read_pixels(output).unwrap();
    assert_eq!(pixels.len(), 1920 * 1080);
    // The bright band survives the composite
    let center = pixels[540 * 1920 + 960];
    assert!(center.r > 0.9 && center.g > 0.9, "center is {:?}", center);
}

#[test]
fn test_single_filter_chain_needs_no_buffer() {
    let mut ctx = SoftwareContext::new();
    let mut chain = ChainEffect::new(&mut ctx, "gray")
        .unwrap()
        .with_filter(GrayscaleFilter::new(&mut ctx).unwrap());
    let (input, output) = io_pair(&mut ctx, 8, 8, red());

    chain.resize(&mut ctx, 8, 8).unwrap();
    assert!(chain.buffer().is_none());

    ctx.reset_stats();
    chain.render(&mut ctx, input, output).unwrap();
    assert_eq!(ctx.stats().draws, 1);
    assert_all_near(ctx.pixels(output).unwrap(), RGBA::new(0.299, 0.299, 0.299, 1.0), EPS);
}

#[test]
fn test_nested_effect_in_chain() {
    let mut ctx = SoftwareContext::new();
    let mut chain = ChainEffect::new(&mut ctx, "copy-then-gray")
        .unwrap()
        .with_filter(CopyFilter::new(&mut ctx).unwrap())
        .with_effect(GrayscaleEffect::grayscale(&mut ctx).unwrap());
    let (input, output) = io_pair(&mut ctx, 16, 16, red());

    chain.resize(&mut ctx, 16, 16).unwrap();
    chain.render(&mut ctx, input, output).unwrap();

    assert_all_near(ctx.pixels(output).unwrap(), RGBA::new(0.299, 0.299, 0.299, 1.0), EPS);
    assert_all_near(ctx.pixels(input).unwrap(), red(), 0.0);
}

#[test]
fn test_chain_ending_in_multipass_copies_out() {
    let mut ctx = SoftwareContext::new();
    let mut chain = ChainEffect::new(&mut ctx, "blur")
        .unwrap()
        .with_multipass(BlurFilter::new(&mut ctx).unwrap());
    let (input, output) = io_pair(&mut ctx, 16, 16, blue());

    chain.resize(&mut ctx, 16, 16).unwrap();
    ctx.reset_stats();
    chain.render(&mut ctx, input, output).unwrap();

    // horizontal, vertical, copy
    assert_eq!(ctx.stats().draws, 3);
    // A flat color is a fixed point of a normalized blur
    assert_all_near(ctx.pixels(output).unwrap(), blue(), 2.0 * EPS);
}

#[test]
fn test_render_restores_caller_state() {
    let mut ctx = SoftwareContext::new();
    let mut chain = bloom_chain(&mut ctx);
    let screen = ctx.create_target(8, 8, TextureFormat::Rgba8Unorm).unwrap();
    let (input, output) = io_pair(&mut ctx, 8, 8, red());
    chain.resize(&mut ctx, 8, 8).unwrap();

    ctx.set_blending(Some(BlendFunc::ALPHA));
    ctx.bind_target(Some(screen));
    chain.render(&mut ctx, input, output).unwrap();

    assert_eq!(ctx.blending(), Some(BlendFunc::ALPHA));
    assert_eq!(ctx.bound_target(), Some(screen));
}

#[test]
fn test_effect_blend_applies_to_final_draw() {
    let mut ctx = SoftwareContext::new();
    let mut effect = GrayscaleEffect::grayscale(&mut ctx).unwrap();
    effect.set_blend(Some(BlendFunc::ADDITIVE)).unwrap();
    let input = ctx.create_filled_target(4, 4, RGBA::new(0.0, 0.0, 0.0, 1.0)).unwrap();
    let output = ctx.create_filled_target(4, 4, RGBA::new(0.25, 0.5, 0.75, 0.0)).unwrap();

    effect.resize(&mut ctx, 4, 4).unwrap();
    effect.render(&mut ctx, input, output).unwrap();

    // Black added over the existing output keeps its color
    assert_all_near(ctx.pixels(output).unwrap(), RGBA::new(0.25, 0.5, 0.75, 1.0), EPS);
    assert_eq!(ctx.blending(), None);
}

#[test]
fn test_dispose_then_rebind_touches_nothing() {
    let mut ctx = SoftwareContext::new();
    let mut chain = bloom_chain(&mut ctx);
    chain.resize(&mut ctx, 8, 8).unwrap();

    chain.dispose(&mut ctx).unwrap();
    assert_eq!(chain.state(), EffectState::Disposed);
    assert_eq!(ctx.live_programs(), 0);
    assert_eq!(ctx.live_targets(), 0);

    ctx.reset_stats();
    assert!(matches!(chain.rebind(&mut ctx), Err(VfxError::Disposed { .. })));
    assert!(matches!(chain.resize(&mut ctx, 4, 4), Err(VfxError::Disposed { .. })));
    assert!(matches!(chain.dispose(&mut ctx), Err(VfxError::Disposed { .. })));
    assert_eq!(ctx.stats().total_calls(), 0);
}

#[test]
fn test_context_loss_and_rebind() {
    let mut ctx = SoftwareContext::new();
    let mut effect = GrayscaleEffect::grayscale(&mut ctx).unwrap();
    effect.filter_mut().set_amount(0.5).unwrap();
    let (input, output) = io_pair(&mut ctx, 4, 4, red());
    effect.resize(&mut ctx, 4, 4).unwrap();
    effect.render(&mut ctx, input, output).unwrap();

    let program = effect.filter().pass().program().unwrap();
    ctx.simulate_context_loss();
    assert_eq!(ctx.uniform_value(program, "u_amount"), None);

    effect.rebind(&mut ctx).unwrap();
    assert_eq!(ctx.uniform_value(program, "u_amount"), Some(&UniformValue::Float(0.5)));

    // Content was lost with the context; refill and render again
    ctx.write_pixels(input, &[red(); 16]).unwrap();
    effect.render(&mut ctx, input, output).unwrap();
    let expected = RGBA::new(1.0 - 0.701 * 0.5, 0.299 * 0.5, 0.299 * 0.5, 1.0);
    assert_all_near(ctx.pixels(output).unwrap(), expected, EPS);
}

#[test]
fn test_failed_resize_keeps_effect_ready() {
    let mut ctx = SoftwareContext::new();
    let mut chain = bloom_chain(&mut ctx);
    let (input, output) = io_pair(&mut ctx, 8, 8, red());
    chain.resize(&mut ctx, 8, 8).unwrap();

    let err = chain.resize(&mut ctx, 0, 0).unwrap_err();
    assert!(matches!(err, VfxError::ResourceAllocation(_)));
    assert_eq!(chain.state(), EffectState::Ready);
    assert_eq!(chain.buffer().unwrap().size(), (8, 8));
    chain.render(&mut ctx, input, output).unwrap();
}

#[test]
fn test_lost_buffer_resets_effect() {
    let mut ctx = SoftwareContext::new();
    let mut chain = bloom_chain(&mut ctx);
    let (input, output) = io_pair(&mut ctx, 8, 8, red());
    chain.resize(&mut ctx, 8, 8).unwrap();
    assert_eq!(ctx.live_targets(), 4);

    // Room for one target once the buffer is released: neither the new size
    // nor the old one can be restored
    ctx.set_target_limit(Some(3));
    let err = chain.resize(&mut ctx, 16, 16).unwrap_err();
    assert!(matches!(err, VfxError::ResourceAllocation(_)));
    assert_eq!(chain.state(), EffectState::Uninitialized);
    assert!(chain.buffer().is_none());
    assert_eq!(ctx.live_targets(), 2);
    assert!(matches!(chain.render(&mut ctx, input, output), Err(VfxError::Uninitialized { .. })));

    ctx.set_target_limit(None);
    chain.resize(&mut ctx, 8, 8).unwrap();
    assert_eq!(chain.state(), EffectState::Ready);
    chain.render(&mut ctx, input, output).unwrap();
}

#[test]
fn test_rebind_keeps_buffer_targets() {
    let mut ctx = SoftwareContext::new();
    let mut chain = bloom_chain(&mut ctx);
    let input = ctx.create_target(8, 8, TextureFormat::Rgba8Unorm).unwrap();
    let output = ctx.create_target(8, 8, TextureFormat::Rgba8Unorm).unwrap();
    ctx.write_pixels(input, &gradient(8, 8)).unwrap();
    chain.resize(&mut ctx, 8, 8).unwrap();
    chain.render(&mut ctx, input, output).unwrap();
    let before = ctx.pixels(output).unwrap().to_vec();
    let targets = (chain.buffer().unwrap().source().unwrap(), chain.buffer().unwrap().result().unwrap());

    // Any new allocation would fail
    ctx.set_target_limit(Some(ctx.live_targets()));
    ctx.simulate_context_loss();
    ctx.reset_stats();
    chain.rebind(&mut ctx).unwrap();
    assert_eq!(ctx.stats().targets_created, 0);
    assert_eq!(ctx.stats().targets_destroyed, 0);
    assert_eq!(chain.state(), EffectState::Ready);
    let buffer = chain.buffer().unwrap();
    assert!(buffer.is_valid());
    assert!(buffer.owns(targets.0) && buffer.owns(targets.1));

    ctx.write_pixels(input, &gradient(8, 8)).unwrap();
    chain.render(&mut ctx, input, output).unwrap();
    assert_eq!(ctx.pixels(output).unwrap(), before.as_slice());
}

#[test]
fn test_failed_nested_resize_rolls_back_chain() {
    let mut ctx = SoftwareContext::new();
    let capped = CappedEffect {
        inner: GrayscaleEffect::grayscale(&mut ctx).unwrap(),
        max_width: 8,
    };
    let mut chain = ChainEffect::new(&mut ctx, "capped-chain")
        .unwrap()
        .with_multipass(BlurFilter::new(&mut ctx).unwrap())
        .with_effect(capped);
    let input = ctx.create_target(8, 8, TextureFormat::Rgba8Unorm).unwrap();
    let output = ctx.create_target(8, 8, TextureFormat::Rgba8Unorm).unwrap();
    ctx.write_pixels(input, &gradient(8, 8)).unwrap();
    chain.resize(&mut ctx, 8, 8).unwrap();
    chain.render(&mut ctx, input, output).unwrap();
    let before = ctx.pixels(output).unwrap().to_vec();

    let err = chain.resize(&mut ctx, 16, 16).unwrap_err();
    assert!(matches!(err, VfxError::ResourceAllocation(_)));
    assert_eq!(chain.state(), EffectState::Ready);
    assert_eq!(chain.buffer().unwrap().size(), (8, 8));

    // Blur offsets are back to 8x8 texels as well
    chain.render(&mut ctx, input, output).unwrap();
    assert_eq!(ctx.pixels(output).unwrap(), before.as_slice());
}

#[test]
fn test_same_size_resize_allocates_nothing() {
    let mut ctx = SoftwareContext::new();
    let mut chain = bloom_chain(&mut ctx);
    let mut scattering = LightScatteringEffect::new(&mut ctx, &[0.5, 0.5], &[0.0]).unwrap();
    let mut motion = MotionBlurEffect::new(&mut ctx, BlurFunction::Mix).unwrap();
    chain.resize(&mut ctx, 8, 8).unwrap();
    scattering.resize(&mut ctx, 8, 8).unwrap();
    motion.resize(&mut ctx, 8, 8).unwrap();

    ctx.reset_stats();
    chain.resize(&mut ctx, 8, 8).unwrap();
    scattering.resize(&mut ctx, 8, 8).unwrap();
    motion.resize(&mut ctx, 8, 8).unwrap();
    assert_eq!(ctx.stats().targets_created, 0);
    assert_eq!(ctx.stats().targets_destroyed, 0);
}

#[test]
fn test_setters_fail_after_dispose() {
    let mut ctx = SoftwareContext::new();

    let mut blur = BlurFilter::new(&mut ctx).unwrap();
    blur.dispose(&mut ctx);
    assert!(matches!(blur.set_passes(2), Err(VfxError::Disposed { .. })));
    assert!(matches!(blur.set_amount(1.5), Err(VfxError::Disposed { .. })));
    assert_eq!(blur.passes(), 1);

    let mut scattering = LightScatteringEffect::new(&mut ctx, &[0.5, 0.5], &[0.0]).unwrap();
    scattering.dispose(&mut ctx).unwrap();
    assert!(matches!(scattering.set_blur_passes(3), Err(VfxError::Disposed { .. })));
    assert!(matches!(scattering.enable_blending(BlendFunc::ADDITIVE), Err(VfxError::Disposed { .. })));
    assert_eq!(scattering.blending(), None);

    let mut chain = bloom_chain(&mut ctx);
    chain.dispose(&mut ctx).unwrap();
    assert!(matches!(chain.set_blend(Some(BlendFunc::ALPHA)), Err(VfxError::Disposed { .. })));

    let mut gray = GrayscaleEffect::grayscale(&mut ctx).unwrap();
    gray.dispose(&mut ctx).unwrap();
    let err = gray.set_blend(Some(BlendFunc::ALPHA)).unwrap_err();
    assert!(err.is_usage_error());
}

#[test]
fn test_push_requires_resize() {
    let mut ctx = SoftwareContext::new();
    let mut chain = ChainEffect::new(&mut ctx, "grow")
        .unwrap()
        .with_filter(CopyFilter::new(&mut ctx).unwrap());
    chain.resize(&mut ctx, 4, 4).unwrap();

    chain
        .push(crate::effect::Stage::Filter(Box::new(GrayscaleFilter::new(&mut ctx).unwrap())))
        .unwrap();
    assert_eq!(chain.state(), EffectState::Uninitialized);
    assert_eq!(chain.stages().len(), 2);

    chain.resize(&mut ctx, 4, 4).unwrap();
    assert!(chain.buffer().is_some());
}

#[test]
fn test_single_filter_effects_leave_input_alone() {
    let mut ctx = SoftwareContext::new();
    let scene = gradient(16, 16);
    let input = ctx.create_target(16, 16, TextureFormat::Rgba8Unorm).unwrap();
    let output = ctx.create_target(16, 16, TextureFormat::Rgba8Unorm).unwrap();
    ctx.write_pixels(input, &scene).unwrap();

    let mut effects: Vec<Box<dyn Effect>> = vec![
        Box::new(FisheyeEffect::fisheye(&mut ctx).unwrap()),
        Box::new(NfaaEffect::nfaa(&mut ctx, false).unwrap()),
        Box::new(NfaaEffect::nfaa(&mut ctx, true).unwrap()),
        Box::new(LensFlareEffect::lens_flare(&mut ctx).unwrap()),
    ];
    for effect in effects.iter_mut() {
        effect.resize(&mut ctx, 16, 16).unwrap();
        effect.render(&mut ctx, input, output).unwrap();
        assert_eq!(ctx.pixels(input).unwrap(), scene.as_slice(), "{} wrote its input", effect.name());
        effect.dispose(&mut ctx).unwrap();
    }
    assert_eq!(ctx.live_programs(), 0);
}

#[test]
fn test_fisheye_amount_is_clamped() {
    let mut ctx = SoftwareContext::new();
    let mut fisheye = FisheyeDistortionFilter::new(&mut ctx).unwrap();
    assert!((fisheye.amount() - 0.2).abs() < 1e-6);
    fisheye.set_amount(2.0).unwrap();
    assert!((fisheye.amount() - 0.49).abs() < 1e-6);
    fisheye.set_amount(-2.0).unwrap();
    assert!((fisheye.amount() + 0.49).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// Motion blur
// ---------------------------------------------------------------------------

#[test]
fn test_motion_blur_mixes_with_last_frame() {
    let mut ctx = SoftwareContext::new();
    let mut effect = MotionBlurEffect::new(&mut ctx, BlurFunction::Mix).unwrap();
    let (first, output) = io_pair(&mut ctx, 8, 8, red());
    let second = ctx.create_filled_target(8, 8, blue()).unwrap();
    effect.resize(&mut ctx, 8, 8).unwrap();

    // No history yet: the frame is blended with itself
    effect.render(&mut ctx, first, output).unwrap();
    assert!(effect.has_history());
    assert_all_near(ctx.pixels(output).unwrap(), red(), EPS);

    effect.render(&mut ctx, second, output).unwrap();
    assert_all_near(ctx.pixels(output).unwrap(), RGBA::new(0.5, 0.0, 0.5, 1.0), EPS);
}

#[test]
fn test_motion_blur_max_keeps_brightest() {
    let mut ctx = SoftwareContext::new();
    let mut effect = MotionBlurEffect::new(&mut ctx, BlurFunction::Max).unwrap();
    effect.set_blur_opacity(1.0).unwrap();
    let (first, output) = io_pair(&mut ctx, 4, 4, red());
    let second = ctx.create_filled_target(4, 4, blue()).unwrap();
    effect.resize(&mut ctx, 4, 4).unwrap();

    effect.render(&mut ctx, first, output).unwrap();
    effect.render(&mut ctx, second, output).unwrap();
    assert_all_near(ctx.pixels(output).unwrap(), RGBA::new(1.0, 0.0, 1.0, 1.0), EPS);
}

#[test]
fn test_motion_blur_history_dropped_on_resize() {
    let mut ctx = SoftwareContext::new();
    let mut effect = MotionBlurEffect::new(&mut ctx, BlurFunction::Mix).unwrap();
    let (input, output) = io_pair(&mut ctx, 4, 4, red());
    effect.resize(&mut ctx, 4, 4).unwrap();
    effect.render(&mut ctx, input, output).unwrap();

    effect.resize(&mut ctx, 4, 4).unwrap();
    assert!(effect.has_history());

    effect.resize(&mut ctx, 8, 8).unwrap();
    assert!(!effect.has_history());
    assert_eq!(effect.buffer().unwrap().size(), (8, 8));
}

// ---------------------------------------------------------------------------
// Light scattering
// ---------------------------------------------------------------------------

#[test]
fn test_light_scattering_defaults() {
    let mut ctx = SoftwareContext::new();
    let effect = LightScatteringEffect::new(&mut ctx, &[0.5, 0.5], &[0.0]).unwrap();

    assert_eq!(effect.name(), "light-scattering");
    assert!((effect.bias() + 0.9).abs() < 1e-6);
    assert!((effect.base_intensity() - 1.0).abs() < 1e-6);
    assert!((effect.scattering_intensity() - 0.7).abs() < 1e-6);
    assert_eq!(effect.blur().passes(), 2);
    assert_eq!(effect.blur().blur_type(), BlurType::Gaussian5x5b);
    assert_eq!(effect.scattering().light_count(), 1);
    assert!(effect.buffer().is_none());
}

#[test]
fn test_light_scattering_rejects_mismatched_lights() {
    let mut ctx = SoftwareContext::new();
    let err = LightScatteringEffect::new(&mut ctx, &[0.5, 0.5, 0.2], &[0.0, 1.0]).err().unwrap();
    assert!(matches!(err, VfxError::InvalidArgument(_)));

    let positions = [0.5; 22];
    let angles = [0.0; 11];
    let mut effect = LightScatteringEffect::new(&mut ctx, &[], &[]).unwrap();
    assert!(matches!(effect.set_lights(&positions, &angles), Err(VfxError::InvalidArgument(_))));
    assert_eq!(effect.scattering().light_count(), 0);
}

#[test]
fn test_light_scattering_render() {
    let mut ctx = SoftwareContext::new();
    let mut effect = LightScatteringEffect::new(&mut ctx, &[0.5, 0.5], &[0.0]).unwrap();
    let scene = gradient(32, 32);
    let input = ctx.create_target(32, 32, TextureFormat::Rgba8Unorm).unwrap();
    let output = ctx.create_target(32, 32, TextureFormat::Rgba8Unorm).unwrap();
    ctx.write_pixels(input, &scene).unwrap();

    effect.resize(&mut ctx, 32, 32).unwrap();
    ctx.reset_stats();
    effect.render(&mut ctx, input, output).unwrap();

    // bias, scattering, two blur rounds of two draws, combine
    assert_eq!(ctx.stats().draws, 7);
    assert_eq!(ctx.pixels(input).unwrap(), scene.as_slice());
    assert_eq!(ctx.bound_target(), None);
}

#[test]
fn test_light_scattering_composites_over_scene() {
    let mut ctx = SoftwareContext::new();
    let mut effect = LightScatteringEffect::new(&mut ctx, &[0.5, 0.5], &[0.0]).unwrap();
    // Nothing clears the threshold, so the scattered layer is black
    effect.set_bias(-1.0).unwrap();
    effect.set_base_intensity(0.5).unwrap();
    effect.set_base_saturation(1.0).unwrap();
    effect.set_scattering_intensity(1.0).unwrap();
    effect.set_scattering_saturation(1.0).unwrap();

    let input = ctx.create_target(16, 16, TextureFormat::Rgba8Unorm).unwrap();
    let output = ctx.create_target(16, 16, TextureFormat::Rgba8Unorm).unwrap();
    ctx.write_pixels(input, &gradient(16, 16)).unwrap();
    effect.resize(&mut ctx, 16, 16).unwrap();
    effect.render(&mut ctx, input, output).unwrap();

    let scene = ctx.pixels(input).unwrap();
    let black = RGBA::new(0.0, 0.0, 0.0, 1.0);
    for (i, (px, base)) in ctx.pixels(output).unwrap().iter().zip(scene).enumerate() {
        let expected = kernels::combine_of(*base, black, [0.5, 1.0], [1.0, 1.0]);
        assert!(
            px.max_abs_diff(expected) <= EPS,
            "pixel {} is {:?}, expected {:?}",
            i,
            px,
            expected
        );
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[test]
fn test_write_ppm_header_and_scale() {
    let mut out = Vec::new();
    write_ppm(&mut out, &[red(), blue()], 2, 1, 2).unwrap();
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("P3"));
    assert_eq!(lines.next(), Some("4 2"));
    assert_eq!(lines.next(), Some("255"));
    assert_eq!(lines.next().map(str::trim), Some("255 0 0 255 0 0 0 0 255 0 0 255"));
}

#[test]
fn test_write_ppm_rejects_wrong_length() {
    let mut out = Vec::new();
    assert!(write_ppm(&mut out, &[red()], 2, 2, 1).is_err());
}

#[test]
fn test_normalize_modes() {
    let frame = [RGBA::new(2.0, 1.0, 0.0, 1.0), RGBA::new(0.5, 0.25, 0.0, 1.0)];

    let clamped = normalize(&frame, NormalizationMode::Clamp);
    assert_eq!(clamped[0], RGBA::new(1.0, 1.0, 0.0, 1.0));

    let standard = normalize(&frame, NormalizationMode::Standard);
    assert_eq!(standard[0], RGBA::new(1.0, 0.5, 0.0, 1.0));
    assert_eq!(standard[1], RGBA::new(0.25, 0.125, 0.0, 1.0));
}
