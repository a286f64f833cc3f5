use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;

use vfxchain::{
    BiasFilter, BlendFunc, BlurFilter, BlurFunction, ChainEffect, CombineFilter, Effect, FisheyeEffect,
    GrayscaleEffect, GraphicsContext, LensFlareEffect, LightScatteringEffect, MotionBlurEffect, NfaaEffect,
    NormalizationMode, RGBA, SoftwareContext, TextureFormat, WgpuContext, normalize, save_ppm,
};

#[derive(Parser, Debug)]
#[command(name = "vfxchain", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a procedural scene through an effect and save the last frame as PPM.
    Render(RenderArgs),
    /// Time repeated renders of every effect.
    Benchmark(BenchmarkArgs),
    /// List the available effects.
    List,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Effect to apply.
    #[arg(long, value_enum, default_value_t = EffectKind::LightScattering)]
    effect: EffectKind,

    /// Backend to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Software)]
    backend: BackendChoice,

    #[arg(long, default_value_t = 320)]
    width: u32,

    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Frames to render; the scene's light moves a little every frame.
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Output PPM path.
    #[arg(long, default_value = "output.ppm")]
    out: PathBuf,

    /// Pixel repeat factor of the saved image.
    #[arg(long, default_value_t = 1)]
    scale: usize,

    /// How the read-back frame is brought into displayable range.
    #[arg(long, value_enum, default_value_t = NormalizeChoice::Clamp)]
    normalize: NormalizeChoice,
}

#[derive(Parser, Debug)]
struct BenchmarkArgs {
    #[arg(long, value_enum, default_value_t = BackendChoice::Software)]
    backend: BackendChoice,

    #[arg(long, default_value_t = 200)]
    width: u32,

    #[arg(long, default_value_t = 200)]
    height: u32,

    #[arg(long, default_value_t = 10)]
    iterations: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Software,
    Wgpu,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NormalizeChoice {
    Clamp,
    /// Divide by the brightest channel of the frame
    Standard,
}

impl From<NormalizeChoice> for NormalizationMode {
    fn from(choice: NormalizeChoice) -> Self {
        match choice {
            NormalizeChoice::Clamp => NormalizationMode::Clamp,
            NormalizeChoice::Standard => NormalizationMode::Standard,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EffectKind {
    Grayscale,
    Fisheye,
    Nfaa,
    LensFlare,
    LightScattering,
    MotionBlur,
    /// Bright-pass, blur and composite chained by hand
    Bloom,
}

impl EffectKind {
    fn description(self) -> &'static str {
        match self {
            EffectKind::Grayscale => "luminance desaturation",
            EffectKind::Fisheye => "barrel distortion",
            EffectKind::Nfaa => "normal-filter anti-aliasing",
            EffectKind::LensFlare => "single-light procedural flare",
            EffectKind::LightScattering => "bias, radial scattering, blur, composite",
            EffectKind::MotionBlur => "frame history blended with the current frame",
            EffectKind::Bloom => "bias then blur, composited over the scene",
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Benchmark(args) => cmd_benchmark(args),
        Command::List => {
            for kind in EffectKind::value_variants() {
                if let Some(name) = kind.to_possible_value() {
                    println!("{:<18} {}", name.get_name(), kind.description());
                }
            }
            Ok(())
        }
    }
}

fn make_context(choice: BackendChoice) -> anyhow::Result<Box<dyn GraphicsContext>> {
    Ok(match choice {
        BackendChoice::Software => Box::new(SoftwareContext::new()),
        BackendChoice::Wgpu => Box::new(WgpuContext::new().context("create wgpu context")?),
    })
}

fn make_effect(ctx: &mut dyn GraphicsContext, kind: EffectKind) -> anyhow::Result<Box<dyn Effect>> {
    Ok(match kind {
        EffectKind::Grayscale => Box::new(GrayscaleEffect::grayscale(ctx)?),
        EffectKind::Fisheye => Box::new(FisheyeEffect::fisheye(ctx)?),
        EffectKind::Nfaa => Box::new(NfaaEffect::nfaa(ctx, false)?),
        EffectKind::LensFlare => {
            let mut effect = LensFlareEffect::lens_flare(ctx)?;
            effect.filter_mut().set_light_position(0.7, 0.3)?;
            effect.set_blend(Some(BlendFunc::ADDITIVE))?;
            Box::new(effect)
        }
        EffectKind::LightScattering => Box::new(LightScatteringEffect::new(ctx, &[0.7, 0.3], &[0.0])?),
        EffectKind::MotionBlur => Box::new(MotionBlurEffect::new(ctx, BlurFunction::Mix)?),
        EffectKind::Bloom => {
            let mut blur = BlurFilter::new(ctx)?;
            blur.set_passes(2)?;
            let mut bias = BiasFilter::new(ctx)?;
            bias.set_bias(-0.6)?;
            let mut combine = CombineFilter::new(ctx)?;
            combine.set_source2_intensity(0.8)?;
            Box::new(
                ChainEffect::new(ctx, "bloom")?
                    .with_format(TextureFormat::Rgba8Unorm)
                    .with_filter(bias)
                    .with_multipass(blur)
                    .with_filter(combine),
            )
        }
    })
}

/// Dark gradient with a few occluding bars and a bright disc at `light`
fn scene(width: u32, height: u32, light: (f32, f32)) -> Vec<RGBA> {
    let (w, h) = (width as usize, height as usize);
    (0..w * h)
        .into_par_iter()
        .map(|i| {
            let u = (i % w) as f32 / w as f32;
            let v = (i / w) as f32 / h as f32;
            let (dx, dy) = (u - light.0, (v - light.1) * h as f32 / w as f32);
            if (dx * dx + dy * dy).sqrt() < 0.06 {
                return RGBA::new(1.0, 0.95, 0.8, 1.0);
            }
            if ((u * 8.0) as u32) % 3 == 1 && v > 0.45 {
                return RGBA::new(0.02, 0.02, 0.03, 1.0);
            }
            RGBA::new(0.1 + 0.2 * v, 0.12 + 0.1 * u, 0.25, 1.0)
        })
        .collect()
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut ctx = make_context(args.backend)?;
    let ctx = ctx.as_mut();
    let mut effect = make_effect(ctx, args.effect)?;
    effect.resize(ctx, args.width, args.height)?;

    let input = ctx.create_target(args.width, args.height, TextureFormat::Rgba8Unorm)?;
    let output = ctx.create_target(args.width, args.height, TextureFormat::Rgba8Unorm)?;

    let start = Instant::now();
    for frame in 0..args.frames.max(1) {
        let t = frame as f32 / args.frames.max(1) as f32;
        ctx.write_pixels(input, &scene(args.width, args.height, (0.3 + 0.4 * t, 0.3)))?;
        if args.effect == EffectKind::LensFlare {
            // flare blends over whatever is already in the output
            ctx.write_pixels(output, &scene(args.width, args.height, (0.7, 0.3)))?;
        }
        effect
            .render(ctx, input, output)
            .with_context(|| format!("render frame {}", frame))?;
    }
    log::info!(
        "{} frame(s) of '{}' in {:.2} ms",
        args.frames.max(1),
        effect.name(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let pixels = normalize(&ctx.read_pixels(output)?, args.normalize.into());
    save_ppm(&pixels, args.width as usize, args.height as usize, &args.out, args.scale)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    println!("Saved {}", args.out.display());

    effect.dispose(ctx)?;
    ctx.destroy_target(input);
    ctx.destroy_target(output);
    Ok(())
}

fn cmd_benchmark(args: BenchmarkArgs) -> anyhow::Result<()> {
    let mut ctx = make_context(args.backend)?;
    let ctx = ctx.as_mut();
    let input = ctx.create_target(args.width, args.height, TextureFormat::Rgba8Unorm)?;
    let output = ctx.create_target(args.width, args.height, TextureFormat::Rgba8Unorm)?;
    ctx.write_pixels(input, &scene(args.width, args.height, (0.5, 0.3)))?;

    println!("=== Effect Benchmark ({}x{}) ===\n", args.width, args.height);
    for &kind in EffectKind::value_variants() {
        let mut effect = make_effect(ctx, kind)?;
        effect.resize(ctx, args.width, args.height)?;

        let start = Instant::now();
        for _ in 0..args.iterations {
            effect.render(ctx, input, output)?;
        }
        // wgpu draws are only queued until something waits on them
        ctx.read_pixels(output)?;
        let avg_ms = start.elapsed().as_secs_f64() * 1000.0 / args.iterations.max(1) as f64;
        println!("  {:<18} {:.3} ms/frame", effect.name(), avg_ms);

        effect.dispose(ctx)?;
    }

    ctx.destroy_target(input);
    ctx.destroy_target(output);
    Ok(())
}
