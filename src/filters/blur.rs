//! Gaussian blur as repeated horizontal and vertical convolutions

use super::{ConvolveFilter, Filter, FilterInput, MultipassFilter};
use crate::error::{VfxError, VfxResult};
use crate::gpu::GraphicsContext;
use crate::ping_pong::DoubleBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlurType {
    /// Three taps, weights 1-2-1
    Gaussian3x3,
    /// Two bilinear taps half a texel either side
    Gaussian3x3b,
    /// Five taps, weights 1-4-6-4-1
    Gaussian5x5,
    /// Center tap plus two bilinear taps at 1.2 texels
    #[default]
    Gaussian5x5b,
}

const GAUSSIAN_3X3: (&[f32], &[f32]) = (&[0.25, 0.5, 0.25], &[-1.0, 0.0, 1.0]);
const GAUSSIAN_3X3B: (&[f32], &[f32]) = (&[0.5, 0.5], &[-0.5, 0.5]);
const GAUSSIAN_5X5: (&[f32], &[f32]) = (
    &[1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0],
    &[-2.0, -1.0, 0.0, 1.0, 2.0],
);
const GAUSSIAN_5X5B: (&[f32], &[f32]) = (&[5.0 / 16.0, 6.0 / 16.0, 5.0 / 16.0], &[-1.2, 0.0, 1.2]);

impl BlurType {
    /// Tap weights and positions in texels along one axis
    pub fn taps(self) -> (&'static [f32], &'static [f32]) {
        match self {
            BlurType::Gaussian3x3 => GAUSSIAN_3X3,
            BlurType::Gaussian3x3b => GAUSSIAN_3X3B,
            BlurType::Gaussian5x5 => GAUSSIAN_5X5,
            BlurType::Gaussian5x5b => GAUSSIAN_5X5B,
        }
    }
}

/// Packs per-tap texel positions into `(dx, dy)` pairs along one axis
fn axis_offsets(positions: &[f32], step: [f32; 2]) -> Vec<f32> {
    positions
        .iter()
        .flat_map(|&p| [p * step[0], p * step[1]])
        .collect()
}

#[derive(Debug)]
pub struct BlurFilter {
    horizontal: ConvolveFilter,
    vertical: ConvolveFilter,
    blur_type: BlurType,
    passes: u32,
    amount: f32,
    viewport: Option<(u32, u32)>,
}

impl BlurFilter {
    pub fn new(ctx: &mut dyn GraphicsContext) -> VfxResult<Self> {
        Ok(Self {
            horizontal: ConvolveFilter::new(ctx)?,
            vertical: ConvolveFilter::new(ctx)?,
            blur_type: BlurType::default(),
            passes: 1,
            amount: 0.0,
            viewport: None,
        })
    }

    /// Number of horizontal + vertical rounds; at least one
    pub fn set_passes(&mut self, passes: u32) -> VfxResult<()> {
        self.check_live()?;
        if passes == 0 {
            return Err(VfxError::invalid("blur needs at least one pass"));
        }
        self.passes = passes;
        Ok(())
    }

    pub fn set_type(&mut self, blur_type: BlurType) -> VfxResult<()> {
        self.check_live()?;
        self.blur_type = blur_type;
        self.update_kernel()
    }

    /// Tap spread multiplier; zero or less means one texel
    pub fn set_amount(&mut self, amount: f32) -> VfxResult<()> {
        self.check_live()?;
        self.amount = amount;
        self.update_kernel()
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn blur_type(&self) -> BlurType {
        self.blur_type
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn horizontal(&self) -> &ConvolveFilter {
        &self.horizontal
    }

    pub fn vertical(&self) -> &ConvolveFilter {
        &self.vertical
    }

    fn check_live(&self) -> VfxResult<()> {
        if self.horizontal.pass().is_disposed() || self.vertical.pass().is_disposed() {
            return Err(VfxError::disposed("blur filter"));
        }
        Ok(())
    }

    fn update_kernel(&mut self) -> VfxResult<()> {
        let Some((width, height)) = self.viewport else {
            // Offsets depend on the texel size; computed on resize.
            return Ok(());
        };
        let spread = if self.amount > 0.0 { self.amount } else { 1.0 };
        let (weights, positions) = self.blur_type.taps();
        let texel = [spread / width as f32, spread / height as f32];

        self.horizontal
            .set_kernel(weights, &axis_offsets(positions, [texel[0], 0.0]))?;
        self.vertical
            .set_kernel(weights, &axis_offsets(positions, [0.0, texel[1]]))
    }
}

impl MultipassFilter for BlurFilter {
    fn name(&self) -> &str {
        "blur"
    }

    fn resize(&mut self, width: u32, height: u32) -> VfxResult<()> {
        self.horizontal.resize(width, height)?;
        self.vertical.resize(width, height)?;
        self.viewport = Some((width, height));
        self.update_kernel()
    }

    fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        self.horizontal.rebind(ctx)?;
        self.vertical.rebind(ctx)
    }

    fn render(&mut self, ctx: &mut dyn GraphicsContext, input: &FilterInput, buffer: &mut DoubleBuffer) -> VfxResult<()> {
        let mut reading = input.source;
        for _ in 0..self.passes {
            self.horizontal.render(ctx, &FilterInput::single(reading))?;
            buffer.capture(ctx)?;
            self.vertical.render(ctx, &FilterInput::single(buffer.source()?))?;
            buffer.capture(ctx)?;
            reading = buffer.source()?;
        }
        Ok(())
    }

    fn dispose(&mut self, ctx: &mut dyn GraphicsContext) {
        self.horizontal.dispose(ctx);
        self.vertical.dispose(ctx);
    }
}
