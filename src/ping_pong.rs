//! Ping-pong pair of offscreen targets
//!
//! One target is the source (last written), the other the result (next to
//! be written). `capture` swaps the roles. Capturing without drawing first is
//! legal and leaves the new source holding whatever it held before, which is
//! usually stale content from an earlier frame.

use crate::error::{VfxError, VfxResult};
use crate::gpu::{GraphicsContext, TargetHandle, TextureFormat};

fn allocate(ctx: &mut dyn GraphicsContext, width: u32, height: u32, format: TextureFormat) -> VfxResult<[TargetHandle; 2]> {
    let first = ctx.create_target(width, height, format)?;
    match ctx.create_target(width, height, format) {
        Ok(second) => Ok([first, second]),
        Err(e) => {
            ctx.destroy_target(first);
            Err(e)
        }
    }
}

#[derive(Debug)]
pub struct DoubleBuffer {
    targets: Option<[TargetHandle; 2]>,
    source: usize,
    width: u32,
    height: u32,
    format: TextureFormat,
    // Caller's binding while between begin and end
    saved: Option<Option<TargetHandle>>,
    disposed: bool,
}

impl DoubleBuffer {
    pub fn new(ctx: &mut dyn GraphicsContext, width: u32, height: u32, format: TextureFormat) -> VfxResult<Self> {
        let targets = allocate(ctx, width, height, format)?;
        log::info!("allocated double buffer {}x{} ({:?})", width, height, format);
        Ok(Self {
            targets: Some(targets),
            source: 0,
            width,
            height,
            format,
            saved: None,
            disposed: false,
        })
    }

    fn targets(&self) -> VfxResult<[TargetHandle; 2]> {
        if self.disposed {
            return Err(VfxError::disposed("double buffer"));
        }
        self.targets
            .ok_or_else(|| VfxError::allocation("double buffer lost its targets in a failed resize"))
    }

    fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some(targets) = self.targets.take() {
            for target in targets {
                ctx.destroy_target(target);
            }
        }
        self.source = 0;
    }

    /// Reallocates both targets when the size changes; returns whether it did.
    ///
    /// The old targets are released before the new ones are allocated. If the
    /// new allocation fails, targets at the previous size are restored and
    /// `ResourceAllocation` is returned. Should that fail too, the buffer is
    /// left without targets and reports `!is_valid()`.
    pub fn resize(&mut self, ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> VfxResult<bool> {
        if self.disposed {
            return Err(VfxError::disposed("double buffer"));
        }
        if self.is_active() {
            return Err(VfxError::invalid("double buffer resized between begin and end"));
        }
        if self.targets.is_some() && (width, height) == (self.width, self.height) {
            return Ok(false);
        }

        self.release(ctx);
        match allocate(ctx, width, height, self.format) {
            Ok(targets) => {
                log::debug!("double buffer {}x{} -> {}x{}", self.width, self.height, width, height);
                self.targets = Some(targets);
                self.width = width;
                self.height = height;
                Ok(true)
            }
            Err(e) => {
                log::warn!("double buffer resize to {}x{} failed: {}", width, height, e);
                match allocate(ctx, self.width, self.height, self.format) {
                    Ok(targets) => self.targets = Some(targets),
                    Err(restore) => log::warn!("could not restore {}x{} targets: {}", self.width, self.height, restore),
                }
                Err(match e {
                    VfxError::ResourceAllocation(_) => e,
                    other => VfxError::allocation(other.to_string()),
                })
            }
        }
    }

    /// Saves the caller's bound target and binds the result target
    pub fn begin(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        let targets = self.targets()?;
        if self.is_active() {
            return Err(VfxError::invalid("double buffer already active"));
        }
        self.saved = Some(ctx.bound_target());
        ctx.bind_target(Some(targets[1 - self.source]));
        Ok(())
    }

    /// Swaps source and result; while active, binds the new result
    pub fn capture(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        let targets = self.targets()?;
        self.source = 1 - self.source;
        if self.is_active() {
            ctx.bind_target(Some(targets[1 - self.source]));
        }
        Ok(())
    }

    /// Restores the binding saved by `begin`. A no-op when not active.
    pub fn end(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some(previous) = self.saved.take() {
            ctx.bind_target(previous);
        }
    }

    pub fn source(&self) -> VfxResult<TargetHandle> {
        Ok(self.targets()?[self.source])
    }

    pub fn result(&self) -> VfxResult<TargetHandle> {
        Ok(self.targets()?[1 - self.source])
    }

    /// Drops the saved binding after a context loss. The targets keep their
    /// handles and size; their contents are undefined until drawn again.
    pub fn rebind(&mut self) -> VfxResult<()> {
        self.targets()?;
        self.saved = None;
        self.source = 0;
        log::debug!("double buffer {}x{} rebound", self.width, self.height);
        Ok(())
    }

    pub fn dispose(&mut self, ctx: &mut dyn GraphicsContext) {
        self.end(ctx);
        self.release(ctx);
        self.disposed = true;
    }

    /// Whether `target` is one of the two owned targets
    pub fn owns(&self, target: TargetHandle) -> bool {
        self.targets.is_some_and(|t| t.contains(&target))
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    pub fn is_valid(&self) -> bool {
        !self.disposed && self.targets.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
