//! One compiled program plus its parameters and texture inputs

use crate::error::{VfxError, VfxResult};
use crate::gpu::{GraphicsContext, MAX_TEXTURE_UNITS, ProgramHandle, ProgramSource, TargetHandle};
use crate::uniforms::{ParamDecl, UniformParameterSet, UniformValue};

/// Texture unit assignment for one sampled input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInput {
    pub name: &'static str,
    pub unit: u32,
}

impl TextureInput {
    pub const fn new(name: &'static str, unit: u32) -> Self {
        Self { name, unit }
    }
}

/// Primary input, sampled from unit 0
pub const PRIMARY_INPUT: TextureInput = TextureInput::new("u_texture0", 0);
/// Secondary input of two-source programs, sampled from unit 1
pub const SECONDARY_INPUT: TextureInput = TextureInput::new("u_texture1", 1);

fn check_units(program: &str, inputs: &[TextureInput]) -> VfxResult<()> {
    for (i, input) in inputs.iter().enumerate() {
        if input.unit >= MAX_TEXTURE_UNITS {
            return Err(VfxError::invalid(format!(
                "'{}' in '{}' uses texture unit {}, only {} available",
                input.name, program, input.unit, MAX_TEXTURE_UNITS
            )));
        }
        if let Some(first) = inputs[..i].iter().find(|other| other.unit == input.unit) {
            return Err(VfxError::TextureUnitCollision {
                unit: input.unit,
                first: first.name.to_string(),
                second: input.name.to_string(),
            });
        }
    }
    Ok(())
}

/// A screen-space shader pass.
///
/// The pass never binds its own output: [`ShaderPass::render`] draws into
/// whatever target the caller has bound.
#[derive(Debug)]
pub struct ShaderPass {
    name: String,
    program: Option<ProgramHandle>,
    params: UniformParameterSet,
    inputs: Vec<TextureInput>,
    viewport: Option<(u32, u32)>,
}

impl ShaderPass {
    /// Compiles `source` and resolves every declared parameter
    pub fn new(
        ctx: &mut dyn GraphicsContext,
        source: &ProgramSource,
        params: &[ParamDecl],
        inputs: &[TextureInput],
    ) -> VfxResult<Self> {
        check_units(&source.name, inputs)?;
        let mut set = UniformParameterSet::with_decls(source.name.clone(), params)?;
        let program = ctx.compile_program(source, params)?;
        set.resolve_locations(ctx, program);

        Ok(Self {
            name: source.name.clone(),
            program: Some(program),
            params: set,
            inputs: inputs.to_vec(),
            viewport: None,
        })
    }

    fn live(&self) -> VfxResult<ProgramHandle> {
        self.program
            .ok_or_else(|| VfxError::disposed(format!("shader pass '{}'", self.name)))
    }

    /// Stages a parameter; the upload happens on the next render or rebind
    pub fn set_param(&mut self, key: &str, value: impl Into<UniformValue>) -> VfxResult<()> {
        self.live()?;
        self.params.stage(key, value.into())
    }

    /// Binds `textures[i]` to the unit of the i-th declared input. Units the
    /// pass does not receive a texture for are cleared.
    pub fn bind(&mut self, ctx: &mut dyn GraphicsContext, textures: &[TargetHandle]) -> VfxResult<()> {
        self.live()?;
        if textures.len() > self.inputs.len() {
            return Err(VfxError::invalid(format!(
                "'{}' declares {} texture input(s), got {}",
                self.name,
                self.inputs.len(),
                textures.len()
            )));
        }

        let mut assigned = [None; MAX_TEXTURE_UNITS as usize];
        for (input, texture) in self.inputs.iter().zip(textures) {
            assigned[input.unit as usize] = Some(*texture);
        }
        for (unit, texture) in assigned.into_iter().enumerate() {
            match texture {
                Some(texture) => ctx.bind_texture(unit as u32, texture)?,
                None => ctx.unbind_texture(unit as u32),
            }
        }
        Ok(())
    }

    /// Uploads staged parameters without drawing
    pub fn flush(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<usize> {
        let program = self.live()?;
        self.params.flush(ctx, program)
    }

    /// Flushes staged parameters, then draws into the bound target
    pub fn render(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<()> {
        let program = self.live()?;
        if self.viewport.is_none() {
            return Err(VfxError::uninitialized(format!("shader pass '{}'", self.name)));
        }
        self.params.flush(ctx, program)?;
        ctx.draw_quad(program)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> VfxResult<()> {
        self.live()?;
        self.viewport = Some((width, height));
        Ok(())
    }

    /// Re-queries locations and re-uploads every parameter that holds a value
    pub fn rebind(&mut self, ctx: &mut dyn GraphicsContext) -> VfxResult<usize> {
        let program = self.live()?;
        self.params.resolve_locations(ctx, program);
        self.params.mark_all_dirty();
        let uploads = self.params.flush(ctx, program)?;
        log::debug!("rebound '{}': {} upload(s)", self.name, uploads);
        Ok(uploads)
    }

    /// Releases the program. Disposing twice is a no-op.
    pub fn dispose(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some(program) = self.program.take() {
            ctx.destroy_program(program);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.program.is_none()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }

    pub fn params(&self) -> &UniformParameterSet {
        &self.params
    }

    pub fn inputs(&self) -> &[TextureInput] {
        &self.inputs
    }
}
