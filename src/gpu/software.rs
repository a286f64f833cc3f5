//! CPU reference implementation of the graphics context
//!
//! Programs resolve to fragment kernels registered by program name, targets
//! are plain `RGBA` f32 surfaces, and every driver-facing call is counted so
//! tests can assert on the traffic an effect generates.

use std::collections::HashMap;

use rayon::prelude::*;

use super::{
    BlendFunc, GraphicsContext, MAX_TEXTURE_UNITS, ProgramHandle, ProgramSource, ShaderDefine, TargetHandle,
    TextureFormat, UniformLocation, kernels,
};
use crate::color::RGBA;
use crate::error::{VfxError, VfxResult};
use crate::uniforms::{ParamDecl, UniformValue};

/// Per-pixel program body
pub type FragmentKernel = fn(&Fragment<'_>) -> RGBA;

/// Counters for every call that would reach the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub programs_compiled: usize,
    pub programs_destroyed: usize,
    pub uniform_uploads: usize,
    pub draws: usize,
    pub targets_created: usize,
    pub targets_destroyed: usize,
    pub target_binds: usize,
    pub texture_binds: usize,
    pub blend_changes: usize,
    pub pixel_transfers: usize,
}

impl ContextStats {
    pub fn total_calls(&self) -> usize {
        self.programs_compiled
            + self.programs_destroyed
            + self.uniform_uploads
            + self.draws
            + self.targets_created
            + self.targets_destroyed
            + self.target_binds
            + self.texture_binds
            + self.blend_changes
            + self.pixel_transfers
    }
}

struct Surface {
    width: u32,
    height: u32,
    format: TextureFormat,
    pixels: Vec<RGBA>,
}

impl Surface {
    fn fetch(&self, x: i64, y: i64) -> RGBA {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width as usize + x]
    }

    /// Bilinear sample with clamp-to-edge addressing
    fn sample(&self, uv: [f32; 2]) -> RGBA {
        let fx = uv[0] * self.width as f32 - 0.5;
        let fy = uv[1] * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = self.fetch(x0, y0).lerp(self.fetch(x0 + 1, y0), tx);
        let bottom = self.fetch(x0, y0 + 1).lerp(self.fetch(x0 + 1, y0 + 1), tx);
        top.lerp(bottom, ty)
    }
}

struct SoftwareProgram {
    name: String,
    kernel: FragmentKernel,
    decls: Vec<ParamDecl>,
    values: Vec<Option<UniformValue>>,
    defines: Vec<ShaderDefine>,
}

/// Inputs visible to a kernel while shading one pixel
pub struct Fragment<'a> {
    /// Texture coordinate of the pixel center, origin at the top-left
    pub uv: [f32; 2],
    /// Size of the target being drawn
    pub viewport: (u32, u32),
    program: &'a SoftwareProgram,
    units: [Option<&'a Surface>; MAX_TEXTURE_UNITS as usize],
}

impl Fragment<'_> {
    /// Samples texture unit `unit`; unbound units read as transparent black
    pub fn sample(&self, unit: u32, uv: [f32; 2]) -> RGBA {
        match self.units.get(unit as usize).copied().flatten() {
            Some(surface) => surface.sample(uv),
            None => RGBA::transparent(),
        }
    }

    fn value(&self, name: &str) -> Option<&UniformValue> {
        let idx = self.program.decls.iter().position(|d| d.name == name)?;
        self.program.values[idx].as_ref()
    }

    pub fn float(&self, name: &str) -> f32 {
        match self.value(name) {
            Some(UniformValue::Float(f)) => *f,
            Some(UniformValue::Int(i)) => *i as f32,
            _ => 0.0,
        }
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.value(name) {
            Some(UniformValue::Int(i)) => *i,
            Some(UniformValue::Float(f)) => *f as i32,
            _ => 0,
        }
    }

    pub fn vec2(&self, name: &str) -> [f32; 2] {
        match self.value(name) {
            Some(UniformValue::Vec2(v)) => *v,
            _ => [0.0; 2],
        }
    }

    pub fn vec3(&self, name: &str) -> [f32; 3] {
        match self.value(name) {
            Some(UniformValue::Vec3(v)) => *v,
            _ => [0.0; 3],
        }
    }

    pub fn floats(&self, name: &str) -> &[f32] {
        match self.value(name) {
            Some(UniformValue::FloatArray(v)) => v,
            _ => &[],
        }
    }

    pub fn define(&self, name: &str) -> Option<&str> {
        self.program
            .defines
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }
}

/// CPU graphics context
pub struct SoftwareContext {
    kernels: HashMap<String, FragmentKernel>,
    programs: HashMap<ProgramHandle, SoftwareProgram>,
    targets: HashMap<TargetHandle, Surface>,
    next_id: u32,
    bound: Option<TargetHandle>,
    units: [Option<TargetHandle>; MAX_TEXTURE_UNITS as usize],
    blend: Option<BlendFunc>,
    target_limit: Option<usize>,
    stats: ContextStats,
    upload_trace: Vec<String>,
}

impl Default for SoftwareContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareContext {
    /// Creates a context with kernels for every built-in program
    pub fn new() -> Self {
        let kernels = kernels::builtin()
            .into_iter()
            .map(|(name, kernel)| (name.to_string(), kernel))
            .collect();
        Self {
            kernels,
            programs: HashMap::new(),
            targets: HashMap::new(),
            next_id: 1,
            bound: None,
            units: [None; MAX_TEXTURE_UNITS as usize],
            blend: None,
            target_limit: None,
            stats: ContextStats::default(),
            upload_trace: Vec::new(),
        }
    }

    /// Caps the number of live targets; allocations beyond it fail
    pub fn with_target_limit(mut self, limit: usize) -> Self {
        self.target_limit = Some(limit);
        self
    }

    pub fn set_target_limit(&mut self, limit: Option<usize>) {
        self.target_limit = limit;
    }

    pub fn register_kernel(&mut self, program: impl Into<String>, kernel: FragmentKernel) {
        self.kernels.insert(program.into(), kernel);
    }

    pub fn stats(&self) -> ContextStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ContextStats::default();
    }

    /// Names of the uniforms uploaded since the last clear, in upload order
    pub fn upload_trace(&self) -> &[String] {
        &self.upload_trace
    }

    pub fn clear_upload_trace(&mut self) {
        self.upload_trace.clear();
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Uploaded value of a uniform, as the program currently sees it
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<&UniformValue> {
        let prog = self.programs.get(&program)?;
        let idx = prog.decls.iter().position(|d| d.name == name)?;
        prog.values[idx].as_ref()
    }

    /// Target contents without going through a counted readback
    pub fn pixels(&self, target: TargetHandle) -> Option<&[RGBA]> {
        self.targets.get(&target).map(|s| s.pixels.as_slice())
    }

    /// Allocates a target filled with `color`
    pub fn create_filled_target(&mut self, width: u32, height: u32, color: RGBA) -> VfxResult<TargetHandle> {
        let target = self.create_target(width, height, TextureFormat::Rgba8Unorm)?;
        if let Some(surface) = self.targets.get_mut(&target) {
            surface.pixels.fill(color.clamp01());
        }
        Ok(target)
    }

    /// Drops every piece of state a real driver loses with its context:
    /// uploaded uniforms, target contents and bindings. Handles stay valid.
    pub fn simulate_context_loss(&mut self) {
        log::warn!("simulating graphics context loss");
        for program in self.programs.values_mut() {
            program.values.iter_mut().for_each(|v| *v = None);
        }
        for surface in self.targets.values_mut() {
            surface.pixels.fill(RGBA::transparent());
        }
        self.units = [None; MAX_TEXTURE_UNITS as usize];
        self.bound = None;
        self.blend = None;
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsContext for SoftwareContext {
    fn compile_program(&mut self, source: &ProgramSource, params: &[ParamDecl]) -> VfxResult<ProgramHandle> {
        let kernel = *self
            .kernels
            .get(&source.name)
            .ok_or_else(|| VfxError::ShaderCompile {
                program: source.name.clone(),
                diagnostics: format!("no fragment kernel registered for '{}'", source.name),
            })?;
        let handle = ProgramHandle(self.next_handle());
        self.programs.insert(
            handle,
            SoftwareProgram {
                name: source.name.clone(),
                kernel,
                decls: params.to_vec(),
                values: vec![None; params.len()],
                defines: source.defines.clone(),
            },
        );
        self.stats.programs_compiled += 1;
        Ok(handle)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() {
            self.stats.programs_destroyed += 1;
        }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let prog = self.programs.get(&program)?;
        prog.decls
            .iter()
            .position(|d| d.name == name)
            .map(|idx| UniformLocation(idx as u32))
    }

    fn set_uniform(&mut self, program: ProgramHandle, location: UniformLocation, value: &UniformValue) -> VfxResult<()> {
        let prog = self.programs.get_mut(&program).ok_or(VfxError::UnknownHandle {
            kind: "program",
            id: program.0,
        })?;
        let idx = location.0 as usize;
        let decl = prog.decls.get(idx).ok_or_else(|| {
            VfxError::invalid(format!("location {} out of range for '{}'", idx, prog.name))
        })?;
        decl.check(value)?;
        self.upload_trace.push(decl.name.to_string());
        prog.values[idx] = Some(value.clone());
        self.stats.uniform_uploads += 1;
        Ok(())
    }

    fn create_target(&mut self, width: u32, height: u32, format: TextureFormat) -> VfxResult<TargetHandle> {
        if width == 0 || height == 0 {
            return Err(VfxError::allocation(format!("zero-sized target {}x{}", width, height)));
        }
        if let Some(limit) = self.target_limit {
            if self.targets.len() >= limit {
                return Err(VfxError::allocation(format!(
                    "offscreen target limit of {} reached",
                    limit
                )));
            }
        }
        let handle = TargetHandle(self.next_handle());
        self.targets.insert(
            handle,
            Surface {
                width,
                height,
                format,
                pixels: vec![RGBA::transparent(); width as usize * height as usize],
            },
        );
        self.stats.targets_created += 1;
        Ok(handle)
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        if self.targets.remove(&target).is_some() {
            self.stats.targets_destroyed += 1;
        }
        if self.bound == Some(target) {
            self.bound = None;
        }
        for unit in self.units.iter_mut() {
            if *unit == Some(target) {
                *unit = None;
            }
        }
    }

    fn target_size(&self, target: TargetHandle) -> Option<(u32, u32)> {
        self.targets.get(&target).map(|s| (s.width, s.height))
    }

    fn bind_target(&mut self, target: Option<TargetHandle>) {
        self.bound = target;
        self.stats.target_binds += 1;
    }

    fn bound_target(&self) -> Option<TargetHandle> {
        self.bound
    }

    fn bind_texture(&mut self, unit: u32, target: TargetHandle) -> VfxResult<()> {
        if unit >= MAX_TEXTURE_UNITS {
            return Err(VfxError::invalid(format!("texture unit {} out of range", unit)));
        }
        if !self.targets.contains_key(&target) {
            return Err(VfxError::UnknownHandle {
                kind: "target",
                id: target.0,
            });
        }
        self.units[unit as usize] = Some(target);
        self.stats.texture_binds += 1;
        Ok(())
    }

    fn unbind_texture(&mut self, unit: u32) {
        if let Some(slot) = self.units.get_mut(unit as usize) {
            *slot = None;
            self.stats.texture_binds += 1;
        }
    }

    fn set_blending(&mut self, blend: Option<BlendFunc>) {
        if self.blend != blend {
            self.blend = blend;
            self.stats.blend_changes += 1;
        }
    }

    fn blending(&self) -> Option<BlendFunc> {
        self.blend
    }

    fn draw_quad(&mut self, program: ProgramHandle) -> VfxResult<()> {
        let target = self
            .bound
            .ok_or_else(|| VfxError::invalid("draw with no render target bound"))?;
        if self.units.contains(&Some(target)) {
            return Err(VfxError::invalid(format!(
                "target {} is bound both as input and output",
                target.0
            )));
        }
        let prog = self.programs.get(&program).ok_or(VfxError::UnknownHandle {
            kind: "program",
            id: program.0,
        })?;
        let mut surface = self.targets.remove(&target).ok_or(VfxError::UnknownHandle {
            kind: "target",
            id: target.0,
        })?;

        let units = [
            self.units[0].and_then(|t| self.targets.get(&t)),
            self.units[1].and_then(|t| self.targets.get(&t)),
        ];
        let (width, height) = (surface.width, surface.height);
        let clamp = surface.format.is_normalized();
        let blend = self.blend;

        surface
            .pixels
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let frag = Fragment {
                        uv: [
                            (x as f32 + 0.5) / width as f32,
                            (y as f32 + 0.5) / height as f32,
                        ],
                        viewport: (width, height),
                        program: prog,
                        units,
                    };
                    let mut out = (prog.kernel)(&frag);
                    if let Some(blend) = blend {
                        out = blend.apply(out, *px);
                    }
                    *px = if clamp { out.clamp01() } else { out };
                }
            });

        self.targets.insert(target, surface);
        self.stats.draws += 1;
        Ok(())
    }

    fn write_pixels(&mut self, target: TargetHandle, pixels: &[RGBA]) -> VfxResult<()> {
        let surface = self.targets.get_mut(&target).ok_or(VfxError::UnknownHandle {
            kind: "target",
            id: target.0,
        })?;
        if pixels.len() != surface.pixels.len() {
            return Err(VfxError::invalid(format!(
                "expected {} pixels for a {}x{} target, got {}",
                surface.pixels.len(),
                surface.width,
                surface.height,
                pixels.len()
            )));
        }
        let clamp = surface.format.is_normalized();
        for (dst, src) in surface.pixels.iter_mut().zip(pixels) {
            *dst = if clamp { src.clamp01() } else { *src };
        }
        self.stats.pixel_transfers += 1;
        Ok(())
    }

    fn read_pixels(&mut self, target: TargetHandle) -> VfxResult<Vec<RGBA>> {
        let surface = self.targets.get(&target).ok_or(VfxError::UnknownHandle {
            kind: "target",
            id: target.0,
        })?;
        self.stats.pixel_transfers += 1;
        Ok(surface.pixels.clone())
    }
}
