//! Declared uniform slots and the staged-write cache in front of them
//!
//! Every pass declares its parameters once, as a table of [`ParamDecl`].
//! Setters stage values here; [`UniformParameterSet::flush`] pushes the dirty
//! ones to the program in declaration order. Uploads are driver round trips,
//! so a flush with nothing staged issues no calls at all.

use std::collections::{BTreeSet, HashMap};

use crate::error::{VfxError, VfxResult};
use crate::gpu::{GraphicsContext, ProgramHandle, UniformLocation};

/// A typed value for one uniform slot
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    /// Packed array; logical element size is the slot's declared stride
    FloatArray(Vec<f32>),
}

impl UniformValue {
    /// Number of float components carried by the value
    pub fn components(&self) -> usize {
        match self {
            UniformValue::Float(_) | UniformValue::Int(_) => 1,
            UniformValue::Vec2(_) => 2,
            UniformValue::Vec3(_) => 3,
            UniformValue::FloatArray(v) => v.len(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, UniformValue::FloatArray(_))
    }

    /// Components as floats; integers are converted
    pub fn as_floats(&self) -> Vec<f32> {
        match self {
            UniformValue::Float(f) => vec![*f],
            UniformValue::Int(i) => vec![*i as f32],
            UniformValue::Vec2(v) => v.to_vec(),
            UniformValue::Vec3(v) => v.to_vec(),
            UniformValue::FloatArray(v) => v.clone(),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(v: Vec<f32>) -> Self {
        UniformValue::FloatArray(v)
    }
}

impl From<&[f32]> for UniformValue {
    fn from(v: &[f32]) -> Self {
        UniformValue::FloatArray(v.to_vec())
    }
}

/// Declaration of one uniform slot.
///
/// `stride == 0` declares a scalar or vector. `stride > 0` declares an array
/// whose logical element is `stride` floats, holding at most `capacity`
/// elements (a packed list of 2D points has stride 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: &'static str,
    pub stride: usize,
    pub capacity: usize,
}

impl ParamDecl {
    pub const fn value(name: &'static str) -> Self {
        ParamDecl { name, stride: 0, capacity: 1 }
    }

    pub const fn array(name: &'static str, stride: usize, capacity: usize) -> Self {
        ParamDecl { name, stride, capacity }
    }

    pub fn is_array(&self) -> bool {
        self.stride > 0
    }

    /// Checks that `value` fits this slot
    pub fn check(&self, value: &UniformValue) -> VfxResult<()> {
        let len = value.components();
        let fits = if self.stride == 0 {
            !value.is_array()
        } else {
            value.is_array() && len % self.stride == 0 && len / self.stride <= self.capacity
        };
        if fits {
            Ok(())
        } else {
            Err(VfxError::ShapeMismatch {
                key: self.name.to_string(),
                stride: self.stride,
                len,
            })
        }
    }
}

#[derive(Debug)]
struct Slot {
    decl: ParamDecl,
    value: Option<UniformValue>,
    location: Option<UniformLocation>,
}

/// Name/slot registry plus batched-write cache for one program
#[derive(Debug)]
pub struct UniformParameterSet {
    program: String,
    slots: Vec<Slot>,
    index: HashMap<&'static str, usize>,
    dirty: BTreeSet<usize>,
}

impl UniformParameterSet {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            slots: Vec::new(),
            index: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Declares every entry of a parameter table, in order
    pub fn with_decls(program: impl Into<String>, decls: &[ParamDecl]) -> VfxResult<Self> {
        let mut set = Self::new(program);
        for decl in decls {
            set.declare(*decl)?;
        }
        Ok(set)
    }

    pub fn declare(&mut self, decl: ParamDecl) -> VfxResult<()> {
        if self.index.contains_key(decl.name) {
            return Err(VfxError::DuplicateParameter {
                program: self.program.clone(),
                key: decl.name.to_string(),
            });
        }
        self.index.insert(decl.name, self.slots.len());
        self.slots.push(Slot {
            decl,
            value: None,
            location: None,
        });
        Ok(())
    }

    /// Stages `value` for `key`. Re-staging the value already held by a clean
    /// slot is a no-op.
    pub fn stage(&mut self, key: &str, value: UniformValue) -> VfxResult<()> {
        let idx = *self
            .index
            .get(key)
            .ok_or_else(|| VfxError::UnknownParameter {
                program: self.program.clone(),
                key: key.to_string(),
            })?;
        let slot = &mut self.slots[idx];
        slot.decl.check(&value)?;

        if slot.value.as_ref() == Some(&value) && !self.dirty.contains(&idx) {
            return Ok(());
        }
        slot.value = Some(value);
        self.dirty.insert(idx);
        Ok(())
    }

    /// Pushes every dirty value to `program`, in declaration order.
    /// Returns the number of uploads issued.
    pub fn flush(&mut self, ctx: &mut dyn GraphicsContext, program: ProgramHandle) -> VfxResult<usize> {
        let mut uploads = 0;
        while let Some(idx) = self.dirty.pop_first() {
            let slot = &self.slots[idx];
            let (Some(value), Some(location)) = (slot.value.as_ref(), slot.location) else {
                // Unset, or not active in the linked program.
                continue;
            };
            if let Err(e) = ctx.set_uniform(program, location, value) {
                self.dirty.insert(idx);
                return Err(e);
            }
            uploads += 1;
        }
        Ok(uploads)
    }

    /// Re-queries every slot's location from the linked program
    pub fn resolve_locations(&mut self, ctx: &dyn GraphicsContext, program: ProgramHandle) {
        for slot in &mut self.slots {
            slot.location = ctx.uniform_location(program, slot.decl.name);
            if slot.location.is_none() {
                log::trace!("{}: uniform '{}' is not active", self.program, slot.decl.name);
            }
        }
    }

    /// Marks every slot holding a value as dirty, for a full resend
    pub fn mark_all_dirty(&mut self) {
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.value.is_some() {
                self.dirty.insert(idx);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&UniformValue> {
        self.index.get(key).and_then(|&idx| self.slots[idx].value.as_ref())
    }

    pub fn decls(&self) -> impl Iterator<Item = &ParamDecl> {
        self.slots.iter().map(|s| &s.decl)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}
