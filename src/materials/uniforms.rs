// src/materials/uniforms.rs
//! Uniform storage for shader materials.
//!
//! A [`UniformBundle`] is a plain value: cloning it deep-copies every entry, so two materials
//! built from the same program never observe each other's writes. Lookup is a linear scan;
//! materials here expose at most eight uniforms.

use std::fmt;
use std::ops::RangeInclusive;

use super::MaterialError;

/// Opaque handle to a texture owned by the render backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureHandle(pub u32);

/// Type tag of a uniform value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Bool,
    Texture,
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UniformKind::Float => "float",
            UniformKind::Bool => "bool",
            UniformKind::Texture => "texture",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Bool(bool),
    Texture(TextureHandle),
}

impl UniformValue {
    #[inline]
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Bool(_) => UniformKind::Bool,
            UniformValue::Texture(_) => UniformKind::Texture,
        }
    }
}

/// Declaration of one uniform: name, initial value and the range a host panel may use.
#[derive(Debug, Clone)]
pub struct UniformDef {
    pub name: &'static str,
    pub default: UniformValue,
    pub range: Option<RangeInclusive<f32>>,
}

impl UniformDef {
    pub fn float(name: &'static str, default: f32) -> Self {
        Self { name, default: UniformValue::Float(default), range: None }
    }

    pub fn bool(name: &'static str, default: bool) -> Self {
        Self { name, default: UniformValue::Bool(default), range: None }
    }

    pub fn texture(name: &'static str, handle: TextureHandle) -> Self {
        Self { name, default: UniformValue::Texture(handle), range: None }
    }

    pub fn with_range(mut self, range: RangeInclusive<f32>) -> Self {
        self.range = Some(range);
        self
    }
}

#[derive(Debug, Clone)]
struct UniformSlot {
    def: UniformDef,
    value: UniformValue,
}

/// Named, typed uniform values owned by exactly one material.
#[derive(Debug, Clone, Default)]
pub struct UniformBundle {
    slots: Vec<UniformSlot>,
}

impl UniformBundle {
    pub fn new(defs: impl IntoIterator<Item = UniformDef>) -> Self {
        let slots = defs
            .into_iter()
            .map(|def| UniformSlot { value: def.default, def })
            .collect();
        Self { slots }
    }

    fn slot(&self, name: &str) -> Result<&UniformSlot, MaterialError> {
        self.slots
            .iter()
            .find(|s| s.def.name == name)
            .ok_or_else(|| MaterialError::UnknownUniform(name.to_string()))
    }

    fn slot_mut(&mut self, name: &str, kind: UniformKind) -> Result<&mut UniformValue, MaterialError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.def.name == name)
            .ok_or_else(|| MaterialError::UnknownUniform(name.to_string()))?;
        let found = slot.value.kind();
        if found != kind {
            return Err(MaterialError::TypeMismatch {
                name: name.to_string(),
                expected: kind,
                found,
            });
        }
        Ok(&mut slot.value)
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.slot(name).ok().map(|s| s.value)
    }

    pub fn range(&self, name: &str) -> Option<RangeInclusive<f32>> {
        self.slot(name).ok().and_then(|s| s.def.range.clone())
    }

    pub fn float(&self, name: &str) -> Result<f32, MaterialError> {
        match self.slot(name)?.value {
            UniformValue::Float(v) => Ok(v),
            other => Err(MaterialError::TypeMismatch {
                name: name.to_string(),
                expected: UniformKind::Float,
                found: other.kind(),
            }),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, MaterialError> {
        match self.slot(name)?.value {
            UniformValue::Bool(v) => Ok(v),
            other => Err(MaterialError::TypeMismatch {
                name: name.to_string(),
                expected: UniformKind::Bool,
                found: other.kind(),
            }),
        }
    }

    pub fn texture(&self, name: &str) -> Result<TextureHandle, MaterialError> {
        match self.slot(name)?.value {
            UniformValue::Texture(v) => Ok(v),
            other => Err(MaterialError::TypeMismatch {
                name: name.to_string(),
                expected: UniformKind::Texture,
                found: other.kind(),
            }),
        }
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> Result<(), MaterialError> {
        *self.slot_mut(name, UniformKind::Float)? = UniformValue::Float(value);
        Ok(())
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<(), MaterialError> {
        *self.slot_mut(name, UniformKind::Bool)? = UniformValue::Bool(value);
        Ok(())
    }

    pub fn set_texture(&mut self, name: &str, handle: TextureHandle) -> Result<(), MaterialError> {
        *self.slot_mut(name, UniformKind::Texture)? = UniformValue::Texture(handle);
        Ok(())
    }

    /// Write several floats; either all land or none do.
    pub fn set_floats(&mut self, values: &[(&str, f32)]) -> Result<(), MaterialError> {
        for (name, _) in values {
            self.slot_mut(name, UniformKind::Float)?;
        }
        for (name, value) in values {
            self.set_float(name, *value)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> UniformBundle {
        UniformBundle::new([
            UniformDef::texture("map", TextureHandle(3)),
            UniformDef::float("ratioR", 0.0).with_range(0.0..=2.0),
            UniformDef::float("ratioG", 1.0),
            UniformDef::bool("grayscale", false),
        ])
    }

    #[test]
    fn defaults_are_readable() {
        let b = bundle();
        assert_eq!(b.len(), 4);
        assert_eq!(b.texture("map").unwrap(), TextureHandle(3));
        assert_eq!(b.float("ratioG").unwrap(), 1.0);
        assert!(!b.bool("grayscale").unwrap());
        assert_eq!(b.range("ratioR"), Some(0.0..=2.0));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let mut b = bundle();
        let err = b.set_float("grayscale", 1.0).unwrap_err();
        assert!(matches!(
            err,
            MaterialError::TypeMismatch { expected: UniformKind::Float, found: UniformKind::Bool, .. }
        ));
        assert!(matches!(b.float("nope"), Err(MaterialError::UnknownUniform(_))));
    }

    #[test]
    fn batch_write_is_all_or_nothing() {
        let mut b = bundle();
        let err = b.set_floats(&[("ratioR", 0.5), ("missing", 1.0)]);
        assert!(err.is_err());
        assert_eq!(b.float("ratioR").unwrap(), 0.0);

        b.set_floats(&[("ratioR", 0.5), ("ratioG", 0.25)]).unwrap();
        assert_eq!(b.float("ratioR").unwrap(), 0.5);
        assert_eq!(b.float("ratioG").unwrap(), 0.25);
    }

    #[test]
    fn clones_do_not_share_storage() {
        let a = bundle();
        let mut b = a.clone();
        b.set_float("ratioR", 1.0).unwrap();
        assert_eq!(a.float("ratioR").unwrap(), 0.0);
    }
}
