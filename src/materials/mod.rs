// src/materials/mod.rs
//! Shader materials: shared programs, per-material uniform bundles and the bank that owns them.

mod material_bank;
mod program;
mod uniforms;

use thiserror::Error;

pub use material_bank::{
    AshUniforms, FireUniforms, GpuUniforms, LightmapUniforms, MaterialBank, MaterialId, MaterialKind,
    ShaderMaterial, TintDefaults,
};
pub use program::{BlendMode, RenderState, ShaderProgram, ShaderStage, Side};
pub use uniforms::{TextureHandle, UniformBundle, UniformDef, UniformKind, UniformValue};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaterialError {
    #[error("unknown material {0:?}")]
    UnknownMaterial(MaterialId),

    #[error("unknown uniform `{0}`")]
    UnknownUniform(String),

    #[error("uniform `{name}` is a {found}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: UniformKind,
        found: UniformKind,
    },

    #[error("material {id:?} is a {found:?} material, expected {expected:?}")]
    WrongKind {
        id: MaterialId,
        expected: MaterialKind,
        found: MaterialKind,
    },
}
