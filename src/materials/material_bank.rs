// src/materials/material_bank.rs
//
// Material bank for the fireplace scene.
//
//  - Programs are created once per bank and shared behind `Arc`; every material built from a
//    program holds a clone of that `Arc`.
//  - Uniforms are per-material values (`UniformBundle`), cloned deeply.
//  - Every uniform write bumps the material's revision so a backend re-uploads only what
//    changed since its last frame.
//  - `gpu_uniforms()` packs the bundle into the `Pod` struct the WGSL side expects.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use log::debug;

use super::program::{BlendMode, RenderState, ShaderProgram};
use super::uniforms::{TextureHandle, UniformBundle, UniformDef, UniformValue};
use super::MaterialError;
use crate::params::{FireParams, DETAILS_RANGE, INTENSITY_RANGE, OPACITY_RANGE, STYLIZE_RANGE};

// Uniform names, shared with the WGSL sources.
pub const MAP: &str = "map";
pub const RATIO_R: &str = "ratioR";
pub const RATIO_G: &str = "ratioG";
pub const RATIO_B: &str = "ratioB";
pub const GAMMA: &str = "gamma";
pub const NOISE_MAP: &str = "noiseMap";
pub const TIME: &str = "time";
pub const OPACITY: &str = "opacity";
pub const INTENSITY: &str = "intensity";
pub const STYLIZE_RATIO: &str = "stylizeRatio";
pub const STYLIZE_THRESHOLD: &str = "stylizeThreshold";
pub const GRAYSCALE: &str = "grayscale";
pub const DETAILS: &str = "details";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Baked RGB lightmap re-tinted per channel.
    Lightmap,
    Fire,
    Ash,
}

/// Initial tint ratios and gamma of a lightmap material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TintDefaults {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub gamma: f32,
}

impl Default for TintDefaults {
    fn default() -> Self {
        Self { r: 0.0, g: 1.0, b: 0.0, gamma: 1.0 }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GPU layouts
// ═══════════════════════════════════════════════════════════════════════════════

/// Matches `LightmapUniforms` in rgb_lightmap_frag.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightmapUniforms {
    pub ratio: [f32; 3],
    pub gamma: f32,
}

/// Matches `FireUniforms` in fire_frag.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FireUniforms {
    pub time: f32,
    pub opacity: f32,
    pub intensity: f32,
    pub stylize_ratio: f32,
    pub stylize_threshold: f32,
    pub grayscale: u32,
    pub details: f32,
    pub _pad: f32,
}

/// Matches `AshUniforms` in ash_frag.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct AshUniforms {
    pub intensity: f32,
    pub time: f32,
    pub _pad: [f32; 2],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GpuUniforms {
    Lightmap(LightmapUniforms),
    Fire(FireUniforms),
    Ash(AshUniforms),
}

impl GpuUniforms {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            GpuUniforms::Lightmap(u) => bytemuck::bytes_of(u),
            GpuUniforms::Fire(u) => bytemuck::bytes_of(u),
            GpuUniforms::Ash(u) => bytemuck::bytes_of(u),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ShaderMaterial
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared program + owned uniforms + fixed-function state.
///
/// `Clone` shares the program and deep-copies the uniforms.
#[derive(Debug, Clone)]
pub struct ShaderMaterial {
    name: String,
    kind: MaterialKind,
    program: Arc<ShaderProgram>,
    uniforms: UniformBundle,
    state: RenderState,
    revision: u64,
}

impl ShaderMaterial {
    fn new(
        name: impl Into<String>,
        kind: MaterialKind,
        program: Arc<ShaderProgram>,
        uniforms: UniformBundle,
        state: RenderState,
    ) -> Self {
        Self { name: name.into(), kind, program, uniforms, state, revision: 0 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MaterialKind {
        self.kind
    }

    pub fn program(&self) -> &Arc<ShaderProgram> {
        &self.program
    }

    pub fn uniforms(&self) -> &UniformBundle {
        &self.uniforms
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Bumped on every uniform write.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn uniforms_mut(&mut self) -> &mut UniformBundle {
        self.revision += 1;
        &mut self.uniforms
    }

    /// The single texture the fragment stage samples.
    pub fn texture(&self) -> Result<TextureHandle, MaterialError> {
        match self.kind {
            MaterialKind::Lightmap => self.uniforms.texture(MAP),
            MaterialKind::Fire | MaterialKind::Ash => self.uniforms.texture(NOISE_MAP),
        }
    }

    /// `[ratioR, ratioG, ratioB]` of a lightmap material.
    pub fn tint(&self) -> Result<[f32; 3], MaterialError> {
        Ok([
            self.uniforms.float(RATIO_R)?,
            self.uniforms.float(RATIO_G)?,
            self.uniforms.float(RATIO_B)?,
        ])
    }

    /// Pack the uniform bundle for upload.
    pub fn gpu_uniforms(&self) -> Result<GpuUniforms, MaterialError> {
        let u = &self.uniforms;
        Ok(match self.kind {
            MaterialKind::Lightmap => GpuUniforms::Lightmap(LightmapUniforms {
                ratio: self.tint()?,
                gamma: u.float(GAMMA)?,
            }),
            MaterialKind::Fire => GpuUniforms::Fire(FireUniforms {
                time: u.float(TIME)?,
                opacity: u.float(OPACITY)?,
                intensity: u.float(INTENSITY)?,
                stylize_ratio: u.float(STYLIZE_RATIO)?,
                stylize_threshold: u.float(STYLIZE_THRESHOLD)?,
                grayscale: u.bool(GRAYSCALE)? as u32,
                details: u.float(DETAILS)?,
                _pad: 0.0,
            }),
            MaterialKind::Ash => GpuUniforms::Ash(AshUniforms {
                intensity: u.float(INTENSITY)?,
                time: u.float(TIME)?,
                _pad: [0.0; 2],
            }),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MaterialBank
// ═══════════════════════════════════════════════════════════════════════════════

/// Owns every material of the scene; callers address them by [`MaterialId`].
#[derive(Debug)]
pub struct MaterialBank {
    materials: Vec<ShaderMaterial>,
    lightmap_program: Arc<ShaderProgram>,
    fire_program: Arc<ShaderProgram>,
    ash_program: Arc<ShaderProgram>,
}

impl Default for MaterialBank {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialBank {
    pub fn new() -> Self {
        Self {
            materials: Vec::new(),
            lightmap_program: Arc::new(ShaderProgram::rgb_lightmap()),
            fire_program: Arc::new(ShaderProgram::fire()),
            ash_program: Arc::new(ShaderProgram::ash()),
        }
    }

    fn insert(&mut self, material: ShaderMaterial) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        debug!("material {:?} `{}` ({:?})", id, material.name, material.kind);
        self.materials.push(material);
        id
    }

    pub fn get(&self, id: MaterialId) -> Result<&ShaderMaterial, MaterialError> {
        self.materials
            .get(id.0 as usize)
            .ok_or(MaterialError::UnknownMaterial(id))
    }

    /// Current value of one uniform.
    pub fn uniform(&self, id: MaterialId, name: &str) -> Result<UniformValue, MaterialError> {
        self.get(id)?
            .uniforms
            .get(name)
            .ok_or_else(|| MaterialError::UnknownUniform(name.to_string()))
    }

    fn get_mut(&mut self, id: MaterialId) -> Result<&mut ShaderMaterial, MaterialError> {
        self.materials
            .get_mut(id.0 as usize)
            .ok_or(MaterialError::UnknownMaterial(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &ShaderMaterial)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(i, m)| (MaterialId(i as u32), m))
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Lightmap material sampling `texture`, tinted by three ratios plus gamma.
    pub fn create_lightmap_material(&mut self, texture: TextureHandle, tint: TintDefaults) -> MaterialId {
        let uniforms = UniformBundle::new([
            UniformDef::texture(MAP, texture),
            UniformDef::float(RATIO_R, tint.r),
            UniformDef::float(RATIO_G, tint.g),
            UniformDef::float(RATIO_B, tint.b),
            UniformDef::float(GAMMA, tint.gamma),
        ]);
        self.insert(ShaderMaterial::new(
            "rgb_lightmap",
            MaterialKind::Lightmap,
            Arc::clone(&self.lightmap_program),
            uniforms,
            RenderState::OPAQUE,
        ))
    }

    /// Independent copy of a lightmap material, rebound to `texture`.
    pub fn clone_lightmap_material(
        &mut self,
        source: MaterialId,
        texture: TextureHandle,
    ) -> Result<MaterialId, MaterialError> {
        let src = self.get(source)?;
        if src.kind != MaterialKind::Lightmap {
            return Err(MaterialError::WrongKind {
                id: source,
                expected: MaterialKind::Lightmap,
                found: src.kind,
            });
        }
        let mut copy = src.clone();
        copy.revision = 0;
        copy.uniforms.set_texture(MAP, texture)?;
        Ok(self.insert(copy))
    }

    /// Additive, double-sided procedural fire.
    pub fn create_fire_material(&mut self, noise: TextureHandle) -> MaterialId {
        let defaults = FireParams::default();
        let uniforms = UniformBundle::new([
            UniformDef::texture(NOISE_MAP, noise),
            UniformDef::float(TIME, 0.0),
            UniformDef::float(OPACITY, defaults.opacity).with_range(OPACITY_RANGE.0..=OPACITY_RANGE.1),
            UniformDef::float(INTENSITY, defaults.intensity)
                .with_range(INTENSITY_RANGE.0..=INTENSITY_RANGE.1),
            UniformDef::float(STYLIZE_RATIO, defaults.stylize_ratio)
                .with_range(STYLIZE_RANGE.0..=STYLIZE_RANGE.1),
            UniformDef::float(STYLIZE_THRESHOLD, defaults.stylize_threshold)
                .with_range(STYLIZE_RANGE.0..=STYLIZE_RANGE.1),
            UniformDef::bool(GRAYSCALE, defaults.grayscale),
            UniformDef::float(DETAILS, defaults.details).with_range(DETAILS_RANGE.0..=DETAILS_RANGE.1),
        ]);
        self.insert(ShaderMaterial::new(
            "fire",
            MaterialKind::Fire,
            Arc::clone(&self.fire_program),
            uniforms,
            RenderState::volume(BlendMode::Additive),
        ))
    }

    /// Multiply-blended, double-sided ash bed.
    pub fn create_ash_material(&mut self, noise: TextureHandle) -> MaterialId {
        let uniforms = UniformBundle::new([
            UniformDef::texture(NOISE_MAP, noise),
            UniformDef::float(INTENSITY, 1.0),
            UniformDef::float(TIME, 0.0),
        ]);
        self.insert(ShaderMaterial::new(
            "ash",
            MaterialKind::Ash,
            Arc::clone(&self.ash_program),
            uniforms,
            RenderState::volume(BlendMode::Multiply),
        ))
    }

    /// Overwrite the three tint ratios in one call.
    pub fn set_tint(&mut self, id: MaterialId, r: f32, g: f32, b: f32) -> Result<(), MaterialError> {
        let material = self.get_mut(id)?;
        // validate before bumping the revision
        material.tint()?;
        material
            .uniforms_mut()
            .set_floats(&[(RATIO_R, r), (RATIO_G, g), (RATIO_B, b)])
    }

    pub fn set_time(&mut self, id: MaterialId, t: f32) -> Result<(), MaterialError> {
        let material = self.get_mut(id)?;
        material.uniforms.float(TIME)?;
        material.uniforms_mut().set_float(TIME, t)
    }

    /// Push the panel-driven fire uniforms.
    pub fn set_fire_params(&mut self, id: MaterialId, params: &FireParams) -> Result<(), MaterialError> {
        let material = self.get_mut(id)?;
        if material.kind != MaterialKind::Fire {
            return Err(MaterialError::WrongKind {
                id,
                expected: MaterialKind::Fire,
                found: material.kind,
            });
        }
        let uniforms = material.uniforms_mut();
        uniforms.set_floats(&[
            (OPACITY, params.opacity),
            (INTENSITY, params.intensity),
            (STYLIZE_RATIO, params.stylize_ratio),
            (STYLIZE_THRESHOLD, params.stylize_threshold),
            (DETAILS, params.details),
        ])?;
        uniforms.set_bool(GRAYSCALE, params.grayscale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::{Side, UniformValue};

    #[test]
    fn lightmap_clone_shares_program_but_not_uniforms() {
        let mut bank = MaterialBank::new();
        let fireplace = bank.create_lightmap_material(TextureHandle(1), TintDefaults::default());
        let floor = bank.clone_lightmap_material(fireplace, TextureHandle(2)).unwrap();

        assert!(Arc::ptr_eq(
            bank.get(fireplace).unwrap().program(),
            bank.get(floor).unwrap().program()
        ));

        bank.set_tint(floor, 1.0, 0.0, 0.0).unwrap();
        assert_eq!(bank.get(fireplace).unwrap().tint().unwrap(), [0.0, 1.0, 0.0]);
        assert_eq!(bank.get(floor).unwrap().tint().unwrap(), [1.0, 0.0, 0.0]);

        assert_eq!(bank.get(fireplace).unwrap().texture().unwrap(), TextureHandle(1));
        assert_eq!(bank.get(floor).unwrap().texture().unwrap(), TextureHandle(2));
    }

    #[test]
    fn fire_material_defaults_and_state() {
        let mut bank = MaterialBank::new();
        let fire = bank.create_fire_material(TextureHandle(7));
        let m = bank.get(fire).unwrap();

        assert_eq!(m.state().blend, BlendMode::Additive);
        assert_eq!(m.state().side, Side::Double);
        assert!(!m.state().transparent);
        assert_eq!(m.uniforms().get(GRAYSCALE), Some(UniformValue::Bool(false)));
        assert_eq!(m.uniforms().range(INTENSITY), Some(0.5..=1.5));

        let GpuUniforms::Fire(u) = m.gpu_uniforms().unwrap() else {
            panic!("fire material packed as the wrong layout");
        };
        assert_eq!(u.time, 0.0);
        assert_eq!(u.opacity, 1.0);
        assert_eq!(u.details, 0.5);
        assert_eq!(u.grayscale, 0);
        assert_eq!(m.gpu_uniforms().unwrap().as_bytes().len(), 32);
    }

    #[test]
    fn ash_material_is_multiply_blended() {
        let mut bank = MaterialBank::new();
        let ash = bank.create_ash_material(TextureHandle(7));
        bank.set_time(ash, 2.5).unwrap();
        let m = bank.get(ash).unwrap();
        assert_eq!(m.state().blend, BlendMode::Multiply);
        assert_eq!(
            m.gpu_uniforms().unwrap(),
            GpuUniforms::Ash(AshUniforms { intensity: 1.0, time: 2.5, _pad: [0.0; 2] })
        );
    }

    #[test]
    fn writes_bump_revision_only_on_success() {
        let mut bank = MaterialBank::new();
        let fire = bank.create_fire_material(TextureHandle(0));
        assert_eq!(bank.get(fire).unwrap().revision(), 0);

        assert!(bank.set_tint(fire, 1.0, 1.0, 1.0).is_err());
        assert_eq!(bank.get(fire).unwrap().revision(), 0);

        bank.set_time(fire, 1.0).unwrap();
        bank.set_fire_params(fire, &FireParams { grayscale: true, ..FireParams::default() })
            .unwrap();
        assert_eq!(bank.get(fire).unwrap().revision(), 2);
        assert!(bank.get(fire).unwrap().uniforms().bool(GRAYSCALE).unwrap());
    }

    #[test]
    fn cloning_a_non_lightmap_is_rejected() {
        let mut bank = MaterialBank::new();
        let ash = bank.create_ash_material(TextureHandle(0));
        let err = bank.clone_lightmap_material(ash, TextureHandle(1)).unwrap_err();
        assert!(matches!(err, MaterialError::WrongKind { found: MaterialKind::Ash, .. }));
        assert!(matches!(
            bank.set_time(MaterialId(42), 0.0),
            Err(MaterialError::UnknownMaterial(MaterialId(42)))
        ));
    }
}
