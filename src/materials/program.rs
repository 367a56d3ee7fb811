// src/materials/program.rs
//! Shader programs and fixed-function render state.
//!
//! Programs are immutable and shared behind `Arc`; a material only owns its uniforms.

/// One WGSL stage: source text and entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStage {
    pub label: &'static str,
    pub source: &'static str,
    pub entry: &'static str,
}

/// Vertex + fragment stage pair.
#[derive(Debug, PartialEq, Eq)]
pub struct ShaderProgram {
    pub name: &'static str,
    pub vertex: ShaderStage,
    pub fragment: ShaderStage,
}

pub const BASIC_VERT: ShaderStage = ShaderStage {
    label: "basic_vert",
    source: include_str!("../shaders/basic_vert.wgsl"),
    entry: "vs_main",
};

pub const VOLUME_VERT: ShaderStage = ShaderStage {
    label: "volume_vert",
    source: include_str!("../shaders/volume_vert.wgsl"),
    entry: "vs_main",
};

pub const RGB_LIGHTMAP_FRAG: ShaderStage = ShaderStage {
    label: "rgb_lightmap_frag",
    source: include_str!("../shaders/rgb_lightmap_frag.wgsl"),
    entry: "fs_main",
};

pub const FIRE_FRAG: ShaderStage = ShaderStage {
    label: "fire_frag",
    source: include_str!("../shaders/fire_frag.wgsl"),
    entry: "fs_main",
};

pub const ASH_FRAG: ShaderStage = ShaderStage {
    label: "ash_frag",
    source: include_str!("../shaders/ash_frag.wgsl"),
    entry: "fs_main",
};

impl ShaderProgram {
    pub fn rgb_lightmap() -> Self {
        Self { name: "rgb_lightmap", vertex: BASIC_VERT, fragment: RGB_LIGHTMAP_FRAG }
    }

    pub fn fire() -> Self {
        Self { name: "fire", vertex: VOLUME_VERT, fragment: FIRE_FRAG }
    }

    pub fn ash() -> Self {
        Self { name: "ash", vertex: VOLUME_VERT, fragment: ASH_FRAG }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// `src·srcα + dst`
    Additive,
    /// `dst·src`
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Front,
    Double,
}

/// Fixed-function state a backend needs to build a pipeline for a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderState {
    pub blend: BlendMode,
    pub side: Side,
    pub transparent: bool,
    pub depth_write: bool,
}

impl RenderState {
    pub const OPAQUE: RenderState = RenderState {
        blend: BlendMode::Opaque,
        side: Side::Front,
        transparent: false,
        depth_write: true,
    };

    /// Double-sided blended volume; does not write depth.
    pub const fn volume(blend: BlendMode) -> RenderState {
        RenderState { blend, side: Side::Double, transparent: false, depth_write: false }
    }
}
