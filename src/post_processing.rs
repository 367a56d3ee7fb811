// src/post_processing.rs
// Post-processing chain description: scene pass, bloom, output (tone mapping).
//
// Backend-agnostic. The GPU side (src/gpu/bloom.rs) reads the settings and buffer sizes from
// here; `resize` is the only way the buffer size changes.

use bytemuck::{Pod, Zeroable};

/// Bloom settings. Defaults: threshold 0.8, strength 0.25, radius 0.1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
    /// Buffer size before the first resize.
    pub base_resolution: (u32, u32),
    pub mip_count: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            strength: 0.25,
            radius: 0.1,
            base_resolution: (1024, 1024),
            mip_count: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToneMapping {
    Linear { exposure: f32 },
}

impl Default for ToneMapping {
    fn default() -> Self {
        ToneMapping::Linear { exposure: 1.0 }
    }
}

impl ToneMapping {
    pub fn exposure(&self) -> f32 {
        match *self {
            ToneMapping::Linear { exposure } => exposure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassKind {
    /// Render the scene into the HDR target.
    Scene,
    Bloom(BloomSettings),
    /// Tone map and write to the surface.
    Output(ToneMapping),
}

/// Ordered pass list plus the size every intermediate buffer is allocated at.
#[derive(Debug, Clone, PartialEq)]
pub struct PostChain {
    passes: Vec<PassKind>,
    buffer_size: (u32, u32),
}

impl Default for PostChain {
    fn default() -> Self {
        Self::new(BloomSettings::default(), ToneMapping::default())
    }
}

impl PostChain {
    pub fn new(bloom: BloomSettings, tone_mapping: ToneMapping) -> Self {
        Self {
            buffer_size: bloom.base_resolution,
            passes: vec![PassKind::Scene, PassKind::Bloom(bloom), PassKind::Output(tone_mapping)],
        }
    }

    pub fn passes(&self) -> &[PassKind] {
        &self.passes
    }

    pub fn bloom(&self) -> Option<&BloomSettings> {
        self.passes.iter().find_map(|p| match p {
            PassKind::Bloom(b) => Some(b),
            _ => None,
        })
    }

    pub fn bloom_mut(&mut self) -> Option<&mut BloomSettings> {
        self.passes.iter_mut().find_map(|p| match p {
            PassKind::Bloom(b) => Some(b),
            _ => None,
        })
    }

    pub fn tone_mapping(&self) -> ToneMapping {
        self.passes
            .iter()
            .find_map(|p| match p {
                PassKind::Output(t) => Some(*t),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// No-op when the chain has no bloom pass.
    pub fn set_bloom_strength(&mut self, strength: f32) {
        if let Some(bloom) = self.bloom_mut() {
            bloom.strength = strength;
        }
    }

    pub fn buffer_size(&self) -> (u32, u32) {
        self.buffer_size
    }

    /// Reallocation size for every intermediate buffer. Zero dimensions become 1.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.buffer_size = (width.max(1), height.max(1));
    }

    /// Bloom mip chain sizes, starting at half the buffer size.
    pub fn bloom_mip_sizes(&self) -> Vec<(u32, u32)> {
        match self.bloom() {
            Some(bloom) => mip_chain(self.buffer_size, bloom.mip_count),
            None => Vec::new(),
        }
    }
}

/// `count` successive halvings of `size`, each dimension at least 1.
pub fn mip_chain((w, h): (u32, u32), count: u32) -> Vec<(u32, u32)> {
    (1..=count.min(31))
        .map(|level| ((w >> level).max(1), (h >> level).max(1)))
        .collect()
}

// ============================================================================
// GPU uniform layouts (match bloom.wgsl / output.wgsl)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct BloomUniforms {
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
    pub mip_count: u32,
    pub texel_size: [f32; 2],
    pub _pad: [f32; 2],
}

impl BloomUniforms {
    /// `source_size` is the texture being sampled by the pass.
    pub fn new(settings: &BloomSettings, source_size: (u32, u32)) -> Self {
        Self {
            threshold: settings.threshold,
            strength: settings.strength,
            radius: settings.radius,
            mip_count: settings.mip_count,
            texel_size: [1.0 / source_size.0.max(1) as f32, 1.0 / source_size.1.max(1) as f32],
            _pad: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct OutputUniforms {
    pub exposure: f32,
    pub _pad: [f32; 3],
}

impl OutputUniforms {
    pub fn new(tone_mapping: ToneMapping) -> Self {
        Self { exposure: tone_mapping.exposure(), _pad: [0.0; 3] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_order() {
        let chain = PostChain::default();
        assert!(matches!(chain.passes()[0], PassKind::Scene));
        assert!(matches!(chain.passes()[1], PassKind::Bloom(_)));
        assert!(matches!(chain.passes()[2], PassKind::Output(ToneMapping::Linear { exposure }) if exposure == 1.0));
        assert_eq!(chain.buffer_size(), (1024, 1024));
        let bloom = chain.bloom().unwrap();
        assert_eq!((bloom.threshold, bloom.strength, bloom.radius), (0.8, 0.25, 0.1));
    }

    #[test]
    fn resize_drives_mip_chain() {
        let mut chain = PostChain::default();
        chain.resize(800, 600);
        assert_eq!(chain.buffer_size(), (800, 600));
        assert_eq!(
            chain.bloom_mip_sizes(),
            vec![(400, 300), (200, 150), (100, 75), (50, 37), (25, 18)]
        );
        chain.resize(0, 3);
        assert_eq!(chain.buffer_size(), (1, 3));
        assert!(chain.bloom_mip_sizes().iter().all(|&(w, h)| w >= 1 && h >= 1));
    }

    #[test]
    fn strength_is_live() {
        let mut chain = PostChain::default();
        chain.set_bloom_strength(1.5);
        assert_eq!(chain.bloom().unwrap().strength, 1.5);
        assert_eq!(std::mem::size_of::<BloomUniforms>(), 32);
        assert_eq!(std::mem::size_of::<OutputUniforms>(), 16);
    }
}
