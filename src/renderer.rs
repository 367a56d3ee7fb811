// src/renderer.rs
//! Render pipeline front end: viewport bookkeeping, camera, post chain and the backend seam.
//!
//! [`RenderPipeline`] never touches the GPU itself. Everything a frame needs is handed to a
//! [`RenderBackend`] as a borrowed [`FrameView`], which keeps the animation loop testable with
//! a recording backend.

use log::debug;

use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::materials::MaterialBank;
use crate::post_processing::PostChain;
use crate::scene::FireplaceScene;

/// Allowed drift between camera aspect and viewport aspect.
const ASPECT_EPSILON: f32 = 1e-4;

/// Logical size plus pixel density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub pixel_density: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, pixel_density: f32) -> Self {
        Self { width, height, pixel_density }
    }

    #[inline]
    fn density(&self) -> f32 {
        if self.pixel_density.is_finite() && self.pixel_density > 0.0 {
            self.pixel_density
        } else {
            1.0
        }
    }

    /// Size in device pixels, never below 1×1.
    pub fn physical_size(&self) -> (u32, u32) {
        let d = self.density();
        let px = |v: f32| {
            let p = (v * d).round();
            if p.is_finite() && p >= 1.0 {
                p as u32
            } else {
                1
            }
        };
        (px(self.width), px(self.height))
    }

    pub fn aspect(&self) -> f32 {
        let (w, h) = self.physical_size();
        w as f32 / h as f32
    }
}

/// Borrowed snapshot of everything one frame draws.
pub struct FrameView<'a> {
    pub camera: &'a Camera,
    pub materials: &'a MaterialBank,
    pub scene: &'a FireplaceScene,
    pub chain: &'a PostChain,
    pub viewport: Viewport,
}

/// GPU side of the pipeline.
pub trait RenderBackend {
    /// Reallocate the surface and every size-dependent target. `chain` has already been
    /// resized; its buffer and bloom mip sizes are the ones to allocate.
    fn resize(&mut self, viewport: Viewport, chain: &PostChain) -> Result<()>;

    /// Draw one frame: scene pass, bloom, output.
    fn render(&mut self, frame: &FrameView<'_>) -> Result<()>;
}

pub struct RenderPipeline<B> {
    backend: B,
    camera: Camera,
    chain: PostChain,
    viewport: Viewport,
}

impl<B: RenderBackend> RenderPipeline<B> {
    /// Applies `viewport` immediately so camera, chain and backend start out consistent.
    pub fn new(backend: B, camera: Camera, chain: PostChain, viewport: Viewport) -> Result<Self> {
        let mut pipeline = Self { backend, camera, chain, viewport };
        pipeline.resize(viewport.width, viewport.height, viewport.pixel_density)?;
        Ok(pipeline)
    }

    /// Backend output size, post buffer size and camera aspect, in one call.
    pub fn resize(&mut self, width: f32, height: f32, pixel_density: f32) -> Result<()> {
        let viewport = Viewport::new(width, height, pixel_density);
        let (pw, ph) = viewport.physical_size();
        debug!("resize {}x{} @{} -> {}x{} px", width, height, pixel_density, pw, ph);

        self.chain.resize(pw, ph);
        self.backend.resize(viewport, &self.chain)?;
        self.camera.set_aspect(viewport.aspect());
        self.viewport = viewport;
        Ok(())
    }

    pub fn render(&mut self, materials: &MaterialBank, scene: &FireplaceScene) -> Result<()> {
        self.check_viewport()?;
        let frame = FrameView {
            camera: &self.camera,
            materials,
            scene,
            chain: &self.chain,
            viewport: self.viewport,
        };
        self.backend.render(&frame)
    }

    fn check_viewport(&self) -> Result<()> {
        let viewport_aspect = self.viewport.aspect();
        let surface_size = self.viewport.physical_size();
        let buffer_size = self.chain.buffer_size();
        if (self.camera.aspect - viewport_aspect).abs() > ASPECT_EPSILON || buffer_size != surface_size {
            return Err(Error::ViewportMismatch {
                camera_aspect: self.camera.aspect,
                viewport_aspect,
                buffer_size,
                surface_size,
            });
        }
        Ok(())
    }

    pub fn set_bloom_strength(&mut self, strength: f32) {
        self.chain.set_bloom_strength(strength);
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn chain(&self) -> &PostChain {
        &self.chain
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_processing::{BloomSettings, ToneMapping};

    #[derive(Default)]
    struct NullBackend {
        resized: Vec<Viewport>,
        mip_sizes: Vec<(u32, u32)>,
    }

    impl RenderBackend for NullBackend {
        fn resize(&mut self, viewport: Viewport, chain: &PostChain) -> Result<()> {
            self.resized.push(viewport);
            self.mip_sizes = chain.bloom_mip_sizes();
            Ok(())
        }

        fn render(&mut self, _frame: &FrameView<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn pipeline() -> RenderPipeline<NullBackend> {
        RenderPipeline::new(
            NullBackend::default(),
            Camera::default(),
            PostChain::default(),
            Viewport::new(1024.0, 768.0, 1.0),
        )
        .unwrap()
    }

    #[test]
    fn physical_size_is_clamped() {
        assert_eq!(Viewport::new(0.0, 0.0, 2.0).physical_size(), (1, 1));
        assert_eq!(Viewport::new(400.0, 300.0, 2.0).physical_size(), (800, 600));
        assert_eq!(Viewport::new(400.0, 300.0, f32::NAN).physical_size(), (400, 300));
    }

    #[test]
    fn resize_updates_everything_together() {
        let mut p = pipeline();
        p.resize(800.0, 600.0, 1.0).unwrap();
        assert!((p.camera().aspect - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(p.chain().buffer_size(), (800, 600));
        assert_eq!(p.backend().resized.last().unwrap().physical_size(), (800, 600));

        p.resize(640.0, 360.0, 1.5).unwrap();
        assert_eq!(p.chain().buffer_size(), (960, 540));
    }

    #[test]
    fn backend_allocates_the_chain_mip_sizes() {
        let mut p = pipeline();
        p.resize(800.0, 600.0, 1.0).unwrap();
        assert_eq!(p.backend().mip_sizes, p.chain().bloom_mip_sizes());
        assert_eq!(p.backend().mip_sizes[0], (400, 300));

        let bloom = BloomSettings { mip_count: 3, ..BloomSettings::default() };
        let mut p = RenderPipeline::new(
            NullBackend::default(),
            Camera::default(),
            PostChain::new(bloom, ToneMapping::default()),
            Viewport::new(640.0, 480.0, 1.0),
        )
        .unwrap();
        assert_eq!(p.backend().mip_sizes, vec![(320, 240), (160, 120), (80, 60)]);
        p.resize(100.0, 100.0, 2.0).unwrap();
        assert_eq!(p.backend().mip_sizes.len(), 3);
        assert_eq!(p.backend().mip_sizes[0], (100, 100));
    }

    #[test]
    fn out_of_band_aspect_change_is_caught() {
        let mut p = pipeline();
        p.camera_mut().set_aspect(1.0);
        assert!(matches!(p.check_viewport(), Err(Error::ViewportMismatch { .. })));
    }
}
