// src/lib.rs
//! Hearth: a real-time fireplace scene.
//!
//! A lightmapped fireplace and floor, re-tinted every frame by a flickering light cycle, with
//! two procedural volumes (fire and ash) parented to the fireplace and a bloom post chain.
//! The library is backend-agnostic down to [`renderer::RenderBackend`]; [`run_native`] wires
//! it to winit and wgpu.

pub mod animation;
pub mod assets;
pub mod camera;
pub mod camera_controller;
pub mod config;
pub mod context;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod light_cycle;
pub mod materials;
pub mod params;
pub mod post_processing;
pub mod renderer;
pub mod scene;
pub mod time;

pub use animation::{AnimationLoop, LoopHandle, LoopState, TickReport};
pub use config::HearthConfig;
pub use error::{Error, Result};
pub use params::{Control, FireParams, ParameterPanel, SceneParams};
pub use renderer::{RenderBackend, RenderPipeline, Viewport};
pub use scene::FireplaceScene;

use std::sync::Arc;

use log::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::assets::{load_scene_assets, GltfAssetProvider, SceneAssets, TextureStore};
use crate::camera::Camera;
use crate::camera_controller::OrbitControls;
use crate::context::Context;
use crate::gpu::{GpuContext, WgpuBackend};
use crate::materials::MaterialBank;
use crate::post_processing::{BloomSettings, PostChain, ToneMapping};

type HearthLoop = AnimationLoop<WgpuBackend, OrbitControls>;

/// Load the assets, open the window and run until it closes.
///
/// Assets are fetched before the event loop starts; any failure there, or while building the
/// scene, ends the run with an error and nothing is drawn.
pub fn run_native(config: HearthConfig) -> Result<()> {
    let provider = GltfAssetProvider::new(&config.asset_root);
    let assets = pollster::block_on(load_scene_assets(
        &provider,
        &config.model_path,
        &config.noise_path,
    ))?;

    let event_loop = EventLoop::new().map_err(|e| Error::Gpu(format!("event loop: {e}")))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = HearthApp::new(config, assets);
    event_loop
        .run_app(&mut app)
        .map_err(|e| Error::Gpu(format!("event loop: {e}")))?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ----------------------------------------------------------------------------
// winit 0.30 host
// ----------------------------------------------------------------------------
struct HearthApp {
    config: HearthConfig,
    // Consumed when the scene is built in `resumed`.
    assets: Option<SceneAssets>,

    window: Option<Arc<Window>>,
    animation: Option<HearthLoop>,
    failure: Option<Error>,
}

impl HearthApp {
    fn new(config: HearthConfig, assets: SceneAssets) -> Self {
        Self {
            config,
            assets: Some(assets),
            window: None,
            animation: None,
            failure: None,
        }
    }

    fn build_loop(&mut self, window: Arc<Window>) -> Result<HearthLoop> {
        let assets = self
            .assets
            .take()
            .ok_or_else(|| Error::fatal_setup("scene assets already consumed"))?;

        let scale = window.scale_factor();
        let logical: LogicalSize<f32> = window.inner_size().to_logical(scale);
        let viewport = Viewport::new(logical.width, logical.height, scale as f32);

        let ctx = pollster::block_on(GpuContext::new(window)).context("creating GPU context")?;

        let mut textures = TextureStore::new();
        let mut materials = MaterialBank::new();
        let noise = textures.insert(assets.noise);
        let scene = FireplaceScene::assemble(assets.model, noise, &mut materials, &mut textures)
            .with_context(|| format!("assembling scene from `{}`", self.config.model_path))?;

        let params = self.config.params;
        let chain = PostChain::new(
            BloomSettings { strength: params.bloom_strength, ..BloomSettings::default() },
            ToneMapping::default(),
        );
        let backend =
            WgpuBackend::new(ctx, &textures, scene.graph.meshes(), &chain).context("uploading scene")?;

        let pipeline = RenderPipeline::new(backend, Camera::default(), chain, viewport)?;

        let mut controls = OrbitControls::new(pipeline.camera().target);
        controls.set_viewport_height(viewport.physical_size().1 as f32);

        let mut animation = AnimationLoop::new(pipeline, controls, materials, scene, params)
            .with_max_delta(self.config.max_delta);
        animation.start();
        Ok(animation)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Error) {
        error!("{err}");
        self.failure = Some(err);
        event_loop.exit();
    }

    fn refresh_title(&self) {
        let (Some(window), Some(animation)) = (self.window.as_ref(), self.animation.as_ref()) else {
            return;
        };
        let summary = animation.panel().summary(animation.params());
        let paused = animation.state() != LoopState::Running;
        let mut title = self.config.title.clone();
        if paused {
            title.push_str(" (paused)");
        }
        if !summary.is_empty() {
            title.push_str(" | ");
            title.push_str(&summary);
        }
        window.set_title(&title);
    }

    /// Returns `true` when the key changed something visible in the title.
    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed {
            return false;
        }
        let Some(animation) = self.animation.as_mut() else {
            return false;
        };

        let nudge = match event.logical_key.as_ref() {
            Key::Named(NamedKey::Escape) => {
                event_loop.exit();
                return false;
            }
            Key::Named(NamedKey::Space) => {
                if animation.state() == LoopState::Running {
                    animation.handle().stop();
                } else {
                    animation.start();
                }
                return true;
            }
            Key::Character(c) => key_binding(c),
            _ => None,
        };

        let Some((control, steps)) = nudge else {
            return false;
        };
        let panel = *animation.panel();
        panel.nudge(animation.params_mut(), control, steps);
        debug!("{} -> {:?}", control.label(), animation.params());
        true
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        let (Some(window), Some(animation)) = (self.window.as_ref(), self.animation.as_mut()) else {
            return;
        };
        if size.width == 0 || size.height == 0 {
            // minimised
            return;
        }
        let scale = window.scale_factor();
        let logical: LogicalSize<f32> = size.to_logical(scale);
        animation.request_resize(logical.width, logical.height, scale as f32);
        animation.controls_mut().set_viewport_height(size.height as f32);
    }
}

/// Character keys mapped to panel controls.
fn key_binding(key: &str) -> Option<(Control, i32)> {
    let binding = match key {
        "1" => (Control::Speed, -1),
        "2" => (Control::Speed, 1),
        "3" => (Control::Opacity, -1),
        "4" => (Control::Opacity, 1),
        "5" => (Control::Intensity, -1),
        "6" => (Control::Intensity, 1),
        "7" => (Control::Details, -1),
        "8" => (Control::Details, 1),
        "9" => (Control::StylizeRatio, -1),
        "0" => (Control::StylizeRatio, 1),
        "-" => (Control::StylizeThreshold, -1),
        "=" => (Control::StylizeThreshold, 1),
        "g" | "G" => (Control::Grayscale, 1),
        "[" => (Control::Bloom, -1),
        "]" => (Control::Bloom, 1),
        _ => return None,
    };
    Some(binding)
}

impl ApplicationHandler for HearthApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let (width, height) = self.config.window_size;
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(width, height));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, Error::Gpu(format!("window creation: {e}"))),
        };
        self.window = Some(window.clone());

        match self.build_loop(window.clone()) {
            Ok(animation) => self.animation = Some(animation),
            Err(err) => return self.fail(event_loop, err),
        }
        self.refresh_title();
        window.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref() else { return };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.handle_resize(size);
                self.refresh_title();
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                // a Resized event with the new physical size follows
                debug!("scale factor changed: {}", scale_factor);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if self.handle_key(event_loop, &event) {
                    self.refresh_title();
                }
            }
            WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                if let Some(animation) = self.animation.as_mut() {
                    match state {
                        ElementState::Pressed => animation.controls_mut().begin_drag(),
                        ElementState::Released => animation.controls_mut().end_drag(),
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(animation) = self.animation.as_mut() {
                    animation.controls_mut().cursor_moved(position.x as f32, position.y as f32);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 50.0,
                };
                if let Some(animation) = self.animation.as_mut() {
                    animation.controls_mut().zoom(steps);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(animation) = self.animation.as_mut() else { return };
                match animation.tick() {
                    Ok(Some(report)) if report.frame % 600 == 0 => {
                        debug!("frame {} t={:.2}s", report.frame, report.simulation_time);
                    }
                    Ok(_) => {}
                    Err(err) if err.is_fatal_setup() || matches!(err.root(), Error::Gpu(_)) => {
                        self.fail(event_loop, err);
                    }
                    Err(err) => warn!("frame skipped: {err}"),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_panel_control_has_a_key_pair() {
        let controls = [
            Control::Speed,
            Control::Opacity,
            Control::Intensity,
            Control::Details,
            Control::StylizeRatio,
            Control::StylizeThreshold,
            Control::Bloom,
        ];
        let keys = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "-", "=", "[", "]"];
        for control in controls {
            let bound: Vec<i32> = keys
                .iter()
                .filter_map(|k| key_binding(k))
                .filter(|(c, _)| *c == control)
                .map(|(_, s)| s)
                .collect();
            assert_eq!(bound, vec![-1, 1], "{}", control.label());
        }
        assert_eq!(key_binding("G"), Some((Control::Grayscale, 1)));
        assert_eq!(key_binding("x"), None);
    }
}
