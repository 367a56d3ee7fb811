// src/animation.rs
//! Per-frame orchestration.
//!
//! [`AnimationLoop`] owns every piece of per-frame state and is driven by the host, one tick
//! per display refresh. A tick runs to completion:
//!
//! 0. apply the latest queued resize;
//! 1. advance the clock by `delta × speed`;
//! 2. sample the light cycle and re-tint the floor and fireplace lightmaps;
//! 3. push the panel's fire parameters;
//! 4. write the simulation time into the fire and ash materials;
//! 5. update the camera controls;
//! 6. push the bloom strength and render.
//!
//! Ticks outside the `Running` state do nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::camera_controller::CameraControls;
use crate::error::Result;
use crate::light_cycle::{light_cycle, LightColorSample, TintScale};
use crate::materials::MaterialBank;
use crate::params::{ParameterPanel, SceneParams};
use crate::renderer::{RenderBackend, RenderPipeline, Viewport};
use crate::scene::FireplaceScene;
use crate::time::FrameClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

/// Cross-thread stop request, observed at the start of the next tick.
#[derive(Debug, Clone, Default)]
pub struct LoopHandle {
    stop: Arc<AtomicBool>,
}

impl LoopHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.stop.store(false, Ordering::Release);
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub frame: u64,
    /// Delta fed to the clock, before speed scaling.
    pub delta: f32,
    pub simulation_time: f32,
    pub light: LightColorSample,
    /// A queued resize was applied at the start of this tick.
    pub resized: bool,
}

pub struct AnimationLoop<B, C> {
    pipeline: RenderPipeline<B>,
    controls: C,
    materials: MaterialBank,
    scene: FireplaceScene,
    clock: FrameClock,
    params: SceneParams,
    panel: ParameterPanel,
    state: LoopState,
    handle: LoopHandle,
    pending_resize: Option<Viewport>,
}

impl<B: RenderBackend, C: CameraControls> AnimationLoop<B, C> {
    pub fn new(
        pipeline: RenderPipeline<B>,
        controls: C,
        materials: MaterialBank,
        scene: FireplaceScene,
        params: SceneParams,
    ) -> Self {
        let mut panel = ParameterPanel::default();
        panel.on_resize(pipeline.viewport().width as u32);
        Self {
            pipeline,
            controls,
            materials,
            scene,
            clock: FrameClock::new(params.speed),
            params,
            panel,
            state: LoopState::Idle,
            handle: LoopHandle::default(),
            pending_resize: None,
        }
    }

    /// Cap on measured wall-clock deltas.
    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.clock = std::mem::take(&mut self.clock).with_max_delta(max_delta);
        self
    }

    // ================ STATE ================

    /// Idle or Stopped → Running. The paused interval is not simulated.
    pub fn start(&mut self) {
        self.sync_state();
        if self.state == LoopState::Running {
            return;
        }
        self.handle.clear();
        self.clock.rebase();
        info!("animation loop running (from {:?})", self.state);
        self.state = LoopState::Running;
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> LoopState {
        if self.state == LoopState::Running && self.handle.is_stop_requested() {
            LoopState::Stopped
        } else {
            self.state
        }
    }

    fn sync_state(&mut self) -> bool {
        if self.state == LoopState::Running && self.handle.is_stop_requested() {
            info!("animation loop stopped at frame {}", self.clock.frame());
            self.state = LoopState::Stopped;
        }
        self.state == LoopState::Running
    }

    /// Applied at the start of the next tick. Later requests replace earlier ones.
    pub fn request_resize(&mut self, width: f32, height: f32, pixel_density: f32) {
        self.pending_resize = Some(Viewport::new(width, height, pixel_density));
    }

    // ================ TICK ================

    /// Tick with the measured wall-clock delta.
    pub fn tick(&mut self) -> Result<Option<TickReport>> {
        if !self.sync_state() {
            return Ok(None);
        }
        let delta = self.clock.measure();
        self.step(delta)
    }

    /// Tick with a scripted delta (seconds, before speed scaling).
    pub fn tick_with_delta(&mut self, delta: f32) -> Result<Option<TickReport>> {
        if !self.sync_state() {
            return Ok(None);
        }
        self.step(delta)
    }

    fn step(&mut self, delta: f32) -> Result<Option<TickReport>> {
        let resized = self.apply_pending_resize()?;

        self.clock.set_speed(self.params.speed);
        let time = self.clock.advance(delta);
        let t = time.simulation_time;

        let ids = self.scene.materials;
        let light = light_cycle(t);
        let [r, g, b] = TintScale::FLOOR.apply(light);
        self.materials.set_tint(ids.floor, r, g, b)?;
        let [r, g, b] = TintScale::FIREPLACE.apply(light);
        self.materials.set_tint(ids.fireplace, r, g, b)?;
        self.materials.set_fire_params(ids.fire, &self.params.fire)?;

        self.materials.set_time(ids.fire, t)?;
        self.materials.set_time(ids.ash, t)?;

        self.controls.update(self.pipeline.camera_mut(), time.delta);

        self.pipeline.set_bloom_strength(self.params.bloom_strength);
        self.pipeline.render(&self.materials, &self.scene)?;

        Ok(Some(TickReport {
            frame: time.frame,
            delta: time.delta,
            simulation_time: t,
            light,
            resized,
        }))
    }

    fn apply_pending_resize(&mut self) -> Result<bool> {
        let Some(viewport) = self.pending_resize.take() else {
            return Ok(false);
        };
        self.pipeline
            .resize(viewport.width, viewport.height, viewport.pixel_density)?;
        if self.panel.on_resize(viewport.width as u32) {
            debug!("parameter panel {}", if self.panel.is_open() { "opened" } else { "collapsed" });
        }
        Ok(true)
    }

    // ================ ACCESSORS ================

    pub fn params(&self) -> &SceneParams {
        &self.params
    }

    /// Changes apply on the next tick.
    pub fn params_mut(&mut self) -> &mut SceneParams {
        &mut self.params
    }

    pub fn panel(&self) -> &ParameterPanel {
        &self.panel
    }

    pub fn materials(&self) -> &MaterialBank {
        &self.materials
    }

    pub fn scene(&self) -> &FireplaceScene {
        &self.scene
    }

    pub fn pipeline(&self) -> &RenderPipeline<B> {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut RenderPipeline<B> {
        &mut self.pipeline
    }

    pub fn controls_mut(&mut self) -> &mut C {
        &mut self.controls
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }
}
