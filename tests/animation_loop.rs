//! Drives the animation loop end to end with a recording backend.

use glam::Vec3;

use hearth::assets::{ModelData, ModelObject, TextureData, TextureStore, WrapMode};
use hearth::camera::Camera;
use hearth::camera_controller::CameraControls;
use hearth::geometry::MeshData;
use hearth::light_cycle::{light_cycle, TintScale};
use hearth::materials::{MaterialBank, UniformValue};
use hearth::post_processing::PostChain;
use hearth::renderer::FrameView;
use hearth::scene::Transform;
use hearth::{AnimationLoop, FireplaceScene, LoopState, RenderBackend, RenderPipeline, Result, SceneParams, Viewport};

/// What the backend saw when `render` was called.
#[derive(Debug, Clone, PartialEq)]
struct Frame {
    fire_time: f32,
    ash_time: f32,
    floor_tint: [f32; 3],
    fireplace_tint: [f32; 3],
    camera_aspect: f32,
    buffer_size: (u32, u32),
    bloom_strength: f32,
}

#[derive(Default)]
struct RecordingBackend {
    frames: Vec<Frame>,
    resizes: Vec<Viewport>,
}

fn float(bank: &MaterialBank, id: hearth::materials::MaterialId, name: &str) -> f32 {
    match bank.uniform(id, name).unwrap() {
        UniformValue::Float(v) => v,
        other => panic!("`{name}` is not a float: {other:?}"),
    }
}

impl RenderBackend for RecordingBackend {
    fn resize(&mut self, viewport: Viewport, _chain: &PostChain) -> Result<()> {
        self.resizes.push(viewport);
        Ok(())
    }

    fn render(&mut self, frame: &FrameView<'_>) -> Result<()> {
        let ids = frame.scene.materials;
        let bank = frame.materials;
        self.frames.push(Frame {
            fire_time: float(bank, ids.fire, "time"),
            ash_time: float(bank, ids.ash, "time"),
            floor_tint: bank.get(ids.floor)?.tint()?,
            fireplace_tint: bank.get(ids.fireplace)?.tint()?,
            camera_aspect: frame.camera.aspect,
            buffer_size: frame.chain.buffer_size(),
            bloom_strength: frame.chain.bloom().map(|b| b.strength).unwrap_or_default(),
        });
        Ok(())
    }
}

#[derive(Default)]
struct CountingControls {
    updates: u32,
    elapsed: f32,
}

impl CameraControls for CountingControls {
    fn update(&mut self, _camera: &mut Camera, dt: f32) {
        self.updates += 1;
        self.elapsed += dt;
    }
}

fn object(name: &str, x: f32) -> ModelObject {
    ModelObject {
        name: name.to_string(),
        transform: Transform { translation: Vec3::new(x, 0.0, 0.0), ..Transform::IDENTITY },
        mesh: MeshData::default(),
        texture: Some(TextureData::solid(name, [180, 120, 60, 255], WrapMode::ClampToEdge)),
    }
}

fn model(names: &[&str]) -> ModelData {
    ModelData { objects: names.iter().enumerate().map(|(i, n)| object(n, i as f32)).collect() }
}

fn build(model: ModelData, params: SceneParams) -> Result<AnimationLoop<RecordingBackend, CountingControls>> {
    let mut bank = MaterialBank::new();
    let mut textures = TextureStore::new();
    let noise = textures.insert(TextureData::solid("noise", [128; 4], WrapMode::Repeat));
    let scene = FireplaceScene::assemble(model, noise, &mut bank, &mut textures)?;
    let pipeline = RenderPipeline::new(
        RecordingBackend::default(),
        Camera::default(),
        PostChain::default(),
        Viewport::new(1024.0, 768.0, 1.0),
    )?;
    Ok(AnimationLoop::new(pipeline, CountingControls::default(), bank, scene, params))
}

fn running() -> AnimationLoop<RecordingBackend, CountingControls> {
    let mut animation = build(model(&["fireplace", "floor"]), SceneParams::default()).unwrap();
    animation.start();
    animation
}

fn last_frame(animation: &AnimationLoop<RecordingBackend, CountingControls>) -> Frame {
    animation.pipeline().backend().frames.last().cloned().expect("no frame rendered")
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

#[test]
fn scripted_tick_writes_time_and_tints_before_render() {
    let mut animation = running();
    let report = animation.tick_with_delta(1.0).unwrap().unwrap();
    assert_eq!(report.frame, 1);
    assert!(close(report.simulation_time, 1.0));

    let frame = last_frame(&animation);
    assert!(close(frame.fire_time, 1.0));
    assert!(close(frame.ash_time, 1.0));

    let light = light_cycle(1.0);
    let floor = TintScale::FLOOR.apply(light);
    let fireplace = TintScale::FIREPLACE.apply(light);
    for i in 0..3 {
        assert!(close(frame.floor_tint[i], floor[i]));
        assert!(close(frame.fireplace_tint[i], fireplace[i]));
    }
    // blue never receives the floor offset
    assert!(close(frame.floor_tint[2], light.b * 3.0));
    assert!(close(frame.floor_tint[0], light.r * 3.0 + 0.1));
}

#[test]
fn speed_scales_accumulated_time() {
    let mut animation = running();
    animation.params_mut().speed = 2.0;
    for _ in 0..3 {
        animation.tick_with_delta(0.016).unwrap();
    }
    assert!(close(animation.clock().simulation_time() as f32, 0.096));
    assert!(close(last_frame(&animation).fire_time, 0.096));
    assert_eq!(animation.pipeline().backend().frames.len(), 3);
}

#[test]
fn controls_see_unscaled_delta() {
    let mut animation = running();
    animation.params_mut().speed = 3.0;
    animation.tick_with_delta(0.5).unwrap();
    animation.tick_with_delta(0.25).unwrap();
    let controls = animation.controls_mut();
    assert_eq!(controls.updates, 2);
    assert!(close(controls.elapsed, 0.75));
}

#[test]
fn resize_is_applied_before_the_next_render() {
    let mut animation = running();
    animation.request_resize(800.0, 600.0, 1.0);
    let report = animation.tick_with_delta(0.016).unwrap().unwrap();
    assert!(report.resized);

    let frame = last_frame(&animation);
    assert!(close(frame.camera_aspect, 800.0 / 600.0));
    assert_eq!(frame.buffer_size, (800, 600));
    assert_eq!(animation.pipeline().backend().resizes.last().unwrap().physical_size(), (800, 600));

    let report = animation.tick_with_delta(0.016).unwrap().unwrap();
    assert!(!report.resized);
}

#[test]
fn only_the_latest_queued_resize_counts() {
    let mut animation = running();
    let before = animation.pipeline().backend().resizes.len();
    animation.request_resize(300.0, 300.0, 1.0);
    animation.request_resize(1280.0, 720.0, 2.0);
    animation.tick_with_delta(0.0).unwrap();
    let resizes = &animation.pipeline().backend().resizes;
    assert_eq!(resizes.len(), before + 1);
    assert_eq!(last_frame(&animation).buffer_size, (2560, 1440));
}

#[test]
fn panel_collapses_on_narrow_resize() {
    let mut animation = running();
    assert!(animation.panel().is_open());
    animation.request_resize(480.0, 800.0, 2.0);
    animation.tick_with_delta(0.016).unwrap();
    assert!(!animation.panel().is_open());
    animation.request_resize(900.0, 800.0, 1.0);
    animation.tick_with_delta(0.016).unwrap();
    assert!(animation.panel().is_open());
}

#[test]
fn idle_and_stopped_loops_do_nothing() {
    let mut animation = build(model(&["fireplace", "floor"]), SceneParams::default()).unwrap();
    assert_eq!(animation.state(), LoopState::Idle);
    assert!(animation.tick_with_delta(1.0).unwrap().is_none());
    assert!(animation.pipeline().backend().frames.is_empty());

    animation.start();
    animation.tick_with_delta(1.0).unwrap();

    let handle = animation.handle();
    handle.stop();
    assert_eq!(animation.state(), LoopState::Stopped);
    assert!(animation.tick_with_delta(1.0).unwrap().is_none());
    assert!(animation.tick().unwrap().is_none());
    assert_eq!(animation.pipeline().backend().frames.len(), 1);

    animation.start();
    assert_eq!(animation.state(), LoopState::Running);
    let report = animation.tick_with_delta(0.5).unwrap().unwrap();
    assert!(close(report.simulation_time, 1.5));
}

#[test]
fn stop_from_another_thread_is_observed() {
    let mut animation = running();
    let handle = animation.handle();
    std::thread::spawn(move || handle.stop()).join().unwrap();
    assert!(animation.tick_with_delta(0.1).unwrap().is_none());
}

#[test]
fn out_of_range_speed_does_not_panic() {
    let mut animation = running();
    animation.params_mut().speed = 10.0;
    animation.tick_with_delta(0.5).unwrap();
    assert!(close(animation.clock().simulation_time() as f32, 5.0));
    animation.params_mut().speed = 0.0;
    animation.tick_with_delta(0.5).unwrap();
    assert!(close(last_frame(&animation).fire_time, 5.0));
}

#[test]
fn panel_edits_reach_the_frame() {
    let mut animation = running();
    animation.params_mut().bloom_strength = 1.25;
    animation.params_mut().fire.intensity = 1.4;
    animation.tick_with_delta(0.016).unwrap();
    assert!(close(last_frame(&animation).bloom_strength, 1.25));
    let fire = animation.scene().materials.fire;
    match animation.materials().uniform(fire, "intensity").unwrap() {
        UniformValue::Float(v) => assert!(close(v, 1.4)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_floor_aborts_setup() {
    let err = build(model(&["fireplace"]), SceneParams::default()).err().unwrap();
    assert!(err.is_fatal_setup());
    assert!(err.to_string().contains("floor"));
}

#[test]
fn measured_ticks_start_from_zero() {
    let mut animation = running();
    let report = animation.tick().unwrap().unwrap();
    assert_eq!(report.delta, 0.0);
    assert_eq!(report.simulation_time, 0.0);
}

#[test]
fn fire_keeps_moving_late_in_a_session() {
    let mut animation = running();
    animation.params_mut().speed = 0.1;
    animation.tick_with_delta(400_000.0).unwrap();
    let before = last_frame(&animation).fire_time;
    for _ in 0..625 {
        animation.tick_with_delta(0.016).unwrap();
    }
    let after = last_frame(&animation).fire_time;
    assert!((after - before - 1.0).abs() < 0.01, "advanced {}", after - before);
}
