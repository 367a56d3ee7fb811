// src/camera_controller.rs
// Orbit controls around the hearth.
//
// Input-agnostic: the window layer forwards drags and wheel steps, and the animation loop
// calls `update` once per tick.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec3;

use crate::camera::{Camera, DEFAULT_TARGET};

pub const MIN_DISTANCE: f32 = 0.0;
pub const MAX_DISTANCE: f32 = 20.0;
/// Keeps the camera above the floor plane.
pub const MAX_POLAR_ANGLE: f32 = FRAC_PI_2 - 0.1;

const EPS: f32 = 1e-6;

/// Anything that moves the camera once per tick.
pub trait CameraControls {
    fn update(&mut self, camera: &mut Camera, dt: f32);
}

/// Spherical orbit around `target`: polar angle from +Y, azimuth around Y.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,

    // pending input, consumed by `update`
    azimuth_delta: f32,
    polar_delta: f32,
    scale: f32,

    dragging: bool,
    last_cursor: Option<(f32, f32)>,
    viewport_height: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET)
    }
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            min_distance: MIN_DISTANCE,
            max_distance: MAX_DISTANCE,
            min_polar_angle: 0.0,
            max_polar_angle: MAX_POLAR_ANGLE,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            azimuth_delta: 0.0,
            polar_delta: 0.0,
            scale: 1.0,
            dragging: false,
            last_cursor: None,
            viewport_height: 1.0,
        }
    }

    /// Drag distances are measured against the viewport height.
    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(1.0);
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
        self.last_cursor = None;
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
        self.last_cursor = None;
    }

    /// Cursor position in physical pixels. Only rotates while a drag is active.
    pub fn cursor_moved(&mut self, x: f32, y: f32) {
        if self.dragging {
            if let Some((lx, ly)) = self.last_cursor {
                self.rotate_by_pixels(x - lx, y - ly);
            }
        }
        self.last_cursor = Some((x, y));
    }

    /// A full viewport-height drag turns the camera once around.
    pub fn rotate_by_pixels(&mut self, dx: f32, dy: f32) {
        self.azimuth_delta -= TAU * dx / self.viewport_height * self.rotate_speed;
        self.polar_delta -= TAU * dy / self.viewport_height * self.rotate_speed;
    }

    /// Positive steps zoom in.
    pub fn zoom(&mut self, steps: f32) {
        let factor = 0.95f32.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= factor;
        } else if steps < 0.0 {
            self.scale /= factor;
        }
    }
}

impl CameraControls for OrbitControls {
    fn update(&mut self, camera: &mut Camera, _dt: f32) {
        let offset = camera.position - self.target;
        let mut radius = offset.length();
        let (mut azimuth, mut polar) = if radius > EPS {
            (offset.x.atan2(offset.z), (offset.y / radius).clamp(-1.0, 1.0).acos())
        } else {
            (0.0, FRAC_PI_2)
        };

        azimuth += self.azimuth_delta;
        polar = (polar + self.polar_delta)
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, std::f32::consts::PI - EPS);
        radius = (radius * self.scale)
            .clamp(self.min_distance, self.max_distance)
            .max(EPS);

        let (sin_polar, cos_polar) = polar.sin_cos();
        let (sin_azimuth, cos_azimuth) = azimuth.sin_cos();
        camera.position = self.target
            + Vec3::new(radius * sin_polar * sin_azimuth, radius * cos_polar, radius * sin_polar * cos_azimuth);
        camera.target = self.target;

        self.azimuth_delta = 0.0;
        self.polar_delta = 0.0;
        self.scale = 1.0;
    }
}
