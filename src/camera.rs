// src/camera.rs
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

pub const DEFAULT_FOV_DEGREES: f32 = 60.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 10.0;
pub const DEFAULT_POSITION: Vec3 = Vec3::new(0.0, 0.5, 1.5);
pub const DEFAULT_TARGET: Vec3 = Vec3::new(0.0, 0.3, 0.0);

/// Perspective camera looking from `position` at `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,

    /// Vertical field of view in radians.
    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            DEFAULT_POSITION,
            DEFAULT_TARGET,
            DEFAULT_FOV_DEGREES.to_radians(),
            1.0,
            DEFAULT_NEAR,
            DEFAULT_FAR,
        )
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, fovy_radians: f32, aspect: f32, znear: f32, zfar: f32) -> Self {
        Self {
            position,
            target,
            fovy: fovy_radians,
            aspect,
            znear,
            zfar,
        }
    }

    /// Right-handed, Y up.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn proj_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn view_proj_matrix(&self) -> Mat4 {
        self.proj_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (call on resize).
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}

/// GPU camera uniform (matches `CameraUniform` in the vertex stages).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    /// Column-major 4x4 matrix
    pub view_proj: [[f32; 4]; 4],
    /// w unused
    pub position: [f32; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            position: [0.0; 4],
        }
    }
}

impl CameraUniform {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view_proj: camera.view_proj_matrix().to_cols_array_2d(),
            position: camera.position.extend(1.0).to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_frame_the_hearth() {
        let cam = Camera::default();
        assert_eq!(cam.position, Vec3::new(0.0, 0.5, 1.5));
        assert!((cam.fovy - 60f32.to_radians()).abs() < 1e-6);
        assert_eq!((cam.znear, cam.zfar), (0.1, 10.0));
    }

    #[test]
    fn target_projects_to_screen_centre() {
        let mut cam = Camera::default();
        cam.set_aspect(800.0 / 600.0);
        let clip = cam.view_proj_matrix() * cam.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn uniform_layout_is_80_bytes() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
        let u = CameraUniform::from_camera(&Camera::default());
        assert_eq!(u.position, [0.0, 0.5, 1.5, 1.0]);
    }
}
