//! Orbit camera for the GPU scene
//!
//! Pointer drags map directly onto camera parameters: horizontal drag
//! orbits, vertical drag dollies. Proportional only; no inertia or
//! momentum is modeled.

use glam::{Mat4, Vec3};

/// Radians of yaw per pixel of horizontal drag.
pub const DRAG_ORBIT_RATE: f32 = 0.008;

/// World units of dolly per pixel of vertical drag.
pub const DRAG_DOLLY_RATE: f32 = 0.05;

const MIN_RADIUS: f32 = 4.0;
const MAX_RADIUS: f32 = 80.0;

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    target: Vec3,
    yaw: f32,
    pitch: f32,
    radius: f32,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl OrbitCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            yaw: -std::f32::consts::FRAC_PI_4,
            pitch: 0.45,
            radius: 24.0,
            fov_y: 50f32.to_radians(),
            aspect: aspect.max(0.01),
            near: 0.1,
            far: 500.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + self.radius * Vec3::new(cos_yaw * cos_pitch, sin_pitch, sin_yaw * cos_pitch)
    }

    /// Distance from the viewpoint to the scene target; the LOD selector
    /// keys off this.
    pub fn distance(&self) -> f32 {
        self.radius
    }

    /// Apply a pointer drag delta in pixels.
    pub fn apply_drag(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * DRAG_ORBIT_RATE;
        self.radius = (self.radius + dy * DRAG_DOLLY_RATE).clamp(MIN_RADIUS, MAX_RADIUS);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect.max(0.01);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_is_proportional_to_delta() {
        let mut camera = OrbitCamera::new(1.0);
        let yaw_before = camera.yaw;
        camera.apply_drag(100.0, 0.0);
        let small = camera.yaw - yaw_before;

        let mut camera2 = OrbitCamera::new(1.0);
        camera2.apply_drag(200.0, 0.0);
        let large = camera2.yaw - yaw_before;
        assert!((large - 2.0 * small).abs() < 1e-6);
    }

    #[test]
    fn test_vertical_drag_dollies_within_limits() {
        let mut camera = OrbitCamera::new(1.0);
        camera.apply_drag(0.0, 10_000.0);
        assert_eq!(camera.distance(), MAX_RADIUS);
        camera.apply_drag(0.0, -1_000_000.0);
        assert_eq!(camera.distance(), MIN_RADIUS);
    }

    #[test]
    fn test_matrices_are_finite() {
        let camera = OrbitCamera::new(16.0 / 9.0);
        let vp = camera.view_proj();
        assert!(vp.to_cols_array().iter().all(|v| v.is_finite()));
        assert!(camera.position().length() > 0.0);
    }
}
