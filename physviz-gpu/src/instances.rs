//! Instanced particle field
//!
//! One geometry drawn N times with per-instance transform matrices. The
//! placement is seeded so a given scene config always produces the same
//! cloud, and the whole field carries a slow constant rotation advanced
//! once per frame.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Radians per second of group rotation.
pub const ROTATION_RATE: f32 = 0.15;

const MIN_PARTICLE_SCALE: f32 = 0.06;
const MAX_PARTICLE_SCALE: f32 = 0.20;

/// Per-instance GPU payload: one column-major model matrix.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct RawInstance {
    pub model: [[f32; 4]; 4],
}

#[derive(Debug, Clone)]
pub struct ParticleField {
    transforms: Vec<Mat4>,
    rotation: f32,
}

impl ParticleField {
    pub fn new(count: usize, spread: f32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let spread = spread.abs().max(0.1);
        let transforms = (0..count)
            .map(|_| {
                let position = Vec3::new(
                    rng.gen_range(-spread..spread),
                    rng.gen_range(-spread..spread),
                    rng.gen_range(-spread..spread),
                );
                let scale = rng.gen_range(MIN_PARTICLE_SCALE..MAX_PARTICLE_SCALE);
                Mat4::from_scale_rotation_translation(Vec3::splat(scale), Quat::IDENTITY, position)
            })
            .collect();
        Self {
            transforms,
            rotation: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Advance the group rotation by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.rotation = (self.rotation + ROTATION_RATE * dt) % std::f32::consts::TAU;
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Model matrix applied to the whole field.
    pub fn group_rotation(&self) -> Mat4 {
        Mat4::from_rotation_y(self.rotation)
    }

    /// Instance buffer contents.
    pub fn raw(&self) -> Vec<RawInstance> {
        self.transforms
            .iter()
            .map(|m| RawInstance {
                model: m.to_cols_array_2d(),
            })
            .collect()
    }
}
