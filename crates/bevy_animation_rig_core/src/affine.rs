use std::ops::Mul;

use bevy::{
    math::{Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
    transform::components::Transform,
};
use serde::{Deserialize, Serialize};

/// Rigid transform made of a translation and a unit rotation, used for offsets and
/// space conversions. Composition always renormalizes the rotation.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
pub struct AffineTransform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self::new(Vec3::ZERO, rotation)
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: rotation * -self.translation,
            rotation,
        }
    }

    /// `self⁻¹ · other`, the pose of `other` expressed in the space of `self`.
    pub fn inverse_mul(&self, other: &Self) -> Self {
        let inv = self.rotation.inverse();
        Self {
            translation: inv * (other.translation - self.translation),
            rotation: (inv * other.rotation).normalize(),
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * point
    }

    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.translation)
    }

    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation * direction
    }

    /// Linear interpolation of the translation and spherical interpolation of the rotation.
    pub fn lerp(&self, other: &Self, f: f32) -> Self {
        Self {
            translation: self.translation.lerp(other.translation, f),
            rotation: self.rotation.slerp(other.rotation, f).normalize(),
        }
    }
}

impl Mul for AffineTransform {
    type Output = AffineTransform;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            translation: self.transform_point(rhs.translation),
            rotation: (self.rotation * rhs.rotation).normalize(),
        }
    }
}

impl From<Transform> for AffineTransform {
    fn from(value: Transform) -> Self {
        Self::new(value.translation, value.rotation)
    }
}

impl From<AffineTransform> for Transform {
    fn from(value: AffineTransform) -> Self {
        Transform {
            translation: value.translation,
            rotation: value.rotation,
            scale: Vec3::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn sample() -> AffineTransform {
        AffineTransform::new(
            Vec3::new(1., 2., 3.),
            Quat::from_euler(bevy::math::EulerRot::XYZ, 0.3, -0.7, 1.1),
        )
    }

    #[test]
    fn inverse_composes_to_identity() {
        let tx = sample();
        let id = tx * tx.inverse();
        assert!(id.translation.length() < EPS);
        assert!(id.rotation.angle_between(Quat::IDENTITY) < EPS * 10.);
    }

    #[test]
    fn inverse_mul_matches_inverse_then_mul() {
        let a = sample();
        let b = AffineTransform::new(Vec3::new(-4., 0.5, 2.), Quat::from_rotation_y(0.8));
        let expected = a.inverse() * b;
        let result = a.inverse_mul(&b);
        assert!((expected.translation - result.translation).length() < EPS);
        assert!(expected.rotation.angle_between(result.rotation) < EPS * 10.);
    }

    #[test]
    fn composition_keeps_rotation_normalized() {
        let mut tx = sample();
        for _ in 0..1000 {
            tx = tx * sample();
        }
        assert!((tx.rotation.length() - 1.).abs() < EPS);
    }

    #[test]
    fn transform_point_roundtrip() {
        let tx = sample();
        let p = Vec3::new(0.2, -3., 7.);
        assert!((tx.inverse_transform_point(tx.transform_point(p)) - p).length() < EPS);
    }
}
