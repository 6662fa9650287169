use bevy::{
    math::{EulerRot, Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
};
use serde::{Deserialize, Serialize};

/// Below this length vectors are treated as degenerate.
pub const EPSILON: f32 = 1e-5;

/// Local axis selector used for aim, up and twist axes.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[reflect(Default)]
pub enum Axis {
    #[default]
    X,
    NegX,
    Y,
    NegY,
    Z,
    NegZ,
}

impl Axis {
    pub fn to_vec3(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::NegX => Vec3::NEG_X,
            Axis::Y => Vec3::Y,
            Axis::NegY => Vec3::NEG_Y,
            Axis::Z => Vec3::Z,
            Axis::NegZ => Vec3::NEG_Z,
        }
    }
}

/// Per-axis selection of which components a constraint is allowed to write.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[reflect(Default)]
pub struct AxisMask {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl Default for AxisMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl AxisMask {
    pub const ALL: Self = Self {
        x: true,
        y: true,
        z: true,
    };

    pub const NONE: Self = Self {
        x: false,
        y: false,
        z: false,
    };

    pub fn is_all(&self) -> bool {
        self.x && self.y && self.z
    }

    pub fn is_none(&self) -> bool {
        !(self.x || self.y || self.z)
    }

    /// Takes masked-in components from `value` and the rest from `fallback`.
    pub fn select(&self, value: Vec3, fallback: Vec3) -> Vec3 {
        Vec3::new(
            if self.x { value.x } else { fallback.x },
            if self.y { value.y } else { fallback.y },
            if self.z { value.z } else { fallback.z },
        )
    }

    /// Same as [`AxisMask::select`] on the euler decomposition of two rotations.
    pub fn select_rotation(&self, value: Quat, fallback: Quat) -> Quat {
        if self.is_all() {
            return value;
        }
        if self.is_none() {
            return fallback;
        }
        let value = Vec3::from(value.to_euler(EulerRot::XYZ));
        let fallback = Vec3::from(fallback.to_euler(EulerRot::XYZ));
        let euler = self.select(value, fallback);
        Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z)
    }
}

/// Per-axis euler clamp in degrees. The default range `[-180, 180]` leaves rotations untouched.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
pub struct RotationLimits {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for RotationLimits {
    fn default() -> Self {
        Self {
            min: Vec3::splat(-180.),
            max: Vec3::splat(180.),
        }
    }
}

impl RotationLimits {
    pub fn is_unbounded(&self) -> bool {
        self.min.cmple(Vec3::splat(-180.)).all() && self.max.cmpge(Vec3::splat(180.)).all()
    }

    pub fn apply(&self, rotation: Quat) -> Quat {
        if self.is_unbounded() {
            return rotation;
        }
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        let degrees = Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees());
        euler_degrees(degrees.clamp(self.min, self.max.max(self.min)))
    }
}

/// Rotation from XYZ euler angles in degrees.
pub fn euler_degrees(degrees: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::XYZ,
        degrees.x.to_radians(),
        degrees.y.to_radians(),
        degrees.z.to_radians(),
    )
}

/// Shortest arc rotation taking `from` onto `to`; identity if either is degenerate.
pub fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(from, to)
}

/// Angle that rotates `from` onto `to` about `axis`, with both taken perpendicular to `axis`.
pub fn signed_angle(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    from.cross(to).dot(axis).atan2(from.dot(to))
}

/// Signed angle of the twist component of `rotation` about the unit `axis`, in `[-π, π]`.
pub fn twist_angle(rotation: Quat, axis: Vec3) -> f32 {
    let projection = Vec3::new(rotation.x, rotation.y, rotation.z).dot(axis);
    if projection.abs() <= EPSILON && rotation.w.abs() <= EPSILON {
        return 0.;
    }
    let angle = 2. * projection.atan2(rotation.w);
    if angle > std::f32::consts::PI {
        angle - std::f32::consts::TAU
    } else if angle < -std::f32::consts::PI {
        angle + std::f32::consts::TAU
    } else {
        angle
    }
}

/// Source weights clamped to be non-negative and scaled down when they add up past one.
///
/// Returns the normalized weights and their sum before scaling, capped at one.
pub fn normalize_weights(weights: impl IntoIterator<Item = f32>) -> (Vec<f32>, f32) {
    let mut weights: Vec<f32> = weights.into_iter().map(|w| w.max(0.)).collect();
    let sum: f32 = weights.iter().sum();
    if sum > 1. {
        weights.iter_mut().for_each(|w| *w /= sum);
    }
    (weights, sum.min(1.))
}

/// Running weighted average of rotations in source order. The first rotation seeds the
/// average, later ones are blended in by their share of the weight accumulated so far.
#[derive(Clone, Copy, Debug, Default)]
pub struct RotationAccumulator {
    rotation: Option<Quat>,
    weight: f32,
}

impl RotationAccumulator {
    pub fn add(&mut self, rotation: Quat, weight: f32) {
        match self.rotation {
            None => {
                self.rotation = Some(rotation);
                self.weight = weight;
            }
            Some(current) => {
                self.weight += weight;
                if self.weight > EPSILON {
                    self.rotation = Some(current.slerp(rotation, weight / self.weight).normalize());
                }
            }
        }
    }

    pub fn result(&self) -> Option<Quat> {
        self.rotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_mask_keeps_masked_out_components() {
        let mask = AxisMask {
            x: true,
            y: false,
            z: true,
        };
        assert_eq!(
            mask.select(Vec3::splat(1.), Vec3::splat(2.)),
            Vec3::new(1., 2., 1.)
        );
    }

    #[test]
    fn accumulator_matches_weighted_extremes() {
        let a = Quat::from_rotation_y(0.4);
        let b = Quat::from_rotation_x(-1.1);

        let mut acc = RotationAccumulator::default();
        acc.add(a, 1.);
        acc.add(b, 0.);
        assert!(acc.result().unwrap().angle_between(a) < 1e-5);

        let mut acc = RotationAccumulator::default();
        acc.add(a, 0.);
        acc.add(b, 1.);
        assert!(acc.result().unwrap().angle_between(b) < 1e-5);
    }

    #[test]
    fn accumulator_averages_equal_weights() {
        let mut acc = RotationAccumulator::default();
        acc.add(Quat::IDENTITY, 0.5);
        acc.add(Quat::from_rotation_z(1.), 0.5);
        assert!(acc.result().unwrap().angle_between(Quat::from_rotation_z(0.5)) < 1e-5);
    }

    #[test]
    fn weights_are_normalized_only_past_one() {
        let (weights, sum) = normalize_weights([0.25, 0.25]);
        assert_eq!(weights, vec![0.25, 0.25]);
        assert_eq!(sum, 0.5);

        let (weights, sum) = normalize_weights([2., 2., -1.]);
        assert_eq!(weights, vec![0.5, 0.5, 0.]);
        assert_eq!(sum, 1.);
    }

    #[test]
    fn twist_angle_ignores_swing() {
        let twist = Quat::from_rotation_y(0.7);
        let swing = Quat::from_rotation_x(0.3);
        assert!((twist_angle(twist, Vec3::Y) - 0.7).abs() < 1e-5);
        assert!(twist_angle(swing, Vec3::Y).abs() < 1e-5);
        assert!((twist_angle(Quat::from_rotation_y(-0.5), Vec3::Y) + 0.5).abs() < 1e-5);
    }

    #[test]
    fn degenerate_from_to_is_identity() {
        assert_eq!(from_to_rotation(Vec3::ZERO, Vec3::X), Quat::IDENTITY);
        let q = from_to_rotation(Vec3::X, Vec3::Y);
        assert!((q * Vec3::X - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn limits_clamp_each_axis() {
        let limits = RotationLimits {
            min: Vec3::new(-10., -180., -180.),
            max: Vec3::new(10., 180., 180.),
        };
        let clamped = limits.apply(Quat::from_rotation_x(45f32.to_radians()));
        assert!(clamped.angle_between(Quat::from_rotation_x(10f32.to_radians())) < 1e-4);
        assert_eq!(RotationLimits::default().apply(Quat::IDENTITY), Quat::IDENTITY);
    }
}
