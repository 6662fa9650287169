use bevy::{
    math::{Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
};
use bevy_animation_rig_core::{
    affine::AffineTransform,
    binding::CurveBinding,
    constraint::{BindContext, ConstraintData, ConstraintJob, ConstraintWeight, InverseSolver, require_in},
    errors::{BindError, BindResult},
    hierarchy::{NodeId, RigHierarchy},
    node_path::NodePath,
    stream::{AnimationStream, PropertyHandle, ReadOnlyTransformHandle, ReadWriteTransformHandle},
};
use serde::{Deserialize, Serialize};

use crate::{
    ik::{PoleHint, solve_two_bone_ik},
    sources::{position_bindings, rotation_bindings, tr_bindings},
};

pub const TARGET_POSITION_WEIGHT: &str = "targetPositionWeight";
pub const TARGET_ROTATION_WEIGHT: &str = "targetRotationWeight";
pub const HINT_WEIGHT: &str = "hintWeight";

/// Analytic IK over a root, mid and tip chain, with an optional hint controlling the bend
/// plane.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct TwoBoneIKData {
    pub root: Option<NodeId>,
    pub mid: Option<NodeId>,
    pub tip: Option<NodeId>,
    pub target: Option<NodeId>,
    pub hint: Option<NodeId>,
    pub target_position_weight: f32,
    pub target_rotation_weight: f32,
    pub hint_weight: f32,
    pub maintain_target_position_offset: bool,
    pub maintain_target_rotation_offset: bool,
}

impl Default for TwoBoneIKData {
    fn default() -> Self {
        Self {
            root: None,
            mid: None,
            tip: None,
            target: None,
            hint: None,
            target_position_weight: 1.,
            target_rotation_weight: 1.,
            hint_weight: 1.,
            maintain_target_position_offset: false,
            maintain_target_rotation_offset: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chain {
    root: ReadWriteTransformHandle,
    mid: ReadWriteTransformHandle,
    tip: ReadWriteTransformHandle,
    upper_len: f32,
    lower_len: f32,
}

#[derive(Debug)]
pub struct TwoBoneIKJob {
    chain: Chain,
    target: ReadOnlyTransformHandle,
    hint: Option<ReadOnlyTransformHandle>,
    /// Added to the target pose: translation in world space, rotation on the right.
    target_offset: AffineTransform,
    target_position_weight: PropertyHandle,
    target_rotation_weight: PropertyHandle,
    hint_weight: PropertyHandle,
    weight: ConstraintWeight,
}

impl ConstraintJob for TwoBoneIKJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let position_weight = self.target_position_weight.get(stream).clamp(0., 1.) * w;
        let rotation_weight = self.target_rotation_weight.get(stream).clamp(0., 1.) * w;
        let hint_weight = self.hint_weight.get(stream).clamp(0., 1.) * w;
        let Chain {
            root,
            mid,
            tip,
            upper_len,
            lower_len,
        } = self.chain;

        let target = self.target.global_tr(stream);
        let target_position = target.translation + self.target_offset.translation;
        let target_rotation = target.rotation * self.target_offset.rotation;

        if position_weight > 0. {
            let root_position = root.position(stream);
            let tip_position = tip.position(stream);
            let hint = self.hint.map(|hint| PoleHint {
                position: hint.position(stream),
                weight: hint_weight,
            });
            let solution = solve_two_bone_ik(
                root_position,
                mid.position(stream),
                tip_position,
                tip_position.lerp(target_position, position_weight),
                hint,
                upper_len,
                lower_len,
            );
            if let Some(solution) = solution {
                let root_rotation = root.rotation(stream);
                let mid_rotation = mid.rotation(stream);
                root.set_rotation(stream, solution.root_swing * root_rotation);
                mid.set_rotation(stream, solution.mid_swing * mid_rotation);
            }
        }

        if rotation_weight > 0. {
            let tip_rotation = tip.rotation(stream);
            tip.set_rotation(stream, tip_rotation.slerp(target_rotation, rotation_weight));
        }
    }
}

impl TwoBoneIKData {
    fn bind_chain(&self, stream: &dyn AnimationStream, ctx: &BindContext) -> BindResult<Chain> {
        let root = stream.bind_read_write(ctx.require(self.root, "root")?);
        let mid = stream.bind_read_write(ctx.require(self.mid, "mid")?);
        let tip = stream.bind_read_write(ctx.require(self.tip, "tip")?);
        Ok(Chain {
            root,
            mid,
            tip,
            upper_len: root.position(stream).distance(mid.position(stream)),
            lower_len: mid.position(stream).distance(tip.position(stream)),
        })
    }

    fn bind_target_offset(&self, stream: &dyn AnimationStream, chain: &Chain, target: ReadOnlyTransformHandle) -> AffineTransform {
        let tip = chain.tip.global_tr(stream);
        let target = target.global_tr(stream);
        AffineTransform {
            translation: if self.maintain_target_position_offset {
                tip.translation - target.translation
            } else {
                Vec3::ZERO
            },
            rotation: if self.maintain_target_rotation_offset {
                target.rotation.inverse() * tip.rotation
            } else {
                Quat::IDENTITY
            },
        }
    }
}

impl ConstraintData for TwoBoneIKData {
    type Job = TwoBoneIKJob;
    type Inverse = TwoBoneIKInverse;
    const NAME: &'static str = "TwoBoneIK";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        let root = require_in(constraint, hierarchy, self.root, "root")?;
        let mid = require_in(constraint, hierarchy, self.mid, "mid")?;
        let tip = require_in(constraint, hierarchy, self.tip, "tip")?;
        require_in(constraint, hierarchy, self.target, "target")?;
        if let Some(hint) = self.hint {
            require_in(constraint, hierarchy, Some(hint), "hint")?;
        }
        for (ancestor, node) in [(root, mid), (mid, tip)] {
            if !hierarchy.is_descendant_of(node, ancestor) {
                return Err(BindError::NotDescendant {
                    constraint: constraint.clone(),
                    root: ancestor,
                    tip: node,
                });
            }
        }
        Ok(())
    }

    fn create_job(&self, stream: &mut dyn AnimationStream, ctx: &BindContext) -> BindResult<TwoBoneIKJob> {
        let chain = self.bind_chain(stream, ctx)?;
        let target = stream.bind_read_only(ctx.require(self.target, "target")?);
        Ok(TwoBoneIKJob {
            chain,
            target,
            hint: self.hint.map(|hint| stream.bind_read_only(hint)),
            target_offset: self.bind_target_offset(stream, &chain, target),
            target_position_weight: stream
                .bind_property(&ctx.property(TARGET_POSITION_WEIGHT), self.target_position_weight),
            target_rotation_weight: stream
                .bind_property(&ctx.property(TARGET_ROTATION_WEIGHT), self.target_rotation_weight),
            hint_weight: stream.bind_property(&ctx.property(HINT_WEIGHT), self.hint_weight),
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut TwoBoneIKJob, stream: &mut dyn AnimationStream) {
        job.target_position_weight.sync(stream, self.target_position_weight);
        job.target_rotation_weight.sync(stream, self.target_rotation_weight);
        job.hint_weight.sync(stream, self.hint_weight);
    }

    fn source_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings = tr_bindings(hierarchy, self.target);
        bindings.extend(position_bindings(hierarchy, self.hint));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        [self.root, self.mid, self.tip]
            .into_iter()
            .flat_map(|node| rotation_bindings(hierarchy, node))
            .collect()
    }
}

/// Recovers target and hint from an animated chain.
#[derive(Debug)]
pub struct TwoBoneIKInverseJob {
    chain: Chain,
    target: ReadWriteTransformHandle,
    hint: Option<ReadWriteTransformHandle>,
    target_offset: AffineTransform,
    weights: [PropertyHandle; 3],
    weight: ConstraintWeight,
}

impl ConstraintJob for TwoBoneIKInverseJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        self.weight.handle().set(stream, 1.);
        for handle in self.weights {
            handle.set(stream, 1.);
        }

        let tip = self.chain.tip.global_tr(stream);
        self.target.set_global_tr(
            stream,
            AffineTransform::new(
                tip.translation - self.target_offset.translation,
                tip.rotation * self.target_offset.rotation.inverse(),
            ),
        );

        let Some(hint) = self.hint else {
            return;
        };
        let root = self.chain.root.position(stream);
        let mid = self.chain.mid.position(stream);
        let Some(axis) = (tip.translation - root).try_normalize() else {
            return;
        };
        // straight limbs have no bend plane to recover
        let Some(pole) = (mid - root).reject_from_normalized(axis).try_normalize() else {
            return;
        };
        let distance = (self.chain.upper_len + self.chain.lower_len) * 0.5;
        hint.set_position(stream, mid + pole * distance);
    }
}

pub struct TwoBoneIKInverse;

impl InverseSolver<TwoBoneIKData> for TwoBoneIKInverse {
    const SUPPORTED: bool = true;

    fn create_job(
        data: &TwoBoneIKData,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        let chain = data.bind_chain(stream, ctx)?;
        let target = stream.bind_read_write(ctx.require(data.target, "target")?);
        let target_offset = data.bind_target_offset(stream, &chain, target.read_only());
        let weights = [
            (TARGET_POSITION_WEIGHT, data.target_position_weight),
            (TARGET_ROTATION_WEIGHT, data.target_rotation_weight),
            (HINT_WEIGHT, data.hint_weight),
        ]
        .map(|(name, value)| stream.bind_property(&ctx.property(name), value));
        Ok(Box::new(TwoBoneIKInverseJob {
            chain,
            target,
            hint: data.hint.map(|hint| stream.bind_read_write(hint)),
            target_offset,
            weights,
            weight: ctx.weight,
        }))
    }
}

#[cfg(test)]
mod tests {
    use bevy::transform::components::Transform;
    use bevy_animation_rig_core::stream::SceneStream;

    use super::*;
    use crate::testing::{assert_quat_eq, assert_vec_eq, evaluate, inverse_layer, layer, scene};

    /// Arm bent in the XY plane, target and hint parented to the root.
    fn setup() -> (SceneStream, TwoBoneIKData, [NodeId; 5]) {
        let (stream, ids) = scene(&[
            ("root", None, Vec3::ZERO),
            ("upper", Some(0), Vec3::ZERO),
            ("lower", Some(1), Vec3::new(0.2, 1., 0.)),
            ("hand", Some(2), Vec3::new(-0.2, 1., 0.)),
            ("target", Some(0), Vec3::new(0., 2., 0.)),
            ("hint", Some(0), Vec3::new(1., 1., 0.)),
        ]);
        let data = TwoBoneIKData {
            root: Some(ids[1]),
            mid: Some(ids[2]),
            tip: Some(ids[3]),
            target: Some(ids[4]),
            hint: Some(ids[5]),
            ..Default::default()
        };
        (stream, data, [ids[1], ids[2], ids[3], ids[4], ids[5]])
    }

    #[test]
    fn zero_weight_is_pass_through() {
        let (mut stream, data, [upper, lower, hand, target, _]) = setup();
        let mut layer = layer(data, 0.);
        layer.bind(&mut stream).unwrap();
        stream.set_local_transform(target, Transform::from_xyz(1., 0.5, 0.5));
        layer.update(&mut stream);
        for node in [upper, lower, hand] {
            assert_eq!(stream.local_transform(node), stream.rest_transform(node));
        }
    }

    #[test]
    fn reaches_target_with_rigid_links() {
        let (mut stream, data, [upper, lower, hand, target, _]) = setup();
        let upper_len = stream.global_transform(upper).translation.distance(stream.global_transform(lower).translation);
        let lower_len = stream.global_transform(lower).translation.distance(stream.global_transform(hand).translation);

        let mut layer = layer(data, 1.);
        layer.bind(&mut stream).unwrap();
        let goal = Vec3::new(0.8, 0.9, 0.6);
        stream.set_local_transform(
            target,
            Transform::from_translation(goal).with_rotation(Quat::from_rotation_x(0.4)),
        );
        layer.update(&mut stream);

        let [root, mid, tip] = [upper, lower, hand].map(|node| stream.global_transform(node));
        assert_vec_eq(tip.translation, goal, 1e-3);
        assert!((root.translation.distance(mid.translation) - upper_len).abs() < 1e-4);
        assert!((mid.translation.distance(tip.translation) - lower_len).abs() < 1e-4);
        assert_quat_eq(tip.rotation, Quat::from_rotation_x(0.4), 1e-4);
    }

    #[test]
    fn unreachable_target_straightens_towards_it() {
        let (mut stream, data, [upper, _, hand, target, _]) = setup();
        stream.set_rest_transform(target, Transform::from_xyz(10., 0., 0.));
        evaluate(&mut stream, data, 1.);
        let root = stream.global_transform(upper).translation;
        let tip = stream.global_transform(hand).translation;
        assert!((tip - root).normalize().dot(Vec3::X) > 0.999);
        assert!(tip.is_finite());
    }

    #[test]
    fn tip_not_below_mid_is_invalid() {
        let (mut stream, mut data, [upper, ..]) = setup();
        data.tip = Some(upper);
        assert!(matches!(
            layer(data, 1.).bind(&mut stream),
            Err(BindError::NotDescendant { .. })
        ));
    }

    #[test]
    fn inverse_targets_reproduce_the_chain() {
        let (mut stream, data, [upper, lower, hand, ..]) = setup();
        let mut inverse = inverse_layer(data.clone());
        inverse.bind(&mut stream).unwrap();
        let mut forward = layer(data, 1.);
        forward.bind(&mut stream).unwrap();

        stream.set_local_transform(upper, Transform::from_rotation(Quat::from_rotation_z(0.5)));
        stream.set_local_transform(
            lower,
            Transform::from_xyz(0.2, 1., 0.).with_rotation(Quat::from_rotation_z(-0.7)),
        );
        let animated = [upper, lower, hand].map(|node| stream.global_transform(node));
        inverse.update(&mut stream);

        for node in [upper, lower, hand] {
            stream.set_local_transform(node, stream.rest_transform(node));
        }
        forward.update(&mut stream);
        for (node, expected) in [upper, lower, hand].into_iter().zip(animated) {
            let actual = stream.global_transform(node);
            assert_vec_eq(actual.translation, expected.translation, 1e-3);
            assert_quat_eq(actual.rotation, expected.rotation, 1e-3);
        }
    }
}
