use bevy::{
    math::{Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
};
use bevy_animation_rig_core::{
    affine::AffineTransform,
    binding::CurveBinding,
    constraint::{BindContext, ConstraintData, ConstraintJob, ConstraintWeight, NoInverse, require_in},
    errors::{BindError, BindResult},
    hierarchy::{NodeId, RigHierarchy},
    node_path::NodePath,
    stream::{AnimationStream, PropertyHandle, ReadOnlyTransformHandle, ReadWriteTransformHandle},
};
use serde::{Deserialize, Serialize};

use crate::{
    ik::solve_fabrik,
    math::from_to_rotation,
    sources::{rotation_bindings, tr_bindings},
};

pub const CHAIN_ROTATION_WEIGHT: &str = "chainRotationWeight";
pub const TIP_ROTATION_WEIGHT: &str = "tipRotationWeight";

pub const MAX_ITERATIONS: usize = 50;

/// Iterative reach over an arbitrary root to tip chain.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct ChainIKData {
    pub root: Option<NodeId>,
    pub tip: Option<NodeId>,
    pub target: Option<NodeId>,
    pub chain_rotation_weight: f32,
    pub tip_rotation_weight: f32,
    pub max_iterations: usize,
    pub tolerance: f32,
    pub maintain_target_position_offset: bool,
    pub maintain_target_rotation_offset: bool,
}

impl Default for ChainIKData {
    fn default() -> Self {
        Self {
            root: None,
            tip: None,
            target: None,
            chain_rotation_weight: 1.,
            tip_rotation_weight: 1.,
            max_iterations: 15,
            tolerance: 1e-4,
            maintain_target_position_offset: false,
            maintain_target_rotation_offset: false,
        }
    }
}

#[derive(Debug)]
pub struct ChainIKJob {
    chain: Vec<ReadWriteTransformHandle>,
    lengths: Vec<f32>,
    target: ReadOnlyTransformHandle,
    target_offset: AffineTransform,
    max_iterations: usize,
    tolerance: f32,
    chain_rotation_weight: PropertyHandle,
    tip_rotation_weight: PropertyHandle,
    weight: ConstraintWeight,
    positions: Vec<Vec3>,
}

impl ConstraintJob for ChainIKJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let chain_weight = self.chain_rotation_weight.get(stream).clamp(0., 1.) * w;
        let tip_weight = self.tip_rotation_weight.get(stream).clamp(0., 1.) * w;

        let target = self.target.global_tr(stream);
        let target_position = target.translation + self.target_offset.translation;
        let target_rotation = target.rotation * self.target_offset.rotation;

        self.positions.clear();
        self.positions.extend(self.chain.iter().map(|node| node.position(stream)));
        solve_fabrik(
            &mut self.positions,
            &self.lengths,
            target_position,
            self.tolerance,
            self.max_iterations,
        );

        if chain_weight > 0. {
            // parents first, so each joint sees the swing already applied above it
            for i in 0..self.chain.len().saturating_sub(1) {
                let (joint, child) = (self.chain[i], self.chain[i + 1]);
                let current_dir = child.position(stream) - joint.position(stream);
                let solved_dir = self.positions[i + 1] - self.positions[i];
                let rotation = joint.rotation(stream);
                let swung = from_to_rotation(current_dir, solved_dir) * rotation;
                joint.set_rotation(stream, rotation.slerp(swung, chain_weight));
            }
        }

        if tip_weight > 0. {
            if let Some(tip) = self.chain.last() {
                let rotation = tip.rotation(stream);
                tip.set_rotation(stream, rotation.slerp(target_rotation, tip_weight));
            }
        }
    }
}

impl ConstraintData for ChainIKData {
    type Job = ChainIKJob;
    type Inverse = NoInverse;
    const NAME: &'static str = "ChainIK";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        let root = require_in(constraint, hierarchy, self.root, "root")?;
        let tip = require_in(constraint, hierarchy, self.tip, "tip")?;
        require_in(constraint, hierarchy, self.target, "target")?;
        if hierarchy.extract_chain(root, tip).is_none() {
            return Err(BindError::NotDescendant {
                constraint: constraint.clone(),
                root,
                tip,
            });
        }
        if !(1..=MAX_ITERATIONS).contains(&self.max_iterations) {
            return Err(BindError::InvalidParameter {
                constraint: constraint.clone(),
                reason: format!(
                    "max_iterations must be in 1..={MAX_ITERATIONS}, got {}",
                    self.max_iterations
                ),
            });
        }
        if !(self.tolerance >= 0.) {
            return Err(BindError::InvalidParameter {
                constraint: constraint.clone(),
                reason: format!("tolerance must be non-negative, got {}", self.tolerance),
            });
        }
        Ok(())
    }

    fn create_job(&self, stream: &mut dyn AnimationStream, ctx: &BindContext) -> BindResult<ChainIKJob> {
        let root = ctx.require(self.root, "root")?;
        let tip = ctx.require(self.tip, "tip")?;
        let nodes = stream
            .hierarchy()
            .extract_chain(root, tip)
            .ok_or_else(|| BindError::NotDescendant {
                constraint: ctx.constraint.clone(),
                root,
                tip,
            })?;
        let chain: Vec<_> = nodes.into_iter().map(|node| stream.bind_read_write(node)).collect();
        let lengths = chain
            .windows(2)
            .map(|link| link[0].position(stream).distance(link[1].position(stream)))
            .collect();

        let target = stream.bind_read_only(ctx.require(self.target, "target")?);
        let target_tx = target.global_tr(stream);
        let tip_tx = chain[chain.len() - 1].global_tr(stream);
        let target_offset = AffineTransform {
            translation: if self.maintain_target_position_offset {
                tip_tx.translation - target_tx.translation
            } else {
                Vec3::ZERO
            },
            rotation: if self.maintain_target_rotation_offset {
                target_tx.rotation.inverse() * tip_tx.rotation
            } else {
                Quat::IDENTITY
            },
        };

        Ok(ChainIKJob {
            positions: Vec::with_capacity(chain.len()),
            chain,
            lengths,
            target,
            target_offset,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            chain_rotation_weight: stream
                .bind_property(&ctx.property(CHAIN_ROTATION_WEIGHT), self.chain_rotation_weight),
            tip_rotation_weight: stream.bind_property(&ctx.property(TIP_ROTATION_WEIGHT), self.tip_rotation_weight),
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut ChainIKJob, stream: &mut dyn AnimationStream) {
        job.chain_rotation_weight.sync(stream, self.chain_rotation_weight);
        job.tip_rotation_weight.sync(stream, self.tip_rotation_weight);
    }

    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings = tr_bindings(hierarchy, self.target);
        bindings.push(CurveBinding::float(constraint.clone(), CHAIN_ROTATION_WEIGHT));
        bindings.push(CurveBinding::float(constraint.clone(), TIP_ROTATION_WEIGHT));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let (Some(root), Some(tip)) = (self.root, self.tip) else {
            return vec![];
        };
        hierarchy
            .extract_chain(root, tip)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|node| rotation_bindings(hierarchy, Some(node)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use bevy::transform::components::Transform;
    use bevy_animation_rig_core::stream::SceneStream;

    use super::*;
    use crate::testing::{assert_quat_eq, assert_vec_eq, evaluate, layer, scene};

    /// Four joints stacked along Y, one unit apart, and a target parented to the scene root.
    fn setup() -> (SceneStream, ChainIKData, Vec<NodeId>) {
        let (stream, ids) = scene(&[
            ("root", None, Vec3::ZERO),
            ("j0", Some(0), Vec3::ZERO),
            ("j1", Some(1), Vec3::Y),
            ("j2", Some(2), Vec3::Y),
            ("j3", Some(3), Vec3::Y),
            ("target", Some(0), Vec3::new(1.5, 1.5, 0.)),
        ]);
        let data = ChainIKData {
            root: Some(ids[1]),
            tip: Some(ids[4]),
            target: Some(ids[5]),
            max_iterations: 50,
            ..Default::default()
        };
        (stream, data, ids)
    }

    #[test]
    fn zero_weight_is_pass_through() {
        let (mut stream, data, ids) = setup();
        evaluate(&mut stream, data, 0.);
        for node in &ids[1..5] {
            assert_eq!(stream.local_transform(*node), stream.rest_transform(*node));
        }
    }

    #[test]
    fn reaches_a_reachable_target() {
        let (mut stream, data, ids) = setup();
        evaluate(&mut stream, data, 1.);
        assert_vec_eq(stream.global_transform(ids[4]).translation, Vec3::new(1.5, 1.5, 0.), 1e-3);
        // rotations keep the links rigid
        for pair in ids[1..5].windows(2) {
            let length = stream
                .global_transform(pair[0])
                .translation
                .distance(stream.global_transform(pair[1]).translation);
            assert!((length - 1.).abs() < 1e-4);
        }
    }

    #[test]
    fn tip_rotation_follows_target() {
        let (mut stream, data, ids) = setup();
        stream.set_rest_transform(
            ids[5],
            Transform::from_xyz(1.5, 1.5, 0.).with_rotation(Quat::from_rotation_z(0.3)),
        );
        evaluate(&mut stream, data, 1.);
        assert_quat_eq(stream.global_transform(ids[4]).rotation, Quat::from_rotation_z(0.3), 1e-4);
    }

    #[test]
    fn zero_chain_weight_leaves_joints_in_place() {
        let (mut stream, mut data, ids) = setup();
        data.chain_rotation_weight = 0.;
        data.tip_rotation_weight = 0.;
        evaluate(&mut stream, data, 1.);
        assert_vec_eq(stream.global_transform(ids[4]).translation, Vec3::Y * 3., 1e-6);
    }

    #[test]
    fn iteration_count_is_validated() {
        let (mut stream, mut data, _) = setup();
        data.max_iterations = 0;
        assert!(matches!(
            layer(data.clone(), 1.).bind(&mut stream),
            Err(BindError::InvalidParameter { .. })
        ));
        data.max_iterations = 51;
        assert!(layer(data, 1.).bind(&mut stream).is_err());
    }

    #[test]
    fn tip_outside_the_chain_is_invalid() {
        let (mut stream, mut data, ids) = setup();
        data.tip = Some(ids[5]);
        assert!(matches!(
            layer(data, 1.).bind(&mut stream),
            Err(BindError::NotDescendant { .. })
        ));
    }
}
