use bevy::{
    math::Quat,
    reflect::{Reflect, std_traits::ReflectDefault},
};
use bevy_animation_rig_core::{
    binding::CurveBinding,
    constraint::{BindContext, ConstraintData, ConstraintJob, ConstraintWeight, InverseSolver, require_in},
    curves::AnimationCurve,
    errors::{BindError, BindResult},
    hierarchy::{NodeId, RigHierarchy},
    node_path::NodePath,
    stream::{AnimationStream, ReadOnlyTransformHandle, ReadWriteTransformHandle},
};
use serde::{Deserialize, Serialize};

use crate::{math::EPSILON, sources::rotation_bindings};

/// How a chain node's position along the chain is measured before sampling the curve.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[reflect(Default)]
pub enum TwistStep {
    /// Index fraction, `i / (n - 1)`.
    #[default]
    Index,
    /// Bind-time distance from the root over the total chain length.
    ArcLength,
}

/// Spreads the rotation difference between two target nodes along a chain.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct TwistChainData {
    pub root: Option<NodeId>,
    pub tip: Option<NodeId>,
    pub root_target: Option<NodeId>,
    pub tip_target: Option<NodeId>,
    pub curve: AnimationCurve,
    pub step: TwistStep,
}

impl Default for TwistChainData {
    fn default() -> Self {
        Self {
            root: None,
            tip: None,
            root_target: None,
            tip_target: None,
            curve: AnimationCurve::linear(0., 0., 1., 1.),
            step: TwistStep::Index,
        }
    }
}

#[derive(Debug)]
struct TwistBinding {
    chain: Vec<ReadWriteTransformHandle>,
    weights: Vec<f32>,
}

#[derive(Debug)]
pub struct TwistChainJob {
    chain: Vec<ReadWriteTransformHandle>,
    weights: Vec<f32>,
    /// World-space residual of each node against the interpolated endpoints at bind time.
    offsets: Vec<Quat>,
    root_target: ReadOnlyTransformHandle,
    tip_target: ReadOnlyTransformHandle,
    weight: ConstraintWeight,
}

impl ConstraintJob for TwistChainJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let root = self.root_target.rotation(stream);
        let tip = self.tip_target.rotation(stream);
        for ((node, weight), offset) in self.chain.iter().zip(&self.weights).zip(&self.offsets) {
            let current = node.rotation(stream);
            let solved = root.slerp(tip, *weight) * *offset;
            node.set_rotation(stream, current.slerp(solved, w));
        }
    }
}

impl TwistChainData {
    fn bind_chain(&self, stream: &dyn AnimationStream, ctx: &BindContext) -> BindResult<TwistBinding> {
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
        let steps = self.steps(stream, &chain);
        let last = chain.len() - 1;
        let weights = steps
            .iter()
            .enumerate()
            .map(|(i, step)| match i {
                0 => 0.,
                i if i == last => 1.,
                _ => self.curve.evaluate(*step).clamp(0., 1.),
            })
            .collect();
        Ok(TwistBinding { chain, weights })
    }

    fn steps(&self, stream: &dyn AnimationStream, chain: &[ReadWriteTransformHandle]) -> Vec<f32> {
        let last = (chain.len() - 1) as f32;
        let by_index = || -> Vec<f32> { (0..chain.len()).map(|i| i as f32 / last).collect() };
        match self.step {
            TwistStep::Index => by_index(),
            TwistStep::ArcLength => {
                let mut distance = 0.;
                let mut cumulative = vec![0.];
                for link in chain.windows(2) {
                    distance += link[0].position(stream).distance(link[1].position(stream));
                    cumulative.push(distance);
                }
                if distance <= EPSILON {
                    return by_index();
                }
                cumulative.into_iter().map(|d| d / distance).collect()
            }
        }
    }
}

impl ConstraintData for TwistChainData {
    type Job = TwistChainJob;
    type Inverse = TwistChainInverse;
    const NAME: &'static str = "TwistChain";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        let root = require_in(constraint, hierarchy, self.root, "root")?;
        let tip = require_in(constraint, hierarchy, self.tip, "tip")?;
        require_in(constraint, hierarchy, self.root_target, "root_target")?;
        require_in(constraint, hierarchy, self.tip_target, "tip_target")?;
        if hierarchy.extract_chain(root, tip).is_none() {
            return Err(BindError::NotDescendant {
                constraint: constraint.clone(),
                root,
                tip,
            });
        }
        Ok(())
    }

    fn create_job(&self, stream: &mut dyn AnimationStream, ctx: &BindContext) -> BindResult<TwistChainJob> {
        let TwistBinding { chain, weights } = self.bind_chain(stream, ctx)?;
        let root_bind = chain[0].rotation(stream);
        let tip_bind = chain[chain.len() - 1].rotation(stream);
        let offsets = chain
            .iter()
            .zip(&weights)
            .map(|(node, weight)| root_bind.slerp(tip_bind, *weight).inverse() * node.rotation(stream))
            .collect();
        Ok(TwistChainJob {
            chain,
            weights,
            offsets,
            root_target: stream.bind_read_only(ctx.require(self.root_target, "root_target")?),
            tip_target: stream.bind_read_only(ctx.require(self.tip_target, "tip_target")?),
            weight: ctx.weight,
        })
    }

    fn source_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings = rotation_bindings(hierarchy, self.root_target);
        bindings.extend(rotation_bindings(hierarchy, self.tip_target));
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

/// Copies the chain endpoints back onto the targets.
#[derive(Debug)]
pub struct TwistChainInverseJob {
    root: ReadOnlyTransformHandle,
    tip: ReadOnlyTransformHandle,
    root_target: ReadWriteTransformHandle,
    tip_target: ReadWriteTransformHandle,
    weight: ConstraintWeight,
}

impl ConstraintJob for TwistChainInverseJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        self.weight.handle().set(stream, 1.);
        let root = self.root.rotation(stream);
        let tip = self.tip.rotation(stream);
        self.root_target.set_rotation(stream, root);
        self.tip_target.set_rotation(stream, tip);
    }
}

pub struct TwistChainInverse;

impl InverseSolver<TwistChainData> for TwistChainInverse {
    const SUPPORTED: bool = true;

    fn create_job(
        data: &TwistChainData,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        let TwistBinding { chain, .. } = data.bind_chain(stream, ctx)?;
        Ok(Box::new(TwistChainInverseJob {
            root: chain[0].read_only(),
            tip: chain[chain.len() - 1].read_only(),
            root_target: stream.bind_read_write(ctx.require(data.root_target, "root_target")?),
            tip_target: stream.bind_read_write(ctx.require(data.tip_target, "tip_target")?),
            weight: ctx.weight,
        }))
    }
}

#[cfg(test)]
mod tests {
    use bevy::{math::Vec3, transform::components::Transform};
    use bevy_animation_rig_core::stream::SceneStream;

    use super::*;
    use crate::testing::{assert_quat_eq, evaluate, inverse_layer, layer, scene};

    /// Four links along Y with the two targets parented to the scene root.
    fn setup(spacing: [f32; 3]) -> (SceneStream, TwistChainData, Vec<NodeId>) {
        let (stream, ids) = scene(&[
            ("root", None, Vec3::ZERO),
            ("c0", Some(0), Vec3::ZERO),
            ("c1", Some(1), Vec3::Y * spacing[0]),
            ("c2", Some(2), Vec3::Y * spacing[1]),
            ("c3", Some(3), Vec3::Y * spacing[2]),
            ("root_target", Some(0), Vec3::ZERO),
            ("tip_target", Some(0), Vec3::Y * 3.),
        ]);
        let data = TwistChainData {
            root: Some(ids[1]),
            tip: Some(ids[4]),
            root_target: Some(ids[5]),
            tip_target: Some(ids[6]),
            ..Default::default()
        };
        (stream, data, ids)
    }

    fn twist_tip(stream: &mut SceneStream, tip_target: NodeId, angle: f32) {
        stream.set_rest_transform(
            tip_target,
            Transform::from_xyz(0., 3., 0.).with_rotation(Quat::from_rotation_y(angle)),
        );
    }

    #[test]
    fn zero_weight_is_pass_through() {
        let (mut stream, data, ids) = setup([1.; 3]);
        twist_tip(&mut stream, ids[6], 1.2);
        evaluate(&mut stream, data, 0.);
        for node in &ids[1..5] {
            assert_eq!(stream.local_transform(*node), stream.rest_transform(*node));
        }
    }

    #[test]
    fn endpoints_snap_and_twist_is_spread_by_index() {
        let (mut stream, data, ids) = setup([1.; 3]);
        let mut layer = layer(data, 1.);
        layer.bind(&mut stream).unwrap();
        stream.set_local_transform(ids[5], Transform::from_rotation(Quat::from_rotation_y(0.3)));
        stream.set_local_transform(
            ids[6],
            Transform::from_xyz(0., 3., 0.).with_rotation(Quat::from_rotation_y(1.2)),
        );
        layer.update(&mut stream);

        let rotation = |node: NodeId| stream.global_transform(node).rotation;
        assert_quat_eq(rotation(ids[1]), Quat::from_rotation_y(0.3), 1e-5);
        assert_quat_eq(rotation(ids[2]), Quat::from_rotation_y(0.6), 1e-5);
        assert_quat_eq(rotation(ids[3]), Quat::from_rotation_y(0.9), 1e-5);
        assert_quat_eq(rotation(ids[4]), Quat::from_rotation_y(1.2), 1e-5);
    }

    #[test]
    fn arc_length_steps_follow_link_lengths() {
        let (mut stream, mut data, ids) = setup([2., 1., 1.]);
        data.step = TwistStep::ArcLength;
        twist_tip(&mut stream, ids[6], 1.2);
        evaluate(&mut stream, data, 1.);
        // c1 sits halfway along the chain length
        assert_quat_eq(stream.global_transform(ids[2]).rotation, Quat::from_rotation_y(0.6), 1e-5);
        assert_quat_eq(stream.global_transform(ids[3]).rotation, Quat::from_rotation_y(0.9), 1e-5);
    }

    #[test]
    fn tip_outside_the_chain_is_invalid() {
        let (mut stream, mut data, ids) = setup([1.; 3]);
        data.tip = Some(ids[6]);
        assert!(matches!(
            layer(data, 1.).bind(&mut stream),
            Err(BindError::NotDescendant { .. })
        ));
    }

    #[test]
    fn inverse_copies_endpoints_to_targets() {
        let (mut stream, data, ids) = setup([1.; 3]);
        let mut inverse = inverse_layer(data);
        inverse.bind(&mut stream).unwrap();
        stream.set_local_transform(ids[1], Transform::from_rotation(Quat::from_rotation_x(0.4)));
        stream.set_local_transform(
            ids[4],
            Transform::from_xyz(0., 1., 0.).with_rotation(Quat::from_rotation_y(0.8)),
        );
        inverse.update(&mut stream);
        assert_quat_eq(stream.global_transform(ids[5]).rotation, Quat::from_rotation_x(0.4), 1e-5);
        assert_quat_eq(
            stream.global_transform(ids[6]).rotation,
            stream.global_transform(ids[4]).rotation,
            1e-5,
        );
    }
}
