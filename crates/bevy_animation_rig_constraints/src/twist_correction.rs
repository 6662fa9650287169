use bevy::{
    math::{Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
};
use bevy_animation_rig_core::{
    binding::CurveBinding,
    constraint::{BindContext, ConstraintData, ConstraintJob, ConstraintWeight, NoInverse, require_in},
    errors::BindResult,
    hierarchy::{NodeId, RigHierarchy},
    node_path::NodePath,
    stream::{AnimationStream, ReadOnlyTransformHandle, ReadWriteTransformHandle},
    weighted::{WeightRange, WeightedTransformSet},
};
use serde::{Deserialize, Serialize};

use crate::{
    math::{Axis, twist_angle},
    sources::{WeightedSources, rotation_bindings, validate_set, weight_bindings},
};

pub const TWIST_NODES: &str = "twistNodes";

/// Redistributes the twist of a source about one of its local axes onto a set of nodes, for
/// example forearm roll bones driven by the hand.
#[derive(Reflect, Clone, Debug, Default, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct TwistCorrectionData {
    pub source: Option<NodeId>,
    pub twist_axis: Axis,
    /// Weights lie in `[-1, 1]`. Negative weights counter-twist.
    pub twist_nodes: WeightedTransformSet,
}

#[derive(Debug)]
pub struct TwistCorrectionJob {
    source: ReadOnlyTransformHandle,
    source_bind_inverse: Quat,
    axis: Vec3,
    nodes: Vec<ReadWriteTransformHandle>,
    node_binds: Vec<Quat>,
    twist_nodes: WeightedSources,
    weight: ConstraintWeight,
}

impl ConstraintJob for TwistCorrectionJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let axis = self.axis;
        let delta = self.source_bind_inverse * self.source.local_rotation(stream);
        let angle = twist_angle(delta, axis);

        let weights = self.twist_nodes.raw_weights(stream);
        for ((node, bind), weight) in self.nodes.iter().zip(&self.node_binds).zip(weights) {
            let weight = WeightRange::SIGNED_UNIT.clamp(weight);
            if weight == 0. {
                continue;
            }
            let current = node.local_rotation(stream);
            let twisted = *bind * Quat::from_axis_angle(axis, angle * weight);
            node.set_local_rotation(stream, current.slerp(twisted, w));
        }
    }
}

impl ConstraintData for TwistCorrectionData {
    type Job = TwistCorrectionJob;
    type Inverse = NoInverse;
    const NAME: &'static str = "TwistCorrection";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        require_in(constraint, hierarchy, self.source, "source")?;
        validate_set(constraint, hierarchy, &self.twist_nodes, "twist_nodes")
    }

    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<TwistCorrectionJob> {
        let source = stream.bind_read_only(ctx.require(self.source, "source")?);
        let twist_nodes = WeightedSources::bind(stream, ctx, TWIST_NODES, &self.twist_nodes)?;
        let nodes = twist_nodes.bind_read_write(stream);
        Ok(TwistCorrectionJob {
            source_bind_inverse: source.local_rotation(stream).inverse(),
            source,
            node_binds: nodes.iter().map(|node| node.local_rotation(stream)).collect(),
            nodes,
            axis: self.twist_axis.to_vec3(),
            twist_nodes,
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut TwistCorrectionJob, stream: &mut dyn AnimationStream) {
        job.twist_nodes.sync(stream, &self.twist_nodes);
    }

    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings = rotation_bindings(hierarchy, self.source);
        bindings.extend(weight_bindings(constraint, TWIST_NODES, self.twist_nodes.len()));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        self.twist_nodes
            .iter()
            .flat_map(|node| rotation_bindings(hierarchy, node.node))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use bevy::transform::components::Transform;
    use bevy_animation_rig_core::{stream::SceneStream, weighted::WeightedTransform};

    use super::*;
    use crate::testing::{assert_quat_eq, layer, scene};

    fn setup(weights: [f32; 3]) -> (SceneStream, TwistCorrectionData, [NodeId; 4]) {
        let (stream, ids) = scene(&[
            ("root", None, Vec3::ZERO),
            ("hand", Some(0), Vec3::Y * 2.),
            ("roll_a", Some(0), Vec3::Y * 0.5),
            ("roll_b", Some(0), Vec3::Y),
            ("roll_c", Some(0), Vec3::Y * 1.5),
        ]);
        let mut twist_nodes = WeightedTransformSet::new();
        for (node, weight) in ids[2..].iter().zip(weights) {
            twist_nodes.push(WeightedTransform::new(*node, weight)).unwrap();
        }
        let data = TwistCorrectionData {
            source: Some(ids[1]),
            twist_axis: Axis::Y,
            twist_nodes,
        };
        (stream, data, [ids[1], ids[2], ids[3], ids[4]])
    }

    fn twist_hand(stream: &mut SceneStream, hand: NodeId) {
        // swing about X followed by a 1 radian twist about Y
        stream.set_local_transform(
            hand,
            Transform::from_xyz(0., 2., 0.)
                .with_rotation(Quat::from_rotation_x(0.4) * Quat::from_rotation_y(1.)),
        );
    }

    #[test]
    fn zero_weight_is_pass_through() {
        let (mut stream, data, [hand, a, b, c]) = setup([1., 0.5, -0.5]);
        let mut layer = layer(data, 0.);
        layer.bind(&mut stream).unwrap();
        twist_hand(&mut stream, hand);
        layer.update(&mut stream);
        for node in [a, b, c] {
            assert_eq!(stream.local_transform(node), stream.rest_transform(node));
        }
    }

    #[test]
    fn twist_is_distributed_by_weight() {
        let (mut stream, data, [hand, a, b, c]) = setup([1., 0.5, -0.5]);
        let mut layer = layer(data, 1.);
        layer.bind(&mut stream).unwrap();
        twist_hand(&mut stream, hand);
        layer.update(&mut stream);

        assert_quat_eq(stream.local_transform(a).rotation, Quat::from_rotation_y(1.), 1e-5);
        assert_quat_eq(stream.local_transform(b).rotation, Quat::from_rotation_y(0.5), 1e-5);
        assert_quat_eq(stream.local_transform(c).rotation, Quat::from_rotation_y(-0.5), 1e-5);
    }

    #[test]
    fn zero_node_weight_leaves_node_untouched() {
        let (mut stream, data, [hand, a, b, _]) = setup([0., 1., 1.]);
        let mut layer = layer(data, 1.);
        layer.bind(&mut stream).unwrap();
        twist_hand(&mut stream, hand);
        layer.update(&mut stream);
        assert_eq!(stream.local_transform(a), stream.rest_transform(a));
        assert_quat_eq(stream.local_transform(b).rotation, Quat::from_rotation_y(1.), 1e-5);
    }

    #[test]
    fn weights_are_clamped_to_signed_unit() {
        let (mut stream, data, [hand, a, ..]) = setup([3., 0., 0.]);
        let mut layer = layer(data, 1.);
        layer.bind(&mut stream).unwrap();
        twist_hand(&mut stream, hand);
        layer.update(&mut stream);
        assert_quat_eq(stream.local_transform(a).rotation, Quat::from_rotation_y(1.), 1e-5);
    }
}
