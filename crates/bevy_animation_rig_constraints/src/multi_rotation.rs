use bevy::{
    math::{Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
};
use bevy_animation_rig_core::{
    binding::CurveBinding,
    constraint::{BindContext, ConstraintData, ConstraintJob, ConstraintWeight, InverseSolver, require_in},
    errors::BindResult,
    hierarchy::{NodeId, RigHierarchy},
    node_path::NodePath,
    stream::{AnimationStream, ReadOnlyTransformHandle, ReadWriteTransformHandle},
    weighted::WeightedTransformSet,
};
use serde::{Deserialize, Serialize};

use crate::{
    math::{AxisMask, EPSILON, RotationAccumulator, RotationLimits, euler_degrees},
    sources::{
        SOURCE_OBJECTS, WeightedSources, rotation_bindings, validate_set, weight_bindings,
    },
};

/// Rotates a node to the weighted average rotation of its sources.
#[derive(Reflect, Clone, Debug, Default, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct MultiRotationData {
    pub constrained_object: Option<NodeId>,
    pub source_objects: WeightedTransformSet,
    pub constrained_axes: AxisMask,
    /// Euler angles in degrees, applied after blending in the node's local space.
    pub offset: Vec3,
    pub limits: RotationLimits,
    pub maintain_offset: bool,
}

#[derive(Debug)]
pub struct MultiRotationJob {
    driven: ReadWriteTransformHandle,
    sources: WeightedSources,
    source_offsets: Vec<Quat>,
    constrained_axes: AxisMask,
    offset: Quat,
    limits: RotationLimits,
    weight: ConstraintWeight,
}

impl ConstraintJob for MultiRotationJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let (weights, sum) = self.sources.normalized_weights(stream);
        if sum <= EPSILON {
            return;
        }

        let mut accum = RotationAccumulator::default();
        for ((source, offset), weight) in self.sources.handles.iter().zip(&self.source_offsets).zip(weights) {
            accum.add(source.rotation(stream) * *offset, weight);
        }
        let Some(mut rotation) = accum.result() else {
            return;
        };
        if sum < 1. {
            rotation = self.driven.rotation(stream).slerp(rotation, sum);
        }

        let parent = self.driven.parent_tr(stream);
        let local = self.driven.local_rotation(stream);
        let solved = self.limits.apply(parent.rotation.inverse() * rotation * self.offset);
        let masked = self.constrained_axes.select_rotation(solved, local);
        self.driven.set_local_rotation(stream, local.slerp(masked, w));
    }
}

impl MultiRotationData {
    fn bind_offsets(
        &self,
        stream: &dyn AnimationStream,
        driven: ReadOnlyTransformHandle,
        sources: &WeightedSources,
    ) -> Vec<Quat> {
        let driven = driven.rotation(stream);
        sources
            .handles
            .iter()
            .map(|source| {
                if self.maintain_offset {
                    source.rotation(stream).inverse() * driven
                } else {
                    Quat::IDENTITY
                }
            })
            .collect()
    }
}

impl ConstraintData for MultiRotationData {
    type Job = MultiRotationJob;
    type Inverse = MultiRotationInverse;
    const NAME: &'static str = "MultiRotation";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        require_in(constraint, hierarchy, self.constrained_object, "constrained_object")?;
        validate_set(constraint, hierarchy, &self.source_objects, "source_objects")
    }

    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<MultiRotationJob> {
        let driven = stream.bind_read_write(ctx.require(self.constrained_object, "constrained_object")?);
        let sources = WeightedSources::bind(stream, ctx, SOURCE_OBJECTS, &self.source_objects)?;
        let source_offsets = self.bind_offsets(stream, driven.read_only(), &sources);
        Ok(MultiRotationJob {
            driven,
            sources,
            source_offsets,
            constrained_axes: self.constrained_axes,
            offset: euler_degrees(self.offset),
            limits: self.limits,
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut MultiRotationJob, stream: &mut dyn AnimationStream) {
        job.sources.sync(stream, &self.source_objects);
    }

    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings: Vec<CurveBinding> = self
            .source_objects
            .iter()
            .flat_map(|source| rotation_bindings(hierarchy, source.node))
            .collect();
        bindings.extend(weight_bindings(constraint, SOURCE_OBJECTS, self.source_objects.len()));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        rotation_bindings(hierarchy, self.constrained_object)
    }
}

#[derive(Debug)]
pub struct MultiRotationInverseJob {
    driven: ReadOnlyTransformHandle,
    sources: Vec<ReadWriteTransformHandle>,
    source_weights: WeightedSources,
    source_offsets: Vec<Quat>,
    offset: Quat,
    weight: ConstraintWeight,
}

impl ConstraintJob for MultiRotationInverseJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        self.weight.handle().set(stream, 1.);
        self.source_weights.set_weights(stream, 1.);

        let parent = self.driven.parent_tr(stream);
        let local = self.driven.local_rotation(stream) * self.offset.inverse();
        let rotation = parent.rotation * local;
        for (source, offset) in self.sources.iter().zip(&self.source_offsets) {
            source.set_rotation(stream, rotation * offset.inverse());
        }
    }
}

pub struct MultiRotationInverse;

impl InverseSolver<MultiRotationData> for MultiRotationInverse {
    const SUPPORTED: bool = true;

    fn create_job(
        data: &MultiRotationData,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        let driven = stream.bind_read_only(ctx.require(data.constrained_object, "constrained_object")?);
        let source_weights = WeightedSources::bind(stream, ctx, SOURCE_OBJECTS, &data.source_objects)?;
        let source_offsets = data.bind_offsets(stream, driven, &source_weights);
        Ok(Box::new(MultiRotationInverseJob {
            driven,
            sources: source_weights.bind_read_write(stream),
            source_weights,
            source_offsets,
            offset: euler_degrees(data.offset),
            weight: ctx.weight,
        }))
    }
}

#[cfg(test)]
mod tests {
    use bevy::transform::components::Transform;
    use bevy_animation_rig_core::{stream::SceneStream, weighted::WeightedTransform};

    use super::*;
    use crate::testing::{assert_quat_eq, evaluate, inverse_layer, layer, scene};

    fn setup(weights: [f32; 2]) -> (SceneStream, MultiRotationData, [NodeId; 3]) {
        let (mut stream, ids) = scene(&[
            ("root", None, Vec3::ZERO),
            ("driven", Some(0), Vec3::Y),
            ("a", Some(0), Vec3::X),
            ("b", Some(0), Vec3::Z),
        ]);
        stream.set_rest_transform(ids[2], Transform::from_rotation(Quat::from_rotation_y(1.)));
        stream.set_rest_transform(ids[3], Transform::from_rotation(Quat::from_rotation_x(-0.5)));
        let mut sources = WeightedTransformSet::new();
        sources.push(WeightedTransform::new(ids[2], weights[0])).unwrap();
        sources.push(WeightedTransform::new(ids[3], weights[1])).unwrap();
        let data = MultiRotationData {
            constrained_object: Some(ids[1]),
            source_objects: sources,
            ..Default::default()
        };
        (stream, data, [ids[1], ids[2], ids[3]])
    }

    #[test]
    fn zero_weight_is_pass_through() {
        let (mut stream, data, [driven, ..]) = setup([1., 1.]);
        evaluate(&mut stream, data, 0.);
        assert_eq!(stream.local_transform(driven).rotation, Quat::IDENTITY);
    }

    #[test]
    fn weighted_extremes_pick_one_source() {
        let (mut stream, data, [driven, a, _]) = setup([1., 0.]);
        evaluate(&mut stream, data, 1.);
        assert_quat_eq(stream.global_transform(driven).rotation, stream.global_transform(a).rotation, 1e-4);

        let (mut stream, data, [driven, _, b]) = setup([0., 1.]);
        evaluate(&mut stream, data, 1.);
        assert_quat_eq(stream.global_transform(driven).rotation, stream.global_transform(b).rotation, 1e-4);
    }

    #[test]
    fn offset_is_applied_after_blending() {
        let (mut stream, mut data, [driven, a, _]) = setup([1., 0.]);
        data.offset = Vec3::new(0., 0., 90.);
        evaluate(&mut stream, data, 1.);
        let expected = stream.global_transform(a).rotation * Quat::from_rotation_z(90f32.to_radians());
        assert_quat_eq(stream.global_transform(driven).rotation, expected, 1e-4);
    }

    #[test]
    fn inverse_reproduces_constrained_rotation() {
        let (mut stream, mut data, [driven, ..]) = setup([0.5, 0.5]);
        data.maintain_offset = true;
        data.offset = Vec3::new(10., 0., 0.);
        let target = Quat::from_rotation_z(0.8);

        let mut inverse = inverse_layer(data.clone());
        inverse.bind(&mut stream).unwrap();
        let mut forward = layer(data, 1.);
        forward.bind(&mut stream).unwrap();

        stream.set_local_transform(driven, Transform::from_translation(Vec3::Y).with_rotation(target));
        inverse.update(&mut stream);
        stream.set_local_transform(driven, Transform::from_translation(Vec3::Y));
        forward.update(&mut stream);
        assert_quat_eq(stream.local_transform(driven).rotation, target, 1e-3);
    }
}
