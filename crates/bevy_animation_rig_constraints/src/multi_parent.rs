use bevy::{
    math::{Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
};
use bevy_animation_rig_core::{
    affine::AffineTransform,
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
    math::{AxisMask, EPSILON, RotationAccumulator},
    sources::{SOURCE_OBJECTS, WeightedSources, tr_bindings, validate_set, weight_bindings},
};

/// Makes a node follow the weighted rigid transform of its sources as if it were parented to
/// them.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct MultiParentData {
    pub constrained_object: Option<NodeId>,
    pub source_objects: WeightedTransformSet,
    pub constrained_position_axes: AxisMask,
    pub constrained_rotation_axes: AxisMask,
    pub maintain_position_offset: bool,
    pub maintain_rotation_offset: bool,
}

impl Default for MultiParentData {
    fn default() -> Self {
        Self {
            constrained_object: None,
            source_objects: WeightedTransformSet::new(),
            constrained_position_axes: AxisMask::ALL,
            constrained_rotation_axes: AxisMask::ALL,
            maintain_position_offset: true,
            maintain_rotation_offset: true,
        }
    }
}

#[derive(Debug)]
pub struct MultiParentJob {
    driven: ReadWriteTransformHandle,
    sources: WeightedSources,
    source_offsets: Vec<AffineTransform>,
    position_axes: AxisMask,
    rotation_axes: AxisMask,
    weight: ConstraintWeight,
}

impl ConstraintJob for MultiParentJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let (weights, sum) = self.sources.normalized_weights(stream);
        if sum <= EPSILON {
            return;
        }

        let current = self.driven.global_tr(stream);
        let mut position = current.translation * (1. - sum);
        let mut rotation = RotationAccumulator::default();
        for ((source, offset), weight) in self.sources.handles.iter().zip(&self.source_offsets).zip(weights) {
            let tx = source.global_tr(stream) * *offset;
            position += tx.translation * weight;
            rotation.add(tx.rotation, weight);
        }
        let Some(mut rotation) = rotation.result() else {
            return;
        };
        if sum < 1. {
            rotation = current.rotation.slerp(rotation, sum);
        }

        let parent = self.driven.parent_tr(stream);
        let solved = parent.inverse_mul(&AffineTransform::new(position, rotation));
        let local = self.driven.local_tr(stream);
        let masked = AffineTransform::new(
            self.position_axes.select(solved.translation, local.translation),
            self.rotation_axes.select_rotation(solved.rotation, local.rotation),
        );
        self.driven.set_local_tr(stream, local.lerp(&masked, w));
    }
}

impl MultiParentData {
    /// Pose of the constrained node in each source's space, with the parts that are not
    /// maintained dropped.
    fn bind_offsets(
        &self,
        stream: &dyn AnimationStream,
        driven: ReadOnlyTransformHandle,
        sources: &WeightedSources,
    ) -> Vec<AffineTransform> {
        let driven = driven.global_tr(stream);
        sources
            .handles
            .iter()
            .map(|source| {
                let relative = source.global_tr(stream).inverse_mul(&driven);
                AffineTransform {
                    translation: if self.maintain_position_offset {
                        relative.translation
                    } else {
                        Vec3::ZERO
                    },
                    rotation: if self.maintain_rotation_offset {
                        relative.rotation
                    } else {
                        Quat::IDENTITY
                    },
                }
            })
            .collect()
    }
}

impl ConstraintData for MultiParentData {
    type Job = MultiParentJob;
    type Inverse = MultiParentInverse;
    const NAME: &'static str = "MultiParent";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        require_in(constraint, hierarchy, self.constrained_object, "constrained_object")?;
        validate_set(constraint, hierarchy, &self.source_objects, "source_objects")
    }

    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<MultiParentJob> {
        let driven = stream.bind_read_write(ctx.require(self.constrained_object, "constrained_object")?);
        let sources = WeightedSources::bind(stream, ctx, SOURCE_OBJECTS, &self.source_objects)?;
        let source_offsets = self.bind_offsets(stream, driven.read_only(), &sources);
        Ok(MultiParentJob {
            driven,
            sources,
            source_offsets,
            position_axes: self.constrained_position_axes,
            rotation_axes: self.constrained_rotation_axes,
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut MultiParentJob, stream: &mut dyn AnimationStream) {
        job.sources.sync(stream, &self.source_objects);
    }

    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings: Vec<CurveBinding> = self
            .source_objects
            .iter()
            .flat_map(|source| tr_bindings(hierarchy, source.node))
            .collect();
        bindings.extend(weight_bindings(constraint, SOURCE_OBJECTS, self.source_objects.len()));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        tr_bindings(hierarchy, self.constrained_object)
    }
}

#[derive(Debug)]
pub struct MultiParentInverseJob {
    driven: ReadOnlyTransformHandle,
    sources: Vec<ReadWriteTransformHandle>,
    source_weights: WeightedSources,
    /// Inverse of the forward offsets, so that `source = driven * offset`.
    source_offsets: Vec<AffineTransform>,
    weight: ConstraintWeight,
}

impl ConstraintJob for MultiParentInverseJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        self.weight.handle().set(stream, 1.);
        self.source_weights.set_weights(stream, 1.);

        let driven = self.driven.global_tr(stream);
        for (source, offset) in self.sources.iter().zip(&self.source_offsets) {
            source.set_global_tr(stream, driven * *offset);
        }
    }
}

pub struct MultiParentInverse;

impl InverseSolver<MultiParentData> for MultiParentInverse {
    const SUPPORTED: bool = true;

    fn create_job(
        data: &MultiParentData,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        let driven = stream.bind_read_only(ctx.require(data.constrained_object, "constrained_object")?);
        let source_weights = WeightedSources::bind(stream, ctx, SOURCE_OBJECTS, &data.source_objects)?;
        let source_offsets = data
            .bind_offsets(stream, driven, &source_weights)
            .iter()
            .map(AffineTransform::inverse)
            .collect();
        Ok(Box::new(MultiParentInverseJob {
            driven,
            sources: source_weights.bind_read_write(stream),
            source_weights,
            source_offsets,
            weight: ctx.weight,
        }))
    }
}

#[cfg(test)]
mod tests {
    use bevy::transform::components::Transform;
    use bevy_animation_rig_core::{stream::SceneStream, weighted::WeightedTransform};

    use super::*;
    use crate::testing::{assert_quat_eq, assert_vec_eq, evaluate, inverse_layer, layer, scene};

    fn setup(weights: [f32; 2]) -> (SceneStream, MultiParentData, [NodeId; 3]) {
        let (mut stream, ids) = scene(&[
            ("root", None, Vec3::ZERO),
            ("driven", Some(0), Vec3::Y),
            ("a", Some(0), Vec3::X),
            ("b", Some(0), Vec3::Z),
        ]);
        stream.set_rest_transform(
            ids[2],
            Transform::from_translation(Vec3::X).with_rotation(Quat::from_rotation_y(0.5)),
        );
        let mut sources = WeightedTransformSet::new();
        sources.push(WeightedTransform::new(ids[2], weights[0])).unwrap();
        sources.push(WeightedTransform::new(ids[3], weights[1])).unwrap();
        let data = MultiParentData {
            constrained_object: Some(ids[1]),
            source_objects: sources,
            ..Default::default()
        };
        (stream, data, [ids[1], ids[2], ids[3]])
    }

    #[test]
    fn zero_weight_is_pass_through() {
        let (mut stream, data, [driven, a, _]) = setup([1., 1.]);
        let mut layer = layer(data, 0.);
        layer.bind(&mut stream).unwrap();
        stream.set_local_transform(a, Transform::from_xyz(3., 3., 3.));
        layer.update(&mut stream);
        assert_eq!(stream.local_transform(driven), Transform::from_translation(Vec3::Y));
    }

    #[test]
    fn driven_follows_a_moving_source() {
        let (mut stream, data, [driven, a, _]) = setup([1., 0.]);
        let mut layer = layer(data, 1.);
        layer.bind(&mut stream).unwrap();

        let moved = Transform::from_xyz(1., 2., 0.).with_rotation(Quat::from_rotation_y(1.5));
        stream.set_local_transform(a, moved);
        layer.update(&mut stream);

        let expected = moved * (Transform::from_translation(Vec3::X).with_rotation(Quat::from_rotation_y(0.5)))
            .compute_affine()
            .inverse()
            .transform_point3(Vec3::Y);
        assert_vec_eq(stream.global_transform(driven).translation, expected, 1e-4);
        assert_quat_eq(stream.global_transform(driven).rotation, Quat::from_rotation_y(1.), 1e-4);
    }

    #[test]
    fn without_offsets_driven_snaps_to_source() {
        let (mut stream, mut data, [driven, a, _]) = setup([1., 0.]);
        data.maintain_position_offset = false;
        data.maintain_rotation_offset = false;
        evaluate(&mut stream, data, 1.);
        assert_vec_eq(stream.global_transform(driven).translation, stream.global_transform(a).translation, 1e-5);
        assert_quat_eq(stream.global_transform(driven).rotation, stream.global_transform(a).rotation, 1e-5);
    }

    #[test]
    fn inverse_reproduces_constrained_pose() {
        let (mut stream, data, [driven, ..]) = setup([0.5, 0.5]);
        let mut inverse = inverse_layer(data.clone());
        inverse.bind(&mut stream).unwrap();
        let mut forward = layer(data, 1.);
        forward.bind(&mut stream).unwrap();

        let animated = Transform::from_xyz(2., 0.5, -1.).with_rotation(Quat::from_rotation_x(0.7));
        stream.set_local_transform(driven, animated);
        inverse.update(&mut stream);
        stream.set_local_transform(driven, Transform::IDENTITY);
        forward.update(&mut stream);

        let result = stream.local_transform(driven);
        assert_vec_eq(result.translation, animated.translation, 1e-4);
        assert_quat_eq(result.rotation, animated.rotation, 1e-4);
    }
}
