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
    stream::{AnimationStream, PropertyHandle, ReadOnlyTransformHandle, ReadWriteTransformHandle},
};
use serde::{Deserialize, Serialize};

use crate::sources::{position_bindings, rotation_bindings, tr_bindings};

pub const POSITION_WEIGHT: &str = "positionWeight";
pub const ROTATION_WEIGHT: &str = "rotationWeight";

/// Interpolates a node between two sources. A blend weight of 0 selects source A, 1 selects
/// source B.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct BlendData {
    pub constrained_object: Option<NodeId>,
    pub source_a: Option<NodeId>,
    pub source_b: Option<NodeId>,
    pub blend_position: bool,
    pub blend_rotation: bool,
    pub position_weight: f32,
    pub rotation_weight: f32,
    pub maintain_position_offsets: bool,
    pub maintain_rotation_offsets: bool,
}

impl Default for BlendData {
    fn default() -> Self {
        Self {
            constrained_object: None,
            source_a: None,
            source_b: None,
            blend_position: true,
            blend_rotation: true,
            position_weight: 0.5,
            rotation_weight: 0.5,
            maintain_position_offsets: false,
            maintain_rotation_offsets: false,
        }
    }
}

#[derive(Debug)]
pub struct BlendJob {
    driven: ReadWriteTransformHandle,
    source_a: ReadOnlyTransformHandle,
    source_b: ReadOnlyTransformHandle,
    position_offsets: [Vec3; 2],
    rotation_offsets: [Quat; 2],
    blend_position: bool,
    blend_rotation: bool,
    position_weight: PropertyHandle,
    rotation_weight: PropertyHandle,
    weight: ConstraintWeight,
}

impl ConstraintJob for BlendJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }

        if self.blend_position {
            let t = self.position_weight.get(stream).clamp(0., 1.);
            let a = self.source_a.position(stream) + self.position_offsets[0];
            let b = self.source_b.position(stream) + self.position_offsets[1];
            let current = self.driven.position(stream);
            self.driven.set_position(stream, current.lerp(a.lerp(b, t), w));
        }
        if self.blend_rotation {
            let t = self.rotation_weight.get(stream).clamp(0., 1.);
            let a = self.source_a.rotation(stream) * self.rotation_offsets[0];
            let b = self.source_b.rotation(stream) * self.rotation_offsets[1];
            let current = self.driven.rotation(stream);
            self.driven.set_rotation(stream, current.slerp(a.slerp(b, t), w));
        }
    }
}

impl ConstraintData for BlendData {
    type Job = BlendJob;
    type Inverse = NoInverse;
    const NAME: &'static str = "Blend";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        require_in(constraint, hierarchy, self.constrained_object, "constrained_object")?;
        require_in(constraint, hierarchy, self.source_a, "source_a")?;
        require_in(constraint, hierarchy, self.source_b, "source_b")?;
        Ok(())
    }

    fn create_job(&self, stream: &mut dyn AnimationStream, ctx: &BindContext) -> BindResult<BlendJob> {
        let driven = stream.bind_read_write(ctx.require(self.constrained_object, "constrained_object")?);
        let source_a = stream.bind_read_only(ctx.require(self.source_a, "source_a")?);
        let source_b = stream.bind_read_only(ctx.require(self.source_b, "source_b")?);

        let driven_tx = driven.global_tr(stream);
        let [a, b] = [source_a, source_b].map(|source| source.global_tr(stream));
        let position_offsets = if self.maintain_position_offsets {
            [driven_tx.translation - a.translation, driven_tx.translation - b.translation]
        } else {
            [Vec3::ZERO; 2]
        };
        let rotation_offsets = if self.maintain_rotation_offsets {
            [
                a.rotation.inverse() * driven_tx.rotation,
                b.rotation.inverse() * driven_tx.rotation,
            ]
        } else {
            [Quat::IDENTITY; 2]
        };

        Ok(BlendJob {
            driven,
            source_a,
            source_b,
            position_offsets,
            rotation_offsets,
            blend_position: self.blend_position,
            blend_rotation: self.blend_rotation,
            position_weight: stream.bind_property(&ctx.property(POSITION_WEIGHT), self.position_weight),
            rotation_weight: stream.bind_property(&ctx.property(ROTATION_WEIGHT), self.rotation_weight),
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut BlendJob, stream: &mut dyn AnimationStream) {
        job.position_weight.sync(stream, self.position_weight);
        job.rotation_weight.sync(stream, self.rotation_weight);
    }

    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings = tr_bindings(hierarchy, self.source_a);
        bindings.extend(tr_bindings(hierarchy, self.source_b));
        bindings.push(CurveBinding::float(constraint.clone(), POSITION_WEIGHT));
        bindings.push(CurveBinding::float(constraint.clone(), ROTATION_WEIGHT));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings = Vec::new();
        if self.blend_position {
            bindings.extend(position_bindings(hierarchy, self.constrained_object));
        }
        if self.blend_rotation {
            bindings.extend(rotation_bindings(hierarchy, self.constrained_object));
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use bevy::transform::components::Transform;
    use bevy_animation_rig_core::stream::SceneStream;

    use super::*;
    use crate::testing::{assert_quat_eq, assert_vec_eq, evaluate, scene};

    fn setup() -> (SceneStream, BlendData, NodeId) {
        let (mut stream, ids) = scene(&[
            ("root", None, Vec3::ZERO),
            ("driven", Some(0), Vec3::ZERO),
            ("a", Some(0), Vec3::X * 2.),
            ("b", Some(0), Vec3::Y * 2.),
        ]);
        stream.set_rest_transform(
            ids[3],
            Transform::from_translation(Vec3::Y * 2.).with_rotation(Quat::from_rotation_z(1.)),
        );
        let data = BlendData {
            constrained_object: Some(ids[1]),
            source_a: Some(ids[2]),
            source_b: Some(ids[3]),
            ..Default::default()
        };
        (stream, data, ids[1])
    }

    #[test]
    fn zero_weight_is_pass_through() {
        let (mut stream, data, driven) = setup();
        evaluate(&mut stream, data, 0.);
        assert_eq!(stream.local_transform(driven), Transform::IDENTITY);
    }

    #[test]
    fn blends_halfway() {
        let (mut stream, data, driven) = setup();
        evaluate(&mut stream, data, 1.);
        let result = stream.global_transform(driven);
        assert_vec_eq(result.translation, Vec3::new(1., 1., 0.), 1e-5);
        assert_quat_eq(result.rotation, Quat::from_rotation_z(0.5), 1e-5);
    }

    #[test]
    fn disabled_channels_are_untouched() {
        let (mut stream, mut data, driven) = setup();
        data.blend_rotation = false;
        data.position_weight = 1.;
        evaluate(&mut stream, data, 1.);
        let result = stream.global_transform(driven);
        assert_vec_eq(result.translation, Vec3::Y * 2., 1e-5);
        assert_eq!(result.rotation, Quat::IDENTITY);
    }
}
