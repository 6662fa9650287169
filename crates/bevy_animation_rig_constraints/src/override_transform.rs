use bevy::{
    math::{Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
};
use bevy_animation_rig_core::{
    affine::AffineTransform,
    binding::CurveBinding,
    constraint::{BindContext, ConstraintData, ConstraintJob, ConstraintWeight, NoInverse, require_in},
    errors::BindResult,
    hierarchy::{NodeId, RigHierarchy},
    node_path::NodePath,
    stream::{AnimationStream, PropertyHandle, ReadOnlyTransformHandle, ReadWriteTransformHandle},
};
use serde::{Deserialize, Serialize};

use crate::{
    math::euler_degrees,
    sources::tr_bindings,
};

pub const POSITION: &str = "position";
pub const ROTATION: &str = "rotation";
pub const POSITION_WEIGHT: &str = "positionWeight";
pub const ROTATION_WEIGHT: &str = "rotationWeight";

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[reflect(Default)]
pub enum OverrideSpace {
    /// Adds to the current local pose.
    #[default]
    Pivot,
    /// Copies the world pose.
    World,
    /// Copies the local pose.
    Local,
}

/// Overrides a node with the pose of a source node, or with literal values when no source is
/// set.
///
/// In [`OverrideSpace::Pivot`] the override is additive: a source contributes its motion away
/// from its bind-time local pose, literal values are added as they are.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct OverrideTransformData {
    pub constrained_object: Option<NodeId>,
    pub source: Option<NodeId>,
    pub space: OverrideSpace,
    pub position: Vec3,
    /// Euler angles in degrees.
    pub rotation: Vec3,
    pub position_weight: f32,
    pub rotation_weight: f32,
}

impl Default for OverrideTransformData {
    fn default() -> Self {
        Self {
            constrained_object: None,
            source: None,
            space: OverrideSpace::Pivot,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            position_weight: 1.,
            rotation_weight: 1.,
        }
    }
}

#[derive(Debug)]
enum OverrideSource {
    Node {
        handle: ReadOnlyTransformHandle,
        bind_local: AffineTransform,
    },
    Literal {
        position: [PropertyHandle; 3],
        rotation: [PropertyHandle; 3],
    },
}

#[derive(Debug)]
pub struct OverrideTransformJob {
    driven: ReadWriteTransformHandle,
    source: OverrideSource,
    space: OverrideSpace,
    position_weight: PropertyHandle,
    rotation_weight: PropertyHandle,
    weight: ConstraintWeight,
}

/// Binds `<name>.x`, `<name>.y` and `<name>.z` on the constraint.
fn bind_vector(
    stream: &mut dyn AnimationStream,
    constraint: &NodePath,
    name: &str,
    value: Vec3,
) -> [PropertyHandle; 3] {
    let bindings = CurveBinding::vector3(constraint, name);
    [0, 1, 2].map(|i| stream.bind_property(&bindings[i].property_binding(), value[i]))
}

fn read_vector(stream: &dyn AnimationStream, handles: &[PropertyHandle; 3]) -> Vec3 {
    Vec3::from_array(handles.map(|handle| handle.get(stream)))
}

impl OverrideTransformJob {
    /// Pose to override with: an absolute pose in World and Local, a delta in Pivot.
    fn override_pose(&self, stream: &dyn AnimationStream) -> AffineTransform {
        match &self.source {
            OverrideSource::Node { handle, bind_local } => match self.space {
                OverrideSpace::World => handle.global_tr(stream),
                OverrideSpace::Local => handle.local_tr(stream),
                OverrideSpace::Pivot => {
                    let local = handle.local_tr(stream);
                    AffineTransform::new(
                        local.translation - bind_local.translation,
                        bind_local.rotation.inverse() * local.rotation,
                    )
                }
            },
            OverrideSource::Literal { position, rotation } => AffineTransform::new(
                read_vector(stream, position),
                euler_degrees(read_vector(stream, rotation)),
            ),
        }
    }
}

impl ConstraintJob for OverrideTransformJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let position_weight = self.position_weight.get(stream).clamp(0., 1.) * w;
        let rotation_weight = self.rotation_weight.get(stream).clamp(0., 1.) * w;
        let pose = self.override_pose(stream);

        if self.space == OverrideSpace::World {
            if position_weight > 0. {
                let current = self.driven.position(stream);
                self.driven
                    .set_position(stream, current.lerp(pose.translation, position_weight));
            }
            if rotation_weight > 0. {
                let current = self.driven.rotation(stream);
                self.driven
                    .set_rotation(stream, current.slerp(pose.rotation, rotation_weight));
            }
            return;
        }

        let local = self.driven.local_tr(stream);
        let pose = match self.space {
            OverrideSpace::Pivot => {
                AffineTransform::new(local.translation + pose.translation, local.rotation * pose.rotation)
            }
            _ => pose,
        };
        if position_weight > 0. {
            self.driven
                .set_local_position(stream, local.translation.lerp(pose.translation, position_weight));
        }
        if rotation_weight > 0. {
            self.driven
                .set_local_rotation(stream, local.rotation.slerp(pose.rotation, rotation_weight));
        }
    }
}

impl ConstraintData for OverrideTransformData {
    type Job = OverrideTransformJob;
    type Inverse = NoInverse;
    const NAME: &'static str = "OverrideTransform";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        require_in(constraint, hierarchy, self.constrained_object, "constrained_object")?;
        if let Some(source) = self.source {
            require_in(constraint, hierarchy, Some(source), "source")?;
        }
        Ok(())
    }

    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<OverrideTransformJob> {
        let driven = stream.bind_read_write(ctx.require(self.constrained_object, "constrained_object")?);
        let source = match self.source {
            Some(node) => {
                let handle = stream.bind_read_only(node);
                OverrideSource::Node {
                    handle,
                    bind_local: handle.local_tr(stream),
                }
            }
            None => OverrideSource::Literal {
                position: bind_vector(stream, ctx.constraint, POSITION, self.position),
                rotation: bind_vector(stream, ctx.constraint, ROTATION, self.rotation),
            },
        };
        Ok(OverrideTransformJob {
            driven,
            source,
            space: self.space,
            position_weight: stream.bind_property(&ctx.property(POSITION_WEIGHT), self.position_weight),
            rotation_weight: stream.bind_property(&ctx.property(ROTATION_WEIGHT), self.rotation_weight),
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut OverrideTransformJob, stream: &mut dyn AnimationStream) {
        job.position_weight.sync(stream, self.position_weight);
        job.rotation_weight.sync(stream, self.rotation_weight);
        if let OverrideSource::Literal { position, rotation } = &job.source {
            for (handle, value) in position.iter().zip(self.position.to_array()) {
                handle.sync(stream, value);
            }
            for (handle, value) in rotation.iter().zip(self.rotation.to_array()) {
                handle.sync(stream, value);
            }
        }
    }

    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings = match self.source {
            Some(_) => tr_bindings(hierarchy, self.source),
            None => CurveBinding::vector3(constraint, POSITION)
                .into_iter()
                .chain(CurveBinding::vector3(constraint, ROTATION))
                .collect(),
        };
        bindings.push(CurveBinding::float(constraint.clone(), POSITION_WEIGHT));
        bindings.push(CurveBinding::float(constraint.clone(), ROTATION_WEIGHT));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        tr_bindings(hierarchy, self.constrained_object)
    }
}

#[cfg(test)]
mod tests {
    use bevy::transform::components::Transform;
    use bevy_animation_rig_core::{binding::LOCAL_SCALE, stream::SceneStream};

    use super::*;
    use crate::testing::{CONSTRAINT_PATH, assert_quat_eq, assert_vec_eq, evaluate, layer, scene};

    /// The constrained node hangs off a parent offset along X.
    fn setup() -> (SceneStream, OverrideTransformData, [NodeId; 3]) {
        let (stream, ids) = scene(&[
            ("root", None, Vec3::ZERO),
            ("parent", Some(0), Vec3::X),
            ("driven", Some(1), Vec3::Y),
            ("source", Some(0), Vec3::new(0., 0., 2.)),
        ]);
        let data = OverrideTransformData {
            constrained_object: Some(ids[2]),
            ..Default::default()
        };
        (stream, data, [ids[1], ids[2], ids[3]])
    }

    #[test]
    fn zero_weight_is_pass_through() {
        let (mut stream, mut data, [_, driven, _]) = setup();
        data.position = Vec3::splat(5.);
        evaluate(&mut stream, data, 0.);
        assert_eq!(stream.local_transform(driven), Transform::from_translation(Vec3::Y));
    }

    #[test]
    fn world_space_literal() {
        let (mut stream, mut data, [_, driven, _]) = setup();
        data.space = OverrideSpace::World;
        data.position = Vec3::new(0., 0., 3.);
        data.rotation = Vec3::new(0., 90., 0.);
        evaluate(&mut stream, data, 1.);
        let result = stream.global_transform(driven);
        assert_vec_eq(result.translation, Vec3::new(0., 0., 3.), 1e-5);
        assert_quat_eq(result.rotation, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2), 1e-5);
    }

    #[test]
    fn local_space_copies_source_local_pose() {
        let (mut stream, mut data, [_, driven, source]) = setup();
        data.space = OverrideSpace::Local;
        data.source = Some(source);
        evaluate(&mut stream, data, 1.);
        assert_vec_eq(stream.local_transform(driven).translation, Vec3::new(0., 0., 2.), 1e-5);
        assert_vec_eq(stream.global_transform(driven).translation, Vec3::new(1., 0., 2.), 1e-5);
    }

    #[test]
    fn pivot_adds_source_motion_since_bind() {
        let (mut stream, mut data, [_, driven, source]) = setup();
        data.source = Some(source);
        let mut layer = layer(data, 1.);
        layer.bind(&mut stream).unwrap();
        stream.set_local_transform(
            source,
            Transform::from_xyz(0.5, 0., 2.).with_rotation(Quat::from_rotation_z(0.3)),
        );
        layer.update(&mut stream);
        let result = stream.local_transform(driven);
        assert_vec_eq(result.translation, Vec3::new(0.5, 1., 0.), 1e-5);
        assert_quat_eq(result.rotation, Quat::from_rotation_z(0.3), 1e-5);
    }

    #[test]
    fn pivot_adds_literal_values() {
        let (mut stream, mut data, [_, driven, _]) = setup();
        data.position = Vec3::new(0., 0., 1.);
        evaluate(&mut stream, data, 1.);
        assert_vec_eq(stream.local_transform(driven).translation, Vec3::new(0., 1., 1.), 1e-5);
    }

    #[test]
    fn zero_channel_weight_leaves_channel_untouched() {
        let (mut stream, mut data, [_, driven, _]) = setup();
        data.space = OverrideSpace::Local;
        data.position = Vec3::new(4., 4., 4.);
        data.rotation = Vec3::new(30., 0., 0.);
        data.position_weight = 0.;
        evaluate(&mut stream, data, 1.);
        let result = stream.local_transform(driven);
        assert_eq!(result.translation, Vec3::Y);
        assert_quat_eq(result.rotation, euler_degrees(Vec3::new(30., 0., 0.)), 1e-5);
    }

    #[test]
    fn constrained_bindings_cover_only_written_channels() {
        let (stream, data, _) = setup();
        let bindings = data.constrained_bindings(&CONSTRAINT_PATH.into(), stream.hierarchy());
        assert_eq!(bindings.len(), 7);
        assert!(bindings.iter().all(|binding| binding.property != LOCAL_SCALE));
    }
}
