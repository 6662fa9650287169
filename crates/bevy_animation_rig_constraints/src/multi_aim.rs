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
    math::{AxisMask, Axis, EPSILON, euler_degrees, from_to_rotation, signed_angle},
    sources::{
        SOURCE_OBJECTS, WeightedSources, position_bindings, rotation_bindings, validate_set,
        weight_bindings,
    },
};

/// Reference the up axis of an aimed node is stabilized against.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[reflect(Default)]
pub enum WorldUpType {
    /// Only the aim axis is constrained.
    #[default]
    None,
    SceneUp,
    /// Up points towards the world up object.
    ObjectUp,
    /// Up is `world_up_axis` rotated by the world up object.
    ObjectRotationUp,
    /// Up is `world_up_axis` in world space.
    Vector,
}

/// Rotates a node so that its aim axis points at the weighted average direction of its
/// sources.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct MultiAimData {
    pub constrained_object: Option<NodeId>,
    pub source_objects: WeightedTransformSet,
    pub aim_axis: Axis,
    pub up_axis: Axis,
    pub world_up_type: WorldUpType,
    pub world_up_axis: Vec3,
    pub world_up_object: Option<NodeId>,
    pub constrained_axes: AxisMask,
    /// Euler angles in degrees, applied after aiming in the node's local space.
    pub offset: Vec3,
    /// Bounds in degrees of the angle the aim axis is rotated by.
    pub min_limit: f32,
    pub max_limit: f32,
    pub maintain_offset: bool,
}

impl Default for MultiAimData {
    fn default() -> Self {
        Self {
            constrained_object: None,
            source_objects: WeightedTransformSet::new(),
            aim_axis: Axis::Z,
            up_axis: Axis::Y,
            world_up_type: WorldUpType::None,
            world_up_axis: Vec3::Y,
            world_up_object: None,
            constrained_axes: AxisMask::ALL,
            offset: Vec3::ZERO,
            min_limit: -180.,
            max_limit: 180.,
            maintain_offset: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WorldUp {
    None,
    Vector(Vec3),
    Object(ReadOnlyTransformHandle),
    ObjectRotation(ReadOnlyTransformHandle, Vec3),
}

impl WorldUp {
    fn direction(&self, stream: &dyn AnimationStream, position: Vec3) -> Option<Vec3> {
        match self {
            WorldUp::None => None,
            WorldUp::Vector(up) => Some(*up),
            WorldUp::Object(object) => Some(object.position(stream) - position),
            WorldUp::ObjectRotation(object, up) => Some(object.rotation(stream) * *up),
        }
    }
}

#[derive(Debug)]
pub struct MultiAimJob {
    driven: ReadWriteTransformHandle,
    sources: WeightedSources,
    source_offsets: Vec<Quat>,
    aim_axis: Vec3,
    up_axis: Vec3,
    world_up: WorldUp,
    constrained_axes: AxisMask,
    offset: Quat,
    limits: (f32, f32),
    weight: ConstraintWeight,
}

impl MultiAimJob {
    fn clamp_angle(&self, delta: Quat) -> Quat {
        let (min, max) = self.limits;
        if min <= 0. && max >= std::f32::consts::PI {
            return delta;
        }
        let (axis, angle) = delta.to_axis_angle();
        let clamped = angle.clamp(min.max(0.), max.max(min.max(0.)));
        if (clamped - angle).abs() <= EPSILON || axis.length_squared() <= EPSILON {
            return delta;
        }
        Quat::from_axis_angle(axis, clamped)
    }

    /// Twists `rotation` about its aim axis so that its up axis lies in the plane of the aim
    /// axis and the world up direction. `None` when either direction degenerates.
    fn stabilize(&self, rotation: Quat, world_up: Vec3) -> Option<Quat> {
        let aim = rotation * self.aim_axis;
        let up = (rotation * self.up_axis).reject_from_normalized(aim).try_normalize()?;
        let target = world_up.reject_from_normalized(aim).try_normalize()?;
        Some(Quat::from_axis_angle(aim, signed_angle(up, target, aim)) * rotation)
    }
}

impl ConstraintJob for MultiAimJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let (weights, sum) = self.sources.normalized_weights(stream);
        if sum <= EPSILON {
            return;
        }

        let position = self.driven.position(stream);
        let rotation = self.driven.rotation(stream);
        let aim = rotation * self.aim_axis;

        let mut direction = aim * (1. - sum);
        for ((source, offset), weight) in self.sources.handles.iter().zip(&self.source_offsets).zip(weights) {
            let to_source = (source.position(stream) - position).normalize_or_zero();
            direction += (*offset * to_source) * weight;
        }
        let Some(direction) = direction.try_normalize() else {
            return;
        };

        let mut solved = self.clamp_angle(from_to_rotation(aim, direction)) * rotation;
        if let Some(world_up) = self.world_up.direction(stream, position) {
            let Some(stabilized) = self.stabilize(solved, world_up) else {
                return;
            };
            solved = stabilized;
        }

        let parent = self.driven.parent_tr(stream);
        let local = self.driven.local_rotation(stream);
        let solved = parent.rotation.inverse() * solved * self.offset;
        let masked = self.constrained_axes.select_rotation(solved, local);
        self.driven.set_local_rotation(stream, local.slerp(masked, w));
    }
}

impl MultiAimData {
    /// Rotation from each source's bind direction to the bind aim direction, and the bind
    /// distance to each source.
    fn bind_offsets(
        &self,
        stream: &dyn AnimationStream,
        driven: ReadOnlyTransformHandle,
        sources: &WeightedSources,
    ) -> (Vec<Quat>, Vec<f32>) {
        let position = driven.position(stream);
        let aim = driven.rotation(stream) * self.aim_axis.to_vec3();
        sources
            .handles
            .iter()
            .map(|source| {
                let to_source = source.position(stream) - position;
                let offset = if self.maintain_offset {
                    from_to_rotation(to_source, aim)
                } else {
                    Quat::IDENTITY
                };
                (offset, to_source.length())
            })
            .unzip()
    }

    fn world_up(&self, stream: &dyn AnimationStream) -> WorldUp {
        let object = self.world_up_object.map(|node| stream.bind_read_only(node));
        match (self.world_up_type, object) {
            (WorldUpType::SceneUp, _) => WorldUp::Vector(Vec3::Y),
            (WorldUpType::Vector, _) => WorldUp::Vector(self.world_up_axis),
            (WorldUpType::ObjectUp, Some(object)) => WorldUp::Object(object),
            (WorldUpType::ObjectRotationUp, Some(object)) => {
                WorldUp::ObjectRotation(object, self.world_up_axis)
            }
            _ => WorldUp::None,
        }
    }
}

impl ConstraintData for MultiAimData {
    type Job = MultiAimJob;
    type Inverse = MultiAimInverse;
    const NAME: &'static str = "MultiAim";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        require_in(constraint, hierarchy, self.constrained_object, "constrained_object")?;
        validate_set(constraint, hierarchy, &self.source_objects, "source_objects")?;
        if matches!(
            self.world_up_type,
            WorldUpType::ObjectUp | WorldUpType::ObjectRotationUp
        ) {
            require_in(constraint, hierarchy, self.world_up_object, "world_up_object")?;
        }
        Ok(())
    }

    fn create_job(&self, stream: &mut dyn AnimationStream, ctx: &BindContext) -> BindResult<MultiAimJob> {
        let driven = stream.bind_read_write(ctx.require(self.constrained_object, "constrained_object")?);
        let sources = WeightedSources::bind(stream, ctx, SOURCE_OBJECTS, &self.source_objects)?;
        let (source_offsets, _) = self.bind_offsets(stream, driven.read_only(), &sources);
        Ok(MultiAimJob {
            driven,
            sources,
            source_offsets,
            aim_axis: self.aim_axis.to_vec3(),
            up_axis: self.up_axis.to_vec3(),
            world_up: self.world_up(stream),
            constrained_axes: self.constrained_axes,
            offset: euler_degrees(self.offset),
            limits: (self.min_limit.to_radians(), self.max_limit.to_radians()),
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut MultiAimJob, stream: &mut dyn AnimationStream) {
        job.sources.sync(stream, &self.source_objects);
    }

    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings: Vec<CurveBinding> = self
            .source_objects
            .iter()
            .flat_map(|source| position_bindings(hierarchy, source.node))
            .collect();
        bindings.extend(weight_bindings(constraint, SOURCE_OBJECTS, self.source_objects.len()));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        rotation_bindings(hierarchy, self.constrained_object)
    }
}

/// Places every source at its bind distance along the aim direction of the constrained node.
#[derive(Debug)]
pub struct MultiAimInverseJob {
    driven: ReadOnlyTransformHandle,
    sources: Vec<ReadWriteTransformHandle>,
    source_weights: WeightedSources,
    source_offsets: Vec<Quat>,
    distances: Vec<f32>,
    aim_axis: Vec3,
    offset: Quat,
    weight: ConstraintWeight,
}

impl ConstraintJob for MultiAimInverseJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        self.weight.handle().set(stream, 1.);
        self.source_weights.set_weights(stream, 1.);

        let parent = self.driven.parent_tr(stream);
        let rotation = parent.rotation * self.driven.local_rotation(stream) * self.offset.inverse();
        let aim = rotation * self.aim_axis;
        let position = self.driven.position(stream);
        for ((source, offset), distance) in self.sources.iter().zip(&self.source_offsets).zip(&self.distances) {
            source.set_position(stream, position + (offset.inverse() * aim) * *distance);
        }
    }
}

pub struct MultiAimInverse;

impl InverseSolver<MultiAimData> for MultiAimInverse {
    const SUPPORTED: bool = true;

    fn create_job(
        data: &MultiAimData,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        let driven = stream.bind_read_only(ctx.require(data.constrained_object, "constrained_object")?);
        let source_weights = WeightedSources::bind(stream, ctx, SOURCE_OBJECTS, &data.source_objects)?;
        let (source_offsets, distances) = data.bind_offsets(stream, driven, &source_weights);
        Ok(Box::new(MultiAimInverseJob {
            driven,
            sources: source_weights.bind_read_write(stream),
            source_weights,
            source_offsets,
            distances: distances
                .into_iter()
                .map(|distance| if distance > EPSILON { distance } else { 1. })
                .collect(),
            aim_axis: data.aim_axis.to_vec3(),
            offset: euler_degrees(data.offset),
            weight: ctx.weight,
        }))
    }
}
