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
    math::{EPSILON, from_to_rotation},
    sources::tr_bindings,
};

pub const DAMP_POSITION: &str = "dampPosition";
pub const DAMP_ROTATION: &str = "dampRotation";

/// Longest step of the damping integration, in seconds.
const FIXED_DT: f32 = 0.01667;
const DAMP_FACTOR: f32 = 40.;

/// Makes a node trail behind a source, keeping the offset it had to the source at bind time.
///
/// Damping is in `[0, 1]`: 0 follows the source rigidly, 1 keeps the node where it is. The
/// follow is integrated over the stream's delta time in fixed steps, so the result depends on
/// the previous frames.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct DampedTransformData {
    pub constrained_object: Option<NodeId>,
    pub source: Option<NodeId>,
    pub damp_position: f32,
    pub damp_rotation: f32,
    /// Keeps the direction from the node to the source it had at bind time.
    pub maintain_aim: bool,
}

impl Default for DampedTransformData {
    fn default() -> Self {
        Self {
            constrained_object: None,
            source: None,
            damp_position: 0.5,
            damp_rotation: 0.5,
            maintain_aim: true,
        }
    }
}

#[derive(Debug)]
pub struct DampedTransformJob {
    driven: ReadWriteTransformHandle,
    source: ReadOnlyTransformHandle,
    local_bind: AffineTransform,
    /// Bind-time direction to the source in the node's space, zero when aim is not kept.
    aim_bind_axis: Vec3,
    previous: AffineTransform,
    damp_position: PropertyHandle,
    damp_rotation: PropertyHandle,
    weight: ConstraintWeight,
}

impl ConstraintJob for DampedTransformJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            self.previous = self.driven.global_tr(stream);
            return;
        }

        let source = self.source.global_tr(stream);
        let target = self.previous.lerp(&(source * self.local_bind), w);
        let damp_position = (1. - self.damp_position.get(stream).clamp(0., 1.)).powi(2);
        let damp_rotation = (1. - self.damp_rotation.get(stream).clamp(0., 1.)).powi(2);
        let aim = self.aim_bind_axis != Vec3::ZERO;

        let mut dt = stream.delta_time();
        while dt > 0. {
            let factored = DAMP_FACTOR * dt.min(FIXED_DT);
            let previous = &mut self.previous;
            previous.translation += (target.translation - previous.translation) * damp_position * factored;
            let towards = previous.rotation.inverse() * target.rotation;
            previous.rotation =
                (previous.rotation * Quat::IDENTITY.slerp(towards, damp_rotation * factored)).normalize();
            if aim {
                let from = previous.rotation * self.aim_bind_axis;
                let to = source.translation - previous.translation;
                previous.rotation = (from_to_rotation(from, to) * previous.rotation).normalize();
            }
            dt -= FIXED_DT;
        }

        self.driven.set_global_tr(stream, self.previous);
    }
}

impl ConstraintData for DampedTransformData {
    type Job = DampedTransformJob;
    type Inverse = NoInverse;
    const NAME: &'static str = "DampedTransform";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        require_in(constraint, hierarchy, self.constrained_object, "constrained_object")?;
        require_in(constraint, hierarchy, self.source, "source")?;
        Ok(())
    }

    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<DampedTransformJob> {
        let driven = stream.bind_read_write(ctx.require(self.constrained_object, "constrained_object")?);
        let source = stream.bind_read_only(ctx.require(self.source, "source")?);

        let driven_tr = driven.global_tr(stream);
        let source_tr = source.global_tr(stream);
        let to_source = source_tr.translation - driven_tr.translation;
        let aim_bind_axis = if self.maintain_aim && to_source.length() > EPSILON {
            driven_tr.rotation.inverse() * to_source.normalize()
        } else {
            Vec3::ZERO
        };

        Ok(DampedTransformJob {
            driven,
            source,
            local_bind: source_tr.inverse_mul(&driven_tr),
            aim_bind_axis,
            previous: driven_tr,
            damp_position: stream.bind_property(&ctx.property(DAMP_POSITION), self.damp_position),
            damp_rotation: stream.bind_property(&ctx.property(DAMP_ROTATION), self.damp_rotation),
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut DampedTransformJob, stream: &mut dyn AnimationStream) {
        job.damp_position.sync(stream, self.damp_position);
        job.damp_rotation.sync(stream, self.damp_rotation);
    }

    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings = tr_bindings(hierarchy, self.source);
        bindings.push(CurveBinding::float(constraint.clone(), DAMP_POSITION));
        bindings.push(CurveBinding::float(constraint.clone(), DAMP_ROTATION));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        tr_bindings(hierarchy, self.constrained_object)
    }
}
