use bevy::{
    math::Vec3,
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
    math::{AxisMask, EPSILON},
    sources::{
        SOURCE_OBJECTS, WeightedSources, position_bindings, validate_set, weight_bindings,
    },
};

/// Moves a node to the weighted average position of its sources.
#[derive(Reflect, Clone, Debug, Default, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct MultiPositionData {
    pub constrained_object: Option<NodeId>,
    pub source_objects: WeightedTransformSet,
    pub constrained_axes: AxisMask,
    /// Added to the result in the constrained node's parent space.
    pub offset: Vec3,
    pub maintain_offset: bool,
}

#[derive(Debug)]
pub struct MultiPositionJob {
    driven: ReadWriteTransformHandle,
    sources: WeightedSources,
    source_offsets: Vec<Vec3>,
    constrained_axes: AxisMask,
    offset: Vec3,
    weight: ConstraintWeight,
}

impl ConstraintJob for MultiPositionJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let (weights, sum) = self.sources.normalized_weights(stream);
        if sum <= EPSILON {
            return;
        }

        let current = self.driven.position(stream);
        let mut accum = current * (1. - sum);
        for ((source, offset), weight) in self.sources.handles.iter().zip(&self.source_offsets).zip(weights) {
            accum += (source.position(stream) + *offset) * weight;
        }

        let parent = self.driven.parent_tr(stream);
        let local = self.driven.local_position(stream);
        let solved = parent.inverse_transform_point(accum) + self.offset;
        let masked = self.constrained_axes.select(solved, local);
        self.driven.set_local_position(stream, local.lerp(masked, w));
    }
}

impl MultiPositionData {
    fn bind_offsets(
        &self,
        stream: &dyn AnimationStream,
        driven: ReadOnlyTransformHandle,
        sources: &WeightedSources,
    ) -> Vec<Vec3> {
        let driven = driven.position(stream);
        sources
            .handles
            .iter()
            .map(|source| {
                if self.maintain_offset {
                    driven - source.position(stream)
                } else {
                    Vec3::ZERO
                }
            })
            .collect()
    }
}

impl ConstraintData for MultiPositionData {
    type Job = MultiPositionJob;
    type Inverse = MultiPositionInverse;
    const NAME: &'static str = "MultiPosition";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        require_in(constraint, hierarchy, self.constrained_object, "constrained_object")?;
        validate_set(constraint, hierarchy, &self.source_objects, "source_objects")
    }

    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<MultiPositionJob> {
        let driven = stream.bind_read_write(ctx.require(self.constrained_object, "constrained_object")?);
        let sources = WeightedSources::bind(stream, ctx, SOURCE_OBJECTS, &self.source_objects)?;
        let source_offsets = self.bind_offsets(stream, driven.read_only(), &sources);
        Ok(MultiPositionJob {
            driven,
            sources,
            source_offsets,
            constrained_axes: self.constrained_axes,
            offset: self.offset,
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut MultiPositionJob, stream: &mut dyn AnimationStream) {
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
        position_bindings(hierarchy, self.constrained_object)
    }
}

/// Places every source so that the forward solve reproduces the constrained position.
#[derive(Debug)]
pub struct MultiPositionInverseJob {
    driven: ReadOnlyTransformHandle,
    sources: Vec<ReadWriteTransformHandle>,
    source_weights: WeightedSources,
    source_offsets: Vec<Vec3>,
    offset: Vec3,
    weight: ConstraintWeight,
}

impl ConstraintJob for MultiPositionInverseJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        self.weight.handle().set(stream, 1.);
        self.source_weights.set_weights(stream, 1.);

        let parent = self.driven.parent_tr(stream);
        let position = parent.transform_point(self.driven.local_position(stream) - self.offset);
        for (source, offset) in self.sources.iter().zip(&self.source_offsets) {
            source.set_position(stream, position - *offset);
        }
    }
}

pub struct MultiPositionInverse;

impl InverseSolver<MultiPositionData> for MultiPositionInverse {
    const SUPPORTED: bool = true;

    fn create_job(
        data: &MultiPositionData,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        let driven = stream.bind_read_only(ctx.require(data.constrained_object, "constrained_object")?);
        let source_weights = WeightedSources::bind(stream, ctx, SOURCE_OBJECTS, &data.source_objects)?;
        let source_offsets = data.bind_offsets(stream, driven, &source_weights);
        Ok(Box::new(MultiPositionInverseJob {
            driven,
            sources: source_weights.bind_read_write(stream),
            source_weights,
            source_offsets,
            offset: data.offset,
            weight: ctx.weight,
        }))
    }
}
