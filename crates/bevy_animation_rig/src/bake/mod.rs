//! Baking converts between constraint driven motion and plain keyframes.
//!
//! [`bake_to_skeleton`] runs a constraint forward over a clip and keys the nodes it writes to,
//! so the constraint can be dropped. [`bake_to_constraint`] runs the inverse solver of a
//! constraint over a clip that animates those nodes directly, and keys the constraint sources
//! that reproduce the motion. Both sample through a [`ScratchGraph`] that is torn down when the
//! bake returns.

mod reducer;
mod scratch;
mod settings;

pub use reducer::*;
pub use scratch::*;
pub use settings::*;

use bevy::{
    log::{debug, info},
    math::Vec4,
};
use bevy_animation_rig_core::{
    binding::{BindingTarget, CurveBinding},
    clip::{RigClip, read_binding},
    constraint::RigConstraint,
    curves::{AnimationCurve, DenseCurve},
    layer::LayerMode,
    node_path::NodePath,
    stream::{AnimationStream, SceneStream},
};
use indexmap::IndexMap;

use crate::errors::{BakeDirection, BakeError, BakeResult};

/// Evaluates `constraint` over `clip` and returns a copy of the clip in which the constrained
/// nodes are keyed directly.
///
/// The curves of the constraint sources are removed and the constraint weight is keyed to 0.
pub fn bake_to_skeleton(
    constraint: &dyn RigConstraint,
    stream: &SceneStream,
    clip: &RigClip,
    settings: &BakeSettings,
    reducer: &dyn CurveReducer,
) -> BakeResult<RigClip> {
    if !constraint.can_bake_to_skeleton() {
        return Err(capability_mismatch(constraint, BakeDirection::ToSkeleton));
    }
    let range = settings.sample_range(clip.duration())?;
    let hierarchy = stream.hierarchy();
    let recorded = constraint.constrained_bindings(hierarchy);
    info!(
        "Baking {} {} to skeleton ({} frames)",
        constraint.kind(),
        constraint.path(),
        range.frame_count
    );

    let dense = {
        let mut graph = ScratchGraph::new(constraint, stream, LayerMode::Forward)?;
        record(&mut graph, clip, &range, &recorded)?
    };

    let mut output = clip.clone();
    for binding in constraint.source_bindings(hierarchy) {
        output.remove(&binding);
    }
    write_curves(&mut output, recorded, &dense, reducer);
    output.insert(constraint.weight_binding(), AnimationCurve::constant(0.));
    debug!("Baked {} curves onto the skeleton", dense.len());
    Ok(output)
}

/// Runs the inverse solver of `constraint` over `clip` and returns a copy of the clip in which
/// the constraint sources are keyed so that evaluating the constraint reproduces the animated
/// pose.
///
/// The curves of the constrained nodes are removed and the constraint weight is keyed to 1.
/// Refuses before sampling when the constraint kind has no inverse solver.
pub fn bake_to_constraint(
    constraint: &dyn RigConstraint,
    stream: &SceneStream,
    clip: &RigClip,
    settings: &BakeSettings,
    reducer: &dyn CurveReducer,
) -> BakeResult<RigClip> {
    if !constraint.can_bake_to_constraint() {
        return Err(capability_mismatch(constraint, BakeDirection::ToConstraint));
    }
    let range = settings.sample_range(clip.duration())?;
    let hierarchy = stream.hierarchy();
    let recorded = constraint.source_bindings(hierarchy);
    info!(
        "Baking {} {} to constraint ({} frames)",
        constraint.kind(),
        constraint.path(),
        range.frame_count
    );

    let dense = {
        let mut graph = ScratchGraph::new(constraint, stream, LayerMode::Inverse)?;
        record(&mut graph, clip, &range, &recorded)?
    };

    let mut output = clip.clone();
    for binding in constraint.constrained_bindings(hierarchy) {
        output.remove(&binding);
    }
    write_curves(&mut output, recorded, &dense, reducer);
    output.insert(constraint.weight_binding(), AnimationCurve::constant(1.));
    debug!("Baked {} curves onto the constraint", dense.len());
    Ok(output)
}

fn capability_mismatch(constraint: &dyn RigConstraint, direction: BakeDirection) -> BakeError {
    BakeError::CapabilityMismatch {
        constraint: constraint.path().clone(),
        kind: constraint.kind(),
        direction,
    }
}

/// Samples every frame of `range` and reads each binding after evaluation.
///
/// Refuses clips with curves for array entries the bound constraint does not have.
fn record(
    graph: &mut ScratchGraph,
    clip: &RigClip,
    range: &SampleRange,
    bindings: &[CurveBinding],
) -> BakeResult<Vec<DenseCurve>> {
    if let Some(binding) = clip.unbound_indexed_binding(graph.stream()) {
        return Err(BakeError::UnknownBinding {
            binding: binding.clone(),
        });
    }
    let mut curves: Vec<DenseCurve> = bindings
        .iter()
        .map(|_| DenseCurve::new(range.start_time, range.frame_rate).with_end_time(range.end_time))
        .collect();
    let rotations = rotation_channels(bindings);
    let mut frame = vec![0.; bindings.len()];

    let mut previous = None;
    for time in range.times() {
        let delta_time = previous.map_or(0., |previous| time - previous);
        previous = Some(time);
        let stream = graph.sample(clip, time, delta_time);
        for (value, binding) in frame.iter_mut().zip(bindings) {
            *value = read_binding(stream, binding).ok_or_else(|| BakeError::UnknownBinding {
                binding: binding.clone(),
            })?;
        }
        for channels in &rotations {
            keep_hemisphere(channels, &mut frame, &curves);
        }
        for (curve, value) in curves.iter_mut().zip(&frame) {
            curve.push(*value);
        }
    }
    Ok(curves)
}

/// Indices of the x, y, z and w bindings of every node whose whole local rotation is recorded.
fn rotation_channels(bindings: &[CurveBinding]) -> Vec<[usize; 4]> {
    let mut nodes: IndexMap<&NodePath, [Option<usize>; 4]> = IndexMap::new();
    for (index, binding) in bindings.iter().enumerate() {
        if let BindingTarget::LocalRotation(component) = binding.target() {
            nodes.entry(&binding.path).or_default()[component] = Some(index);
        }
    }
    nodes
        .into_values()
        .filter_map(|[x, y, z, w]| Some([x?, y?, z?, w?]))
        .collect()
}

/// Flips the sampled quaternion onto the hemisphere of the previous sample so that the keyed
/// components do not jump between `q` and `-q`.
fn keep_hemisphere(channels: &[usize; 4], frame: &mut [f32], curves: &[DenseCurve]) {
    let previous = channels.map(|i| curves[i].samples.last().copied());
    let [Some(x), Some(y), Some(z), Some(w)] = previous else {
        return;
    };
    let current = Vec4::from(channels.map(|i| frame[i]));
    if current.dot(Vec4::new(x, y, z, w)) < 0. {
        for i in channels {
            frame[*i] = -frame[*i];
        }
    }
}

fn write_curves(
    clip: &mut RigClip,
    bindings: Vec<CurveBinding>,
    dense: &[DenseCurve],
    reducer: &dyn CurveReducer,
) {
    for (binding, samples) in bindings.into_iter().zip(dense) {
        clip.insert(binding, reducer.reduce(samples));
    }
}
