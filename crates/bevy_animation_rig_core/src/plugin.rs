use bevy::app::{App, Plugin};

use crate::{
    affine::AffineTransform,
    binding::CurveBinding,
    clip::RigClip,
    curves::{AnimationCurve, DenseCurve, Keyframe},
    hierarchy::{NodeId, RigHierarchy},
    layer::LayerMode,
    node_path::NodePath,
    stream::{PropertyBinding, SceneStream, StreamId},
    weighted::{WeightRange, WeightedTransform, WeightedTransformSet},
};

/// Registers the reflectable rig data types
pub struct AnimationRigCorePlugin;

impl Plugin for AnimationRigCorePlugin {
    fn build(&self, app: &mut App) {
        register_types(app);
    }
}

pub fn register_types(app: &mut App) {
    app //
        .register_type::<NodeId>()
        .register_type::<NodePath>()
        .register_type::<RigHierarchy>()
        .register_type::<AffineTransform>()
        .register_type::<WeightedTransform>()
        .register_type::<WeightedTransformSet>()
        .register_type::<WeightRange>()
        .register_type::<StreamId>()
        .register_type::<PropertyBinding>()
        .register_type::<SceneStream>()
        .register_type::<Keyframe>()
        .register_type::<AnimationCurve>()
        .register_type::<DenseCurve>()
        .register_type::<CurveBinding>()
        .register_type::<RigClip>()
        .register_type::<LayerMode>();
}
