use bevy::app::{App, Plugin};
use bevy_animation_rig_core::plugin::AnimationRigCorePlugin;

use crate::{
    blend::BlendData,
    chain_ik::ChainIKData,
    damped_transform::DampedTransformData,
    math::{Axis, AxisMask, RotationLimits},
    multi_aim::{MultiAimData, WorldUpType},
    multi_parent::MultiParentData,
    multi_position::MultiPositionData,
    multi_referential::MultiReferentialData,
    multi_rotation::MultiRotationData,
    override_transform::{OverrideSpace, OverrideTransformData},
    registry::ConstraintDescriptor,
    twist_chain::{TwistChainData, TwistStep},
    twist_correction::TwistCorrectionData,
    two_bone_ik::TwoBoneIKData,
};

/// Registers the builtin constraint kinds. Adds [`AnimationRigCorePlugin`] if it is missing.
pub struct RigConstraintsPlugin;

impl Plugin for RigConstraintsPlugin {
    fn build(&self, app: &mut App) {
        if !app.is_plugin_added::<AnimationRigCorePlugin>() {
            app.add_plugins(AnimationRigCorePlugin);
        }
        register_types(app);
    }
}

pub fn register_types(app: &mut App) {
    app //
        .register_type::<Axis>()
        .register_type::<AxisMask>()
        .register_type::<RotationLimits>()
        .register_type::<WorldUpType>()
        .register_type::<OverrideSpace>()
        .register_type::<TwistStep>()
        .register_type::<MultiPositionData>()
        .register_type::<MultiRotationData>()
        .register_type::<MultiParentData>()
        .register_type::<MultiAimData>()
        .register_type::<MultiReferentialData>()
        .register_type::<BlendData>()
        .register_type::<TwoBoneIKData>()
        .register_type::<ChainIKData>()
        .register_type::<TwistChainData>()
        .register_type::<TwistCorrectionData>()
        .register_type::<OverrideTransformData>()
        .register_type::<DampedTransformData>()
        .register_type::<ConstraintDescriptor>();
}
