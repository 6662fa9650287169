use bevy::reflect::Reflect;
use bevy_animation_rig_core::constraint::{Constraint, RigConstraint};
use serde::{Deserialize, Serialize};

use crate::{
    blend::BlendData, chain_ik::ChainIKData, damped_transform::DampedTransformData,
    multi_aim::MultiAimData, multi_parent::MultiParentData, multi_position::MultiPositionData,
    multi_referential::MultiReferentialData, multi_rotation::MultiRotationData,
    override_transform::OverrideTransformData, twist_chain::TwistChainData,
    twist_correction::TwistCorrectionData, two_bone_ik::TwoBoneIKData,
};

/// Serializable form of any builtin constraint, as found in rig assets.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
pub enum ConstraintDescriptor {
    MultiPosition(Constraint<MultiPositionData>),
    MultiRotation(Constraint<MultiRotationData>),
    MultiParent(Constraint<MultiParentData>),
    MultiAim(Constraint<MultiAimData>),
    MultiReferential(Constraint<MultiReferentialData>),
    Blend(Constraint<BlendData>),
    TwoBoneIK(Constraint<TwoBoneIKData>),
    ChainIK(Constraint<ChainIKData>),
    TwistChain(Constraint<TwistChainData>),
    TwistCorrection(Constraint<TwistCorrectionData>),
    OverrideTransform(Constraint<OverrideTransformData>),
    DampedTransform(Constraint<DampedTransformData>),
}

impl ConstraintDescriptor {
    pub fn into_rig_constraint(self) -> Box<dyn RigConstraint> {
        match self {
            Self::MultiPosition(c) => Box::new(c),
            Self::MultiRotation(c) => Box::new(c),
            Self::MultiParent(c) => Box::new(c),
            Self::MultiAim(c) => Box::new(c),
            Self::MultiReferential(c) => Box::new(c),
            Self::Blend(c) => Box::new(c),
            Self::TwoBoneIK(c) => Box::new(c),
            Self::ChainIK(c) => Box::new(c),
            Self::TwistChain(c) => Box::new(c),
            Self::TwistCorrection(c) => Box::new(c),
            Self::OverrideTransform(c) => Box::new(c),
            Self::DampedTransform(c) => Box::new(c),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.as_rig_constraint().kind()
    }

    fn as_rig_constraint(&self) -> &dyn RigConstraint {
        match self {
            Self::MultiPosition(c) => c,
            Self::MultiRotation(c) => c,
            Self::MultiParent(c) => c,
            Self::MultiAim(c) => c,
            Self::MultiReferential(c) => c,
            Self::Blend(c) => c,
            Self::TwoBoneIK(c) => c,
            Self::ChainIK(c) => c,
            Self::TwistChain(c) => c,
            Self::TwistCorrection(c) => c,
            Self::OverrideTransform(c) => c,
            Self::DampedTransform(c) => c,
        }
    }
}
