//! The builtin constraint kinds. Each module pairs the authored data of one kind with its
//! forward job and, where one exists, its inverse job used when baking onto the constraint.

pub mod blend;
pub mod chain_ik;
pub mod damped_transform;
pub mod ik;
pub mod math;
pub mod multi_aim;
pub mod multi_parent;
pub mod multi_position;
pub mod multi_referential;
pub mod multi_rotation;
pub mod override_transform;
pub mod plugin;
pub mod registry;
pub mod sources;
pub mod twist_chain;
pub mod twist_correction;
pub mod two_bone_ik;

#[cfg(test)]
mod testing;

pub mod prelude {
    pub use super::blend::BlendData;
    pub use super::chain_ik::ChainIKData;
    pub use super::damped_transform::DampedTransformData;
    pub use super::math::{Axis, AxisMask, RotationLimits};
    pub use super::multi_aim::{MultiAimData, WorldUpType};
    pub use super::multi_parent::MultiParentData;
    pub use super::multi_position::MultiPositionData;
    pub use super::multi_referential::MultiReferentialData;
    pub use super::multi_rotation::MultiRotationData;
    pub use super::override_transform::{OverrideSpace, OverrideTransformData};
    pub use super::plugin::RigConstraintsPlugin;
    pub use super::registry::ConstraintDescriptor;
    pub use super::twist_chain::{TwistChainData, TwistStep};
    pub use super::twist_correction::TwistCorrectionData;
    pub use super::two_bone_ik::TwoBoneIKData;
}
