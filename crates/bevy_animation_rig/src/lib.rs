//! # Bevy Animation Rig
//!
//! **Bevy Animation Rig** evaluates rig constraints (aim, parent, IK chains, twist correction and
//! friends) on top of an animated pose, and bakes constraint motion to and from keyframes.
//!
//! ## Introduction
//!
//! A [`Rig`] is an ordered list of constraints with a master weight. Constraints are evaluated
//! in author order every frame over an [`AnimationStream`], so each constraint sees what the
//! previous ones wrote. Rigs are wrapped in a [`RigLayer`] and scheduled by a [`RigBuilder`],
//! which binds every layer once and then updates them every frame:
//!
//! ```ignore
//!     let mut builder = RigBuilder::new([description.to_layer()]);
//!     builder.build(&mut stream);
//!     // every frame, after sampling the clip into the stream:
//!     stream.set_delta_time(time.delta_secs());
//!     builder.update(&mut stream);
//! ```
//!
//! Rigs can be authored in `*.rig.ron` files, loaded as [`RigDescription`] assets:
//! ```ron
//! (
//!     path: "character/arm_rig",
//!     constraints: [
//!         TwoBoneIK((
//!             path: "character/arm_rig/arm_ik",
//!             data: (root: Some(3), mid: Some(4), tip: Some(5), target: Some(9), hint: Some(10)),
//!         )),
//!     ],
//! )
//! ```
//!
//! ## Baking
//!
//! [`bake_to_skeleton`] replaces a constraint with plain keyframes on the nodes it drives.
//! [`bake_to_constraint`] goes the other way for the constraint kinds that have an inverse
//! solver, producing source curves that reproduce an animated pose. Dense per-frame samples go
//! through a [`CurveReducer`]; [`KeepAllKeys`] keeps every frame.
//!
//! [`Rig`]: bevy_animation_rig_core::layer::Rig
//! [`RigLayer`]: bevy_animation_rig_core::layer::RigLayer
//! [`RigBuilder`]: bevy_animation_rig_core::builder::RigBuilder
//! [`AnimationStream`]: bevy_animation_rig_core::stream::AnimationStream
//! [`RigDescription`]: crate::asset::RigDescription
//! [`bake_to_skeleton`]: crate::bake::bake_to_skeleton
//! [`bake_to_constraint`]: crate::bake::bake_to_constraint
//! [`CurveReducer`]: crate::bake::CurveReducer
//! [`KeepAllKeys`]: crate::bake::KeepAllKeys

pub mod asset;
pub mod bake;
pub mod errors;
pub mod plugin;

pub mod prelude {
    pub use super::asset::{RigDescription, RigDescriptionLoader};
    pub use super::bake::{
        BakeSettings, CurveReducer, KeepAllKeys, ScratchGraph, bake_to_constraint, bake_to_skeleton,
    };
    pub use super::errors::*;
    pub use super::plugin::AnimationRigPlugin;
    pub use bevy_animation_rig_constraints::prelude::*;
    pub use bevy_animation_rig_core::prelude::*;
}
