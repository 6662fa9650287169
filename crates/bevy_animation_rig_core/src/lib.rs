//! Core of the rig evaluation engine: node access through a per-frame stream, the shared data
//! types used by constraints, and the layer/builder scheduling that runs constraint jobs in
//! author order.

pub mod affine;
pub mod binding;
pub mod builder;
pub mod clip;
pub mod constraint;
pub mod curves;
pub mod errors;
pub mod hierarchy;
pub mod layer;
pub mod node_path;
pub mod plugin;
pub mod stream;
pub mod weighted;

pub mod prelude {
    pub use super::affine::AffineTransform;
    pub use super::binding::{CurveBinding, IndexedProperty};
    pub use super::builder::RigBuilder;
    pub use super::clip::{RigClip, read_binding};
    pub use super::constraint::{
        BindContext, Constraint, ConstraintData, ConstraintJob, ConstraintWeight, InverseSolver,
        NoInverse, RigConstraint,
    };
    pub use super::curves::{AnimationCurve, DenseCurve, Keyframe};
    pub use super::errors::*;
    pub use super::hierarchy::{NodeId, RigHierarchy};
    pub use super::layer::{LayerMode, Rig, RigLayer};
    pub use super::node_path::NodePath;
    pub use super::plugin::AnimationRigCorePlugin;
    pub use super::stream::{
        AnimationStream, PropertyBinding, PropertyHandle, ReadOnlyTransformHandle,
        ReadWriteTransformHandle, SceneStream, StreamId,
    };
    pub use super::weighted::{WeightRange, WeightedTransform, WeightedTransformSet};
}
