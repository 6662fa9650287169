use bevy_animation_rig_core::{binding::CurveBinding, errors::BindError, node_path::NodePath};
use thiserror::Error;

/// The direction a bake runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeDirection {
    /// Constraint motion onto the constrained nodes.
    ToSkeleton,
    /// Animated constrained nodes back onto the constraint sources.
    ToConstraint,
}

impl std::fmt::Display for BakeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToSkeleton => write!(f, "skeleton"),
            Self::ToConstraint => write!(f, "constraint"),
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BakeError {
    #[error("{kind} constraint {constraint} cannot be baked to {direction}")]
    CapabilityMismatch {
        constraint: NodePath,
        kind: &'static str,
        direction: BakeDirection,
    },
    #[error("could not bind the bake graph: {0}")]
    Bind(#[from] BindError),
    #[error("invalid bake range: {reason}")]
    InvalidRange { reason: String },
    #[error("bake graph has no channel for {binding:?}")]
    UnknownBinding { binding: CurveBinding },
}

pub type BakeResult<T> = Result<T, BakeError>;
