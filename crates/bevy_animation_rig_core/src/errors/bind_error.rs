use thiserror::Error;

use crate::{hierarchy::NodeId, node_path::NodePath};

/// Reasons a constraint cannot be bound. A layer containing an invalid constraint is never
/// partially bound.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindError {
    #[error("constraint {constraint} is missing its required `{field}` node")]
    MissingReference {
        constraint: NodePath,
        field: &'static str,
    },
    #[error("constraint {constraint} has no source objects")]
    EmptySources { constraint: NodePath },
    #[error("constraint {constraint} references {node:?}, which is not in the hierarchy")]
    UnknownNode { constraint: NodePath, node: NodeId },
    #[error("constraint {constraint}: {tip:?} is not a descendant of {root:?}")]
    NotDescendant {
        constraint: NodePath,
        root: NodeId,
        tip: NodeId,
    },
    #[error("constraint {constraint}: {reason}")]
    InvalidParameter {
        constraint: NodePath,
        reason: String,
    },
    #[error("rig {rig} has no constraints")]
    EmptyRig { rig: NodePath },
    #[error("constraint {constraint} has no inverse solver")]
    NoInverse { constraint: NodePath },
}

pub type BindResult<T> = Result<T, BindError>;
