//! Scene fixtures shared by the constraint tests.

use bevy::{
    math::{Quat, Vec3},
    transform::components::Transform,
};
use bevy_animation_rig_core::{
    constraint::{Constraint, ConstraintData},
    hierarchy::{NodeId, RigHierarchy},
    layer::{Rig, RigLayer},
    stream::SceneStream,
};

pub const CONSTRAINT_PATH: &str = "rig/constraint";

/// Builds a stream from `(name, parent index, local translation)` triples.
pub fn scene(nodes: &[(&str, Option<usize>, Vec3)]) -> (SceneStream, Vec<NodeId>) {
    let mut hierarchy = RigHierarchy::new();
    let mut ids = Vec::with_capacity(nodes.len());
    for (name, parent, _) in nodes {
        let parent = parent.map(|index: usize| ids[index]);
        ids.push(hierarchy.add_node(parent, *name));
    }
    let rest = nodes
        .iter()
        .map(|(_, _, translation)| Transform::from_translation(*translation));
    (SceneStream::with_rest_pose(hierarchy, rest), ids)
}

pub fn layer<D: ConstraintData>(data: D, weight: f32) -> RigLayer {
    RigLayer::new(Rig::new("rig").with_constraint(Constraint::new(CONSTRAINT_PATH, data).with_weight(weight)))
}

pub fn inverse_layer<D: ConstraintData>(data: D) -> RigLayer {
    RigLayer::inverse(Rig::new("rig").with_constraint(Constraint::new(CONSTRAINT_PATH, data)))
}

/// Binds a one-constraint layer and evaluates it once.
pub fn evaluate<D: ConstraintData>(stream: &mut SceneStream, data: D, weight: f32) -> RigLayer {
    let mut layer = layer(data, weight);
    layer.bind(stream).unwrap();
    layer.update(stream);
    layer
}

pub fn assert_vec_eq(a: Vec3, b: Vec3, epsilon: f32) {
    assert!(a.distance(b) <= epsilon, "{a} != {b}");
}

pub fn assert_quat_eq(a: Quat, b: Quat, epsilon: f32) {
    assert!(a.angle_between(b) <= epsilon, "{a} != {b}");
}
