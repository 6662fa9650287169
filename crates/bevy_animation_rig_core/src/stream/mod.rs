mod handles;
mod scene;

pub use handles::*;
pub use scene::*;

use bevy::{
    math::{Quat, Vec3},
    reflect::{Reflect, std_traits::ReflectDefault},
    transform::components::Transform,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{hierarchy::NodeId, hierarchy::RigHierarchy, node_path::NodePath};

/// Identity of one evaluation context. Handles remember the stream they were bound against
/// and are only valid for that stream.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[reflect(Default)]
pub struct StreamId(Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

/// Address of an animatable scalar owned by a component, such as a constraint weight.
#[derive(Reflect, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[reflect(Default)]
pub struct PropertyBinding {
    pub path: NodePath,
    pub name: String,
}

impl PropertyBinding {
    pub fn new(path: NodePath, name: impl Into<String>) -> Self {
        Self {
            path,
            name: name.into(),
        }
    }
}

/// Per-frame evaluation context provided by the host animation system.
///
/// Transforms are stored in local space; global queries compose parents on the fly.
pub trait AnimationStream {
    fn id(&self) -> StreamId;
    fn hierarchy(&self) -> &RigHierarchy;
    /// Seconds elapsed since the previous evaluation of this stream.
    fn delta_time(&self) -> f32;

    fn local_transform(&self, node: NodeId) -> Transform;
    fn set_local_transform(&mut self, node: NodeId, transform: Transform);

    fn global_transform(&self, node: NodeId) -> Transform {
        let local = self.local_transform(node);
        match self.hierarchy().parent(node) {
            Some(parent) => self.global_transform(parent) * local,
            None => local,
        }
    }

    fn parent_global_transform(&self, node: NodeId) -> Transform {
        self.hierarchy()
            .parent(node)
            .map_or(Transform::IDENTITY, |parent| self.global_transform(parent))
    }

    fn set_global_position(&mut self, node: NodeId, position: Vec3) {
        let parent = self.parent_global_transform(node);
        let mut local = self.local_transform(node);
        local.translation = parent.rotation.inverse() * (position - parent.translation) / parent.scale;
        self.set_local_transform(node, local);
    }

    fn set_global_rotation(&mut self, node: NodeId, rotation: Quat) {
        let parent = self.parent_global_transform(node);
        let mut local = self.local_transform(node);
        local.rotation = (parent.rotation.inverse() * rotation).normalize();
        self.set_local_transform(node, local);
    }

    /// Registers `binding` on the stream, seeding it with `default` when it does not exist yet,
    /// and returns a handle to it.
    fn bind_property(&mut self, binding: &PropertyBinding, default: f32) -> PropertyHandle;
    fn find_property(&self, binding: &PropertyBinding) -> Option<PropertyHandle>;
    fn property_value(&self, handle: PropertyHandle) -> f32;
    fn set_property_value(&mut self, handle: PropertyHandle, value: f32);

    /// Whether the property is currently driven by an animation curve, in which case the
    /// authored value must not overwrite it.
    fn is_property_animated(&self, handle: PropertyHandle) -> bool;
    fn set_property_animated(&mut self, handle: PropertyHandle, animated: bool);

    fn bind_read_only(&self, node: NodeId) -> ReadOnlyTransformHandle {
        ReadOnlyTransformHandle::bind(self, node)
    }

    fn bind_read_write(&self, node: NodeId) -> ReadWriteTransformHandle {
        ReadWriteTransformHandle::bind(self, node)
    }
}
