use bevy::{platform::collections::HashMap, reflect::Reflect, transform::components::Transform};

use super::{AnimationStream, PropertyBinding, PropertyHandle, StreamId};
use crate::hierarchy::{NodeId, RigHierarchy};

#[derive(Reflect, Clone, Debug)]
struct PropertySlot {
    binding: PropertyBinding,
    value: f32,
    animated: bool,
}

/// In-memory [`AnimationStream`] over a [`RigHierarchy`].
///
/// Keeps a rest pose that the frame pose can be reset to before each evaluation, the same way
/// a host animation system starts every frame from the sampled clip pose.
#[derive(Reflect, Clone, Debug)]
pub struct SceneStream {
    id: StreamId,
    hierarchy: RigHierarchy,
    locals: Vec<Transform>,
    rest: Vec<Transform>,
    properties: Vec<PropertySlot>,
    property_lookup: HashMap<PropertyBinding, usize>,
    delta_time: f32,
}

impl SceneStream {
    pub fn new(hierarchy: RigHierarchy) -> Self {
        let locals = vec![Transform::IDENTITY; hierarchy.len()];
        Self {
            id: StreamId::new(),
            rest: locals.clone(),
            locals,
            hierarchy,
            properties: vec![],
            property_lookup: HashMap::default(),
            delta_time: 0.,
        }
    }

    /// Creates a stream whose rest pose is `rest`, indexed by node id. Missing entries are
    /// identity.
    pub fn with_rest_pose(hierarchy: RigHierarchy, rest: impl IntoIterator<Item = Transform>) -> Self {
        let mut stream = Self::new(hierarchy);
        for (i, transform) in rest.into_iter().enumerate().take(stream.locals.len()) {
            stream.locals[i] = transform;
            stream.rest[i] = transform;
        }
        stream
    }

    /// Sets both the current and the rest pose of a node.
    pub fn set_rest_transform(&mut self, node: NodeId, transform: Transform) {
        self.locals[node.0] = transform;
        self.rest[node.0] = transform;
    }

    pub fn rest_transform(&self, node: NodeId) -> Transform {
        self.rest[node.0]
    }

    pub fn set_delta_time(&mut self, delta_time: f32) {
        self.delta_time = delta_time.max(0.);
    }

    /// Restores every node to its rest pose. Properties keep their values.
    pub fn reset_pose(&mut self) {
        self.locals.clone_from(&self.rest);
    }

    /// Makes the current pose the new rest pose.
    pub fn capture_rest_pose(&mut self) {
        self.rest.clone_from(&self.locals);
    }

    /// Clears every animated flag, giving authored property values control again.
    pub fn clear_animated_properties(&mut self) {
        for slot in &mut self.properties {
            slot.animated = false;
        }
    }

    /// Copy of this stream with a fresh identity. Handles bound against `self` are not valid for
    /// the fork, and writes to one never reach the other.
    pub fn fork(&self) -> Self {
        Self {
            id: StreamId::new(),
            ..self.clone()
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = (&PropertyBinding, f32)> {
        self.properties.iter().map(|slot| (&slot.binding, slot.value))
    }

    pub fn property(&self, binding: &PropertyBinding) -> Option<f32> {
        self.property_lookup
            .get(binding)
            .map(|index| self.properties[*index].value)
    }
}

impl AnimationStream for SceneStream {
    fn id(&self) -> StreamId {
        self.id
    }

    fn hierarchy(&self) -> &RigHierarchy {
        &self.hierarchy
    }

    fn delta_time(&self) -> f32 {
        self.delta_time
    }

    fn local_transform(&self, node: NodeId) -> Transform {
        self.locals[node.0]
    }

    fn set_local_transform(&mut self, node: NodeId, transform: Transform) {
        self.locals[node.0] = transform;
    }

    fn bind_property(&mut self, binding: &PropertyBinding, default: f32) -> PropertyHandle {
        if let Some(index) = self.property_lookup.get(binding) {
            return PropertyHandle::new(self.id, *index);
        }
        let index = self.properties.len();
        self.properties.push(PropertySlot {
            binding: binding.clone(),
            value: default,
            animated: false,
        });
        self.property_lookup.insert(binding.clone(), index);
        PropertyHandle::new(self.id, index)
    }

    fn find_property(&self, binding: &PropertyBinding) -> Option<PropertyHandle> {
        self.property_lookup
            .get(binding)
            .map(|index| PropertyHandle::new(self.id, *index))
    }

    fn property_value(&self, handle: PropertyHandle) -> f32 {
        self.properties[handle.index].value
    }

    fn set_property_value(&mut self, handle: PropertyHandle, value: f32) {
        self.properties[handle.index].value = value;
    }

    fn is_property_animated(&self, handle: PropertyHandle) -> bool {
        self.properties[handle.index].animated
    }

    fn set_property_animated(&mut self, handle: PropertyHandle, animated: bool) {
        self.properties[handle.index].animated = animated;
    }
}
