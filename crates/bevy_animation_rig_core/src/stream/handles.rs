use bevy::{
    math::{Quat, Vec3},
    reflect::Reflect,
    transform::components::Transform,
};

use super::{AnimationStream, StreamId};
use crate::{affine::AffineTransform, hierarchy::NodeId};

fn assert_bound<S: AnimationStream + ?Sized>(bound: StreamId, node: NodeId, stream: &S) {
    assert!(
        bound == stream.id() && stream.hierarchy().contains(node),
        "transform handle for {node:?} used with a stream it was not bound against"
    );
}

/// Read-only binding of a node to a stream.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOnlyTransformHandle {
    stream: StreamId,
    node: NodeId,
}

impl ReadOnlyTransformHandle {
    pub fn bind<S: AnimationStream + ?Sized>(stream: &S, node: NodeId) -> Self {
        Self {
            stream: stream.id(),
            node,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_valid<S: AnimationStream + ?Sized>(&self, stream: &S) -> bool {
        self.stream == stream.id() && stream.hierarchy().contains(self.node)
    }

    pub fn local_transform<S: AnimationStream + ?Sized>(&self, stream: &S) -> Transform {
        assert_bound(self.stream, self.node, stream);
        stream.local_transform(self.node)
    }

    pub fn local_position<S: AnimationStream + ?Sized>(&self, stream: &S) -> Vec3 {
        self.local_transform(stream).translation
    }

    pub fn local_rotation<S: AnimationStream + ?Sized>(&self, stream: &S) -> Quat {
        self.local_transform(stream).rotation
    }

    pub fn global_transform<S: AnimationStream + ?Sized>(&self, stream: &S) -> Transform {
        assert_bound(self.stream, self.node, stream);
        stream.global_transform(self.node)
    }

    pub fn position<S: AnimationStream + ?Sized>(&self, stream: &S) -> Vec3 {
        self.global_transform(stream).translation
    }

    pub fn rotation<S: AnimationStream + ?Sized>(&self, stream: &S) -> Quat {
        self.global_transform(stream).rotation
    }

    /// Global position and rotation.
    pub fn global_tr<S: AnimationStream + ?Sized>(&self, stream: &S) -> AffineTransform {
        self.global_transform(stream).into()
    }

    pub fn local_tr<S: AnimationStream + ?Sized>(&self, stream: &S) -> AffineTransform {
        self.local_transform(stream).into()
    }

    /// Global position and rotation of the node's parent, identity for roots.
    pub fn parent_tr<S: AnimationStream + ?Sized>(&self, stream: &S) -> AffineTransform {
        assert_bound(self.stream, self.node, stream);
        stream.parent_global_transform(self.node).into()
    }
}

/// Read-write binding of a node to a stream.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadWriteTransformHandle {
    inner: ReadOnlyTransformHandle,
}

impl ReadWriteTransformHandle {
    pub fn bind<S: AnimationStream + ?Sized>(stream: &S, node: NodeId) -> Self {
        Self {
            inner: ReadOnlyTransformHandle::bind(stream, node),
        }
    }

    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    pub fn read_only(&self) -> ReadOnlyTransformHandle {
        self.inner
    }

    pub fn is_valid<S: AnimationStream + ?Sized>(&self, stream: &S) -> bool {
        self.inner.is_valid(stream)
    }

    pub fn local_transform<S: AnimationStream + ?Sized>(&self, stream: &S) -> Transform {
        self.inner.local_transform(stream)
    }

    pub fn local_position<S: AnimationStream + ?Sized>(&self, stream: &S) -> Vec3 {
        self.inner.local_position(stream)
    }

    pub fn local_rotation<S: AnimationStream + ?Sized>(&self, stream: &S) -> Quat {
        self.inner.local_rotation(stream)
    }

    pub fn local_scale<S: AnimationStream + ?Sized>(&self, stream: &S) -> Vec3 {
        self.inner.local_transform(stream).scale
    }

    pub fn global_transform<S: AnimationStream + ?Sized>(&self, stream: &S) -> Transform {
        self.inner.global_transform(stream)
    }

    pub fn position<S: AnimationStream + ?Sized>(&self, stream: &S) -> Vec3 {
        self.inner.position(stream)
    }

    pub fn rotation<S: AnimationStream + ?Sized>(&self, stream: &S) -> Quat {
        self.inner.rotation(stream)
    }

    pub fn global_tr<S: AnimationStream + ?Sized>(&self, stream: &S) -> AffineTransform {
        self.inner.global_tr(stream)
    }

    pub fn local_tr<S: AnimationStream + ?Sized>(&self, stream: &S) -> AffineTransform {
        self.inner.local_tr(stream)
    }

    pub fn parent_tr<S: AnimationStream + ?Sized>(&self, stream: &S) -> AffineTransform {
        self.inner.parent_tr(stream)
    }

    pub fn set_local_transform<S: AnimationStream + ?Sized>(
        &self,
        stream: &mut S,
        transform: Transform,
    ) {
        assert_bound(self.inner.stream, self.inner.node, stream);
        stream.set_local_transform(self.inner.node, transform);
    }

    pub fn set_local_position<S: AnimationStream + ?Sized>(&self, stream: &mut S, position: Vec3) {
        let mut local = self.local_transform(stream);
        local.translation = position;
        stream.set_local_transform(self.inner.node, local);
    }

    pub fn set_local_rotation<S: AnimationStream + ?Sized>(&self, stream: &mut S, rotation: Quat) {
        let mut local = self.local_transform(stream);
        local.rotation = rotation.normalize();
        stream.set_local_transform(self.inner.node, local);
    }

    pub fn set_local_scale<S: AnimationStream + ?Sized>(&self, stream: &mut S, scale: Vec3) {
        let mut local = self.local_transform(stream);
        local.scale = scale;
        stream.set_local_transform(self.inner.node, local);
    }

    pub fn set_local_tr<S: AnimationStream + ?Sized>(&self, stream: &mut S, tr: AffineTransform) {
        let mut local = self.local_transform(stream);
        local.translation = tr.translation;
        local.rotation = tr.rotation.normalize();
        stream.set_local_transform(self.inner.node, local);
    }

    pub fn set_position<S: AnimationStream + ?Sized>(&self, stream: &mut S, position: Vec3) {
        assert_bound(self.inner.stream, self.inner.node, stream);
        stream.set_global_position(self.inner.node, position);
    }

    pub fn set_rotation<S: AnimationStream + ?Sized>(&self, stream: &mut S, rotation: Quat) {
        assert_bound(self.inner.stream, self.inner.node, stream);
        stream.set_global_rotation(self.inner.node, rotation);
    }

    pub fn set_global_tr<S: AnimationStream + ?Sized>(&self, stream: &mut S, tr: AffineTransform) {
        self.set_rotation(stream, tr.rotation);
        self.set_position(stream, tr.translation);
    }
}

/// Handle to a named scalar property of a stream.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyHandle {
    pub(crate) stream: StreamId,
    pub(crate) index: usize,
}

impl PropertyHandle {
    pub fn new(stream: StreamId, index: usize) -> Self {
        Self { stream, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_valid<S: AnimationStream + ?Sized>(&self, stream: &S) -> bool {
        self.stream == stream.id()
    }

    pub fn get<S: AnimationStream + ?Sized>(&self, stream: &S) -> f32 {
        assert!(
            self.is_valid(stream),
            "property handle used with a stream it was not bound against"
        );
        stream.property_value(*self)
    }

    pub fn set<S: AnimationStream + ?Sized>(&self, stream: &mut S, value: f32) {
        assert!(
            self.is_valid(stream),
            "property handle used with a stream it was not bound against"
        );
        stream.set_property_value(*self, value);
    }

    /// Writes the authored value unless an animation curve drives this property.
    pub fn sync<S: AnimationStream + ?Sized>(&self, stream: &mut S, authored: f32) {
        if !stream.is_property_animated(*self) {
            self.set(stream, authored);
        }
    }
}
