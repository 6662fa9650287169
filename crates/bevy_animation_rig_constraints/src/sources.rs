use bevy_animation_rig_core::{
    binding::{CurveBinding, IndexedProperty},
    constraint::{BindContext, require_in},
    errors::{BindError, BindResult},
    hierarchy::{NodeId, RigHierarchy},
    node_path::NodePath,
    stream::{
        AnimationStream, PropertyHandle, ReadOnlyTransformHandle, ReadWriteTransformHandle,
    },
    weighted::WeightedTransformSet,
};

use crate::math::normalize_weights;

/// Array property name of the weighted sources of the multi-source constraints.
pub const SOURCE_OBJECTS: &str = "sourceObjects";
pub const WEIGHT: &str = "weight";

/// `<array>.item<i>.weight`, the animatable weight of the `i`-th entry of a weighted set.
pub fn weight_property(array: &str, index: usize) -> String {
    IndexedProperty::new(array, index, WEIGHT).to_string()
}

/// Checks that `set` is non-empty and that every entry references a node of the hierarchy.
pub fn validate_set(
    constraint: &NodePath,
    hierarchy: &RigHierarchy,
    set: &WeightedTransformSet,
    field: &'static str,
) -> BindResult<()> {
    if set.is_empty() {
        return Err(BindError::EmptySources {
            constraint: constraint.clone(),
        });
    }
    for source in set {
        require_in(constraint, hierarchy, source.node, field)?;
    }
    Ok(())
}

/// Weighted set bound to a stream: a read-only handle and a weight property per entry.
#[derive(Clone, Debug)]
pub struct WeightedSources {
    pub handles: Vec<ReadOnlyTransformHandle>,
    weights: Vec<PropertyHandle>,
}

impl WeightedSources {
    pub fn bind(
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
        array: &str,
        set: &WeightedTransformSet,
    ) -> BindResult<Self> {
        let mut handles = Vec::with_capacity(set.len());
        let mut weights = Vec::with_capacity(set.len());
        for (i, source) in set.iter().enumerate() {
            let node = ctx.require(source.node, "source")?;
            handles.push(stream.bind_read_only(node));
            weights.push(stream.bind_property(&ctx.property(weight_property(array, i)), source.weight));
        }
        Ok(Self { handles, weights })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Pushes the authored weights of `set` unless a clip animates them.
    pub fn sync(&self, stream: &mut dyn AnimationStream, set: &WeightedTransformSet) {
        for (handle, weight) in self.weights.iter().zip(set.weights()) {
            handle.sync(stream, weight);
        }
    }

    pub fn raw_weights(&self, stream: &dyn AnimationStream) -> Vec<f32> {
        self.weights.iter().map(|handle| handle.get(stream)).collect()
    }

    /// Current weights, non-negative and normalized when their sum exceeds one, and their sum
    /// capped at one.
    pub fn normalized_weights(&self, stream: &dyn AnimationStream) -> (Vec<f32>, f32) {
        normalize_weights(self.raw_weights(stream))
    }

    /// Writable handles on the same source nodes, for inverse jobs.
    pub fn bind_read_write(&self, stream: &dyn AnimationStream) -> Vec<ReadWriteTransformHandle> {
        self.handles
            .iter()
            .map(|handle| stream.bind_read_write(handle.node()))
            .collect()
    }

    pub fn set_weights(&self, stream: &mut dyn AnimationStream, value: f32) {
        for handle in &self.weights {
            handle.set(stream, value);
        }
    }
}

/// Bindings of the weight property of each entry of a set of `len` sources.
pub fn weight_bindings(constraint: &NodePath, array: &str, len: usize) -> Vec<CurveBinding> {
    (0..len)
        .map(|i| CurveBinding::float(constraint.clone(), weight_property(array, i)))
        .collect()
}

pub fn position_bindings(hierarchy: &RigHierarchy, node: Option<NodeId>) -> Vec<CurveBinding> {
    node.and_then(|node| hierarchy.path(node))
        .map(|path| CurveBinding::local_position(path).to_vec())
        .unwrap_or_default()
}

pub fn rotation_bindings(hierarchy: &RigHierarchy, node: Option<NodeId>) -> Vec<CurveBinding> {
    node.and_then(|node| hierarchy.path(node))
        .map(|path| CurveBinding::local_rotation(path).to_vec())
        .unwrap_or_default()
}

/// Position and rotation channels of `node`.
pub fn tr_bindings(hierarchy: &RigHierarchy, node: Option<NodeId>) -> Vec<CurveBinding> {
    let mut bindings = position_bindings(hierarchy, node);
    bindings.extend(rotation_bindings(hierarchy, node));
    bindings
}
