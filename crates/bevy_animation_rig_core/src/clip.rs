use bevy::{
    log::{debug, warn},
    math::{Quat, Vec4},
    platform::collections::HashMap,
    reflect::{Reflect, std_traits::ReflectDefault},
    transform::components::Transform,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    binding::{BindingTarget, CurveBinding, IndexedProperty},
    curves::AnimationCurve,
    hierarchy::NodeId,
    stream::{AnimationStream, PropertyBinding},
};

/// A set of scalar curves keyed by [`CurveBinding`], in insertion order.
#[derive(Reflect, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
pub struct RigClip {
    #[reflect(ignore)]
    curves: IndexMap<CurveBinding, AnimationCurve>,
    duration: f32,
}

impl RigClip {
    pub fn new(duration: f32) -> Self {
        Self {
            curves: IndexMap::new(),
            duration,
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: f32) {
        self.duration = duration;
    }

    pub fn insert(&mut self, binding: CurveBinding, curve: AnimationCurve) {
        self.duration = self.duration.max(curve.end_time());
        self.curves.insert(binding, curve);
    }

    pub fn remove(&mut self, binding: &CurveBinding) -> Option<AnimationCurve> {
        self.curves.shift_remove(binding)
    }

    pub fn get(&self, binding: &CurveBinding) -> Option<&AnimationCurve> {
        self.curves.get(binding)
    }

    pub fn contains(&self, binding: &CurveBinding) -> bool {
        self.curves.contains_key(binding)
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurveBinding, &AnimationCurve)> {
        self.curves.iter()
    }

    /// The first curve addressing an array entry the stream cannot resolve. That is a name in
    /// the `.item` form that does not parse as `<array>.item<i>.<sub>`, or an index past the
    /// entries bound for its array.
    pub fn unbound_indexed_binding<S: AnimationStream + ?Sized>(
        &self,
        stream: &S,
    ) -> Option<&CurveBinding> {
        self.curves
            .keys()
            .find(|binding| !indexed_binding_resolves(stream, binding))
    }

    /// Writes the value of every curve at `time` into the stream. Float properties written this
    /// way are flagged as animated. Rotation channels missing from the clip keep the stream's
    /// current component before the quaternion is renormalized. Curves for array entries that
    /// do not resolve are skipped.
    pub fn apply<S: AnimationStream + ?Sized>(&self, stream: &mut S, time: f32) {
        let mut poses: HashMap<NodeId, (Transform, Vec4, bool)> = HashMap::default();

        for (binding, curve) in &self.curves {
            let value = curve.evaluate(time);
            let target = binding.target();
            if let BindingTarget::Property(property) = target {
                if !indexed_binding_resolves(&*stream, binding) {
                    warn!("Skipping curve for unbound array entry {}", property.name);
                    continue;
                }
                let handle = stream.bind_property(&property, value);
                handle.set(stream, value);
                stream.set_property_animated(handle, true);
                continue;
            }

            let Some(node) = stream.hierarchy().find(&binding.path) else {
                debug!("Skipping curve for unknown node {}", binding.path);
                continue;
            };
            let (transform, rotation, rotated) = poses.entry(node).or_insert_with(|| {
                let transform = stream.local_transform(node);
                (transform, Vec4::from(transform.rotation), false)
            });
            match target {
                BindingTarget::LocalPosition(i) => transform.translation[i] = value,
                BindingTarget::LocalScale(i) => transform.scale[i] = value,
                BindingTarget::LocalRotation(i) => {
                    rotation[i] = value;
                    *rotated = true;
                }
                BindingTarget::Property(_) => {}
            }
        }

        for (node, (mut transform, rotation, rotated)) in poses {
            if rotated {
                transform.rotation = normalize_or_identity(rotation);
            }
            stream.set_local_transform(node, transform);
        }
    }
}

/// Array entries resolve when the entry is bound, or when nothing of the array is bound yet.
/// Bindings that do not address an array entry always resolve.
fn indexed_binding_resolves<S: AnimationStream + ?Sized>(stream: &S, binding: &CurveBinding) -> bool {
    let BindingTarget::Property(property) = binding.target() else {
        return true;
    };
    if !IndexedProperty::is_indexed(&property.name) {
        return true;
    }
    let Some(indexed) = IndexedProperty::parse(&property.name) else {
        return false;
    };
    if stream.find_property(&property).is_some() {
        return true;
    }
    let first = IndexedProperty { index: 0, ..indexed };
    stream
        .find_property(&PropertyBinding::new(property.path, first.to_string()))
        .is_none()
}

fn normalize_or_identity(q: Vec4) -> Quat {
    if q.length_squared() <= f32::EPSILON {
        Quat::IDENTITY
    } else {
        Quat::from_vec4(q.normalize())
    }
}

/// Reads the current value of the channel addressed by `binding`, or `None` when the node or
/// property does not exist on the stream.
pub fn read_binding<S: AnimationStream + ?Sized>(stream: &S, binding: &CurveBinding) -> Option<f32> {
    match binding.target() {
        BindingTarget::Property(property) => {
            let handle = stream.find_property(&property)?;
            Some(handle.get(stream))
        }
        BindingTarget::LocalPosition(i) => {
            let node = stream.hierarchy().find(&binding.path)?;
            Some(stream.local_transform(node).translation[i])
        }
        BindingTarget::LocalRotation(i) => {
            let node = stream.hierarchy().find(&binding.path)?;
            Some(Vec4::from(stream.local_transform(node).rotation)[i])
        }
        BindingTarget::LocalScale(i) => {
            let node = stream.hierarchy().find(&binding.path)?;
            Some(stream.local_transform(node).scale[i])
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec3;

    use super::*;
    use crate::{hierarchy::RigHierarchy, node_path::NodePath, stream::SceneStream};

    fn stream() -> SceneStream {
        let mut hierarchy = RigHierarchy::new();
        let root = hierarchy.add_node(None, "root");
        hierarchy.add_node(Some(root), "hand");
        SceneStream::new(hierarchy)
    }

    #[test]
    fn apply_writes_transform_channels() {
        let mut stream = stream();
        let path = NodePath::from("root/hand");
        let mut clip = RigClip::new(1.);
        clip.insert(
            CurveBinding::local_position(&path)[1].clone(),
            AnimationCurve::linear(0., 0., 1., 2.),
        );
        let rotation = Quat::from_rotation_z(1.);
        for (binding, value) in CurveBinding::local_rotation(&path)
            .into_iter()
            .zip(rotation.to_array())
        {
            clip.insert(binding, AnimationCurve::constant(value));
        }

        clip.apply(&mut stream, 0.5);
        let hand = stream.hierarchy().find(&path).unwrap();
        let local = stream.local_transform(hand);
        assert!((local.translation - Vec3::new(0., 1., 0.)).length() < 1e-6);
        assert!(local.rotation.angle_between(rotation) < 1e-4);

        let binding = &CurveBinding::local_position(&path)[1];
        assert_eq!(read_binding(&stream, binding), Some(1.));
    }

    #[test]
    fn apply_marks_properties_animated() {
        let mut stream = stream();
        let path = NodePath::from("rig/aim");
        let mut clip = RigClip::new(1.);
        clip.insert(
            CurveBinding::float(path.clone(), "weight"),
            AnimationCurve::linear(0., 0., 1., 1.),
        );
        clip.apply(&mut stream, 0.25);

        let handle = stream
            .find_property(&PropertyBinding::new(path, "weight"))
            .unwrap();
        assert_eq!(handle.get(&stream), 0.25);
        assert!(stream.is_property_animated(handle));
    }

    #[test]
    fn array_entries_past_the_bound_sources_are_not_applied() {
        let mut stream = stream();
        let path = NodePath::from("rig/aim");
        for i in 0..2 {
            let name = IndexedProperty::new("sourceObjects", i, "weight").to_string();
            stream.bind_property(&PropertyBinding::new(path.clone(), name), 1.);
        }
        let mut clip = RigClip::new(1.);
        clip.insert(
            CurveBinding::float(path.clone(), "sourceObjects.item1.weight"),
            AnimationCurve::constant(0.5),
        );
        let out_of_range = CurveBinding::float(path.clone(), "sourceObjects.item5.weight");
        clip.insert(out_of_range.clone(), AnimationCurve::constant(0.5));

        assert_eq!(clip.unbound_indexed_binding(&stream), Some(&out_of_range));
        clip.apply(&mut stream, 0.);
        let item5 = PropertyBinding::new(path.clone(), "sourceObjects.item5.weight");
        assert!(stream.find_property(&item5).is_none());
        let item1 = stream
            .find_property(&PropertyBinding::new(path, "sourceObjects.item1.weight"))
            .unwrap();
        assert_eq!(item1.get(&stream), 0.5);
    }

    #[test]
    fn malformed_array_entries_are_reported() {
        let stream = stream();
        let path = NodePath::from("rig/aim");
        let mut clip = RigClip::new(1.);
        clip.insert(CurveBinding::float(path.clone(), "weight"), AnimationCurve::constant(1.));
        assert_eq!(clip.unbound_indexed_binding(&stream), None);

        let malformed = CurveBinding::float(path, "sourceObjects.itemX.weight");
        clip.insert(malformed.clone(), AnimationCurve::constant(1.));
        assert_eq!(clip.unbound_indexed_binding(&stream), Some(&malformed));
    }
}
