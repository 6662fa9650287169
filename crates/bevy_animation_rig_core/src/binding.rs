use std::sync::LazyLock;

use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{node_path::NodePath, stream::PropertyBinding};

pub const LOCAL_POSITION: &str = "localPosition";
pub const LOCAL_ROTATION: &str = "localRotation";
pub const LOCAL_SCALE: &str = "localScale";

pub const COMPONENT_NAMES: [&str; 4] = ["x", "y", "z", "w"];

static INDEXED_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<array>[A-Za-z_][A-Za-z0-9_]*)\.item(?P<index>[0-9]+)\.(?P<sub>[A-Za-z_][A-Za-z0-9_.]*)$")
        .expect("indexed property pattern is valid")
});

/// Where a per-frame scalar lives on the host's curve format: the node or component path
/// relative to the evaluation root, the property name, and an optional component index.
#[derive(
    Reflect, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[reflect(Default)]
pub struct CurveBinding {
    pub path: NodePath,
    pub property: String,
    pub index: Option<u8>,
}

/// What a [`CurveBinding`] resolves to on a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingTarget {
    LocalPosition(usize),
    LocalRotation(usize),
    LocalScale(usize),
    Property(PropertyBinding),
}

impl CurveBinding {
    pub fn new(path: NodePath, property: impl Into<String>, index: Option<u8>) -> Self {
        Self {
            path,
            property: property.into(),
            index,
        }
    }

    pub fn float(path: NodePath, property: impl Into<String>) -> Self {
        Self::new(path, property, None)
    }

    pub fn vector3(path: &NodePath, property: &str) -> [Self; 3] {
        [0, 1, 2].map(|i| Self::new(path.clone(), property, Some(i)))
    }

    pub fn local_position(path: &NodePath) -> [Self; 3] {
        Self::vector3(path, LOCAL_POSITION)
    }

    /// Local rotation as quaternion components x, y, z, w.
    pub fn local_rotation(path: &NodePath) -> [Self; 4] {
        [0, 1, 2, 3].map(|i| Self::new(path.clone(), LOCAL_ROTATION, Some(i)))
    }

    pub fn local_scale(path: &NodePath) -> [Self; 3] {
        Self::vector3(path, LOCAL_SCALE)
    }

    pub fn is_transform_channel(&self) -> bool {
        matches!(
            self.property.as_str(),
            LOCAL_POSITION | LOCAL_ROTATION | LOCAL_SCALE
        )
    }

    pub fn target(&self) -> BindingTarget {
        let component = self.index.map_or(0, usize::from);
        match self.property.as_str() {
            LOCAL_POSITION => BindingTarget::LocalPosition(component.min(2)),
            LOCAL_ROTATION => BindingTarget::LocalRotation(component.min(3)),
            LOCAL_SCALE => BindingTarget::LocalScale(component.min(2)),
            _ => BindingTarget::Property(self.property_binding()),
        }
    }

    /// The stream property addressed by this binding. Vector components are stored as
    /// `<property>.<x|y|z|w>`.
    pub fn property_binding(&self) -> PropertyBinding {
        let name = match self.index {
            Some(i) => format!(
                "{}.{}",
                self.property,
                COMPONENT_NAMES[usize::from(i).min(COMPONENT_NAMES.len() - 1)]
            ),
            None => self.property.clone(),
        };
        PropertyBinding::new(self.path.clone(), name)
    }
}

/// A component of the `i`-th entry of an array property, addressed as
/// `<array>.item<i>.<sub>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedProperty {
    pub array: String,
    pub index: usize,
    pub sub: String,
}

impl IndexedProperty {
    pub fn new(array: impl Into<String>, index: usize, sub: impl Into<String>) -> Self {
        Self {
            array: array.into(),
            index,
            sub: sub.into(),
        }
    }

    /// Whether `name` addresses an array entry, whether or not it is well formed.
    pub fn is_indexed(name: &str) -> bool {
        name.contains(".item")
    }

    pub fn parse(name: &str) -> Option<Self> {
        let captures = INDEXED_PROPERTY.captures(name)?;
        Some(Self {
            array: captures["array"].to_string(),
            index: captures["index"].parse().ok()?,
            sub: captures["sub"].to_string(),
        })
    }
}

impl std::fmt::Display for IndexedProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.item{}.{}", self.array, self.index, self.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_property_roundtrip() {
        let name = IndexedProperty::new("sourceObjects", 3, "weight").to_string();
        assert_eq!(name, "sourceObjects.item3.weight");
        assert_eq!(
            IndexedProperty::parse(&name),
            Some(IndexedProperty::new("sourceObjects", 3, "weight"))
        );
    }

    #[test]
    fn malformed_indexed_properties_are_rejected() {
        assert_eq!(IndexedProperty::parse("sourceObjects.weight"), None);
        assert_eq!(IndexedProperty::parse("sourceObjects.itemX.weight"), None);
        assert_eq!(IndexedProperty::parse("sourceObjects.item1."), None);
        assert!(IndexedProperty::is_indexed("sourceObjects.itemX.weight"));
        assert!(!IndexedProperty::is_indexed("positionWeight"));
    }

    #[test]
    fn binding_targets() {
        let path = NodePath::from("rig/hand");
        assert_eq!(
            CurveBinding::local_rotation(&path)[3].target(),
            BindingTarget::LocalRotation(3)
        );
        assert_eq!(
            CurveBinding::vector3(&path, "position")[1].target(),
            BindingTarget::Property(PropertyBinding::new(path.clone(), "position.y"))
        );
        assert_eq!(
            CurveBinding::float(path.clone(), "weight").target(),
            BindingTarget::Property(PropertyBinding::new(path, "weight"))
        );
    }
}
