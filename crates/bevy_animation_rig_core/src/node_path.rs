use bevy::{
    ecs::name::Name,
    reflect::{Reflect, std_traits::ReflectDefault},
};
use serde::{Deserialize, Serialize};

/// Path to a node from the evaluation root, made of node [`Name`]s.
///
/// Node paths are the *relative path* half of a curve binding, and they also identify
/// constraint components when binding their animatable properties.
#[derive(Reflect, Clone, Debug, Hash, PartialEq, Eq, Default, PartialOrd, Ord)]
#[reflect(Default)]
pub struct NodePath {
    /// Parts of the path
    pub parts: Vec<Name>,
}

impl NodePath {
    pub fn new(parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            parts: parts.into_iter().map(|p| Name::new(p.into())).collect(),
        }
    }

    /// Produce a new `NodePath` with the given child node name appended to the end
    pub fn child(&self, child: impl Into<String>) -> Self {
        let mut new_path = self.clone();
        new_path.parts.push(Name::new(child.into()));
        new_path
    }

    pub fn parent(&self) -> Option<Self> {
        let mut parent = self.clone();
        if parent.parts.len() > 1 {
            parent.parts.pop();
            Some(parent)
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<&Name> {
        self.parts.last()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Whether `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        self.parts.len() < other.parts.len()
            && self.parts.iter().zip(&other.parts).all(|(a, b)| a == b)
    }

    /// The path as text, one node name per `/`-separated segment.
    ///
    /// Escaping: a `/` inside a name is written `\/` and a `\` is written `\\`, so every
    /// unescaped `/` is a separator. Any other backslash sequence is kept as is when parsing.
    pub fn to_slashed_string(&self) -> String {
        let mut text = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                text.push('/');
            }
            for c in part.as_str().chars() {
                if matches!(c, '/' | '\\') {
                    text.push('\\');
                }
                text.push(c);
            }
        }
        text
    }

    /// Parses the format written by [`NodePath::to_slashed_string`]. Empty segments are skipped.
    pub fn from_slashed_string(path: &str) -> Self {
        Self::new(split_escaped(path))
    }
}

fn split_escaped(path: &str) -> Vec<String> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('/' | '\\')) => current.push(escaped),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            '/' => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_slashed_string())
    }
}

impl From<&str> for NodePath {
    fn from(value: &str) -> Self {
        Self::from_slashed_string(value)
    }
}

impl<S: Into<String>> FromIterator<S> for NodePath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl Serialize for NodePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_slashed_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(|s| Self::from_slashed_string(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slashed_string_roundtrip() {
        let path = "rig/arm_l/upper arm";
        assert_eq!(path, NodePath::from_slashed_string(path).to_slashed_string());

        let path = "rig/arm_l/with escaped\\/part";
        assert_eq!(path, NodePath::from_slashed_string(path).to_slashed_string());
    }

    #[test]
    fn escaped_slashes_stay_in_one_part() {
        let path = NodePath::from_slashed_string("rig/ik\\/target");
        assert_eq!(path, NodePath::new(["rig", "ik/target"]));
    }

    #[test]
    fn empty_segments_and_stray_escapes() {
        assert_eq!(NodePath::from("/rig//hand/"), NodePath::new(["rig", "hand"]));
        let path = NodePath::from("rig/a\\b\\");
        assert_eq!(path.last().map(|name| name.as_str()), Some("a\\b\\"));
        assert_eq!(["rig", "hand"].into_iter().collect::<NodePath>(), NodePath::from("rig/hand"));
    }

    #[test]
    fn parent_and_child() {
        let path = NodePath::new(["root", "hips"]);
        assert_eq!(path.child("spine").parent(), Some(path.clone()));
        assert_eq!(NodePath::new(["root"]).parent(), None);
        assert!(path.is_ancestor_of(&path.child("spine")));
        assert!(!path.is_ancestor_of(&path));
    }

    #[test]
    fn serializes_as_slashed_string() {
        let path = NodePath::new(["root", "a/b"]);
        let text = ron::to_string(&path).unwrap();
        assert_eq!(text, "\"root/a\\\\/b\"");
        let back: NodePath = ron::from_str(&text).unwrap();
        assert_eq!(back, path);
    }
}
