use std::fmt::Debug;

use bevy::{
    platform::collections::HashMap,
    reflect::{Reflect, std_traits::ReflectDefault},
};
use serde::{Deserialize, Serialize};

use crate::node_path::NodePath;

/// Index of a node in a [`RigHierarchy`].
#[derive(
    Reflect, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug,
)]
#[reflect(Default)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Reflect, Clone, Debug)]
struct NodeEntry {
    path: NodePath,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The node tree of the host scene. Nodes are only referenced by the rig, never owned by it:
/// the hierarchy describes names and parent links, the pose lives in the stream.
#[derive(Reflect, Clone, Default)]
#[reflect(Default)]
pub struct RigHierarchy {
    nodes: Vec<NodeEntry>,
    path_to_id: HashMap<NodePath, NodeId>,
}

impl RigHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node under `parent`, or a new root when `parent` is `None`.
    pub fn add_node(&mut self, parent: Option<NodeId>, name: impl Into<String>) -> NodeId {
        let path = match parent {
            Some(parent) => self.nodes[parent.0].path.child(name),
            None => NodePath::new([name.into()]),
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            path: path.clone(),
            parent,
            children: vec![],
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        self.path_to_id.insert(path, id);
        id
    }

    /// Adds a node by its full path. Every ancestor must already be in the hierarchy.
    pub fn add_path(&mut self, path: &NodePath) -> Option<NodeId> {
        if let Some(id) = self.find(path) {
            return Some(id);
        }
        let name = path.last()?.to_string();
        match path.parent() {
            Some(parent_path) => {
                let parent = self.find(&parent_path)?;
                Some(self.add_node(Some(parent), name))
            }
            None => Some(self.add_node(None, name)),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn path(&self, id: NodeId) -> Option<&NodePath> {
        self.nodes.get(id.0).map(|n| &n.path)
    }

    pub fn find(&self, path: &NodePath) -> Option<NodeId> {
        self.path_to_id.get(path).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Whether `node` is a strict descendant of `ancestor`.
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Walks parent links from `tip` up to `root` and returns the chain in root to tip order.
    /// Returns `None` if `tip` is not a descendant of `root`.
    pub fn extract_chain(&self, root: NodeId, tip: NodeId) -> Option<Vec<NodeId>> {
        if !self.is_descendant_of(tip, root) {
            return None;
        }
        let mut chain = vec![tip];
        let mut current = tip;
        while current != root {
            current = self.parent(current)?;
            chain.push(current);
        }
        chain.reverse();
        Some(chain)
    }

    fn indent(f: &mut std::fmt::Formatter<'_>, level: u32) -> std::fmt::Result {
        if level == 0 {
            return Ok(());
        }
        for _ in 0..(level - 1) {
            write!(f, "┃ ")?;
        }
        write!(f, "┣━")
    }

    fn fmt_level(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        level: u32,
        nodes: &[NodeId],
    ) -> std::fmt::Result {
        for node in nodes {
            Self::indent(f, level)?;
            writeln!(f, "{} [{:?}]", self.nodes[node.0].path, node)?;
            self.fmt_level(f, level + 1, &self.nodes[node.0].children)?;
        }
        Ok(())
    }
}

impl Debug for RigHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Rig hierarchy:")?;
        let roots: Vec<NodeId> = self.iter().filter(|id| self.parent(*id).is_none()).collect();
        self.fmt_level(f, 0, &roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm() -> (RigHierarchy, [NodeId; 4]) {
        let mut hierarchy = RigHierarchy::new();
        let root = hierarchy.add_node(None, "root");
        let upper = hierarchy.add_node(Some(root), "upper");
        let lower = hierarchy.add_node(Some(upper), "lower");
        let hand = hierarchy.add_node(Some(lower), "hand");
        (hierarchy, [root, upper, lower, hand])
    }

    #[test]
    fn extract_chain_walks_from_tip_to_root() {
        let (hierarchy, [root, upper, lower, hand]) = arm();
        assert_eq!(
            hierarchy.extract_chain(upper, hand),
            Some(vec![upper, lower, hand])
        );
        assert_eq!(hierarchy.extract_chain(hand, upper), None);
        assert_eq!(hierarchy.extract_chain(root, root), None);
    }

    #[test]
    fn paths_are_built_from_parents() {
        let (mut hierarchy, [_, _, _, hand]) = arm();
        let path = NodePath::from_slashed_string("root/upper/lower/hand");
        assert_eq!(hierarchy.path(hand), Some(&path));
        assert_eq!(hierarchy.find(&path), Some(hand));

        let finger = hierarchy.add_path(&path.child("finger")).unwrap();
        assert_eq!(hierarchy.parent(finger), Some(hand));
        assert_eq!(hierarchy.add_path(&NodePath::from("missing/child")), None);
    }
}
