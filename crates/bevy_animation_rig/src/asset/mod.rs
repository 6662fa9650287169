mod loader;

pub use loader::*;

use bevy::{asset::Asset, reflect::Reflect};
use bevy_animation_rig_constraints::registry::ConstraintDescriptor;
use bevy_animation_rig_core::{
    layer::{Rig, RigLayer},
    node_path::NodePath,
};
use serde::{Deserialize, Serialize};

fn default_weight() -> f32 {
    1.
}

fn default_active() -> bool {
    true
}

/// A rig as authored in a `*.rig.ron` file. For example:
///
/// ```ron
/// (
///     path: "character/arm_rig",
///     weight: 0.8,
///     constraints: [
///         TwoBoneIK((
///             path: "character/arm_rig/arm_ik",
///             data: (root: Some(3), mid: Some(4), tip: Some(5), target: Some(9)),
///         )),
///     ],
/// )
/// ```
#[derive(Asset, Reflect, Clone, Debug, Serialize, Deserialize)]
pub struct RigDescription {
    pub path: NodePath,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub constraints: Vec<ConstraintDescriptor>,
}

impl RigDescription {
    pub fn to_rig(&self) -> Rig {
        let mut rig = Rig::new(self.path.clone()).with_weight(self.weight);
        rig.constraints = self
            .constraints
            .iter()
            .cloned()
            .map(ConstraintDescriptor::into_rig_constraint)
            .collect();
        rig
    }

    /// An unbound forward layer evaluating this rig.
    pub fn to_layer(&self) -> RigLayer {
        let mut layer = RigLayer::new(self.to_rig());
        layer.active = self.active;
        layer
    }
}

#[cfg(test)]
mod tests {
    use bevy::{math::Vec3, transform::components::Transform};
    use bevy_animation_rig_core::{hierarchy::RigHierarchy, layer::LayerMode, stream::SceneStream};

    use super::*;

    const ARM_RIG: &str = r#"(
        path: "character/arm_rig",
        weight: 0.8,
        constraints: [
            TwoBoneIK((
                path: "character/arm_rig/arm_ik",
                data: (root: Some(1), mid: Some(2), tip: Some(3), target: Some(4)),
            )),
            MultiPosition((
                path: "character/arm_rig/follow",
                weight: 0.5,
                data: (
                    constrained_object: Some(4),
                    source_objects: [(node: Some(0), weight: 1.0)],
                ),
            )),
        ],
    )"#;

    #[test]
    fn description_parses_with_defaults() {
        let description: RigDescription = ron::de::from_str(ARM_RIG).unwrap();
        assert_eq!(description.path.to_string(), "character/arm_rig");
        assert!(description.active);
        assert_eq!(description.constraints.len(), 2);
        assert_eq!(description.constraints[1].kind(), "MultiPosition");

        let layer = description.to_layer();
        assert_eq!(layer.mode(), LayerMode::Forward);
        assert_eq!(layer.rig().weight(), 0.8);
        assert_eq!(layer.rig().constraints[1].weight(), 0.5);
        assert_eq!(layer.rig().constraints[0].path().to_string(), "character/arm_rig/arm_ik");
    }

    #[test]
    fn described_layer_binds() {
        let mut hierarchy = RigHierarchy::new();
        let root = hierarchy.add_node(None, "character");
        let upper = hierarchy.add_node(Some(root), "upper");
        let lower = hierarchy.add_node(Some(upper), "lower");
        hierarchy.add_node(Some(lower), "hand");
        hierarchy.add_node(Some(root), "target");
        let mut stream = SceneStream::with_rest_pose(
            hierarchy,
            [
                Vec3::ZERO,
                Vec3::ZERO,
                Vec3::new(0.2, 1., 0.),
                Vec3::new(-0.2, 1., 0.),
                Vec3::X,
            ]
            .map(Transform::from_translation),
        );

        let description: RigDescription = ron::de::from_str(ARM_RIG).unwrap();
        let mut layer = description.to_layer();
        assert!(layer.bind(&mut stream).is_ok());
        assert!(layer.is_bound());
    }
}
