use bevy::log::debug;

use crate::{
    errors::BindResult,
    layer::{RigLayer, bind_or_warn},
    stream::{AnimationStream, StreamId},
};

/// Ordered list of rig layers and the per-frame entry point.
#[derive(Debug, Default)]
pub struct RigBuilder {
    pub layers: Vec<RigLayer>,
    stream: Option<StreamId>,
}

impl RigBuilder {
    pub fn new(layers: impl IntoIterator<Item = RigLayer>) -> Self {
        Self {
            layers: layers.into_iter().collect(),
            stream: None,
        }
    }

    pub fn with_layer(mut self, layer: RigLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn is_built(&self) -> bool {
        self.stream.is_some()
    }

    /// Binds every layer in order against `stream`, clearing any previous build first.
    ///
    /// Layers that fail to bind are skipped (and logged). Returns `true` only if every layer was
    /// bound.
    pub fn build(&mut self, stream: &mut dyn AnimationStream) -> bool {
        self.clear();
        if self.layers.is_empty() {
            return false;
        }

        let mut all_bound = true;
        for layer in &mut self.layers {
            all_bound &= bind_or_warn(layer, stream);
        }
        self.stream = Some(stream.id());
        debug!("Built {} rig layers", self.layers.len());
        all_bound
    }

    /// Binds every layer like [`RigBuilder::build`], but stops at the first failure and leaves
    /// the builder cleared.
    pub fn try_build(&mut self, stream: &mut dyn AnimationStream) -> BindResult<()> {
        self.clear();
        for layer in &mut self.layers {
            if let Err(error) = layer.bind(stream) {
                self.clear();
                return Err(error);
            }
        }
        self.stream = Some(stream.id());
        Ok(())
    }

    /// Evaluates every bound, active layer in order.
    pub fn update(&mut self, stream: &mut dyn AnimationStream) {
        let Some(built) = self.stream else {
            return;
        };
        assert!(
            built == stream.id(),
            "rig builder updated with a stream it was not built against"
        );
        for layer in &mut self.layers {
            if layer.active && layer.is_bound() {
                layer.update(stream);
            }
        }
    }

    /// Resets every layer. Destruction is total: no layer keeps a job afterwards.
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.reset();
        }
        self.stream = None;
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec3;

    use super::*;
    use crate::{
        constraint::Constraint,
        layer::{
            Rig,
            tests::{Nudge, stream},
        },
    };

    fn nudge_layer(path: &str, node: Option<crate::hierarchy::NodeId>) -> RigLayer {
        RigLayer::new(Rig::new(path).with_constraint(Constraint::new(
            format!("{path}/nudge").as_str(),
            Nudge {
                node,
                offset: Vec3::Y,
            },
        )))
    }

    #[test]
    fn inactive_layers_are_skipped_but_stay_bound() {
        let (mut stream, node) = stream();
        let mut builder = RigBuilder::new([nudge_layer("a", Some(node)), nudge_layer("b", Some(node))]);
        assert!(builder.build(&mut stream));

        builder.layers[1].active = false;
        builder.update(&mut stream);
        assert_eq!(stream.local_transform(node).translation, Vec3::Y);
        assert!(builder.layers[1].is_bound());
    }

    #[test]
    fn failing_layer_does_not_stop_the_others() {
        let (mut stream, node) = stream();
        let mut builder = RigBuilder::new([nudge_layer("a", None), nudge_layer("b", Some(node))]);
        assert!(!builder.build(&mut stream));
        assert!(!builder.layers[0].is_bound());
        builder.update(&mut stream);
        assert_eq!(stream.local_transform(node).translation, Vec3::Y);
    }

    #[test]
    fn try_build_reports_the_first_failure() {
        let (mut stream, node) = stream();
        let mut builder = RigBuilder::new([nudge_layer("a", Some(node)), nudge_layer("b", None)]);
        assert!(matches!(
            builder.try_build(&mut stream),
            Err(crate::errors::BindError::MissingReference { .. })
        ));
        assert!(!builder.is_built());
        assert!(builder.layers.iter().all(|layer| !layer.is_bound()));
    }

    #[test]
    fn clear_resets_every_layer() {
        let (mut stream, node) = stream();
        let mut builder = RigBuilder::new([nudge_layer("a", Some(node)), nudge_layer("b", Some(node))]);
        builder.build(&mut stream);
        builder.clear();
        assert!(!builder.is_built());
        assert!(builder.layers.iter().all(|layer| !layer.is_bound()));
    }

    #[test]
    fn empty_builder_does_not_build() {
        let (mut stream, _) = stream();
        assert!(!RigBuilder::default().build(&mut stream));
    }

    #[test]
    #[should_panic]
    fn update_with_foreign_stream_panics() {
        let (mut stream, node) = stream();
        let mut builder = RigBuilder::new([nudge_layer("a", Some(node))]);
        builder.build(&mut stream);
        let mut other = stream.fork();
        builder.update(&mut other);
    }
}
