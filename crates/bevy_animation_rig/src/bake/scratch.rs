use bevy::log::debug;
use bevy_animation_rig_core::{
    builder::RigBuilder,
    clip::RigClip,
    constraint::RigConstraint,
    errors::BindResult,
    layer::{LayerMode, Rig, RigLayer},
    stream::SceneStream,
};

const SCRATCH_RIG: &str = "bake";

/// Isolated evaluation graph for a single bake.
///
/// Owns a fork of the live stream and a builder holding one layer with a copy of the baked
/// constraint. Nothing is shared with the live graph, and the builder is cleared when the graph
/// is dropped.
pub struct ScratchGraph {
    stream: SceneStream,
    builder: RigBuilder,
}

impl ScratchGraph {
    /// Forks `stream` and binds `constraint` against its rest pose.
    pub fn new(
        constraint: &dyn RigConstraint,
        stream: &SceneStream,
        mode: LayerMode,
    ) -> BindResult<Self> {
        let mut stream = stream.fork();
        stream.reset_pose();
        stream.clear_animated_properties();

        let mut rig = Rig::new(SCRATCH_RIG);
        rig.constraints.push(constraint.clone_box());
        let layer = match mode {
            LayerMode::Forward => RigLayer::new(rig),
            LayerMode::Inverse => RigLayer::inverse(rig),
        };
        let mut builder = RigBuilder::new([layer]);
        builder.try_build(&mut stream)?;
        debug!("Bound {mode:?} bake graph for {}", constraint.path());

        Ok(Self { stream, builder })
    }

    /// Poses the stream from `clip` at `time` and runs the constraint over it, `delta_time`
    /// seconds after the previous sample.
    pub fn sample(&mut self, clip: &RigClip, time: f32, delta_time: f32) -> &SceneStream {
        self.stream.reset_pose();
        self.stream.set_delta_time(delta_time);
        clip.apply(&mut self.stream, time);
        self.builder.update(&mut self.stream);
        &self.stream
    }

    pub fn stream(&self) -> &SceneStream {
        &self.stream
    }
}

impl Drop for ScratchGraph {
    fn drop(&mut self) {
        self.builder.clear();
    }
}
