use bevy_animation_rig_core::curves::{AnimationCurve, DenseCurve};

/// Turns dense per-frame bake samples into the keyframed curves stored in the output clip.
///
/// Keyframe fitting lives outside of this crate; hosts plug their own reduction in here.
pub trait CurveReducer {
    fn reduce(&self, dense: &DenseCurve) -> AnimationCurve;
}

/// Keeps one key per sampled frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeepAllKeys;

impl CurveReducer for KeepAllKeys {
    fn reduce(&self, dense: &DenseCurve) -> AnimationCurve {
        dense.to_keyframes()
    }
}
