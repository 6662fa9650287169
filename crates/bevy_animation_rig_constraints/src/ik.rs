//! Positional IK solvers shared by the IK constraints. Both work on global positions and leave
//! it to the caller to turn the result into joint rotations.

use bevy::math::{Quat, Vec3};

use crate::math::{EPSILON, from_to_rotation};

/// World-space swings that bend a two bone chain towards a target. The new global rotation of
/// the root is `root_swing * root`, the one of the mid joint `mid_swing * mid`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TwoBoneSolution {
    pub root_swing: Quat,
    pub mid_swing: Quat,
}

/// Optional pole hint and how strongly it overrides the current bend plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoleHint {
    pub position: Vec3,
    pub weight: f32,
}

/// Analytic two bone solve: law of cosines in the plane spanned by the root→target axis and
/// the pole direction.
///
/// `upper_len` and `lower_len` are the rigid link lengths. Returns `None` when the chain or the
/// target are degenerate, in which case the pose must be left as is.
pub fn solve_two_bone_ik(
    root: Vec3,
    mid: Vec3,
    tip: Vec3,
    target: Vec3,
    hint: Option<PoleHint>,
    upper_len: f32,
    lower_len: f32,
) -> Option<TwoBoneSolution> {
    // keeps the chain from fully straightening, where the bend plane is lost
    const MAX_LEN_OFFSET: f32 = 1e-4;

    let to_end = (tip - root).normalize_or_zero();
    if to_end == Vec3::ZERO || upper_len <= EPSILON || lower_len <= EPSILON {
        return None;
    }

    if target.distance(root) <= EPSILON {
        return None;
    }
    let max_len = upper_len + lower_len - MAX_LEN_OFFSET;
    let min_len = (upper_len - lower_len).abs() + MAX_LEN_OFFSET;
    let to_target_offset = (target - root).clamp_length(min_len, max_len.max(min_len));
    let to_target_dist = to_target_offset.length();
    let to_target = to_target_offset / to_target_dist;

    // bend plane: the current one carried along with the limb, pulled towards the hint
    let in_pole = (mid - root).reject_from_normalized(to_end);
    let mut out_pole = (Quat::from_rotation_arc(to_end, to_target) * in_pole).normalize_or_zero();
    if let Some(hint) = hint.filter(|hint| hint.weight > 0.) {
        let hint_pole = (hint.position - root)
            .reject_from_normalized(to_target)
            .normalize_or_zero();
        if hint_pole != Vec3::ZERO {
            out_pole = out_pole
                .lerp(hint_pole, hint.weight.min(1.))
                .normalize_or_zero();
        }
    }
    if out_pole == Vec3::ZERO {
        out_pole = to_target.any_orthonormal_vector();
    }

    let denom = 2. * upper_len * to_target_dist;
    let cos_angle = ((to_target_dist * to_target_dist + upper_len * upper_len
        - lower_len * lower_len)
        / denom)
        .clamp(-1., 1.);
    let angle = cos_angle.acos();

    let out_end = root + to_target_offset;
    let out_mid = root + upper_len * cos_angle * to_target + upper_len * angle.sin() * out_pole;

    let root_swing = from_to_rotation(mid - root, out_mid - root);
    let end_with_root_swing = root + root_swing * (tip - root);
    let mid_swing = from_to_rotation(end_with_root_swing - out_mid, out_end - out_mid) * root_swing;

    Some(TwoBoneSolution {
        root_swing,
        mid_swing,
    })
}

/// Outcome of a FABRIK solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FabrikResult {
    pub iterations: usize,
    pub converged: bool,
}

/// Forward and backward reaching IK over `positions`, with `positions[0]` held fixed.
///
/// `lengths[i]` is the rigid length between `positions[i]` and `positions[i + 1]`. Stops once
/// the tip is within `tolerance` of `target` and never runs more than `max_iterations` passes.
/// An unreachable target straightens the chain towards it without iterating.
pub fn solve_fabrik(
    positions: &mut [Vec3],
    lengths: &[f32],
    target: Vec3,
    tolerance: f32,
    max_iterations: usize,
) -> FabrikResult {
    let Some(tip) = positions.len().checked_sub(1).filter(|tip| *tip > 0) else {
        return FabrikResult {
            iterations: 0,
            converged: false,
        };
    };
    debug_assert_eq!(lengths.len(), tip);

    let root = positions[0];
    let max_reach: f32 = lengths.iter().sum();
    let rest_dirs: Vec<Vec3> = positions
        .windows(2)
        .map(|link| (link[1] - link[0]).normalize_or(Vec3::Y))
        .collect();

    if root.distance_squared(target) > max_reach * max_reach {
        let dir = (target - root).normalize_or_zero();
        for i in 1..=tip {
            positions[i] = positions[i - 1] + dir * lengths[i - 1];
        }
        return FabrikResult {
            iterations: 0,
            converged: positions[tip].distance(target) <= tolerance,
        };
    }

    let mut iterations = 0;
    while iterations < max_iterations && positions[tip].distance(target) > tolerance {
        positions[tip] = target;
        for i in (0..tip).rev() {
            let dir = (positions[i] - positions[i + 1]).normalize_or(-rest_dirs[i]);
            positions[i] = positions[i + 1] + dir * lengths[i];
        }

        positions[0] = root;
        for i in 1..=tip {
            let dir = (positions[i] - positions[i - 1]).normalize_or(rest_dirs[i - 1]);
            positions[i] = positions[i - 1] + dir * lengths[i - 1];
        }
        iterations += 1;
    }

    FabrikResult {
        iterations,
        converged: positions[tip].distance(target) <= tolerance,
    }
}
