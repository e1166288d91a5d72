//! Position delta transform: shifts positional controller curves of clips.
//!
//! Rotation is never touched. Each clip is shifted atomically: its axes are
//! decoded, shifted and re-encoded off to the side and only swapped in once
//! every axis of the clip succeeded.

use log::{debug, info, warn};

use crate::codec::{self, KeyframeSample, KeyframeState};
use crate::config::Config;
use crate::error::{Result, TimelineError};
use crate::model::{Axis, Clip, ControllerTarget};
use crate::report::{ClipFailure, DeltaReport};

/// Deltas this close to zero leave an axis untouched.
pub const DELTA_EPSILON: f32 = 1e-6;

/// Time tolerance when looking up the frame at a given time.
pub const FRAME_EPSILON: f32 = 1e-5;

/// Add `delta` (x, y, z) to every positional controller curve of `clips`.
pub fn apply_position_delta<'a>(
    clips: impl IntoIterator<Item = &'a mut Clip>,
    delta: [f32; 3],
) -> DeltaReport {
    let mut report = DeltaReport {
        delta,
        ..Default::default()
    };
    for clip in clips {
        match shifted_curves(clip, delta) {
            Ok(updates) => {
                for (ctrl_idx, axis, tokens) in updates {
                    clip.controllers[ctrl_idx].axis_curves.insert(axis, tokens);
                }
                report.processed += 1;
            }
            Err(err) => {
                warn!("Failed to process clip '{}'. Reason: {err}", clip.name);
                report.failures.push(ClipFailure {
                    clip: clip.id(),
                    name: clip.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    report
}

/// New token lists for every axis the delta touches, without mutating.
fn shifted_curves(clip: &Clip, delta: [f32; 3]) -> Result<Vec<(usize, Axis, Vec<String>)>> {
    let mut updates = Vec::new();
    for (ctrl_idx, controller) in clip.controllers.iter().enumerate() {
        if controller.is_rotation_only() {
            continue;
        }
        for (axis, d) in Axis::POSITION.into_iter().zip(delta) {
            if d.abs() <= DELTA_EPSILON {
                continue;
            }
            let Some(tokens) = controller.curve(axis) else {
                continue;
            };
            updates.push((ctrl_idx, axis, shift_curve(tokens, d)?));
        }
    }
    Ok(updates)
}

/// Decode, sort by time, add `delta` to every value and re-encode.
pub fn shift_curve(tokens: &[String], delta: f32) -> Result<Vec<String>> {
    let mut samples = codec::decode_curve(tokens)?;
    samples.sort_by(|a, b| a.time.total_cmp(&b.time));
    let shifted: Vec<KeyframeSample> = samples
        .into_iter()
        .map(|s| KeyframeSample::new(s.time, s.value + delta, s.curve_type))
        .collect();
    Ok(codec::encode_curve(&shifted))
}

/// Value of `axis` at `time`, or 0.0 when no keyframe sits there.
pub fn value_at(controller: &ControllerTarget, axis: Axis, time: f32) -> Result<f32> {
    let tokens = controller.curve(axis).unwrap_or_default();
    let mut state = KeyframeState::INITIAL;
    for token in tokens {
        let sample = codec::decode_keyframe(token, state)?;
        if (sample.time - time).abs() <= FRAME_EPSILON {
            return Ok(sample.value);
        }
        state = KeyframeState::new(sample.value, sample.curve_type);
    }
    Ok(0.0)
}

/// First root controller of `clip`, trying candidates in order.
pub fn find_root_controller<'a>(clip: &'a Clip, config: &Config) -> Option<&'a ControllerTarget> {
    config
        .root_controller_candidates
        .iter()
        .find_map(|id| clip.controller(id))
}

/// Horizontal recenter delta `(-x, 0, -z)` from the root position at t=0
/// of `first`.
pub fn center_root_delta(first: &Clip, config: &Config) -> Result<[f32; 3]> {
    let root = find_root_controller(first, config).ok_or_else(|| {
        TimelineError::MissingRootController {
            clip: first.name.clone(),
            candidates: config.root_controller_candidates.clone(),
        }
    })?;
    let x = value_at(root, Axis::X, 0.0)?;
    let z = value_at(root, Axis::Z, 0.0)?;
    debug!("Root '{}' of '{}' sits at x={x}, z={z}", root.id, first.name);
    Ok([-x, 0.0, -z])
}

/// Center-root over a selection: the delta comes from the first clip only
/// and is applied to every clip. Nothing is mutated if the first clip has
/// no root controller.
pub fn center_root(clips: &mut [&mut Clip], config: &Config) -> Result<DeltaReport> {
    let Some(first) = clips.first() else {
        return Ok(DeltaReport::default());
    };
    let delta = center_root_delta(first, config)?;
    info!(
        "Calculated XZ delta: ({:.4}, {:.4}). Applying to {} clip(s).",
        delta[0],
        delta[2],
        clips.len()
    );
    let report = apply_position_delta(clips.iter_mut().map(|c| &mut **c), delta);
    info!(
        "Root centering (XZ only) finished. Processed {} clip(s).",
        report.processed
    );
    Ok(report)
}
