//! Merge engine: layer-into-layer merge, import from another export, and
//! move/copy/reorder of clips between layers.
//!
//! Every operation validates its preconditions before touching the file, so
//! an `Err` always means nothing changed.

use std::collections::BTreeSet;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{NameKind, Result, TimelineError};
use crate::ids::ClipId;
use crate::model::{
    AnimationFile, Clip, ControllerTarget, FloatParamTarget, LayerKey, SegmentKey,
    TriggerGroupTarget, STANDALONE_ATOM_ID,
};
use crate::report::{FileMergeReport, LayerMergeReport, LayerPlacement, TransferReport};
use crate::signature::{find_compatible_layer, unused_layer_name, LayerSignature};

/// What to do with an imported clip whose name is already used in its
/// destination layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Leave the existing clip, drop the incoming one.
    Skip,
    /// Delete the existing clip, insert the incoming one.
    Replace,
    /// Insert the incoming one as `{name}_merged`, `{name}_merged_1`, ...
    Rename,
}

impl std::str::FromStr for ConflictStrategy {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            "rename" => Ok(Self::Rename),
            other => Err(TimelineError::InvalidOperation(format!(
                "unknown conflict strategy '{other}'"
            ))),
        }
    }
}

/// A clip about to land in a layer that already has a clip of that name.
#[derive(Debug)]
pub struct NameCollision<'a> {
    pub clip: ClipId,
    pub name: &'a str,
    pub target: &'a LayerKey,
    /// Names already used in the target, including ones claimed earlier in
    /// the same batch.
    pub taken: &'a BTreeSet<String>,
}

/// Caller's answer to a [`NameCollision`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollisionResolution {
    Skip,
    Replace,
    Rename(String),
    /// Abort the whole transfer with `NameConflict`.
    Reject,
}

/// Decides name collisions during move/copy. Hosts implement this with a
/// prompt; headless callers use a [`ConflictStrategy`] or a closure.
pub trait CollisionResolver {
    fn resolve(&mut self, collision: &NameCollision<'_>) -> CollisionResolution;
}

impl CollisionResolver for ConflictStrategy {
    fn resolve(&mut self, collision: &NameCollision<'_>) -> CollisionResolution {
        match self {
            ConflictStrategy::Skip => CollisionResolution::Skip,
            ConflictStrategy::Replace => CollisionResolution::Replace,
            ConflictStrategy::Rename => {
                CollisionResolution::Rename(merged_clip_name(collision.name, collision.taken))
            }
        }
    }
}

impl<F> CollisionResolver for F
where
    F: FnMut(&NameCollision<'_>) -> CollisionResolution,
{
    fn resolve(&mut self, collision: &NameCollision<'_>) -> CollisionResolution {
        self(collision)
    }
}

/// `{base}_merged`, then `{base}_merged_1`, `{base}_merged_2`, ...
pub fn merged_clip_name(base: &str, taken: &BTreeSet<String>) -> String {
    let first = format!("{base}_merged");
    if !taken.contains(&first) {
        return first;
    }
    (1u32..)
        .map(|n| format!("{base}_merged_{n}"))
        .find(|name| !taken.contains(name))
        .unwrap_or(first)
}

/// `{base} (merged)`, then `{base} (merged 2)`, `{base} (merged 3)`, ...
fn merged_group_name(base: &str, clip: &Clip) -> String {
    let first = format!("{base} (merged)");
    if !clip.has_trigger_group(&first) {
        return first;
    }
    (2u32..)
        .map(|n| format!("{base} (merged {n})"))
        .find(|name| !clip.has_trigger_group(name))
        .unwrap_or(first)
}

/// Templates for harmonization, first-seen per key.
#[derive(Default)]
struct MasterTargets {
    float_params: IndexMap<(String, String), FloatParamTarget>,
    controllers: IndexMap<String, ControllerTarget>,
    trigger_groups: IndexMap<String, TriggerGroupTarget>,
}

impl MasterTargets {
    fn collect<'a>(clips: impl IntoIterator<Item = &'a Clip>) -> Self {
        let mut master = Self::default();
        for clip in clips {
            for p in &clip.float_params {
                master
                    .float_params
                    .entry(p.key())
                    .or_insert_with(|| p.clone());
            }
            for c in &clip.controllers {
                master
                    .controllers
                    .entry(c.id.clone())
                    .or_insert_with(|| c.clone());
            }
            for g in &clip.trigger_groups {
                master
                    .trigger_groups
                    .entry(g.name.clone())
                    .or_insert_with(|| g.clone());
            }
        }
        master
    }

    /// Give `clip` a resting curve for every master target it lacks.
    fn harmonize(&self, clip: &mut Clip) -> usize {
        let mut added = 0;
        for ((storable, name), template) in &self.float_params {
            if !clip.has_float_param(storable, name) {
                clip.float_params.push(FloatParamTarget {
                    storable: storable.clone(),
                    name: name.clone(),
                    min: template.min,
                    max: template.max,
                    keyframes: codec::flat_curve(clip.length, 0.0),
                });
                added += 1;
            }
        }
        for (id, template) in &self.controllers {
            if !clip.has_controller(id) {
                clip.controllers.push(ControllerTarget::at_rest(
                    id.clone(),
                    template.extra.clone(),
                    clip.length,
                ));
                added += 1;
            }
        }
        for (name, template) in &self.trigger_groups {
            if !clip.has_trigger_group(name) {
                clip.trigger_groups.push(TriggerGroupTarget::spanning(
                    name.clone(),
                    template.live.clone(),
                    clip.length,
                ));
                added += 1;
            }
        }
        added
    }
}

/// Fold the targets of `source` into the same-named `target` clip.
fn absorb(target: &mut Clip, source: Clip, report: &mut LayerMergeReport) {
    for param in source.float_params {
        if !target.has_float_param(&param.storable, &param.name) {
            target.float_params.push(param);
        }
    }
    for controller in source.controllers {
        if !target.has_controller(&controller.id) {
            target.controllers.push(controller);
        }
    }
    for mut group in source.trigger_groups {
        if target.has_trigger_group(&group.name) {
            let renamed = merged_group_name(&group.name, target);
            debug!(
                "Trigger group name conflict in clip '{}'. Renaming '{}' to '{renamed}'.",
                target.name, group.name
            );
            report.renamed_trigger_groups.push((
                target.name.clone(),
                group.name.clone(),
                renamed.clone(),
            ));
            group.name = renamed;
        }
        target.trigger_groups.push(group);
    }
}

/// Merge layer `source` into layer `target` of the same atom and segment.
///
/// Same-named clips are folded together, the rest are reparented, and then
/// every clip of the target layer is given resting curves for any target
/// another clip of either layer animates.
pub fn merge_layers(
    file: &mut AnimationFile,
    source: &LayerKey,
    target: &LayerKey,
) -> Result<LayerMergeReport> {
    if source.atom_id != target.atom_id || source.segment != target.segment {
        return Err(TimelineError::InvalidOperation(
            "Layers can only be merged within the same segment of the same atom.".into(),
        ));
    }
    if source.layer == target.layer {
        return Err(TimelineError::InvalidOperation(format!(
            "Layer '{}' cannot be merged into itself.",
            source.layer
        )));
    }
    info!(
        "Merging layer '{}' into '{}' in '{}/{}'.",
        source.layer, target.layer, target.atom_id, target.segment
    );

    let source_ids = file.layer_clip_ids(source);
    let target_ids = file.layer_clip_ids(target);

    let master = MasterTargets::collect(
        source_ids
            .iter()
            .chain(&target_ids)
            .filter_map(|id| file.clip(*id)),
    );

    let target_by_name: HashMap<String, ClipId> = target_ids
        .iter()
        .filter_map(|id| file.clip(*id).map(|c| (c.name.clone(), *id)))
        .collect();

    let mut report = LayerMergeReport::default();
    for id in source_ids {
        let Some(name) = file.clip(id).map(|c| c.name.clone()) else {
            continue;
        };
        match target_by_name.get(&name) {
            Some(&target_id) => {
                let Some(src) = file.remove(id) else {
                    continue;
                };
                if let Some(dst) = file.clip_mut(target_id) {
                    absorb(dst, src, &mut report);
                    report.merged_clips += 1;
                }
            }
            None => {
                if let Some(clip) = file.clip_mut(id) {
                    clip.layer = target.layer.clone();
                    report.moved_clips += 1;
                }
            }
        }
    }

    for clip in file.clips_mut().filter(|c| c.in_layer(target)) {
        report.harmonized_targets += master.harmonize(clip);
    }

    info!(
        "Layer merge complete: {} merged, {} moved, {} target(s) harmonized.",
        report.merged_clips, report.moved_clips, report.harmonized_targets
    );
    Ok(report)
}

/// Import every clip of `source` into `current`, placing each source layer
/// in a compatible existing layer or a freshly named one.
pub fn merge_file(
    current: &mut AnimationFile,
    source: &AnimationFile,
    strategy: ConflictStrategy,
) -> Result<FileMergeReport> {
    if current.is_scene() {
        return Err(TimelineError::MergeError(
            "Cannot merge into a scene file or an empty project.".into(),
        ));
    }
    if source.is_scene() {
        return Err(TimelineError::MergeError(
            "Cannot merge a scene file. Only animation export files are supported.".into(),
        ));
    }
    if current.atom_type() != source.atom_type() {
        return Err(TimelineError::MergeError(format!(
            "Mismatched Atom Types. Current: {}, Source: {}",
            current.atom_type().unwrap_or("(none)"),
            source.atom_type().unwrap_or("(none)")
        )));
    }
    info!("Merge strategy for name conflicts: '{strategy:?}'");

    let mut grouped: IndexMap<&str, IndexMap<&str, Vec<&Clip>>> = IndexMap::new();
    for clip in source.clips() {
        grouped
            .entry(clip.segment.as_str())
            .or_default()
            .entry(clip.layer.as_str())
            .or_default()
            .push(clip);
    }

    let mut next_order = current.max_order_index();
    let mut report = FileMergeReport::default();

    for (segment, layers) in grouped {
        let segment_key = SegmentKey::new(STANDALONE_ATOM_ID, segment);
        for (layer, clips) in layers {
            let signature = LayerSignature::of(clips.iter().copied());
            let (target_layer, reused) =
                match find_compatible_layer(current, &segment_key, &signature) {
                    Some(existing) => {
                        debug!("Found compatible layer '{existing}' in '{segment}'.");
                        (existing, true)
                    }
                    None => {
                        let fresh = unused_layer_name(current, &segment_key, layer);
                        debug!("Created new compatible layer '{fresh}' in segment '{segment}'.");
                        (fresh, false)
                    }
                };
            let target_key = segment_key.layer(target_layer.as_str());
            report.placements.push(LayerPlacement {
                segment: segment.to_string(),
                source_layer: layer.to_string(),
                target_layer: target_layer.clone(),
                reused,
            });

            let mut taken = current.clip_names(&target_key);
            for clip in clips {
                let conflict = taken.contains(&clip.name);
                if conflict && strategy == ConflictStrategy::Skip {
                    info!("Skipping '{}' due to name conflict.", clip.name);
                    report.skipped.push(clip.name.clone());
                    continue;
                }

                let mut incoming = clip.clone();
                incoming.atom_id = STANDALONE_ATOM_ID.to_string();
                incoming.segment = segment.to_string();
                incoming.layer = target_layer.clone();

                if conflict {
                    match strategy {
                        ConflictStrategy::Replace => {
                            if let Some(existing) =
                                current.find_clip(&target_key, &clip.name).map(Clip::id)
                            {
                                current.remove(existing);
                            }
                            info!(
                                "Replacing clip '{}' in '{segment}/{target_layer}'.",
                                clip.name
                            );
                            report.replaced.push(clip.name.clone());
                        }
                        ConflictStrategy::Rename => {
                            incoming.name = merged_clip_name(&clip.name, &taken);
                            info!("Renaming '{}' to '{}'.", clip.name, incoming.name);
                            report
                                .renamed
                                .push((clip.name.clone(), incoming.name.clone()));
                        }
                        ConflictStrategy::Skip => {}
                    }
                }

                next_order += 1;
                incoming.order_index = next_order;
                taken.insert(incoming.name.clone());
                current.push(incoming);
                report.added += 1;
            }
        }
    }

    info!("Merge complete. Added {} clip(s).", report.added);
    Ok(report)
}

/// Where dragged clips go relative to the drop anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropPlacement {
    Above,
    Below,
}

/// Move `dragged` clips of `layer` next to `anchor` (or to the end when the
/// anchor is absent or itself dragged) and renumber the layer densely.
/// Returns how many clips moved.
pub fn reorder_clips(
    file: &mut AnimationFile,
    layer: &LayerKey,
    dragged: &[ClipId],
    anchor: Option<ClipId>,
    placement: DropPlacement,
) -> usize {
    let dragged: HashSet<ClipId> = dragged.iter().copied().collect();
    let ordered = file.layer_clip_ids(layer);
    let (moving, mut remaining): (Vec<ClipId>, Vec<ClipId>) =
        ordered.into_iter().partition(|id| dragged.contains(id));

    let insert_at = match anchor.and_then(|a| remaining.iter().position(|id| *id == a)) {
        Some(idx) if placement == DropPlacement::Below => idx + 1,
        Some(idx) => idx,
        None => remaining.len(),
    };
    let count = moving.len();
    let tail = remaining.split_off(insert_at);
    remaining.extend(moving);
    remaining.extend(tail);

    for (index, id) in remaining.into_iter().enumerate() {
        if let Some(clip) = file.clip_mut(id) {
            clip.order_index = index as i64;
        }
    }
    info!("Reordered {count} clip(s) in layer '{}'.", layer.layer);
    count
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    Move,
    Copy,
}

enum Step {
    Skip(ClipId),
    Place {
        id: ClipId,
        rename: Option<String>,
        replace: Option<ClipId>,
    },
}

/// Move or copy clips of one layer into `target`.
///
/// Dropping onto the clips' own layer is a reorder to the end. Crossing an
/// atom or segment boundary first looks for a layer with an equal signature
/// in the destination segment and otherwise creates one named after the
/// source layer. Name collisions are put to `resolver` before anything is
/// mutated.
pub fn transfer_clips(
    file: &mut AnimationFile,
    clips: &[ClipId],
    target: &LayerKey,
    mode: TransferMode,
    resolver: &mut dyn CollisionResolver,
) -> Result<TransferReport> {
    let wanted: HashSet<ClipId> = clips.iter().copied().collect();
    let mut sources: Vec<&Clip> = file
        .clips()
        .iter()
        .filter(|c| wanted.contains(&c.id()))
        .collect();
    sources.sort_by_key(|c| c.order_index);
    if sources.len() != wanted.len() {
        return Err(TimelineError::InvalidOperation(
            "Selection contains clips that are not in this file.".into(),
        ));
    }
    let Some(first) = sources.first() else {
        return Ok(TransferReport::new(target));
    };
    let source_key = first.layer_key();
    if sources.iter().any(|c| !c.in_layer(&source_key)) {
        return Err(TimelineError::InvalidOperation(
            "Clips can only be moved or copied from a single layer at a time.".into(),
        ));
    }

    if source_key == *target && mode == TransferMode::Move {
        let ids: Vec<ClipId> = sources.iter().map(|c| c.id()).collect();
        let mut report = TransferReport::new(target);
        reorder_clips(file, target, &ids, None, DropPlacement::Below);
        report.transferred = ids;
        return Ok(report);
    }

    let mut destination = target.clone();
    let mut reused = false;
    if source_key.atom_id != target.atom_id || source_key.segment != target.segment {
        let signature = LayerSignature::of_layer(file, &source_key);
        let segment = target.segment_key();
        match find_compatible_layer(file, &segment, &signature) {
            Some(existing) => {
                debug!("Found compatible layer '{existing}' in '{}'.", target.segment);
                destination = target.with_layer(existing);
                reused = true;
            }
            None => {
                let fresh = unused_layer_name(file, &segment, &source_key.layer);
                debug!(
                    "No compatible layer found. Creating new layer '{fresh}' in '{}'.",
                    target.segment
                );
                destination = target.with_layer(fresh);
            }
        }
    }

    let mut taken = file.clip_names(&destination);
    let mut plan = Vec::with_capacity(sources.len());
    for clip in &sources {
        if !taken.contains(&clip.name) {
            taken.insert(clip.name.clone());
            plan.push(Step::Place {
                id: clip.id(),
                rename: None,
                replace: None,
            });
            continue;
        }
        let collision = NameCollision {
            clip: clip.id(),
            name: &clip.name,
            target: &destination,
            taken: &taken,
        };
        let step = match resolver.resolve(&collision) {
            CollisionResolution::Skip => Step::Skip(clip.id()),
            CollisionResolution::Replace => {
                let existing = file
                    .find_clip(&destination, &clip.name)
                    .map(Clip::id)
                    .filter(|id| !wanted.contains(id))
                    .ok_or_else(|| {
                        TimelineError::conflict(
                            NameKind::Clip,
                            &clip.name,
                            format!("layer '{destination}'"),
                        )
                    })?;
                Step::Place {
                    id: clip.id(),
                    rename: None,
                    replace: Some(existing),
                }
            }
            CollisionResolution::Rename(new_name) => {
                if new_name.is_empty() || taken.contains(&new_name) {
                    return Err(TimelineError::conflict(
                        NameKind::Clip,
                        &new_name,
                        format!("layer '{destination}'"),
                    ));
                }
                taken.insert(new_name.clone());
                Step::Place {
                    id: clip.id(),
                    rename: Some(new_name),
                    replace: None,
                }
            }
            CollisionResolution::Reject => {
                return Err(TimelineError::conflict(
                    NameKind::Clip,
                    &clip.name,
                    format!("layer '{destination}'"),
                ));
            }
        };
        plan.push(step);
    }

    let mut report = TransferReport::new(&destination);
    report.reused_compatible_layer = reused;
    let mut next_order = file.max_layer_order_index(&destination);
    for step in plan {
        let (id, rename, replace) = match step {
            Step::Skip(id) => {
                report.skipped.push(id);
                continue;
            }
            Step::Place {
                id,
                rename,
                replace,
            } => (id, rename, replace),
        };
        if let Some(old) = replace.and_then(|old| file.remove(old)) {
            report.replaced.push(old.name);
        }
        next_order += 1;
        let placed = match mode {
            TransferMode::Copy => {
                let Some(mut copy) = file.clip(id).cloned() else {
                    continue;
                };
                relocate(&mut copy, &destination, next_order, rename, &mut report);
                info!("Copied '{}' to '{destination}'.", copy.name);
                file.push(copy)
            }
            TransferMode::Move => {
                let Some(clip) = file.clip_mut(id) else {
                    continue;
                };
                relocate(clip, &destination, next_order, rename, &mut report);
                info!("Moved '{}' to '{destination}'.", clip.name);
                id
            }
        };
        report.transferred.push(placed);
    }
    Ok(report)
}

fn relocate(
    clip: &mut Clip,
    destination: &LayerKey,
    order_index: i64,
    rename: Option<String>,
    report: &mut TransferReport,
) {
    clip.atom_id = destination.atom_id.clone();
    clip.segment = destination.segment.clone();
    clip.layer = destination.layer.clone();
    clip.order_index = order_index;
    if let Some(name) = rename {
        report.renamed.push((clip.name.clone(), name.clone()));
        clip.name = name;
    }
}
