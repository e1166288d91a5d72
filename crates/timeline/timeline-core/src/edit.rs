//! Renames, deletions and small structural edits on a loaded file.

use hashbrown::HashSet;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NameKind, Result, TimelineError};
use crate::ids::ClipId;
use crate::model::{AnimationFile, Clip, LayerKey, SegmentKey, NEXT_ANIMATION_NAME};
use crate::report::{BatchRenameReport, RenameReport};

/// One entry of a mixed deletion batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    Segment(SegmentKey),
    Layer(LayerKey),
    Clip(ClipId),
}

/// Find/replace then prefix then suffix, applied to each selected clip name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchRename {
    pub find: String,
    pub replace: String,
    pub prefix: String,
    pub suffix: String,
}

impl BatchRename {
    pub fn apply(&self, name: &str) -> String {
        let mut out = if self.find.is_empty() {
            name.to_string()
        } else {
            name.replace(&self.find, &self.replace)
        };
        out.insert_str(0, &self.prefix);
        out.push_str(&self.suffix);
        out
    }
}

fn require_name(new_name: &str) -> Result<()> {
    if new_name.is_empty() {
        return Err(TimelineError::InvalidOperation(
            "Names must not be empty.".into(),
        ));
    }
    Ok(())
}

fn clip_name_taken(file: &AnimationFile, key: &LayerKey, name: &str, except: ClipId) -> bool {
    file.clips()
        .iter()
        .any(|c| c.id() != except && c.in_layer(key) && c.name == name)
}

/// Point every `NextAnimationName` of `layer` that said `old` at `new`.
fn retarget_next_animation(file: &mut AnimationFile, layer: &LayerKey, old: &str, new: &str) -> usize {
    let mut updated = 0;
    for clip in file.clips_mut().filter(|c| c.in_layer(layer)) {
        if clip.next_animation_name() == Some(old) {
            clip.other
                .insert(NEXT_ANIMATION_NAME.to_string(), Value::String(new.to_string()));
            debug!("Updated NextAnimationName for '{}'.", clip.name);
            updated += 1;
        }
    }
    updated
}

/// Rename one clip; rejects names already used in its layer.
pub fn rename_clip(file: &mut AnimationFile, id: ClipId, new_name: &str) -> Result<RenameReport> {
    require_name(new_name)?;
    let clip = file
        .clip(id)
        .ok_or_else(|| TimelineError::InvalidOperation(format!("Unknown clip {id}.")))?;
    if clip.name == new_name {
        return Ok(RenameReport::default());
    }
    let key = clip.layer_key();
    let old_name = clip.name.clone();
    if clip_name_taken(file, &key, new_name, id) {
        return Err(TimelineError::conflict(
            NameKind::Clip,
            new_name,
            format!("layer '{key}'"),
        ));
    }

    if let Some(clip) = file.clip_mut(id) {
        clip.name = new_name.to_string();
    }
    info!("Renamed clip '{old_name}' to '{new_name}'.");
    let updated_references = retarget_next_animation(file, &key, &old_name, new_name);
    Ok(RenameReport {
        updated_references,
        updated_clips: 1,
    })
}

/// Rename a segment of an atom, rewriting every clip under it.
pub fn rename_segment(
    file: &mut AnimationFile,
    segment: &SegmentKey,
    new_name: &str,
) -> Result<RenameReport> {
    require_name(new_name)?;
    if segment.segment == new_name {
        return Ok(RenameReport::default());
    }
    if file
        .clips()
        .iter()
        .any(|c| c.atom_id == segment.atom_id && c.segment == new_name)
    {
        return Err(TimelineError::conflict(
            NameKind::Segment,
            new_name,
            format!("atom '{}'", segment.atom_id),
        ));
    }
    let mut report = RenameReport::default();
    for clip in file.clips_mut().filter(|c| c.in_segment(segment)) {
        clip.segment = new_name.to_string();
        report.updated_clips += 1;
    }
    info!("Renamed segment '{}' to '{new_name}'.", segment.segment);
    Ok(report)
}

/// Rename a layer of a segment, rewriting every clip under it.
pub fn rename_layer(file: &mut AnimationFile, layer: &LayerKey, new_name: &str) -> Result<RenameReport> {
    require_name(new_name)?;
    if layer.layer == new_name {
        return Ok(RenameReport::default());
    }
    let segment = layer.segment_key();
    if file
        .clips()
        .iter()
        .any(|c| c.in_segment(&segment) && c.layer == new_name)
    {
        return Err(TimelineError::conflict(
            NameKind::Layer,
            new_name,
            format!("segment '{segment}'"),
        ));
    }
    let mut report = RenameReport::default();
    for clip in file.clips_mut().filter(|c| c.in_layer(layer)) {
        clip.layer = new_name.to_string();
        report.updated_clips += 1;
    }
    info!("Renamed layer '{}' to '{new_name}'.", layer.layer);
    Ok(report)
}

/// Rename several clips at once. Clips whose new name is taken are skipped.
pub fn batch_rename_clips(file: &mut AnimationFile, ids: &[ClipId], rule: &BatchRename) -> BatchRenameReport {
    let mut report = BatchRenameReport::default();
    for &id in ids {
        let Some(clip) = file.clip(id) else {
            continue;
        };
        let old_name = clip.name.clone();
        let new_name = rule.apply(&old_name);
        if new_name == old_name {
            continue;
        }
        let key = clip.layer_key();
        if new_name.is_empty() || clip_name_taken(file, &key, &new_name, id) {
            warn!("SKIPPED rename for '{old_name}' due to name conflict.");
            report.skipped.push(old_name);
            continue;
        }
        if let Some(clip) = file.clip_mut(id) {
            clip.name = new_name.clone();
        }
        report.updated_references += retarget_next_animation(file, &key, &old_name, &new_name);
        report.renamed.push((old_name, new_name));
    }
    if !report.renamed.is_empty() {
        info!("Batch renamed {} clip(s).", report.renamed.len());
    }
    report
}

/// Remove every clip matched by any entry of `targets`; returns the count.
pub fn delete_items(file: &mut AnimationFile, targets: &[DeleteTarget]) -> usize {
    let mut segments = HashSet::new();
    let mut layers = HashSet::new();
    let mut clips = HashSet::new();
    for target in targets {
        match target {
            DeleteTarget::Segment(key) => {
                segments.insert(key.clone());
            }
            DeleteTarget::Layer(key) => {
                layers.insert(key.clone());
            }
            DeleteTarget::Clip(id) => {
                clips.insert(*id);
            }
        }
    }
    if segments.is_empty() && layers.is_empty() && clips.is_empty() {
        return 0;
    }

    let before = file.len();
    file.retain(|c| {
        !(clips.contains(&c.id())
            || segments.contains(&c.segment_key())
            || layers.contains(&c.layer_key()))
    });
    let deleted = before - file.len();
    info!("Deleted {deleted} clip(s).");
    deleted
}

/// Copy a clip into its own layer as `{name} (copy)`, `{name} (copy 2)`, ...
pub fn duplicate_clip(file: &mut AnimationFile, id: ClipId) -> Result<ClipId> {
    let original = file
        .clip(id)
        .ok_or_else(|| TimelineError::InvalidOperation(format!("Unknown clip {id}.")))?;
    let taken = file.clip_names(&original.layer_key());
    let base = original.name.clone();
    let mut name = format!("{base} (copy)");
    let mut counter = 2u32;
    while taken.contains(&name) {
        name = format!("{base} (copy {counter})");
        counter += 1;
    }

    let mut copy = original.clone();
    copy.name = name.clone();
    copy.order_index = file.max_order_index() + 1;
    let new_id = file.push(copy);
    info!("Duplicated '{base}' as '{name}'.");
    Ok(new_id)
}

/// Start a new segment in `atom_id` holding a single placeholder clip.
pub fn create_segment(file: &mut AnimationFile, atom_id: &str, name: &str) -> Result<ClipId> {
    require_name(name)?;
    if file
        .clips()
        .iter()
        .any(|c| c.atom_id == atom_id && c.segment == name)
    {
        return Err(TimelineError::conflict(
            NameKind::Segment,
            name,
            format!("atom '{atom_id}'"),
        ));
    }
    let mut clip = Clip::new("New Animation", name, "Main", 1.0).with_atom(atom_id);
    clip.order_index = file.max_order_index() + 1;
    let id = file.push(clip);
    info!("Created segment '{name}'.");
    Ok(id)
}
