//! Summaries returned by engine operations. Hosts show them or log them;
//! nothing in the core reads them back.

use serde::Serialize;

use crate::ids::ClipId;
use crate::model::LayerKey;

/// Result of merging one layer into another within a segment.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LayerMergeReport {
    /// Source clips with no same-named target clip, reparented as-is.
    pub moved_clips: usize,
    /// Source clips folded into a same-named target clip and removed.
    pub merged_clips: usize,
    /// `(clip name, old group name, new group name)` for renamed trigger groups.
    pub renamed_trigger_groups: Vec<(String, String, String)>,
    /// Targets synthesized so every clip of the target layer animates the same set.
    pub harmonized_targets: usize,
}

/// Where the clips of one source layer ended up during a file import.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerPlacement {
    pub segment: String,
    pub source_layer: String,
    pub target_layer: String,
    /// True when an existing layer with an equal signature was reused.
    pub reused: bool,
}

/// Result of importing clips from another export.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FileMergeReport {
    pub added: usize,
    pub skipped: Vec<String>,
    pub replaced: Vec<String>,
    /// `(incoming name, stored name)`.
    pub renamed: Vec<(String, String)>,
    pub placements: Vec<LayerPlacement>,
}

/// Result of a move or copy of clips into a layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransferReport {
    /// Layer the clips landed in after compatible-layer discovery.
    pub target: String,
    pub reused_compatible_layer: bool,
    pub transferred: Vec<ClipId>,
    pub skipped: Vec<ClipId>,
    pub replaced: Vec<String>,
    pub renamed: Vec<(String, String)>,
}

impl TransferReport {
    pub(crate) fn new(target: &LayerKey) -> Self {
        Self {
            target: target.to_string(),
            reused_compatible_layer: false,
            transferred: Vec::new(),
            skipped: Vec::new(),
            replaced: Vec::new(),
            renamed: Vec::new(),
        }
    }
}

/// Per-clip failure inside a position delta batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClipFailure {
    pub clip: ClipId,
    pub name: String,
    pub reason: String,
}

/// Result of applying a position delta to a batch of clips.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeltaReport {
    pub delta: [f32; 3],
    /// Clips that completed without error.
    pub processed: usize,
    pub failures: Vec<ClipFailure>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RenameReport {
    /// Clips whose NextAnimationName followed the rename.
    pub updated_references: usize,
    /// Clips whose segment or layer field was rewritten.
    pub updated_clips: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchRenameReport {
    /// `(old name, new name)`.
    pub renamed: Vec<(String, String)>,
    /// Names left alone because the new name was taken.
    pub skipped: Vec<String>,
    pub updated_references: usize,
}
