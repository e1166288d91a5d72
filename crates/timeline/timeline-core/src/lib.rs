//! Timeline Core (host-agnostic)
//!
//! Reads Timeline animation exports and scenes, and restructures them:
//! keyframe token codec, layer and file merges, move/copy/reorder of clips,
//! renames, and positional root offsets. A host UI drives everything through
//! [`Editor`] or calls the module functions on an [`AnimationFile`] directly.

pub mod codec;
pub mod config;
pub mod document;
pub mod edit;
pub mod editor;
pub mod error;
pub mod ids;
pub mod merge;
pub mod model;
pub mod report;
pub mod signature;
pub mod transform;

// Re-exports for hosts
pub use codec::{decode_keyframe, encode_keyframe, KeyframeSample, KeyframeState};
pub use config::Config;
pub use edit::{BatchRename, DeleteTarget};
pub use editor::Editor;
pub use error::{ErrorKind, NameKind, Result, TimelineError};
pub use ids::ClipId;
pub use merge::{
    CollisionResolution, CollisionResolver, ConflictStrategy, DropPlacement, NameCollision,
    TransferMode,
};
pub use model::{
    AnimationFile, Axis, Clip, ControllerTarget, FileKind, FloatParamTarget, LayerKey,
    SegmentKey, TriggerGroupTarget, STANDALONE_ATOM_ID,
};
pub use report::{
    BatchRenameReport, DeltaReport, FileMergeReport, LayerMergeReport, RenameReport,
    TransferReport,
};
pub use signature::LayerSignature;
