//! Editing session around one loaded document.
//!
//! `Editor` owns the file, remembers where it came from and whether it has
//! unsaved changes. Every engine operation is reachable through a wrapper
//! that fails with `NoFileLoaded` when nothing is open and marks the session
//! dirty when the operation changed something.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::Config;
use crate::document;
use crate::edit::{self, BatchRename, DeleteTarget};
use crate::error::{Result, TimelineError};
use crate::ids::ClipId;
use crate::merge::{
    self, CollisionResolver, ConflictStrategy, DropPlacement, TransferMode,
};
use crate::model::{AnimationFile, LayerKey, SegmentKey, STANDALONE_ATOM_ID};
use crate::report::{
    BatchRenameReport, DeltaReport, FileMergeReport, LayerMergeReport, RenameReport,
    TransferReport,
};
use crate::transform;

#[derive(Debug, Default)]
pub struct Editor {
    config: Config,
    file: Option<AnimationFile>,
    path: Option<PathBuf>,
    dirty: bool,
    /// `(x, z)` applied by the last Center-root, for prefilling a manual offset.
    last_center_root_delta_xz: Option<(f32, f32)>,
}

impl Editor {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn file(&self) -> Option<&AnimationFile> {
        self.file.as_ref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_center_root_delta_xz(&self) -> Option<(f32, f32)> {
        self.last_center_root_delta_xz
    }

    /// Window title: the file name, with ` *` while there are unsaved edits.
    pub fn title(&self) -> String {
        let name = match (&self.path, &self.file) {
            (Some(path), _) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            (None, Some(_)) => "Untitled".to_string(),
            (None, None) => return "No file loaded".to_string(),
        };
        if self.dirty {
            format!("{name} *")
        } else {
            name
        }
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TimelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = document::parse_str(&text, &self.config)?;
        info!("Loaded '{}' with {} clip(s).", path.display(), file.len());
        self.replace_file(file, Some(path.to_path_buf()));
        Ok(())
    }

    /// Load document text that has no backing path.
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        let file = document::parse_str(text, &self.config)?;
        self.replace_file(file, None);
        Ok(())
    }

    fn replace_file(&mut self, file: AnimationFile, path: Option<PathBuf>) {
        self.file = Some(file);
        self.path = path;
        self.dirty = false;
        self.last_center_root_delta_xz = None;
    }

    /// Write the document to `path`, which becomes the session path.
    pub fn save_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = self.file.as_ref().ok_or(TimelineError::NoFileLoaded)?;
        let text = document::to_string_pretty(file, &self.config)?;
        fs::write(path, text).map_err(|source| TimelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved '{}'.", path.display());
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    /// Write back to the path the document was loaded from.
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or_else(|| {
            TimelineError::InvalidOperation("The document has no file path yet.".into())
        })?;
        self.save_file(path)
    }

    /// Current document text, as `save_file` would write it.
    pub fn to_json_string(&self) -> Result<String> {
        let file = self.file.as_ref().ok_or(TimelineError::NoFileLoaded)?;
        document::to_string_pretty(file, &self.config)
    }

    /// Run `op` on the loaded file. The session turns dirty when `changed`
    /// holds for the result.
    fn commit<T>(
        &mut self,
        op: impl FnOnce(&mut AnimationFile, &Config) -> Result<T>,
        changed: impl FnOnce(&T) -> bool,
    ) -> Result<T> {
        let file = self.file.as_mut().ok_or(TimelineError::NoFileLoaded)?;
        let out = op(file, &self.config)?;
        if changed(&out) {
            self.dirty = true;
        }
        Ok(out)
    }

    // ----- import -----

    /// Import every clip of the export at `path`.
    pub fn merge_file(
        &mut self,
        path: impl AsRef<Path>,
        strategy: ConflictStrategy,
    ) -> Result<FileMergeReport> {
        let path = path.as_ref();
        if self.file.is_none() {
            return Err(TimelineError::NoFileLoaded);
        }
        let text = fs::read_to_string(path).map_err(|e| {
            TimelineError::MergeError(format!(
                "Could not read source file '{}': {e}",
                path.display()
            ))
        })?;
        self.merge_str(&text, strategy)
    }

    /// Import every clip of an export given as text.
    pub fn merge_str(&mut self, text: &str, strategy: ConflictStrategy) -> Result<FileMergeReport> {
        if self.file.is_none() {
            return Err(TimelineError::NoFileLoaded);
        }
        let source = document::parse_str(text, &self.config).map_err(|e| {
            TimelineError::MergeError(format!("Could not parse source file: {e}"))
        })?;
        self.commit(
            |file, _| merge::merge_file(file, &source, strategy),
            |report| report.added > 0,
        )
    }

    // ----- structure -----

    pub fn merge_layers(&mut self, source: &LayerKey, target: &LayerKey) -> Result<LayerMergeReport> {
        self.commit(|file, _| merge::merge_layers(file, source, target), |_| true)
    }

    pub fn transfer_clips(
        &mut self,
        clips: &[ClipId],
        target: &LayerKey,
        mode: TransferMode,
        resolver: &mut dyn CollisionResolver,
    ) -> Result<TransferReport> {
        self.commit(
            |file, _| merge::transfer_clips(file, clips, target, mode, resolver),
            |report| !report.transferred.is_empty(),
        )
    }

    pub fn reorder_clips(
        &mut self,
        layer: &LayerKey,
        dragged: &[ClipId],
        anchor: Option<ClipId>,
        placement: DropPlacement,
    ) -> Result<usize> {
        self.commit(
            |file, _| Ok(merge::reorder_clips(file, layer, dragged, anchor, placement)),
            |moved| *moved > 0,
        )
    }

    pub fn delete_items(&mut self, targets: &[DeleteTarget]) -> Result<usize> {
        self.commit(|file, _| Ok(edit::delete_items(file, targets)), |removed| *removed > 0)
    }

    pub fn duplicate_clip(&mut self, id: ClipId) -> Result<ClipId> {
        self.commit(|file, _| edit::duplicate_clip(file, id), |_| true)
    }

    /// New segment under `atom_id`, or under the first atom of the file.
    pub fn create_segment(&mut self, atom_id: Option<&str>, name: &str) -> Result<ClipId> {
        self.commit(
            |file, _| {
                let atom = match atom_id {
                    Some(atom) => atom.to_string(),
                    None => file
                        .atoms()
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| STANDALONE_ATOM_ID.to_string()),
                };
                edit::create_segment(file, &atom, name)
            },
            |_| true,
        )
    }

    // ----- names -----

    pub fn rename_clip(&mut self, id: ClipId, new_name: &str) -> Result<RenameReport> {
        self.commit(|file, _| edit::rename_clip(file, id, new_name), |report| report.updated_clips > 0)
    }

    pub fn rename_segment(&mut self, segment: &SegmentKey, new_name: &str) -> Result<RenameReport> {
        self.commit(|file, _| edit::rename_segment(file, segment, new_name), |report| report.updated_clips > 0)
    }

    pub fn rename_layer(&mut self, layer: &LayerKey, new_name: &str) -> Result<RenameReport> {
        self.commit(|file, _| edit::rename_layer(file, layer, new_name), |report| report.updated_clips > 0)
    }

    pub fn batch_rename_clips(&mut self, ids: &[ClipId], rule: &BatchRename) -> Result<BatchRenameReport> {
        self.commit(
            |file, _| Ok(edit::batch_rename_clips(file, ids, rule)),
            |report| !report.renamed.is_empty(),
        )
    }

    // ----- positions -----

    /// Recenter the selection horizontally on the root of its first clip.
    pub fn center_root(&mut self, ids: &[ClipId]) -> Result<DeltaReport> {
        let (selected, report) = self.commit(
            |file, config| {
                let mut clips = file.select_mut(ids);
                Ok((!clips.is_empty(), transform::center_root(&mut clips, config)?))
            },
            |(_, report)| report.processed > 0,
        )?;
        if selected {
            self.last_center_root_delta_xz = Some((report.delta[0], report.delta[2]));
        }
        Ok(report)
    }

    /// Shift the selection by a manual `(x, y, z)` offset.
    pub fn move_root_by_offset(&mut self, ids: &[ClipId], delta: [f32; 3]) -> Result<DeltaReport> {
        self.commit(
            |file, _| {
                let report = transform::apply_position_delta(file.select_mut(ids), delta);
                info!(
                    "Manual root offset finished. Processed {} clip(s).",
                    report.processed
                );
                Ok(report)
            },
            |report| report.processed > 0,
        )
    }
}
