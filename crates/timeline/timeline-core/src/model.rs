//! In-memory animation model: atoms, segments and layers are never stored as
//! nodes, they are derived by grouping the flat clip list of an AnimationFile.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec;
use crate::ids::{ClipId, IdAllocator};

/// Atom id given to every clip of a standalone export.
pub const STANDALONE_ATOM_ID: &str = "(Standalone)";

/// Other-properties key holding the follow-up clip name.
pub const NEXT_ANIMATION_NAME: &str = "NextAnimationName";

/// Open-ended JSON properties preserved verbatim.
pub type JsonMap = serde_json::Map<String, Value>;

/// Controller curve channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    RotX,
    RotY,
    RotZ,
    RotW,
}

impl Axis {
    pub const ALL: [Axis; 7] = [
        Axis::X,
        Axis::Y,
        Axis::Z,
        Axis::RotX,
        Axis::RotY,
        Axis::RotZ,
        Axis::RotW,
    ];

    pub const POSITION: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// JSON key of this axis inside a controller entry.
    pub fn key(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
            Axis::RotX => "RotX",
            Axis::RotY => "RotY",
            Axis::RotZ => "RotZ",
            Axis::RotW => "RotW",
        }
    }

    pub fn from_key(key: &str) -> Option<Axis> {
        Axis::ALL.into_iter().find(|a| a.key() == key)
    }
}

/// Keyframed float parameter of a storable. Identity is `(storable, name)`.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatParamTarget {
    pub storable: String,
    pub name: String,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub keyframes: Vec<String>,
}

impl FloatParamTarget {
    pub fn new(storable: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            storable: storable.into(),
            name: name.into(),
            min: None,
            max: None,
            keyframes: Vec::new(),
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.storable.clone(), self.name.clone())
    }

    pub fn matches(&self, storable: &str, name: &str) -> bool {
        self.storable == storable && self.name == name
    }
}

/// Transform controller with one keyframe curve per axis.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerTarget {
    pub id: String,
    /// Only axes present in the document; absent axes are written as `[]`.
    pub axis_curves: BTreeMap<Axis, Vec<String>>,
    pub extra: JsonMap,
}

impl ControllerTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            axis_curves: BTreeMap::new(),
            extra: JsonMap::new(),
        }
    }

    /// Controller at rest for `length` seconds: zero position and rotation,
    /// identity quaternion on RotW.
    pub fn at_rest(id: impl Into<String>, extra: JsonMap, length: f32) -> Self {
        let axis_curves = Axis::ALL
            .into_iter()
            .map(|axis| {
                let value = if axis == Axis::RotW { 1.0 } else { 0.0 };
                (axis, codec::flat_curve(length, value))
            })
            .collect();
        Self {
            id: id.into(),
            axis_curves,
            extra,
        }
    }

    pub fn curve(&self, axis: Axis) -> Option<&[String]> {
        self.axis_curves.get(&axis).map(Vec::as_slice)
    }

    /// Rotation controllers are never repositioned.
    pub fn is_rotation_only(&self) -> bool {
        self.id.ends_with("Rotation")
    }
}

/// Named group of triggers. Identity is `name`.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerGroupTarget {
    pub name: String,
    pub live: String,
    pub triggers: Vec<Value>,
}

impl TriggerGroupTarget {
    pub fn new(name: impl Into<String>, live: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            live: live.into(),
            triggers: Vec::new(),
        }
    }

    /// Group with a single action-less trigger covering `[0, length]`.
    pub fn spanning(name: impl Into<String>, live: impl Into<String>, length: f32) -> Self {
        let trigger = serde_json::json!({
            "startTime": "0",
            "endTime": format_decimal(length),
            "startActions": [],
            "transitionActions": [],
            "endActions": [],
        });
        Self {
            name: name.into(),
            live: live.into(),
            triggers: vec![trigger],
        }
    }
}

/// Address of a layer: the grouping key shared by its clips.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LayerKey {
    pub atom_id: String,
    pub segment: String,
    pub layer: String,
}

impl LayerKey {
    pub fn new(
        atom_id: impl Into<String>,
        segment: impl Into<String>,
        layer: impl Into<String>,
    ) -> Self {
        Self {
            atom_id: atom_id.into(),
            segment: segment.into(),
            layer: layer.into(),
        }
    }

    pub fn standalone(segment: impl Into<String>, layer: impl Into<String>) -> Self {
        Self::new(STANDALONE_ATOM_ID, segment, layer)
    }

    pub fn segment_key(&self) -> SegmentKey {
        SegmentKey::new(self.atom_id.clone(), self.segment.clone())
    }

    pub fn with_layer(&self, layer: impl Into<String>) -> Self {
        Self::new(self.atom_id.clone(), self.segment.clone(), layer)
    }
}

impl std::fmt::Display for LayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.atom_id, self.segment, self.layer)
    }
}

/// Address of a segment within an atom.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SegmentKey {
    pub atom_id: String,
    pub segment: String,
}

impl SegmentKey {
    pub fn new(atom_id: impl Into<String>, segment: impl Into<String>) -> Self {
        Self {
            atom_id: atom_id.into(),
            segment: segment.into(),
        }
    }

    pub fn layer(&self, layer: impl Into<String>) -> LayerKey {
        LayerKey::new(self.atom_id.clone(), self.segment.clone(), layer)
    }
}

impl std::fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.atom_id, self.segment)
    }
}

/// One animation take.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    pub(crate) id: ClipId,
    pub name: String,
    pub segment: String,
    pub layer: String,
    pub atom_id: String,
    /// Plugin storable the clip was read from (scene documents only).
    pub storable_id: Option<String>,
    /// Length in seconds.
    pub length: f32,
    /// Position within its layer.
    pub order_index: i64,
    pub other: JsonMap,
    pub float_params: Vec<FloatParamTarget>,
    pub controllers: Vec<ControllerTarget>,
    pub trigger_groups: Vec<TriggerGroupTarget>,
}

impl Clip {
    /// Standalone clip with no targets. The id is assigned when the clip is
    /// added to a file.
    pub fn new(
        name: impl Into<String>,
        segment: impl Into<String>,
        layer: impl Into<String>,
        length: f32,
    ) -> Self {
        Self {
            id: ClipId(u32::MAX),
            name: name.into(),
            segment: segment.into(),
            layer: layer.into(),
            atom_id: STANDALONE_ATOM_ID.to_string(),
            storable_id: None,
            length,
            order_index: 0,
            other: JsonMap::new(),
            float_params: Vec::new(),
            controllers: Vec::new(),
            trigger_groups: Vec::new(),
        }
    }

    pub fn with_atom(mut self, atom_id: impl Into<String>) -> Self {
        self.atom_id = atom_id.into();
        self
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn layer_key(&self) -> LayerKey {
        LayerKey::new(self.atom_id.clone(), self.segment.clone(), self.layer.clone())
    }

    pub fn segment_key(&self) -> SegmentKey {
        SegmentKey::new(self.atom_id.clone(), self.segment.clone())
    }

    pub fn in_layer(&self, key: &LayerKey) -> bool {
        self.atom_id == key.atom_id && self.segment == key.segment && self.layer == key.layer
    }

    pub fn in_segment(&self, key: &SegmentKey) -> bool {
        self.atom_id == key.atom_id && self.segment == key.segment
    }

    pub fn has_float_param(&self, storable: &str, name: &str) -> bool {
        self.float_params.iter().any(|p| p.matches(storable, name))
    }

    pub fn controller(&self, id: &str) -> Option<&ControllerTarget> {
        self.controllers.iter().find(|c| c.id == id)
    }

    pub fn has_controller(&self, id: &str) -> bool {
        self.controller(id).is_some()
    }

    pub fn has_trigger_group(&self, name: &str) -> bool {
        self.trigger_groups.iter().any(|g| g.name == name)
    }

    pub fn next_animation_name(&self) -> Option<&str> {
        self.other.get(NEXT_ANIMATION_NAME).and_then(Value::as_str)
    }
}

/// Standalone export or full scene.
#[derive(Clone, Debug, PartialEq)]
pub enum FileKind {
    Standalone {
        serialize_version: Option<Value>,
        atom_type: Option<String>,
    },
    /// The scene document as loaded; clips are written back into it on save.
    Scene { envelope: Value },
}

/// A loaded document: a flat clip list plus what is needed to write it back.
#[derive(Clone, Debug)]
pub struct AnimationFile {
    pub kind: FileKind,
    clips: Vec<Clip>,
    ids: IdAllocator,
}

impl AnimationFile {
    pub fn standalone(serialize_version: Option<Value>, atom_type: Option<String>) -> Self {
        Self {
            kind: FileKind::Standalone {
                serialize_version,
                atom_type,
            },
            clips: Vec::new(),
            ids: IdAllocator::new(),
        }
    }

    pub fn scene(envelope: Value) -> Self {
        Self {
            kind: FileKind::Scene { envelope },
            clips: Vec::new(),
            ids: IdAllocator::new(),
        }
    }

    pub fn is_scene(&self) -> bool {
        matches!(self.kind, FileKind::Scene { .. })
    }

    /// Atom type of a standalone export; scenes have none.
    pub fn atom_type(&self) -> Option<&str> {
        match &self.kind {
            FileKind::Standalone { atom_type, .. } => atom_type.as_deref(),
            FileKind::Scene { .. } => None,
        }
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Add a clip, assigning it a fresh id.
    pub fn push(&mut self, mut clip: Clip) -> ClipId {
        clip.id = self.ids.alloc_clip();
        let id = clip.id;
        self.clips.push(clip);
        id
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    pub fn remove(&mut self, id: ClipId) -> Option<Clip> {
        let pos = self.clips.iter().position(|c| c.id == id)?;
        Some(self.clips.remove(pos))
    }

    /// Mutable clips for `ids` in the order given; unknown ids are skipped.
    pub fn select_mut(&mut self, ids: &[ClipId]) -> Vec<&mut Clip> {
        let mut picked: Vec<&mut Clip> = self
            .clips
            .iter_mut()
            .filter(|c| ids.contains(&c.id))
            .collect();
        picked.sort_by_key(|c| ids.iter().position(|id| *id == c.id));
        picked
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&Clip) -> bool) {
        self.clips.retain(keep);
    }

    pub(crate) fn clips_mut(&mut self) -> impl Iterator<Item = &mut Clip> {
        self.clips.iter_mut()
    }

    pub fn find_clip(&self, key: &LayerKey, name: &str) -> Option<&Clip> {
        self.clips
            .iter()
            .find(|c| c.in_layer(key) && c.name == name)
    }

    /// All atom ids, sorted.
    pub fn atoms(&self) -> Vec<String> {
        collect_sorted(self.clips.iter().map(|c| c.atom_id.as_str()))
    }

    /// Segment names of an atom, sorted.
    pub fn segments(&self, atom_id: &str) -> Vec<String> {
        collect_sorted(
            self.clips
                .iter()
                .filter(|c| c.atom_id == atom_id)
                .map(|c| c.segment.as_str()),
        )
    }

    /// Layer names of a segment, sorted.
    pub fn layers(&self, segment: &SegmentKey) -> Vec<String> {
        self.layer_names(segment).into_iter().collect()
    }

    pub(crate) fn layer_names(&self, segment: &SegmentKey) -> BTreeSet<String> {
        self.clips
            .iter()
            .filter(|c| c.in_segment(segment))
            .map(|c| c.layer.clone())
            .collect()
    }

    /// Clips of a layer in play order.
    pub fn layer_clips(&self, key: &LayerKey) -> Vec<&Clip> {
        let mut clips: Vec<&Clip> = self.clips.iter().filter(|c| c.in_layer(key)).collect();
        clips.sort_by_key(|c| c.order_index);
        clips
    }

    pub fn layer_clip_ids(&self, key: &LayerKey) -> Vec<ClipId> {
        self.layer_clips(key).into_iter().map(|c| c.id).collect()
    }

    pub fn clip_names(&self, key: &LayerKey) -> BTreeSet<String> {
        self.clips
            .iter()
            .filter(|c| c.in_layer(key))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Highest order index in the file, -1 when empty.
    pub fn max_order_index(&self) -> i64 {
        self.clips.iter().map(|c| c.order_index).max().unwrap_or(-1)
    }

    pub fn max_layer_order_index(&self, key: &LayerKey) -> i64 {
        self.clips
            .iter()
            .filter(|c| c.in_layer(key))
            .map(|c| c.order_index)
            .max()
            .unwrap_or(-1)
    }
}

fn collect_sorted<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Decimal text for lengths and times, always with a fractional part.
pub fn format_decimal(v: f32) -> String {
    let text = format!("{v:?}");
    if text.contains(['.', 'e', 'E']) || !v.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}
