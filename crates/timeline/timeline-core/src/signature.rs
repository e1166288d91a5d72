//! Layer signatures: the set of targets a layer animates, used to decide
//! whether two layers are structurally compatible.

use std::collections::BTreeSet;

use crate::model::{AnimationFile, Clip, LayerKey, SegmentKey};

/// Target identities of a layer. Compared for exact set equality only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayerSignature {
    pub float_params: BTreeSet<(String, String)>,
    pub controllers: BTreeSet<String>,
    pub trigger_groups: BTreeSet<String>,
}

impl LayerSignature {
    /// Signature over a snapshot of clips; no clips gives three empty sets.
    pub fn of<'a>(clips: impl IntoIterator<Item = &'a Clip>) -> Self {
        let mut sig = Self::default();
        for clip in clips {
            sig.float_params
                .extend(clip.float_params.iter().map(|p| p.key()));
            sig.controllers
                .extend(clip.controllers.iter().map(|c| c.id.clone()));
            sig.trigger_groups
                .extend(clip.trigger_groups.iter().map(|g| g.name.clone()));
        }
        sig
    }

    /// Signature of one layer of `file`.
    pub fn of_layer(file: &AnimationFile, key: &LayerKey) -> Self {
        Self::of(file.clips().iter().filter(|c| c.in_layer(key)))
    }

    pub fn is_empty(&self) -> bool {
        self.float_params.is_empty() && self.controllers.is_empty() && self.trigger_groups.is_empty()
    }

    pub fn is_compatible(&self, other: &LayerSignature) -> bool {
        self == other
    }
}

/// First layer of `segment` (by name, lexicographic) whose signature equals
/// `signature`.
pub fn find_compatible_layer(
    file: &AnimationFile,
    segment: &SegmentKey,
    signature: &LayerSignature,
) -> Option<String> {
    file.layer_names(segment)
        .into_iter()
        .find(|layer| LayerSignature::of_layer(file, &segment.layer(layer.as_str())) == *signature)
}

/// `base` if unused in `segment`, else the first free `base_1`, `base_2`, ...
pub fn unused_layer_name(file: &AnimationFile, segment: &SegmentKey, base: &str) -> String {
    let taken = file.layer_names(segment);
    if !taken.contains(base) {
        return base.to_string();
    }
    (1u32..)
        .map(|n| format!("{base}_{n}"))
        .find(|name| !taken.contains(name))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControllerTarget, FloatParamTarget, TriggerGroupTarget};

    fn clip_with(controller: &str) -> Clip {
        let mut clip = Clip::new("c", "S", "L", 1.0);
        clip.controllers.push(ControllerTarget::new(controller));
        clip
    }

    #[test]
    fn empty_layer_has_empty_signature() {
        let sig = LayerSignature::of(std::iter::empty());
        assert!(sig.is_empty());
        assert_eq!(sig, LayerSignature::default());
    }

    #[test]
    fn signature_unions_all_clips() {
        let mut a = clip_with("hipControl");
        a.float_params.push(FloatParamTarget::new("geom", "morph"));
        let mut b = clip_with("headControl");
        b.trigger_groups.push(TriggerGroupTarget::new("Audio 1", "1"));
        let sig = LayerSignature::of([&a, &b]);
        assert_eq!(sig.controllers.len(), 2);
        assert!(sig
            .float_params
            .contains(&("geom".to_string(), "morph".to_string())));
        assert!(sig.trigger_groups.contains("Audio 1"));
    }

    #[test]
    fn subset_is_not_compatible() {
        let a = clip_with("hipControl");
        let mut b = clip_with("hipControl");
        b.controllers.push(ControllerTarget::new("headControl"));
        let sa = LayerSignature::of([&a]);
        let sb = LayerSignature::of([&b]);
        assert!(!sa.is_compatible(&sb));
        assert!(sa.is_compatible(&LayerSignature::of([&clip_with("hipControl")])));
    }

    #[test]
    fn compatible_layer_ties_break_by_name() {
        let mut file = AnimationFile::standalone(None, None);
        for layer in ["Zeta", "Alpha", "Mid"] {
            let mut clip = clip_with("hipControl");
            clip.layer = layer.to_string();
            file.push(clip);
        }
        let seg = SegmentKey::new(crate::model::STANDALONE_ATOM_ID, "S");
        let sig = LayerSignature::of([&clip_with("hipControl")]);
        assert_eq!(find_compatible_layer(&file, &seg, &sig).as_deref(), Some("Alpha"));
    }

    #[test]
    fn unused_layer_name_appends_counter() {
        let mut file = AnimationFile::standalone(None, None);
        file.push(Clip::new("a", "S", "Main", 1.0));
        file.push(Clip::new("b", "S", "Main_1", 1.0));
        let seg = SegmentKey::new(crate::model::STANDALONE_ATOM_ID, "S");
        assert_eq!(unused_layer_name(&file, &seg, "Main"), "Main_2");
        assert_eq!(unused_layer_name(&file, &seg, "Other"), "Other");
    }
}
