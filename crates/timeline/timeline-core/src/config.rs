//! Core configuration for timeline-core.

use serde::{Deserialize, Serialize};

/// Document and editing knobs. Numeric tolerances are fixed by the file
/// format and are not part of this.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Substring identifying animation plugin storables inside a scene.
    pub plugin_storable_marker: String,
    /// Root controller ids tried in order by center-root.
    pub root_controller_candidates: Vec<String>,
    /// Spaces per indentation level when writing documents.
    pub output_indent: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugin_storable_marker: "_VamTimeline.AtomPlugin".to_string(),
            root_controller_candidates: vec![
                "control".to_string(),
                "hipControl".to_string(),
                "pelvisControl".to_string(),
            ],
            output_indent: 3,
        }
    }
}
