//! Error types for timeline editing and merging.

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TimelineError>;

/// What kind of name collided when a rename or insertion was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameKind {
    Clip,
    Layer,
    Segment,
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NameKind::Clip => "clip",
            NameKind::Layer => "layer",
            NameKind::Segment => "segment",
        })
    }
}

/// Coarse classification callers branch on; the detail lives in the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedToken,
    InvalidOperation,
    MergeError,
    NameConflict,
    Document,
    Io,
}

/// Errors produced by the codec, the merge engine and the document layer.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum TimelineError {
    /// Keyframe token is empty, truncated, or not valid hex.
    #[error("Malformed keyframe token '{token}': {reason}")]
    MalformedToken { token: String, reason: String },

    /// Operation is not defined for the given inputs.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Cross-file import rejected before anything was touched.
    #[error("Merge failed: {0}")]
    MergeError(String),

    /// A rename or insertion would break name uniqueness in its scope.
    #[error("A {kind} named '{name}' already exists in {scope}")]
    NameConflict {
        kind: NameKind,
        name: String,
        scope: String,
    },

    /// Center-root could not find any root controller on the first clip.
    #[error("Clip '{clip}' has no root controller (tried: {})", candidates.join(", "))]
    MissingRootController {
        clip: String,
        candidates: Vec<String>,
    },

    #[error("No animation file is loaded")]
    NoFileLoaded,

    /// JSON parsed but does not look like an animation export or scene.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TimelineError {
    pub(crate) fn malformed(token: &str, reason: impl Into<String>) -> Self {
        Self::MalformedToken {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn conflict(kind: NameKind, name: &str, scope: impl Into<String>) -> Self {
        Self::NameConflict {
            kind,
            name: name.to_string(),
            scope: scope.into(),
        }
    }

    /// Spec-level kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedToken { .. } => ErrorKind::MalformedToken,
            Self::InvalidOperation(_) | Self::MissingRootController { .. } | Self::NoFileLoaded => {
                ErrorKind::InvalidOperation
            }
            Self::MergeError(_) => ErrorKind::MergeError,
            Self::NameConflict { .. } => ErrorKind::NameConflict,
            Self::InvalidDocument(_) | Self::Json(_) => ErrorKind::Document,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Get error category for logging.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::MalformedToken { .. } => "codec",
            Self::MergeError(_) => "merge",
            Self::InvalidOperation(_)
            | Self::NameConflict { .. }
            | Self::MissingRootController { .. }
            | Self::NoFileLoaded => "edit",
            Self::InvalidDocument(_) | Self::Json(_) => "document",
            Self::Io { .. } => "io",
        }
    }
}
