//! Error taxonomy for the optimization loop
//!
//! Two layers, mirroring how failures propagate:
//! - [`StageError`]: recoverable at unit/variant granularity; the
//!   controller downgrades these to recorded failures and keeps going
//! - [`RunError`]: fatal for the whole run, reported once

use std::path::PathBuf;

/// Stage where a collaborator call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Bottleneck analysis
    Analyze,
    /// Variant generation
    Generate,
    /// Variant compilation
    Compile,
    /// Profile collection
    Profile,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageKind::Analyze => "analyze",
            StageKind::Generate => "generate",
            StageKind::Compile => "compile",
            StageKind::Profile => "profile",
        };
        write!(f, "{s}")
    }
}

/// Recoverable failure of one unit of work (a variant, or one unit's
/// iteration). Never aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Collaborator exceeded its time budget
    #[error("{stage} collaborator timed out after {timeout_secs}s")]
    CollaboratorTimeout {
        /// Stage that timed out
        stage: StageKind,
        /// Budget that was exceeded
        timeout_secs: u64,
    },

    /// Collaborator returned an error (compile failure, malformed output)
    #[error("{stage} collaborator failed: {message}")]
    CollaboratorFailure {
        /// Stage that failed
        stage: StageKind,
        /// Collaborator-provided detail
        message: String,
    },

    /// Variant could not be written to its isolated directory
    #[error("materialization failed: {0}")]
    MaterializationFailure(String),

    /// Collector ran but produced no attributable samples
    #[error("profile unavailable: {0}")]
    ProfileUnavailable(String),

    /// Profiles could not be meaningfully compared
    #[error("comparison indeterminate: {0}")]
    ComparisonIndeterminate(String),
}

impl StageError {
    /// Whether this failure came from a collaborator time budget
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CollaboratorTimeout { .. })
    }

    /// Stage associated with the failure, when one applies
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Self::CollaboratorTimeout { stage, .. } | Self::CollaboratorFailure { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}

/// Fatal run-level failure
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Output root cannot be created or written at all
    #[error("output root not writable: {path}: {source}")]
    OutputRootUnavailable {
        /// The root that was rejected
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// No source units were supplied
    #[error("run contains no source units")]
    NoUnits,
}
