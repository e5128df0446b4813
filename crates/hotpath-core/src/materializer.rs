//! Variant materializer
//!
//! Writes each candidate patch of a sibling batch into its own isolated
//! subdirectory so later compile/profile stages never share a working
//! tree. One patch's write failure is recorded and never blocks the rest
//! of the batch.

use crate::types::{CandidatePatch, VariantId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of writing one candidate patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteStatus {
    /// File written, path is valid
    Success,
    /// Write failed, error carries the reason
    Failed,
}

/// One candidate patch bound to a filesystem location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializedVariant {
    /// Identifier of the source patch
    pub id: VariantId,
    /// Written file path (`None` on failure)
    pub path: Option<PathBuf>,
    /// Write outcome
    pub status: WriteStatus,
    /// Failure reason (`None` on success)
    pub error: Option<String>,
}

impl MaterializedVariant {
    /// Whether this variant can proceed to later stages
    #[inline]
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.status == WriteStatus::Success && self.path.is_some()
    }

    /// Directory the variant file lives in, when usable
    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }
}

/// Writes sibling batches into isolated per-variant directories
///
/// Directory layout: `<root>/<filesystem-safe id>/<target filename>`.
/// Re-running over the same root overwrites in place; directory creation
/// is idempotent.
#[derive(Debug, Clone)]
pub struct VariantMaterializer {
    root: PathBuf,
    target_filename: String,
}

impl VariantMaterializer {
    /// Create a materializer rooted at `root` writing `target_filename`
    /// inside each variant directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, target_filename: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            target_filename: target_filename.into(),
        }
    }

    /// Root directory variants are written under
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write every patch in the batch, one record per input patch
    ///
    /// The output length always equals the input length; I/O errors are
    /// downgraded to failed-status records and never raised.
    #[must_use]
    pub fn materialize(&self, batch: &[CandidatePatch]) -> Vec<MaterializedVariant> {
        batch.iter().map(|patch| self.write_one(patch)).collect()
    }

    fn write_one(&self, patch: &CandidatePatch) -> MaterializedVariant {
        let dir = self.root.join(patch.id.filesystem_safe());
        let path = dir.join(&self.target_filename);

        let outcome = fs::create_dir_all(&dir).and_then(|()| fs::write(&path, &patch.replacement));
        match outcome {
            Ok(()) => {
                tracing::debug!(variant = %patch.id, path = %path.display(), "variant written");
                MaterializedVariant {
                    id: patch.id.clone(),
                    path: Some(path),
                    status: WriteStatus::Success,
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!(variant = %patch.id, %err, "variant write failed");
                MaterializedVariant {
                    id: patch.id.clone(),
                    path: None,
                    status: WriteStatus::Failed,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
