//! Core types for the optimization loop
//!
//! Defines the entities the controller threads through its stages:
//! - Source units and their immutable per-iteration snapshots
//! - Bottleneck reports and candidate patches
//! - Run identity and configuration

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ulid::Ulid;

/// Unique run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a source unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// Translation unit with code to optimize
    Implementation,
    /// Declarations included elsewhere
    Header,
}

impl UnitKind {
    /// Infer the kind from a path's extension
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("h" | "hpp" | "hxx" | "hh") => UnitKind::Header,
            _ => UnitKind::Implementation,
        }
    }
}

/// One source file tracked independently through the loop
///
/// Identity is the file path; the text is an immutable snapshot. A new
/// snapshot is produced only when a winning variant is promoted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Path identifying the unit
    pub path: PathBuf,
    /// Raw text content of this snapshot
    pub text: String,
    /// Unit kind
    pub kind: UnitKind,
}

impl SourceUnit {
    /// Create a unit, inferring the kind from the path
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let path = path.into();
        let kind = UnitKind::from_path(&path);
        Self {
            path,
            text: text.into(),
            kind,
        }
    }

    /// File name component of the unit path
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unit".to_string())
    }

    /// File stem used for audit-tree directory names
    #[must_use]
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unit".to_string())
    }

    /// New snapshot of the same unit with replacement text
    #[must_use]
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            path: self.path.clone(),
            text: text.into(),
            kind: self.kind,
        }
    }

    /// Content fingerprint recorded alongside audit snapshots
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.text.as_bytes());
        hex::encode(digest)
    }
}

/// Diagnosed location and cause of a performance problem
///
/// One per (unit, iteration); owned by the iteration that created it and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleneckReport {
    /// Symbol or file:line descriptor
    pub location: String,
    /// Category tag, e.g. "cpu-bound inner loop"
    pub category: String,
    /// Free-text hypothesis about the cause
    pub hypothesis: String,
}

impl BottleneckReport {
    /// Create a report
    #[inline]
    #[must_use]
    pub fn new(
        location: impl Into<String>,
        category: impl Into<String>,
        hypothesis: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            category: category.into(),
            hypothesis: hypothesis.into(),
        }
    }
}

/// Identifier of one candidate within its generating batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantId(String);

impl VariantId {
    /// Wrap a raw identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier as produced by the generator
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe transform used for variant directory names
    ///
    /// Lowercases and maps every non-alphanumeric run to a single `_`,
    /// so "Variant 1" and "variant__1" land in the same directory.
    #[must_use]
    pub fn filesystem_safe(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        let mut last_was_sep = false;
        for c in self.0.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
                last_was_sep = false;
            } else if !last_was_sep && !out.is_empty() {
                out.push('_');
                last_was_sep = true;
            }
        }
        while out.ends_with('_') {
            out.pop();
        }
        if out.is_empty() {
            out.push_str("variant");
        }
        out
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proposed full replacement for a source unit's text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePatch {
    /// Identifier unique within the generating batch
    pub id: VariantId,
    /// Complete replacement text for the unit
    pub replacement: String,
    /// Free-text rationale from the generator
    pub rationale: String,
}

impl CandidatePatch {
    /// Create a patch
    #[inline]
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        replacement: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            id: VariantId::new(id),
            replacement: replacement.into(),
            rationale: rationale.into(),
        }
    }
}

/// Run-level configuration for the controller
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Iteration budget per source unit
    pub iterations: usize,
    /// Root of the per-run audit tree
    pub output_root: PathBuf,
    /// Bound on concurrent variant compile+profile tasks
    pub max_profile_workers: usize,
    /// Timeout applied to every collaborator call
    pub stage_timeout: Duration,
    /// Arguments passed to profiled executables
    pub binary_args: Vec<String>,
}

impl RunConfig {
    /// Create a configuration for `output_root`
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            iterations: 1,
            output_root: output_root.into(),
            max_profile_workers: 4,
            stage_timeout: Duration::from_secs(300),
            binary_args: Vec::new(),
        }
    }

    /// With iteration budget
    #[inline]
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// With worker bound for variant profiling
    #[inline]
    #[must_use]
    pub fn with_max_profile_workers(mut self, workers: usize) -> Self {
        self.max_profile_workers = workers.max(1);
        self
    }

    /// With collaborator timeout
    #[inline]
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// With arguments for the profiled executable
    #[inline]
    #[must_use]
    pub fn with_binary_args(mut self, args: Vec<String>) -> Self {
        self.binary_args = args;
        self
    }
}
