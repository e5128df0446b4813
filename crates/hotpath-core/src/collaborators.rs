//! Collaborator seams the controller drives
//!
//! The four external capabilities (compiling, profile collection,
//! bottleneck analysis, variant generation) are consumed through
//! async traits. Implementations live outside this crate (tool wrappers,
//! model clients); the scripted set used by tests and the simulator is in
//! [`crate::sim`] and `hotpath-test-utils`.
//!
//! Every call is treated as potentially slow: the controller wraps each
//! one in [`call_with_timeout`], and a timeout is a stage failure for the
//! affected unit/variant, never a run abort.

use crate::error::{StageError, StageKind};
use crate::types::{BottleneckReport, CandidatePatch, SourceUnit};
use hotpath_profile::PerformanceProfile;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Failure surfaced by a collaborator implementation
#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    /// Underlying tool failed (non-zero exit, malformed output, ...)
    #[error("{0}")]
    Tool(String),

    /// Profiler ran but attributed no samples
    #[error("no samples attributed: {0}")]
    NoSamples(String),

    /// I/O error talking to the tool
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Compiles a variant's source directory into an executable
#[async_trait::async_trait]
pub trait Compiler: Send + Sync {
    /// Compile `target_file` inside `source_dir`, returning the
    /// executable path.
    async fn compile(&self, source_dir: &Path, target_file: &str) -> Result<PathBuf, CollabError>;
}

/// Collects a performance profile from one executable run
#[async_trait::async_trait]
pub trait ProfileCollector: Send + Sync {
    /// Run and sample `executable`, returning the hotspot table.
    async fn collect(
        &self,
        executable: &Path,
        args: &[String],
    ) -> Result<PerformanceProfile, CollabError>;
}

/// Diagnoses the dominant bottleneck for one unit
#[async_trait::async_trait]
pub trait BottleneckAnalyzer: Send + Sync {
    /// Analyze `unit` against `profile`.
    ///
    /// `Ok(None)` means no actionable bottleneck remains; the unit's
    /// loop exits early without generating variants.
    async fn analyze(
        &self,
        unit: &SourceUnit,
        profile: &PerformanceProfile,
    ) -> Result<Option<BottleneckReport>, CollabError>;
}

/// Proposes candidate rewrites for a diagnosed bottleneck
#[async_trait::async_trait]
pub trait VariantGenerator: Send + Sync {
    /// Generate a sibling batch of candidate patches. May return an
    /// empty batch.
    async fn generate(
        &self,
        unit: &SourceUnit,
        report: &BottleneckReport,
    ) -> Result<Vec<CandidatePatch>, CollabError>;
}

/// Drive one collaborator call under the run's stage timeout
///
/// # Errors
/// - [`StageError::CollaboratorTimeout`] when the budget elapses
/// - [`StageError::ProfileUnavailable`] for sample-less profiler runs
/// - [`StageError::CollaboratorFailure`] for every other collaborator error
pub async fn call_with_timeout<T, F>(
    stage: StageKind,
    budget: Duration,
    fut: F,
) -> Result<T, StageError>
where
    F: Future<Output = Result<T, CollabError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Err(_) => Err(StageError::CollaboratorTimeout {
            stage,
            timeout_secs: budget.as_secs(),
        }),
        Ok(Ok(value)) => Ok(value),
        Ok(Err(CollabError::NoSamples(message))) => Err(StageError::ProfileUnavailable(message)),
        Ok(Err(err)) => Err(StageError::CollaboratorFailure {
            stage,
            message: err.to_string(),
        }),
    }
}
