//! Audit-trail serialization
//!
//! The on-disk layout operators see, one directory per unit per
//! iteration. Everything written here is a pure serialization of the
//! controller's in-memory state; the tree can be regenerated from it at
//! any point and is never read back as a source of truth.
//!
//! ```text
//! <output_root>/summary.yaml, summary.json
//! <output_root>/<unit-stem>/iter_<n>/baseline.<ext>
//! <output_root>/<unit-stem>/iter_<n>/bottleneck.yaml
//! <output_root>/<unit-stem>/iter_<n>/patches.yaml
//! <output_root>/<unit-stem>/iter_<n>/variants/<safe-id>/<file>
//! <output_root>/<unit-stem>/iter_<n>/variants/<safe-id>/profile.yaml
//! <output_root>/<unit-stem>/iter_<n>/variants/<safe-id>/evaluation.yaml
//! ```

use crate::error::RunError;
use crate::summary::RunReport;
use crate::types::{BottleneckReport, CandidatePatch, SourceUnit};
use hotpath_compare::EvaluationResult;
use hotpath_profile::PerformanceProfile;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes the per-run audit tree
#[derive(Debug, Clone)]
pub struct AuditWriter {
    root: PathBuf,
}

impl AuditWriter {
    /// Create the writer, probing that the root is actually writable
    ///
    /// # Errors
    /// Returns [`RunError::OutputRootUnavailable`] when the root cannot
    /// be created or written, the one fatal condition of a run.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, RunError> {
        let root = root.into();
        let probe = || -> io::Result<()> {
            fs::create_dir_all(&root)?;
            let marker = root.join(".write-probe");
            fs::write(&marker, b"ok")?;
            fs::remove_file(&marker)
        };
        probe().map_err(|source| RunError::OutputRootUnavailable {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Root of the audit tree
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one unit's iteration (1-based), created on demand
    ///
    /// # Errors
    /// Propagates directory-creation failures; callers downgrade these to
    /// warnings since the audit tree is derived state.
    pub fn iteration_dir(&self, unit: &SourceUnit, iteration: usize) -> io::Result<PathBuf> {
        let dir = self.root.join(unit.stem()).join(format!("iter_{iteration}"));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Variant subtree root for an iteration directory
    #[must_use]
    pub fn variants_root(iteration_dir: &Path) -> PathBuf {
        iteration_dir.join("variants")
    }

    /// Snapshot the iteration's baseline text
    ///
    /// # Errors
    /// Propagates write failures.
    pub fn write_baseline(&self, iteration_dir: &Path, unit: &SourceUnit) -> io::Result<()> {
        let ext = unit
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "txt".to_string());
        fs::write(iteration_dir.join(format!("baseline.{ext}")), &unit.text)
    }

    /// Persist the iteration's bottleneck report
    ///
    /// # Errors
    /// Propagates write/serialization failures.
    pub fn write_bottleneck(
        &self,
        iteration_dir: &Path,
        report: &BottleneckReport,
    ) -> io::Result<()> {
        write_yaml(&iteration_dir.join("bottleneck.yaml"), report)
    }

    /// Persist the iteration's candidate batch
    ///
    /// # Errors
    /// Propagates write/serialization failures.
    pub fn write_patches(&self, iteration_dir: &Path, batch: &[CandidatePatch]) -> io::Result<()> {
        write_yaml(&iteration_dir.join("patches.yaml"), &batch)
    }

    /// Persist one variant's profile next to its source file
    ///
    /// # Errors
    /// Propagates write/serialization failures.
    pub fn write_variant_profile(
        &self,
        variant_dir: &Path,
        profile: &PerformanceProfile,
    ) -> io::Result<()> {
        write_yaml(&variant_dir.join("profile.yaml"), profile)
    }

    /// Persist one variant's evaluation next to its source file
    ///
    /// # Errors
    /// Propagates write/serialization failures.
    pub fn write_evaluation(
        &self,
        variant_dir: &Path,
        evaluation: &EvaluationResult,
    ) -> io::Result<()> {
        write_yaml(&variant_dir.join("evaluation.yaml"), evaluation)
    }

    /// Snapshot a unit's final baseline text after its loop finishes
    ///
    /// # Errors
    /// Propagates write failures.
    pub fn write_final_text(&self, unit: &SourceUnit) -> io::Result<()> {
        let dir = self.root.join(unit.stem());
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("final_{}", unit.file_name())), &unit.text)
    }

    /// Persist the run report as YAML and JSON
    ///
    /// # Errors
    /// Propagates write/serialization failures.
    pub fn write_report(&self, report: &RunReport) -> io::Result<()> {
        write_yaml(&self.root.join("summary.yaml"), report)?;
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(self.root.join("summary.json"), json)
    }
}

fn write_yaml<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let yaml =
        serde_yaml::to_string(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandidatePatch;

    #[test]
    fn unwritable_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the root directory should be.
        let blocked = dir.path().join("out");
        fs::write(&blocked, b"occupied").unwrap();

        let result = AuditWriter::create(&blocked);
        assert!(matches!(
            result,
            Err(RunError::OutputRootUnavailable { .. })
        ));
    }

    #[test]
    fn iteration_layout_is_partitioned_by_unit_and_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditWriter::create(dir.path().join("out")).unwrap();
        let unit = SourceUnit::new("src/heavy.cpp", "int main() {}");

        let first = audit.iteration_dir(&unit, 1).unwrap();
        let second = audit.iteration_dir(&unit, 2).unwrap();
        assert_ne!(first, second);
        assert!(first.ends_with("heavy/iter_1"));
        assert!(second.ends_with("heavy/iter_2"));
    }

    #[test]
    fn baseline_snapshot_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditWriter::create(dir.path().join("out")).unwrap();
        let unit = SourceUnit::new("src/heavy.cpp", "int main() {}");

        let iter_dir = audit.iteration_dir(&unit, 1).unwrap();
        audit.write_baseline(&iter_dir, &unit).unwrap();

        let content = fs::read_to_string(iter_dir.join("baseline.cpp")).unwrap();
        assert_eq!(content, "int main() {}");
    }

    #[test]
    fn yaml_artifacts_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditWriter::create(dir.path().join("out")).unwrap();
        let unit = SourceUnit::new("src/heavy.cpp", "int main() {}");
        let iter_dir = audit.iteration_dir(&unit, 1).unwrap();

        let report = BottleneckReport::new("perform_heavy_computation", "cpu", "tight loop");
        audit.write_bottleneck(&iter_dir, &report).unwrap();

        let batch = vec![CandidatePatch::new("Variant 1", "code", "why")];
        audit.write_patches(&iter_dir, &batch).unwrap();

        let loaded: BottleneckReport = serde_yaml::from_str(
            &fs::read_to_string(iter_dir.join("bottleneck.yaml")).unwrap(),
        )
        .unwrap();
        assert_eq!(loaded.location, "perform_heavy_computation");

        let loaded: Vec<CandidatePatch> =
            serde_yaml::from_str(&fs::read_to_string(iter_dir.join("patches.yaml")).unwrap())
                .unwrap();
        assert_eq!(loaded.len(), 1);
    }
}
