//! Testing utilities for the hotpath workspace
//!
//! Shared profile fixtures and scripted collaborator implementations.

#![allow(missing_docs)]

use hotpath_core::{
    BottleneckAnalyzer, BottleneckReport, CandidatePatch, CollabError, Compiler, ProfileCollector,
    VariantGenerator, SourceUnit,
};
use hotpath_profile::{HotspotRow, PerformanceProfile};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Build a profile from `(symbol, self-share)` pairs.
pub fn profile_from_rows(samples: u64, rows: &[(&str, f64)]) -> PerformanceProfile {
    let hotspots = rows
        .iter()
        .map(|(s, p)| HotspotRow::new(*s, *p, *p).unwrap())
        .collect();
    PerformanceProfile::from_rows(
        "perf report --stdio --no-children --sort=dso,symbol",
        "synthetic fixture",
        hotspots,
        samples,
    )
    .unwrap()
}

/// Baseline with one symbol owning nearly all self time.
pub fn monolithic_baseline() -> PerformanceProfile {
    profile_from_rows(
        40_000,
        &[("perform_heavy_computation", 97.0), ("main", 1.5)],
    )
}

/// The monolithic workload split across two worker threads.
pub fn split_worker_profile() -> PerformanceProfile {
    profile_from_rows(
        41_000,
        &[
            ("computation_worker_lo", 48.2),
            ("computation_worker_hi", 47.8),
            ("thread_spawn_join", 1.1),
        ],
    )
}

/// A profile with zero attributable samples.
pub fn empty_profile() -> PerformanceProfile {
    PerformanceProfile::from_rows("perf report --stdio", "no samples", vec![], 0).unwrap()
}

pub fn report_fixture() -> BottleneckReport {
    BottleneckReport::new(
        "perform_heavy_computation",
        "cpu-bound hot loop",
        "triple-nested loop recomputes invariant terms",
    )
}

/// Analyzer that replays a queue of answers, then reports no bottleneck.
///
/// Records the dominant self share of every baseline profile it is shown,
/// so tests can assert what the controller considered current.
pub struct ScriptedAnalyzer {
    answers: Mutex<VecDeque<Option<BottleneckReport>>>,
    seen_dominant_shares: Mutex<Vec<f64>>,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn new(answers: Vec<Option<BottleneckReport>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            seen_dominant_shares: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_dominant_shares(&self) -> Vec<f64> {
        self.seen_dominant_shares.lock().clone()
    }
}

#[async_trait::async_trait]
impl BottleneckAnalyzer for ScriptedAnalyzer {
    async fn analyze(
        &self,
        _unit: &SourceUnit,
        profile: &PerformanceProfile,
    ) -> Result<Option<BottleneckReport>, CollabError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(dominant) = profile.dominant() {
            self.seen_dominant_shares.lock().push(dominant.self_percent);
        }
        Ok(self.answers.lock().pop_front().flatten())
    }
}

/// Generator that replays a queue of batches, then returns empty batches.
pub struct ScriptedGenerator {
    batches: Mutex<VecDeque<Vec<CandidatePatch>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(batches: Vec<Vec<CandidatePatch>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VariantGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _unit: &SourceUnit,
        _report: &BottleneckReport,
    ) -> Result<Vec<CandidatePatch>, CollabError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.batches.lock().pop_front().unwrap_or_default())
    }
}

/// Compiler that succeeds except for listed variant directory names.
pub struct ScriptedCompiler {
    fail_dirs: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedCompiler {
    pub fn succeeding() -> Self {
        Self::failing_for(vec![])
    }

    pub fn failing_for(fail_dirs: Vec<String>) -> Self {
        Self {
            fail_dirs,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Compiler for ScriptedCompiler {
    async fn compile(&self, source_dir: &Path, _target_file: &str) -> Result<PathBuf, CollabError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dir_name = dir_name(source_dir);
        if self.fail_dirs.iter().any(|d| d == &dir_name) {
            return Err(CollabError::Tool(format!("cc: error in {dir_name}")));
        }
        Ok(source_dir.join("a.out"))
    }
}

/// Collector that serves profiles keyed by variant directory name.
pub struct ScriptedCollector {
    profiles: Mutex<HashMap<String, PerformanceProfile>>,
    fail_dirs: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedCollector {
    pub fn new(profiles: HashMap<String, PerformanceProfile>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
            fail_dirs: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_failures(mut self, fail_dirs: Vec<String>) -> Self {
        self.fail_dirs = fail_dirs;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProfileCollector for ScriptedCollector {
    async fn collect(
        &self,
        executable: &Path,
        _args: &[String],
    ) -> Result<PerformanceProfile, CollabError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dir_name = executable
            .parent()
            .map(dir_name)
            .unwrap_or_default();
        if self.fail_dirs.iter().any(|d| d == &dir_name) {
            return Err(CollabError::NoSamples(format!(
                "0 samples collected for {dir_name}"
            )));
        }
        self.profiles
            .lock()
            .get(&dir_name)
            .cloned()
            .ok_or_else(|| CollabError::Tool(format!("no scripted profile for {dir_name}")))
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
