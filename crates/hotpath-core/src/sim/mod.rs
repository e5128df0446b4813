//! Simulator harness
//!
//! Drives the real controller end-to-end with scripted collaborators so
//! the loop can be exercised, and its audit tree inspected, without a
//! compiler toolchain, a sampling profiler, or a model behind it. Used by
//! the `hotpath simulate` subcommand and the integration tests.
//!
//! The scripted generator embeds machine-readable markers in each
//! candidate's text; the scripted collector reads them back and
//! synthesizes a perf-report document with the implied hotspot shape,
//! which is then parsed by the ordinary report parser. Everything is
//! deterministic for a fixed seed.

use crate::collaborators::{
    BottleneckAnalyzer, CollabError, Compiler, ProfileCollector, VariantGenerator,
};
use crate::controller::OptimizationController;
use crate::summary::RunReport;
use crate::types::{BottleneckReport, CandidatePatch, RunConfig, SourceUnit};
use hotpath_compare::{Comparator, ComparatorConfig};
use hotpath_profile::PerformanceProfile;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Marker line carrying a variant's simulated speedup factor
const SPEEDUP_MARKER: &str = "// sim-speedup:";
/// Marker line selecting the simulated hotspot shape
const STRATEGY_MARKER: &str = "// sim-strategy:";
/// Marker forcing a simulated compile failure
const COMPILE_FAIL_MARKER: &str = "// sim-compile-fail";

/// Dominant share the analyzer stops acting below
const ACTIONABLE_FLOOR: f64 = 20.0;

/// Configuration for one simulated run
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Units to synthesize when no source root is given
    pub units: usize,
    /// Iteration budget per unit
    pub iterations: usize,
    /// Candidates per generated batch
    pub variants_per_batch: usize,
    /// Seed for all scripted randomness
    pub seed: u64,
    /// Probability that a generated candidate fails to compile
    pub compile_failure_rate: f64,
    /// Audit tree root
    pub output_root: PathBuf,
    /// Optional directory of real source files to load as units
    pub source_root: Option<PathBuf>,
    /// Significance threshold handed to the comparator
    pub threshold: f64,
    /// Worker bound for variant profiling
    pub max_profile_workers: usize,
}

impl SimulatorConfig {
    /// Defaults for `output_root`
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            units: 2,
            iterations: 3,
            variants_per_batch: 3,
            seed: 42,
            compile_failure_rate: 0.1,
            output_root: output_root.into(),
            source_root: None,
            threshold: 5.0,
            max_profile_workers: 4,
        }
    }
}

/// Run the controller against scripted collaborators
///
/// # Errors
/// Propagates fatal [`RunError`]s and source-root read failures.
pub async fn run_simulator(config: SimulatorConfig) -> anyhow::Result<RunReport> {
    let units = match &config.source_root {
        Some(root) => load_units(root)?,
        None => synthesize_units(config.units),
    };

    let rng = Arc::new(Mutex::new(StdRng::seed_from_u64(config.seed)));
    let baseline = baseline_profile();

    let run_config = RunConfig::new(&config.output_root)
        .with_iterations(config.iterations)
        .with_max_profile_workers(config.max_profile_workers);
    let comparator = Comparator::new(ComparatorConfig::default().with_threshold(config.threshold));

    let controller = OptimizationController::new(
        run_config,
        comparator,
        Arc::new(SimCompiler),
        Arc::new(SimCollector),
        Arc::new(SimAnalyzer),
        Arc::new(SimGenerator {
            rng,
            variants_per_batch: config.variants_per_batch,
            compile_failure_rate: config.compile_failure_rate,
        }),
    );

    Ok(controller.run(units, baseline).await?)
}

/// The shared simulated workload: one dominant symbol at 74% self time
fn baseline_profile() -> PerformanceProfile {
    let raw = synthesize_report(&[
        ("perform_heavy_computation", 74.0),
        ("main", 14.0),
        ("__libc_start_main", 2.0),
    ]);
    PerformanceProfile::parse("perf report --stdio --no-children --sort=dso,symbol", raw)
        .expect("synthesized report parses")
}

/// Render a self-only perf-report document for the given rows
fn synthesize_report(rows: &[(&str, f64)]) -> String {
    let mut out = String::from(
        "# Samples: 40K of event 'cycles:u'\n\
         # Event count (approx.): 35893273126\n\
         #\n\
         # Overhead  Shared Object        Symbol\n\
         # ........  ...................  ..............\n\
         #\n",
    );
    for (symbol, share) in rows {
        out.push_str(&format!(
            "    {share:>5.2}%  workload             [.] {symbol}\n"
        ));
    }
    out
}

fn synthesize_units(count: usize) -> Vec<SourceUnit> {
    (0..count)
        .map(|i| {
            SourceUnit::new(
                format!("sim/unit_{i}.cpp"),
                "#include <vector>\n\
                 double perform_heavy_computation(int size) {\n\
                     double result = 0.0;\n\
                     for (int i = 0; i < size; ++i)\n\
                         for (int j = 0; j < size; ++j)\n\
                             for (int k = 0; k < 100; ++k)\n\
                                 result += static_cast<double>(i * j) / (size + 1.0) * k;\n\
                     return result;\n\
                 }\n",
            )
        })
        .collect()
}

fn load_units(root: &Path) -> anyhow::Result<Vec<SourceUnit>> {
    let mut units = Vec::new();
    collect_sources(root, &mut units)?;
    anyhow::ensure!(
        !units.is_empty(),
        "no source files found under {}",
        root.display()
    );
    Ok(units)
}

fn collect_sources(dir: &Path, units: &mut Vec<SourceUnit>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_sources(&path, units)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("c" | "cc" | "cpp" | "cxx" | "h" | "hh" | "hpp" | "hxx" | "rs")
        ) {
            let text = fs::read_to_string(&path)?;
            units.push(SourceUnit::new(path, text));
        }
    }
    Ok(())
}

/// Scripted compiler: instant success unless the candidate carries the
/// compile-failure marker.
struct SimCompiler;

#[async_trait::async_trait]
impl Compiler for SimCompiler {
    async fn compile(&self, source_dir: &Path, target_file: &str) -> Result<PathBuf, CollabError> {
        let source = fs::read_to_string(source_dir.join(target_file))?;
        if source.contains(COMPILE_FAIL_MARKER) {
            return Err(CollabError::Tool(format!(
                "cc: error in {target_file}: simulated syntax error"
            )));
        }
        Ok(source_dir.join("a.out"))
    }
}

/// Scripted collector: reads the variant's markers and synthesizes the
/// implied hotspot shape.
///
/// Sample-count jitter is derived from the variant text itself, so
/// concurrent collection stays deterministic for a fixed seed.
struct SimCollector;

#[async_trait::async_trait]
impl ProfileCollector for SimCollector {
    async fn collect(
        &self,
        executable: &Path,
        _args: &[String],
    ) -> Result<PerformanceProfile, CollabError> {
        let dir = executable
            .parent()
            .ok_or_else(|| CollabError::Tool("executable has no parent directory".to_string()))?;
        let source = read_variant_source(dir)?;

        let speedup = parse_marker(&source, SPEEDUP_MARKER)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(1.0);
        let parallel = parse_marker(&source, STRATEGY_MARKER)
            .map(|s| s == "parallel")
            .unwrap_or(false);

        let dominant = (74.0 / speedup.max(0.1)).min(95.0);
        // Keep the synthesized table summing below 100% whatever the
        // speedup landed on.
        let main_share = (96.0 - dominant).clamp(1.0, 14.0);
        let rows: Vec<(String, f64)> = if parallel {
            vec![
                ("computation_worker_0".to_string(), dominant / 2.0),
                ("computation_worker_1".to_string(), dominant / 2.0),
                ("thread_pool_dispatch".to_string(), 1.0),
                ("main".to_string(), main_share),
            ]
        } else {
            vec![
                ("perform_heavy_computation".to_string(), dominant),
                ("main".to_string(), main_share),
            ]
        };

        let jitter = content_jitter(&source);
        let borrowed: Vec<(&str, f64)> = rows.iter().map(|(s, p)| (s.as_str(), *p)).collect();
        let mut raw = synthesize_report(&borrowed);
        raw = raw.replace("40K", &format!("{}", (40_000.0 * jitter) as u64));

        PerformanceProfile::parse(
            format!("perf report --stdio -i {}/perf.data", dir.display()),
            raw,
        )
        .map_err(|e| CollabError::Tool(e.to_string()))
    }
}

/// Deterministic sample jitter in `[0.95, 1.05)` keyed by content
fn content_jitter(source: &str) -> f64 {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(source.as_bytes());
    let bucket = (u64::from(digest[0]) << 8) | u64::from(digest[1]);
    0.95 + (bucket as f64 / 65_536.0) * 0.10
}

fn read_variant_source(dir: &Path) -> Result<String, CollabError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("c" | "cc" | "cpp" | "cxx" | "rs")
        ) {
            return Ok(fs::read_to_string(path)?);
        }
    }
    Err(CollabError::Tool(format!(
        "no source file in variant directory {}",
        dir.display()
    )))
}

fn parse_marker<'a>(source: &'a str, marker: &str) -> Option<&'a str> {
    source
        .lines()
        .find_map(|line| line.strip_prefix(marker))
        .map(str::trim)
}

/// Scripted analyzer: acts while a dominant symbol stays above the
/// actionable floor.
struct SimAnalyzer;

#[async_trait::async_trait]
impl BottleneckAnalyzer for SimAnalyzer {
    async fn analyze(
        &self,
        _unit: &SourceUnit,
        profile: &PerformanceProfile,
    ) -> Result<Option<BottleneckReport>, CollabError> {
        let Some(dominant) = profile.dominant() else {
            return Ok(None);
        };
        if dominant.self_percent < ACTIONABLE_FLOOR {
            return Ok(None);
        }
        Ok(Some(BottleneckReport::new(
            dominant.symbol.clone(),
            "cpu-bound hot loop",
            format!(
                "'{}' holds {:.1}% of self time; the triple-nested loop recomputes loop-invariant terms",
                dominant.symbol, dominant.self_percent
            ),
        )))
    }
}

/// Scripted generator: emits candidates whose markers encode the
/// performance the collector will observe.
struct SimGenerator {
    rng: Arc<Mutex<StdRng>>,
    variants_per_batch: usize,
    compile_failure_rate: f64,
}

#[async_trait::async_trait]
impl VariantGenerator for SimGenerator {
    async fn generate(
        &self,
        unit: &SourceUnit,
        report: &BottleneckReport,
    ) -> Result<Vec<CandidatePatch>, CollabError> {
        let mut rng = self.rng.lock().expect("rng mutex");
        let batch = (0..self.variants_per_batch)
            .map(|i| {
                let speedup = rng.gen_range(0.8..2.5_f64);
                let parallel = speedup > 1.8;
                let fails = rng.gen_bool(self.compile_failure_rate);

                let mut text = String::new();
                if fails {
                    text.push_str(COMPILE_FAIL_MARKER);
                    text.push('\n');
                }
                text.push_str(&format!("{SPEEDUP_MARKER} {speedup:.2}\n"));
                text.push_str(&format!(
                    "{STRATEGY_MARKER} {}\n",
                    if parallel { "parallel" } else { "sequential" }
                ));
                text.push_str(&unit.text);

                let rationale = if parallel {
                    format!("split '{}' across worker threads", report.location)
                } else {
                    format!("hoist invariant computation out of '{}'", report.location)
                };
                CandidatePatch::new(format!("Variant {}", i + 1), text, rationale)
            })
            .collect();
        Ok(batch)
    }
}
