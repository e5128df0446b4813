//! Optimization controller
//!
//! The stateful loop driving analysis, generation, materialization,
//! variant profiling, and evaluation across N source units x M
//! iterations. Every collaborator failure is downgraded to the smallest
//! affected unit of work (one variant, or one unit's iteration) and the
//! run keeps going; only an unusable output root aborts the run.

use crate::audit::AuditWriter;
use crate::collaborators::{
    call_with_timeout, BottleneckAnalyzer, Compiler, ProfileCollector, VariantGenerator,
};
use crate::error::{RunError, StageError, StageKind};
use crate::materializer::VariantMaterializer;
use crate::pool::ProfilingPool;
use crate::state::{
    validate_transition, EvaluationRecord, FailureScope, IterationState, UnitStage,
};
use crate::summary::{RunReport, UnitSummary};
use crate::types::{RunConfig, RunId, SourceUnit, VariantId};
use chrono::Utc;
use hotpath_compare::{Comparator, Verdict};
use hotpath_profile::PerformanceProfile;
use std::path::PathBuf;
use std::sync::Arc;

/// One variant that made it through profiling, ready for evaluation
struct EvaluatedVariant {
    id: VariantId,
    replacement: String,
    profile: PerformanceProfile,
    result: hotpath_compare::EvaluationResult,
}

/// Outcome of one iteration of one unit's loop
struct IterationOutcome {
    stage: UnitStage,
}

/// The stateful loop controller
///
/// Owns the collaborator handles, the comparator, and the profiling
/// pool. Units are processed sequentially; parallelism is confined to
/// the variant compile+profile stage.
pub struct OptimizationController {
    config: RunConfig,
    comparator: Comparator,
    compiler: Arc<dyn Compiler>,
    collector: Arc<dyn ProfileCollector>,
    analyzer: Arc<dyn BottleneckAnalyzer>,
    generator: Arc<dyn VariantGenerator>,
    pool: ProfilingPool,
}

impl OptimizationController {
    /// Create a controller over the four collaborators
    #[must_use]
    pub fn new(
        config: RunConfig,
        comparator: Comparator,
        compiler: Arc<dyn Compiler>,
        collector: Arc<dyn ProfileCollector>,
        analyzer: Arc<dyn BottleneckAnalyzer>,
        generator: Arc<dyn VariantGenerator>,
    ) -> Self {
        let pool = ProfilingPool::new(config.max_profile_workers);
        Self {
            config,
            comparator,
            compiler,
            collector,
            analyzer,
            generator,
            pool,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the loop over every unit against one global baseline profile
    ///
    /// The baseline profile is captured once by the caller and read-only
    /// here; each unit starts from it and diverges independently.
    ///
    /// # Errors
    /// Only [`RunError`]: unusable output root, or an empty unit list.
    pub async fn run(
        &self,
        units: Vec<SourceUnit>,
        global_baseline: PerformanceProfile,
    ) -> Result<RunReport, RunError> {
        if units.is_empty() {
            return Err(RunError::NoUnits);
        }
        let audit = AuditWriter::create(&self.config.output_root)?;

        let run_id = RunId::new();
        let started_at = Utc::now();
        tracing::info!(%run_id, units = units.len(), iterations = self.config.iterations, "run starting");

        let mut summaries = Vec::with_capacity(units.len());
        for unit in units {
            let summary = self.run_unit(unit, global_baseline.clone(), &audit).await;
            summaries.push(summary);
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            units: summaries,
        };
        if let Err(err) = audit.write_report(&report) {
            tracing::warn!(%err, "failed to persist run report");
        }
        tracing::info!(%run_id, promoted = report.any_promotion(), "run finished");
        Ok(report)
    }

    /// Drive one unit's loop to completion or exhaustion
    async fn run_unit(
        &self,
        unit: SourceUnit,
        global_baseline: PerformanceProfile,
        audit: &AuditWriter,
    ) -> UnitSummary {
        let unit_path = unit.path.clone();
        let mut state = IterationState::new(unit, global_baseline);
        let mut final_stage = UnitStage::Analyzing;
        let mut iterations_run = 0;

        for iteration in 1..=self.config.iterations {
            iterations_run = iteration;
            tracing::info!(unit = %unit_path.display(), iteration, "iteration starting");

            let outcome = self.run_iteration(iteration, &mut state, audit).await;
            final_stage = outcome.stage;
            tracing::info!(unit = %unit_path.display(), iteration, stage = %outcome.stage, "iteration finished");

            if outcome.stage == UnitStage::Exhausted {
                break;
            }
        }

        if let Err(err) = audit.write_final_text(state.baseline()) {
            tracing::warn!(%err, "failed to snapshot final unit text");
        }
        UnitSummary::from_state(&state, final_stage, iterations_run)
    }

    /// One full pass of the stage machine for one unit
    async fn run_iteration(
        &self,
        iteration: usize,
        state: &mut IterationState,
        audit: &AuditWriter,
    ) -> IterationOutcome {
        let mut stage = UnitStage::Analyzing;

        let iter_dir = match audit.iteration_dir(state.baseline(), iteration) {
            Ok(dir) => dir,
            Err(err) => {
                // Derived state only; the run continues without this
                // iteration's audit files.
                tracing::warn!(%err, "audit directory unavailable");
                audit.root().join(state.baseline().stem()).join(format!("iter_{iteration}"))
            }
        };
        if let Err(err) = audit.write_baseline(&iter_dir, state.baseline()) {
            tracing::warn!(%err, "failed to snapshot baseline");
        }

        // ANALYZING
        let analysis = call_with_timeout(
            StageKind::Analyze,
            self.config.stage_timeout,
            self.analyzer.analyze(state.baseline(), state.baseline_profile()),
        )
        .await;
        let report = match analysis {
            Ok(Some(report)) => report,
            Ok(None) => {
                tracing::info!("no actionable bottleneck; unit exhausted");
                return self.finish(stage, UnitStage::Exhausted);
            }
            Err(err) => {
                state.record_failure(iteration, FailureScope::Iteration, err.to_string());
                return self.finish(stage, UnitStage::Retained);
            }
        };
        if let Err(err) = audit.write_bottleneck(&iter_dir, &report) {
            tracing::warn!(%err, "failed to persist bottleneck report");
        }
        stage = self.advance(stage, UnitStage::Generating);

        // GENERATING
        let generation = call_with_timeout(
            StageKind::Generate,
            self.config.stage_timeout,
            self.generator.generate(state.baseline(), &report),
        )
        .await;
        let batch = match generation {
            Ok(batch) if batch.is_empty() => {
                tracing::info!("generator produced no candidates; unit exhausted");
                return self.finish(stage, UnitStage::Exhausted);
            }
            Ok(batch) => batch,
            Err(err) => {
                state.record_failure(iteration, FailureScope::Iteration, err.to_string());
                return self.finish(stage, UnitStage::Retained);
            }
        };
        if let Err(err) = audit.write_patches(&iter_dir, &batch) {
            tracing::warn!(%err, "failed to persist candidate batch");
        }
        stage = self.advance(stage, UnitStage::Materializing);

        // MATERIALIZING
        let materializer = VariantMaterializer::new(
            AuditWriter::variants_root(&iter_dir),
            state.baseline().file_name(),
        );
        let materialized = materializer.materialize(&batch);
        for failed in materialized.iter().filter(|v| !v.is_usable()) {
            state.record_failure(
                iteration,
                FailureScope::Variant(failed.id.clone()),
                StageError::MaterializationFailure(
                    failed.error.clone().unwrap_or_else(|| "unknown".to_string()),
                )
                .to_string(),
            );
        }
        stage = self.advance(stage, UnitStage::ProfilingVariants);

        // PROFILING_VARIANTS: compile + profile each surviving variant
        // under the bounded pool.
        let jobs: Vec<(VariantId, PathBuf, String)> = materialized
            .iter()
            .filter(|v| v.is_usable())
            .filter_map(|v| {
                let dir = v.directory()?.to_path_buf();
                let replacement = batch
                    .iter()
                    .find(|p| p.id == v.id)
                    .map(|p| p.replacement.clone())?;
                Some((v.id.clone(), dir, replacement))
            })
            .collect();

        let target_filename = state.baseline().file_name();
        let tasks: Vec<_> = jobs
            .iter()
            .map(|(_, dir, _)| {
                let compiler = Arc::clone(&self.compiler);
                let collector = Arc::clone(&self.collector);
                let dir = dir.clone();
                let target = target_filename.clone();
                let args = self.config.binary_args.clone();
                let timeout = self.config.stage_timeout;
                move || async move {
                    let executable = call_with_timeout(
                        StageKind::Compile,
                        timeout,
                        compiler.compile(&dir, &target),
                    )
                    .await?;
                    call_with_timeout(StageKind::Profile, timeout, collector.collect(&executable, &args))
                        .await
                }
            })
            .collect();
        let slots = self.pool.run_all(tasks).await;
        stage = self.advance(stage, UnitStage::Evaluating);

        // EVALUATING
        let mut evaluated: Vec<EvaluatedVariant> = Vec::new();
        for ((id, dir, replacement), slot) in jobs.into_iter().zip(slots) {
            let profile = match slot {
                Some(Ok(profile)) => profile,
                Some(Err(err)) => {
                    state.record_failure(iteration, FailureScope::Variant(id), err.to_string());
                    continue;
                }
                None => {
                    state.record_failure(
                        iteration,
                        FailureScope::Variant(id),
                        "profiling task did not complete".to_string(),
                    );
                    continue;
                }
            };
            if let Err(err) = audit.write_variant_profile(&dir, &profile) {
                tracing::warn!(%err, "failed to persist variant profile");
            }

            let result = self.comparator.evaluate(state.baseline_profile(), &profile);
            if let Err(err) = audit.write_evaluation(&dir, &result) {
                tracing::warn!(%err, "failed to persist evaluation");
            }
            if result.verdict == Verdict::Unknown {
                state.record_failure(
                    iteration,
                    FailureScope::Variant(id.clone()),
                    StageError::ComparisonIndeterminate(result.detail.clone()).to_string(),
                );
            }
            evaluated.push(EvaluatedVariant {
                id,
                replacement,
                profile,
                result,
            });
        }

        // Selection: highest improvement, then higher confidence, then
        // first-seen order (strict comparisons keep the earlier winner).
        let mut winner: Option<usize> = None;
        for (index, candidate) in evaluated.iter().enumerate() {
            if candidate.result.verdict != Verdict::Improvement {
                continue;
            }
            let better = match winner {
                None => true,
                Some(current) => {
                    let best = &evaluated[current];
                    candidate.result.improvement_percent > best.result.improvement_percent
                        || (candidate.result.improvement_percent == best.result.improvement_percent
                            && candidate.result.confidence > best.result.confidence)
                }
            };
            if better {
                winner = Some(index);
            }
        }

        for (index, candidate) in evaluated.iter().enumerate() {
            state.record_evaluation(EvaluationRecord {
                iteration,
                variant_id: candidate.id.clone(),
                result: candidate.result.clone(),
                selected: winner == Some(index),
            });
        }

        match winner {
            Some(index) => {
                let winning = evaluated.swap_remove(index);
                tracing::info!(
                    variant = %winning.id,
                    improvement = winning.result.improvement_percent,
                    "variant promoted"
                );
                state.promote(winning.replacement, winning.profile);
                self.finish(stage, UnitStage::Promoted)
            }
            None => {
                tracing::info!("no qualifying variant; baseline retained");
                self.finish(stage, UnitStage::Retained)
            }
        }
    }

    /// Validated stage advance for the happy path
    fn advance(&self, from: UnitStage, to: UnitStage) -> UnitStage {
        if let Err(err) = validate_transition(from, to) {
            // The transition table and the loop are maintained together;
            // divergence is a bug worth a loud log, not an abort.
            tracing::error!(%err, "stage table violation");
        }
        to
    }

    /// Terminal advance for an iteration
    fn finish(&self, from: UnitStage, to: UnitStage) -> IterationOutcome {
        IterationOutcome {
            stage: self.advance(from, to),
        }
    }
}
