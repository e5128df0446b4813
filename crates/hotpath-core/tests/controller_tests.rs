//! End-to-end controller behavior over scripted collaborators

use hotpath_compare::{Comparator, ComparatorConfig, EvaluationResult, Verdict};
use hotpath_core::{
    CandidatePatch, CollabError, OptimizationController, ProfileCollector, RunConfig, RunError,
    SourceUnit, UnitStage,
};
use hotpath_profile::PerformanceProfile;
use hotpath_test_utils::{
    empty_profile, monolithic_baseline, profile_from_rows, report_fixture, split_worker_profile,
    ScriptedAnalyzer, ScriptedCollector, ScriptedCompiler, ScriptedGenerator,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn unit() -> SourceUnit {
    SourceUnit::new("src/heavy.cpp", "int main() { heavy(); return 0; }")
}

fn config(output: &Path, iterations: usize) -> RunConfig {
    RunConfig::new(output)
        .with_iterations(iterations)
        .with_stage_timeout(Duration::from_secs(5))
        .with_max_profile_workers(2)
}

fn controller(
    output: &Path,
    iterations: usize,
    analyzer: Arc<ScriptedAnalyzer>,
    generator: Arc<ScriptedGenerator>,
    compiler: Arc<ScriptedCompiler>,
    collector: Arc<dyn ProfileCollector>,
) -> OptimizationController {
    OptimizationController::new(
        config(output, iterations),
        Comparator::new(ComparatorConfig::default()),
        compiler,
        collector,
        analyzer,
        generator,
    )
}

/// Analyzer finds nothing actionable: the unit exhausts immediately and
/// the generator, compiler, and collector are never consulted.
#[tokio::test]
async fn no_bottleneck_exhausts_without_later_stages() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![None]));
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());
    let collector = Arc::new(ScriptedCollector::new(HashMap::new()));

    let report = controller(
        dir.path(),
        3,
        Arc::clone(&analyzer),
        Arc::clone(&generator),
        Arc::clone(&compiler),
        Arc::clone(&collector) as Arc<dyn ProfileCollector>,
    )
    .run(vec![unit()], profile_from_rows(40_000, &[("hot_loop", 80.0)]))
    .await
    .unwrap();

    let summary = &report.units[0];
    assert_eq!(summary.final_stage, UnitStage::Exhausted);
    assert_eq!(summary.iterations_run, 1);
    assert_eq!(summary.promotions, 0);

    assert_eq!(analyzer.calls(), 1);
    assert_eq!(generator.calls(), 0);
    assert_eq!(compiler.calls(), 0);
    assert_eq!(collector.calls(), 0);
}

/// Two qualifying improvements at ~12% and ~30%: the 30% variant wins
/// promotion, the 12% one stays in the record as evaluated-not-selected,
/// and the promoted baseline's dominant share is strictly lower.
#[tokio::test]
async fn best_improvement_wins_promotion() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![Some(report_fixture()), None]));
    let generator = Arc::new(ScriptedGenerator::new(vec![vec![
        CandidatePatch::new("Variant 1", "// modest\nint main() {}", "strength reduction"),
        CandidatePatch::new("Variant 2", "// strong\nint main() {}", "loop fusion"),
    ]]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());

    let mut profiles = HashMap::new();
    profiles.insert(
        "variant_1".to_string(),
        profile_from_rows(40_000, &[("hot_loop", 70.4), ("main", 5.0)]),
    );
    profiles.insert(
        "variant_2".to_string(),
        profile_from_rows(40_000, &[("hot_loop", 56.0), ("main", 5.0)]),
    );
    let collector = Arc::new(ScriptedCollector::new(profiles));

    let report = controller(
        &out,
        2,
        Arc::clone(&analyzer),
        generator,
        compiler,
        collector,
    )
    .run(vec![unit()], profile_from_rows(40_000, &[("hot_loop", 80.0)]))
    .await
    .unwrap();

    let summary = &report.units[0];
    assert_eq!(summary.promotions, 1);
    assert_eq!(summary.evaluations, 2);
    assert!((summary.best_improvement_percent.unwrap() - 30.0).abs() < 0.1);
    assert!(report.any_promotion());

    // Promotion monotonicity: the second analysis observed the winning
    // variant's profile, whose dominant share dropped 80 -> 56.
    let shares = analyzer.seen_dominant_shares();
    assert_eq!(shares.len(), 2);
    assert!((shares[0] - 80.0).abs() < 1e-9);
    assert!((shares[1] - 56.0).abs() < 1e-9);

    // The runner-up is not discarded silently: its evaluation sits in the
    // audit tree with an improvement verdict and no selection.
    let eval_path = out.join("heavy/iter_1/variants/variant_1/evaluation.yaml");
    let eval: EvaluationResult =
        serde_yaml::from_str(&std::fs::read_to_string(eval_path).unwrap()).unwrap();
    assert_eq!(eval.verdict, Verdict::Improvement);
    assert!((eval.improvement_percent - 12.0).abs() < 0.1);
}

/// A collector failure for one sibling marks only that variant; the other
/// proceeds and is promoted.
#[tokio::test]
async fn collector_failure_marks_only_that_variant() {
    let dir = tempfile::tempdir().unwrap();

    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![Some(report_fixture())]));
    let generator = Arc::new(ScriptedGenerator::new(vec![vec![
        CandidatePatch::new("Variant 1", "// noisy\nint main() {}", "vectorize"),
        CandidatePatch::new("Variant 2", "// solid\nint main() {}", "tile loops"),
    ]]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());

    let mut profiles = HashMap::new();
    profiles.insert(
        "variant_2".to_string(),
        profile_from_rows(40_000, &[("hot_loop", 50.0)]),
    );
    let collector = Arc::new(
        ScriptedCollector::new(profiles).with_failures(vec!["variant_1".to_string()]),
    );

    let report = controller(dir.path(), 1, analyzer, generator, compiler, collector)
        .run(vec![unit()], profile_from_rows(40_000, &[("hot_loop", 80.0)]))
        .await
        .unwrap();

    let summary = &report.units[0];
    assert_eq!(summary.final_stage, UnitStage::Promoted);
    assert_eq!(summary.promotions, 1);
    assert_eq!(summary.evaluations, 1);

    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].error.contains("profile unavailable"));
}

/// A compiler failure for one sibling behaves the same way.
#[tokio::test]
async fn compile_failure_marks_only_that_variant() {
    let dir = tempfile::tempdir().unwrap();

    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![Some(report_fixture())]));
    let generator = Arc::new(ScriptedGenerator::new(vec![vec![
        CandidatePatch::new("Variant 1", "int main() {", "truncated"),
        CandidatePatch::new("Variant 2", "int main() {}", "sound"),
    ]]));
    let compiler = Arc::new(ScriptedCompiler::failing_for(vec!["variant_1".to_string()]));

    let mut profiles = HashMap::new();
    profiles.insert(
        "variant_2".to_string(),
        profile_from_rows(40_000, &[("hot_loop", 50.0)]),
    );
    let collector = Arc::new(ScriptedCollector::new(profiles));

    let report = controller(dir.path(), 1, analyzer, generator, compiler, collector)
        .run(vec![unit()], profile_from_rows(40_000, &[("hot_loop", 80.0)]))
        .await
        .unwrap();

    let summary = &report.units[0];
    assert_eq!(summary.promotions, 1);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].error.contains("compile"));
}

/// An empty generated batch exhausts the unit instead of looping on
/// nothing.
#[tokio::test]
async fn empty_batch_exhausts_unit() {
    let dir = tempfile::tempdir().unwrap();

    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![Some(report_fixture())]));
    let generator = Arc::new(ScriptedGenerator::new(vec![vec![]]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());
    let collector = Arc::new(ScriptedCollector::new(HashMap::new()));

    let report = controller(dir.path(), 3, analyzer, generator, Arc::clone(&compiler), collector)
        .run(vec![unit()], profile_from_rows(40_000, &[("hot_loop", 80.0)]))
        .await
        .unwrap();

    assert_eq!(report.units[0].final_stage, UnitStage::Exhausted);
    assert_eq!(compiler.calls(), 0);
}

/// A hanging collector is cut off by the stage timeout; the failure is
/// recorded against the variant and the run completes.
#[tokio::test]
async fn collector_timeout_is_recorded_not_fatal() {
    struct HangingCollector;

    #[async_trait::async_trait]
    impl ProfileCollector for HangingCollector {
        async fn collect(
            &self,
            _executable: &Path,
            _args: &[String],
        ) -> Result<PerformanceProfile, CollabError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Err(CollabError::Tool("unreachable".to_string()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![Some(report_fixture())]));
    let generator = Arc::new(ScriptedGenerator::new(vec![vec![CandidatePatch::new(
        "Variant 1",
        "int main() {}",
        "prefetch",
    )]]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());

    let run_config = RunConfig::new(dir.path())
        .with_iterations(1)
        .with_stage_timeout(Duration::from_millis(50));
    let controller = OptimizationController::new(
        run_config,
        Comparator::new(ComparatorConfig::default()),
        compiler,
        Arc::new(HangingCollector),
        analyzer,
        generator,
    );

    let report = controller
        .run(vec![unit()], profile_from_rows(40_000, &[("hot_loop", 80.0)]))
        .await
        .unwrap();

    let summary = &report.units[0];
    assert_eq!(summary.final_stage, UnitStage::Retained);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].error.contains("timed out"));
}

/// Units are independent: one unit exhausting does not stop another from
/// being promoted in the same run.
#[tokio::test]
async fn units_progress_independently() {
    let dir = tempfile::tempdir().unwrap();

    // First unit: no bottleneck. Second unit: one winning variant.
    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![None, Some(report_fixture())]));
    let generator = Arc::new(ScriptedGenerator::new(vec![vec![CandidatePatch::new(
        "Variant 1",
        "int main() {}",
        "unroll",
    )]]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());

    let mut profiles = HashMap::new();
    profiles.insert(
        "variant_1".to_string(),
        profile_from_rows(40_000, &[("hot_loop", 40.0)]),
    );
    let collector = Arc::new(ScriptedCollector::new(profiles));

    let first = unit();
    let second = SourceUnit::new("src/other.cpp", "int other() { return 1; }");

    let report = controller(dir.path(), 1, analyzer, generator, compiler, collector)
        .run(
            vec![first, second],
            profile_from_rows(40_000, &[("hot_loop", 80.0)]),
        )
        .await
        .unwrap();

    assert_eq!(report.units[0].final_stage, UnitStage::Exhausted);
    assert_eq!(report.units[1].final_stage, UnitStage::Promoted);
    assert!(report.any_promotion());
}

/// The audit tree carries every operator-facing artifact for a promoted
/// iteration.
#[tokio::test]
async fn audit_tree_layout_is_complete() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("audit");

    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![Some(report_fixture())]));
    let generator = Arc::new(ScriptedGenerator::new(vec![vec![CandidatePatch::new(
        "Variant 1",
        "int main() {}",
        "unroll",
    )]]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());
    let mut profiles = HashMap::new();
    profiles.insert(
        "variant_1".to_string(),
        profile_from_rows(40_000, &[("hot_loop", 40.0)]),
    );
    let collector = Arc::new(ScriptedCollector::new(profiles));

    controller(&out, 1, analyzer, generator, compiler, collector)
        .run(vec![unit()], profile_from_rows(40_000, &[("hot_loop", 80.0)]))
        .await
        .unwrap();

    for relative in [
        "heavy/iter_1/baseline.cpp",
        "heavy/iter_1/bottleneck.yaml",
        "heavy/iter_1/patches.yaml",
        "heavy/iter_1/variants/variant_1/heavy.cpp",
        "heavy/iter_1/variants/variant_1/profile.yaml",
        "heavy/iter_1/variants/variant_1/evaluation.yaml",
        "heavy/final_heavy.cpp",
        "summary.yaml",
        "summary.json",
    ] {
        assert!(out.join(relative).exists(), "missing {relative}");
    }
}

/// A 97% monolith split across two worker threads under new symbol names
/// still wins promotion: the comparator matches the successor by share
/// mass, not by name.
#[tokio::test]
async fn worker_split_variant_is_promoted() {
    let dir = tempfile::tempdir().unwrap();

    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![Some(report_fixture())]));
    let generator = Arc::new(ScriptedGenerator::new(vec![vec![CandidatePatch::new(
        "Variant 1",
        "// threaded rewrite\nint main() {}",
        "split the hot loop across worker threads",
    )]]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());

    let mut profiles = HashMap::new();
    profiles.insert("variant_1".to_string(), split_worker_profile());
    let collector = Arc::new(ScriptedCollector::new(profiles));

    let report = controller(dir.path(), 1, analyzer, generator, compiler, collector)
        .run(vec![unit()], monolithic_baseline())
        .await
        .unwrap();

    let summary = &report.units[0];
    assert_eq!(summary.final_stage, UnitStage::Promoted);
    assert!(summary.best_improvement_percent.unwrap() > 0.0);
    assert!(summary.failures.is_empty());
}

/// A sample-less variant profile is not comparable: the variant is
/// recorded as indeterminate and never promoted.
#[tokio::test]
async fn sampleless_profile_is_recorded_indeterminate() {
    let dir = tempfile::tempdir().unwrap();

    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![Some(report_fixture())]));
    let generator = Arc::new(ScriptedGenerator::new(vec![vec![CandidatePatch::new(
        "Variant 1",
        "int main() {}",
        "speculative rewrite",
    )]]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());

    let mut profiles = HashMap::new();
    profiles.insert("variant_1".to_string(), empty_profile());
    let collector = Arc::new(ScriptedCollector::new(profiles));

    let report = controller(dir.path(), 1, analyzer, generator, compiler, collector)
        .run(vec![unit()], monolithic_baseline())
        .await
        .unwrap();

    let summary = &report.units[0];
    assert_eq!(summary.final_stage, UnitStage::Retained);
    assert_eq!(summary.promotions, 0);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].error.contains("indeterminate"));
}

#[tokio::test]
async fn empty_unit_list_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = Arc::new(ScriptedAnalyzer::new(vec![]));
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let compiler = Arc::new(ScriptedCompiler::succeeding());
    let collector = Arc::new(ScriptedCollector::new(HashMap::new()));

    let result = controller(dir.path(), 1, analyzer, generator, compiler, collector)
        .run(vec![], profile_from_rows(40_000, &[("hot_loop", 80.0)]))
        .await;

    assert!(matches!(result, Err(RunError::NoUnits)));
}
