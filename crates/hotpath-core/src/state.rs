//! Per-unit loop stages and iteration state
//!
//! Each source unit walks `Analyzing → Generating → Materializing →
//! ProfilingVariants → Evaluating → (Promoted | Retained | Exhausted)`
//! per iteration. The transition table is explicit so an out-of-order
//! stage change is a programming error caught at the boundary, not a
//! silent skip.

use crate::types::{SourceUnit, VariantId};
use hotpath_compare::EvaluationResult;
use hotpath_profile::PerformanceProfile;
use serde::{Deserialize, Serialize};

/// Stage of one unit's loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStage {
    /// Asking the analyzer for an actionable bottleneck
    Analyzing,
    /// Asking the generator for candidate patches
    Generating,
    /// Writing the sibling batch to isolated directories
    Materializing,
    /// Compiling and profiling surviving variants
    ProfilingVariants,
    /// Comparing variant profiles against the baseline
    Evaluating,
    /// A winning variant replaced the baseline
    Promoted,
    /// No variant qualified; baseline unchanged
    Retained,
    /// Iteration budget consumed or no actionable bottleneck
    Exhausted,
}

impl std::fmt::Display for UnitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnitStage::Analyzing => "analyzing",
            UnitStage::Generating => "generating",
            UnitStage::Materializing => "materializing",
            UnitStage::ProfilingVariants => "profiling-variants",
            UnitStage::Evaluating => "evaluating",
            UnitStage::Promoted => "promoted",
            UnitStage::Retained => "retained",
            UnitStage::Exhausted => "exhausted",
        };
        write!(f, "{s}")
    }
}

/// Illegal stage transition
#[derive(Debug, thiserror::Error)]
#[error("illegal stage transition: {from} -> {to}")]
pub struct StageTransitionError {
    /// Stage the unit was in
    pub from: UnitStage,
    /// Stage that was requested
    pub to: UnitStage,
}

/// Stages reachable from `from`
#[must_use]
pub fn allowed_transitions(from: UnitStage) -> Vec<UnitStage> {
    use UnitStage::*;
    match from {
        // Retained from Analyzing/Generating is the failure downgrade: a
        // collaborator error keeps the baseline and charges the iteration.
        Analyzing => vec![Generating, Retained, Exhausted],
        Generating => vec![Materializing, Retained, Exhausted],
        Materializing => vec![ProfilingVariants],
        ProfilingVariants => vec![Evaluating],
        Evaluating => vec![Promoted, Retained],
        // A promoted or retained unit re-enters analysis on the next
        // iteration, or exhausts when the budget runs out.
        Promoted | Retained => vec![Analyzing, Exhausted],
        Exhausted => vec![],
    }
}

/// Validate one stage transition
///
/// # Errors
/// Returns [`StageTransitionError`] when `to` is not reachable from
/// `from`.
pub fn validate_transition(from: UnitStage, to: UnitStage) -> Result<(), StageTransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StageTransitionError { from, to })
    }
}

/// Scope of a recorded stage failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureScope {
    /// The whole iteration for this unit
    Iteration,
    /// One variant only
    Variant(VariantId),
}

impl std::fmt::Display for FailureScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureScope::Iteration => write!(f, "iteration"),
            FailureScope::Variant(id) => write!(f, "variant {id}"),
        }
    }
}

/// One recorded, recovered failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Iteration the failure occurred in (1-based)
    pub iteration: usize,
    /// Smallest affected unit of work
    pub scope: FailureScope,
    /// Human-readable error
    pub error: String,
}

/// One evaluated variant, selected or not
///
/// Evaluated-but-not-selected variants stay in the history; nothing is
/// discarded silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Iteration the evaluation belongs to (1-based)
    pub iteration: usize,
    /// Variant that was compared against the baseline
    pub variant_id: VariantId,
    /// Comparator output
    pub result: EvaluationResult,
    /// Whether this variant won promotion
    pub selected: bool,
}

/// Controller-owned state for one unit's loop
///
/// Exactly one baseline (text + profile) is active at any time. The two
/// are only ever replaced together through [`IterationState::promote`],
/// so a partially-swapped baseline cannot be observed.
#[derive(Debug, Clone)]
pub struct IterationState {
    baseline: SourceUnit,
    baseline_profile: PerformanceProfile,
    history: Vec<EvaluationRecord>,
    failures: Vec<FailureRecord>,
    promotions: usize,
}

impl IterationState {
    /// Enter the loop with the unit's initial snapshot and the global
    /// baseline profile.
    #[must_use]
    pub fn new(baseline: SourceUnit, baseline_profile: PerformanceProfile) -> Self {
        Self {
            baseline,
            baseline_profile,
            history: Vec::new(),
            failures: Vec::new(),
            promotions: 0,
        }
    }

    /// Current baseline snapshot
    #[inline]
    #[must_use]
    pub fn baseline(&self) -> &SourceUnit {
        &self.baseline
    }

    /// Current baseline profile
    #[inline]
    #[must_use]
    pub fn baseline_profile(&self) -> &PerformanceProfile {
        &self.baseline_profile
    }

    /// Replace the baseline text and profile together
    pub fn promote(&mut self, replacement: impl Into<String>, profile: PerformanceProfile) {
        self.baseline = self.baseline.with_text(replacement);
        self.baseline_profile = profile;
        self.promotions += 1;
    }

    /// Append an evaluation record
    pub fn record_evaluation(&mut self, record: EvaluationRecord) {
        self.history.push(record);
    }

    /// Append a recovered failure
    pub fn record_failure(&mut self, iteration: usize, scope: FailureScope, error: String) {
        self.failures.push(FailureRecord {
            iteration,
            scope,
            error,
        });
    }

    /// Ordered evaluation history
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[EvaluationRecord] {
        &self.history
    }

    /// Recorded failures
    #[inline]
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Number of promotions so far
    #[inline]
    #[must_use]
    pub fn promotions(&self) -> usize {
        self.promotions
    }

    /// Best improvement percentage observed across all evaluations
    #[must_use]
    pub fn best_improvement(&self) -> Option<f64> {
        self.history
            .iter()
            .filter(|r| r.result.verdict == hotpath_compare::Verdict::Improvement)
            .map(|r| r.result.improvement_percent)
            .max_by(f64::total_cmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotpath_compare::{EvaluationResult, Verdict};
    use hotpath_profile::{HotspotRow, PerformanceProfile};

    fn profile(rows: &[(&str, f64)]) -> PerformanceProfile {
        let hotspots = rows
            .iter()
            .map(|(s, p)| HotspotRow::new(*s, *p, *p).unwrap())
            .collect();
        PerformanceProfile::from_rows("perf report", "raw", hotspots, 40_000).unwrap()
    }

    fn evaluation(verdict: Verdict, improvement: f64) -> EvaluationResult {
        EvaluationResult {
            verdict,
            improvement_percent: improvement,
            confidence: 0.8,
            baseline_excerpt: String::new(),
            candidate_excerpt: String::new(),
            baseline_command: "perf".to_string(),
            candidate_command: "perf".to_string(),
            detail: String::new(),
        }
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        use UnitStage::*;
        for (from, to) in [
            (Analyzing, Generating),
            (Generating, Materializing),
            (Materializing, ProfilingVariants),
            (ProfilingVariants, Evaluating),
            (Evaluating, Promoted),
            (Promoted, Analyzing),
            (Retained, Analyzing),
        ] {
            assert!(validate_transition(from, to).is_ok(), "{from} -> {to}");
        }
    }

    #[test]
    fn early_exhaustion_only_from_analysis_and_generation() {
        use UnitStage::*;
        assert!(validate_transition(Analyzing, Exhausted).is_ok());
        assert!(validate_transition(Generating, Exhausted).is_ok());
        assert!(validate_transition(Materializing, Exhausted).is_err());
        assert!(validate_transition(Evaluating, Exhausted).is_err());
    }

    #[test]
    fn stage_skipping_is_illegal() {
        use UnitStage::*;
        assert!(validate_transition(Analyzing, Evaluating).is_err());
        assert!(validate_transition(Exhausted, Analyzing).is_err());
    }

    #[test]
    fn promotion_swaps_text_and_profile_together() {
        let unit = SourceUnit::new("heavy.cpp", "old text");
        let mut state = IterationState::new(unit, profile(&[("hot", 97.0)]));

        state.promote("new text", profile(&[("hot", 40.0)]));

        assert_eq!(state.baseline().text, "new text");
        assert!((state.baseline_profile().self_share_of("hot").unwrap() - 40.0).abs() < 1e-9);
        assert_eq!(state.promotions(), 1);
    }

    #[test]
    fn best_improvement_ignores_non_improvements() {
        let unit = SourceUnit::new("heavy.cpp", "text");
        let mut state = IterationState::new(unit, profile(&[("hot", 97.0)]));

        state.record_evaluation(EvaluationRecord {
            iteration: 1,
            variant_id: VariantId::new("v1"),
            result: evaluation(Verdict::Regression, -20.0),
            selected: false,
        });
        state.record_evaluation(EvaluationRecord {
            iteration: 1,
            variant_id: VariantId::new("v2"),
            result: evaluation(Verdict::Improvement, 12.0),
            selected: false,
        });
        state.record_evaluation(EvaluationRecord {
            iteration: 1,
            variant_id: VariantId::new("v3"),
            result: evaluation(Verdict::Improvement, 30.0),
            selected: true,
        });

        assert_eq!(state.best_improvement(), Some(30.0));
    }
}
