//! Share-mass profile comparison

use crate::evaluation::{EvaluationResult, Verdict};
use hotpath_profile::{HotspotRow, PerformanceProfile};

/// Upper bound on how many candidate rows may form a successor set.
/// A dominant symbol split further than this is indistinguishable from
/// unrelated background noise.
const MAX_SUCCESSOR_ROWS: usize = 8;

/// Tunables for [`Comparator`]
#[derive(Debug, Clone)]
pub struct ComparatorConfig {
    /// Minimum share delta (percentage points) to call a verdict
    pub significance_threshold: f64,
    /// Allowed share-mass drift when matching a renamed/split successor
    pub mass_tolerance: f64,
    /// Allowed relative growth in total samples for an improvement verdict
    pub sample_slack: f64,
    /// Sample count below which confidence is scaled down
    pub min_samples: u64,
    /// Hotspot rows carried into evaluation excerpts
    pub excerpt_rows: usize,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            significance_threshold: 5.0,
            mass_tolerance: 10.0,
            sample_slack: 0.10,
            min_samples: 10,
            excerpt_rows: 5,
        }
    }
}

impl ComparatorConfig {
    /// With a different significance threshold
    #[inline]
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.significance_threshold = threshold;
        self
    }

    /// With a different successor mass tolerance
    #[inline]
    #[must_use]
    pub fn with_mass_tolerance(mut self, tolerance: f64) -> Self {
        self.mass_tolerance = tolerance;
        self
    }
}

/// Resolved successor of the baseline's dominant symbol
struct SuccessorMatch {
    /// Combined self share of the successor set
    mass: f64,
    /// Highest individual self share in the successor set
    peak: f64,
    /// Symbols forming the set, for the evaluation detail line
    symbols: Vec<String>,
    /// Whether the match came from exact symbol-name equality
    name_matched: bool,
}

/// Deterministic comparator between a baseline and a candidate profile
///
/// Alignment is by symbol name where possible, by share mass otherwise:
/// the candidate's most expensive rows are treated as the successor of the
/// baseline's dominant symbol when their combined share lands within
/// [`ComparatorConfig::mass_tolerance`] of the original share, even under
/// different names. The verdict is read off the successor set's peak
/// individual share, so a dominant symbol split across worker threads
/// registers as an improvement.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    config: ComparatorConfig,
}

impl Comparator {
    /// Create a comparator with the given tunables
    #[inline]
    #[must_use]
    pub fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    /// Access the active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Compare `candidate` against `baseline`
    ///
    /// Never panics: profiles without attributable samples produce a
    /// [`Verdict::Unknown`] result with confidence 0.
    #[must_use]
    pub fn evaluate(
        &self,
        baseline: &PerformanceProfile,
        candidate: &PerformanceProfile,
    ) -> EvaluationResult {
        if !baseline.has_samples() || !candidate.has_samples() {
            return self.indeterminate(
                baseline,
                candidate,
                0.0,
                "one side has no attributable samples",
            );
        }

        let dominant = baseline
            .dominant()
            .expect("profile with samples has a dominant row");
        if dominant.self_percent <= f64::EPSILON {
            return self.indeterminate(baseline, candidate, 0.0, "baseline dominant share is zero");
        }

        let sample_factor = self.sample_factor(baseline, candidate);

        let Some(successor) = self.resolve_successor(dominant, candidate) else {
            tracing::debug!(
                dominant = %dominant.symbol,
                "no successor set within mass tolerance"
            );
            return self.indeterminate(
                baseline,
                candidate,
                0.2 * sample_factor,
                "no candidate symbols matched the dominant share mass",
            );
        };

        let peak_drop = dominant.self_percent - successor.peak;
        let improvement_percent = peak_drop / dominant.self_percent * 100.0;
        let samples_ok = (candidate.total_samples() as f64)
            <= (baseline.total_samples() as f64) * (1.0 + self.config.sample_slack);

        let (verdict, detail) = if peak_drop >= self.config.significance_threshold {
            if samples_ok {
                (
                    Verdict::Improvement,
                    format!(
                        "dominant '{}' ({:.2}%) succeeded by [{}] peaking at {:.2}%",
                        dominant.symbol,
                        dominant.self_percent,
                        successor.symbols.join(", "),
                        successor.peak,
                    ),
                )
            } else {
                (
                    Verdict::Neutral,
                    format!(
                        "share dropped {:.2} points but sample mass grew {} -> {}",
                        peak_drop,
                        baseline.total_samples(),
                        candidate.total_samples(),
                    ),
                )
            }
        } else if -peak_drop >= self.config.significance_threshold {
            (
                Verdict::Regression,
                format!(
                    "dominant '{}' share rose {:.2} -> {:.2}",
                    dominant.symbol, dominant.self_percent, successor.peak,
                ),
            )
        } else {
            (
                Verdict::Neutral,
                format!("peak delta {peak_drop:.2} points below threshold"),
            )
        };

        let base_confidence = if successor.name_matched { 0.9 } else { 0.75 };
        tracing::debug!(
            %verdict,
            improvement_percent,
            mass = successor.mass,
            "comparison resolved"
        );

        EvaluationResult {
            verdict,
            improvement_percent,
            confidence: base_confidence * sample_factor,
            baseline_excerpt: baseline.excerpt(self.config.excerpt_rows),
            candidate_excerpt: candidate.excerpt(self.config.excerpt_rows),
            baseline_command: baseline.command().to_string(),
            candidate_command: candidate.command().to_string(),
            detail,
        }
        .clamped()
    }

    /// Resolve the dominant symbol's successor in the candidate profile
    fn resolve_successor(
        &self,
        dominant: &HotspotRow,
        candidate: &PerformanceProfile,
    ) -> Option<SuccessorMatch> {
        if let Some(share) = candidate.self_share_of(&dominant.symbol) {
            return Some(SuccessorMatch {
                mass: share,
                peak: share,
                symbols: vec![dominant.symbol.clone()],
                name_matched: true,
            });
        }

        // Name churn: greedily take the candidate's most expensive rows
        // until their combined share reaches the dominant share, then
        // accept the set only if the mass landed inside the tolerance.
        let target_low = dominant.self_percent - self.config.mass_tolerance;
        let mut mass = 0.0;
        let mut peak = 0.0_f64;
        let mut symbols = Vec::new();

        for row in candidate.by_self_share().into_iter().take(MAX_SUCCESSOR_ROWS) {
            if mass >= target_low && !symbols.is_empty() {
                break;
            }
            mass += row.self_percent;
            peak = peak.max(row.self_percent);
            symbols.push(row.symbol.clone());
        }

        let within = (mass - dominant.self_percent).abs() <= self.config.mass_tolerance;
        within.then_some(SuccessorMatch {
            mass,
            peak,
            symbols,
            name_matched: false,
        })
    }

    /// Confidence multiplier from sample counts; 1.0 once both sides have
    /// at least `min_samples` samples.
    fn sample_factor(&self, baseline: &PerformanceProfile, candidate: &PerformanceProfile) -> f64 {
        let fewest = baseline.total_samples().min(candidate.total_samples());
        if self.config.min_samples == 0 {
            return 1.0;
        }
        (fewest as f64 / self.config.min_samples as f64).min(1.0)
    }

    fn indeterminate(
        &self,
        baseline: &PerformanceProfile,
        candidate: &PerformanceProfile,
        confidence: f64,
        detail: &str,
    ) -> EvaluationResult {
        EvaluationResult {
            verdict: Verdict::Unknown,
            improvement_percent: 0.0,
            confidence,
            baseline_excerpt: baseline.excerpt(self.config.excerpt_rows),
            candidate_excerpt: candidate.excerpt(self.config.excerpt_rows),
            baseline_command: baseline.command().to_string(),
            candidate_command: candidate.command().to_string(),
            detail: detail.to_string(),
        }
        .clamped()
    }
}
