//! Evaluation outcome types

use serde::{Deserialize, Serialize};

/// Classification of a candidate relative to its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Candidate measurably beats the baseline
    Improvement,
    /// Candidate measurably regresses the baseline
    Regression,
    /// Delta below the significance threshold either way
    Neutral,
    /// Profiles could not be compared (no samples, no matching symbols)
    Unknown,
}

impl Verdict {
    /// Boolean-or-unknown improvement flag
    #[inline]
    #[must_use]
    pub fn is_improvement(&self) -> Option<bool> {
        match self {
            Verdict::Improvement => Some(true),
            Verdict::Regression | Verdict::Neutral => Some(false),
            Verdict::Unknown => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Improvement => "improvement",
            Verdict::Regression => "regression",
            Verdict::Neutral => "neutral",
            Verdict::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Outcome of comparing one candidate profile against one baseline profile
///
/// References exactly one baseline and one candidate measurement, carried
/// here as the profiler command lines plus top-of-table excerpts so the
/// record stays self-describing when serialized into the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Classification of the candidate
    pub verdict: Verdict,
    /// Signed estimate, positive = candidate is better (percent)
    pub improvement_percent: f64,
    /// Confidence in the verdict, always within `[0, 1]`
    pub confidence: f64,
    /// Top hotspot lines from the baseline profile
    pub baseline_excerpt: String,
    /// Top hotspot lines from the candidate profile
    pub candidate_excerpt: String,
    /// Command that produced the baseline profile
    pub baseline_command: String,
    /// Command that produced the candidate profile
    pub candidate_command: String,
    /// One-line explanation of how the verdict was reached
    pub detail: String,
}

impl EvaluationResult {
    /// Clamp confidence into `[0, 1]` at construction
    #[must_use]
    pub(crate) fn clamped(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}
