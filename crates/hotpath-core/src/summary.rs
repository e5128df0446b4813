//! Run summaries
//!
//! The operator-facing account of a run: per unit, how many iterations
//! ran, whether anything was promoted, the best improvement observed, and
//! every partial failure, listed rather than hidden.

use crate::state::{FailureRecord, IterationState, UnitStage};
use crate::types::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Final account of one unit's loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSummary {
    /// Unit path
    pub unit: PathBuf,
    /// Stage the loop finished in
    pub final_stage: UnitStage,
    /// Iterations actually run (may be under budget on early exhaustion)
    pub iterations_run: usize,
    /// Times a variant replaced the baseline
    pub promotions: usize,
    /// Variants evaluated across all iterations
    pub evaluations: usize,
    /// Best improvement percentage observed, if any
    pub best_improvement_percent: Option<f64>,
    /// Fingerprint of the final baseline text
    pub final_fingerprint: String,
    /// Recovered failures, in occurrence order
    pub failures: Vec<FailureRecord>,
}

impl UnitSummary {
    /// Build a summary from a unit's final loop state
    #[must_use]
    pub fn from_state(state: &IterationState, final_stage: UnitStage, iterations_run: usize) -> Self {
        Self {
            unit: state.baseline().path.clone(),
            final_stage,
            iterations_run,
            promotions: state.promotions(),
            evaluations: state.history().len(),
            best_improvement_percent: state.best_improvement(),
            final_fingerprint: state.baseline().fingerprint(),
            failures: state.failures().to_vec(),
        }
    }

    /// Whether this unit was promoted at least once
    #[inline]
    #[must_use]
    pub fn was_promoted(&self) -> bool {
        self.promotions > 0
    }
}

/// Final account of one whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier
    pub run_id: RunId,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Wall-clock end
    pub finished_at: DateTime<Utc>,
    /// One summary per source unit, in processing order
    pub units: Vec<UnitSummary>,
}

impl RunReport {
    /// Whether any unit was promoted at least once
    #[must_use]
    pub fn any_promotion(&self) -> bool {
        self.units.iter().any(UnitSummary::was_promoted)
    }

    /// Total recovered failures across units
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.units.iter().map(|u| u.failures.len()).sum()
    }

    /// Render the operator-facing text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Optimization Run {}", self.run_id);
        let _ = writeln!(out, "====================================");
        let _ = writeln!(
            out,
            "Units: {}  Promoted: {}  Failures: {}",
            self.units.len(),
            self.units.iter().filter(|u| u.was_promoted()).count(),
            self.failure_count(),
        );
        for unit in &self.units {
            let best = unit
                .best_improvement_percent
                .map(|p| format!("{p:+.1}%"))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                out,
                "  {}: {} iteration(s), {} promotion(s), best {}, finished {}",
                unit.unit.display(),
                unit.iterations_run,
                unit.promotions,
                best,
                unit.final_stage,
            );
            for failure in &unit.failures {
                let _ = writeln!(
                    out,
                    "    iter {} [{}]: {}",
                    failure.iteration, failure.scope, failure.error
                );
            }
        }
        out
    }
}
