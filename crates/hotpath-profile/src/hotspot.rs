//! Hotspot table and profile snapshot types

use crate::error::ProfileError;
use serde::{Deserialize, Serialize};

/// One row of a profile's hotspot table
///
/// Shares are percentages in `[0, 100]`. Reports produced without a
/// children column carry the self share in both fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotRow {
    /// Symbol name as reported by the profiler
    pub symbol: String,
    /// Share of samples attributed directly to this symbol
    pub self_percent: f64,
    /// Share of samples attributed to this symbol and its callees
    pub children_percent: f64,
}

impl HotspotRow {
    /// Create a validated row
    ///
    /// # Errors
    /// Returns [`ProfileError::ShareOutOfRange`] if either share falls
    /// outside `[0, 100]`.
    pub fn new(
        symbol: impl Into<String>,
        self_percent: f64,
        children_percent: f64,
    ) -> Result<Self, ProfileError> {
        let symbol = symbol.into();
        for value in [self_percent, children_percent] {
            if !(0.0..=100.0).contains(&value) || value.is_nan() {
                return Err(ProfileError::ShareOutOfRange { symbol, value });
            }
        }
        Ok(Self {
            symbol,
            self_percent,
            children_percent,
        })
    }
}

/// Structured summary of where CPU time went in one executable run
///
/// Produced once per (executable, iteration) and immutable afterwards.
/// Row order is the profiler's own ordering (most expensive first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceProfile {
    hotspots: Vec<HotspotRow>,
    raw_report: String,
    command: String,
    total_samples: u64,
}

impl PerformanceProfile {
    /// Build a profile from already-parsed rows
    ///
    /// # Errors
    /// Returns [`ProfileError::EmptyCommand`] if `command` is blank.
    pub fn from_rows(
        command: impl Into<String>,
        raw_report: impl Into<String>,
        hotspots: Vec<HotspotRow>,
        total_samples: u64,
    ) -> Result<Self, ProfileError> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(ProfileError::EmptyCommand);
        }
        Ok(Self {
            hotspots,
            raw_report: raw_report.into(),
            command,
            total_samples,
        })
    }

    /// Parse a textual `perf report --stdio` document
    ///
    /// # Errors
    /// Propagates parser errors; an overhead table with zero rows is a
    /// valid (empty) profile, not an error.
    pub fn parse(
        command: impl Into<String>,
        raw_report: impl Into<String>,
    ) -> Result<Self, ProfileError> {
        let raw_report = raw_report.into();
        let parsed = crate::parser::parse_report(&raw_report)?;
        Self::from_rows(command, raw_report, parsed.rows, parsed.total_samples)
    }

    /// Ordered hotspot rows, most expensive first
    #[inline]
    #[must_use]
    pub fn hotspots(&self) -> &[HotspotRow] {
        &self.hotspots
    }

    /// Raw textual report the table was parsed from
    #[inline]
    #[must_use]
    pub fn raw_report(&self) -> &str {
        &self.raw_report
    }

    /// Exact command line used to produce this profile
    #[inline]
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Total samples attributed by the profiler
    #[inline]
    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Whether any samples were attributed at all
    #[inline]
    #[must_use]
    pub fn has_samples(&self) -> bool {
        self.total_samples > 0 && !self.hotspots.is_empty()
    }

    /// The most expensive row by self share, if any
    #[must_use]
    pub fn dominant(&self) -> Option<&HotspotRow> {
        self.hotspots
            .iter()
            .max_by(|a, b| a.self_percent.total_cmp(&b.self_percent))
    }

    /// Rows sorted by descending self share
    ///
    /// The profiler usually emits rows already sorted; this re-sorts
    /// defensively so callers can rely on the ordering.
    #[must_use]
    pub fn by_self_share(&self) -> Vec<&HotspotRow> {
        let mut rows: Vec<&HotspotRow> = self.hotspots.iter().collect();
        rows.sort_by(|a, b| b.self_percent.total_cmp(&a.self_percent));
        rows
    }

    /// Share of the row matching `symbol` exactly, if present
    #[must_use]
    pub fn self_share_of(&self, symbol: &str) -> Option<f64> {
        self.hotspots
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| r.self_percent)
    }

    /// Human-readable excerpt of the top `n` rows
    ///
    /// Used by evaluation records so operators can see both sides of a
    /// comparison without re-opening raw reports.
    #[must_use]
    pub fn excerpt(&self, n: usize) -> String {
        let mut out = String::new();
        for row in self.by_self_share().into_iter().take(n) {
            out.push_str(&format!("{:>7.2}%  {}\n", row.self_percent, row.symbol));
        }
        out
    }
}
