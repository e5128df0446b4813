//! Parser for `perf report --stdio` overhead tables
//!
//! Accepts both report shapes the collector produces:
//! self-only tables (`--no-children`) and children+self tables. Rows the
//! parser cannot recognize are skipped with a trace, never a failure;
//! profiler output carries comment banners and blank separators between
//! rows.

use crate::error::ProfileError;
use crate::hotspot::HotspotRow;
use once_cell::sync::Lazy;
use regex::Regex;

/// `# Samples: 40K of event 'cycles:u'`
static SAMPLES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#\s*Samples:\s*([0-9]+(?:\.[0-9]+)?)\s*([KMG]?)\b").expect("samples regex")
});

/// `    99.10%    97.03%  object  [.] symbol` (children + self)
static TWO_SHARE_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9]+\.[0-9]+)%\s+([0-9]+\.[0-9]+)%\s+.*?\[[^\]]\]\s+(.+?)\s*$")
        .expect("two-share row regex")
});

/// `    97.03%  object  [.] symbol` (self only)
static ONE_SHARE_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9]+\.[0-9]+)%\s+.*?\[[^\]]\]\s+(.+?)\s*$").expect("one-share row regex")
});

/// Result of parsing one report document
#[derive(Debug, Clone)]
pub struct ParsedReport {
    /// Hotspot rows in report order
    pub rows: Vec<HotspotRow>,
    /// Total attributed samples from the `# Samples:` banner (0 if absent)
    pub total_samples: u64,
}

/// Parse a textual report into hotspot rows and a sample count
///
/// # Errors
/// Returns [`ProfileError::NoOverheadTable`] when the text has neither a
/// samples banner nor a single parseable row; a banner with zero rows is a
/// valid empty profile.
pub fn parse_report(report: &str) -> Result<ParsedReport, ProfileError> {
    let total_samples = parse_sample_banner(report);
    let mut rows = Vec::new();

    for line in report.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(caps) = TWO_SHARE_ROW_RE.captures(line) {
            let children: f64 = caps[1].parse().unwrap_or(0.0);
            let own: f64 = caps[2].parse().unwrap_or(0.0);
            rows.push(HotspotRow::new(&caps[3], own, children)?);
        } else if let Some(caps) = ONE_SHARE_ROW_RE.captures(line) {
            let own: f64 = caps[1].parse().unwrap_or(0.0);
            // No children column: carry the self share in both fields.
            rows.push(HotspotRow::new(&caps[2], own, own)?);
        } else {
            tracing::trace!(line, "skipping unrecognized report line");
        }
    }

    if rows.is_empty() && total_samples.is_none() {
        return Err(ProfileError::NoOverheadTable);
    }

    Ok(ParsedReport {
        rows,
        total_samples: total_samples.unwrap_or(0),
    })
}

fn parse_sample_banner(report: &str) -> Option<u64> {
    let caps = SAMPLES_RE.captures(report)?;
    let value: f64 = caps[1].parse().ok()?;
    let multiplier = match &caps[2] {
        "K" => 1_000.0,
        "M" => 1_000_000.0,
        "G" => 1_000_000_000.0,
        _ => 1.0,
    };
    Some((value * multiplier) as u64)
}
