//! Profile comparison
//!
//! Decides, from two [`hotpath_profile::PerformanceProfile`]s, whether a
//! candidate build supersedes its baseline:
//!
//! - [`Comparator`]: share-mass hotspot matching + verdict classification
//! - [`EvaluationResult`]: verdict, signed improvement estimate, confidence
//!
//! The matching heuristic is deterministic on purpose: the same pair of
//! profiles always yields the same verdict, so promotion decisions can be
//! replayed from the audit trail.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod comparator;
mod evaluation;

pub use comparator::{Comparator, ComparatorConfig};
pub use evaluation::{EvaluationResult, Verdict};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
