//! Performance profile model
//!
//! Typed view of one sampling-profiler run over one executable:
//!
//! - [`PerformanceProfile`]: ordered hotspot table + raw report + command
//! - [`HotspotRow`]: one `(symbol, self%, children%)` entry
//! - [`parser`]: turns `perf report --stdio` text into hotspot rows
//!
//! Profiles are immutable after construction; the controller treats them as
//! snapshots and never patches a row in place.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod hotspot;
pub mod parser;

pub use error::ProfileError;
pub use hotspot::{HotspotRow, PerformanceProfile};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
