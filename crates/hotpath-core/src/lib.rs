//! hotpath core - optimization-loop orchestration
//!
//! The stateful controller that drives iterative performance
//! optimization of native executables:
//! - Sequences analysis, variant generation, materialization, variant
//!   profiling, and evaluation per source unit per iteration
//! - Tracks the current best-known baseline per unit and promotes
//!   winning variants atomically
//! - Downgrades collaborator failures to recorded, recoverable events
//! - Serializes a per-run audit tree operators can replay
//!
//! # Example
//!
//! ```rust,ignore
//! use hotpath_core::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::new("out").with_iterations(3);
//! let controller = OptimizationController::new(
//!     config, comparator, compiler, collector, analyzer, generator,
//! );
//! let report = controller.run(units, baseline_profile).await?;
//! println!("{}", report.generate_text());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod audit;
pub mod collaborators;
pub mod controller;
pub mod error;
pub mod materializer;
pub mod pool;
pub mod sim;
pub mod state;
pub mod summary;
pub mod types;

// Re-exports for convenience
pub use audit::AuditWriter;
pub use collaborators::{
    call_with_timeout, BottleneckAnalyzer, CollabError, Compiler, ProfileCollector,
    VariantGenerator,
};
pub use controller::OptimizationController;
pub use error::{RunError, StageError, StageKind};
pub use materializer::{MaterializedVariant, VariantMaterializer, WriteStatus};
pub use pool::ProfilingPool;
pub use state::{
    allowed_transitions, validate_transition, EvaluationRecord, FailureRecord, FailureScope,
    IterationState, StageTransitionError, UnitStage,
};
pub use summary::{RunReport, UnitSummary};
pub use types::{
    BottleneckReport, CandidatePatch, RunConfig, RunId, SourceUnit, UnitKind, VariantId,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the optimization loop
    pub use crate::{
        BottleneckAnalyzer, BottleneckReport, CandidatePatch, Compiler, OptimizationController,
        ProfileCollector, RunConfig, RunReport, SourceUnit, UnitStage, VariantGenerator,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
