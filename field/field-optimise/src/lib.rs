//! Driver for surfel field optimisation.
//!
//! Provides:
//! - A cooperative, single-stepped state machine alternating orientation and
//!   position smoothing passes over a multi-resolution hierarchy
//! - Configurable termination criteria, node selection strategies, and
//!   cancellation tokens
//! - A final labelling pass storing resolved rotation and lattice
//!   translation indices on every base-level edge
//!
//! # Example
//!
//! ```no_run
//! use field_optimise::{FieldOptimiser, OptimiserParams, SelectionStrategy};
//! use field_surfel::SurfelGraph;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let params = OptimiserParams::default()
//!     .with_rho(1.0)
//!     .with_termination_criteria("absolute,relative")
//!     .with_selection(SelectionStrategy::AllInRandomOrder);
//! let mut optimiser = FieldOptimiser::new(params, StdRng::seed_from_u64(42));
//! optimiser.set_data(SurfelGraph::new());
//! while !optimiser.optimise_once()? {}
//! # Ok::<(), field_optimise::OptimiseError>(())
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod cancel;
mod error;
mod optimiser;
mod params;

pub use cancel::{CancelFlag, CancelToken, NeverCancel, SentinelFileCancel};
pub use error::{OptimiseError, OptimiseResult};
pub use optimiser::{FieldOptimiser, OptimisationResult, OptimiserState};
pub use params::{OptimiserParams, SelectionStrategy, TerminationCriteria};
