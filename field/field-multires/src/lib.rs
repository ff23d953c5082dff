//! Multi-resolution surfel graph hierarchies.
//!
//! Provides:
//! - Greedy edge-collapse coarsening driven by normal agreement and dual
//!   area ratios, with deterministic tie-breaking
//! - Parent mappings from each coarse node to the one or two fine nodes it
//!   replaced
//! - Downward propagation of converged tangents and lattice offsets, one
//!   level at a time
//!
//! # Example
//!
//! ```no_run
//! use field_multires::MultiResolutionSurfelGraph;
//! use field_surfel::SurfelGraph;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let mut hierarchy = MultiResolutionSurfelGraph::new(SurfelGraph::new());
//! hierarchy.generate_levels(3, &mut rng)?;
//! hierarchy.propagate(2, true, true, 1.0)?;
//! # Ok::<(), field_multires::MultiresError>(())
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod hierarchy;

pub use error::{MultiresError, MultiresResult};
pub use hierarchy::{MultiResolutionSurfelGraph, Parents};
