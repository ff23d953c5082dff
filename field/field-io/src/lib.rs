//! Binary serialization for surfel graphs.
//!
//! Provides:
//! - A compact little-endian file format for surfel graphs, with optional
//!   smoothness and edge-labelling sections selected by a flags word
//! - Lean snapshots that rebuild edges from per-node neighbour lists
//! - Full round-trip of ids, frame data, tangents, lattice offsets, and
//!   per-edge rotation and translation labels
//!
//! # Example
//!
//! ```no_run
//! use field_io::{load_surfel_graph, save_surfel_graph, GraphFileFlags};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(17);
//! let (graph, flags) = load_surfel_graph("scene.bin", &mut rng)?;
//! save_surfel_graph(&graph, "snapshot.bin", flags)?;
//! # Ok::<(), field_io::IoError>(())
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod graph_file;

pub use error::{IoError, IoResult};
pub use graph_file::{load_surfel_graph, save_surfel_graph, GraphFileFlags};
