//! Surfel domain types for orientation/position field optimisation.
//!
//! A *surfel* is a point sample of a surface observed in one or more frames,
//! carrying the evolving orientation-field tangent and position-field lattice
//! offset. This crate provides:
//!
//! - **[`Surfel`]** with per-frame [`FrameData`] observations and derived
//!   in-frame geometry ([`FrameGeometry`])
//! - **[`SurfelBuilder`]** with randomised defaults drawn from a caller RNG
//! - **[`SurfelGraphEdge`]** holding the resolved symmetry labels `k` and `t`
//! - **[`SurfelGraph`]**, an undirected graph of surfels with a graph-scoped
//!   id registry
//!
//! # Example
//!
//! ```
//! use field_surfel::{SurfelBuilder, SurfelGraph, SurfelGraphEdge};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut graph = SurfelGraph::new();
//! let a = graph
//!     .add_surfel(SurfelBuilder::new(&mut rng).with_id("a").build())
//!     .unwrap();
//! let b = graph
//!     .add_surfel(SurfelBuilder::new(&mut rng).with_id("b").build())
//!     .unwrap();
//! graph.add_edge(a, b, SurfelGraphEdge::new(1.0)).unwrap();
//!
//! assert_eq!(graph.node_for_id("a").unwrap(), a);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod builder;
mod edge;
mod error;
mod frame;
mod graph;
mod surfel;

pub use builder::SurfelBuilder;
pub use edge::SurfelGraphEdge;
pub use error::{SurfelError, SurfelResult};
pub use frame::{FrameData, PixelInFrame};
pub use graph::SurfelGraph;
pub use surfel::{FrameGeometry, Surfel};

// Re-exported so downstream crates can name graph handles without a direct
// field-graph dependency.
pub use field_graph::NodeId;
