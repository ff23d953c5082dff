//! Generic graph over arbitrary node and edge data, with edge collapse.
//!
//! This crate provides the graph substrate for surfel field smoothing:
//!
//! - **Arena storage**: nodes live in an arena indexed by small integer
//!   [`NodeId`] handles; adjacency and edge data are keyed by handle pairs
//! - **Undirected or directed**: undirected graphs store both directions of
//!   every edge with independently cloned edge data
//! - **Edge collapse**: merge the two endpoints of an edge into a single new
//!   node under caller-supplied merge functions, reattaching surviving edges
//!
//! Structural errors (duplicate edge, missing node) are reported as
//! recoverable [`GraphError`] values so that batch operations such as
//! hierarchy coarsening can log and skip them.
//!
//! # Example
//!
//! ```
//! use field_graph::Graph;
//!
//! let mut g: Graph<&str, f32> = Graph::new_undirected();
//! let a = g.add_node("a");
//! let b = g.add_node("b");
//! g.add_edge(a, b, 1.0).unwrap();
//!
//! assert!(g.has_edge(b, a));
//! assert_eq!(g.num_nodes(), 2);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod graph;

pub use error::{GraphError, GraphResult};
pub use graph::{Graph, NodeId};
