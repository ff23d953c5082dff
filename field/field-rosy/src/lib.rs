//! Orientation field smoothing under 4-fold rotational symmetry (RoSy).
//!
//! Each surfel's tangent is one representative of the 4-element orbit of
//! quarter-turn rotations about its normal, describing an undirected cross
//! direction field. This crate provides:
//!
//! - **[`best_rosy_vector_pair`]**: brute-force search over the 16 rotation
//!   combinations for the best-aligned pair, with a selectable
//!   [`RosyPolicy`] tie-break
//! - **[`average_rosy_vectors`]**: symmetry-aware weighted tangent averaging
//! - **[`smooth_node`]**: one Gauss-Seidel smoothing step for one surfel,
//!   updating its tangent in place and labelling the processed edges
//! - **Smoothness metrics**: squared angular misalignment per node, per
//!   frame, and as a graph mean
//!
//! Updates are applied in place as nodes are visited, so later nodes in a
//! pass see their already-smoothed neighbours.
//!
//! # Example
//!
//! ```
//! use field_rosy::{best_rosy_vector_pair, RosyPolicy};
//! use nalgebra::Vector3;
//!
//! // Tangents a quarter turn apart are the same cross direction.
//! let pair = best_rosy_vector_pair(
//!     Vector3::x(),
//!     Vector3::y(),
//!     Vector3::z(),
//!     Vector3::y(),
//!     RosyPolicy::MinimumAngle,
//! )
//! .unwrap();
//! assert!((pair.target - pair.source).norm() < 1e-3);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod pair;
mod smooth;

pub use error::{RosyError, RosyResult};
pub use pair::{average_rosy_vectors, best_rosy_vector_pair, BestPair, RosyPolicy};
pub use smooth::{
    mean_smoothness, node_smoothness_for_frame, smooth_node, update_node_smoothness, RosyParams,
};
