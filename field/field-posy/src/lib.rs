//! Position field smoothing under 4-fold translational lattice symmetry
//! (PoSy).
//!
//! Each surfel carries a 2D offset in its (tangent, orth_tangent) basis
//! locating a closest lattice point in 3D. Neighbouring lattices are
//! reconciled modulo integer cell translations, the positional analogue of
//! the rotational cross-field symmetry. This crate provides:
//!
//! - **[`compute_qij`]**: the closed-form point on both tangent planes
//!   nearest two neighbouring surfels
//! - **Lattice arithmetic**: [`position_floor`], [`position_round`],
//!   [`position_floor_index`], [`compute_lattice_neighbours`]
//! - **[`closest_lattice_points`]**: the 4x4 corner search pairing two
//!   neighbouring lattices
//! - **[`compute_tij_tji`]**: integer lattice-cell translations labelling an
//!   edge
//! - **[`smooth_node`]**: one Gauss-Seidel smoothing step for one surfel's
//!   lattice offset, and the matching smoothness metrics
//!
//! # Example
//!
//! ```
//! use field_posy::compute_lattice_neighbours;
//! use nalgebra::{Point3, Vector3};
//!
//! let corners = compute_lattice_neighbours(
//!     Point3::origin(),
//!     Point3::new(0.3, 0.0, 0.4),
//!     Vector3::x(),
//!     Vector3::z(),
//!     1.0,
//! );
//! assert_eq!(corners.len(), 4);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod lattice;
mod smooth;

pub use error::{PosyError, PosyResult};
pub use lattice::{
    closest_lattice_points, compute_lattice_neighbours, compute_qij, compute_tij_tji,
    position_floor, position_floor_index, position_round,
};
pub use smooth::{
    mean_smoothness, node_smoothness_for_frame, smooth_node, update_node_smoothness, PosyParams,
};
