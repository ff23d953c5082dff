//! Geometry kernel for surfel field smoothing.
//!
//! This crate provides the small set of vector and rotation utilities shared
//! by the RoSy (orientation) and PoSy (position) smoothing engines:
//!
//! - **Quarter-turn rotation**: rotate a tangent about a normal by `k * 90`
//!   degrees without trigonometry
//! - **Plane projection**: keep tangents and lattice offsets consistent with
//!   the local surface normal
//! - **Vector-to-vector rotation**: build the 3x3 matrix taking one direction
//!   onto another, with explicit parallel/antiparallel handling
//! - **Closest point pair**: brute-force search over small candidate sets
//!
//! All operations are `f32`, matching the surfel field data they act on.
//!
//! # Example
//!
//! ```
//! use nalgebra::Vector3;
//! use field_geom::{rotate_quarter_turn, angle_between_vectors_degrees};
//!
//! let t = Vector3::new(1.0, 0.0, 0.0);
//! let n = Vector3::new(0.0, 1.0, 0.0);
//!
//! // Four quarter turns bring the tangent back to itself.
//! let back = rotate_quarter_turn(t, n, 4).unwrap();
//! assert!(angle_between_vectors_degrees(t, back).unwrap() < 1e-3);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod closest;
mod error;
mod rotation;
mod vector;

pub use closest::{centroid, closest_point_pair};
pub use error::{GeomError, GeomResult};
pub use rotation::{rotation_from_y_to, skew_symmetric, vector_to_vector_rotation};
pub use vector::{
    angle_between_vectors_degrees, is_unit, is_zero, perpendicular_to, project_to_plane,
    rotate_quarter_turn, EPSILON,
};
