//! Basic vector predicates, projections and the quarter-turn rotation.

use nalgebra::Vector3;

use crate::error::{GeomError, GeomResult};

/// Tolerance used by the vector predicates in this crate.
pub const EPSILON: f32 = 1e-4;

/// Check whether a vector is unit length to within [`EPSILON`].
#[must_use]
pub fn is_unit(v: Vector3<f32>) -> bool {
    (1.0 - v.norm_squared()).abs() < EPSILON
}

/// Check whether a vector is (near-)zero length.
#[must_use]
pub fn is_zero(v: Vector3<f32>) -> bool {
    v.norm_squared() < EPSILON
}

fn are_parallel(v1: Vector3<f32>, v2: Vector3<f32>) -> bool {
    (v1.normalize() - v2.normalize()).norm() < EPSILON
}

/// Project `v` into the plane whose normal is `n`, optionally renormalising.
///
/// Used pervasively to keep tangents and lattice offsets consistent with the
/// local surface normal.
#[must_use]
pub fn project_to_plane(v: Vector3<f32>, n: Vector3<f32>, normalize: bool) -> Vector3<f32> {
    let reprojected = v - v.dot(&n) * n;
    if normalize {
        reprojected.normalize()
    } else {
        reprojected
    }
}

/// Rotate `v` around the unit `axis` by `k * 90` degrees.
///
/// The rotation is one cross product and a sign flip rather than a full
/// trigonometric rotation; the result is re-projected into the plane
/// perpendicular to `axis` and renormalised.
///
/// # Errors
///
/// Returns [`GeomError::ZeroLengthVector`] if `v` is near-zero, or
/// [`GeomError::NonUnitNormal`] if `axis` is not unit length.
pub fn rotate_quarter_turn(v: Vector3<f32>, axis: Vector3<f32>, k: i32) -> GeomResult<Vector3<f32>> {
    if is_zero(v) {
        return Err(GeomError::ZeroLengthVector);
    }
    if !is_unit(axis) {
        return Err(GeomError::NonUnitNormal);
    }

    let k = k.rem_euclid(4);
    let rotated = if k & 1 != 0 { axis.cross(&v) } else { v };
    let rotated = rotated * if k < 2 { 1.0 } else { -1.0 };
    Ok(project_to_plane(rotated, axis, true))
}

/// The angle between two vectors in degrees, via `atan2(|cross|, dot)`.
///
/// Returns exactly `0.0` for (near-)parallel vectors so numerical noise
/// cannot produce a NaN.
///
/// # Errors
///
/// Returns [`GeomError::ZeroLengthVector`] if either vector is near-zero.
pub fn angle_between_vectors_degrees(v1: Vector3<f32>, v2: Vector3<f32>) -> GeomResult<f32> {
    if is_zero(v1) || is_zero(v2) {
        return Err(GeomError::ZeroLengthVector);
    }
    if are_parallel(v1, v2) {
        return Ok(0.0);
    }
    let angle = v1.cross(&v2).norm().atan2(v1.dot(&v2));
    Ok(angle.to_degrees())
}

/// Return a vector perpendicular to `v`.
///
/// Crosses with the coordinate axis least aligned with `v`.
///
/// # Errors
///
/// Returns [`GeomError::ZeroLengthVector`] if `v` is near-zero.
pub fn perpendicular_to(v: Vector3<f32>) -> GeomResult<Vector3<f32>> {
    if is_zero(v) {
        return Err(GeomError::ZeroLengthVector);
    }

    if v.x < v.y && v.x < v.z {
        return Ok(v.cross(&Vector3::new(1.0, 0.0, 0.0)));
    }
    if v.y <= v.x && v.y < v.z {
        return Ok(v.cross(&Vector3::new(0.0, 1.0, 0.0)));
    }
    Ok(v.cross(&Vector3::new(0.0, 0.0, 1.0)))
}
