//! Rotation matrix construction.

use nalgebra::{Matrix3, Vector3};

use crate::error::{GeomError, GeomResult};
use crate::vector::{is_zero, perpendicular_to, EPSILON};

/// The skew-symmetric cross-product matrix for `v`.
#[must_use]
pub fn skew_symmetric(v: Vector3<f32>) -> Matrix3<f32> {
    Matrix3::new(
        0.0, -v.z, v.y, //
        v.z, 0.0, -v.x, //
        -v.y, v.x, 0.0,
    )
}

/// The 3x3 rotation matrix taking `v1` onto `v2`.
///
/// Identical directions return the identity; opposite directions rotate by
/// 180 degrees about an arbitrary perpendicular axis. The general case is the
/// Rodrigues construction `I + [v]x + [v]x^2 / (1 + cos)`.
///
/// # Errors
///
/// Returns [`GeomError::ZeroLengthVector`] if either vector is near-zero.
pub fn vector_to_vector_rotation(v1: Vector3<f32>, v2: Vector3<f32>) -> GeomResult<Matrix3<f32>> {
    if is_zero(v1) || is_zero(v2) {
        return Err(GeomError::ZeroLengthVector);
    }

    let vu1 = v1.normalize();
    let vu2 = v2.normalize();

    let cos_alpha = vu1.dot(&vu2);
    if (cos_alpha - 1.0).abs() < EPSILON {
        return Ok(Matrix3::identity());
    }

    if (cos_alpha + 1.0).abs() < EPSILON {
        let axis = perpendicular_to(vu1)?.normalize();
        let (ax, ay, az) = (axis.x, axis.y, axis.z);
        return Ok(Matrix3::new(
            2.0 * ax * ax - 1.0,
            2.0 * ax * ay,
            2.0 * ax * az,
            2.0 * ay * ax,
            2.0 * ay * ay - 1.0,
            2.0 * ay * az,
            2.0 * az * ax,
            2.0 * az * ay,
            2.0 * az * az - 1.0,
        ));
    }

    let axis = vu1.cross(&vu2);
    let v_x = skew_symmetric(axis);
    let v_x2 = (v_x * v_x) / (1.0 + cos_alpha);
    Ok(Matrix3::identity() + v_x + v_x2)
}

/// The rotation taking the canonical `+Y` axis onto `normal`.
///
/// This is the per-frame transform carried by surfel frame data. Coincident
/// and opposite normals take explicit branches to avoid a division by zero.
///
/// # Errors
///
/// Returns [`GeomError::ZeroLengthVector`] if `normal` is near-zero.
pub fn rotation_from_y_to(normal: Vector3<f32>) -> GeomResult<Matrix3<f32>> {
    if is_zero(normal) {
        return Err(GeomError::ZeroLengthVector);
    }
    let n = normal.normalize();
    let y = Vector3::new(0.0, 1.0, 0.0);

    let c = y.dot(&n);
    if (c - 1.0).abs() < EPSILON {
        return Ok(Matrix3::identity());
    }
    if (c + 1.0).abs() < EPSILON {
        return Ok(Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, -1.0, 0.0, //
            0.0, 0.0, 1.0,
        ));
    }

    let v = y.cross(&n);
    let skew = skew_symmetric(v);
    Ok(Matrix3::identity() + skew + (skew * skew) * (1.0 / (1.0 + c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec_eq(a: Vector3<f32>, b: Vector3<f32>) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
    }

    #[test]
    fn test_identical_directions_give_identity() {
        let v = Vector3::new(0.0, 0.0, 1.0);
        let m = vector_to_vector_rotation(v, v * 2.0).unwrap();
        assert_vec_eq(m * v, v);
        assert_relative_eq!((m - Matrix3::identity()).norm(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_opposite_directions_rotate_by_pi() {
        let v = Vector3::new(1.0, 0.0, 0.0);
        let m = vector_to_vector_rotation(v, -v).unwrap();
        assert_vec_eq(m * v, -v);
    }

    #[test]
    fn test_general_rotation_maps_v1_to_v2() {
        let v1 = Vector3::new(1.0, 0.0, 0.0);
        let v2 = Vector3::new(0.0, 0.7071068, 0.7071068);
        let m = vector_to_vector_rotation(v1, v2).unwrap();
        assert_vec_eq(m * v1, v2);
    }

    #[test]
    fn test_rotation_from_y_maps_y_to_normal() {
        for n in [
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0).normalize(),
            Vector3::new(0.2, -0.3, 0.9).normalize(),
        ] {
            let m = rotation_from_y_to(n).unwrap();
            assert_vec_eq(m * Vector3::new(0.0, 1.0, 0.0), n);
        }
    }

    #[test]
    fn test_skew_symmetric_is_cross_product() {
        let v = Vector3::new(0.5, -1.0, 2.0);
        let w = Vector3::new(-0.3, 0.7, 0.1);
        assert_vec_eq(skew_symmetric(v) * w, v.cross(&w));
    }
}
