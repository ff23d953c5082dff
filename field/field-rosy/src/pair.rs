//! Best-aligned tangent pair search under 4-fold rotational symmetry.

use field_geom::{
    angle_between_vectors_degrees, project_to_plane, rotate_quarter_turn, EPSILON,
};
use nalgebra::Vector3;

use crate::error::RosyResult;

/// Tie-break policy for the 4x4 rotation search.
///
/// Both policies agree away from ties; they differ only in how near-equal
/// candidates are resolved. Smoothing uses [`MinimumAngle`]; the dot-product
/// form accepts a new winner only when it beats the incumbent by [`EPSILON`].
///
/// [`MinimumAngle`]: RosyPolicy::MinimumAngle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RosyPolicy {
    /// Strictly smaller angle between the rotated pair wins.
    #[default]
    MinimumAngle,
    /// Larger dot product wins, by at least an epsilon margin.
    MaximumDot,
}

/// The winning rotated pair from a [`best_rosy_vector_pair`] search.
#[derive(Debug, Clone, Copy)]
pub struct BestPair {
    /// The target tangent under its winning rotation.
    pub target: Vector3<f32>,
    /// The source tangent under its winning rotation.
    pub source: Vector3<f32>,
    /// Quarter turns applied to the target tangent.
    pub k_ij: u16,
    /// Quarter turns applied to the source tangent.
    pub k_ji: u16,
}

/// Search the 16 combinations of quarter-turn rotations of two tangents for
/// the best-aligned pair.
///
/// `o_i`/`n_i` are the target tangent and its unit normal, `o_j`/`n_j` the
/// source pair.
///
/// # Errors
///
/// [`field_geom::GeomError`] if a tangent is near zero length or a normal is
/// not unit length.
pub fn best_rosy_vector_pair(
    o_i: Vector3<f32>,
    n_i: Vector3<f32>,
    o_j: Vector3<f32>,
    n_j: Vector3<f32>,
    policy: RosyPolicy,
) -> RosyResult<BestPair> {
    let mut best = BestPair {
        target: o_i,
        source: o_j,
        k_ij: 0,
        k_ji: 0,
    };
    let mut best_theta = f32::INFINITY;
    let mut best_dot = f32::NEG_INFINITY;

    for k_ij in 0..4_u16 {
        let test_o_i = rotate_quarter_turn(o_i, n_i, i32::from(k_ij))?;
        for k_ji in 0..4_u16 {
            let test_o_j = rotate_quarter_turn(o_j, n_j, i32::from(k_ji))?;

            let wins = match policy {
                RosyPolicy::MinimumAngle => {
                    let theta = angle_between_vectors_degrees(test_o_i, test_o_j)?;
                    if theta < best_theta {
                        best_theta = theta;
                        true
                    } else {
                        false
                    }
                }
                RosyPolicy::MaximumDot => {
                    let dot = test_o_i.dot(&test_o_j);
                    if dot > best_dot + EPSILON {
                        best_dot = dot;
                        true
                    } else {
                        false
                    }
                }
            };
            if wins {
                best = BestPair {
                    target: test_o_i,
                    source: test_o_j,
                    k_ij,
                    k_ji,
                };
            }
        }
    }
    Ok(best)
}

/// Fold a weighted source tangent into a target tangent after aligning the
/// pair under rotational symmetry; the result is re-projected to the
/// target's tangent plane and renormalised.
///
/// # Errors
///
/// [`field_geom::GeomError`] as for [`best_rosy_vector_pair`].
pub fn average_rosy_vectors(
    v1: Vector3<f32>,
    n1: Vector3<f32>,
    w1: f32,
    v2: Vector3<f32>,
    n2: Vector3<f32>,
    w2: f32,
) -> RosyResult<(Vector3<f32>, BestPair)> {
    let pair = best_rosy_vector_pair(v1, n1, v2, n2, RosyPolicy::MinimumAngle)?;
    let combined = pair.target * w1 + pair.source * w2;
    Ok((project_to_plane(combined, n1, true), pair))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_aligned_pair_needs_no_rotation() {
        let t = Vector3::x();
        let n = Vector3::y();
        let pair = best_rosy_vector_pair(t, n, t, n, RosyPolicy::MinimumAngle).unwrap();
        assert_eq!(pair.k_ij, 0);
        assert_eq!(pair.k_ji, 0);
        assert_relative_eq!((pair.target - pair.source).norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_quarter_turned_pair_resolves_under_symmetry() {
        let n = Vector3::y();
        let t_i = Vector3::x();
        // 90 degrees off: identical under the cross-field symmetry
        let t_j = Vector3::z();
        let pair = best_rosy_vector_pair(t_i, n, t_j, n, RosyPolicy::MinimumAngle).unwrap();
        let theta = angle_between_vectors_degrees(pair.target, pair.source).unwrap();
        assert_relative_eq!(theta, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_policies_agree_off_tie_set() {
        let n = Vector3::y();
        let t_i = Vector3::x();
        for deg in [10.0_f32, 25.0, 40.0, 75.0, 130.0, 200.0] {
            let rad = deg.to_radians();
            let t_j = Vector3::new(rad.cos(), 0.0, rad.sin());
            let by_angle =
                best_rosy_vector_pair(t_i, n, t_j, n, RosyPolicy::MinimumAngle).unwrap();
            let by_dot = best_rosy_vector_pair(t_i, n, t_j, n, RosyPolicy::MaximumDot).unwrap();
            let theta_angle =
                angle_between_vectors_degrees(by_angle.target, by_angle.source).unwrap();
            let theta_dot = angle_between_vectors_degrees(by_dot.target, by_dot.source).unwrap();
            assert_relative_eq!(theta_angle, theta_dot, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_average_weighted_towards_heavier_vector() {
        let n = Vector3::y();
        let v1 = Vector3::x();
        let rad = 30.0_f32.to_radians();
        let v2 = Vector3::new(rad.cos(), 0.0, rad.sin());

        let (avg, _) = average_rosy_vectors(v1, n, 3.0, v2, n, 1.0).unwrap();
        let to_v1 = angle_between_vectors_degrees(avg, v1).unwrap();
        let to_v2 = angle_between_vectors_degrees(avg, v2).unwrap();
        assert!(to_v1 < to_v2);
        assert_relative_eq!(avg.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_tangent_is_error() {
        let n = Vector3::y();
        assert!(best_rosy_vector_pair(
            Vector3::zeros(),
            n,
            Vector3::x(),
            n,
            RosyPolicy::MinimumAngle
        )
        .is_err());
    }
}
