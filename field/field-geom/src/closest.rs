//! Closest-pair search and centroid over small point sets.

use nalgebra::Point3;

use crate::error::{GeomError, GeomResult};

/// Find the closest pair of points between two sets by squared distance.
///
/// Brute force over `|a| * |b|` pairs. The candidate sets in the field
/// smoothers never exceed four points so the quadratic cost is immaterial.
///
/// Returns the indices of the winning pair and the squared distance.
///
/// # Errors
///
/// Returns [`GeomError::EmptyPointSet`] if either set is empty.
pub fn closest_point_pair(
    set_a: &[Point3<f32>],
    set_b: &[Point3<f32>],
) -> GeomResult<(usize, usize, f32)> {
    if set_a.is_empty() || set_b.is_empty() {
        return Err(GeomError::EmptyPointSet);
    }

    let mut best = (0, 0, f32::INFINITY);
    for (i, a) in set_a.iter().enumerate() {
        for (j, b) in set_b.iter().enumerate() {
            let d2 = (a - b).norm_squared();
            if d2 < best.2 {
                best = (i, j, d2);
            }
        }
    }
    Ok(best)
}

/// The centroid of a set of points.
///
/// # Errors
///
/// Returns [`GeomError::EmptyPointSet`] if the set is empty.
pub fn centroid(points: &[Point3<f32>]) -> GeomResult<Point3<f32>> {
    if points.is_empty() {
        return Err(GeomError::EmptyPointSet);
    }
    let mut sum = nalgebra::Vector3::zeros();
    for p in points {
        sum += p.coords;
    }
    #[allow(clippy::cast_precision_loss)]
    Ok(Point3::from(sum / points.len() as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_closest_pair_picks_minimum() {
        let a = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
        ];
        let b = vec![
            Point3::new(9.0, 0.0, 0.0),
            Point3::new(100.0, 0.0, 0.0),
        ];
        let (i, j, d2) = closest_point_pair(&a, &b).unwrap();
        assert_eq!((i, j), (1, 0));
        assert_relative_eq!(d2, 1.0);
    }

    #[test]
    fn test_closest_pair_empty_set_is_error() {
        let a: Vec<Point3<f32>> = vec![];
        let b = vec![Point3::origin()];
        assert_eq!(closest_point_pair(&a, &b), Err(GeomError::EmptyPointSet));
        assert_eq!(closest_point_pair(&b, &a), Err(GeomError::EmptyPointSet));
    }

    #[test]
    fn test_centroid() {
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 2.0),
            Point3::new(2.0, 2.0, -2.0),
        ];
        let c = centroid(&pts).unwrap();
        assert_relative_eq!(c.x, 1.0);
        assert_relative_eq!(c.y, 1.0);
        assert_relative_eq!(c.z, 0.0);
    }

    #[test]
    fn test_centroid_empty_is_error() {
        assert_eq!(centroid(&[]), Err(GeomError::EmptyPointSet));
    }
}
