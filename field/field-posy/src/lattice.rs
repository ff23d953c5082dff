//! Lattice arithmetic in the (tangent, orth_tangent) basis.

use field_geom::closest_point_pair;
use field_surfel::FrameGeometry;
use nalgebra::{Point3, Vector2, Vector3};

use crate::error::PosyResult;

/// The point minimising summed squared distance to `vertex` and
/// `other_vertex` while lying in both tangent planes, via the closed-form
/// Lagrange-multiplier solution.
///
/// The small epsilon in the denominator keeps the expression finite when the
/// planes are near parallel; the two normal terms then cancel and the result
/// degenerates to the midpoint.
#[must_use]
pub fn compute_qij(
    vertex: Point3<f32>,
    normal: Vector3<f32>,
    other_vertex: Point3<f32>,
    other_normal: Vector3<f32>,
) -> Point3<f32> {
    let n0p0 = normal.dot(&vertex.coords);
    let n0p1 = normal.dot(&other_vertex.coords);
    let n1p0 = other_normal.dot(&vertex.coords);
    let n1p1 = other_normal.dot(&other_vertex.coords);
    let n0n1 = normal.dot(&other_normal);

    let denom = 1.0 / (1.0 - n0n1 * n0n1 + 1e-4);
    let lambda_0 = 2.0 * (n0p1 - n0p0 - n0n1 * (n1p0 - n1p1)) * denom;
    let lambda_1 = 2.0 * (n1p0 - n1p1 - n0n1 * (n0p1 - n0p0)) * denom;

    Point3::from(
        0.5 * (vertex.coords + other_vertex.coords)
            - 0.25 * (normal * lambda_0 + other_normal * lambda_1),
    )
}

/// The lattice point at the lower-left corner of the cell containing
/// `point`, on the lattice anchored at `anchor` with spacing `rho`.
#[must_use]
pub fn position_floor(
    anchor: Point3<f32>,
    tangent: Vector3<f32>,
    orth_tangent: Vector3<f32>,
    point: Point3<f32>,
    rho: f32,
) -> Point3<f32> {
    let inv_rho = 1.0 / rho;
    let d = point - anchor;
    anchor
        + tangent * (tangent.dot(&d) * inv_rho).floor() * rho
        + orth_tangent * (orth_tangent.dot(&d) * inv_rho).floor() * rho
}

/// The integer cell index of `point` relative to the lattice anchored at
/// `anchor`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn position_floor_index(
    anchor: Point3<f32>,
    tangent: Vector3<f32>,
    orth_tangent: Vector3<f32>,
    point: Point3<f32>,
    rho: f32,
) -> Vector2<i32> {
    let inv_rho = 1.0 / rho;
    let d = point - anchor;
    Vector2::new(
        (tangent.dot(&d) * inv_rho).floor() as i32,
        (orth_tangent.dot(&d) * inv_rho).floor() as i32,
    )
}

/// The lattice point nearest `point`, on the lattice anchored at `anchor`
/// with spacing `rho`.
#[must_use]
pub fn position_round(
    anchor: Point3<f32>,
    tangent: Vector3<f32>,
    orth_tangent: Vector3<f32>,
    point: Point3<f32>,
    rho: f32,
) -> Point3<f32> {
    let inv_rho = 1.0 / rho;
    let d = point - anchor;
    anchor
        + tangent * (tangent.dot(&d) * inv_rho).round() * rho
        + orth_tangent * (orth_tangent.dot(&d) * inv_rho).round() * rho
}

/// The four corners of the lattice cell containing `point`, anchored at
/// `origin`: the floored corner plus its tangent, orth-tangent, and diagonal
/// neighbours, a `rho` by `rho` square.
///
/// Corner `i` adds `tangent * rho` when bit 0 of `i` is set and
/// `orth_tangent * rho` when bit 1 is set; downstream translation search
/// relies on that encoding.
#[must_use]
pub fn compute_lattice_neighbours(
    origin: Point3<f32>,
    point: Point3<f32>,
    tangent: Vector3<f32>,
    orth_tangent: Vector3<f32>,
    rho: f32,
) -> [Point3<f32>; 4] {
    let base = position_floor(origin, tangent, orth_tangent, point, rho);
    [
        base,
        base + tangent * rho,
        base + orth_tangent * rho,
        base + tangent * rho + orth_tangent * rho,
    ]
}

/// For two neighbouring surfels, the pair of lattice points (one from each
/// surfel's lattice) closest to each other around the shared plane
/// intersection point `q_ij`.
///
/// Each [`FrameGeometry`]'s `closest_lattice_point` anchors that surfel's
/// lattice.
///
/// # Errors
///
/// Never fails in practice: the candidate sets always hold four points; the
/// `Result` propagates the empty-set precondition of the underlying search.
pub fn closest_lattice_points(
    a: &FrameGeometry,
    b: &FrameGeometry,
    rho: f32,
) -> PosyResult<(Point3<f32>, Point3<f32>)> {
    let q_ij = compute_qij(a.vertex, a.normal, b.vertex, b.normal);

    let ours = compute_lattice_neighbours(
        a.closest_lattice_point,
        q_ij,
        a.tangent,
        a.orth_tangent,
        rho,
    );
    let theirs = compute_lattice_neighbours(
        b.closest_lattice_point,
        q_ij,
        b.tangent,
        b.orth_tangent,
        rho,
    );

    let (i, j, _) = closest_point_pair(&ours, &theirs)?;
    Ok((ours[i], theirs[j]))
}

/// Resolve the integer lattice translations `(t_ij, t_ji)` aligning two
/// neighbouring lattices: each is the floor index of the shared point
/// `q_ij` plus the winning corner of the surrounding cell, found by 4x4
/// search. Also returns the winning squared distance.
#[must_use]
pub fn compute_tij_tji(
    a: &FrameGeometry,
    b: &FrameGeometry,
    rho: f32,
) -> (Vector2<i32>, Vector2<i32>, f32) {
    let q_ij = compute_qij(a.vertex, a.normal, b.vertex, b.normal);

    let t_ij_to_middle =
        position_floor_index(a.closest_lattice_point, a.tangent, a.orth_tangent, q_ij, rho);
    let t_ji_to_middle =
        position_floor_index(b.closest_lattice_point, b.tangent, b.orth_tangent, q_ij, rho);

    let mut best_cost = f32::INFINITY;
    let mut best_i = 0_i32;
    let mut best_j = 0_i32;

    for i in 0..4_i32 {
        #[allow(clippy::cast_precision_loss)]
        let o0t = a.closest_lattice_point
            + (a.tangent * ((i & 1) + t_ij_to_middle[0]) as f32
                + a.orth_tangent * (((i & 2) >> 1) + t_ij_to_middle[1]) as f32)
                * rho;
        for j in 0..4_i32 {
            #[allow(clippy::cast_precision_loss)]
            let o1t = b.closest_lattice_point
                + (b.tangent * ((j & 1) + t_ji_to_middle[0]) as f32
                    + b.orth_tangent * (((j & 2) >> 1) + t_ji_to_middle[1]) as f32)
                    * rho;
            let cost = (o0t - o1t).norm_squared();
            if cost < best_cost {
                best_cost = cost;
                best_i = i;
                best_j = j;
            }
        }
    }

    (
        Vector2::new(
            (best_i & 1) + t_ij_to_middle[0],
            ((best_i & 2) >> 1) + t_ij_to_middle[1],
        ),
        Vector2::new(
            (best_j & 1) + t_ji_to_middle[0],
            ((best_j & 2) >> 1) + t_ji_to_middle[1],
        ),
        best_cost,
    )
}
