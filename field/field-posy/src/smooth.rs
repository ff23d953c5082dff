//! Per-node position smoothing and smoothness metrics.

use field_surfel::{NodeId, SurfelGraph};
use nalgebra::{Point3, Vector2};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::PosyResult;
use crate::lattice::{closest_lattice_points, position_round};

/// Tuning for the position smoothing pass.
#[derive(Debug, Clone, Copy)]
pub struct PosyParams {
    /// Lattice spacing.
    pub rho: f32,
    /// Visit each node's neighbours in random order.
    pub randomise_neighbour_order: bool,
}

impl Default for PosyParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            randomise_neighbour_order: false,
        }
    }
}

/// Smooth one surfel's lattice offset against all neighbours in every frame
/// it appears in, updating the stored 2D offset in place.
///
/// Per frame, the walk starts from the surfel's current closest lattice
/// point; each neighbour contributes the closest pair of lattice points
/// around the shared plane intersection, folded into a running weighted
/// average that is re-projected to the surfel's tangent plane and re-rounded
/// to its lattice after every neighbour.
///
/// # Errors
///
/// Propagates graph access and geometry precondition failures.
pub fn smooth_node(
    graph: &mut SurfelGraph,
    node: NodeId,
    params: &PosyParams,
    rng: &mut impl Rng,
) -> PosyResult<()> {
    let this_surfel = graph.surfel(node)?.clone();
    let lattice_offset = this_surfel.reference_lattice_offset();

    for &frame in this_surfel.frames() {
        let geometry = this_surfel.geometry_in_frame(frame)?;
        let mut working_clp = geometry.closest_lattice_point;

        let mut neighbours = graph.neighbours_in_frame(node, frame)?;
        if params.randomise_neighbour_order {
            neighbours.shuffle(rng);
        }

        let mut sum_w = 0.0_f32;
        for nbr in neighbours {
            let nbr_geometry = graph.surfel(nbr)?.geometry_in_frame(frame)?;

            let mut ours = geometry;
            ours.closest_lattice_point = working_clp;
            let (our_point, their_point) =
                closest_lattice_points(&ours, &nbr_geometry, params.rho)?;

            let w_j = 1.0_f32;
            let blended =
                (our_point.coords * sum_w + their_point.coords * w_j) / (sum_w + w_j);
            sum_w += w_j;
            working_clp = Point3::from(blended);

            // keep the average on this surfel's tangent plane
            working_clp -=
                geometry.normal.dot(&(working_clp - geometry.vertex)) * geometry.normal;

            // snap the vertex onto the lattice the average now defines
            working_clp = position_round(
                working_clp,
                geometry.tangent,
                geometry.orth_tangent,
                geometry.vertex,
                params.rho,
            );
        }

        let clp_offset = working_clp - geometry.vertex;
        let u = clp_offset.dot(&geometry.tangent);
        let v = clp_offset.dot(&geometry.orth_tangent);
        graph
            .surfel_mut(node)?
            .set_reference_lattice_offset(Vector2::new(u, v));
    }

    debug!(
        id = %this_surfel.id(),
        from = ?lattice_offset,
        to = ?graph.surfel(node)?.reference_lattice_offset(),
        "posy node smoothed"
    );
    Ok(())
}

/// Sum of squared distances between `node`'s and each in-frame neighbour's
/// closest lattice points, and the neighbour count.
///
/// # Errors
///
/// Propagates graph access and geometry precondition failures.
pub fn node_smoothness_for_frame(
    graph: &SurfelGraph,
    node: NodeId,
    frame: usize,
    rho: f32,
) -> PosyResult<(f32, usize)> {
    let geometry = graph.surfel(node)?.geometry_in_frame(frame)?;
    let neighbours = graph.neighbours_in_frame(node, frame)?;

    let mut smoothness = 0.0_f32;
    for &nbr in &neighbours {
        let nbr_geometry = graph.surfel(nbr)?.geometry_in_frame(frame)?;
        let (ours, theirs) = closest_lattice_points(&geometry, &nbr_geometry, rho)?;
        smoothness += (ours - theirs).norm_squared();
    }
    Ok((smoothness, neighbours.len()))
}

/// Recompute and store `node`'s mean position smoothness across all its
/// frames, returning the new value.
///
/// # Errors
///
/// Propagates graph access and geometry precondition failures.
pub fn update_node_smoothness(graph: &mut SurfelGraph, node: NodeId, rho: f32) -> PosyResult<f32> {
    let frames = graph.surfel(node)?.frames().to_vec();
    let mut total = 0.0_f32;
    let mut num_neighbours = 0_usize;
    for frame in frames {
        let (smoothness, count) = node_smoothness_for_frame(graph, node, frame, rho)?;
        total += smoothness;
        num_neighbours += count;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = if num_neighbours == 0 {
        0.0
    } else {
        total / num_neighbours as f32
    };
    graph.surfel_mut(node)?.set_posy_smoothness(mean);
    Ok(mean)
}

/// Recompute every node's position smoothness and return the graph mean.
/// An empty graph scores zero.
///
/// # Errors
///
/// Propagates graph access and geometry precondition failures.
pub fn mean_smoothness(graph: &mut SurfelGraph, rho: f32) -> PosyResult<f32> {
    let nodes = graph.node_ids();
    if nodes.is_empty() {
        return Ok(0.0);
    }
    let mut total = 0.0_f32;
    for node in &nodes {
        total += update_node_smoothness(graph, *node, rho)?;
    }
    #[allow(clippy::cast_precision_loss)]
    Ok(total / nodes.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use field_surfel::{FrameData, PixelInFrame, Surfel, SurfelBuilder, SurfelGraphEdge};
    use nalgebra::{Matrix3, Vector3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn planar_surfel(
        rng: &mut StdRng,
        id: &str,
        x: f32,
        z: f32,
        offset: Vector2<f32>,
    ) -> Surfel {
        SurfelBuilder::new(rng)
            .with_id(id)
            .with_tangent(Vector3::x())
            .with_reference_lattice_offset(offset)
            .with_frame(FrameData::new(
                PixelInFrame::new(0, 0, 0),
                1.0,
                Matrix3::identity(),
                Vector3::y(),
                Point3::new(x, 0.0, z),
            ))
            .build()
    }

    fn pair_graph(offset_b: Vector2<f32>) -> (SurfelGraph, NodeId, NodeId) {
        let mut rng = StdRng::seed_from_u64(11);
        let mut graph = SurfelGraph::new();
        let a = graph
            .add_surfel(planar_surfel(&mut rng, "a", 0.0, 0.0, Vector2::zeros()))
            .unwrap();
        let b = graph
            .add_surfel(planar_surfel(&mut rng, "b", 1.0, 0.0, offset_b))
            .unwrap();
        graph.add_edge(a, b, SurfelGraphEdge::new(1.0)).unwrap();
        (graph, a, b)
    }

    #[test]
    fn test_aligned_lattices_have_zero_smoothness() {
        let (mut graph, _, _) = pair_graph(Vector2::zeros());
        let mean = mean_smoothness(&mut graph, 1.0).unwrap();
        assert_relative_eq!(mean, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_smoothing_reduces_lattice_disagreement() {
        let (mut graph, a, b) = pair_graph(Vector2::new(0.4, 0.3));
        let mut rng = StdRng::seed_from_u64(12);
        let params = PosyParams::default();

        let before = mean_smoothness(&mut graph, params.rho).unwrap();
        for _ in 0..4 {
            smooth_node(&mut graph, a, &params, &mut rng).unwrap();
            smooth_node(&mut graph, b, &params, &mut rng).unwrap();
        }
        let after = mean_smoothness(&mut graph, params.rho).unwrap();
        assert!(after <= before);
    }

    #[test]
    fn test_smoothing_records_correction() {
        let (mut graph, a, _) = pair_graph(Vector2::new(0.4, 0.3));
        let mut rng = StdRng::seed_from_u64(13);
        smooth_node(&mut graph, a, &PosyParams::default(), &mut rng).unwrap();
        // the offset was rewritten, so a correction was recorded
        let correction = graph.surfel(a).unwrap().posy_correction();
        assert!(correction.norm() < 1.0);
    }

    #[test]
    fn test_offset_stays_within_cell() {
        let (mut graph, a, b) = pair_graph(Vector2::new(0.45, -0.45));
        let mut rng = StdRng::seed_from_u64(14);
        let params = PosyParams::default();
        for _ in 0..3 {
            smooth_node(&mut graph, a, &params, &mut rng).unwrap();
            smooth_node(&mut graph, b, &params, &mut rng).unwrap();
        }
        for n in [a, b] {
            let off = graph.surfel(n).unwrap().reference_lattice_offset();
            assert!(off.x.abs() <= 0.5 + 1e-4);
            assert!(off.y.abs() <= 0.5 + 1e-4);
        }
    }
}
