//! Per-node orientation smoothing and smoothness metrics.

use field_geom::{angle_between_vectors_degrees, project_to_plane};
use field_surfel::{NodeId, Surfel, SurfelGraph};
use nalgebra::Vector3;
use tracing::debug;

use crate::error::RosyResult;
use crate::pair::{average_rosy_vectors, best_rosy_vector_pair, RosyPolicy};

/// Tuning for the orientation smoothing pass.
#[derive(Debug, Clone, Copy)]
pub struct RosyParams {
    /// Blend factor applied against the previous tangent before the final
    /// re-projection; `None` disables damping.
    pub damping_factor: Option<f32>,
    /// Shift neighbour weights toward the smoother surfel of each pair.
    pub weight_for_error: bool,
    /// Number of passes over which error-based weighting reaches full
    /// strength.
    pub weight_for_error_steps: u32,
}

impl Default for RosyParams {
    fn default() -> Self {
        Self {
            damping_factor: None,
            weight_for_error: false,
            weight_for_error_steps: 1,
        }
    }
}

/// Neighbour weights for one smoothing step. Defaults to `(1, 1)`; with
/// error weighting enabled, the smoother surfel's opinion counts for more,
/// ramping in over the configured number of passes.
#[allow(clippy::cast_precision_loss)]
fn weights(a: &Surfel, b: &Surfel, params: &RosyParams, pass: u32) -> (f32, f32) {
    if !params.weight_for_error {
        return (1.0, 1.0);
    }
    let total = a.rosy_smoothness() + b.rosy_smoothness();
    if total <= f32::EPSILON {
        return (1.0, 1.0);
    }
    let ramp = (pass as f32 / params.weight_for_error_steps.max(1) as f32).min(1.0);
    // Lower error earns higher weight; the pair always sums to 2.
    let w_a = 1.0 + ramp * (b.rosy_smoothness() * 2.0 / total - 1.0);
    (w_a, 2.0 - w_a)
}

/// Smooth one surfel's canonical tangent against all neighbours in every
/// frame it appears in, updating the tangent in place and storing the
/// resolved rotation indices on each processed edge.
///
/// Works in the surfel's local space: neighbour tangents and normals are
/// carried over via the shared frame's transforms, and the running average
/// is kept perpendicular to the canonical `+Y` normal.
///
/// # Errors
///
/// Propagates graph access and geometry precondition failures.
pub fn smooth_node(
    graph: &mut SurfelGraph,
    node: NodeId,
    params: &RosyParams,
    pass: u32,
) -> RosyResult<()> {
    let this_surfel = graph.surfel(node)?.clone();
    let old_tangent = this_surfel.tangent();
    let mut new_tangent = old_tangent;
    let mut weight_sum = 0.0_f32;
    let mut resolved_k: Vec<(NodeId, u16, u16)> = Vec::new();

    for &frame in this_surfel.frames() {
        for nbr in graph.neighbours_in_frame(node, frame)? {
            let nbr_surfel = graph.surfel(nbr)?;
            let (_, w_ji) = weights(&this_surfel, nbr_surfel, params, pass);

            let (nbr_normal, nbr_tangent) =
                this_surfel.transform_neighbour_into_frame(nbr_surfel, frame)?;

            let (avg, pair) = average_rosy_vectors(
                new_tangent,
                Vector3::y(),
                weight_sum,
                nbr_tangent,
                nbr_normal,
                w_ji,
            )?;
            new_tangent = avg;
            weight_sum += w_ji;
            resolved_k.push((nbr, pair.k_ij, pair.k_ji));
        }
    }

    if let Some(damping) = params.damping_factor {
        new_tangent = project_to_plane(
            old_tangent * damping + new_tangent * (1.0 - damping),
            Vector3::y(),
            true,
        );
    }

    for (nbr, k_ij, k_ji) in resolved_k {
        graph.set_k(node, k_ij, nbr, k_ji)?;
    }

    let pair = best_rosy_vector_pair(
        new_tangent,
        Vector3::y(),
        old_tangent,
        Vector3::y(),
        RosyPolicy::MinimumAngle,
    )?;
    let correction = angle_between_vectors_degrees(pair.target, pair.source)? % 90.0;
    debug!(id = %this_surfel.id(), correction, "rosy node smoothed");

    let surfel = graph.surfel_mut(node)?;
    surfel.set_tangent(new_tangent);
    surfel.set_rosy_correction(correction);
    Ok(())
}

/// Sum of squared angular misalignments between `node` and its neighbours
/// visible in `frame`, and the neighbour count.
///
/// # Errors
///
/// Propagates graph access and geometry precondition failures.
pub fn node_smoothness_for_frame(
    graph: &SurfelGraph,
    node: NodeId,
    frame: usize,
) -> RosyResult<(f32, usize)> {
    let (_, tangent, normal) = graph.surfel(node)?.vertex_tangent_normal_for_frame(frame)?;

    let neighbours = graph.neighbours_in_frame(node, frame)?;
    let mut smoothness = 0.0_f32;
    for &nbr in &neighbours {
        let (_, nbr_tangent, nbr_normal) =
            graph.surfel(nbr)?.vertex_tangent_normal_for_frame(frame)?;
        let pair = best_rosy_vector_pair(
            tangent,
            normal,
            nbr_tangent,
            nbr_normal,
            RosyPolicy::MinimumAngle,
        )?;
        let theta = angle_between_vectors_degrees(pair.target, pair.source)?;
        smoothness += theta * theta;
    }
    Ok((smoothness, neighbours.len()))
}

/// Recompute and store `node`'s mean orientation smoothness across all its
/// frames, returning the new value. Nodes with no neighbours score zero.
///
/// # Errors
///
/// Propagates graph access and geometry precondition failures.
pub fn update_node_smoothness(graph: &mut SurfelGraph, node: NodeId) -> RosyResult<f32> {
    let frames = graph.surfel(node)?.frames().to_vec();
    let mut total = 0.0_f32;
    let mut num_neighbours = 0_usize;
    for frame in frames {
        let (smoothness, count) = node_smoothness_for_frame(graph, node, frame)?;
        total += smoothness;
        num_neighbours += count;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = if num_neighbours == 0 {
        0.0
    } else {
        total / num_neighbours as f32
    };
    graph.surfel_mut(node)?.set_rosy_smoothness(mean);
    Ok(mean)
}

/// Recompute every node's orientation smoothness and return the graph mean.
/// An empty graph scores zero.
///
/// # Errors
///
/// Propagates graph access and geometry precondition failures.
pub fn mean_smoothness(graph: &mut SurfelGraph) -> RosyResult<f32> {
    let nodes = graph.node_ids();
    if nodes.is_empty() {
        return Ok(0.0);
    }
    let mut total = 0.0_f32;
    for node in &nodes {
        total += update_node_smoothness(graph, *node)?;
    }
    #[allow(clippy::cast_precision_loss)]
    Ok(total / nodes.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use field_surfel::{FrameData, PixelInFrame, SurfelBuilder, SurfelGraphEdge};
    use nalgebra::{Matrix3, Point3, Vector2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn planar_surfel(rng: &mut StdRng, id: &str, x: f32, z: f32, tangent: Vector3<f32>) -> Surfel {
        SurfelBuilder::new(rng)
            .with_id(id)
            .with_tangent(tangent)
            .with_reference_lattice_offset(Vector2::zeros())
            .with_frame(FrameData::new(
                PixelInFrame::new(0, 0, 0),
                1.0,
                Matrix3::identity(),
                Vector3::y(),
                Point3::new(x, 0.0, z),
            ))
            .build()
    }

    fn grid_graph(tangents: &[Vector3<f32>]) -> (SurfelGraph, Vec<NodeId>) {
        // 2x2 planar grid, 4-connected
        let mut rng = StdRng::seed_from_u64(9);
        let mut graph = SurfelGraph::new();
        let coords = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
        let nodes: Vec<NodeId> = coords
            .iter()
            .zip(tangents)
            .enumerate()
            .map(|(i, (&(x, z), &t))| {
                graph
                    .add_surfel(planar_surfel(&mut rng, &format!("s{i}"), x, z, t))
                    .unwrap()
            })
            .collect();
        for (a, b) in [(0, 1), (0, 2), (1, 3), (2, 3)] {
            graph
                .add_edge(nodes[a], nodes[b], SurfelGraphEdge::new(1.0))
                .unwrap();
        }
        (graph, nodes)
    }

    #[test]
    fn test_aligned_grid_has_zero_smoothness() {
        let (mut graph, _) = grid_graph(&[Vector3::x(); 4]);
        let mean = mean_smoothness(&mut graph).unwrap();
        assert_relative_eq!(mean, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_symmetry_equivalent_grid_has_zero_smoothness() {
        // Tangents 90 degrees apart are the same cross direction.
        let (mut graph, _) = grid_graph(&[Vector3::x(), Vector3::z(), Vector3::x(), Vector3::z()]);
        let mean = mean_smoothness(&mut graph).unwrap();
        assert_relative_eq!(mean, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_smoothing_reduces_misalignment() {
        let rad = 30.0_f32.to_radians();
        let skewed = Vector3::new(rad.cos(), 0.0, rad.sin());
        let (mut graph, nodes) =
            grid_graph(&[Vector3::x(), Vector3::x(), Vector3::x(), skewed]);

        let before = mean_smoothness(&mut graph).unwrap();
        for _ in 0..8 {
            for &n in &nodes {
                smooth_node(&mut graph, n, &RosyParams::default(), 0).unwrap();
            }
        }
        let after = mean_smoothness(&mut graph).unwrap();
        assert!(after < before);
    }

    #[test]
    fn test_smoothing_stores_edge_k() {
        let (mut graph, nodes) =
            grid_graph(&[Vector3::x(), Vector3::z(), Vector3::x(), Vector3::x()]);
        smooth_node(&mut graph, nodes[0], &RosyParams::default(), 0).unwrap();
        // The pair is resolvable with quarter turns, so some k was stored.
        let (k_ab, k_ba) = graph.k(nodes[0], nodes[1]).unwrap();
        assert!(k_ab < 4 && k_ba < 4);
    }

    #[test]
    fn test_damping_keeps_tangent_unit() {
        let rad = 45.0_f32.to_radians();
        let skewed = Vector3::new(rad.cos(), 0.0, rad.sin());
        let (mut graph, nodes) =
            grid_graph(&[skewed, Vector3::x(), Vector3::x(), Vector3::x()]);
        let params = RosyParams {
            damping_factor: Some(0.5),
            ..RosyParams::default()
        };
        smooth_node(&mut graph, nodes[0], &params, 0).unwrap();
        let tangent = graph.surfel(nodes[0]).unwrap().tangent();
        assert_relative_eq!(tangent.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_error_weighted_fold_accumulates_neighbour_weight() {
        // With asymmetric weights the running average must advance by the
        // weight each neighbour was folded in with.
        let mut rng = StdRng::seed_from_u64(11);
        let rad_a = 20.0_f32.to_radians();
        let rad_b = 40.0_f32.to_radians();
        let tangent_a = Vector3::new(rad_a.cos(), 0.0, rad_a.sin());
        let tangent_b = Vector3::new(rad_b.cos(), 0.0, rad_b.sin());

        let mut graph = SurfelGraph::new();
        let centre = graph
            .add_surfel(planar_surfel(&mut rng, "c", 0.0, 0.0, Vector3::x()))
            .unwrap();
        let near = graph
            .add_surfel(planar_surfel(&mut rng, "a", 1.0, 0.0, tangent_a))
            .unwrap();
        let far = graph
            .add_surfel(planar_surfel(&mut rng, "b", 0.0, 1.0, tangent_b))
            .unwrap();
        graph.surfel_mut(centre).unwrap().set_rosy_smoothness(50.0);
        graph.surfel_mut(near).unwrap().set_rosy_smoothness(0.0);
        graph.surfel_mut(far).unwrap().set_rosy_smoothness(100.0);
        graph
            .add_edge(centre, near, SurfelGraphEdge::new(1.0))
            .unwrap();
        graph
            .add_edge(centre, far, SurfelGraphEdge::new(1.0))
            .unwrap();

        let params = RosyParams {
            weight_for_error: true,
            weight_for_error_steps: 1,
            ..RosyParams::default()
        };
        let centre_surfel = graph.surfel(centre).unwrap().clone();
        let (_, w_near) = weights(&centre_surfel, graph.surfel(near).unwrap(), &params, 1);
        let (_, w_far) = weights(&centre_surfel, graph.surfel(far).unwrap(), &params, 1);
        assert!(w_near != w_far);

        let (step, _) = average_rosy_vectors(
            Vector3::x(),
            Vector3::y(),
            0.0,
            tangent_a,
            Vector3::y(),
            w_near,
        )
        .unwrap();
        let (expected, _) =
            average_rosy_vectors(step, Vector3::y(), w_near, tangent_b, Vector3::y(), w_far)
                .unwrap();

        smooth_node(&mut graph, centre, &params, 1).unwrap();
        let tangent = graph.surfel(centre).unwrap().tangent();
        assert_relative_eq!(tangent, expected, epsilon = 1e-5);
    }

    #[test]
    fn test_error_weights_favour_smoother_surfel() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut rough = planar_surfel(&mut rng, "r", 0.0, 0.0, Vector3::x());
        let mut smooth = planar_surfel(&mut rng, "s", 1.0, 0.0, Vector3::x());
        rough.set_rosy_smoothness(100.0);
        smooth.set_rosy_smoothness(0.0);

        let params = RosyParams {
            weight_for_error: true,
            weight_for_error_steps: 1,
            ..RosyParams::default()
        };
        let (w_rough, w_smooth) = weights(&rough, &smooth, &params, 1);
        assert!(w_smooth > w_rough);
        assert_relative_eq!(w_rough + w_smooth, 2.0, epsilon = 1e-5);
    }
}
