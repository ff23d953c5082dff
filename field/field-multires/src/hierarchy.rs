//! Hierarchy construction by greedy edge collapse, and downward propagation.

use field_graph::NodeId;
use field_surfel::{PixelInFrame, Surfel, SurfelBuilder, SurfelGraph, SurfelGraphEdge};
use hashbrown::HashMap;
use nalgebra::Vector3;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{MultiresError, MultiresResult};

/// Fine-level parents of a coarse node: one for an unmerged carry-over, two
/// for a collapsed pair.
pub type Parents = (NodeId, Option<NodeId>);

/// An ordered stack of progressively coarser surfel graphs.
///
/// Level 0 is the finest (original) graph; each generated level collapses
/// edges between coplanar, similarly-sized neighbours. The recorded parent
/// mappings let converged field state flow back down one level at a time.
#[derive(Debug, Default)]
pub struct MultiResolutionSurfelGraph {
    levels: Vec<SurfelGraph>,
    // up_mappings[i] maps a level i+1 node to its parents in level i
    up_mappings: Vec<HashMap<NodeId, Parents>>,
}

impl MultiResolutionSurfelGraph {
    /// Wrap a base graph as level 0 of a new hierarchy.
    #[must_use]
    pub fn new(base: SurfelGraph) -> Self {
        Self {
            levels: vec![base],
            up_mappings: Vec::new(),
        }
    }

    /// The number of levels, including the base.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Borrow the graph at `level`.
    ///
    /// # Errors
    ///
    /// [`MultiresError::InvalidLevel`] if out of range.
    pub fn level(&self, level: usize) -> MultiresResult<&SurfelGraph> {
        self.levels.get(level).ok_or(MultiresError::InvalidLevel(level))
    }

    /// Mutably borrow the graph at `level`.
    ///
    /// # Errors
    ///
    /// [`MultiresError::InvalidLevel`] if out of range.
    pub fn level_mut(&mut self, level: usize) -> MultiresResult<&mut SurfelGraph> {
        self.levels
            .get_mut(level)
            .ok_or(MultiresError::InvalidLevel(level))
    }

    /// The parents in level `level` of each node in level `level + 1`.
    ///
    /// # Errors
    ///
    /// [`MultiresError::InvalidLevel`] if no such transition exists.
    pub fn parents(&self, level: usize) -> MultiresResult<&HashMap<NodeId, Parents>> {
        self.up_mappings
            .get(level)
            .ok_or(MultiresError::InvalidLevel(level))
    }

    /// Coarsen until the hierarchy holds at least `num_levels` levels
    /// (including the base). A no-op when enough levels already exist.
    ///
    /// # Errors
    ///
    /// [`MultiresError::NoCommonFrame`] if a collapsing pair shares no
    /// frame; graph errors propagate.
    pub fn generate_levels(&mut self, num_levels: usize, rng: &mut impl Rng) -> MultiresResult<()> {
        debug!(num_levels, "generating hierarchy levels");
        if num_levels == 0 {
            warn!("asked to generate zero levels");
            return Ok(());
        }
        while self.levels.len() < num_levels {
            self.generate_next_level(rng)?;
        }
        Ok(())
    }

    /// Push down the converged field state of every node at `from_level` to
    /// its parents one level finer. Tangents are copied to both parents when
    /// `rosy`; lattice offsets are re-derived per parent when `posy`, wrapped
    /// back into a half-cell of spacing `rho`.
    ///
    /// # Errors
    ///
    /// [`MultiresError::InvalidLevel`] if `from_level` is 0 or out of range;
    /// [`MultiresError::MissingParents`] on a broken mapping.
    pub fn propagate(
        &mut self,
        from_level: usize,
        rosy: bool,
        posy: bool,
        rho: f32,
    ) -> MultiresResult<()> {
        if from_level == 0 || from_level >= self.levels.len() {
            return Err(MultiresError::InvalidLevel(from_level));
        }
        info!(from_level, rosy, posy, "propagating level down");

        let (finer, coarser) = self.levels.split_at_mut(from_level);
        let fine = &mut finer[from_level - 1];
        let coarse = &coarser[0];
        let mapping = &self.up_mappings[from_level - 1];

        for coarse_node in coarse.node_ids() {
            let coarse_surfel = coarse.surfel(coarse_node)?;
            let (p1, p2) = *mapping.get(&coarse_node).ok_or_else(|| {
                MultiresError::MissingParents(
                    coarse_surfel.id().to_string(),
                )
            })?;

            if rosy {
                let tangent = coarse_surfel.tangent();
                fine.surfel_mut(p1)?.set_tangent(tangent);
                if let Some(p2) = p2 {
                    fine.surfel_mut(p2)?.set_tangent(tangent);
                }
            }

            if posy {
                match p2 {
                    // An unmerged carry-over has identical geometry, so the
                    // offset transfers directly.
                    None => {
                        let offset = coarse_surfel.reference_lattice_offset();
                        fine.surfel_mut(p1)?.set_reference_lattice_offset(offset);
                    }
                    Some(p2) => {
                        let frame = *coarse_surfel.frames().first().ok_or_else(|| {
                            MultiresError::NoCommonFrame {
                                a: coarse_surfel.id().to_string(),
                                b: coarse_surfel.id().to_string(),
                            }
                        })?;
                        let reference_clp =
                            coarse_surfel.geometry_in_frame(frame)?.closest_lattice_point;
                        for parent in [p1, p2] {
                            let geometry = fine.surfel(parent)?.geometry_in_frame(frame)?;
                            let delta = reference_clp - geometry.vertex;
                            let u = wrap_half_cell(delta.dot(&geometry.tangent), rho);
                            let v = wrap_half_cell(delta.dot(&geometry.orth_tangent), rho);
                            fine.surfel_mut(parent)?
                                .set_reference_lattice_offset(nalgebra::Vector2::new(u, v));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn generate_next_level(&mut self, rng: &mut impl Rng) -> MultiresResult<()> {
        let fine = self
            .levels
            .last()
            .ok_or(MultiresError::InvalidLevel(0))?;

        // Unit dual areas and per-node mean normals drive the edge scores.
        let mut dual_area: HashMap<NodeId, f32> = HashMap::new();
        let mut mean_normal: HashMap<NodeId, Vector3<f32>> = HashMap::new();
        for node in fine.node_ids() {
            dual_area.insert(node, 1.0);
            mean_normal.insert(node, compute_mean_normal(fine.surfel(node)?));
        }

        // Score every edge, then traverse best-first. Ties resolve by the
        // surfel id pair so the order is deterministic.
        let mut scored: Vec<(NodeId, NodeId, f32, (String, String))> = Vec::new();
        for (a, b) in fine.edges() {
            let area_a = dual_area[&a];
            let area_b = dual_area[&b];
            let ratio = (area_a / area_b).min(area_b / area_a);
            let score = mean_normal[&a].dot(&mean_normal[&b]) * ratio;
            let ids = (
                fine.surfel(a)?.id().to_string(),
                fine.surfel(b)?.id().to_string(),
            );
            scored.push((a, b, score, ids));
        }
        scored.sort_by(|x, y| {
            y.2.partial_cmp(&x.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.3.cmp(&y.3))
        });

        let mut coarse = SurfelGraph::new();
        let mut fine_to_coarse: HashMap<NodeId, NodeId> = HashMap::new();
        let mut coarse_to_fine: HashMap<NodeId, Parents> = HashMap::new();

        for (a, b, score, _) in scored {
            if fine_to_coarse.contains_key(&a) || fine_to_coarse.contains_key(&b) {
                continue;
            }
            let merged = merge_surfels(
                rng,
                fine.surfel(a)?,
                dual_area[&a],
                fine.surfel(b)?,
                dual_area[&b],
            )?;
            debug!(id = %merged.id(), score, "collapsing surfel pair");
            let coarse_node = coarse.add_surfel(merged)?;
            fine_to_coarse.insert(a, coarse_node);
            fine_to_coarse.insert(b, coarse_node);
            coarse_to_fine.insert(coarse_node, (a, Some(b)));
        }

        // Nodes untouched by any collapse carry over unchanged.
        for node in fine.node_ids() {
            if fine_to_coarse.contains_key(&node) {
                continue;
            }
            let coarse_node = coarse.add_surfel(fine.surfel(node)?.clone())?;
            fine_to_coarse.insert(node, coarse_node);
            coarse_to_fine.insert(coarse_node, (node, None));
        }

        // Coarse edges are the images of fine edges, skipping self-loops and
        // duplicates.
        for node in fine.node_ids() {
            let coarse_from = fine_to_coarse[&node];
            for nbr in fine.neighbours(node)? {
                let coarse_to = fine_to_coarse[&nbr];
                if coarse_from == coarse_to || coarse.has_edge(coarse_from, coarse_to) {
                    continue;
                }
                coarse.add_edge(coarse_from, coarse_to, SurfelGraphEdge::new(1.0))?;
            }
        }

        info!(
            level = self.levels.len(),
            nodes = coarse.num_nodes(),
            "generated coarser level"
        );
        self.up_mappings.push(coarse_to_fine);
        self.levels.push(coarse);
        Ok(())
    }
}

/// Mean of a surfel's per-frame normals, or zero if they cancel out.
fn compute_mean_normal(surfel: &Surfel) -> Vector3<f32> {
    let sum: Vector3<f32> = surfel.frame_data().iter().map(|fd| fd.normal).sum();
    if sum.norm() > field_geom::EPSILON {
        sum.normalize()
    } else {
        Vector3::zeros()
    }
}

/// Area-weighted merge of two surfels over their common frames.
fn merge_surfels(
    rng: &mut impl Rng,
    a: &Surfel,
    w_a: f32,
    b: &Surfel,
    w_b: f32,
) -> MultiresResult<Surfel> {
    let common: Vec<usize> = a
        .frames()
        .iter()
        .filter(|f| b.is_in_frame(**f))
        .copied()
        .collect();
    if common.is_empty() {
        return Err(MultiresError::NoCommonFrame {
            a: a.id().to_string(),
            b: b.id().to_string(),
        });
    }

    let id = format!("({} + {})", a.id(), b.id());
    let tangent = (a.tangent() * w_a + b.tangent() * w_b).normalize();
    let offset =
        (a.reference_lattice_offset() * w_a + b.reference_lattice_offset() * w_b) / (w_a + w_b);

    let mut builder = SurfelBuilder::new(rng)
        .with_id(id)
        .with_tangent(tangent)
        .with_reference_lattice_offset(offset);
    for frame in common {
        let (vertex_a, _, normal_a) = a.vertex_tangent_normal_for_frame(frame)?;
        let (vertex_b, _, normal_b) = b.vertex_tangent_normal_for_frame(frame)?;
        let normal = (normal_a * w_a + normal_b * w_b).normalize();
        let position =
            nalgebra::Point3::from((vertex_a.coords * w_a + vertex_b.coords * w_b) / (w_a + w_b));
        builder = builder.with_frame_normal(PixelInFrame::new(0, 0, frame), 0.0, normal, position)?;
    }
    Ok(builder.build())
}

/// Wrap an offset component into `[-rho/2, rho/2)` by whole-cell shifts,
/// warning when a fix-up was applied. A non-positive spacing leaves the
/// value untouched.
fn wrap_half_cell(mut value: f32, rho: f32) -> f32 {
    if rho <= 0.0 {
        warn!(rho, "non-positive lattice spacing, offset not wrapped");
        return value;
    }
    let half = 0.5 * rho;
    let mut fixed = false;
    while value >= half {
        value -= rho;
        fixed = true;
    }
    while value < -half {
        value += rho;
        fixed = true;
    }
    if fixed {
        warn!(value, "lattice offset wrapped into half cell");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use field_surfel::FrameData;
    use nalgebra::{Matrix3, Point3, Vector2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn planar_surfel(rng: &mut StdRng, id: &str, x: f32, z: f32) -> Surfel {
        SurfelBuilder::new(rng)
            .with_id(id)
            .with_tangent(Vector3::x())
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

    fn base_pair() -> MultiResolutionSurfelGraph {
        let mut rng = StdRng::seed_from_u64(21);
        let mut graph = SurfelGraph::new();
        let a = graph
            .add_surfel(planar_surfel(&mut rng, "a", 0.0, 0.0))
            .unwrap();
        let b = graph
            .add_surfel(planar_surfel(&mut rng, "b", 1.0, 0.0))
            .unwrap();
        graph.add_edge(a, b, SurfelGraphEdge::new(1.0)).unwrap();
        MultiResolutionSurfelGraph::new(graph)
    }

    #[test]
    fn test_collapse_pair_to_single_node() {
        let mut hierarchy = base_pair();
        let mut rng = StdRng::seed_from_u64(22);
        hierarchy.generate_levels(2, &mut rng).unwrap();

        assert_eq!(hierarchy.num_levels(), 2);
        assert_eq!(hierarchy.level(1).unwrap().num_nodes(), 1);
        assert_eq!(hierarchy.level(1).unwrap().num_edges(), 0);
    }

    #[test]
    fn test_generate_levels_idempotent() {
        let mut hierarchy = base_pair();
        let mut rng = StdRng::seed_from_u64(23);
        hierarchy.generate_levels(2, &mut rng).unwrap();
        hierarchy.generate_levels(2, &mut rng).unwrap();
        assert_eq!(hierarchy.num_levels(), 2);
    }

    #[test]
    fn test_quotient_property() {
        // every fine node maps to exactly one coarse node, every coarse node
        // back to one or two fine ones
        let mut rng = StdRng::seed_from_u64(24);
        let mut graph = SurfelGraph::new();
        let nodes: Vec<NodeId> = (0..5)
            .map(|i| {
                graph
                    .add_surfel(planar_surfel(&mut rng, &format!("s{i}"), i as f32, 0.0))
                    .unwrap()
            })
            .collect();
        for w in nodes.windows(2) {
            graph
                .add_edge(w[0], w[1], SurfelGraphEdge::new(1.0))
                .unwrap();
        }
        let fine_count = graph.num_nodes();
        let mut hierarchy = MultiResolutionSurfelGraph::new(graph);
        hierarchy.generate_levels(2, &mut rng).unwrap();

        let mapping = hierarchy.parents(0).unwrap();
        let mut fine_seen = 0;
        for &(p1, p2) in mapping.values() {
            fine_seen += 1 + usize::from(p2.is_some());
            assert_ne!(Some(p1), p2);
        }
        assert_eq!(fine_seen, fine_count);
    }

    #[test]
    fn test_merge_requires_common_frame() {
        let mut rng = StdRng::seed_from_u64(25);
        let a = SurfelBuilder::new(&mut rng)
            .with_id("a")
            .with_tangent(Vector3::x())
            .with_frame(FrameData::new(
                PixelInFrame::new(0, 0, 0),
                1.0,
                Matrix3::identity(),
                Vector3::y(),
                Point3::origin(),
            ))
            .build();
        let b = SurfelBuilder::new(&mut rng)
            .with_id("b")
            .with_tangent(Vector3::x())
            .with_frame(FrameData::new(
                PixelInFrame::new(0, 0, 1),
                1.0,
                Matrix3::identity(),
                Vector3::y(),
                Point3::origin(),
            ))
            .build();
        assert!(matches!(
            merge_surfels(&mut rng, &a, 1.0, &b, 1.0),
            Err(MultiresError::NoCommonFrame { .. })
        ));
    }

    #[test]
    fn test_propagate_single_parent_copies_exactly() {
        // two disconnected nodes carry over unmerged; propagation must not
        // change their values
        let mut rng = StdRng::seed_from_u64(26);
        let mut graph = SurfelGraph::new();
        graph
            .add_surfel(planar_surfel(&mut rng, "a", 0.0, 0.0))
            .unwrap();
        graph
            .add_surfel(planar_surfel(&mut rng, "b", 5.0, 0.0))
            .unwrap();
        let mut hierarchy = MultiResolutionSurfelGraph::new(graph);
        hierarchy.generate_levels(2, &mut rng).unwrap();

        // nudge coarse values so the copy is observable
        let coarse_nodes = hierarchy.level(1).unwrap().node_ids();
        for n in &coarse_nodes {
            let s = hierarchy.level_mut(1).unwrap().surfel_mut(*n).unwrap();
            s.set_tangent(Vector3::z());
            s.set_reference_lattice_offset(Vector2::new(0.25, -0.25));
        }
        hierarchy.propagate(1, true, true, 1.0).unwrap();

        for n in hierarchy.level(0).unwrap().node_ids() {
            let s = hierarchy.level(0).unwrap().surfel(n).unwrap();
            assert_eq!(s.tangent(), Vector3::z());
            assert_eq!(s.reference_lattice_offset(), Vector2::new(0.25, -0.25));
        }
    }

    #[test]
    fn test_propagate_two_parents_wraps_offsets() {
        let mut hierarchy = base_pair();
        let mut rng = StdRng::seed_from_u64(27);
        hierarchy.generate_levels(2, &mut rng).unwrap();
        hierarchy.propagate(1, true, true, 1.0).unwrap();

        for n in hierarchy.level(0).unwrap().node_ids() {
            let off = hierarchy
                .level(0)
                .unwrap()
                .surfel(n)
                .unwrap()
                .reference_lattice_offset();
            assert!(off.x >= -0.5 && off.x < 0.5);
            assert!(off.y >= -0.5 && off.y < 0.5);
        }
    }

    #[test]
    fn test_wrap_half_cell_tolerates_zero_spacing() {
        assert_relative_eq!(wrap_half_cell(0.7, 0.0), 0.7);
        assert_relative_eq!(wrap_half_cell(-0.7, -1.0), -0.7);

        let mut hierarchy = base_pair();
        let mut rng = StdRng::seed_from_u64(29);
        hierarchy.generate_levels(2, &mut rng).unwrap();
        hierarchy.propagate(1, true, true, 0.0).unwrap();
    }

    #[test]
    fn test_mean_normal_is_unit() {
        let mut rng = StdRng::seed_from_u64(28);
        let s = planar_surfel(&mut rng, "a", 0.0, 0.0);
        assert_relative_eq!(compute_mean_normal(&s).norm(), 1.0, epsilon = 1e-6);
    }
}
