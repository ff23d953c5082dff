//! The surfel graph: an undirected graph of surfels with an id registry.

use field_graph::{Graph, NodeId};
use hashbrown::HashMap;
use nalgebra::Vector2;
use tracing::debug;

use crate::edge::SurfelGraphEdge;
use crate::error::{SurfelError, SurfelResult};
use crate::surfel::Surfel;

/// An undirected graph of [`Surfel`] nodes and [`SurfelGraphEdge`] edges,
/// owning an id registry for by-id lookup.
///
/// The registry is scoped to this graph. It is populated as surfels are
/// added and kept consistent through collapse, so loaders can resolve
/// neighbour id lists without any global state.
#[derive(Debug, Clone, Default)]
pub struct SurfelGraph {
    graph: Graph<Surfel, SurfelGraphEdge>,
    registry: HashMap<String, NodeId>,
}

impl SurfelGraph {
    /// Create an empty surfel graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            registry: HashMap::new(),
        }
    }

    /// Add a surfel, registering its id.
    ///
    /// # Errors
    ///
    /// [`SurfelError::DuplicateId`] if a surfel with the same id is already
    /// present.
    pub fn add_surfel(&mut self, surfel: Surfel) -> SurfelResult<NodeId> {
        if self.registry.contains_key(surfel.id()) {
            return Err(SurfelError::DuplicateId(surfel.id().to_string()));
        }
        let id = surfel.id().to_string();
        let node = self.graph.add_node(surfel);
        self.registry.insert(id, node);
        Ok(node)
    }

    /// Connect two surfels.
    ///
    /// # Errors
    ///
    /// Propagates [`field_graph::GraphError`] for missing nodes or a
    /// duplicate edge.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, edge: SurfelGraphEdge) -> SurfelResult<()> {
        self.graph.add_edge(a, b, edge)?;
        Ok(())
    }

    /// Resolve a surfel id to its node handle.
    ///
    /// # Errors
    ///
    /// [`SurfelError::UnknownId`] if no such surfel is registered.
    pub fn node_for_id(&self, id: &str) -> SurfelResult<NodeId> {
        self.registry
            .get(id)
            .copied()
            .ok_or_else(|| SurfelError::UnknownId(id.to_string()))
    }

    /// Borrow the surfel at `n`.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError::NodeNotFound`] if `n` does not resolve.
    pub fn surfel(&self, n: NodeId) -> SurfelResult<&Surfel> {
        Ok(self.graph.node(n)?)
    }

    /// Mutably borrow the surfel at `n`.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError::NodeNotFound`] if `n` does not resolve.
    pub fn surfel_mut(&mut self, n: NodeId) -> SurfelResult<&mut Surfel> {
        Ok(self.graph.node_mut(n)?)
    }

    /// Borrow the edge data stored for the direction `a` to `b`.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError::EdgeNotFound`] if no such edge exists.
    pub fn edge(&self, a: NodeId, b: NodeId) -> SurfelResult<&SurfelGraphEdge> {
        Ok(self.graph.edge_data(a, b)?)
    }

    /// Handles of all surfels, in insertion order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.graph.node_ids()
    }

    /// The number of surfels.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }

    /// The number of stored directed edge entries (two per undirected pair).
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.graph.num_edges()
    }

    /// All edges, each undirected pair reported once in canonical direction.
    #[must_use]
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.graph.edges()
    }

    /// Whether an edge joins `a` and `b`.
    #[must_use]
    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.graph.has_edge(a, b)
    }

    /// The neighbours of `n`.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError::NodeNotFound`] if `n` does not resolve.
    pub fn neighbours(&self, n: NodeId) -> SurfelResult<Vec<NodeId>> {
        Ok(self.graph.neighbours(n)?)
    }

    /// The neighbours of `n` that are observed in `frame`.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError::NodeNotFound`] if `n` does not resolve.
    pub fn neighbours_in_frame(&self, n: NodeId, frame: usize) -> SurfelResult<Vec<NodeId>> {
        let mut in_frame = Vec::new();
        for nbr in self.graph.neighbours(n)? {
            if self.graph.node(nbr)?.is_in_frame(frame) {
                in_frame.push(nbr);
            }
        }
        Ok(in_frame)
    }

    /// The number of frames spanned by this graph: one past the highest
    /// frame index any surfel was observed in, zero for an empty graph.
    #[must_use]
    pub fn num_frames(&self) -> usize {
        let mut num_frames = 0;
        for n in self.graph.node_ids() {
            if let Ok(surfel) = self.graph.node(n) {
                for fd in surfel.frame_data() {
                    num_frames = num_frames.max(fd.pixel_in_frame.frame + 1);
                }
            }
        }
        num_frames
    }

    /// Store the resolved rotation indices for the edge joining `a` and `b`:
    /// `k_a` rotates `a`'s tangent, `k_b` rotates `b`'s.
    ///
    /// The pair is canonicalised by surfel id and written to both directed
    /// copies of the edge so either side reads the same values.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError`] if a node or the edge is missing.
    pub fn set_k(&mut self, a: NodeId, k_a: u16, b: NodeId, k_b: u16) -> SurfelResult<()> {
        let (k_low, k_high) = if self.low_id_first(a, b)? {
            (k_a, k_b)
        } else {
            (k_b, k_a)
        };
        self.graph.edge_data_mut(a, b)?.set_k(k_low, k_high);
        self.graph.edge_data_mut(b, a)?.set_k(k_low, k_high);
        Ok(())
    }

    /// The rotation indices for the edge joining `a` and `b`, in that order:
    /// the first element rotates `a`'s tangent.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError`] if a node or the edge is missing.
    pub fn k(&self, a: NodeId, b: NodeId) -> SurfelResult<(u16, u16)> {
        let (k_low, k_high) = self.graph.edge_data(a, b)?.k();
        if self.low_id_first(a, b)? {
            Ok((k_low, k_high))
        } else {
            Ok((k_high, k_low))
        }
    }

    /// Store the resolved lattice translations in `frame` for the edge
    /// joining `a` and `b`: `t_a` translates `a`'s lattice, `t_b` `b`'s.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError`] if a node or the edge is missing.
    pub fn set_t(
        &mut self,
        a: NodeId,
        t_a: Vector2<i32>,
        b: NodeId,
        t_b: Vector2<i32>,
        frame: usize,
    ) -> SurfelResult<()> {
        let (t_low, t_high) = if self.low_id_first(a, b)? {
            (t_a, t_b)
        } else {
            (t_b, t_a)
        };
        self.graph.edge_data_mut(a, b)?.set_t(frame, t_low, t_high);
        self.graph.edge_data_mut(b, a)?.set_t(frame, t_low, t_high);
        Ok(())
    }

    /// The lattice translations in `frame` for the edge joining `a` and `b`,
    /// in that order.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError`] if a node or the edge is missing.
    pub fn t(&self, a: NodeId, b: NodeId, frame: usize) -> SurfelResult<(Vector2<i32>, Vector2<i32>)> {
        let (t_low, t_high) = self.graph.edge_data(a, b)?.t(frame);
        if self.low_id_first(a, b)? {
            Ok((t_low, t_high))
        } else {
            Ok((t_high, t_low))
        }
    }

    /// Collapse the edge joining `a` and `b`, keeping the id registry in
    /// step: both collapsed ids are dropped and the merged surfel's id
    /// registered.
    ///
    /// # Errors
    ///
    /// [`field_graph::GraphError`] if a node or the edge is missing;
    /// [`SurfelError::DuplicateId`] if the merged surfel reuses a live id.
    pub fn collapse_edge<FN, FE>(
        &mut self,
        a: NodeId,
        b: NodeId,
        node_merge: FN,
        edge_merge: FE,
    ) -> SurfelResult<NodeId>
    where
        FN: FnOnce(&Surfel, &Surfel) -> Surfel,
        FE: FnMut(&SurfelGraphEdge, Option<&SurfelGraphEdge>) -> SurfelGraphEdge,
    {
        let id_a = self.graph.node(a)?.id().to_string();
        let id_b = self.graph.node(b)?.id().to_string();

        let merged = self.graph.collapse_edge(a, b, node_merge, edge_merge)?;
        self.registry.remove(&id_a);
        self.registry.remove(&id_b);

        let merged_id = self.graph.node(merged)?.id().to_string();
        if self.registry.contains_key(&merged_id) {
            return Err(SurfelError::DuplicateId(merged_id));
        }
        debug!(from_a = %id_a, from_b = %id_b, to = %merged_id, "collapsed surfels");
        self.registry.insert(merged_id, merged);
        Ok(merged)
    }

    fn low_id_first(&self, a: NodeId, b: NodeId) -> SurfelResult<bool> {
        Ok(self.graph.node(a)?.id() < self.graph.node(b)?.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SurfelBuilder;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn graph_of(ids: &[&str]) -> (SurfelGraph, Vec<NodeId>) {
        let mut rng = StdRng::seed_from_u64(1);
        let mut g = SurfelGraph::new();
        let nodes = ids
            .iter()
            .map(|id| {
                g.add_surfel(SurfelBuilder::new(&mut rng).with_id(*id).build())
                    .unwrap()
            })
            .collect();
        (g, nodes)
    }

    #[test]
    fn test_registry_lookup() {
        let (g, nodes) = graph_of(&["a", "b"]);
        assert_eq!(g.node_for_id("b").unwrap(), nodes[1]);
        assert!(matches!(
            g.node_for_id("zz"),
            Err(SurfelError::UnknownId(_))
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (mut g, _) = graph_of(&["a"]);
        let mut rng = StdRng::seed_from_u64(2);
        let dup = SurfelBuilder::new(&mut rng).with_id("a").build();
        assert!(matches!(
            g.add_surfel(dup),
            Err(SurfelError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_k_canonicalised_by_id() {
        let (mut g, nodes) = graph_of(&["b", "a"]);
        let (nb, na) = (nodes[0], nodes[1]);
        g.add_edge(nb, na, SurfelGraphEdge::new(1.0)).unwrap();

        // set from the higher-id side
        g.set_k(nb, 3, na, 1).unwrap();
        assert_eq!(g.k(nb, na).unwrap(), (3, 1));
        assert_eq!(g.k(na, nb).unwrap(), (1, 3));
    }

    #[test]
    fn test_t_symmetric_views() {
        let (mut g, nodes) = graph_of(&["a", "b"]);
        let (na, nb) = (nodes[0], nodes[1]);
        g.add_edge(na, nb, SurfelGraphEdge::new(1.0)).unwrap();

        g.set_t(na, Vector2::new(1, 0), nb, Vector2::new(0, -1), 2)
            .unwrap();
        assert_eq!(
            g.t(na, nb, 2).unwrap(),
            (Vector2::new(1, 0), Vector2::new(0, -1))
        );
        assert_eq!(
            g.t(nb, na, 2).unwrap(),
            (Vector2::new(0, -1), Vector2::new(1, 0))
        );
        // unset frame reads zero
        assert_eq!(
            g.t(na, nb, 0).unwrap(),
            (Vector2::zeros(), Vector2::zeros())
        );
    }

    #[test]
    fn test_num_frames_spans_all_surfels() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut g = SurfelGraph::new();
        let s = SurfelBuilder::new(&mut rng)
            .with_id("a")
            .with_frame_normal(
                crate::frame::PixelInFrame::new(0, 0, 4),
                1.0,
                nalgebra::Vector3::y(),
                nalgebra::Point3::origin(),
            )
            .unwrap()
            .build();
        g.add_surfel(s).unwrap();
        assert_eq!(g.num_frames(), 5);
    }

    #[test]
    fn test_collapse_updates_registry() {
        let (mut g, nodes) = graph_of(&["a", "b", "c"]);
        let (na, nb, nc) = (nodes[0], nodes[1], nodes[2]);
        g.add_edge(na, nb, SurfelGraphEdge::new(1.0)).unwrap();
        g.add_edge(na, nc, SurfelGraphEdge::new(1.0)).unwrap();

        let mut rng = StdRng::seed_from_u64(4);
        let merged_surfel = SurfelBuilder::new(&mut rng).with_id("ab").build();
        let merged = g
            .collapse_edge(na, nb, move |_, _| merged_surfel, |e, _| e.clone())
            .unwrap();

        assert_eq!(g.node_for_id("ab").unwrap(), merged);
        assert!(g.node_for_id("a").is_err());
        assert!(g.node_for_id("b").is_err());
        assert!(g.has_edge(merged, nc));
    }
}
