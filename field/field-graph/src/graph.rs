//! Arena-backed graph storage and the edge-collapse operator.

use hashbrown::HashMap;
use tracing::debug;

use crate::error::{GraphError, GraphResult};

/// Handle to a node in a [`Graph`].
///
/// Handles are never reused within the life of a graph; a handle whose node
/// has been removed simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The raw index of this handle.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A graph over arbitrary node data `N` and edge data `E`.
///
/// Undirected graphs store both directions of every edge, each with its own
/// clone of the edge data; keeping the two copies in sync is the caller's
/// concern (the surfel layer does so via canonicalising set helpers).
#[derive(Debug, Clone)]
pub struct Graph<N, E> {
    directed: bool,
    nodes: Vec<Option<N>>,
    live_nodes: usize,
    out_adjacency: HashMap<NodeId, Vec<NodeId>>,
    in_adjacency: HashMap<NodeId, Vec<NodeId>>,
    edges: HashMap<(NodeId, NodeId), E>,
}

impl<N, E: Clone> Default for Graph<N, E> {
    fn default() -> Self {
        Self::new_undirected()
    }
}

impl<N, E: Clone> Graph<N, E> {
    /// Create an empty undirected graph.
    #[must_use]
    pub fn new_undirected() -> Self {
        Self::new(false)
    }

    /// Create an empty directed graph.
    #[must_use]
    pub fn new_directed() -> Self {
        Self::new(true)
    }

    fn new(directed: bool) -> Self {
        Self {
            directed,
            nodes: Vec::new(),
            live_nodes: 0,
            out_adjacency: HashMap::new(),
            in_adjacency: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    /// Whether this graph is directed.
    #[must_use]
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Add a node, returning its handle. Always succeeds.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(data));
        self.live_nodes += 1;
        id
    }

    /// Whether `n` resolves to a live node.
    #[must_use]
    pub fn contains(&self, n: NodeId) -> bool {
        self.nodes.get(n.index()).is_some_and(Option::is_some)
    }

    /// Borrow the data for node `n`.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] if `n` does not resolve.
    pub fn node(&self, n: NodeId) -> GraphResult<&N> {
        self.nodes
            .get(n.index())
            .and_then(Option::as_ref)
            .ok_or(GraphError::NodeNotFound(n))
    }

    /// Mutably borrow the data for node `n`.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] if `n` does not resolve.
    pub fn node_mut(&mut self, n: NodeId) -> GraphResult<&mut N> {
        self.nodes
            .get_mut(n.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(n))
    }

    /// The number of live nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.live_nodes
    }

    /// The number of stored directed edge entries.
    ///
    /// An undirected edge contributes two entries, one per direction.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Handles of all live nodes, in insertion order.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|_| NodeId(i as u32)))
            .collect()
    }

    /// Add an edge between two existing nodes.
    ///
    /// For undirected graphs both directions are stored, each with its own
    /// clone of `data`.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] if either endpoint is missing;
    /// [`GraphError::DuplicateEdge`] if the edge already exists. On error the
    /// graph is unchanged.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, data: E) -> GraphResult<()> {
        if !self.contains(a) {
            return Err(GraphError::NodeNotFound(a));
        }
        if !self.contains(b) {
            return Err(GraphError::NodeNotFound(b));
        }
        if self.has_edge(a, b) {
            return Err(GraphError::DuplicateEdge(a, b));
        }

        self.out_adjacency.entry(a).or_default().push(b);
        self.in_adjacency.entry(b).or_default().push(a);
        if !self.directed {
            self.out_adjacency.entry(b).or_default().push(a);
            self.in_adjacency.entry(a).or_default().push(b);
            self.edges.insert((b, a), data.clone());
        }
        self.edges.insert((a, b), data);
        Ok(())
    }

    /// Whether an edge exists from `a` to `b`.
    ///
    /// Symmetric for undirected graphs.
    #[must_use]
    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        if self.edges.contains_key(&(a, b)) {
            return true;
        }
        !self.directed && self.edges.contains_key(&(b, a))
    }

    /// Borrow the edge data stored for the direction `a` to `b`.
    ///
    /// # Errors
    ///
    /// [`GraphError::EdgeNotFound`] if no such edge exists.
    pub fn edge_data(&self, a: NodeId, b: NodeId) -> GraphResult<&E> {
        self.edges.get(&(a, b)).ok_or(GraphError::EdgeNotFound(a, b))
    }

    /// Mutably borrow the edge data stored for the direction `a` to `b`.
    ///
    /// Undirected graphs keep an independent copy per direction; mutating one
    /// does not mutate the other.
    ///
    /// # Errors
    ///
    /// [`GraphError::EdgeNotFound`] if no such edge exists.
    pub fn edge_data_mut(&mut self, a: NodeId, b: NodeId) -> GraphResult<&mut E> {
        self.edges
            .get_mut(&(a, b))
            .ok_or(GraphError::EdgeNotFound(a, b))
    }

    /// Remove the edge from `a` to `b`, returning its data.
    ///
    /// For undirected graphs both directions are removed.
    ///
    /// # Errors
    ///
    /// [`GraphError::EdgeNotFound`] if no such edge exists.
    pub fn remove_edge(&mut self, a: NodeId, b: NodeId) -> GraphResult<E> {
        let data = self
            .edges
            .remove(&(a, b))
            .ok_or(GraphError::EdgeNotFound(a, b))?;
        remove_from(self.out_adjacency.get_mut(&a), b);
        remove_from(self.in_adjacency.get_mut(&b), a);
        if !self.directed {
            self.edges.remove(&(b, a));
            remove_from(self.out_adjacency.get_mut(&b), a);
            remove_from(self.in_adjacency.get_mut(&a), b);
        }
        Ok(data)
    }

    /// Remove node `n` and every incident edge, returning its data.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] if `n` does not resolve.
    pub fn remove_node(&mut self, n: NodeId) -> GraphResult<N> {
        if !self.contains(n) {
            return Err(GraphError::NodeNotFound(n));
        }

        for out in self.out_adjacency.remove(&n).unwrap_or_default() {
            self.edges.remove(&(n, out));
            remove_from(self.in_adjacency.get_mut(&out), n);
        }
        for inc in self.in_adjacency.remove(&n).unwrap_or_default() {
            self.edges.remove(&(inc, n));
            remove_from(self.out_adjacency.get_mut(&inc), n);
        }

        self.live_nodes -= 1;
        // contains() above guarantees the slot is occupied.
        Ok(self.nodes[n.index()].take().unwrap_or_else(|| unreachable!()))
    }

    /// The neighbours of `n`: nodes reachable along an edge from `n`.
    ///
    /// For directed graphs only outbound edges count.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] if `n` does not resolve.
    pub fn neighbours(&self, n: NodeId) -> GraphResult<Vec<NodeId>> {
        if !self.contains(n) {
            return Err(GraphError::NodeNotFound(n));
        }
        Ok(self.out_adjacency.get(&n).cloned().unwrap_or_default())
    }

    /// The number of neighbours of `n`, zero if `n` does not resolve.
    #[must_use]
    pub fn degree(&self, n: NodeId) -> usize {
        self.out_adjacency.get(&n).map_or(0, Vec::len)
    }

    /// All edges as `(from, to)` pairs.
    ///
    /// For undirected graphs each edge is reported once, in canonical
    /// (lower-handle-first) direction; the ordering is deterministic.
    #[must_use]
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut result: Vec<(NodeId, NodeId)> = if self.directed {
            self.edges.keys().copied().collect()
        } else {
            self.edges.keys().copied().filter(|(a, b)| a < b).collect()
        };
        result.sort_unstable();
        result
    }

    /// Collapse the edge between `a` and `b`, merging the endpoints into a
    /// single new node.
    ///
    /// The new node's data is `node_merge(&a_data, &b_data)`. Every other
    /// neighbour `n` of `a` or `b` is reattached to the new node: if `n` was
    /// adjacent to both endpoints, `edge_merge` is called exactly once with
    /// both edge datas; otherwise with the single surviving one. `a` and `b`
    /// (and their edges) are removed.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] if an endpoint is missing,
    /// [`GraphError::EdgeNotFound`] if no edge joins them.
    pub fn collapse_edge<FN, FE>(
        &mut self,
        a: NodeId,
        b: NodeId,
        node_merge: FN,
        mut edge_merge: FE,
    ) -> GraphResult<NodeId>
    where
        FN: FnOnce(&N, &N) -> N,
        FE: FnMut(&E, Option<&E>) -> E,
    {
        if !self.contains(a) {
            return Err(GraphError::NodeNotFound(a));
        }
        if !self.contains(b) {
            return Err(GraphError::NodeNotFound(b));
        }
        if !self.has_edge(a, b) {
            return Err(GraphError::EdgeNotFound(a, b));
        }

        debug!(?a, ?b, "collapsing edge");

        let merged = {
            let (data_a, data_b) = (self.node(a)?, self.node(b)?);
            node_merge(data_a, data_b)
        };

        // Surviving neighbours and their merged edge data, gathered before
        // any mutation.
        let mut nbrs: Vec<NodeId> = self.neighbours(a)?;
        for n in self.neighbours(b)? {
            if !nbrs.contains(&n) {
                nbrs.push(n);
            }
        }
        nbrs.retain(|&n| n != a && n != b);

        let mut new_edges: Vec<(NodeId, E)> = Vec::with_capacity(nbrs.len());
        for &n in &nbrs {
            let from_a = self.edges.get(&(a, n));
            let from_b = self.edges.get(&(b, n));
            let data = match (from_a, from_b) {
                (Some(ea), eb) => edge_merge(ea, eb),
                (None, Some(eb)) => edge_merge(eb, None),
                (None, None) => continue,
            };
            new_edges.push((n, data));
        }

        let new_node = self.add_node(merged);
        self.remove_node(a)?;
        self.remove_node(b)?;
        for (n, data) in new_edges {
            self.add_edge(new_node, n, data)?;
        }
        Ok(new_node)
    }
}

fn remove_from(list: Option<&mut Vec<NodeId>>, value: NodeId) {
    if let Some(list) = list {
        if let Some(pos) = list.iter().position(|&n| n == value) {
            list.swap_remove(pos);
        }
    }
}
