//! Error types for graph operations.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors that can occur during graph mutation or queries.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// The referenced node does not exist (never added, or removed).
    #[error("no node {0:?}")]
    NodeNotFound(NodeId),

    /// An edge between the two nodes already exists in this direction.
    #[error("edge already exists from {0:?} to {1:?}")]
    DuplicateEdge(NodeId, NodeId),

    /// No edge exists between the two nodes.
    #[error("no edge from {0:?} to {1:?}")]
    EdgeNotFound(NodeId, NodeId),
}

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;
