//! Error types for surfel graph operations.

use thiserror::Error;

/// Errors that can occur while building or querying a surfel graph.
#[derive(Debug, Error)]
pub enum SurfelError {
    /// The surfel is not present in the requested frame.
    #[error("surfel {id} not in frame {frame}")]
    NotInFrame {
        /// Id of the surfel queried.
        id: String,
        /// The frame index requested.
        frame: usize,
    },

    /// A surfel with this id is already registered in the graph.
    #[error("duplicate surfel id {0}")]
    DuplicateId(String),

    /// No surfel with this id is registered in the graph.
    #[error("unknown surfel id {0}")]
    UnknownId(String),

    /// A structural graph operation failed.
    #[error(transparent)]
    Graph(#[from] field_graph::GraphError),

    /// A geometric computation on surfel data failed.
    #[error(transparent)]
    Geom(#[from] field_geom::GeomError),
}

/// Result type for surfel graph operations.
pub type SurfelResult<T> = std::result::Result<T, SurfelError>;
