//! Error types for hierarchy construction and propagation.

use thiserror::Error;

/// Errors that can occur while coarsening or propagating a hierarchy.
#[derive(Debug, Error)]
pub enum MultiresError {
    /// Two surfels being merged share no frame, so there is no geometry to
    /// average.
    #[error("no common frame between surfels {a} and {b}")]
    NoCommonFrame {
        /// Id of the first surfel.
        a: String,
        /// Id of the second surfel.
        b: String,
    },

    /// The requested level does not exist or cannot be propagated from.
    #[error("invalid level {0}")]
    InvalidLevel(usize),

    /// A coarse node has no recorded parent mapping.
    #[error("no parent mapping for coarse node {0}")]
    MissingParents(String),

    /// A surfel graph operation failed.
    #[error(transparent)]
    Surfel(#[from] field_surfel::SurfelError),

    /// A structural graph operation failed.
    #[error(transparent)]
    Graph(#[from] field_graph::GraphError),

    /// A geometric computation failed.
    #[error(transparent)]
    Geom(#[from] field_geom::GeomError),
}

/// Result type for hierarchy operations.
pub type MultiresResult<T> = std::result::Result<T, MultiresError>;
