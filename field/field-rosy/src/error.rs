//! Error types for orientation smoothing.

use thiserror::Error;

/// Errors that can occur during orientation smoothing.
#[derive(Debug, Error)]
pub enum RosyError {
    /// A geometric precondition was violated.
    #[error(transparent)]
    Geom(#[from] field_geom::GeomError),

    /// A surfel graph access failed.
    #[error(transparent)]
    Surfel(#[from] field_surfel::SurfelError),
}

/// Result type for orientation smoothing.
pub type RosyResult<T> = std::result::Result<T, RosyError>;
