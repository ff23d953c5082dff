//! Error types for position smoothing.

use thiserror::Error;

/// Errors that can occur during position smoothing.
#[derive(Debug, Error)]
pub enum PosyError {
    /// A geometric precondition was violated.
    #[error(transparent)]
    Geom(#[from] field_geom::GeomError),

    /// A surfel graph access failed.
    #[error(transparent)]
    Surfel(#[from] field_surfel::SurfelError),
}

/// Result type for position smoothing.
pub type PosyResult<T> = std::result::Result<T, PosyError>;
