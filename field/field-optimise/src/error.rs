use thiserror::Error;

/// Errors raised while driving an optimisation run.
#[derive(Debug, Error)]
pub enum OptimiseError {
    /// `optimise_once` was called before `set_data`.
    #[error("no surfel graph has been set")]
    NoData,

    /// An edge at level 0 joins surfels with no frame in common.
    #[error("cannot label edge between {a} and {b}: no common frame")]
    NoCommonFrame {
        /// First surfel id.
        a: String,
        /// Second surfel id.
        b: String,
    },

    /// A surfel graph operation failed.
    #[error(transparent)]
    Surfel(#[from] field_surfel::SurfelError),

    /// An orientation smoothing step failed.
    #[error(transparent)]
    Rosy(#[from] field_rosy::RosyError),

    /// A position smoothing step failed.
    #[error(transparent)]
    Posy(#[from] field_posy::PosyError),

    /// A hierarchy operation failed.
    #[error(transparent)]
    Multires(#[from] field_multires::MultiresError),
}

/// Convenience alias for optimiser results.
pub type OptimiseResult<T> = Result<T, OptimiseError>;
