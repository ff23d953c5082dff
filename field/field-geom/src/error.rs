//! Error types for geometry operations.

use thiserror::Error;

/// Errors that can occur in geometry kernel operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeomError {
    /// A vector argument was (near-)zero length where a direction is required.
    #[error("vector may not be zero length")]
    ZeroLengthVector,

    /// A normal/axis argument was not unit length.
    #[error("normal must be a unit vector")]
    NonUnitNormal,

    /// A point set argument was empty.
    #[error("point set may not be empty")]
    EmptyPointSet,
}

/// Result type for geometry operations.
pub type GeomResult<T> = std::result::Result<T, GeomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", GeomError::ZeroLengthVector),
            "vector may not be zero length"
        );
        assert_eq!(
            format!("{}", GeomError::NonUnitNormal),
            "normal must be a unit vector"
        );
    }
}
