//! Error types shared by the catalog, assembler and extraction crates.

use thiserror::Error;

/// Result type alias using Is2Error.
pub type Is2Result<T> = Result<T, Is2Error>;

/// Primary error type for gridded land ice operations.
///
/// Empty results are never represented here: a catalog query matching no
/// granules, a geometry outside the dataset bounds, or a polygon covering
/// zero cells all return empty collections that callers must check.
#[derive(Debug, Error)]
pub enum Is2Error {
    /// Malformed selector or query parameters. Fatal, not retryable.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Network or catalog service failure. Retryable by the caller.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Grid spacing or origin mismatch during merge. Never resampled.
    #[error("incompatible grids: expected {expected}, found {found}")]
    IncompatibleGrid { expected: String, found: String },

    /// Storage backend or I/O failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid or missing granule metadata.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Failed to read grid data from an opened granule.
    #[error("failed to read grid data: {0}")]
    ReadFailed(String),
}

impl Is2Error {
    /// Create an InvalidQuery error.
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Create a CatalogUnavailable error.
    pub fn catalog_unavailable(msg: impl Into<String>) -> Self {
        Self::CatalogUnavailable(msg.into())
    }

    /// Create an IncompatibleGrid error.
    pub fn incompatible_grid(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::IncompatibleGrid {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a Metadata error.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Whether the caller may retry the failed operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CatalogUnavailable(_))
    }
}

impl From<std::io::Error> for Is2Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Is2Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Is2Error::catalog_unavailable("timed out").is_retryable());
        assert!(!Is2Error::invalid_query("bad release").is_retryable());
        assert!(!Is2Error::incompatible_grid("10km", "20km").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Is2Error::incompatible_grid("spacing 10000", "spacing 20000");
        assert_eq!(
            err.to_string(),
            "incompatible grids: expected spacing 10000, found spacing 20000"
        );
    }
}
