//! Error types for the table cache and the analytics facade.

use std::fmt;

/// Result type for cache and analytics operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for table-cache.
///
/// Only genuine fallback failures cross the cache boundary. Stale entries and
/// index desynchronization are repaired internally and never show up here.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Data repository error (database, etc).
    ///
    /// Raised by a fallback or miss hook and returned to the caller unmodified.
    /// The cache does not retry it and does not cache anything for the lookup.
    RepositoryError(String),

    /// Optional repository capability is not available.
    ///
    /// Returned by the default `DataRepository::fetch_all()`.
    NotImplemented(String),

    /// A cache name is already bound to a different entity type in this
    /// unit of work.
    ///
    /// Two `CacheEntity` types returned the same `cache_prefix()`.
    ///
    /// **Recovery:** Give each entity type a distinct prefix.
    StoreTypeMismatch {
        /// The conflicting cache name
        cache: String,
    },

    /// Configuration error.
    ///
    /// Common causes:
    /// - Malformed configuration JSON
    /// - Out-of-range setting (e.g. zero stale retries)
    ConfigError(String),

    /// No analytics provider factory is registered for a protocol.
    ProviderNotFound(String),

    /// An analytics provider rejected its integration configuration.
    CannotLoadConfiguration(String),

    /// An analytics provider failed while collecting an event.
    ProviderError(String),

    /// Generic error with custom message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::StoreTypeMismatch { cache } => {
                write!(
                    f,
                    "Cache '{}' is already registered for a different entity type",
                    cache
                )
            }
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::ProviderNotFound(protocol) => {
                write!(f, "No analytics provider registered for '{}'", protocol)
            }
            Error::CannotLoadConfiguration(msg) => {
                write!(f, "Cannot load configuration: {}", msg)
            }
            Error::ProviderError(msg) => write!(f, "Provider error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RepositoryError("connection reset".to_string());
        assert_eq!(err.to_string(), "Repository error: connection reset");
    }

    #[test]
    fn test_store_type_mismatch_display() {
        let err = Error::StoreTypeMismatch {
            cache: "library".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cache 'library' is already registered for a different entity type"
        );
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "test error".into();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
