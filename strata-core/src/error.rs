//! Error types for STRATA operations

use thiserror::Error;

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cannot store object of type '{actual}' using key expecting type '{expected}'")]
    TypeMismatch { expected: String, actual: String },

    #[error("Object of type '{class}' has no primary key and cannot be cached")]
    MissingPrimaryKey { class: String },

    #[error("Regeneration failed for {class}@{criteria}: {reason}")]
    RegenerationFailed {
        class: String,
        criteria: String,
        reason: String,
    },

    #[error("LRU eviction freed nothing with {remaining_bytes} bytes still over the ceiling")]
    EvictionStalled { remaining_bytes: u64 },

    #[error("Background scheduler already stopped")]
    SchedulerStopped,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown cache scope: {value}")]
    UnknownScope { value: String },
}

/// Master error type for all STRATA errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrataError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for STRATA operations.
pub type StrataResult<T> = Result<T, StrataError>;

impl StrataError {
    /// Shorthand for a regeneration failure raised by a persistence layer.
    pub fn regeneration(
        class: impl Into<String>,
        criteria: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        StrataError::Cache(CacheError::RegenerationFailed {
            class: class.into(),
            criteria: criteria.into(),
            reason: reason.into(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_display() {
        let err = CacheError::TypeMismatch {
            expected: "StockPrice".to_string(),
            actual: "Quote".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("'Quote'"));
        assert!(msg.contains("expecting type 'StockPrice'"));
    }

    #[test]
    fn test_strata_error_from_cache_error() {
        let err: StrataError = CacheError::MissingPrimaryKey {
            class: "StockPrice".to_string(),
        }
        .into();
        assert!(matches!(err, StrataError::Cache(CacheError::MissingPrimaryKey { .. })));
        assert!(format!("{}", err).starts_with("Cache error:"));
    }

    #[test]
    fn test_strata_error_from_config_error() {
        let err: StrataError = ConfigError::UnknownScope {
            value: "FOREVER".to_string(),
        }
        .into();
        assert_eq!(format!("{}", err), "Config error: Unknown cache scope: FOREVER");
    }

    #[test]
    fn test_regeneration_shorthand() {
        let err = StrataError::regeneration("StockPrice", "[7]", "connection refused");
        match err {
            StrataError::Cache(CacheError::RegenerationFailed { class, criteria, reason }) => {
                assert_eq!(class, "StockPrice");
                assert_eq!(criteria, "[7]");
                assert_eq!(reason, "connection refused");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
