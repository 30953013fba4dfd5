//! Error types for novyny.

use thiserror::Error;

/// Common error type for novyny.
#[derive(Error, Debug)]
pub enum NovynyError {
    /// Key-value store error.
    ///
    /// Wraps errors from any store backend (redis, filesystem, memory).
    #[error("store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Headline feed error.
    #[error("feed error: {0}")]
    Feed(String),

    /// Full-text extraction error.
    #[error("extraction error: {0}")]
    Extract(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

// Conversion from redis errors
impl From<redis::RedisError> for NovynyError {
    fn from(e: redis::RedisError) -> Self {
        NovynyError::Store(e.to_string())
    }
}

/// Result type alias for novyny operations.
pub type Result<T> = std::result::Result<T, NovynyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = NovynyError::Store("connection refused".to_string());
        assert_eq!(err.to_string(), "store error: connection refused");
    }

    #[test]
    fn test_feed_error_display() {
        let err = NovynyError::Feed("HTTP error: 503".to_string());
        assert_eq!(err.to_string(), "feed error: HTTP error: 503");
    }

    #[test]
    fn test_extract_error_display() {
        let err = NovynyError::Extract("timed out".to_string());
        assert_eq!(err.to_string(), "extraction error: timed out");
    }

    #[test]
    fn test_config_error_display() {
        let err = NovynyError::Config("feed.api_key is not set".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: feed.api_key is not set"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NovynyError = io_err.into();
        assert!(matches!(err, NovynyError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(NovynyError::Store("test".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
