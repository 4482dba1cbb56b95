//! Error types for stash.

use thiserror::Error;

/// Result type alias using stash's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for stash operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found, or not owned by the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed structural input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// CSV encoding or decoding failed
    #[error("CSV error: {0}")]
    Csv(String),

    /// Uniqueness conflict on a natural key
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("location 42".to_string());
        assert_eq!(err.to_string(), "Not found: location 42");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("name is required".to_string());
        assert_eq!(err.to_string(), "Invalid input: name is required");
    }

    #[test]
    fn test_error_display_serialization() {
        let err = Error::Serialization("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Serialization error: invalid JSON");
    }

    #[test]
    fn test_error_display_csv() {
        let err = Error::Csv("unequal lengths".to_string());
        assert_eq!(err.to_string(), "CSV error: unequal lengths");
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("duplicate label".to_string());
        assert_eq!(err.to_string(), "Conflict: duplicate label");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_from_csv() {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&[b'a', 0xff, b'\n'][..]);
        let csv_err = reader.records().next().unwrap().unwrap_err();
        let err: Error = csv_err.into();
        assert!(matches!(err, Error::Csv(_)));
    }
}
