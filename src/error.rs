//! Error types for the exoserve service

use thiserror::Error;

/// Result type alias for exoserve operations
pub type Result<T> = std::result::Result<T, ExoError>;

/// Main error type for the service core
#[derive(Error, Debug)]
pub enum ExoError {
    #[error("Dataset not found at path: {0}")]
    DatasetNotFound(String),

    #[error("Dataset parse error: {0}")]
    DatasetParse(String),

    #[error("Dataset empty: {0}")]
    DatasetEmpty(String),

    #[error("Insufficient data for stratified split: {0}")]
    InsufficientData(String),

    #[error("Model not trained")]
    ModelNotTrained,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Integration error: {0}")]
    Integration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for ExoError {
    fn from(err: polars::error::PolarsError) -> Self {
        ExoError::DatasetParse(err.to_string())
    }
}

impl From<serde_json::Error> for ExoError {
    fn from(err: serde_json::Error) -> Self {
        ExoError::Training(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExoError::DatasetNotFound("/tmp/missing.csv".to_string());
        assert_eq!(err.to_string(), "Dataset not found at path: /tmp/missing.csv");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ExoError = io_err.into();
        assert!(matches!(err, ExoError::Io(_)));
    }

    #[test]
    fn test_model_not_trained_display() {
        assert_eq!(ExoError::ModelNotTrained.to_string(), "Model not trained");
    }
}
