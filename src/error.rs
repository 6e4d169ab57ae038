use thiserror::Error;

/// Central error type for lesiongraph operations.
///
/// The graph builders themselves never fail; these variants cover loading,
/// configuration and lookups made on behalf of a caller.
#[derive(Error, Debug)]
pub enum LesionError {
    #[error("Study not found: {0}")]
    StudyNotFound(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience type alias for lesiongraph results.
pub type LesionResult<T> = Result<T, LesionError>;
