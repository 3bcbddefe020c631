//! Custom error types for the conversion pipeline.

use thiserror::Error;

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("API error: {0}")]
    Api(#[from] fitbit_client::FitbitError),

    #[error("no heart rate data for activity {0}")]
    NoHeartRate(i64),

    #[error("malformed intraday payload: {0}")]
    Intraday(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("aborted by operator")]
    Aborted,
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
