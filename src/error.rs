//! # Error Types
//!
//! Errors raised by the reprojection and aggregation pipeline. Storage and
//! filename-parsing failures keep their own types and are wrapped here.

use crate::storage::StorageError;
use crate::timestamp::TimestampError;
use thiserror::Error;

/// Errors that can occur while running the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scan filename: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("No NetCDF objects found under '{prefix}'")]
    NoObjects { prefix: String },

    #[error("Variable '{0}' not found in NetCDF file")]
    MissingVariable(String),

    #[error("Attribute '{attribute}' missing on variable '{variable}'")]
    MissingAttribute { variable: String, attribute: String },

    #[error("Unexpected layout for variable '{variable}': {reason}")]
    InvalidLayout { variable: String, reason: String },

    #[error("Grid is empty after {0}")]
    EmptyGrid(String),

    #[error("Grid shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
