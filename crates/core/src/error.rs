//! Error types for parcelmerge

use thiserror::Error;

use crate::vector::FeatureId;

/// Main error type for layer, schema and CRS operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Layer document error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Layer '{layer}' is read-only")]
    ReadOnly { layer: String },

    #[error("Layer '{layer}' is not in editing mode")]
    NotEditable { layer: String },

    #[error("Layer '{layer}' is already in editing mode")]
    AlreadyEditing { layer: String },

    #[error("Feature {0} not found")]
    FeatureNotFound(FeatureId),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    #[error("Value for field '{field}' is {actual} bytes long, limit is {limit}")]
    ValueTooLong {
        field: String,
        limit: usize,
        actual: usize,
    },

    #[error("Field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Checkpoint {checkpoint} is beyond the edit log ({len} entries)")]
    InvalidCheckpoint { checkpoint: usize, len: usize },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for parcelmerge operations
pub type Result<T> = std::result::Result<T, Error>;
