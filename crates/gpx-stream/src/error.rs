//! Error types for GPX detection and writing

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while detecting or writing GPX documents
#[derive(Debug, Error)]
pub enum GpxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// XML parsing of a document that looks like GPX failed
    #[error("XML parsing of GPX file failed: {message} at line {line}, column {column}")]
    Xml {
        /// Parser error message
        message: String,
        /// 1-based line of the error
        line: u64,
        /// 0-based column of the error
        column: u64,
    },

    /// Too many character data events in a single input chunk
    #[error("File probably corrupted (million laugh pattern) in chunk {chunk}")]
    EntityAmplification {
        /// 1-based index of the chunk that tripped the guard
        chunk: usize,
    },

    /// Output target already exists
    #[error("You have to delete {} before being able to create it as GPX", .0.display())]
    AlreadyExists(PathBuf),

    /// Invalid writer option
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Point that cannot be written as GPX
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for GPX operations
pub type Result<T> = std::result::Result<T, GpxError>;
