// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Note {path} is not valid UTF-8: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Resource error for {key}: {message}")]
    Resource { key: String, message: String },

    #[error("Resource {key} is {size} bytes, above the {limit} byte limit")]
    ResourceTooLarge { key: String, size: u64, limit: u64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("XML error: {0}")]
    Xml(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl PipelineError {
    /// Errors that must abort the whole run rather than a single note.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Config(_) | PipelineError::ResourceTooLarge { .. }
        )
    }
}
