//! Error types for the frozen lake crate

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("map has no rows")]
    EmptyMap,

    #[error("map row {row} has {got} cells, expected {expected}")]
    RaggedMap {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("map must contain exactly one start cell 'S', found {count}")]
    StartCount { count: usize },

    #[error("map must contain at least one goal cell 'G'")]
    MissingGoal,

    #[error("parameter {name} = {value} is out of range (expected {expected})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("failed to {operation} {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read configuration {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("unsupported model format version {found} (expected {expected})")]
    UnsupportedModelVersion { found: u32, expected: u32 },

    #[error("progress bar template error: {message}")]
    ProgressBarTemplate { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
