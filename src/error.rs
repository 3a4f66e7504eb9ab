/// Error taxonomy for the dataset pipeline
///
/// Everything here is fatal at the point of ingestion or configuration.
/// Per-image decode failures are NOT represented here: they are absorbed
/// by the probe module and surface as missing metadata instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Manifest file or images directory does not exist
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Manifest exists but fails structural validation
    #[error("malformed manifest {} (line {line}): {reason}", .path.display())]
    Format {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Two records of one in-memory dataset share an absolute path
    #[error("dataset already contains {path} (record {index})")]
    DuplicateRecord { path: String, index: usize },

    /// Invalid filter/histogram/probe parameters
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single image the user asked about directly could not be decoded
    #[error("cannot decode {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn format(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        PipelineError::Format {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
