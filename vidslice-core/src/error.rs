use std::io;

use thiserror::Error;

use crate::chunker::Chunk;

/// Custom error types for vidslice
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Required dependency '{0}' not found")]
    DependencyNotFound(String),

    #[error("Failed to start command '{0}': {1}")]
    CommandStart(String, #[source] io::Error),

    #[error("Engine invocation exited with status {code:?}:\n{detail}")]
    EngineFailure { code: Option<i32>, detail: String },

    #[error("Workspace already has '{0}' mounted; assets must be processed one at a time")]
    MountConflict(String),

    #[error("Invalid path: {0}")]
    PathError(String),

    #[error("Workspace artifact '{0}' error: {1}")]
    Artifact(String, #[source] io::Error),

    #[error("Diagnostic stream for '{0}' carried no duration")]
    MissingDuration(String),

    #[error("Diagnostic stream for '{0}' carried no video resolution")]
    MissingResolution(String),

    #[error(
        "Target of {target_bytes} bytes leaves no room for video once audio is reserved over {duration:.1}s"
    )]
    TargetTooSmall { target_bytes: u64, duration: f64 },

    #[error("Segmentation aborted after {} completed segment(s): {source}", completed.len())]
    SegmentationAborted {
        completed: Vec<Chunk>,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Two-pass encode failed in pass {pass}: {source}")]
    EncodeFailed {
        pass: u8,
        #[source]
        source: Box<CoreError>,
    },
}

/// Result type for vidslice operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;
